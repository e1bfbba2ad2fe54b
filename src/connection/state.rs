use std::sync::atomic::{AtomicU8, Ordering};

/// Transport lifecycle; states only move forward
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum ConnectionState {
    /// Socket bound, loops not started
    Created = 0,

    /// Receive and write loops running
    Open = 1,

    /// Sends refused, waiting for deferred close
    Closing = 2,

    /// Transport released
    Closed = 3,
}

impl ConnectionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ConnectionState::Created,
            1 => ConnectionState::Open,
            2 => ConnectionState::Closing,
            _ => ConnectionState::Closed,
        }
    }

    /// Check if sends are still accepted
    pub fn can_send(&self) -> bool {
        matches!(self, ConnectionState::Created | ConnectionState::Open)
    }

    pub fn is_closed(&self) -> bool {
        *self == ConnectionState::Closed
    }

    /// Validate transition
    pub fn can_transition_to(&self, next: ConnectionState) -> bool {
        next > *self
    }
}

/// Lock-free cell holding a `ConnectionState`
#[derive(Debug)]
pub(crate) struct AtomicState(AtomicU8);

impl AtomicState {
    pub(crate) fn new(state: ConnectionState) -> Self {
        AtomicState(AtomicU8::new(state as u8))
    }

    pub(crate) fn load(&self) -> ConnectionState {
        ConnectionState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Move forward to `next`; returns the previous state.
    /// A backward move leaves the state unchanged.
    pub(crate) fn advance(&self, next: ConnectionState) -> ConnectionState {
        ConnectionState::from_u8(self.0.fetch_max(next as u8, Ordering::AcqRel))
    }
}
