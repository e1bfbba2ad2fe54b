use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    /// Waiting for C0+C1 from client
    Ready,

    /// C0+C1 received and accepted
    C0,

    /// Sent S0+S1+S2, waiting for C2
    S2,

    /// C2 received
    C2,

    /// Chunk exchange may begin
    Complete,
}

impl HandshakeState {
    /// Initial state
    pub fn new() -> Self {
        HandshakeState::Ready
    }

    /// Check if handshake is complete
    pub fn is_done(&self) -> bool {
        *self == HandshakeState::Complete
    }

    /// Transition to next state
    pub fn transition(&mut self, event: HandshakeEvent) -> Result<()> {
        let next = match (*self, event) {
            (HandshakeState::Ready, HandshakeEvent::ReceivedC0C1) => HandshakeState::C0,
            (HandshakeState::C0, HandshakeEvent::SentS0S1S2) => HandshakeState::S2,
            (HandshakeState::S2, HandshakeEvent::ReceivedC2) => HandshakeState::C2,
            (HandshakeState::C2, HandshakeEvent::Finished) => HandshakeState::Complete,
            _ => {
                return Err(Error::handshake(format!(
                    "Invalid transition from {:?} with event {:?}",
                    self, event
                )));
            }
        };
        *self = next;
        Ok(())
    }
}

impl Default for HandshakeState {
    fn default() -> Self {
        HandshakeState::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeEvent {
    ReceivedC0C1,
    SentS0S1S2,
    ReceivedC2,
    Finished,
}
