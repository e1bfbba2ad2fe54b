mod state;
mod c0c1;
mod s0s1s2;

pub use state::*;
pub use c0c1::*;
pub use s0s1s2::*;

use crate::Result;
use log::debug;

/// Result of feeding bytes to the handshake
#[derive(Debug, Default)]
pub struct HandshakeStep {
    /// Bytes consumed; 0 means more input is needed
    pub consumed: usize,

    /// Bytes to send back to the peer
    pub response: Option<Vec<u8>>,
}

/// Server side of the simple handshake.
///
/// C2 is accepted without comparing it to S1.
#[derive(Debug, Default)]
pub struct Handshake {
    state: HandshakeState,
}

impl Handshake {
    /// Create new handshake driver
    pub fn new() -> Self {
        Handshake::default()
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    pub fn is_complete(&self) -> bool {
        self.state.is_done()
    }

    /// Feed buffered bytes; consumes at most one handshake step
    pub fn process(&mut self, data: &[u8]) -> Result<HandshakeStep> {
        match self.state {
            HandshakeState::Ready => {
                if data.len() < C0C1_SIZE {
                    return Ok(HandshakeStep::default());
                }
                let c0c1 = C0C1::parse(data)?;
                self.state.transition(HandshakeEvent::ReceivedC0C1)?;

                let response = S0S1S2::generate(&c0c1)?.encode()?;
                self.state.transition(HandshakeEvent::SentS0S1S2)?;
                debug!("Handshake C0+C1 accepted, client time {}", c0c1.timestamp);

                Ok(HandshakeStep {
                    consumed: C0C1_SIZE,
                    response: Some(response),
                })
            }
            HandshakeState::S2 => {
                if data.len() < HANDSHAKE_SIZE {
                    return Ok(HandshakeStep::default());
                }
                self.state.transition(HandshakeEvent::ReceivedC2)?;
                self.state.transition(HandshakeEvent::Finished)?;
                debug!("Handshake complete");

                Ok(HandshakeStep {
                    consumed: HANDSHAKE_SIZE,
                    response: None,
                })
            }
            state => Err(crate::Error::handshake(format!(
                "Handshake data received in state {:?}",
                state
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handshake_flow() {
        let mut handshake = Handshake::new();
        let c0c1 = C0C1::create_client().encode().unwrap();

        // partial C0+C1
        let step = handshake.process(&c0c1[..100]).unwrap();
        assert_eq!(step.consumed, 0);
        assert_eq!(handshake.state(), HandshakeState::Ready);

        let step = handshake.process(&c0c1).unwrap();
        assert_eq!(step.consumed, C0C1_SIZE);
        let response = step.response.unwrap();
        assert_eq!(response.len(), 1 + HANDSHAKE_SIZE * 2);
        assert_eq!(handshake.state(), HandshakeState::S2);

        // C2 with pipelined chunk bytes behind it
        let mut c2 = create_c2(&response[1..1 + HANDSHAKE_SIZE]);
        c2.extend_from_slice(&[0x03, 0x00]);
        let step = handshake.process(&c2).unwrap();
        assert_eq!(step.consumed, HANDSHAKE_SIZE);
        assert!(step.response.is_none());
        assert!(handshake.is_complete());
    }

    #[test]
    fn test_c2_content_not_checked() {
        let mut handshake = Handshake::new();
        handshake.process(&C0C1::create_client().encode().unwrap()).unwrap();
        assert!(handshake.process(&vec![0xEE; HANDSHAKE_SIZE]).is_ok());
        assert!(handshake.is_complete());
    }

    #[test]
    fn test_version_mismatch_is_fatal() {
        let mut handshake = Handshake::new();
        let mut c0c1 = C0C1::create_client().encode().unwrap();
        c0c1[0] = 0x06;
        assert!(handshake.process(&c0c1).is_err());
    }

    #[test]
    fn test_data_after_complete_is_a_state_violation() {
        let mut handshake = Handshake::new();
        handshake.process(&C0C1::create_client().encode().unwrap()).unwrap();
        handshake.process(&vec![0; HANDSHAKE_SIZE]).unwrap();
        assert!(handshake.process(&[1, 2, 3]).is_err());
    }
}
