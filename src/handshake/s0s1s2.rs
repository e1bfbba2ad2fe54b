use crate::handshake::c0c1::{C0C1, HANDSHAKE_SIZE, RTMP_VERSION};
use crate::utils::{current_timestamp_secs, generate_random_bytes};
use crate::{ByteBuffer, Error, Result};

/// Server handshake (S0 + S1 + S2)
#[derive(Debug, Clone)]
pub struct S0S1S2 {
    /// RTMP version (S0)
    pub version: u8,

    /// S1 timestamp, seconds
    pub s1_timestamp: u32,

    /// S1 random data
    pub s1_random: Vec<u8>,

    /// S2: the client's C1, byte for byte
    pub s2_echo: Vec<u8>,
}

impl S0S1S2 {
    /// Generate S0+S1+S2 response for C0+C1
    pub fn generate(c0c1: &C0C1) -> Result<Self> {
        if c0c1.version != RTMP_VERSION {
            return Err(Error::handshake(format!(
                "Unsupported client version: {}",
                c0c1.version
            )));
        }

        Ok(S0S1S2 {
            version: RTMP_VERSION,
            s1_timestamp: current_timestamp_secs(),
            s1_random: generate_random_bytes(HANDSHAKE_SIZE - 8),
            s2_echo: c0c1.c1_bytes()?,
        })
    }

    /// S1 as sent: time, four zero bytes, random
    pub fn s1_bytes(&self) -> Result<Vec<u8>> {
        let mut buffer = ByteBuffer::with_capacity(HANDSHAKE_SIZE);
        buffer.write_u32_be(self.s1_timestamp)?;
        buffer.write_u32_be(0)?;
        buffer.write_bytes(&self.s1_random)?;
        Ok(buffer.into_vec())
    }

    /// Encode to bytes
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut result = Vec::with_capacity(1 + HANDSHAKE_SIZE * 2);
        result.push(self.version);
        result.extend_from_slice(&self.s1_bytes()?);
        result.extend_from_slice(&self.s2_echo);
        Ok(result)
    }

    /// Parse S0+S1+S2 from bytes (for client side)
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < 1 + HANDSHAKE_SIZE * 2 {
            return Err(Error::handshake(format!(
                "S0+S1+S2 too short: {} bytes",
                data.len()
            )));
        }

        let mut s1 = ByteBuffer::from_slice(&data[1..1 + HANDSHAKE_SIZE]);
        let s1_timestamp = s1.read_u32_be()?;
        let _zero = s1.read_u32_be()?;
        let s1_random = s1.read_bytes(HANDSHAKE_SIZE - 8)?;

        Ok(S0S1S2 {
            version: data[0],
            s1_timestamp,
            s1_random,
            s2_echo: data[1 + HANDSHAKE_SIZE..1 + HANDSHAKE_SIZE * 2].to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_s2_echoes_c1() {
        let c0c1 = C0C1::create_client();
        let response = S0S1S2::generate(&c0c1).unwrap();
        let bytes = response.encode().unwrap();
        assert_eq!(bytes.len(), 1 + HANDSHAKE_SIZE * 2);
        assert_eq!(bytes[0], RTMP_VERSION);

        let c1 = c0c1.c1_bytes().unwrap();
        assert_eq!(&bytes[1 + HANDSHAKE_SIZE..], &c1[..]);
        // S1 zero field
        assert_eq!(&bytes[5..9], &[0, 0, 0, 0]);

        let parsed = S0S1S2::parse(&bytes).unwrap();
        assert_eq!(parsed.s1_random, response.s1_random);
        assert_eq!(parsed.s2_echo, c1);
    }
}
