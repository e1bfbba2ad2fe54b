use crate::utils::{current_timestamp_secs, generate_random_bytes};
use crate::{ByteBuffer, Error, Result};

/// RTMP version
pub const RTMP_VERSION: u8 = 3;

/// Handshake packet size (C1/S1/C2/S2)
pub const HANDSHAKE_SIZE: usize = 1536;

/// C0 plus C1
pub const C0C1_SIZE: usize = 1 + HANDSHAKE_SIZE;

/// Client handshake (C0 + C1)
#[derive(Debug, Clone)]
pub struct C0C1 {
    /// RTMP version (C0)
    pub version: u8,

    /// Timestamp (C1)
    pub timestamp: u32,

    /// Zero (C1)
    pub zero: u32,

    /// Random data (C1)
    pub random_data: Vec<u8>,
}

impl C0C1 {
    /// Parse C0+C1 from bytes; the version byte must be 3
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < C0C1_SIZE {
            return Err(Error::handshake(format!(
                "C0+C1 too short: {} bytes, expected {}",
                data.len(),
                C0C1_SIZE
            )));
        }

        let version = data[0];
        if version != RTMP_VERSION {
            return Err(Error::handshake(format!(
                "Unsupported RTMP version: {}, expected {}",
                version, RTMP_VERSION
            )));
        }

        let mut buffer = ByteBuffer::from_slice(&data[1..C0C1_SIZE]);
        let timestamp = buffer.read_u32_be()?;
        let zero = buffer.read_u32_be()?;
        let random_data = buffer.read_bytes(HANDSHAKE_SIZE - 8)?;

        Ok(C0C1 {
            version,
            timestamp,
            zero,
            random_data,
        })
    }

    /// Create C0+C1 for client
    pub fn create_client() -> Self {
        C0C1 {
            version: RTMP_VERSION,
            timestamp: current_timestamp_secs(),
            zero: 0,
            random_data: generate_random_bytes(HANDSHAKE_SIZE - 8),
        }
    }

    /// The 1536 C1 bytes as sent
    pub fn c1_bytes(&self) -> Result<Vec<u8>> {
        let mut buffer = ByteBuffer::with_capacity(HANDSHAKE_SIZE);
        buffer.write_u32_be(self.timestamp)?;
        buffer.write_u32_be(self.zero)?;
        buffer.write_bytes(&self.random_data)?;
        Ok(buffer.into_vec())
    }

    /// Encode to bytes
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut result = Vec::with_capacity(C0C1_SIZE);
        result.push(self.version);
        result.extend_from_slice(&self.c1_bytes()?);
        Ok(result)
    }
}

/// C2 as a client sends it: an echo of S1
pub fn create_c2(s1: &[u8]) -> Vec<u8> {
    let mut c2 = vec![0u8; HANDSHAKE_SIZE];
    let len = s1.len().min(HANDSHAKE_SIZE);
    c2[..len].copy_from_slice(&s1[..len]);
    c2
}
