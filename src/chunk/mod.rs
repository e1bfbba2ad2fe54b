mod stream;
mod reader;
mod writer;

pub use stream::*;
pub use reader::*;
pub use writer::*;

/// Message header bytes that follow the basic header, by format type
pub const MESSAGE_HEADER_SIZES: [usize; 4] = [11, 7, 3, 0];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
    pub fmt: u8,
    pub cs_id: u32,
}

/// Parse a 1-3 byte basic header.
///
/// Returns `None` when `bytes` does not yet hold the whole basic header.
pub fn parse_chunk_header(bytes: &[u8]) -> Option<(ChunkHeader, usize)> {
    let first_byte = *bytes.first()?;
    let fmt = (first_byte >> 6) & 0x03;

    let (cs_id, offset) = match first_byte & 0x3F {
        0 => (*bytes.get(1)? as u32 + 64, 2),
        1 => {
            let low = *bytes.get(1)? as u32;
            let high = *bytes.get(2)? as u32;
            ((high << 8) + low + 64, 3)
        }
        n => (n as u32, 1),
    };

    Some((ChunkHeader { fmt, cs_id }, offset))
}

/// Encode a basic header, choosing the shortest form for `cs_id`
pub fn encode_basic_header(fmt: u8, cs_id: u32, out: &mut Vec<u8>) {
    let fmt_bits = (fmt & 0x03) << 6;
    if cs_id <= 63 {
        out.push(fmt_bits | cs_id as u8);
    } else if cs_id <= 319 {
        out.push(fmt_bits);
        out.push((cs_id - 64) as u8);
    } else {
        let id = cs_id - 64;
        out.push(fmt_bits | 1);
        out.push((id & 0xFF) as u8);
        out.push((id >> 8) as u8);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_header_forms() {
        for (cs_id, expected_len) in [(2u32, 1usize), (63, 1), (64, 2), (319, 2), (320, 3), (65599, 3)] {
            let mut out = Vec::new();
            encode_basic_header(1, cs_id, &mut out);
            assert_eq!(out.len(), expected_len, "cs_id {}", cs_id);

            let (header, consumed) = parse_chunk_header(&out).unwrap();
            assert_eq!(consumed, expected_len);
            assert_eq!(header, ChunkHeader { fmt: 1, cs_id });
        }
    }

    #[test]
    fn test_partial_basic_header() {
        assert!(parse_chunk_header(&[]).is_none());
        assert!(parse_chunk_header(&[0x00]).is_none());
        assert!(parse_chunk_header(&[0x01, 0x10]).is_none());
        assert_eq!(
            parse_chunk_header(&[0xC3]),
            Some((ChunkHeader { fmt: 3, cs_id: 3 }, 1))
        );
    }
}
