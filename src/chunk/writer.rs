use crate::chunk::{encode_basic_header, ExportContext};
use crate::protocol::{RtmpHeader, RtmpPacket};
use crate::{
    ByteBuffer, Error, Result, CHUNK_STREAM_MIN, DEFAULT_CHUNK_SIZE, EXTENDED_TIMESTAMP, MAX_MESSAGE_LENGTH,
};
use std::collections::HashMap;

pub struct ChunkWriter {
    /// Previous headers for each chunk stream
    exports: HashMap<u32, ExportContext>,

    /// Current chunk size for writing
    chunk_size_out: usize,

    /// Use format 1/2 headers when the previous export allows it
    compress_header: bool,
}

impl ChunkWriter {
    /// Create new chunk writer
    pub fn new(compress_header: bool, chunk_size: usize) -> Self {
        ChunkWriter {
            exports: HashMap::new(),
            chunk_size_out: chunk_size.max(1),
            compress_header,
        }
    }

    /// Set outgoing chunk size
    pub fn set_chunk_size(&mut self, size: usize) {
        self.chunk_size_out = size.max(1);
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size_out
    }

    pub fn export_packet(&mut self, packet: &RtmpPacket) -> Result<Vec<u8>> {
        self.export(&packet.header, &packet.payload)
    }

    /// Serialize one message as a run of chunks
    pub fn export(&mut self, header: &RtmpHeader, payload: &[u8]) -> Result<Vec<u8>> {
        let cs_id = header.chunk_stream_id;
        if cs_id < CHUNK_STREAM_MIN {
            return Err(Error::chunk(format!("Chunk stream id {} is reserved", cs_id)));
        }

        if payload.len() > MAX_MESSAGE_LENGTH {
            return Err(Error::out_of_range(format!(
                "Message body of {} bytes does not fit a 24-bit length",
                payload.len()
            )));
        }

        let mut header = *header;
        header.message_length = payload.len() as u32;

        let (fmt, header_bytes, extended) = self.message_header(&header)?;

        let mut result = Vec::with_capacity(payload.len() + header_bytes.len() + 16);
        encode_basic_header(fmt, cs_id, &mut result);
        result.extend_from_slice(&header_bytes);

        let first_chunk_size = payload.len().min(self.chunk_size_out);
        result.extend_from_slice(&payload[..first_chunk_size]);

        // continuation chunks repeat the extended field when the header had one
        let mut offset = first_chunk_size;
        while offset < payload.len() {
            encode_basic_header(3, cs_id, &mut result);
            if let Some(value) = extended {
                result.extend_from_slice(&value.to_be_bytes());
            }
            let chunk_end = (offset + self.chunk_size_out).min(payload.len());
            result.extend_from_slice(&payload[offset..chunk_end]);
            offset = chunk_end;
        }

        self.exports.insert(cs_id, ExportContext { prev_header: header });
        Ok(result)
    }

    /// Pick the header format; a new message never goes out as format 3
    fn message_header(&self, header: &RtmpHeader) -> Result<(u8, Vec<u8>, Option<u32>)> {
        if self.compress_header {
            if let Some(ExportContext { prev_header: prev }) = self.exports.get(&header.chunk_stream_id) {
                if header.timestamp >= prev.timestamp && prev.message_stream_id == header.message_stream_id {
                    let delta = header.timestamp - prev.timestamp;
                    if prev.message_type == header.message_type && prev.message_length == header.message_length {
                        let (bytes, extended) = encode_header_fields(2, delta, header)?;
                        return Ok((2, bytes, extended));
                    }
                    let (bytes, extended) = encode_header_fields(1, delta, header)?;
                    return Ok((1, bytes, extended));
                }
            }
        }

        let (bytes, extended) = encode_header_fields(0, header.timestamp, header)?;
        Ok((0, bytes, extended))
    }
}

impl Default for ChunkWriter {
    fn default() -> Self {
        ChunkWriter::new(true, DEFAULT_CHUNK_SIZE as usize)
    }
}

/// Message header for formats 0-2 followed by the extended timestamp if needed
fn encode_header_fields(fmt: u8, time: u32, header: &RtmpHeader) -> Result<(Vec<u8>, Option<u32>)> {
    let mut buffer = ByteBuffer::with_capacity(15);
    let extended = (time >= EXTENDED_TIMESTAMP).then_some(time);

    buffer.write_u24_be(time.min(EXTENDED_TIMESTAMP))?;
    if fmt <= 1 {
        buffer.write_u24_be(header.message_length)?;
        buffer.write_u8(header.message_type)?;
    }
    if fmt == 0 {
        buffer.write_u32_le(header.message_stream_id)?;
    }
    if let Some(value) = extended {
        buffer.write_u32_be(value)?;
    }

    Ok((buffer.into_vec(), extended))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{MSG_TYPE_AUDIO, MSG_TYPE_COMMAND_AMF0};

    #[test]
    fn test_full_header_layout() {
        let mut writer = ChunkWriter::new(true, 128);
        let bytes = writer.export(&RtmpHeader::command(0x010203, 0, 0), &[0xAA, 0xBB]).unwrap();

        assert_eq!(
            bytes,
            vec![0x03, 0x01, 0x02, 0x03, 0x00, 0x00, 0x02, MSG_TYPE_COMMAND_AMF0, 0, 0, 0, 0, 0xAA, 0xBB]
        );
    }

    #[test]
    fn test_consecutive_exports_compress() {
        let mut writer = ChunkWriter::new(true, 128);
        let first = writer.export(&RtmpHeader::audio(10, 0, 1), &[1, 2, 3]).unwrap();
        assert_eq!(first[0] >> 6, 0);

        // same stream, type and length
        let second = writer.export(&RtmpHeader::audio(30, 0, 1), &[4, 5, 6]).unwrap();
        assert_eq!(second[0] >> 6, 2);
        assert_eq!(&second[1..4], &[0, 0, 20]);
        assert_eq!(second.len(), 1 + 3 + 3);

        // different length
        let third = writer.export(&RtmpHeader::audio(30, 0, 1), &[7]).unwrap();
        assert_eq!(third[0] >> 6, 1);
        assert_eq!(&third[1..8], &[0, 0, 0, 0, 0, 1, MSG_TYPE_AUDIO]);

        // timestamp going backwards needs a full header
        let fourth = writer.export(&RtmpHeader::audio(5, 0, 1), &[7]).unwrap();
        assert_eq!(fourth[0] >> 6, 0);

        // different message stream
        let fifth = writer.export(&RtmpHeader::audio(50, 0, 2), &[7]).unwrap();
        assert_eq!(fifth[0] >> 6, 0);
    }

    #[test]
    fn test_identical_message_is_not_format3() {
        let mut writer = ChunkWriter::new(true, 128);
        writer.export(&RtmpHeader::video(40, 0, 1), &[1, 2]).unwrap();
        let repeat = writer.export(&RtmpHeader::video(40, 0, 1), &[1, 2]).unwrap();
        assert_eq!(repeat[0] >> 6, 2);
        assert_eq!(&repeat[1..4], &[0, 0, 0]);
    }

    #[test]
    fn test_uncompressed_always_full_header() {
        let mut writer = ChunkWriter::new(false, 128);
        writer.export(&RtmpHeader::audio(10, 0, 1), &[1]).unwrap();
        let second = writer.export(&RtmpHeader::audio(20, 0, 1), &[1]).unwrap();
        assert_eq!(second[0] >> 6, 0);
        assert_eq!(second.len(), 12 + 1);
    }

    #[test]
    fn test_split_into_chunks() {
        let mut writer = ChunkWriter::new(true, 4);
        let bytes = writer.export(&RtmpHeader::video(0, 0, 1), &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9]).unwrap();
        // 12 + 4, 1 + 4, 1 + 2
        assert_eq!(bytes.len(), 24);
        assert_eq!(bytes[16], 0xC6);
        assert_eq!(bytes[21], 0xC6);
        assert_eq!(&bytes[22..], &[8, 9]);
    }

    #[test]
    fn test_extended_timestamp_field() {
        let mut writer = ChunkWriter::new(true, 128);
        let bytes = writer.export(&RtmpHeader::video(0xFFFFFF, 0, 1), &[1]).unwrap();
        assert_eq!(&bytes[1..4], &[0xFF, 0xFF, 0xFF]);
        assert_eq!(&bytes[12..16], &[0x00, 0xFF, 0xFF, 0xFF]);
        assert_eq!(bytes.len(), 17);
    }

    #[test]
    fn test_reserved_chunk_stream_rejected() {
        let mut writer = ChunkWriter::default();
        let header = RtmpHeader::new(0, 0, MSG_TYPE_AUDIO, 1, 1);
        assert!(writer.export(&header, &[1]).is_err());
    }

    #[test]
    fn test_body_beyond_24_bits_rejected() {
        let mut writer = ChunkWriter::new(true, 65536);
        let header = RtmpHeader::video(0, 0, 1);

        let largest = vec![0u8; MAX_MESSAGE_LENGTH];
        let bytes = writer.export(&header, &largest).unwrap();
        assert_eq!(&bytes[4..7], &[0xFF, 0xFF, 0xFF]);

        let too_large = vec![0u8; MAX_MESSAGE_LENGTH + 1];
        assert!(matches!(writer.export(&header, &too_large), Err(Error::OutOfRange(_))));
    }

    #[test]
    fn test_large_chunk_stream_id() {
        let mut writer = ChunkWriter::default();
        let header = RtmpHeader::new(0, 0, MSG_TYPE_AUDIO, 1, 400);
        let bytes = writer.export(&header, &[1]).unwrap();
        assert_eq!(&bytes[..3], &[0x01, (336 & 0xFF) as u8, 1]);
    }
}
