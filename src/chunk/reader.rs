use crate::chunk::stream::ChunkStreamContext;
use crate::chunk::{parse_chunk_header, MESSAGE_HEADER_SIZES};
use crate::protocol::{RtmpHeader, RtmpPacket};
use crate::{Error, Result, DEFAULT_CHUNK_SIZE, EXTENDED_TIMESTAMP, MAX_PACKET_SIZE};
use log::{debug, trace};
use std::collections::{HashMap, VecDeque};

/// Outcome of importing one chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkImport {
    /// Bytes consumed; 0 means the chunk is not complete yet
    pub consumed: usize,

    /// Whether this chunk completed a message that is now queued
    pub completed: bool,
}

impl ChunkImport {
    fn need_more() -> Self {
        ChunkImport { consumed: 0, completed: false }
    }
}

/// Snapshot of the per-stream state needed to decode one header
#[derive(Clone, Copy)]
struct StreamView {
    prev_header: Option<RtmpHeader>,
    current_header: Option<RtmpHeader>,
    timestamp_delta: u32,
    extended: bool,
    bytes_remaining: usize,
}

/// Inbound chunk demultiplexer.
///
/// Works on whatever bytes the caller has buffered: each `import` call
/// consumes at most one chunk, and consumes nothing (leaving all state
/// untouched) until the whole chunk is present.
pub struct ChunkReader {
    /// Chunk streams by ID
    chunk_streams: HashMap<u32, ChunkStreamContext>,

    /// Negotiated inbound chunk size
    chunk_size_in: usize,

    /// Completed messages in completion order across all streams
    completed: VecDeque<RtmpPacket>,

    /// Largest accepted message body; only reachable when set below
    /// `MAX_MESSAGE_LENGTH`
    max_message_size: usize,
}

impl ChunkReader {
    /// Create new chunk reader
    pub fn new() -> Self {
        ChunkReader {
            chunk_streams: HashMap::new(),
            chunk_size_in: DEFAULT_CHUNK_SIZE as usize,
            completed: VecDeque::new(),
            max_message_size: MAX_PACKET_SIZE,
        }
    }

    pub fn with_max_message_size(mut self, limit: usize) -> Self {
        self.max_message_size = limit;
        self
    }

    /// Set incoming chunk size; applies from the next chunk on
    pub fn set_chunk_size(&mut self, size: usize) {
        self.chunk_size_in = size.max(1);
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size_in
    }

    /// Next completed message, FIFO across streams
    pub fn pop_message(&mut self) -> Option<RtmpPacket> {
        self.completed.pop_front()
    }

    pub fn pending_messages(&self) -> usize {
        self.completed.len()
    }

    /// Drop the partially assembled message on `cs_id` (Abort message)
    pub fn abort(&mut self, cs_id: u32) {
        if let Some(ctx) = self.chunk_streams.get_mut(&cs_id) {
            ctx.discard_partial();
        }
    }

    fn view(&self, cs_id: u32) -> Option<StreamView> {
        self.chunk_streams.get(&cs_id).map(|ctx| StreamView {
            prev_header: ctx.prev_header,
            current_header: ctx.current_header,
            timestamp_delta: ctx.timestamp_delta,
            extended: ctx.extended,
            bytes_remaining: ctx.bytes_remaining(),
        })
    }

    /// Import the chunk at the start of `data`
    pub fn import(&mut self, data: &[u8]) -> Result<ChunkImport> {
        let Some((basic, mut offset)) = parse_chunk_header(data) else {
            return Ok(ChunkImport::need_more());
        };
        let fmt = basic.fmt;
        let cs_id = basic.cs_id;

        let header_size = MESSAGE_HEADER_SIZES[fmt as usize];
        if data.len() < offset + header_size {
            return Ok(ChunkImport::need_more());
        }

        let view = self.view(cs_id);
        let reference = view.and_then(|v| v.current_header.or(v.prev_header));
        if fmt != 0 && reference.is_none() {
            return Err(Error::chunk(format!(
                "Format {} chunk on unknown chunk stream {}",
                fmt, cs_id
            )));
        }

        let fields = &data[offset..offset + header_size];
        offset += header_size;

        let raw_timestamp = (fmt <= 2).then(|| u32::from_be_bytes([0, fields[0], fields[1], fields[2]]));
        let extended = match raw_timestamp {
            Some(ts) => ts == EXTENDED_TIMESTAMP,
            None => view.map(|v| v.extended).unwrap_or(false),
        };
        let timestamp = if extended {
            let Some(ext) = data.get(offset..offset + 4) else {
                return Ok(ChunkImport::need_more());
            };
            offset += 4;
            u32::from_be_bytes([ext[0], ext[1], ext[2], ext[3]])
        } else {
            raw_timestamp.unwrap_or(0)
        };

        let (header, new_message) = match (fmt, reference, view) {
            (0, _, _) => {
                let length = u32::from_be_bytes([0, fields[3], fields[4], fields[5]]);
                let stream_id = u32::from_le_bytes([fields[7], fields[8], fields[9], fields[10]]);
                (RtmpHeader::new(timestamp, length, fields[6], stream_id, cs_id), true)
            }
            (1, Some(base), _) => {
                let length = u32::from_be_bytes([0, fields[3], fields[4], fields[5]]);
                let header = RtmpHeader::new(
                    base.timestamp.wrapping_add(timestamp),
                    length,
                    fields[6],
                    base.message_stream_id,
                    cs_id,
                );
                (header, true)
            }
            (2, Some(base), _) => {
                let mut header = base;
                header.timestamp = base.timestamp.wrapping_add(timestamp);
                (header, true)
            }
            (3, _, Some(StreamView { current_header: Some(current), .. })) => (current, false),
            (3, _, Some(v)) => match v.prev_header {
                Some(prev) => {
                    let mut header = prev;
                    header.timestamp = prev.timestamp.wrapping_add(v.timestamp_delta);
                    (header, true)
                }
                None => return Err(Error::chunk(format!("Format 3 chunk without a previous header on {}", cs_id))),
            },
            _ => return Err(Error::chunk(format!("Format {} chunk on unknown chunk stream {}", fmt, cs_id))),
        };

        if header.message_length as usize > self.max_message_size {
            return Err(Error::chunk(format!(
                "Message body of {} bytes on chunk stream {} exceeds limit",
                header.message_length, cs_id
            )));
        }

        let remaining = if new_message {
            header.message_length as usize
        } else {
            view.map(|v| v.bytes_remaining).unwrap_or(0)
        };
        let chunk_len = remaining.min(self.chunk_size_in);
        if data.len() < offset + chunk_len {
            return Ok(ChunkImport::need_more());
        }

        // whole chunk is present: commit
        let ctx = self.chunk_streams.entry(cs_id).or_default();
        if fmt <= 2 {
            ctx.extended = extended;
        }
        if new_message {
            if ctx.is_assembling() {
                debug!(
                    "Chunk stream {} restarted with format {} before {} pending bytes arrived",
                    cs_id,
                    fmt,
                    ctx.bytes_remaining()
                );
            }
            ctx.start_message(header);
        }
        ctx.message_buffer.extend_from_slice(&data[offset..offset + chunk_len]);
        offset += chunk_len;

        let mut completed = false;
        if ctx.bytes_remaining() == 0 {
            if let Some((header, body)) = ctx.finish_message() {
                trace!(
                    "Message complete: csid={} type={} len={} ts={}",
                    cs_id, header.message_type, body.len(), header.timestamp
                );
                if !body.is_empty() {
                    self.completed.push_back(RtmpPacket::new(header, body));
                    completed = true;
                }
            }
        }

        Ok(ChunkImport { consumed: offset, completed })
    }
}

impl Default for ChunkReader {
    fn default() -> Self {
        ChunkReader::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::ChunkWriter;
    use crate::protocol::{MAX_MESSAGE_LENGTH, MSG_TYPE_AUDIO, MSG_TYPE_VIDEO};

    fn import_all(reader: &mut ChunkReader, data: &[u8]) -> usize {
        let mut offset = 0;
        loop {
            let status = reader.import(&data[offset..]).unwrap();
            if status.consumed == 0 {
                return offset;
            }
            offset += status.consumed;
        }
    }

    #[test]
    fn test_reassembly_across_every_split_point() {
        let payload: Vec<u8> = (0..700u32).map(|i| (i % 251) as u8).collect();
        let header = RtmpHeader::video(40, payload.len() as u32, 1);
        let mut writer = ChunkWriter::new(true, 128);
        let wire = writer.export(&header, &payload).unwrap();

        for split in 0..=wire.len() {
            let mut reader = ChunkReader::new();
            let mut pending = wire[..split].to_vec();
            let used = import_all(&mut reader, &pending);
            pending.drain(..used);
            pending.extend_from_slice(&wire[split..]);
            let used = import_all(&mut reader, &pending);
            assert_eq!(used, pending.len(), "split {}", split);

            let message = reader.pop_message().expect("one message");
            assert_eq!(message.payload, payload);
            assert_eq!(message.header.timestamp, 40);
            assert_eq!(message.header.message_type, MSG_TYPE_VIDEO);
            assert!(reader.pop_message().is_none());
        }
    }

    #[test]
    fn test_byte_at_a_time() {
        let payload = vec![7u8; 300];
        let mut writer = ChunkWriter::new(true, 128);
        let mut wire = writer.export(&RtmpHeader::audio(5, 300, 1), &payload).unwrap();
        wire.extend(writer.export(&RtmpHeader::audio(28, 300, 1), &payload).unwrap());

        let mut reader = ChunkReader::new();
        let mut buffered = Vec::new();
        for byte in wire {
            buffered.push(byte);
            let used = import_all(&mut reader, &buffered);
            buffered.drain(..used);
        }
        assert!(buffered.is_empty());

        let first = reader.pop_message().unwrap();
        let second = reader.pop_message().unwrap();
        assert_eq!(first.header.timestamp, 5);
        assert_eq!(second.header.timestamp, 28);
        assert_eq!(second.header.message_type, MSG_TYPE_AUDIO);
        assert_eq!(second.payload.len(), 300);
    }

    #[test]
    fn test_unknown_stream_with_compact_header_is_fatal() {
        let mut reader = ChunkReader::new();
        // fmt 1 on csid 5 with a full 7-byte header and no prior state
        let data = [0x45, 0, 0, 10, 0, 0, 1, 9, 0xAA];
        assert!(reader.import(&data).is_err());

        let mut reader = ChunkReader::new();
        assert!(reader.import(&[0xC5, 0xAA]).is_err());
    }

    #[test]
    fn test_oversized_body_is_fatal() {
        // the widest 24-bit length stays under the default limit
        assert!(MAX_MESSAGE_LENGTH < MAX_PACKET_SIZE);
        let mut reader = ChunkReader::new();
        // fmt 0, csid 3, body 0xFFFFFF
        let data = [0x03, 0, 0, 0, 0xFF, 0xFF, 0xFF, 20, 0, 0, 0, 0];
        assert!(reader.import(&data).is_ok());

        let mut reader = ChunkReader::new().with_max_message_size(1024);
        let data = [0x03, 0, 0, 0, 0, 0x04, 0x01, 9, 0, 0, 0, 0];
        assert!(reader.import(&data).is_err());
    }

    #[test]
    fn test_short_input_needs_more_without_state_change() {
        let mut reader = ChunkReader::new();
        let data = [0x03, 0, 0, 0, 0, 0, 4, 20, 0, 0, 0, 0, 1, 2];
        assert_eq!(reader.import(&data).unwrap().consumed, 0);
        // a compact header still fails because nothing was committed
        assert!(reader.import(&[0xC3, 1, 2, 3, 4]).is_err());
    }

    #[test]
    fn test_set_chunk_size_applies_to_next_chunk() {
        let payload = vec![1u8; 500];
        let mut writer = ChunkWriter::new(false, 500);
        let wire = writer.export(&RtmpHeader::video(0, 500, 1), &payload).unwrap();

        let mut reader = ChunkReader::new();
        reader.set_chunk_size(500);
        assert_eq!(import_all(&mut reader, &wire), wire.len());
        assert_eq!(reader.pop_message().unwrap().payload.len(), 500);
    }

    #[test]
    fn test_extended_timestamp_on_continuations() {
        let payload = vec![3u8; 260];
        let header = RtmpHeader::video(0x0100_0000, 260, 1);
        let mut writer = ChunkWriter::new(false, 128);
        let wire = writer.export(&header, &payload).unwrap();
        // 12 + 4 + 128, then (1 + 4 + 128), then (1 + 4 + 4)
        assert_eq!(wire.len(), 144 + 133 + 9);

        let mut reader = ChunkReader::new();
        assert_eq!(import_all(&mut reader, &wire), wire.len());
        let message = reader.pop_message().unwrap();
        assert_eq!(message.header.timestamp, 0x0100_0000);
        assert_eq!(message.payload, payload);
    }

    #[test]
    fn test_format3_new_message_reuses_delta() {
        let mut reader = ChunkReader::new();
        // fmt 0: ts 10, len 1, audio, msid 1
        import_all(&mut reader, &[0x04, 0, 0, 10, 0, 0, 1, 8, 1, 0, 0, 0, 0xAA]);
        // fmt 2: delta 20
        import_all(&mut reader, &[0x84, 0, 0, 20, 0xBB]);
        // fmt 3: repeats delta 20
        import_all(&mut reader, &[0xC4, 0xCC]);

        let stamps: Vec<u32> = std::iter::from_fn(|| reader.pop_message())
            .map(|m| m.header.timestamp)
            .collect();
        assert_eq!(stamps, vec![10, 30, 50]);
    }

    #[test]
    fn test_abort_discards_partial() {
        let mut reader = ChunkReader::new();
        let mut writer = ChunkWriter::new(false, 128);
        let wire = writer.export(&RtmpHeader::video(0, 200, 1), &vec![0u8; 200]).unwrap();
        // first chunk only
        assert_eq!(reader.import(&wire).unwrap().consumed, 12 + 128);
        reader.abort(6);

        // continuation now starts a fresh message from the previous header, which does not exist
        assert!(reader.import(&wire[140..]).is_err());
    }
}
