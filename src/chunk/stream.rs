use crate::protocol::RtmpHeader;

/// Per chunk-stream-id import state
#[derive(Debug, Clone, Default)]
pub struct ChunkStreamContext {
    /// Header of the last completed message; base for format 1-3 chunks
    pub prev_header: Option<RtmpHeader>,

    /// Timestamp delta applied by a format 3 chunk that starts a new message
    pub timestamp_delta: u32,

    /// Whether the last 0-2 header carried an extended timestamp
    pub extended: bool,

    /// Header of the message being assembled
    pub current_header: Option<RtmpHeader>,

    /// Partial message being assembled
    pub message_buffer: Vec<u8>,
}

impl ChunkStreamContext {
    /// Create new chunk stream context
    pub fn new() -> Self {
        ChunkStreamContext::default()
    }

    /// Check if currently assembling a message
    pub fn is_assembling(&self) -> bool {
        self.current_header.is_some()
    }

    /// Bytes still missing from the message being assembled
    pub fn bytes_remaining(&self) -> usize {
        self.current_header
            .map(|h| (h.message_length as usize).saturating_sub(self.message_buffer.len()))
            .unwrap_or(0)
    }

    /// Start new message
    pub fn start_message(&mut self, header: RtmpHeader) {
        self.current_header = Some(header);
        self.message_buffer.clear();
        self.message_buffer.reserve(header.message_length as usize);
    }

    /// Drop a partially assembled message (abort or header restart)
    pub fn discard_partial(&mut self) {
        self.current_header = None;
        self.message_buffer.clear();
    }

    /// Close the current message and remember its header for later deltas
    pub fn finish_message(&mut self) -> Option<(RtmpHeader, Vec<u8>)> {
        let header = self.current_header.take()?;
        let base = self.prev_header.map(|h| h.timestamp).unwrap_or(0);
        self.timestamp_delta = header.timestamp.wrapping_sub(base);
        self.prev_header = Some(header);
        Some((header, std::mem::take(&mut self.message_buffer)))
    }
}

/// Per chunk-stream-id export state
#[derive(Debug, Clone, Copy)]
pub struct ExportContext {
    pub prev_header: RtmpHeader,
}
