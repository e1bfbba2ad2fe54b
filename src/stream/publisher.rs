use crate::amf::Amf0Document;
use crate::chunk::{ChunkReader, ChunkWriter};
use crate::handlers::CommandHandlerRegistry;
use crate::handshake::{Handshake, HandshakeState};
use crate::message::{ControlType, MessageType};
use crate::processing::{
    is_avc_sequence_header, parse_audio_config, parse_avc_sequence_header, Frame, MediaInfo, MetaInfo,
};
use crate::protocol::constants::*;
use crate::protocol::{create_ack_packet, read_control_u32, RtmpCommand, RtmpHeader, RtmpPacket};
use crate::stream::StreamEvent;
use crate::{Error, Result};
use log::{debug, error, info, warn};
use std::sync::Arc;

/// Per-session protocol settings taken from the server config
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Outbound chunk size announced after connect
    pub chunk_size: usize,
    pub window_ack_size: u32,
    pub peer_bandwidth: u32,
    pub compress_header: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        SessionSettings {
            chunk_size: 4096,
            window_ack_size: DEFAULT_WINDOW_SIZE,
            peer_bandwidth: DEFAULT_PEER_BANDWIDTH,
            compress_header: true,
        }
    }
}

/// Publish-side protocol state for one connection.
///
/// Bytes go through the handshake until it completes, then through chunk
/// import; each reassembled message is dispatched by type. Only one thread
/// drives a session at a time, so nothing here locks.
pub struct PublishSession {
    pub(crate) settings: SessionSettings,
    pub(crate) handshake: Handshake,
    pub(crate) reader: ChunkReader,
    pub(crate) writer: ChunkWriter,
    handlers: Arc<CommandHandlerRegistry>,

    pub(crate) app: String,
    pub(crate) key: String,
    pub(crate) path: String,
    pub(crate) stream_id: u32,
    pub(crate) client_id: f64,
    pub(crate) publishing: bool,

    media_info: MediaInfo,
    ready_notified: bool,

    /// Half the peer's window; an Ack goes out once the tally passes it
    ack_size: u64,
    ack_traffic: u64,

    last_audio_timestamp: u32,
    last_video_timestamp: u32,
}

impl PublishSession {
    /// Create new session with the default command handlers
    pub fn new(settings: SessionSettings) -> Self {
        Self::with_handlers(settings, Arc::new(CommandHandlerRegistry::new()))
    }

    pub fn with_handlers(settings: SessionSettings, handlers: Arc<CommandHandlerRegistry>) -> Self {
        let writer = ChunkWriter::new(settings.compress_header, DEFAULT_CHUNK_SIZE as usize);
        let ack_size = settings.window_ack_size as u64 / 2;
        PublishSession {
            settings,
            handshake: Handshake::new(),
            reader: ChunkReader::new(),
            writer,
            handlers,
            app: String::new(),
            key: String::new(),
            path: String::new(),
            stream_id: 0,
            client_id: DEFAULT_CLIENT_ID,
            publishing: false,
            media_info: MediaInfo::new(),
            ready_notified: false,
            ack_size,
            ack_traffic: 0,
            last_audio_timestamp: 0,
            last_video_timestamp: 0,
        }
    }

    pub fn app(&self) -> &str {
        &self.app
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// `app/key` once publish named them
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn stream_id(&self) -> u32 {
        self.stream_id
    }

    pub fn is_publishing(&self) -> bool {
        self.publishing
    }

    pub fn is_ready(&self) -> bool {
        self.ready_notified
    }

    pub fn handshake_state(&self) -> HandshakeState {
        self.handshake.state()
    }

    pub fn media_info(&self) -> &MediaInfo {
        &self.media_info
    }

    pub fn last_audio_timestamp(&self) -> u32 {
        self.last_audio_timestamp
    }

    pub fn last_video_timestamp(&self) -> u32 {
        self.last_video_timestamp
    }

    /// Consume buffered input.
    ///
    /// Returns the number of bytes used; 0 means wait for more. An `Err`
    /// is terminal for the connection.
    pub fn recv_handler(&mut self, data: &[u8], events: &dyn StreamEvent) -> Result<usize> {
        if data.len() > MAX_PACKET_SIZE {
            return Err(Error::protocol(format!(
                "Receive buffer of {} bytes exceeds limit - stream({})",
                data.len(),
                self.path
            )));
        }

        if self.handshake.is_complete() {
            return self.recv_chunk(data, events);
        }

        let step = self.handshake.process(data)?;
        if let Some(response) = step.response {
            if !events.stream_send_data(response) {
                return Err(Error::connection("Handshake response send failed"));
            }
        }

        // chunks pipelined behind C2
        if self.handshake.is_complete() && step.consumed < data.len() {
            return Ok(step.consumed + self.recv_chunk(&data[step.consumed..], events)?);
        }
        Ok(step.consumed)
    }

    fn recv_chunk(&mut self, data: &[u8], events: &dyn StreamEvent) -> Result<usize> {
        let mut processed = 0;

        while processed < data.len() {
            let status = self.reader.import(&data[processed..]).inspect_err(|e| {
                error!("Chunk import failed - stream({}) error({})", self.path, e);
            })?;
            if status.consumed == 0 {
                break;
            }
            processed += status.consumed;

            if status.completed {
                self.process_messages(events)?;
            }
        }

        self.ack_traffic += processed as u64;
        if self.ack_size > 0 && self.ack_traffic > self.ack_size {
            let packet = create_ack_packet(self.ack_traffic as u32);
            self.send_packet(&packet, events)?;
            self.ack_traffic = 0;
        }

        Ok(processed)
    }

    fn process_messages(&mut self, events: &dyn StreamEvent) -> Result<()> {
        while let Some(packet) = self.reader.pop_message() {
            self.dispatch(packet, events)?;
        }
        Ok(())
    }

    fn dispatch(&mut self, packet: RtmpPacket, events: &dyn StreamEvent) -> Result<()> {
        let RtmpPacket { header, payload } = packet;

        match MessageType::from_id(header.message_type) {
            MessageType::Audio => self.on_audio(&header, payload, events),
            MessageType::Video => self.on_video(&header, payload, events),
            MessageType::Command => self.on_command(&header, &payload, events),
            MessageType::Data => {
                self.on_data(&payload);
                Ok(())
            }
            MessageType::Control(control) => self.on_control(control, &payload),
            MessageType::UserControl => {
                debug!("User control message - stream({}) len({})", self.path, payload.len());
                Ok(())
            }
            other => {
                warn!("Unknown message type - stream({}) type({:?})", self.path, other);
                Ok(())
            }
        }
    }

    fn on_control(&mut self, control: ControlType, payload: &[u8]) -> Result<()> {
        match control {
            ControlType::SetChunkSize => {
                let size = read_control_u32(payload)? & MAX_CHUNK_SIZE;
                if size == 0 {
                    return Err(Error::protocol(format!("Invalid chunk size 0 - stream({})", self.path)));
                }
                info!("Set receive chunk - stream({}) size({})", self.path, size);
                self.reader.set_chunk_size(size as usize);
            }
            ControlType::Abort => {
                let cs_id = read_control_u32(payload)?;
                self.reader.abort(cs_id);
            }
            ControlType::WindowAcknowledgement => {
                let window = read_control_u32(payload)?;
                if window != 0 {
                    self.ack_size = window as u64 / 2;
                    self.ack_traffic = 0;
                }
            }
            ControlType::Acknowledgement | ControlType::SetPeerBandwidth => {
                debug!("Control {:?} - stream({})", control, self.path);
            }
        }
        Ok(())
    }

    fn on_command(&mut self, header: &RtmpHeader, payload: &[u8], events: &dyn StreamEvent) -> Result<()> {
        let command = RtmpCommand::decode(payload)?;
        debug!("Command - stream({}) name({}) tid({})", self.path, command.name, command.transaction_id);

        let handlers = Arc::clone(&self.handlers);
        handlers.handle(self, events, header, &command)
    }

    fn on_data(&mut self, payload: &[u8]) {
        let document = Amf0Document::decode(payload);
        if document.is_empty() {
            warn!("Empty amf0 data message - stream({})", self.path);
            return;
        }

        let is_metadata = document.get_string(0) == Some(DATA_SET_DATA_FRAME)
            && document.get_string(1) == Some(DATA_ON_METADATA);
        if !is_metadata {
            warn!(
                "Unknown amf0 data message - stream({}) message({})",
                self.path,
                document.get_string(0).unwrap_or_default()
            );
            return;
        }

        match document.get(2).and_then(MetaInfo::from_amf) {
            Some(meta) => {
                info!(
                    "Metadata - stream({}) encoder({}) fps({}) {}x{} video({}) audio({})",
                    self.path,
                    meta.encoder,
                    meta.video_fps,
                    meta.video_width,
                    meta.video_height,
                    meta.video_bps,
                    meta.audio_bps
                );
                self.media_info.meta_info = Some(meta);
                self.media_info.metadata = Some(document);
            }
            None => warn!("Metadata without object - stream({})", self.path),
        }
    }

    fn on_audio(&mut self, header: &RtmpHeader, payload: Vec<u8>, events: &dyn StreamEvent) -> Result<()> {
        self.last_audio_timestamp = header.timestamp;

        if payload.len() < AUDIO_DATA_MIN_SIZE {
            return Err(Error::protocol(format!(
                "Audio size fail - stream({}) size({})",
                self.path,
                payload.len()
            )));
        }
        if !self.publishing {
            debug!("Audio before publish dropped - size({})", payload.len());
            return Ok(());
        }

        if self.media_info.audio.is_none() && payload[1] == 0 {
            let config = parse_audio_config(&payload).inspect_err(|e| {
                error!("Audio config parse fail - stream({}) error({})", self.path, e);
            })?;
            info!(
                "Audio config - stream({}) codec({}) rate({}) channels({}) profile({})",
                self.path, config.codec_name, config.sample_rate, config.channels, config.profile_name
            );
            self.media_info.audio = Some(config);
            self.media_info.audio_seq_header = Some(payload);
            return self.check_stream_ready(events);
        }

        if self.media_info.audio.is_none() {
            return Ok(());
        }

        let frame = Arc::new(Frame::new(header.timestamp, payload, false));
        if !events.on_stream_data(frame, false) {
            return Err(Error::rejected(format!("Audio frame refused - stream({})", self.path)));
        }
        Ok(())
    }

    fn on_video(&mut self, header: &RtmpHeader, payload: Vec<u8>, events: &dyn StreamEvent) -> Result<()> {
        self.last_video_timestamp = header.timestamp;

        if payload.len() <= VIDEO_DATA_MIN_SIZE {
            warn!("Video size fail - stream({}) size({})", self.path, payload.len());
            return Ok(());
        }
        if !self.publishing {
            debug!("Video before publish dropped - size({})", payload.len());
            return Ok(());
        }

        if self.media_info.video.is_none() && payload[1] == 0 {
            if !is_avc_sequence_header(&payload) {
                return Err(Error::protocol(format!(
                    "Video codec fail - stream({}) codec({})",
                    self.path,
                    payload[0] & 0x0F
                )));
            }
            let config = parse_avc_sequence_header(&payload).inspect_err(|e| {
                error!("Video config parse fail - stream({}) error({})", self.path, e);
            })?;
            info!(
                "Video config - stream({}) profile({}) level({}) {}x{}",
                self.path,
                config.profile,
                config.level_string(),
                config.width,
                config.height
            );
            self.media_info.video = Some(config);
            self.media_info.video_seq_header = Some(payload);
            return self.check_stream_ready(events);
        }

        if self.media_info.video.is_none() {
            return Ok(());
        }

        let frame = Arc::new(Frame::new(header.timestamp, payload, true));
        if !events.on_stream_data(frame, true) {
            return Err(Error::rejected(format!("Video frame refused - stream({})", self.path)));
        }
        Ok(())
    }

    fn check_stream_ready(&mut self, events: &dyn StreamEvent) -> Result<()> {
        if self.ready_notified || !self.media_info.is_ready() {
            return Ok(());
        }
        self.ready_notified = true;

        info!("Stream ready - stream({}) {}", self.path, self.media_info);
        let media_info = Arc::new(self.media_info.clone());
        if !events.on_stream_ready(&self.app, &self.key, media_info) {
            return Err(Error::rejected(format!("Stream ready refused - stream({})", self.path)));
        }
        Ok(())
    }

    /// Export one message through the chunk writer and queue it
    pub(crate) fn send_message(&mut self, header: &RtmpHeader, payload: &[u8], events: &dyn StreamEvent) -> Result<()> {
        let bytes = self.writer.export(header, payload)?;
        if !events.stream_send_data(bytes) {
            return Err(Error::connection(format!("Send failed - stream({})", self.path)));
        }
        Ok(())
    }

    pub(crate) fn send_packet(&mut self, packet: &RtmpPacket, events: &dyn StreamEvent) -> Result<()> {
        self.send_message(&packet.header, &packet.payload, events)
    }

    pub(crate) fn send_command(
        &mut self,
        chunk_stream_id: u32,
        stream_id: u32,
        command: &RtmpCommand,
        events: &dyn StreamEvent,
    ) -> Result<()> {
        let body = command.encode()?;
        let header = RtmpHeader::new(0, body.len() as u32, MSG_TYPE_COMMAND_AMF0, stream_id, chunk_stream_id);
        self.send_message(&header, &body, events)
    }
}
