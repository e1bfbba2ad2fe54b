use crate::handlers::CommandHandler;
use crate::protocol::constants::*;
use crate::protocol::{
    create_chunk_size_packet, create_peer_bandwidth_packet, create_stream_begin_packet, create_window_ack_packet,
    RtmpCommand, RtmpHeader,
};
use crate::stream::{PublishSession, StreamEvent};
use crate::Result;
use log::debug;

pub struct ConnectHandler;

impl ConnectHandler {
    pub fn new() -> Self {
        ConnectHandler
    }

    /// Chunk size, window, bandwidth and stream begin, in that order
    fn send_server_bandwidth(&self, session: &mut PublishSession, events: &dyn StreamEvent) -> Result<()> {
        let chunk_size = session.settings.chunk_size;
        if chunk_size != DEFAULT_CHUNK_SIZE as usize {
            session.send_packet(&create_chunk_size_packet(chunk_size as u32), events)?;
            session.writer.set_chunk_size(chunk_size);
        }

        let window = session.settings.window_ack_size;
        session.send_packet(&create_window_ack_packet(window), events)?;

        let bandwidth = session.settings.peer_bandwidth;
        session.send_packet(&create_peer_bandwidth_packet(bandwidth, PEER_BW_LIMIT_DYNAMIC), events)?;

        let stream_id = session.stream_id;
        session.send_packet(&create_stream_begin_packet(stream_id), events)
    }
}

impl CommandHandler for ConnectHandler {
    fn command_name(&self) -> &str {
        CMD_CONNECT
    }

    fn handle(
        &self,
        session: &mut PublishSession,
        events: &dyn StreamEvent,
        header: &RtmpHeader,
        command: &RtmpCommand,
    ) -> Result<()> {
        let mut object_encoding = 0.0;

        if let Some(params) = command.command_object.as_ref().and_then(|v| v.as_object()) {
            if let Some(encoding) = params.get_number("objectEncoding") {
                object_encoding = encoding;
            }
            if let Some(app) = params.get_string("app") {
                session.app = app.to_string();
            }
            debug!(
                "connect - app({}) tcUrl({}) flashVer({})",
                session.app,
                params.get_string("tcUrl").unwrap_or_default(),
                params.get_string("flashVer").unwrap_or_default()
            );
        }

        self.send_server_bandwidth(session, events)?;

        let result = RtmpCommand::connect_result(command.transaction_id, object_encoding, session.client_id);
        let stream_id = session.stream_id;
        session.send_command(header.chunk_stream_id, stream_id, &result, events)
    }
}
