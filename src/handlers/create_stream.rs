use crate::handlers::CommandHandler;
use crate::protocol::{RtmpCommand, RtmpHeader, CMD_CREATE_STREAM};
use crate::stream::{PublishSession, StreamEvent};
use crate::Result;

/// Message stream id handed to every publisher
const PUBLISH_STREAM_ID: u32 = 1;

pub struct CreateStreamHandler;

impl CreateStreamHandler {
    pub fn new() -> Self {
        CreateStreamHandler
    }
}

impl CommandHandler for CreateStreamHandler {
    fn command_name(&self) -> &str {
        CMD_CREATE_STREAM
    }

    fn handle(
        &self,
        session: &mut PublishSession,
        events: &dyn StreamEvent,
        header: &RtmpHeader,
        command: &RtmpCommand,
    ) -> Result<()> {
        session.stream_id = PUBLISH_STREAM_ID;

        let response = RtmpCommand::create_stream_result(command.transaction_id, PUBLISH_STREAM_ID);
        session.send_command(header.chunk_stream_id, 0, &response, events)
    }
}
