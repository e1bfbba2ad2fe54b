use crate::handlers::CommandHandler;
use crate::protocol::{RtmpCommand, RtmpHeader, CMD_FC_PUBLISH};
use crate::stream::{PublishSession, StreamEvent};
use crate::Result;

pub struct FcPublishHandler;

impl FcPublishHandler {
    pub fn new() -> Self {
        FcPublishHandler
    }
}

impl CommandHandler for FcPublishHandler {
    fn command_name(&self) -> &str {
        CMD_FC_PUBLISH
    }

    fn handle(
        &self,
        session: &mut PublishSession,
        events: &dyn StreamEvent,
        header: &RtmpHeader,
        _command: &RtmpCommand,
    ) -> Result<()> {
        let response = RtmpCommand::on_fc_publish(session.client_id);
        let stream_id = session.stream_id;
        session.send_command(header.chunk_stream_id, stream_id, &response, events)
    }
}
