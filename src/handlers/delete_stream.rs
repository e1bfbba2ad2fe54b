use crate::handlers::CommandHandler;
use crate::protocol::{RtmpCommand, RtmpHeader, CMD_DELETE_STREAM};
use crate::stream::{PublishSession, StreamEvent};
use crate::Result;
use log::info;

pub struct DeleteStreamHandler;

impl DeleteStreamHandler {
    pub fn new() -> Self {
        DeleteStreamHandler
    }
}

impl CommandHandler for DeleteStreamHandler {
    fn command_name(&self) -> &str {
        CMD_DELETE_STREAM
    }

    fn handle(
        &self,
        session: &mut PublishSession,
        _events: &dyn StreamEvent,
        _header: &RtmpHeader,
        command: &RtmpCommand,
    ) -> Result<()> {
        info!(
            "deleteStream - stream({}) id({})",
            session.path(),
            command.argument(0).and_then(|v| v.as_number()).unwrap_or_default()
        );
        Ok(())
    }
}
