use crate::handlers::CommandHandler;
use crate::protocol::{RtmpCommand, RtmpHeader};
use crate::stream::{PublishSession, StreamEvent};
use crate::Result;
use log::trace;

/// Accepts a command without replying (releaseStream, ping)
pub struct NoopHandler {
    name: &'static str,
}

impl NoopHandler {
    pub fn new(name: &'static str) -> Self {
        NoopHandler { name }
    }
}

impl CommandHandler for NoopHandler {
    fn command_name(&self) -> &str {
        self.name
    }

    fn handle(
        &self,
        session: &mut PublishSession,
        _events: &dyn StreamEvent,
        _header: &RtmpHeader,
        command: &RtmpCommand,
    ) -> Result<()> {
        trace!("{} - stream({}) tid({})", command.name, session.path(), command.transaction_id);
        Ok(())
    }
}
