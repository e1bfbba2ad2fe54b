use crate::handlers::CommandHandler;
use crate::protocol::constants::*;
use crate::protocol::{create_stream_begin_packet, RtmpCommand, RtmpHeader};
use crate::stream::{PublishSession, StreamEvent};
use crate::Result;
use log::{error, info, warn};

pub struct PublishHandler;

impl PublishHandler {
    pub fn new() -> Self {
        PublishHandler
    }

    fn reject(
        &self,
        session: &mut PublishSession,
        events: &dyn StreamEvent,
        header: &RtmpHeader,
    ) -> Result<()> {
        let status = RtmpCommand::on_status(
            LEVEL_ERROR,
            CODE_PUBLISH_REJECTED,
            "Authentication Failed.",
            session.client_id,
        );
        let stream_id = session.stream_id;
        session.send_command(header.chunk_stream_id, stream_id, &status, events)
    }
}

impl CommandHandler for PublishHandler {
    fn command_name(&self) -> &str {
        CMD_PUBLISH
    }

    fn handle(
        &self,
        session: &mut PublishSession,
        events: &dyn StreamEvent,
        header: &RtmpHeader,
        command: &RtmpCommand,
    ) -> Result<()> {
        if session.publishing {
            warn!("publish - already publishing - stream({})", session.path);
            return Ok(());
        }

        // the argument after the key names the app when connect carried none
        if session.app.is_empty() {
            if let Some(app) = command.string_argument(1) {
                session.app = app.to_string();
            }
        }

        let key = match command.string_argument(0) {
            Some(key) if !key.is_empty() && !session.app.is_empty() => key.to_string(),
            _ => {
                error!("publish - stream name empty - app({})", session.app);
                return self.reject(session, events, header);
            }
        };

        session.key = key;
        session.path = format!("{}/{}", session.app, session.key);

        if !events.on_stream_start(&session.path) {
            error!("publish - start rejected - stream({})", session.path);
            return self.reject(session, events, header);
        }

        session.publishing = true;
        info!("publish - start - stream({})", session.path);

        let stream_id = session.stream_id;
        session.send_packet(&create_stream_begin_packet(stream_id), events)?;

        let status = RtmpCommand::on_status(LEVEL_STATUS, CODE_PUBLISH_START, "Publishing", session.client_id);
        session.send_command(header.chunk_stream_id, stream_id, &status, events)
    }
}
