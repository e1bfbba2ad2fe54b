mod connect;
mod create_stream;
mod fc_publish;
mod publish;
mod delete_stream;
mod noop;

use crate::handlers::connect::ConnectHandler;
use crate::handlers::create_stream::CreateStreamHandler;
use crate::handlers::delete_stream::DeleteStreamHandler;
use crate::handlers::fc_publish::FcPublishHandler;
use crate::handlers::noop::NoopHandler;
use crate::handlers::publish::PublishHandler;
use crate::protocol::{RtmpCommand, RtmpHeader, CMD_PING, CMD_RELEASE_STREAM};
use crate::stream::{PublishSession, StreamEvent};
use crate::Result;
use log::warn;
use std::collections::HashMap;
use std::sync::Arc;

/// Handles one AMF0 command on a publish session.
///
/// Replies go out through the session; an `Err` closes the connection.
pub trait CommandHandler: Send + Sync {
    /// Get command name this handler processes
    fn command_name(&self) -> &str;

    /// Handle the command
    fn handle(
        &self,
        session: &mut PublishSession,
        events: &dyn StreamEvent,
        header: &RtmpHeader,
        command: &RtmpCommand,
    ) -> Result<()>;

    /// Check if can handle command
    fn can_handle(&self, command_name: &str) -> bool {
        self.command_name() == command_name
    }
}

/// Command handler registry
pub struct CommandHandlerRegistry {
    handlers: HashMap<String, Arc<dyn CommandHandler>>,
}

impl CommandHandlerRegistry {
    pub fn new() -> Self {
        let mut registry = CommandHandlerRegistry {
            handlers: HashMap::new(),
        };

        // Register default handlers
        registry.register(Arc::new(ConnectHandler::new()));
        registry.register(Arc::new(CreateStreamHandler::new()));
        registry.register(Arc::new(FcPublishHandler::new()));
        registry.register(Arc::new(PublishHandler::new()));
        registry.register(Arc::new(DeleteStreamHandler::new()));
        registry.register(Arc::new(NoopHandler::new(CMD_RELEASE_STREAM)));
        registry.register(Arc::new(NoopHandler::new(CMD_PING)));

        registry
    }

    pub fn register(&mut self, handler: Arc<dyn CommandHandler>) {
        self.handlers.insert(handler.command_name().to_string(), handler);
    }

    pub fn contains(&self, command_name: &str) -> bool {
        self.handlers.contains_key(command_name)
    }

    /// Dispatch by command name; unknown commands are logged and ignored
    pub fn handle(
        &self,
        session: &mut PublishSession,
        events: &dyn StreamEvent,
        header: &RtmpHeader,
        command: &RtmpCommand,
    ) -> Result<()> {
        match self.handlers.get(&command.name) {
            Some(handler) => handler.handle(session, events, header, command),
            None => {
                warn!(
                    "Unknown amf0 command - stream({}) command({}:{:.1})",
                    session.path(),
                    command.name,
                    command.transaction_id
                );
                Ok(())
            }
        }
    }
}

impl Default for CommandHandlerRegistry {
    fn default() -> Self {
        CommandHandlerRegistry::new()
    }
}
