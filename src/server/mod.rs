mod config;
mod publish_object;
mod registry;
mod relay;
mod server;
mod service;

pub use config::{ServerConfig, ServerConfigBuilder};
pub use publish_object::{IngestEvent, PublishObject, StreamingInfo};
pub use registry::*;
pub use relay::MediaRelay;
pub use server::RtmpServer;
pub use service::{PublishService, PUBLISH_OBJECT_KEY};
