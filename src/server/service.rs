use crate::connection::{ConnectionManager, NetEvent, NetTcpParam, TrafficRate};
use crate::server::config::ServerConfig;
use crate::server::publish_object::{IngestEvent, PublishObject, StreamingInfo};
use crate::{Error, Result};
use std::net::SocketAddr;
use std::sync::{Arc, Weak};
use tokio::net::TcpStream;

pub const PUBLISH_OBJECT_KEY: i32 = 1;
const PUBLISH_OBJECT_NAME: &str = "publish";

/// Accepted publishers and their listener
pub struct PublishService {
    config: Arc<ServerConfig>,
    manager: ConnectionManager<PublishObject>,
}

impl PublishService {
    /// Create new service; call `create` to start listening
    pub fn new(config: Arc<ServerConfig>, net_event: Weak<dyn NetEvent>) -> Self {
        PublishService {
            config,
            manager: ConnectionManager::new(PUBLISH_OBJECT_KEY, PUBLISH_OBJECT_NAME, net_event),
        }
    }

    pub fn create(&self) -> Result<SocketAddr> {
        self.manager.create(&self.config.listen_addr())
    }

    /// Wrap and register an accepted socket; returns its index
    pub fn accepted_add(&self, stream: TcpStream, event: Weak<dyn IngestEvent>) -> Result<i32> {
        if self.manager.count() >= self.config.max_connections {
            return Err(Error::rejected(format!(
                "Connection limit reached ({})",
                self.config.max_connections
            )));
        }

        let param = NetTcpParam {
            object_key: PUBLISH_OBJECT_KEY,
            object_name: PUBLISH_OBJECT_NAME.to_string(),
            stream,
            net_event: self.manager.net_event(),
            options: self.config.connection_options(),
        };
        let object = PublishObject::new(param, self.config.session_settings(), event)?;

        self.manager.insert(object, Some(self.config.recv_timeout))
    }

    /// Accepted stream path of the publisher at `index`
    pub fn stream_path(&self, index: i32) -> Option<String> {
        self.manager
            .find(index)
            .map(|object| object.stream_path())
            .filter(|path| !path.is_empty())
    }

    pub fn remove(&self, index: i32) -> bool {
        self.manager.remove(index)
    }

    pub fn count(&self) -> usize {
        self.manager.count()
    }

    pub fn current_streaming_info(&self, init: bool) -> Vec<StreamingInfo> {
        self.manager
            .objects()
            .into_iter()
            .filter(|(_, object)| object.is_publishing())
            .map(|(_, object)| object.streaming_info(init))
            .collect()
    }

    pub fn total_traffic_rate(&self, init: bool) -> TrafficRate {
        self.manager.total_traffic_rate(init)
    }

    /// Pacing hint for relays writing towards the publisher at `index`
    pub fn qos_send_wait_time(&self, index: i32) -> u64 {
        self.manager.qos_send_wait_time(index, &self.config.qos_params())
    }

    pub fn manager(&self) -> &ConnectionManager<PublishObject> {
        &self.manager
    }

    pub fn post_release(&self) {
        self.manager.post_release();
    }
}
