use crate::connection::NetEvent;
use crate::processing::{Frame, MediaInfo};
use crate::server::config::ServerConfig;
use crate::server::publish_object::{IngestEvent, StreamingInfo};
use crate::server::registry::StreamRegistry;
use crate::server::relay::MediaRelay;
use crate::server::service::PublishService;
use crate::Result;
use async_trait::async_trait;
use log::{debug, error, info, warn};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// RTMP ingest server: accepts publishers, tracks their stream paths and
/// hands bootstrapped media to an optional relay
pub struct RtmpServer {
    /// Server configuration
    config: Arc<ServerConfig>,

    /// Accepted publishers
    publishers: PublishService,

    /// Live stream paths
    registry: StreamRegistry,

    relay: Option<Arc<dyn MediaRelay>>,

    /// Periodic info logger
    info_task: Mutex<Option<JoinHandle<()>>>,

    self_ref: Weak<RtmpServer>,
}

impl RtmpServer {
    /// Create new server without a relay
    pub fn new(config: ServerConfig) -> Arc<Self> {
        Self::build(config, None)
    }

    /// Create new server forwarding media to `relay`
    pub fn with_relay(config: ServerConfig, relay: Arc<dyn MediaRelay>) -> Arc<Self> {
        Self::build(config, Some(relay))
    }

    fn build(config: ServerConfig, relay: Option<Arc<dyn MediaRelay>>) -> Arc<Self> {
        let config = Arc::new(config);

        Arc::new_cyclic(|self_ref: &Weak<RtmpServer>| {
            let net_event: Weak<dyn NetEvent> = self_ref.clone();
            RtmpServer {
                publishers: PublishService::new(Arc::clone(&config), net_event),
                config,
                registry: StreamRegistry::new(),
                relay,
                info_task: Mutex::new(None),
                self_ref: self_ref.clone(),
            }
        })
    }

    /// Get server configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn registry(&self) -> &StreamRegistry {
        &self.registry
    }

    pub fn publishers(&self) -> &PublishService {
        &self.publishers
    }

    /// Bind and start accepting; returns the bound address.
    ///
    /// Must be called from within a tokio runtime.
    pub fn listen(&self) -> Result<SocketAddr> {
        let addr = self.publishers.create()?;
        info!("RTMP server listening on {}", addr);

        if !self.config.info_interval.is_zero() {
            let server = self.self_ref.clone();
            let interval = self.config.info_interval;
            let task = tokio::spawn(async move {
                loop {
                    tokio::time::sleep(interval).await;
                    let Some(server) = server.upgrade() else {
                        break;
                    };
                    server.log_info();
                }
            });

            if let Some(previous) = lock(&self.info_task).replace(task) {
                previous.abort();
            }
        }

        Ok(addr)
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.publishers.manager().local_addr()
    }

    /// Get active connections count
    pub fn connection_count(&self) -> usize {
        self.publishers.count()
    }

    /// Snapshot of live publishers; leaves traffic windows untouched
    pub fn current_streaming_info(&self) -> Vec<StreamingInfo> {
        self.publishers.current_streaming_info(false)
    }

    /// Stop accepting, close every publisher and end every live stream
    pub fn shutdown(&self) {
        info!("Shutting down server...");

        if let Some(task) = lock(&self.info_task).take() {
            task.abort();
        }
        self.publishers.post_release();

        for publisher in self.registry.clear() {
            info!(
                "Stream end - path({}) index({}) uptime({}ms)",
                publisher.path,
                publisher.index,
                publisher.uptime_millis()
            );
            if let Some(relay) = &self.relay {
                relay.on_stream_end(&publisher.path);
            }
        }
    }

    /// Every traffic window restarts here, once per tick
    fn log_info(&self) {
        let streams = self.publishers.current_streaming_info(false);
        let rate = self.publishers.total_traffic_rate(true);
        info!(
            "Server info - connections({}) streams({}) send({}bps) recv({}bps)",
            self.publishers.count(),
            self.registry.count(),
            rate.send_bps,
            rate.recv_bps
        );

        for stream in streams {
            info!(
                "Streaming info - path({}) ip({}) send({}bps) recv({}bps) video({}/{:.2}fps) audio({}/{:.2}fps)",
                stream.path,
                stream.ip,
                stream.send_traffic,
                stream.recv_traffic,
                stream.last_video_timestamp,
                stream.video_fps,
                stream.last_audio_timestamp,
                stream.audio_fps
            );
        }
    }
}

#[async_trait]
impl NetEvent for RtmpServer {
    async fn on_accepted(&self, object_key: i32, stream: TcpStream, ip: String, port: u16) -> bool {
        let event: Weak<dyn IngestEvent> = self.self_ref.clone();
        match self.publishers.accepted_add(stream, event) {
            Ok(index) => {
                info!("Accepted - object({}) index({}) address({}:{})", object_key, index, ip, port);
                true
            }
            Err(e) => {
                warn!("Accept rejected - object({}) address({}:{}) error({})", object_key, ip, port, e);
                false
            }
        }
    }

    async fn on_closed(&self, object_key: i32, index: i32, ip: &str, port: u16) {
        let path = self.publishers.stream_path(index);
        self.publishers.remove(index);

        info!("Closed - object({}) index({}) address({}:{})", object_key, index, ip, port);

        let Some(path) = path else {
            return;
        };
        if let Some(publisher) = self.registry.unregister(&path, index) {
            info!("Stream end - path({}) index({}) uptime({}ms)", path, index, publisher.uptime_millis());
            if let Some(relay) = &self.relay {
                relay.on_stream_end(&path);
            }
        }
    }
}

impl IngestEvent for RtmpServer {
    fn on_publish_start(&self, index: i32, path: &str) -> bool {
        match self.registry.register(path, index) {
            Ok(()) => true,
            Err(e) => {
                warn!("Publish rejected - index({}) error({})", index, e);
                false
            }
        }
    }

    fn on_publish_ready(&self, index: i32, path: &str, app: &str, key: &str, media_info: Arc<MediaInfo>) -> bool {
        if let Err(e) = self.registry.set_ready(path, Arc::clone(&media_info)) {
            error!("Stream ready - index({}) error({})", index, e);
            return false;
        }

        info!("Stream ready - index({}) path({}) {}", index, path, media_info);
        match &self.relay {
            Some(relay) => relay.on_stream_ready(path, app, key, media_info),
            None => true,
        }
    }

    fn on_publish_data(&self, index: i32, path: &str, frame: Arc<Frame>, is_video: bool) -> bool {
        let Some(relay) = &self.relay else {
            return true;
        };

        let accepted = relay.on_stream_data(path, frame, is_video);
        if !accepted {
            debug!("Relay refused data - index({}) path({})", index, path);
        }
        accepted
    }
}
