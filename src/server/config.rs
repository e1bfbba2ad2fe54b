use crate::connection::{ConnectionOptions, QosParams};
use crate::protocol::{DEFAULT_CHUNK_SIZE, DEFAULT_PEER_BANDWIDTH, DEFAULT_WINDOW_SIZE};
use crate::stream::SessionSettings;
use crate::{Error, Result};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host to bind
    pub host: String,

    /// Port to bind
    pub port: u16,

    /// Maximum connections
    pub max_connections: usize,

    /// Outbound chunk size announced after connect
    pub chunk_size: u32,

    /// Window acknowledgement size
    pub window_ack_size: u32,

    /// Peer bandwidth
    pub peer_bandwidth: u32,

    /// Use compact chunk headers on export
    pub compress_header: bool,

    /// Close publishers that send nothing for this long
    pub recv_timeout: Duration,

    pub recv_buffer_size: usize,

    /// Delay between `post_close` and the actual close
    pub post_close_delay: Duration,

    /// Periodic info log interval; zero disables it
    pub info_interval: Duration,

    pub qos_check_buffer_size: usize,
    pub qos_max_wait_ms: u64,
    pub qos_wait_per_mega_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let qos = QosParams::default();
        ServerConfig {
            host: "0.0.0.0".to_string(),
            port: 1935,
            max_connections: 1000,
            chunk_size: 4096,
            window_ack_size: DEFAULT_WINDOW_SIZE,
            peer_bandwidth: DEFAULT_PEER_BANDWIDTH,
            compress_header: true,
            recv_timeout: Duration::from_secs(5),
            recv_buffer_size: 8192,
            post_close_delay: Duration::from_millis(1),
            info_interval: Duration::from_secs(30),
            qos_check_buffer_size: qos.check_buffer_size,
            qos_max_wait_ms: qos.max_wait_ms,
            qos_wait_per_mega_ms: qos.wait_per_mega_ms,
        }
    }
}

impl ServerConfig {
    /// Create config builder
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::new()
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.host.is_empty() {
            return Err(Error::config("Host must not be empty"));
        }

        if self.port == 0 {
            return Err(Error::config("Invalid port: 0"));
        }

        if self.max_connections == 0 {
            return Err(Error::config("Invalid max_connections: 0"));
        }

        if self.chunk_size < DEFAULT_CHUNK_SIZE {
            return Err(Error::config("Chunk size must be at least 128"));
        }

        if self.chunk_size > 65536 {
            return Err(Error::config("Chunk size must not exceed 65536"));
        }

        if self.window_ack_size == 0 || self.peer_bandwidth == 0 {
            return Err(Error::config("Window and peer bandwidth must be positive"));
        }

        if self.recv_buffer_size == 0 {
            return Err(Error::config("Invalid recv_buffer_size: 0"));
        }

        Ok(())
    }

    /// "host:port"
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            chunk_size: self.chunk_size as usize,
            window_ack_size: self.window_ack_size,
            peer_bandwidth: self.peer_bandwidth,
            compress_header: self.compress_header,
        }
    }

    pub fn connection_options(&self) -> ConnectionOptions {
        ConnectionOptions {
            recv_buffer_size: self.recv_buffer_size,
            post_close_delay: self.post_close_delay,
        }
    }

    pub fn qos_params(&self) -> QosParams {
        QosParams {
            check_buffer_size: self.qos_check_buffer_size,
            max_wait_ms: self.qos_max_wait_ms,
            wait_per_mega_ms: self.qos_wait_per_mega_ms,
        }
    }
}

/// Builder for ServerConfig
pub struct ServerConfigBuilder {
    config: ServerConfig,
}

impl ServerConfigBuilder {
    /// Create new builder
    pub fn new() -> Self {
        ServerConfigBuilder {
            config: ServerConfig::default(),
        }
    }

    /// Set host
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    /// Set port
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Set max connections
    pub fn max_connections(mut self, max: usize) -> Self {
        self.config.max_connections = max;
        self
    }

    /// Set chunk size
    pub fn chunk_size(mut self, size: u32) -> Self {
        self.config.chunk_size = size;
        self
    }

    pub fn window_ack_size(mut self, size: u32) -> Self {
        self.config.window_ack_size = size;
        self
    }

    pub fn peer_bandwidth(mut self, bandwidth: u32) -> Self {
        self.config.peer_bandwidth = bandwidth;
        self
    }

    pub fn compress_header(mut self, enabled: bool) -> Self {
        self.config.compress_header = enabled;
        self
    }

    pub fn recv_timeout(mut self, timeout: Duration) -> Self {
        self.config.recv_timeout = timeout;
        self
    }

    pub fn info_interval(mut self, interval: Duration) -> Self {
        self.config.info_interval = interval;
        self
    }

    /// Build configuration
    pub fn build(self) -> Result<ServerConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for ServerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
