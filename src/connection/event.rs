use crate::Result;
use async_trait::async_trait;
use tokio::net::TcpStream;

/// Consumes bytes received on a connection.
///
/// Returns how many leading bytes were used; unused bytes are kept and
/// offered again with the next read. `Ok(0)` means "wait for more".
/// An `Err` or a count larger than `data` closes the connection.
pub trait RecvHandler: Send + Sync {
    fn recv_handler(&self, data: &[u8]) -> Result<usize>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectedResult {
    Success,
    Fail,
}

/// Outcome of an outbound connect request
#[derive(Debug)]
pub struct TcpConnectedParam {
    /// Caller supplied key identifying the request
    pub connect_key: i32,
    pub result: ConnectedResult,
    pub stream: Option<TcpStream>,
    pub ip: String,
    pub port: u16,
}

/// Owner callbacks for a connection manager and its connections.
///
/// `object_key` identifies the manager (role) that raised the event.
#[async_trait]
pub trait NetEvent: Send + Sync {
    /// New inbound transport; returning false drops it
    async fn on_accepted(&self, object_key: i32, stream: TcpStream, ip: String, port: u16) -> bool;

    async fn on_connected(&self, object_key: i32, param: TcpConnectedParam) -> bool {
        log::warn!(
            "Outbound connect not handled - object({}) address({}:{})",
            object_key,
            param.ip,
            param.port
        );
        false
    }

    /// Fired at most once per connection, on transport error, handler
    /// rejection or receive timeout
    async fn on_closed(&self, object_key: i32, index: i32, ip: &str, port: u16);
}
