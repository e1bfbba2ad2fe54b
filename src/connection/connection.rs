use crate::connection::event::{NetEvent, RecvHandler};
use crate::connection::state::{AtomicState, ConnectionState};
use crate::{Error, Result};
use log::{debug, error, info, trace};
use std::ops::AddAssign;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Outbound payload, either moved into the queue or shared with other
/// connections (relay fan-out)
#[derive(Debug, Clone)]
pub enum SendBuffer {
    Owned(Vec<u8>),
    Shared(Arc<Vec<u8>>),
}

impl SendBuffer {
    pub fn as_slice(&self) -> &[u8] {
        match self {
            SendBuffer::Owned(data) => data,
            SendBuffer::Shared(data) => data.as_slice(),
        }
    }

    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_slice().is_empty()
    }
}

impl From<Vec<u8>> for SendBuffer {
    fn from(data: Vec<u8>) -> Self {
        SendBuffer::Owned(data)
    }
}

impl From<Arc<Vec<u8>>> for SendBuffer {
    fn from(data: Arc<Vec<u8>>) -> Self {
        SendBuffer::Shared(data)
    }
}

struct PendingSend {
    buffer: SendBuffer,
    queued_at: Instant,
}

/// Bits per second over the last check window
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrafficRate {
    pub send_bps: u64,
    pub recv_bps: u64,
}

impl AddAssign for TrafficRate {
    fn add_assign(&mut self, other: Self) {
        self.send_bps += other.send_bps;
        self.recv_bps += other.recv_bps;
    }
}

/// Parameters of the send-buffer pacing heuristic
#[derive(Debug, Clone)]
pub struct QosParams {
    /// Queued bytes below this need no wait
    pub check_buffer_size: usize,
    pub max_wait_ms: u64,
    pub wait_per_mega_ms: u64,
}

impl Default for QosParams {
    fn default() -> Self {
        QosParams {
            check_buffer_size: 1024 * 1024,
            max_wait_ms: 100,
            wait_per_mega_ms: 20,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConnectionOptions {
    pub recv_buffer_size: usize,
    pub post_close_delay: Duration,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        ConnectionOptions {
            recv_buffer_size: 8192,
            post_close_delay: Duration::from_millis(1),
        }
    }
}

/// Everything needed to wrap a live socket
pub struct NetTcpParam {
    pub object_key: i32,
    pub object_name: String,
    pub stream: TcpStream,
    pub net_event: Weak<dyn NetEvent>,
    pub options: ConnectionOptions,
}

/// One live TCP transport.
///
/// Owns a receive loop feeding a `RecvHandler`, a FIFO write loop fed by
/// `post_send`, and an optional receive-timeout timer. Both loops stop when
/// the connection is closed.
pub struct Connection {
    object_key: i32,
    object_name: String,
    index: AtomicI32,
    ip: String,
    port: u16,
    options: ConnectionOptions,

    state: AtomicState,
    post_close_armed: AtomicBool,
    net_event: Weak<dyn NetEvent>,

    transport: Mutex<Option<TcpStream>>,
    send_tx: mpsc::UnboundedSender<PendingSend>,
    send_rx: Mutex<Option<mpsc::UnboundedReceiver<PendingSend>>>,
    shutdown: watch::Sender<bool>,
    timeout_task: Mutex<Option<JoinHandle<()>>>,

    /// Bytes queued but not yet written
    send_buffer_size: AtomicUsize,

    /// Window counters, reset by `traffic_rate(true)`
    send_traffic: AtomicU64,
    recv_traffic: AtomicU64,
    send_total: AtomicU64,
    recv_total: AtomicU64,

    created: Instant,
    last_recv_ms: AtomicU64,
    traffic_check_ms: AtomicU64,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Resolves once the shutdown flag is raised
async fn wait_shutdown(shutdown: &mut watch::Receiver<bool>) {
    while !*shutdown.borrow_and_update() {
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

/// Offer buffered bytes to the handler until it stops consuming
fn drain_pending(handler: &dyn RecvHandler, pending: &mut Vec<u8>) -> Result<()> {
    while !pending.is_empty() {
        let used = handler.recv_handler(pending)?;
        if used == 0 {
            break;
        }
        if used > pending.len() {
            return Err(Error::protocol(format!(
                "Handler consumed {} bytes of {}",
                used,
                pending.len()
            )));
        }
        pending.drain(..used);
    }
    Ok(())
}

impl Connection {
    /// Create new connection around an accepted or connected socket
    pub fn new(param: NetTcpParam) -> Result<Arc<Self>> {
        let peer = param.stream.peer_addr()?;
        let (send_tx, send_rx) = mpsc::unbounded_channel();
        let (shutdown, _) = watch::channel(false);

        Ok(Arc::new(Connection {
            object_key: param.object_key,
            object_name: param.object_name,
            index: AtomicI32::new(-1),
            ip: peer.ip().to_string(),
            port: peer.port(),
            options: param.options,
            state: AtomicState::new(ConnectionState::Created),
            post_close_armed: AtomicBool::new(false),
            net_event: param.net_event,
            transport: Mutex::new(Some(param.stream)),
            send_tx,
            send_rx: Mutex::new(Some(send_rx)),
            shutdown,
            timeout_task: Mutex::new(None),
            send_buffer_size: AtomicUsize::new(0),
            send_traffic: AtomicU64::new(0),
            recv_traffic: AtomicU64::new(0),
            send_total: AtomicU64::new(0),
            recv_total: AtomicU64::new(0),
            created: Instant::now(),
            last_recv_ms: AtomicU64::new(0),
            traffic_check_ms: AtomicU64::new(0),
        }))
    }

    pub fn object_key(&self) -> i32 {
        self.object_key
    }

    pub fn object_name(&self) -> &str {
        &self.object_name
    }

    /// Registry index, -1 until inserted
    pub fn index(&self) -> i32 {
        self.index.load(Ordering::Acquire)
    }

    pub(crate) fn set_index(&self, index: i32) {
        self.index.store(index, Ordering::Release);
    }

    pub fn ip(&self) -> &str {
        &self.ip
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn state(&self) -> ConnectionState {
        self.state.load()
    }

    /// Not yet closing
    pub fn is_open(&self) -> bool {
        self.state().can_send()
    }

    pub fn send_buffer_size(&self) -> usize {
        self.send_buffer_size.load(Ordering::Acquire)
    }

    pub fn send_traffic_total(&self) -> u64 {
        self.send_total.load(Ordering::Relaxed)
    }

    pub fn recv_traffic_total(&self) -> u64 {
        self.recv_total.load(Ordering::Relaxed)
    }

    fn elapsed_ms(&self) -> u64 {
        self.created.elapsed().as_millis() as u64
    }

    /// Time since the last received byte (or since start)
    pub fn idle_time(&self) -> Duration {
        let idle = self.elapsed_ms().saturating_sub(self.last_recv_ms.load(Ordering::Acquire));
        Duration::from_millis(idle)
    }

    fn touch_recv(&self) {
        self.last_recv_ms.store(self.elapsed_ms(), Ordering::Release);
    }

    /// Start the receive and write loops
    pub fn start(self: &Arc<Self>, handler: Weak<dyn RecvHandler>) -> Result<()> {
        let stream = lock(&self.transport)
            .take()
            .ok_or_else(|| Error::connection(format!("[{}] Connection already started or closed", self.object_name)))?;
        let send_rx = lock(&self.send_rx)
            .take()
            .ok_or_else(|| Error::connection(format!("[{}] Send queue already taken", self.object_name)))?;

        let previous = self.state.advance(ConnectionState::Open);
        if previous != ConnectionState::Created {
            return Err(Error::invalid_state(format!(
                "[{}] Cannot start connection in state {:?}",
                self.object_name, previous
            )));
        }

        if let Err(e) = stream.set_nodelay(true) {
            debug!("[{}] set_nodelay failed - ip({}) error({})", self.object_name, self.ip, e);
        }
        let (reader, writer) = stream.into_split();
        self.touch_recv();

        tokio::spawn(Arc::clone(self).write_loop(writer, send_rx));
        tokio::spawn(Arc::clone(self).read_loop(reader, handler));
        Ok(())
    }

    /// Queue bytes for sending.
    ///
    /// Returns false without side effects when the payload is empty or the
    /// connection is closing.
    pub fn post_send(&self, data: impl Into<SendBuffer>) -> bool {
        let buffer = data.into();
        if buffer.is_empty() {
            error!("[{}] PostSend - empty payload - index({}) ip({})", self.object_name, self.index(), self.ip);
            return false;
        }
        if !self.is_open() {
            debug!("[{}] PostSend - closing - index({}) ip({})", self.object_name, self.index(), self.ip);
            return false;
        }

        let size = buffer.len();
        self.send_buffer_size.fetch_add(size, Ordering::AcqRel);
        let pending = PendingSend {
            buffer,
            queued_at: Instant::now(),
        };
        if self.send_tx.send(pending).is_err() {
            self.send_buffer_size.fetch_sub(size, Ordering::AcqRel);
            return false;
        }
        true
    }

    /// Refuse new sends and close after the configured delay so queued
    /// writes can drain
    pub fn post_close(self: &Arc<Self>) {
        let previous = self.state.advance(ConnectionState::Closing);
        if previous.is_closed() || self.post_close_armed.swap(true, Ordering::AcqRel) {
            return;
        }

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let connection = Arc::clone(self);
                let delay = self.options.post_close_delay;
                runtime.spawn(async move {
                    tokio::time::sleep(delay).await;
                    connection.close();
                });
            }
            Err(_) => self.close(),
        }
    }

    /// Immediate teardown; idempotent. Does not fire `on_closed`.
    pub fn close(&self) {
        if self.state.advance(ConnectionState::Closed).is_closed() {
            return;
        }

        self.shutdown.send_replace(true);
        drop(lock(&self.transport).take());
        self.send_buffer_size.store(0, Ordering::Release);

        debug!(
            "[{}] Connection closed - index({}) address({}:{})",
            self.object_name,
            self.index(),
            self.ip,
            self.port
        );
    }

    /// Close as failed once nothing arrived for `timeout`; checked every
    /// half interval. Replaces any earlier timer.
    pub fn set_recv_timeout(self: &Arc<Self>, timeout: Duration) {
        if timeout.is_zero() || !self.is_open() {
            return;
        }

        let interval = (timeout / 2).max(Duration::from_millis(1));
        let connection = Arc::clone(self);
        let mut shutdown = self.shutdown.subscribe();

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = wait_shutdown(&mut shutdown) => return,
                    _ = tokio::time::sleep(interval) => {}
                }

                let idle = connection.idle_time();
                if idle > timeout {
                    info!(
                        "[{}] Network timeout - index({}) ip({}) gap({}ms)",
                        connection.object_name,
                        connection.index(),
                        connection.ip,
                        idle.as_millis()
                    );
                    connection.fail("receive timeout").await;
                    return;
                }
            }
        });

        if let Some(previous) = lock(&self.timeout_task).replace(task) {
            previous.abort();
        }
    }

    /// Send/receive bit-rate since the last reset; zero until at least one
    /// second has passed. `init` starts a new window.
    pub fn traffic_rate(&self, init: bool) -> TrafficRate {
        let now = self.elapsed_ms();
        let gap = now.saturating_sub(self.traffic_check_ms.load(Ordering::Acquire));
        if gap < 1000 {
            return TrafficRate::default();
        }

        let (send, recv) = if init {
            self.traffic_check_ms.store(now, Ordering::Release);
            (
                self.send_traffic.swap(0, Ordering::AcqRel),
                self.recv_traffic.swap(0, Ordering::AcqRel),
            )
        } else {
            (
                self.send_traffic.load(Ordering::Acquire),
                self.recv_traffic.load(Ordering::Acquire),
            )
        };

        TrafficRate {
            send_bps: send * 8 * 1000 / gap,
            recv_bps: recv * 8 * 1000 / gap,
        }
    }

    /// Suggested producer delay in milliseconds for the current send backlog
    pub fn qos_send_wait_time(&self, params: &QosParams) -> u64 {
        let queued = self.send_buffer_size();
        if queued < params.check_buffer_size {
            return 0;
        }
        ((queued / (1024 * 1024)) as u64 * params.wait_per_mega_ms).min(params.max_wait_ms)
    }

    /// Close and report to the owner, once, unless it was already closing
    async fn fail(&self, reason: impl Into<String>) {
        let previous = self.state.advance(ConnectionState::Closing);
        self.close();
        if !previous.can_send() {
            return;
        }

        info!(
            "[{}] Connection fail - index({}) address({}:{}) reason({})",
            self.object_name,
            self.index(),
            self.ip,
            self.port,
            reason.into()
        );
        if let Some(event) = self.net_event.upgrade() {
            event.on_closed(self.object_key, self.index(), &self.ip, self.port).await;
        }
    }

    async fn read_loop(self: Arc<Self>, mut reader: OwnedReadHalf, handler: Weak<dyn RecvHandler>) {
        let mut shutdown = self.shutdown.subscribe();
        let mut buffer = vec![0u8; self.options.recv_buffer_size.max(1)];
        let mut pending: Vec<u8> = Vec::new();

        loop {
            let read = tokio::select! {
                biased;
                _ = wait_shutdown(&mut shutdown) => return,
                read = reader.read(&mut buffer) => read,
            };

            let size = match read {
                Ok(0) => {
                    self.fail("closed by peer").await;
                    return;
                }
                Ok(size) => size,
                Err(e) => {
                    self.fail(format!("recv error({})", e)).await;
                    return;
                }
            };

            if !self.is_open() {
                return;
            }

            self.touch_recv();
            self.recv_traffic.fetch_add(size as u64, Ordering::AcqRel);
            self.recv_total.fetch_add(size as u64, Ordering::Relaxed);
            pending.extend_from_slice(&buffer[..size]);

            let result = match handler.upgrade() {
                Some(handler) => drain_pending(handler.as_ref(), &mut pending),
                None => Err(Error::connection("Receive handler released")),
            };
            if let Err(e) = result {
                error!(
                    "[{}] RecvHandler fail - index({}) ip({}) error({})",
                    self.object_name,
                    self.index(),
                    self.ip,
                    e
                );
                self.fail(e.to_string()).await;
                return;
            }
        }
    }

    async fn write_loop(
        self: Arc<Self>,
        mut writer: OwnedWriteHalf,
        mut send_rx: mpsc::UnboundedReceiver<PendingSend>,
    ) {
        let mut shutdown = self.shutdown.subscribe();

        loop {
            let pending = tokio::select! {
                biased;
                _ = wait_shutdown(&mut shutdown) => break,
                pending = send_rx.recv() => match pending {
                    Some(pending) => pending,
                    None => break,
                },
            };

            let size = pending.buffer.len();
            let written = tokio::select! {
                biased;
                _ = wait_shutdown(&mut shutdown) => break,
                written = writer.write_all(pending.buffer.as_slice()) => written,
            };
            if let Err(e) = written {
                self.fail(format!("send error({})", e)).await;
                break;
            }

            self.send_buffer_size.fetch_sub(size, Ordering::AcqRel);
            self.send_traffic.fetch_add(size as u64, Ordering::AcqRel);
            self.send_total.fetch_add(size as u64, Ordering::Relaxed);
            trace!(
                "[{}] Sent {} bytes - index({}) queued({}ms)",
                self.object_name,
                size,
                self.index(),
                pending.queued_at.elapsed().as_millis()
            );
        }

        let _ = writer.shutdown().await;
    }
}
