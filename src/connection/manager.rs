use crate::connection::connection::{Connection, QosParams, TrafficRate};
use crate::connection::event::{ConnectedResult, NetEvent, TcpConnectedParam};
use crate::{Error, Result};
use log::{error, info, warn};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio::task::JoinHandle;

/// Pause after a failed accept
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// How long to wait before accepting again after an error, or `None` to stop
fn accept_retry_delay(closing: &AtomicBool) -> Option<Duration> {
    if closing.load(Ordering::Acquire) {
        None
    } else {
        Some(ACCEPT_ERROR_BACKOFF)
    }
}

/// A registry entry: something that owns a `Connection` and knows how to
/// start it with its own receive handler
pub trait NetObject: Send + Sync + 'static {
    fn connection(&self) -> &Arc<Connection>;

    /// Start the connection loops
    fn start(&self) -> Result<()>;
}

/// Hands out non-negative registry indices.
///
/// Indices increase until `i32::MAX`, then wrap to 0. On collision the next
/// free slot is found by a linear scan, so the worst case is O(n) in the
/// number of live entries.
#[derive(Debug, Clone, Default)]
pub struct IndexAllocator {
    next: i32,
}

impl IndexAllocator {
    /// Create new allocator starting at 0
    pub fn new() -> Self {
        IndexAllocator::default()
    }

    pub fn starting_at(next: i32) -> Self {
        IndexAllocator { next: next.max(0) }
    }

    /// Next free index, or `None` when every index is taken
    pub fn allocate(&mut self, in_use: impl Fn(i32) -> bool) -> Option<i32> {
        if self.next >= i32::MAX {
            self.next = 0;
        }

        let start = self.next;
        let mut index = start;
        while in_use(index) {
            index = if index >= i32::MAX - 1 { 0 } else { index + 1 };
            if index == start {
                return None;
            }
        }

        self.next = index.saturating_add(1);
        Some(index)
    }
}

struct Registry<T> {
    objects: HashMap<i32, Arc<T>>,
    allocator: IndexAllocator,
    max_count: usize,
}

/// Owns every live `NetObject` of one role (listener or outbound) and runs
/// the accept loop for it
pub struct ConnectionManager<T: NetObject> {
    object_key: i32,
    object_name: String,
    net_event: Weak<dyn NetEvent>,
    registry: Mutex<Registry<T>>,
    closing: Arc<AtomicBool>,
    accept_task: Mutex<Option<JoinHandle<()>>>,
    local_addr: Mutex<Option<SocketAddr>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Bind with SO_REUSEADDR and a 1024 backlog
pub fn bind_listener(addr: &str) -> Result<TcpListener> {
    let addr: SocketAddr = addr
        .parse()
        .map_err(|e| Error::config(format!("Invalid address {}: {}", addr, e)))?;

    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    socket.set_reuseaddr(true)?;
    socket.bind(addr)?;

    Ok(socket.listen(1024)?)
}

impl<T: NetObject> ConnectionManager<T> {
    /// Create new manager; nothing listens until `create`
    pub fn new(object_key: i32, object_name: impl Into<String>, net_event: Weak<dyn NetEvent>) -> Self {
        ConnectionManager {
            object_key,
            object_name: object_name.into(),
            net_event,
            registry: Mutex::new(Registry {
                objects: HashMap::new(),
                allocator: IndexAllocator::new(),
                max_count: 0,
            }),
            closing: Arc::new(AtomicBool::new(false)),
            accept_task: Mutex::new(None),
            local_addr: Mutex::new(None),
        }
    }

    pub fn object_key(&self) -> i32 {
        self.object_key
    }

    pub fn object_name(&self) -> &str {
        &self.object_name
    }

    pub fn net_event(&self) -> Weak<dyn NetEvent> {
        self.net_event.clone()
    }

    /// Start listening on `addr` ("host:port") and accepting.
    ///
    /// Each accepted socket goes to `NetEvent::on_accepted`; the next
    /// accept is armed right after. Returns the bound address.
    pub fn create(&self, addr: &str) -> Result<SocketAddr> {
        let listener = bind_listener(addr)?;
        let local = listener.local_addr()?;
        *lock(&self.local_addr) = Some(local);

        let object_key = self.object_key;
        let object_name = self.object_name.clone();
        let net_event = self.net_event.clone();
        let closing = Arc::clone(&self.closing);

        let task = tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, peer)) => {
                        if closing.load(Ordering::Acquire) {
                            break;
                        }
                        let Some(event) = net_event.upgrade() else {
                            break;
                        };
                        if !event
                            .on_accepted(object_key, stream, peer.ip().to_string(), peer.port())
                            .await
                        {
                            error!("[{}] OnAccept - accepted callback fail - address({})", object_name, peer);
                        }
                    }
                    Err(e) => {
                        error!("[{}] OnAccept - error({})", object_name, e);
                        let Some(delay) = accept_retry_delay(&closing) else {
                            break;
                        };
                        tokio::time::sleep(delay).await;
                    }
                }
            }
            info!("[{}] Accept loop stopped", object_name);
        });

        if let Some(previous) = lock(&self.accept_task).replace(task) {
            previous.abort();
        }

        info!("[{}] Listening - address({})", self.object_name, local);
        Ok(local)
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        *lock(&self.local_addr)
    }

    /// Register and start an object; returns its index.
    ///
    /// If starting fails or the socket is already closed, the object is
    /// closed and removed again.
    pub fn insert(&self, object: Arc<T>, recv_timeout: Option<Duration>) -> Result<i32> {
        let mut registry = lock(&self.registry);

        let Registry { objects, allocator, .. } = &mut *registry;
        let index = allocator
            .allocate(|index| objects.contains_key(&index))
            .ok_or_else(|| Error::connection(format!("[{}] Insert - index exhausted", self.object_name)))?;

        registry.objects.insert(index, Arc::clone(&object));
        registry.max_count = registry.max_count.max(registry.objects.len());

        let connection = object.connection();
        connection.set_index(index);

        let started = object.start();
        if started.is_ok() {
            if let Some(timeout) = recv_timeout {
                connection.set_recv_timeout(timeout);
            }
        }

        if let Err(e) = started {
            error!("[{}] Insert - object start fail - index({}) error({})", self.object_name, index, e);
            connection.post_close();
            registry.objects.remove(&index);
            return Err(e);
        }
        if !connection.is_open() {
            error!("[{}] Insert - object socket close - index({})", self.object_name, index);
            connection.post_close();
            registry.objects.remove(&index);
            return Err(Error::connection(format!("[{}] Socket closed during insert", self.object_name)));
        }

        Ok(index)
    }

    /// Connect asynchronously; the outcome goes to `NetEvent::on_connected`
    pub fn post_connect(&self, ip: &str, port: u16, connect_key: i32) {
        let object_key = self.object_key;
        let object_name = self.object_name.clone();
        let net_event = self.net_event.clone();
        let ip = ip.to_string();

        tokio::spawn(async move {
            let (result, stream) = match TcpStream::connect((ip.as_str(), port)).await {
                Ok(stream) => (ConnectedResult::Success, Some(stream)),
                Err(e) => {
                    error!("[{}] OnConnected - address({}:{}) error({})", object_name, ip, port, e);
                    (ConnectedResult::Fail, None)
                }
            };

            let param = TcpConnectedParam {
                connect_key,
                result,
                stream,
                ip,
                port,
            };
            if let Some(event) = net_event.upgrade() {
                let address = format!("{}:{}", param.ip, param.port);
                if !event.on_connected(object_key, param).await {
                    warn!("[{}] OnConnected - connected callback fail - address({})", object_name, address);
                }
            }
        });
    }

    pub fn find(&self, index: i32) -> Option<Arc<T>> {
        lock(&self.registry).objects.get(&index).cloned()
    }

    /// Linear scan by remote address
    pub fn find_index_key(&self, ip: &str, port: u16) -> Option<i32> {
        lock(&self.registry)
            .objects
            .iter()
            .find(|(_, object)| object.connection().ip() == ip && object.connection().port() == port)
            .map(|(index, _)| *index)
    }

    pub fn is_connected(&self, index: i32) -> bool {
        self.find(index).is_some_and(|object| object.connection().is_open())
    }

    /// Evict and close after the deferred delay
    pub fn remove(&self, index: i32) -> bool {
        let removed = lock(&self.registry).objects.remove(&index);
        match removed {
            Some(object) => {
                object.connection().post_close();
                true
            }
            None => false,
        }
    }

    pub fn remove_many(&self, indices: &[i32]) {
        let removed: Vec<Arc<T>> = {
            let mut registry = lock(&self.registry);
            indices.iter().filter_map(|index| registry.objects.remove(index)).collect()
        };
        for object in removed {
            object.connection().post_close();
        }
    }

    /// Close everything immediately
    pub fn remove_all(&self) {
        let mut registry = lock(&self.registry);
        for object in registry.objects.values() {
            object.connection().close();
        }
        registry.objects.clear();
    }

    pub fn count(&self) -> usize {
        lock(&self.registry).objects.len()
    }

    /// Highest number of simultaneous entries seen
    pub fn max_count(&self) -> usize {
        lock(&self.registry).max_count
    }

    /// Snapshot of the registry
    pub fn objects(&self) -> Vec<(i32, Arc<T>)> {
        lock(&self.registry)
            .objects
            .iter()
            .map(|(index, object)| (*index, Arc::clone(object)))
            .collect()
    }

    /// Sum of every connection's rate; iterates under the registry lock
    pub fn total_traffic_rate(&self, init: bool) -> TrafficRate {
        let registry = lock(&self.registry);
        let mut total = TrafficRate::default();
        for object in registry.objects.values() {
            total += object.connection().traffic_rate(init);
        }
        total
    }

    pub fn traffic_rate(&self, index: i32, init: bool) -> TrafficRate {
        self.find(index)
            .map(|object| object.connection().traffic_rate(init))
            .unwrap_or_default()
    }

    pub fn qos_send_wait_time(&self, index: i32, params: &QosParams) -> u64 {
        self.find(index)
            .map(|object| object.connection().qos_send_wait_time(params))
            .unwrap_or(0)
    }

    /// Stop accepting and close every connection
    pub fn post_release(&self) {
        self.closing.store(true, Ordering::Release);
        if let Some(task) = lock(&self.accept_task).take() {
            task.abort();
        }
        self.remove_all();
    }

    pub fn is_closing(&self) -> bool {
        self.closing.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_sequential_indices() {
        let mut allocator = IndexAllocator::new();
        let used: HashSet<i32> = HashSet::new();
        assert_eq!(allocator.allocate(|i| used.contains(&i)), Some(0));
        assert_eq!(allocator.allocate(|i| used.contains(&i)), Some(1));
        assert_eq!(allocator.allocate(|i| used.contains(&i)), Some(2));
    }

    #[test]
    fn test_collision_scans_forward() {
        let mut allocator = IndexAllocator::new();
        let used: HashSet<i32> = [0, 1, 2, 4].into_iter().collect();
        assert_eq!(allocator.allocate(|i| used.contains(&i)), Some(3));
        assert_eq!(allocator.allocate(|i| used.contains(&i)), Some(5));
    }

    #[test]
    fn test_wraps_at_max() {
        let mut allocator = IndexAllocator::starting_at(i32::MAX - 1);
        let used: HashSet<i32> = [0].into_iter().collect();
        assert_eq!(allocator.allocate(|i| used.contains(&i)), Some(i32::MAX - 1));
        // MAX itself is never handed out
        assert_eq!(allocator.allocate(|i| used.contains(&i)), Some(1));
    }

    #[test]
    fn test_scan_wraps_past_max() {
        let mut allocator = IndexAllocator::starting_at(i32::MAX - 2);
        let used: HashSet<i32> = [i32::MAX - 2, i32::MAX - 1, 0].into_iter().collect();
        assert_eq!(allocator.allocate(|i| used.contains(&i)), Some(1));
    }

    #[test]
    fn test_accept_error_backs_off_until_closing() {
        let closing = AtomicBool::new(false);
        let delay = accept_retry_delay(&closing).unwrap();
        assert!(delay >= Duration::from_millis(10));

        closing.store(true, Ordering::Release);
        assert_eq!(accept_retry_delay(&closing), None);
    }

    #[test]
    fn test_bind_rejects_bad_address() {
        assert!(matches!(bind_listener("not an address"), Err(Error::Configuration(_))));
    }
}
