use crate::connection::{Connection, NetObject, NetTcpParam, RecvHandler};
use crate::processing::{Frame, MediaInfo};
use crate::stream::{PublishSession, SessionSettings, StreamEvent};
use crate::Result;
use log::{error, info, warn};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::{Duration, Instant};

const FPS_CHECK_INTERVAL: Duration = Duration::from_secs(3);

/// Server side of a publish session, keyed by connection index
pub trait IngestEvent: Send + Sync {
    /// `publish` arrived; false rejects it
    fn on_publish_start(&self, index: i32, path: &str) -> bool;

    fn on_publish_ready(&self, index: i32, path: &str, app: &str, key: &str, media_info: Arc<MediaInfo>) -> bool;

    fn on_publish_data(&self, index: i32, path: &str, frame: Arc<Frame>, is_video: bool) -> bool;
}

/// Snapshot for the periodic info log
#[derive(Debug, Clone, PartialEq)]
pub struct StreamingInfo {
    pub path: String,
    pub ip: String,
    pub send_traffic: u64,
    pub recv_traffic: u64,
    pub last_video_timestamp: u32,
    pub last_audio_timestamp: u32,
    pub video_fps: f64,
    pub audio_fps: f64,
}

#[derive(Debug)]
struct FpsCheck {
    started: Option<Instant>,
    video_frames: u32,
    audio_frames: u32,
    video_fps: f64,
    audio_fps: f64,
}

impl FpsCheck {
    fn new() -> Self {
        FpsCheck {
            started: None,
            video_frames: 0,
            audio_frames: 0,
            video_fps: 0.0,
            audio_fps: 0.0,
        }
    }

    fn add(&mut self, is_video: bool, now: Instant) {
        let started = *self.started.get_or_insert(now);

        if is_video {
            self.video_frames += 1;
        } else {
            self.audio_frames += 1;
        }

        let gap = now.duration_since(started);
        if gap >= FPS_CHECK_INTERVAL {
            let seconds = gap.as_secs_f64();
            self.video_fps = f64::from(self.video_frames) / seconds;
            self.audio_fps = f64::from(self.audio_frames) / seconds;
            self.video_frames = 0;
            self.audio_frames = 0;
            self.started = Some(now);
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One accepted publisher: a `Connection` feeding a `PublishSession`
pub struct PublishObject {
    connection: Arc<Connection>,
    session: Mutex<PublishSession>,
    event: Weak<dyn IngestEvent>,
    self_ref: Weak<PublishObject>,

    /// Set once the owner accepted the publish
    stream_path: Mutex<String>,
    fps: Mutex<FpsCheck>,
}

impl PublishObject {
    /// Wrap an accepted socket
    pub fn new(param: NetTcpParam, settings: SessionSettings, event: Weak<dyn IngestEvent>) -> Result<Arc<Self>> {
        let connection = Connection::new(param)?;

        Ok(Arc::new_cyclic(|self_ref| PublishObject {
            connection,
            session: Mutex::new(PublishSession::new(settings)),
            event,
            self_ref: self_ref.clone(),
            stream_path: Mutex::new(String::new()),
            fps: Mutex::new(FpsCheck::new()),
        }))
    }

    pub fn index(&self) -> i32 {
        self.connection.index()
    }

    /// Accepted stream path, empty until publish succeeded
    pub fn stream_path(&self) -> String {
        lock(&self.stream_path).clone()
    }

    pub fn is_publishing(&self) -> bool {
        lock(&self.session).is_publishing()
    }

    /// `init` starts a new traffic window
    pub fn streaming_info(&self, init: bool) -> StreamingInfo {
        let rate = self.connection.traffic_rate(init);
        let (last_video_timestamp, last_audio_timestamp) = {
            let session = lock(&self.session);
            (session.last_video_timestamp(), session.last_audio_timestamp())
        };
        let (video_fps, audio_fps) = {
            let fps = lock(&self.fps);
            (fps.video_fps, fps.audio_fps)
        };

        StreamingInfo {
            path: self.stream_path(),
            ip: self.connection.ip().to_string(),
            send_traffic: rate.send_bps,
            recv_traffic: rate.recv_bps,
            last_video_timestamp,
            last_audio_timestamp,
            video_fps,
            audio_fps,
        }
    }
}

impl StreamEvent for PublishObject {
    fn stream_send_data(&self, data: Vec<u8>) -> bool {
        self.connection.post_send(data)
    }

    fn on_stream_start(&self, path: &str) -> bool {
        let Some(event) = self.event.upgrade() else {
            return false;
        };
        if !event.on_publish_start(self.index(), path) {
            return false;
        }

        *lock(&self.stream_path) = path.to_string();
        info!("Publish start - index({}) ip({}) path({})", self.index(), self.connection.ip(), path);
        true
    }

    fn on_stream_ready(&self, app: &str, key: &str, media_info: Arc<MediaInfo>) -> bool {
        let path = self.stream_path();
        match self.event.upgrade() {
            Some(event) => event.on_publish_ready(self.index(), &path, app, key, media_info),
            None => false,
        }
    }

    fn on_stream_data(&self, frame: Arc<Frame>, is_video: bool) -> bool {
        lock(&self.fps).add(is_video, Instant::now());

        let path = self.stream_path();
        match self.event.upgrade() {
            Some(event) => event.on_publish_data(self.index(), &path, frame, is_video),
            None => false,
        }
    }
}

impl RecvHandler for PublishObject {
    fn recv_handler(&self, data: &[u8]) -> Result<usize> {
        let mut session = lock(&self.session);
        let result = session.recv_handler(data, self);
        match &result {
            Err(e) if e.is_protocol_violation() => {
                error!("Protocol violation - index({}) ip({}) error({})", self.index(), self.connection.ip(), e);
            }
            Err(e) => warn!("Publish session fail - index({}) ip({}) error({})", self.index(), self.connection.ip(), e),
            Ok(_) => {}
        }
        result
    }
}

impl NetObject for PublishObject {
    fn connection(&self) -> &Arc<Connection> {
        &self.connection
    }

    fn start(&self) -> Result<()> {
        let handler: Weak<dyn RecvHandler> = self.self_ref.clone();
        self.connection.start(handler)
    }
}
