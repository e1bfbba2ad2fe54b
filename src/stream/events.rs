use crate::processing::{Frame, MediaInfo};
use std::sync::Arc;

/// What a publish session needs from its owner.
///
/// `false` from any callback is fatal for the session.
pub trait StreamEvent: Send + Sync {
    /// Queue chunked bytes for sending to the peer
    fn stream_send_data(&self, data: Vec<u8>) -> bool;

    /// `publish` named `path` (app/key); return `false` to reject
    fn on_stream_start(&self, path: &str) -> bool;

    /// Both codec configurations are known
    fn on_stream_ready(&self, app: &str, key: &str, media_info: Arc<MediaInfo>) -> bool;

    /// One audio or video frame after bootstrap
    fn on_stream_data(&self, frame: Arc<Frame>, is_video: bool) -> bool;
}
