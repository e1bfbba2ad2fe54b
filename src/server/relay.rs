use crate::processing::{Frame, MediaInfo};
use std::sync::Arc;

/// Downstream consumer of published streams (playback fan-out, packaging).
///
/// Called from connection receive loops, so implementations must not block.
/// Returning false from a data callback closes the publisher.
pub trait MediaRelay: Send + Sync {
    fn on_stream_ready(&self, path: &str, app: &str, key: &str, media_info: Arc<MediaInfo>) -> bool;

    fn on_stream_data(&self, path: &str, frame: Arc<Frame>, is_video: bool) -> bool;

    fn on_stream_end(&self, path: &str);
}
