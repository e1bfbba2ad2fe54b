// RTMP Ingest Server Example
//
// Accepts publishers on port 1935 and logs stream readiness and frame
// counters through a relay. Publish with e.g.
//   ffmpeg -re -i input.mp4 -c copy -f flv rtmp://127.0.0.1/live/test
//
// Usage:
//   cargo run --example ingest_server

use log::info;
use rtmp::{Frame, MediaInfo, MediaRelay, Result, RtmpServer, ServerConfig};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Default)]
struct FrameCounter {
    video: AtomicU64,
    audio: AtomicU64,
}

/// Relay that only counts frames per stream
#[derive(Default)]
struct LoggingRelay {
    streams: Mutex<HashMap<String, Arc<FrameCounter>>>,
}

impl MediaRelay for LoggingRelay {
    fn on_stream_ready(&self, path: &str, app: &str, key: &str, media_info: Arc<MediaInfo>) -> bool {
        info!("Stream ready - path({}) app({}) key({}) {}", path, app, key, media_info);
        self.streams
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.to_string(), Arc::new(FrameCounter::default()));
        true
    }

    fn on_stream_data(&self, path: &str, frame: Arc<Frame>, is_video: bool) -> bool {
        let counter = self
            .streams
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .cloned();
        let Some(counter) = counter else {
            return true;
        };

        if is_video {
            let count = counter.video.fetch_add(1, Ordering::Relaxed) + 1;
            if frame.is_keyframe() {
                info!("Keyframe - path({}) timestamp({}) video frames({})", path, frame.timestamp, count);
            }
        } else {
            counter.audio.fetch_add(1, Ordering::Relaxed);
        }
        true
    }

    fn on_stream_end(&self, path: &str) {
        if let Some(counter) = self
            .streams
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(path)
        {
            info!(
                "Stream end - path({}) video frames({}) audio frames({})",
                path,
                counter.video.load(Ordering::Relaxed),
                counter.audio.load(Ordering::Relaxed)
            );
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    // Create server configuration
    let config = ServerConfig::builder()
        .host("0.0.0.0")
        .port(1935)
        .max_connections(100)
        .chunk_size(4096)
        .build()?;

    info!("Configuration:");
    info!("  - Max connections: {}", config.max_connections);
    info!("  - Chunk size: {}", config.chunk_size);
    info!("  - Receive timeout: {:?}", config.recv_timeout);

    let server = RtmpServer::with_relay(config, Arc::new(LoggingRelay::default()));
    server.listen()?;

    info!("Press Ctrl+C to stop");
    tokio::signal::ctrl_c().await?;

    info!("Received Ctrl+C, shutting down server...");
    server.shutdown();

    info!("Server stopped");
    Ok(())
}
