use crate::amf::Amf0Document;
use crate::processing::{AudioConfig, H264Config, MetaInfo};
use std::fmt;

/// Bootstrap state of one published stream
#[derive(Debug, Clone, Default)]
pub struct MediaInfo {
    pub video: Option<H264Config>,
    pub audio: Option<AudioConfig>,
    pub video_seq_header: Option<Vec<u8>>,
    pub audio_seq_header: Option<Vec<u8>>,
    pub metadata: Option<Amf0Document>,
    pub meta_info: Option<MetaInfo>,
}

impl MediaInfo {
    /// Create new media info
    pub fn new() -> Self {
        MediaInfo::default()
    }

    /// Both codec configurations are known
    pub fn is_ready(&self) -> bool {
        self.video.is_some() && self.audio.is_some()
    }
}

impl fmt::Display for MediaInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (video_bps, video_fps, encoder) = match &self.meta_info {
            Some(meta) => (meta.video_bps, meta.video_fps, meta.encoder.as_str()),
            None => (0.0, 0.0, ""),
        };
        let (codec_id, width, height) = match &self.video {
            Some(video) => (video.codec_id, video.width, video.height),
            None => (0, 0, 0),
        };

        write!(
            f,
            "video({}/{:.2}k/{:.2}fps/{}*{}) ",
            codec_id, video_bps, video_fps, width, height
        )?;
        match &self.audio {
            Some(audio) => write!(
                f,
                "audio({}/{}ch/{}hz/{}/{}) ",
                audio.codec_name, audio.channels, audio.sample_rate, audio.sample_index, audio.sample_size
            )?,
            None => write!(f, "audio(/0ch/0hz/0/0) ")?,
        }
        write!(f, "encoder({})", encoder)
    }
}

/// One timestamped audio or video payload, shared with relay consumers
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub timestamp: u32,
    pub payload: Vec<u8>,
    pub is_video: bool,
}

impl Frame {
    /// Create new frame
    pub fn new(timestamp: u32, payload: Vec<u8>, is_video: bool) -> Self {
        Frame { timestamp, payload, is_video }
    }

    pub fn is_keyframe(&self) -> bool {
        self.is_video && crate::processing::is_keyframe(&self.payload)
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}
