use crate::amf::{Amf0Object, Amf0Value};

/// Stream properties announced by the encoder in `onMetaData`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetaInfo {
    pub video_fps: f64,
    pub video_bps: f64,
    pub video_width: u32,
    pub video_height: u32,
    pub audio_bps: f64,
    pub encoder: String,
}

impl MetaInfo {
    /// Extract from the metadata object (Object or ECMA array)
    pub fn from_amf(value: &Amf0Value) -> Option<Self> {
        value.as_object().map(Self::from_object)
    }

    pub fn from_object(obj: &Amf0Object) -> Self {
        let mut info = MetaInfo::default();

        // XSplit reports videodevice, OBS reports encoder
        info.encoder = obj
            .get_string("videodevice")
            .or_else(|| obj.get_string("encoder"))
            .unwrap_or_default()
            .replace('%', "");

        if let Some(fps) = obj.get_number("framerate").or_else(|| obj.get_number("videoframerate")) {
            info.video_fps = fps;
        }
        if let Some(width) = obj.get_number("width") {
            info.video_width = width as u32;
        }
        if let Some(height) = obj.get_number("height") {
            info.video_height = height as u32;
        }

        if let Some(bps) = obj.get_number("videodatarate") {
            info.video_bps = bps;
        }
        if let Some(bps) = obj.get_number("bitrate") {
            info.video_bps = bps;
        }
        if let Some(bps) = obj.get_string("maxBitrate") {
            info.video_bps = leading_integer(bps) as f64;
        }

        if let Some(bps) = obj.get_number("audiodatarate").or_else(|| obj.get_number("audiobitrate")) {
            info.audio_bps = bps;
        }

        info
    }
}

/// Integer value of the leading digits, 0 when there are none
fn leading_integer(text: &str) -> i64 {
    let trimmed = text.trim_start();
    let (sign, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let end = digits.find(|c: char| !c.is_ascii_digit()).unwrap_or(digits.len());
    digits[..end].parse::<i64>().map(|v| v * sign).unwrap_or(0)
}
