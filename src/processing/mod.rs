mod bitop;
mod audio;
mod video;
mod metadata;
mod media_info;

pub use bitop::*;
pub use audio::*;
pub use video::*;
pub use metadata::*;
pub use media_info::*;

pub fn detect_audio_codec(data: &[u8]) -> AudioCodec {
    if data.is_empty() {
        return AudioCodec::Reserved;
    }

    let sound_format = (data[0] >> 4) & 0x0F;
    AudioCodec::from_sound_format(sound_format)
}

pub fn detect_video_codec(data: &[u8]) -> VideoCodec {
    if data.is_empty() {
        return VideoCodec::Unknown(0);
    }

    let codec_id = data[0] & 0x0F;
    VideoCodec::from_codec_id(codec_id)
}

pub fn is_keyframe(video_data: &[u8]) -> bool {
    if video_data.is_empty() {
        return false;
    }

    FrameType::from_bits((video_data[0] >> 4) & 0x0F).is_keyframe()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_codecs() {
        assert_eq!(detect_video_codec(&[0x17]), VideoCodec::H264);
        assert_eq!(detect_video_codec(&[]), VideoCodec::Unknown(0));
        assert_eq!(detect_audio_codec(&[0xAF]), AudioCodec::AAC);
        assert_eq!(detect_audio_codec(&[]), AudioCodec::Reserved);
    }

    #[test]
    fn test_keyframe_flags() {
        assert!(is_keyframe(&[0x17]));
        assert!(is_keyframe(&[0x47]));
        assert!(!is_keyframe(&[0x27]));
        assert!(!is_keyframe(&[]));
    }
}
