use crate::processing::bitop::BitReader;
use crate::{Error, Result, VIDEO_CODEC_AVC, VIDEO_DATA_MIN_SIZE};
use log::debug;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VideoCodec {
    /// Sorenson H.263
    H263,
    /// Screen video
    ScreenVideo,
    /// On2 VP6
    VP6,
    /// On2 VP6 with alpha
    VP6Alpha,
    /// Screen video v2
    ScreenVideo2,
    /// H.264 AVC
    H264,
    /// H.265 HEVC
    H265,
    /// AV1
    AV1,
    /// Unknown
    Unknown(u8),
}

impl VideoCodec {
    /// Parse from codec ID
    pub fn from_codec_id(id: u8) -> Self {
        match id {
            2 => VideoCodec::H263,
            3 => VideoCodec::ScreenVideo,
            4 => VideoCodec::VP6,
            5 => VideoCodec::VP6Alpha,
            6 => VideoCodec::ScreenVideo2,
            7 => VideoCodec::H264,
            12 => VideoCodec::H265,
            13 => VideoCodec::AV1,
            _ => VideoCodec::Unknown(id),
        }
    }

    /// Get codec name
    pub fn name(&self) -> &str {
        match self {
            VideoCodec::H263 => "H.263",
            VideoCodec::ScreenVideo => "Screen",
            VideoCodec::VP6 => "VP6",
            VideoCodec::VP6Alpha => "VP6-Alpha",
            VideoCodec::ScreenVideo2 => "Screen-v2",
            VideoCodec::H264 => "H.264",
            VideoCodec::H265 => "H.265",
            VideoCodec::AV1 => "AV1",
            VideoCodec::Unknown(_) => "Unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrameType {
    /// Keyframe (I-frame)
    Keyframe,
    /// Inter-frame (P-frame)
    InterFrame,
    /// Disposable inter-frame
    DisposableInterFrame,
    /// Generated keyframe
    GeneratedKeyframe,
    /// Video info/command frame
    VideoInfo,
}

impl FrameType {
    pub fn from_bits(bits: u8) -> Self {
        match bits {
            1 => FrameType::Keyframe,
            2 => FrameType::InterFrame,
            3 => FrameType::DisposableInterFrame,
            4 => FrameType::GeneratedKeyframe,
            5 => FrameType::VideoInfo,
            _ => FrameType::InterFrame,
        }
    }

    pub fn is_keyframe(&self) -> bool {
        matches!(self, FrameType::Keyframe | FrameType::GeneratedKeyframe)
    }
}

/// Codec parameters taken from an AVC sequence header
#[derive(Debug, Clone, PartialEq)]
pub struct H264Config {
    /// Low nibble of the video tag byte
    pub codec_id: u8,
    pub conf_version: u8,
    pub profile: u8,
    pub compatibility: u8,
    pub level: u8,
    pub width: u32,
    pub height: u32,

    /// AVCDecoderConfigurationRecord (payload past the 5-byte tag prefix)
    pub avc_conf: Vec<u8>,
}

impl H264Config {
    /// Level as written in codec strings, e.g. 31 -> "3.1"
    pub fn level_string(&self) -> String {
        format!("{}.{}", self.level / 10, self.level % 10)
    }
}

/// Fields of interest from a sequence parameter set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpsInfo {
    pub profile_idc: u8,
    pub level_idc: u8,
    pub width: u32,
    pub height: u32,
}

/// Profiles whose SPS carries chroma format and bit depth fields
const HIGH_PROFILES: [u32; 9] = [100, 110, 122, 244, 44, 83, 86, 118, 128];

/// Parse an RTMP AVC sequence header (tag byte, packet type, composition time, config record)
pub fn parse_avc_sequence_header(payload: &[u8]) -> Result<H264Config> {
    let mut bits = BitReader::new(payload);
    bits.skip(VIDEO_DATA_MIN_SIZE * 8)?;

    let codec_id = payload[0] & 0x0F;
    let conf_version = bits.read(8)? as u8;
    let profile = bits.read(8)? as u8;
    let compatibility = bits.read(8)? as u8;
    let level = bits.read(8)? as u8;

    bits.skip(6)?;
    let _length_size_minus_one = bits.read(2)?;

    let mut width = 0;
    let mut height = 0;
    let num_sps = bits.read(8)? & 0x1F;
    if num_sps > 0 {
        let sps_size = bits.read(16)? as usize;
        if sps_size > 0 {
            let sps = bits.read_bytes(sps_size)?;
            let info = parse_sps(&sps)?;
            width = info.width;
            height = info.height;
        }
    }

    let num_pps = bits.read(8)?;
    if num_pps > 0 {
        let pps_size = bits.read(16)? as usize;
        bits.skip(pps_size * 8)?;
    }

    let config = H264Config {
        codec_id,
        conf_version,
        profile,
        compatibility,
        level,
        width,
        height,
        avc_conf: payload[VIDEO_DATA_MIN_SIZE..].to_vec(),
    };

    debug!(
        "Video config: codec={} version={} profile={} compat={} level={} {}x{}",
        config.codec_id,
        config.conf_version,
        config.profile,
        config.compatibility,
        config.level_string(),
        config.width,
        config.height
    );

    Ok(config)
}

/// Whether a video payload is an AVC sequence header
pub fn is_avc_sequence_header(payload: &[u8]) -> bool {
    payload.len() > 1 && payload[0] & 0x0F == VIDEO_CODEC_AVC && payload[1] == 0
}

fn skip_scaling_list(bits: &mut BitReader, size: usize) -> Result<()> {
    let mut last_scale: i64 = 8;
    let mut next_scale: i64 = 8;
    for _ in 0..size {
        if next_scale != 0 {
            let delta = bits.read_signed_golomb()?;
            next_scale = (last_scale + delta + 256).rem_euclid(256);
        }
        if next_scale != 0 {
            last_scale = next_scale;
        }
    }
    Ok(())
}

/// Parse an SPS NAL unit (including its 1-byte NAL header) for picture size
pub fn parse_sps(sps: &[u8]) -> Result<SpsInfo> {
    let mut bits = BitReader::new(sps);
    bits.skip(8)?;

    let profile_idc = bits.read(8)?;
    let _constraint_flags = bits.read(6)?;
    let _reserved_zero = bits.read(2)?;
    let level_idc = bits.read(8)?;
    let _seq_parameter_set_id = bits.read_golomb()?;

    if HIGH_PROFILES.contains(&profile_idc) {
        let chroma_format_idc = bits.read_golomb()?;
        if chroma_format_idc == 3 {
            let _separate_colour_plane = bits.read(1)?;
        }
        let _bit_depth_luma_minus8 = bits.read_golomb()?;
        let _bit_depth_chroma_minus8 = bits.read_golomb()?;
        bits.skip(1)?;

        if bits.read_bit()? {
            let lists = if chroma_format_idc != 3 { 8 } else { 12 };
            for i in 0..lists {
                if bits.read_bit()? {
                    skip_scaling_list(&mut bits, if i < 6 { 16 } else { 64 })?;
                }
            }
        }
    }

    let _log2_max_frame_num_minus4 = bits.read_golomb()?;
    let pic_order_cnt_type = bits.read_golomb()?;
    if pic_order_cnt_type == 0 {
        let _log2_max_poc_lsb_minus4 = bits.read_golomb()?;
    } else if pic_order_cnt_type == 1 {
        bits.skip(1)?;
        let _offset_for_non_ref_pic = bits.read_golomb()?;
        let _offset_for_top_to_bottom_field = bits.read_golomb()?;
        let cycle = bits.read_golomb()?;
        for _ in 0..cycle {
            bits.read_golomb()?;
        }
    }

    let _max_num_ref_frames = bits.read_golomb()?;
    bits.skip(1)?;

    let width_in_mbs_minus1 = bits.read_golomb()? as u64;
    let height_in_map_units_minus1 = bits.read_golomb()? as u64;

    let frame_mbs_only = bits.read(1)? as u64;
    if frame_mbs_only == 0 {
        bits.skip(1)?;
    }
    bits.skip(1)?;

    let (mut crop_left, mut crop_right, mut crop_top, mut crop_bottom) = (0u64, 0u64, 0u64, 0u64);
    if bits.read_bit()? {
        crop_left = bits.read_golomb()? as u64;
        crop_right = bits.read_golomb()? as u64;
        crop_top = bits.read_golomb()? as u64;
        crop_bottom = bits.read_golomb()? as u64;
    }

    let width = ((width_in_mbs_minus1 + 1) * 16).saturating_sub((crop_left + crop_right) * 2);
    let height = ((2 - frame_mbs_only) * (height_in_map_units_minus1 + 1) * 16)
        .saturating_sub((crop_top + crop_bottom) * 2);

    Ok(SpsInfo {
        profile_idc: profile_idc as u8,
        level_idc: level_idc as u8,
        width: u32::try_from(width).map_err(|_| Error::out_of_range(format!("SPS width {} too large", width)))?,
        height: u32::try_from(height).map_err(|_| Error::out_of_range(format!("SPS height {} too large", height)))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::bitop::BitWriter;

    fn baseline_sps(width_mbs_minus1: u32, height_units_minus1: u32, crop_bottom: Option<u32>) -> Vec<u8> {
        let mut w = BitWriter::new();
        w.write(8, 0x67);
        w.write(8, 66);
        w.write(8, 0);
        w.write(8, 31);
        w.write_golomb(0); // sps id
        w.write_golomb(0); // log2_max_frame_num_minus4
        w.write_golomb(0); // poc type
        w.write_golomb(0); // log2_max_poc_lsb_minus4
        w.write_golomb(1); // max refs
        w.write_bit(false);
        w.write_golomb(width_mbs_minus1);
        w.write_golomb(height_units_minus1);
        w.write_bit(true); // frame_mbs_only
        w.write_bit(true); // direct_8x8
        match crop_bottom {
            Some(bottom) => {
                w.write_bit(true);
                w.write_golomb(0);
                w.write_golomb(0);
                w.write_golomb(0);
                w.write_golomb(bottom);
            }
            None => w.write_bit(false),
        }
        w.write_bit(false); // vui
        w.write_bit(true); // stop bit
        w.into_bytes()
    }

    fn sequence_header(sps: &[u8]) -> Vec<u8> {
        let mut payload = vec![0x17, 0x00, 0, 0, 0, 1, 66, 0, 31, 0xFF, 0xE1];
        payload.extend_from_slice(&(sps.len() as u16).to_be_bytes());
        payload.extend_from_slice(sps);
        payload.extend_from_slice(&[1, 0, 4, 0x68, 0xCE, 0x38, 0x80]);
        payload
    }

    #[test]
    fn test_parse_baseline_720p() {
        let info = parse_sps(&baseline_sps(79, 44, None)).unwrap();
        assert_eq!((info.width, info.height), (1280, 720));
        assert_eq!(info.profile_idc, 66);
        assert_eq!(info.level_idc, 31);
    }

    #[test]
    fn test_crop_applied() {
        let info = parse_sps(&baseline_sps(119, 67, Some(4))).unwrap();
        assert_eq!((info.width, info.height), (1920, 1080));
    }

    #[test]
    fn test_parse_sequence_header() {
        let payload = sequence_header(&baseline_sps(39, 29, None));
        let config = parse_avc_sequence_header(&payload).unwrap();

        assert_eq!(config.codec_id, 7);
        assert_eq!(config.conf_version, 1);
        assert_eq!(config.profile, 66);
        assert_eq!(config.level, 31);
        assert_eq!(config.level_string(), "3.1");
        assert_eq!((config.width, config.height), (640, 480));
        assert_eq!(config.avc_conf, payload[5..].to_vec());
        assert!(is_avc_sequence_header(&payload));
    }

    #[test]
    fn test_high_profile_with_scaling_matrix() {
        let mut w = BitWriter::new();
        w.write(8, 0x67);
        w.write(8, 100);
        w.write(8, 0);
        w.write(8, 40);
        w.write_golomb(0);
        w.write_golomb(1); // chroma 4:2:0
        w.write_golomb(0);
        w.write_golomb(0);
        w.write_bit(false);
        w.write_bit(true); // scaling matrix present
        for i in 0..8 {
            // only the first list carries explicit deltas
            w.write_bit(i == 0);
            if i == 0 {
                for _ in 0..16 {
                    w.write_signed_golomb(0);
                }
            }
        }
        w.write_golomb(0);
        w.write_golomb(2); // poc type 2
        w.write_golomb(4);
        w.write_bit(false);
        w.write_golomb(119);
        w.write_golomb(67);
        w.write_bit(true);
        w.write_bit(true);
        w.write_bit(true);
        w.write_golomb(0);
        w.write_golomb(0);
        w.write_golomb(0);
        w.write_golomb(4);
        w.write_bit(true);

        let info = parse_sps(&w.into_bytes()).unwrap();
        assert_eq!((info.width, info.height), (1920, 1080));
    }

    #[test]
    fn test_truncated_header_is_out_of_range() {
        let payload = sequence_header(&baseline_sps(79, 44, None));
        for len in [0, 3, 9, 14] {
            assert!(parse_avc_sequence_header(&payload[..len]).is_err(), "len {}", len);
        }
    }
}
