use crate::processing::bitop::BitReader;
use crate::{Error, Result, AUDIO_DATA_MIN_SIZE, SOUND_FORMAT_AAC};
use log::debug;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AudioCodec {
    /// Linear PCM, platform endian
    PCM,
    /// ADPCM
    ADPCM,
    /// MP3
    MP3,
    /// Linear PCM, little endian
    PCMLittleEndian,
    /// Nellymoser 16kHz mono
    Nellymoser16kHz,
    /// Nellymoser 8kHz mono
    Nellymoser8kHz,
    /// Nellymoser
    Nellymoser,
    /// G.711 A-law
    G711ALaw,
    /// G.711 mu-law
    G711MuLaw,
    /// Reserved
    Reserved,
    /// AAC
    AAC,
    /// Speex
    Speex,
    /// Opus (enhanced RTMP)
    Opus,
    /// MP3 8kHz
    MP38kHz,
    /// Device specific
    DeviceSpecific,
}

impl AudioCodec {
    /// Parse from sound format field
    pub fn from_sound_format(format: u8) -> Self {
        match format {
            0 => AudioCodec::PCM,
            1 => AudioCodec::ADPCM,
            2 => AudioCodec::MP3,
            3 => AudioCodec::PCMLittleEndian,
            4 => AudioCodec::Nellymoser16kHz,
            5 => AudioCodec::Nellymoser8kHz,
            6 => AudioCodec::Nellymoser,
            7 => AudioCodec::G711ALaw,
            8 => AudioCodec::G711MuLaw,
            10 => AudioCodec::AAC,
            11 => AudioCodec::Speex,
            13 => AudioCodec::Opus,
            14 => AudioCodec::MP38kHz,
            15 => AudioCodec::DeviceSpecific,
            _ => AudioCodec::Reserved,
        }
    }

    /// Get codec name
    pub fn name(&self) -> &'static str {
        match self {
            AudioCodec::PCM => "PCM",
            AudioCodec::ADPCM => "ADPCM",
            AudioCodec::MP3 => "MP3",
            AudioCodec::PCMLittleEndian => "PCM-LE",
            AudioCodec::Nellymoser16kHz => "Nellymoser 16 kHz",
            AudioCodec::Nellymoser8kHz => "Nellymoser 8 kHz",
            AudioCodec::Nellymoser => "Nellymoser",
            AudioCodec::G711ALaw => "G.711 A-law",
            AudioCodec::G711MuLaw => "G.711 mu-law",
            AudioCodec::AAC => "AAC",
            AudioCodec::Speex => "Speex",
            AudioCodec::Opus => "Opus",
            AudioCodec::MP38kHz => "MP3 8 kHz",
            AudioCodec::Reserved | AudioCodec::DeviceSpecific => "Unknown",
        }
    }

    /// Rate fixed by the codec regardless of the tag's rate bits
    pub fn fixed_sample_rate(&self) -> Option<u32> {
        match self {
            AudioCodec::Nellymoser16kHz | AudioCodec::Speex => Some(16000),
            AudioCodec::Nellymoser8kHz | AudioCodec::G711ALaw | AudioCodec::G711MuLaw | AudioCodec::MP38kHz => {
                Some(8000)
            }
            _ => None,
        }
    }
}

/// Rates selected by the two sound-rate bits of the tag byte
pub const SOUND_RATES: [u32; 4] = [5512, 11025, 22050, 44100];

/// AudioSpecificConfig sampling frequency table
pub const AAC_SAMPLE_RATES: [u32; 13] = [
    96000, 88200, 64000, 48000, 44100, 32000, 24000, 22050, 16000, 12000, 11025, 8000, 7350,
];

/// Channel count by AudioSpecificConfig channel configuration
pub const AAC_CHANNELS: [u8; 8] = [0, 1, 2, 3, 4, 5, 6, 8];

/// Decoded AudioSpecificConfig
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AacSpecificConfig {
    pub object_type: u8,
    pub sample_index: u8,
    pub sample_rate: u32,
    pub chan_config: u8,
    pub channels: u8,
    pub sbr: bool,
    pub ps: bool,
    pub ext_object_type: u8,
}

impl AacSpecificConfig {
    /// Parse from an RTMP AAC sequence header (the config starts after the 2-byte tag prefix)
    pub fn parse(sequence_header: &[u8]) -> Result<Self> {
        let mut bits = BitReader::new(sequence_header);
        bits.skip(16)?;

        let mut object_type = bits.read(5)? as u8;
        let (mut sample_rate, mut sample_index) = read_sample_rate(&mut bits)?;
        let chan_config = bits.read(4)? as u8;
        let channels = AAC_CHANNELS.get(chan_config as usize).copied().unwrap_or(0);

        let mut sbr = false;
        let mut ps = false;
        let mut ext_object_type = 0;
        if object_type == 5 || object_type == 29 {
            ps = object_type == 29;
            sbr = true;
            ext_object_type = 5;
            (sample_rate, sample_index) = read_sample_rate(&mut bits)?;
            object_type = bits.read(5)? as u8;
        }

        Ok(AacSpecificConfig {
            object_type,
            sample_index,
            sample_rate,
            chan_config,
            channels,
            sbr,
            ps,
            ext_object_type,
        })
    }

    pub fn profile_name(&self) -> &'static str {
        match self.object_type {
            1 => "Main",
            2 if self.ps => "HEv2",
            2 if self.sbr => "HE",
            2 => "LC",
            3 => "SSR",
            4 => "LTP",
            5 => "SBR",
            _ => "",
        }
    }
}

fn read_sample_rate(bits: &mut BitReader) -> Result<(u32, u8)> {
    let index = bits.read(4)? as u8;
    if index == 0x0F {
        return Ok((bits.read(24)?, index));
    }
    let rate = AAC_SAMPLE_RATES
        .get(index as usize)
        .copied()
        .ok_or_else(|| Error::out_of_range(format!("Reserved AAC sampling index {}", index)))?;
    Ok((rate, index))
}

/// Audio parameters taken from the first usable audio message
#[derive(Debug, Clone, PartialEq)]
pub struct AudioConfig {
    pub sound_format: u8,
    pub sound_rate: u8,
    pub sound_size: u8,
    pub sound_type: u8,
    pub codec_name: &'static str,
    pub sample_rate: u32,
    pub channels: u8,
    /// Bits per sample: 8 or 16
    pub sample_size: u32,
    pub sample_index: u32,
    /// Empty unless an AAC config was decoded
    pub profile_name: &'static str,
    pub aac: Option<AacSpecificConfig>,
    pub sequence_header: Option<Vec<u8>>,
}

impl AudioConfig {
    pub fn codec(&self) -> AudioCodec {
        AudioCodec::from_sound_format(self.sound_format)
    }
}

/// Parse the audio tag byte and, for AAC or Opus sequence headers, the codec config
pub fn parse_audio_config(payload: &[u8]) -> Result<AudioConfig> {
    if payload.len() < AUDIO_DATA_MIN_SIZE {
        return Err(Error::out_of_range(format!("Audio payload of {} bytes", payload.len())));
    }

    let tag = payload[0];
    let sound_format = (tag >> 4) & 0x0F;
    let sound_rate = (tag >> 2) & 0x03;
    let sound_size = (tag >> 1) & 0x01;
    let sound_type = tag & 0x01;

    let codec = AudioCodec::from_sound_format(sound_format);
    let mut config = AudioConfig {
        sound_format,
        sound_rate,
        sound_size,
        sound_type,
        codec_name: codec.name(),
        sample_rate: codec.fixed_sample_rate().unwrap_or(SOUND_RATES[sound_rate as usize]),
        channels: sound_type + 1,
        sample_size: (sound_size as u32 + 1) * 8,
        sample_index: 0,
        profile_name: "",
        aac: None,
        sequence_header: None,
    };

    if matches!(codec, AudioCodec::AAC | AudioCodec::Opus) && payload[1] == 0 {
        config.sequence_header = Some(payload.to_vec());

        if sound_format == SOUND_FORMAT_AAC {
            let aac = AacSpecificConfig::parse(payload)?;
            config.profile_name = aac.profile_name();
            config.sample_rate = aac.sample_rate;
            config.sample_index = aac.sample_index as u32;
            config.channels = aac.channels;
            config.aac = Some(aac);
        } else {
            config.sample_rate = 48000;
            config.channels = *payload
                .get(11)
                .ok_or_else(|| Error::out_of_range("Opus sequence header too short for channel count"))?;
        }
    }

    debug!(
        "Audio config: codec={} rate={} channels={} size={} profile={}",
        config.codec_name, config.sample_rate, config.channels, config.sample_size, config.profile_name
    );

    Ok(config)
}

/// Whether an audio payload is an AAC sequence header
pub fn is_aac_sequence_header(payload: &[u8]) -> bool {
    payload.len() >= AUDIO_DATA_MIN_SIZE && (payload[0] >> 4) == SOUND_FORMAT_AAC && payload[1] == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aac_lc_44100_stereo() {
        // object type 2, index 4, channels 2
        let config = parse_audio_config(&[0xAF, 0x00, 0x12, 0x10]).unwrap();
        assert_eq!(config.codec_name, "AAC");
        assert_eq!(config.sample_rate, 44100);
        assert_eq!(config.sample_index, 4);
        assert_eq!(config.channels, 2);
        assert_eq!(config.sample_size, 16);
        assert_eq!(config.profile_name, "LC");
        assert!(config.sequence_header.is_some());
        assert!(is_aac_sequence_header(&[0xAF, 0x00, 0x12, 0x10]));
    }

    #[test]
    fn test_he_aac_extension() {
        // object 5, index 7 (22050), chan 2, ext index 4 (44100), object 2
        // 00101 0111 0010 0100 00010 -> 0x2B 0x92 0x08 (padded)
        let config = parse_audio_config(&[0xAF, 0x00, 0x2B, 0x92, 0x08, 0x00]).unwrap();
        let aac = config.aac.unwrap();
        assert!(aac.sbr);
        assert!(!aac.ps);
        assert_eq!(aac.object_type, 2);
        assert_eq!(config.sample_rate, 44100);
        assert_eq!(config.profile_name, "HE");
    }

    #[test]
    fn test_explicit_sample_rate() {
        // object 2, index 15, rate 0x00BB80 (48000), chan 1
        // 00010 1111 000000001011101110000000 0001
        let config = parse_audio_config(&[0xAF, 0x00, 0x17, 0x80, 0x5D, 0xC0, 0x08]).unwrap();
        assert_eq!(config.sample_rate, 48000);
        assert_eq!(config.sample_index, 15);
        assert_eq!(config.channels, 1);
    }

    #[test]
    fn test_reserved_sample_index_rejected() {
        // index 13
        assert!(parse_audio_config(&[0xAF, 0x00, 0x16, 0x90]).is_err());
        // index 14
        assert!(parse_audio_config(&[0xAF, 0x00, 0x17, 0x10]).is_err());
    }

    #[test]
    fn test_truncated_aac_config() {
        assert!(parse_audio_config(&[0xAF, 0x00, 0x12]).is_err());
        assert!(parse_audio_config(&[0xAF]).is_err());
    }

    #[test]
    fn test_fixed_rates_and_unknown_format() {
        let speex = parse_audio_config(&[0xB2, 0x01]).unwrap();
        assert_eq!(speex.codec_name, "Speex");
        assert_eq!(speex.sample_rate, 16000);

        let mp3 = parse_audio_config(&[0x2F, 0x01]).unwrap();
        assert_eq!(mp3.sample_rate, 44100);
        assert_eq!(mp3.channels, 2);

        let reserved = parse_audio_config(&[0x90, 0x01]).unwrap();
        assert_eq!(reserved.codec_name, "Unknown");
        assert_eq!(reserved.sample_rate, 5512);
        assert_eq!(reserved.channels, 1);
    }

    #[test]
    fn test_aac_raw_frame_keeps_tag_values() {
        let config = parse_audio_config(&[0xAF, 0x01, 0x21]).unwrap();
        assert!(config.aac.is_none());
        assert_eq!(config.sample_rate, 44100);
        assert!(!is_aac_sequence_header(&[0xAF, 0x01]));
    }
}
