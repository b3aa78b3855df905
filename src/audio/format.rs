//! Audio format identifiers and PCM parameter negotiation
//!
//! The sender announces its stream format as a single bit in a 64-bit mask.
//! [`negotiate`] turns that identifier into the PCM parameters the audio
//! sink is configured with.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::constants::{FALLBACK_CHANNELS, FALLBACK_SAMPLE_RATE, NORMALIZED_BITS_PER_SAMPLE};

/// Stream formats a mirroring sender can announce.
///
/// The discriminant is the bit position of the format in the announcement
/// mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
#[repr(u8)]
pub enum AudioFormat {
    Pcm8000_16_1 = 2,
    Pcm8000_16_2 = 3,
    Pcm16000_16_1 = 4,
    Pcm16000_16_2 = 5,
    Pcm24000_16_1 = 6,
    Pcm24000_16_2 = 7,
    Pcm32000_16_1 = 8,
    Pcm32000_16_2 = 9,
    Pcm44100_16_1 = 10,
    Pcm44100_16_2 = 11,
    Pcm44100_24_1 = 12,
    Pcm44100_24_2 = 13,
    Pcm48000_16_1 = 14,
    Pcm48000_16_2 = 15,
    Pcm48000_24_1 = 16,
    Pcm48000_24_2 = 17,
    Alac44100_16_2 = 18,
    Alac44100_24_2 = 19,
    Alac48000_16_2 = 20,
    Alac48000_24_2 = 21,
    AacLc44100_2 = 22,
    AacLc48000_2 = 23,
    AacEld44100_2 = 24,
    AacEld48000_2 = 25,
    AacEld16000_1 = 26,
    AacEld24000_1 = 27,
    Opus16000_1 = 28,
    Opus24000_1 = 29,
    Opus48000_1 = 30,
    AacEld44100_1 = 31,
    AacEld48000_1 = 32,
}

impl AudioFormat {
    pub const ALL: [AudioFormat; 31] = [
        AudioFormat::Pcm8000_16_1,
        AudioFormat::Pcm8000_16_2,
        AudioFormat::Pcm16000_16_1,
        AudioFormat::Pcm16000_16_2,
        AudioFormat::Pcm24000_16_1,
        AudioFormat::Pcm24000_16_2,
        AudioFormat::Pcm32000_16_1,
        AudioFormat::Pcm32000_16_2,
        AudioFormat::Pcm44100_16_1,
        AudioFormat::Pcm44100_16_2,
        AudioFormat::Pcm44100_24_1,
        AudioFormat::Pcm44100_24_2,
        AudioFormat::Pcm48000_16_1,
        AudioFormat::Pcm48000_16_2,
        AudioFormat::Pcm48000_24_1,
        AudioFormat::Pcm48000_24_2,
        AudioFormat::Alac44100_16_2,
        AudioFormat::Alac44100_24_2,
        AudioFormat::Alac48000_16_2,
        AudioFormat::Alac48000_24_2,
        AudioFormat::AacLc44100_2,
        AudioFormat::AacLc48000_2,
        AudioFormat::AacEld44100_2,
        AudioFormat::AacEld48000_2,
        AudioFormat::AacEld16000_1,
        AudioFormat::AacEld24000_1,
        AudioFormat::Opus16000_1,
        AudioFormat::Opus24000_1,
        AudioFormat::Opus48000_1,
        AudioFormat::AacEld44100_1,
        AudioFormat::AacEld48000_1,
    ];

    /// Announcement mask value for this format
    pub fn code(self) -> u64 {
        1u64 << (self as u8)
    }

    /// Look up a format by its announcement mask value
    pub fn from_code(code: u64) -> Option<Self> {
        Self::ALL.into_iter().find(|format| format.code() == code)
    }

    /// Sample rate and channel count carried by the format
    fn rate_and_channels(self) -> (u32, u16) {
        use AudioFormat::*;
        match self {
            Pcm8000_16_1 => (8000, 1),
            Pcm8000_16_2 => (8000, 2),
            Pcm16000_16_1 | AacEld16000_1 | Opus16000_1 => (16000, 1),
            Pcm16000_16_2 => (16000, 2),
            Pcm24000_16_1 | AacEld24000_1 | Opus24000_1 => (24000, 1),
            Pcm24000_16_2 => (24000, 2),
            Pcm32000_16_1 => (32000, 1),
            Pcm32000_16_2 => (32000, 2),
            Pcm44100_16_1 | Pcm44100_24_1 | AacEld44100_1 => (44100, 1),
            Pcm44100_16_2 | Pcm44100_24_2 | Alac44100_16_2 | Alac44100_24_2 | AacLc44100_2
            | AacEld44100_2 => (44100, 2),
            Pcm48000_16_1 | Pcm48000_24_1 | AacEld48000_1 | Opus48000_1 => (48000, 1),
            Pcm48000_16_2 | Pcm48000_24_2 | Alac48000_16_2 | Alac48000_24_2 | AacLc48000_2
            | AacEld48000_2 => (48000, 2),
        }
    }

    /// Wire name, e.g. `AAC_ELD_44100_2`
    pub fn name(self) -> &'static str {
        use AudioFormat::*;
        match self {
            Pcm8000_16_1 => "PCM_8000_16_1",
            Pcm8000_16_2 => "PCM_8000_16_2",
            Pcm16000_16_1 => "PCM_16000_16_1",
            Pcm16000_16_2 => "PCM_16000_16_2",
            Pcm24000_16_1 => "PCM_24000_16_1",
            Pcm24000_16_2 => "PCM_24000_16_2",
            Pcm32000_16_1 => "PCM_32000_16_1",
            Pcm32000_16_2 => "PCM_32000_16_2",
            Pcm44100_16_1 => "PCM_44100_16_1",
            Pcm44100_16_2 => "PCM_44100_16_2",
            Pcm44100_24_1 => "PCM_44100_24_1",
            Pcm44100_24_2 => "PCM_44100_24_2",
            Pcm48000_16_1 => "PCM_48000_16_1",
            Pcm48000_16_2 => "PCM_48000_16_2",
            Pcm48000_24_1 => "PCM_48000_24_1",
            Pcm48000_24_2 => "PCM_48000_24_2",
            Alac44100_16_2 => "ALAC_44100_16_2",
            Alac44100_24_2 => "ALAC_44100_24_2",
            Alac48000_16_2 => "ALAC_48000_16_2",
            Alac48000_24_2 => "ALAC_48000_24_2",
            AacLc44100_2 => "AAC_LC_44100_2",
            AacLc48000_2 => "AAC_LC_48000_2",
            AacEld44100_2 => "AAC_ELD_44100_2",
            AacEld48000_2 => "AAC_ELD_48000_2",
            AacEld16000_1 => "AAC_ELD_16000_1",
            AacEld24000_1 => "AAC_ELD_24000_1",
            Opus16000_1 => "OPUS_16000_1",
            Opus24000_1 => "OPUS_24000_1",
            Opus48000_1 => "OPUS_48000_1",
            AacEld44100_1 => "AAC_ELD_44100_1",
            AacEld48000_1 => "AAC_ELD_48000_1",
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AudioFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|format| format.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown audio format: {}", s))
    }
}

impl TryFrom<String> for AudioFormat {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AudioFormat> for String {
    fn from(format: AudioFormat) -> Self {
        format.name().to_string()
    }
}

/// Format identifier as handed over by the protocol layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AudioFormatId {
    Known(AudioFormat),
    /// A mask value outside the defined set
    Unknown(u64),
}

impl AudioFormatId {
    pub fn from_code(code: u64) -> Self {
        match AudioFormat::from_code(code) {
            Some(format) => AudioFormatId::Known(format),
            None => AudioFormatId::Unknown(code),
        }
    }
}

impl From<AudioFormat> for AudioFormatId {
    fn from(format: AudioFormat) -> Self {
        AudioFormatId::Known(format)
    }
}

impl fmt::Display for AudioFormatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AudioFormatId::Known(format) => write!(f, "{}", format),
            AudioFormatId::Unknown(code) => write!(f, "unknown(0x{:x})", code),
        }
    }
}

/// PCM parameters the audio sink is configured with.
///
/// `bits_per_sample` is the sink's output depth, always 16; it does not
/// describe the depth of the encoded source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AudioFormatDescriptor {
    pub sample_rate_hz: u32,
    pub channel_count: u16,
    pub bits_per_sample: u16,
}

impl AudioFormatDescriptor {
    /// Used for any identifier outside the defined set
    pub const FALLBACK: AudioFormatDescriptor = AudioFormatDescriptor {
        sample_rate_hz: FALLBACK_SAMPLE_RATE,
        channel_count: FALLBACK_CHANNELS,
        bits_per_sample: NORMALIZED_BITS_PER_SAMPLE,
    };

    /// Size of one interleaved PCM frame in bytes
    pub fn bytes_per_frame(&self) -> usize {
        self.channel_count as usize * (self.bits_per_sample as usize / 8)
    }

    pub fn bytes_per_second(&self) -> usize {
        self.bytes_per_frame() * self.sample_rate_hz as usize
    }
}

impl fmt::Display for AudioFormatDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} Hz / {} ch / {} bit",
            self.sample_rate_hz, self.channel_count, self.bits_per_sample
        )
    }
}

/// Map a format identifier to PCM parameters.
///
/// Total: identifiers outside the defined set yield
/// [`AudioFormatDescriptor::FALLBACK`].
pub fn negotiate(id: AudioFormatId) -> AudioFormatDescriptor {
    match id {
        AudioFormatId::Known(format) => {
            let (sample_rate_hz, channel_count) = format.rate_and_channels();
            AudioFormatDescriptor {
                sample_rate_hz,
                channel_count,
                bits_per_sample: NORMALIZED_BITS_PER_SAMPLE,
            }
        }
        AudioFormatId::Unknown(_) => AudioFormatDescriptor::FALLBACK,
    }
}
