//! Inbound interface from the mirroring protocol layer
//!
//! The protocol thread terminates the connection, decrypts the streams and
//! pushes raw units through [`MediaConsumer`]. Calls only flow into the core.

use bytes::Bytes;

use crate::audio::AudioFormatId;

/// Video stream announcement.
///
/// Carries no resolution; size changes are reported by the decoders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoStreamInfo {
    pub connection_id: String,
}

/// Audio stream announcement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioStreamInfo {
    pub format: AudioFormatId,
}

impl AudioStreamInfo {
    /// Build from the announcement mask value sent on the wire
    pub fn from_code(code: u64) -> Self {
        Self {
            format: AudioFormatId::from_code(code),
        }
    }
}

/// Receiver of everything the protocol thread produces.
///
/// Methods are infallible from the producer's side; implementors log
/// and count their own failures.
pub trait MediaConsumer: Send + Sync {
    /// One encoded video access unit
    fn on_video(&self, unit: Bytes);

    fn on_video_format(&self, info: VideoStreamInfo);

    /// One encoded or PCM audio frame
    fn on_audio(&self, unit: Bytes);

    fn on_audio_format(&self, info: AudioStreamInfo);

    fn on_video_disconnect(&self);

    fn on_audio_disconnect(&self);
}
