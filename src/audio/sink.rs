//! Downstream audio sink contract

use bytes::Bytes;

use crate::audio::AudioFormatDescriptor;
use crate::error::SinkError;

/// The session's single audio decode/playback target.
///
/// `configure` is always called before the first `push` of a new format
/// epoch. Both are called from the producer thread.
pub trait AudioSink: Send + Sync {
    /// Human-readable name for logging
    fn name(&self) -> &str;

    /// (Re)configure output for a new format epoch
    fn configure(&self, format: AudioFormatDescriptor) -> Result<(), SinkError>;

    /// Accept one audio unit
    fn push(&self, unit: Bytes) -> Result<(), SinkError>;
}
