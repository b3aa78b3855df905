//! Audio router
//!
//! Forwards audio units to the single audio sink. A format announcement
//! opens a new epoch; its descriptor is applied to the sink before any unit
//! of that epoch is forwarded. There is no startup queue: the audio sink
//! lives for the whole session.

use bytes::Bytes;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::audio::{negotiate, AudioFormatDescriptor, AudioFormatId, AudioSink};
use crate::config::AudioConfig;
use crate::error::SinkError;

/// What happened to an inbound audio unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioOutcome {
    Forwarded,
    /// Below the minimum unit size, treated as transport noise
    Dropped,
}

struct EpochState {
    epoch: u64,
    applied: Option<AudioFormatDescriptor>,
    /// Descriptor waiting to be applied before the next forwarded unit
    pending: Option<AudioFormatDescriptor>,
}

/// Routes audio units and format changes to the audio sink
pub struct AudioRouter {
    sink: Arc<dyn AudioSink>,
    min_unit_bytes: usize,
    state: Mutex<EpochState>,
    forwarded: AtomicU64,
    dropped: AtomicU64,
    failed: AtomicU64,
    format_changes: AtomicU64,
}

impl AudioRouter {
    /// Create a router for `sink`.
    ///
    /// Until the first format announcement the sink is configured with the
    /// configured initial format, or the fallback descriptor.
    pub fn new(sink: Arc<dyn AudioSink>, config: &AudioConfig) -> Self {
        let initial = config
            .initial_format
            .map(|format| negotiate(format.into()))
            .unwrap_or(AudioFormatDescriptor::FALLBACK);

        Self {
            sink,
            min_unit_bytes: config.min_unit_bytes,
            state: Mutex::new(EpochState {
                epoch: 0,
                applied: None,
                pending: Some(initial),
            }),
            forwarded: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            format_changes: AtomicU64::new(0),
        }
    }

    /// Start a new format epoch and configure the sink for it.
    ///
    /// If the sink fails to configure, the descriptor stays pending and is
    /// retried before the next unit is forwarded.
    pub fn on_format(&self, id: AudioFormatId) -> Result<AudioFormatDescriptor, SinkError> {
        let descriptor = negotiate(id);
        let epoch = {
            let mut state = self.state.lock();
            state.epoch += 1;
            state.pending = Some(descriptor);
            state.epoch
        };
        self.format_changes.fetch_add(1, Ordering::Relaxed);

        if matches!(id, AudioFormatId::Unknown(_)) {
            tracing::warn!(format = %id, %descriptor, "Unknown audio format, using fallback");
        }
        tracing::info!(format = %id, %descriptor, epoch, sink = self.sink.name(), "Audio format changed");

        self.apply_pending()?;
        Ok(descriptor)
    }

    /// Forward one audio unit, dropping units shorter than the minimum size
    pub fn on_audio_unit(&self, unit: Bytes) -> Result<AudioOutcome, SinkError> {
        if unit.len() < self.min_unit_bytes {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            tracing::trace!(len = unit.len(), "Skipping undersized audio unit");
            return Ok(AudioOutcome::Dropped);
        }

        let forwarded = self.apply_pending().and_then(|()| self.sink.push(unit));
        match forwarded {
            Ok(()) => {
                self.forwarded.fetch_add(1, Ordering::Relaxed);
                Ok(AudioOutcome::Forwarded)
            }
            Err(e) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                Err(e)
            }
        }
    }

    /// Descriptor currently applied to the sink
    pub fn current_format(&self) -> Option<AudioFormatDescriptor> {
        self.state.lock().applied
    }

    /// Number of format announcements seen
    pub fn epoch(&self) -> u64 {
        self.state.lock().epoch
    }

    /// Get statistics
    pub fn stats(&self) -> AudioRouterStats {
        let (epoch, format) = {
            let state = self.state.lock();
            (state.epoch, state.applied)
        };
        AudioRouterStats {
            epoch,
            format,
            forwarded: self.forwarded.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            format_changes: self.format_changes.load(Ordering::Relaxed),
        }
    }

    fn apply_pending(&self) -> Result<(), SinkError> {
        let Some(descriptor) = self.state.lock().pending.take() else {
            return Ok(());
        };

        match self.sink.configure(descriptor) {
            Ok(()) => {
                let mut state = self.state.lock();
                // A newer announcement may have arrived while configuring.
                if state.pending.is_none() {
                    state.applied = Some(descriptor);
                }
                tracing::debug!(%descriptor, sink = self.sink.name(), "Audio sink configured");
                Ok(())
            }
            Err(e) => {
                let mut state = self.state.lock();
                if state.pending.is_none() {
                    state.pending = Some(descriptor);
                }
                tracing::warn!(%descriptor, sink = self.sink.name(), error = %e, "Audio sink configuration failed");
                Err(e)
            }
        }
    }
}

/// Audio router statistics
#[derive(Debug, Clone, Serialize)]
pub struct AudioRouterStats {
    pub epoch: u64,
    pub format: Option<AudioFormatDescriptor>,
    pub forwarded: u64,
    pub dropped: u64,
    pub failed: u64,
    pub format_changes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::AudioFormat;
    use std::sync::atomic::AtomicBool;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Configure(AudioFormatDescriptor),
        Push(usize),
    }

    #[derive(Default)]
    struct ScriptedSink {
        calls: Mutex<Vec<Call>>,
        fail_configure: AtomicBool,
    }

    impl ScriptedSink {
        fn calls(&self) -> Vec<Call> {
            self.calls.lock().clone()
        }
    }

    impl AudioSink for ScriptedSink {
        fn name(&self) -> &str {
            "scripted"
        }

        fn configure(&self, format: AudioFormatDescriptor) -> Result<(), SinkError> {
            if self.fail_configure.load(Ordering::SeqCst) {
                return Err(SinkError::Configure("device busy".into()));
            }
            self.calls.lock().push(Call::Configure(format));
            Ok(())
        }

        fn push(&self, unit: Bytes) -> Result<(), SinkError> {
            self.calls.lock().push(Call::Push(unit.len()));
            Ok(())
        }
    }

    fn router(sink: &Arc<ScriptedSink>) -> AudioRouter {
        AudioRouter::new(sink.clone(), &AudioConfig::default())
    }

    #[test]
    fn test_size_threshold() {
        let sink = Arc::new(ScriptedSink::default());
        let router = router(&sink);

        assert_eq!(router.on_audio_unit(Bytes::from(vec![1u8; 9])), Ok(AudioOutcome::Dropped));
        assert_eq!(router.on_audio_unit(Bytes::from(vec![1u8; 10])), Ok(AudioOutcome::Forwarded));

        assert_eq!(
            sink.calls(),
            vec![Call::Configure(AudioFormatDescriptor::FALLBACK), Call::Push(10)]
        );
        assert_eq!(router.stats().dropped, 1);
    }

    #[test]
    fn test_format_applied_before_epoch_units() {
        let sink = Arc::new(ScriptedSink::default());
        let router = router(&sink);
        let eld = negotiate(AudioFormat::AacEld48000_2.into());

        router.on_audio_unit(Bytes::from(vec![0u8; 32])).unwrap();
        router.on_format(AudioFormat::AacEld48000_2.into()).unwrap();
        router.on_audio_unit(Bytes::from(vec![0u8; 64])).unwrap();

        assert_eq!(
            sink.calls(),
            vec![
                Call::Configure(AudioFormatDescriptor::FALLBACK),
                Call::Push(32),
                Call::Configure(eld),
                Call::Push(64),
            ]
        );
        assert_eq!(router.current_format(), Some(eld));
        assert_eq!(router.epoch(), 1);
    }

    #[test]
    fn test_failed_configure_retried_before_next_unit() {
        let sink = Arc::new(ScriptedSink::default());
        let router = router(&sink);
        sink.fail_configure.store(true, Ordering::SeqCst);

        assert!(router.on_format(AudioFormat::Pcm16000_16_1.into()).is_err());
        assert!(router.on_audio_unit(Bytes::from(vec![0u8; 20])).is_err());
        assert!(sink.calls().is_empty());

        sink.fail_configure.store(false, Ordering::SeqCst);
        assert_eq!(router.on_audio_unit(Bytes::from(vec![0u8; 20])), Ok(AudioOutcome::Forwarded));

        let pcm = negotiate(AudioFormat::Pcm16000_16_1.into());
        assert_eq!(sink.calls(), vec![Call::Configure(pcm), Call::Push(20)]);
        assert_eq!(router.stats().failed, 1);
    }

    #[test]
    fn test_initial_format_from_config() {
        let sink = Arc::new(ScriptedSink::default());
        let config = AudioConfig {
            initial_format: Some(AudioFormat::Opus24000_1),
            ..AudioConfig::default()
        };
        let router = AudioRouter::new(sink.clone(), &config);

        router.on_audio_unit(Bytes::from(vec![0u8; 10])).unwrap();
        assert_eq!(router.current_format(), Some(negotiate(AudioFormat::Opus24000_1.into())));
    }
}
