//! Mirroring session scope
//!
//! A [`MirrorSession`] owns the payload registry and both routers for the
//! lifetime of one mirroring connection. The protocol thread feeds it via
//! [`MediaConsumer`]; the host lifecycle thread attaches and detaches the
//! video sinks. Teardown clears whatever payloads are still registered.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use uuid::Uuid;

use crate::audio::{AudioRouter, AudioRouterStats, AudioSink};
use crate::buffer::{RegistryStats, SharedBufferRegistry};
use crate::config::AppConfig;
use crate::error::Result;
use crate::protocol::{AudioStreamInfo, MediaConsumer, VideoStreamInfo};
use crate::video::{Eye, VideoRouter, VideoRouterStats, VideoSink};

#[derive(Default)]
struct SessionCounters {
    video_format_changes: AtomicU64,
    video_disconnects: AtomicU64,
    audio_disconnects: AtomicU64,
    routing_errors: AtomicU64,
}

/// One mirroring session
pub struct MirrorSession {
    id: Uuid,
    started_at: DateTime<Utc>,
    registry: Arc<SharedBufferRegistry>,
    video: VideoRouter,
    audio: AudioRouter,
    connection_id: Mutex<Option<String>>,
    counters: SessionCounters,
    closed: AtomicBool,
}

impl MirrorSession {
    pub fn new(config: &AppConfig, audio_sink: Arc<dyn AudioSink>) -> Result<Self> {
        config.validate()?;

        let registry = SharedBufferRegistry::shared();
        let session = Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            video: VideoRouter::new(registry.clone(), &config.video),
            audio: AudioRouter::new(audio_sink, &config.audio),
            registry,
            connection_id: Mutex::new(None),
            counters: SessionCounters::default(),
            closed: AtomicBool::new(false),
        };

        tracing::info!(session = %session.id, "Mirroring session started");
        Ok(session)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Registry the video sinks release payloads on
    pub fn registry(&self) -> Arc<SharedBufferRegistry> {
        self.registry.clone()
    }

    pub fn video(&self) -> &VideoRouter {
        &self.video
    }

    pub fn audio(&self) -> &AudioRouter {
        &self.audio
    }

    /// A rendering surface became available for `eye`
    pub fn attach_video(&self, eye: Eye, sink: Arc<dyn VideoSink>) -> Result<()> {
        self.video.attach(eye, sink)
    }

    /// The rendering surface for `eye` went away
    pub fn detach_video(&self, eye: Eye) -> Option<Arc<dyn VideoSink>> {
        self.video.detach(eye)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Tear the session down, returning the number of payloads that were
    /// never fully released. Later calls are no-ops.
    pub fn shutdown(&self) -> usize {
        if self.closed.swap(true, Ordering::SeqCst) {
            return 0;
        }

        let discarded = self.video.shutdown();
        let unreleased = self.registry.clear();
        tracing::info!(
            session = %self.id,
            discarded,
            unreleased,
            uptime_secs = (Utc::now() - self.started_at).num_seconds(),
            "Mirroring session closed"
        );
        unreleased
    }

    /// Get statistics
    pub fn stats(&self) -> SessionStats {
        SessionStats {
            session_id: self.id,
            started_at: self.started_at,
            connection_id: self.connection_id.lock().clone(),
            closed: self.is_closed(),
            registry: self.registry.stats(),
            video: self.video.stats(),
            audio: self.audio.stats(),
            video_format_changes: self.counters.video_format_changes.load(Ordering::Relaxed),
            video_disconnects: self.counters.video_disconnects.load(Ordering::Relaxed),
            audio_disconnects: self.counters.audio_disconnects.load(Ordering::Relaxed),
            routing_errors: self.counters.routing_errors.load(Ordering::Relaxed),
        }
    }

    fn routing_error(&self, stream: &str, error: &dyn std::fmt::Display) {
        self.counters.routing_errors.fetch_add(1, Ordering::Relaxed);
        tracing::warn!(session = %self.id, stream, %error, "Failed to route unit");
    }
}

impl MediaConsumer for MirrorSession {
    fn on_video(&self, unit: Bytes) {
        if self.is_closed() {
            tracing::debug!(len = unit.len(), "Session closed, ignoring video unit");
            return;
        }
        if let Err(e) = self.video.on_video_unit(unit) {
            self.routing_error("video", &e);
        }
    }

    fn on_video_format(&self, info: VideoStreamInfo) {
        self.counters.video_format_changes.fetch_add(1, Ordering::Relaxed);
        tracing::info!(session = %self.id, connection = %info.connection_id, "Video format changed");
        *self.connection_id.lock() = Some(info.connection_id);
    }

    fn on_audio(&self, unit: Bytes) {
        if self.is_closed() {
            tracing::debug!(len = unit.len(), "Session closed, ignoring audio unit");
            return;
        }
        if let Err(e) = self.audio.on_audio_unit(unit) {
            self.routing_error("audio", &e);
        }
    }

    fn on_audio_format(&self, info: AudioStreamInfo) {
        if let Err(e) = self.audio.on_format(info.format) {
            self.routing_error("audio", &e);
        }
    }

    fn on_video_disconnect(&self) {
        self.counters.video_disconnects.fetch_add(1, Ordering::Relaxed);
        tracing::info!(session = %self.id, "Video source disconnected");
    }

    fn on_audio_disconnect(&self) {
        self.counters.audio_disconnects.fetch_add(1, Ordering::Relaxed);
        tracing::info!(session = %self.id, "Audio source disconnected");
    }
}

impl Drop for MirrorSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Point-in-time session snapshot
#[derive(Debug, Clone, Serialize)]
pub struct SessionStats {
    pub session_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub connection_id: Option<String>,
    pub closed: bool,
    pub registry: RegistryStats,
    pub video: VideoRouterStats,
    pub audio: AudioRouterStats,
    pub video_format_changes: u64,
    pub video_disconnects: u64,
    pub audio_disconnects: u64,
    pub routing_errors: u64,
}
