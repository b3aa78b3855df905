//! Dual-sink frame router
//!
//! Every inbound access unit is registered once and fanned out as one
//! [`FrameHandle`] per eye. Each eye has a lane holding its sink (once
//! attached) and a [`PendingQueue`].
//!
//! Units always enter the lane's queue first. Whoever finds the lane ready
//! and idle becomes its drainer: it repeatedly takes the whole queue as a
//! batch and delivers it with the lane lock released. Units arriving during
//! a drain are appended behind the batch and delivered by the same drainer,
//! so a sink observes exactly the arrival order.

use bytes::Bytes;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::buffer::{PayloadId, PendingQueue, SharedBufferRegistry};
use crate::config::VideoConfig;
use crate::constants::VIDEO_CONSUMERS;
use crate::error::{Result, RouterError};
use crate::video::{nal, Eye, FrameHandle, SinkState, VideoSink};

struct Lane {
    eye: Eye,
    inner: Mutex<LaneInner>,
    delivered: AtomicU64,
    evicted: AtomicU64,
    rejected: AtomicU64,
    attaches: AtomicU64,
}

struct LaneInner {
    sink: Option<Arc<dyn VideoSink>>,
    pending: PendingQueue,
    draining: bool,
}

impl Lane {
    fn new(eye: Eye, config: &VideoConfig) -> Self {
        Self {
            eye,
            inner: Mutex::new(LaneInner {
                sink: None,
                pending: PendingQueue::new(config.max_pending, config.overflow_policy),
                draining: false,
            }),
            delivered: AtomicU64::new(0),
            evicted: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            attaches: AtomicU64::new(0),
        }
    }
}

/// Routes video access units to the left and right sinks
pub struct VideoRouter {
    registry: Arc<SharedBufferRegistry>,
    lanes: [Lane; 2],
    next_sequence: AtomicU64,
}

impl VideoRouter {
    pub fn new(registry: Arc<SharedBufferRegistry>, config: &VideoConfig) -> Self {
        Self {
            registry,
            lanes: [Lane::new(Eye::Left, config), Lane::new(Eye::Right, config)],
            next_sequence: AtomicU64::new(0),
        }
    }

    /// Registry the routed payloads live in
    pub fn registry(&self) -> &Arc<SharedBufferRegistry> {
        &self.registry
    }

    /// Route one access unit to both eyes, returning its arrival sequence.
    ///
    /// Expected to be called from a single producer thread.
    pub fn on_video_unit(&self, unit: Bytes) -> Result<u64> {
        let keyframe = nal::is_keyframe(&unit);
        let len = unit.len();
        let payload = self.registry.register(unit, VIDEO_CONSUMERS)?;
        let sequence = self.next_sequence.fetch_add(1, Ordering::Relaxed);

        tracing::trace!(sequence, payload = %payload, len, ?keyframe, "Video unit routed");

        for lane in &self.lanes {
            let handle = FrameHandle::new(payload, sequence, lane.eye, len, keyframe);
            self.route(lane, handle);
        }

        Ok(sequence)
    }

    /// Mark an eye ready with its sink and flush everything queued for it.
    ///
    /// A slot accepts one sink instance at a time; attaching while a sink is
    /// present fails with [`RouterError::AlreadyAttached`].
    pub fn attach(&self, eye: Eye, sink: Arc<dyn VideoSink>) -> Result<()> {
        let lane = self.lane(eye);

        let pump = {
            let mut inner = lane.inner.lock();
            if inner.sink.is_some() {
                return Err(RouterError::AlreadyAttached(eye).into());
            }

            tracing::info!(
                %eye,
                sink = sink.name(),
                pending = inner.pending.len(),
                "Video sink ready"
            );
            inner.sink = Some(sink);
            !std::mem::replace(&mut inner.draining, true)
        };

        lane.attaches.fetch_add(1, Ordering::Relaxed);
        if pump {
            self.pump(lane);
        }
        Ok(())
    }

    /// End the current sink instance for an eye.
    ///
    /// The slot returns to [`SinkState::NotReady`] and queues new units until
    /// the next attach. Handles already delivered stay the old sink's to
    /// release.
    pub fn detach(&self, eye: Eye) -> Option<Arc<dyn VideoSink>> {
        let sink = self.lane(eye).inner.lock().sink.take();
        if let Some(ref sink) = sink {
            tracing::info!(%eye, sink = sink.name(), "Video sink detached");
        }
        sink
    }

    /// Detach both sinks and discard queued handles, returning how many
    /// handles were discarded. Their payloads are left for registry teardown.
    pub fn shutdown(&self) -> usize {
        self.lanes
            .iter()
            .map(|lane| {
                let mut inner = lane.inner.lock();
                inner.sink = None;
                inner.pending.clear().len()
            })
            .sum()
    }

    pub fn state(&self, eye: Eye) -> SinkState {
        if self.lane(eye).inner.lock().sink.is_some() {
            SinkState::Ready
        } else {
            SinkState::NotReady
        }
    }

    /// Handles waiting for an eye's sink
    pub fn pending_len(&self, eye: Eye) -> usize {
        self.lane(eye).inner.lock().pending.len()
    }

    /// Get statistics
    pub fn stats(&self) -> VideoRouterStats {
        VideoRouterStats {
            units: self.next_sequence.load(Ordering::Relaxed),
            lanes: self
                .lanes
                .iter()
                .map(|lane| {
                    let (state, pending, high_water_mark) = {
                        let inner = lane.inner.lock();
                        let state = if inner.sink.is_some() {
                            SinkState::Ready
                        } else {
                            SinkState::NotReady
                        };
                        (state, inner.pending.len(), inner.pending.high_water_mark())
                    };
                    LaneStats {
                        eye: lane.eye,
                        state,
                        pending,
                        high_water_mark,
                        delivered: lane.delivered.load(Ordering::Relaxed),
                        evicted: lane.evicted.load(Ordering::Relaxed),
                        rejected: lane.rejected.load(Ordering::Relaxed),
                        attaches: lane.attaches.load(Ordering::Relaxed),
                    }
                })
                .collect(),
        }
    }

    fn lane(&self, eye: Eye) -> &Lane {
        &self.lanes[eye.index()]
    }

    fn route(&self, lane: &Lane, handle: FrameHandle) {
        let (evicted, pump) = {
            let mut inner = lane.inner.lock();
            let evicted = inner.pending.enqueue(handle);
            let pump = inner.sink.is_some() && !inner.draining;
            if pump {
                inner.draining = true;
            }
            (evicted, pump)
        };

        if let Some(old) = evicted {
            lane.evicted.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(
                eye = %lane.eye,
                sequence = old.sequence,
                payload = %old.payload,
                "Pending queue full, evicting frame"
            );
            self.release_share(lane.eye, old.payload);
        }

        if pump {
            self.pump(lane);
        }
    }

    /// Deliver queued handles until the lane is empty or loses its sink.
    /// The caller must have set `draining`.
    fn pump(&self, lane: &Lane) {
        loop {
            let (sink, mut batch) = {
                let mut inner = lane.inner.lock();
                let sink = match inner.sink.clone() {
                    Some(sink) if !inner.pending.is_empty() => sink,
                    _ => {
                        inner.draining = false;
                        return;
                    }
                };
                (sink, inner.pending.take())
            };

            let delivered = batch.drain_into(|handle| self.deliver(lane, sink.as_ref(), handle));
            if delivered > 1 {
                tracing::debug!(eye = %lane.eye, sink = sink.name(), delivered, "Flushed pending frames");
            }
        }
    }

    fn deliver(&self, lane: &Lane, sink: &dyn VideoSink, handle: FrameHandle) {
        let payload = handle.payload;
        match sink.push(handle) {
            Ok(()) => {
                lane.delivered.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                lane.rejected.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    eye = %lane.eye,
                    sink = sink.name(),
                    payload = %payload,
                    error = %e,
                    "Sink rejected frame"
                );
                self.release_share(lane.eye, payload);
            }
        }
    }

    fn release_share(&self, eye: Eye, payload: PayloadId) {
        if let Err(e) = self.registry.release(payload) {
            tracing::warn!(%eye, payload = %payload, error = %e, "Failed to release payload share");
        }
    }
}

/// Per-eye routing statistics
#[derive(Debug, Clone, Serialize)]
pub struct LaneStats {
    pub eye: Eye,
    pub state: SinkState,
    pub pending: usize,
    pub high_water_mark: usize,
    pub delivered: u64,
    pub evicted: u64,
    pub rejected: u64,
    pub attaches: u64,
}

/// Video router statistics
#[derive(Debug, Clone, Serialize)]
pub struct VideoRouterStats {
    pub units: u64,
    pub lanes: Vec<LaneStats>,
}
