//! Ordering and ownership properties of the video router under concurrency.

use bytes::Bytes;
use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;
use proptest::prelude::*;
use std::sync::Arc;
use std::thread;

use mirror_fanout::buffer::{OverflowPolicy, SharedBufferRegistry};
use mirror_fanout::config::VideoConfig;
use mirror_fanout::error::SinkError;
use mirror_fanout::video::{Eye, FrameHandle, SinkState, VideoRouter, VideoSink};

/// Records sequences and releases each payload, like a real decoder would.
struct ReleasingSink {
    registry: Arc<SharedBufferRegistry>,
    seen: Mutex<Vec<u64>>,
}

impl ReleasingSink {
    fn new(registry: &Arc<SharedBufferRegistry>) -> Arc<Self> {
        Arc::new(Self {
            registry: registry.clone(),
            seen: Mutex::new(Vec::new()),
        })
    }

    fn seen(&self) -> Vec<u64> {
        self.seen.lock().clone()
    }
}

impl VideoSink for ReleasingSink {
    fn name(&self) -> &str {
        "releasing"
    }

    fn push(&self, handle: FrameHandle) -> Result<(), SinkError> {
        self.seen.lock().push(handle.sequence);
        self.registry
            .release(handle.payload)
            .map(|_| ())
            .map_err(|e| SinkError::Rejected(e.to_string()))
    }
}

/// Blocks inside its first push until the test lets it continue.
struct GatedSink {
    seen: Mutex<Vec<u64>>,
    entered: Sender<()>,
    resume: Receiver<()>,
}

impl VideoSink for GatedSink {
    fn name(&self) -> &str {
        "gated"
    }

    fn push(&self, handle: FrameHandle) -> Result<(), SinkError> {
        let first = {
            let mut seen = self.seen.lock();
            seen.push(handle.sequence);
            seen.len() == 1
        };
        if first {
            self.entered.send(()).unwrap();
            self.resume.recv().unwrap();
        }
        Ok(())
    }
}

fn unbounded_router() -> VideoRouter {
    VideoRouter::new(
        SharedBufferRegistry::shared(),
        &VideoConfig {
            max_pending: 0,
            overflow_policy: OverflowPolicy::Unbounded,
        },
    )
}

fn unit(sequence: u64) -> Bytes {
    Bytes::from(sequence.to_be_bytes().to_vec())
}

#[test]
fn arrival_during_drain_is_appended_after_queued_units() {
    let router = Arc::new(unbounded_router());
    let (entered_tx, entered_rx) = bounded(1);
    let (resume_tx, resume_rx) = bounded(1);
    let sink = Arc::new(GatedSink {
        seen: Mutex::new(Vec::new()),
        entered: entered_tx,
        resume: resume_rx,
    });

    let a = router.on_video_unit(unit(0)).unwrap();
    let b = router.on_video_unit(unit(1)).unwrap();

    let host = {
        let router = router.clone();
        let sink = sink.clone();
        thread::spawn(move || router.attach(Eye::Left, sink).unwrap())
    };

    // The drain is parked inside the delivery of A.
    entered_rx.recv().unwrap();
    let c = router.on_video_unit(unit(2)).unwrap();
    assert_eq!(router.state(Eye::Left), SinkState::Ready);

    resume_tx.send(()).unwrap();
    host.join().unwrap();

    assert_eq!(*sink.seen.lock(), vec![a, b, c]);
    assert_eq!(router.pending_len(Eye::Left), 0);
}

#[test]
fn producer_and_host_threads_race_without_reordering() {
    const UNITS: u64 = 5_000;

    let router = Arc::new(unbounded_router());
    let registry = router.registry().clone();
    let left = ReleasingSink::new(&registry);
    let right = ReleasingSink::new(&registry);

    let producer = {
        let router = router.clone();
        thread::spawn(move || {
            for sequence in 0..UNITS {
                router.on_video_unit(unit(sequence)).unwrap();
                if sequence % 512 == 0 {
                    thread::yield_now();
                }
            }
        })
    };

    let host = {
        let router = router.clone();
        let left = left.clone();
        let right = right.clone();
        thread::spawn(move || {
            router.attach(Eye::Left, left).unwrap();
            thread::yield_now();
            router.attach(Eye::Right, right).unwrap();
        })
    };

    producer.join().unwrap();
    host.join().unwrap();

    let expected: Vec<u64> = (0..UNITS).collect();
    assert_eq!(left.seen(), expected);
    assert_eq!(right.seen(), expected);
    assert_eq!(registry.live_count(), 0);
    assert_eq!(registry.stats().over_releases, 0);
}

#[test]
fn payload_survives_until_second_eye_releases() {
    let router = unbounded_router();
    let registry = router.registry().clone();
    let left = ReleasingSink::new(&registry);

    router.attach(Eye::Left, left.clone()).unwrap();
    for sequence in 0..10 {
        router.on_video_unit(unit(sequence)).unwrap();
    }

    assert_eq!(left.seen().len(), 10);
    assert_eq!(registry.live_count(), 10);

    router.attach(Eye::Right, ReleasingSink::new(&registry)).unwrap();
    assert_eq!(registry.live_count(), 0);
}

proptest! {
    #[test]
    fn sink_sees_every_unit_once_in_order(before in 0u64..200, after in 0u64..200) {
        let router = unbounded_router();
        let registry = router.registry().clone();
        let left = ReleasingSink::new(&registry);
        let right = ReleasingSink::new(&registry);

        for sequence in 0..before {
            router.on_video_unit(unit(sequence)).unwrap();
        }
        router.attach(Eye::Left, left.clone()).unwrap();
        router.attach(Eye::Right, right.clone()).unwrap();
        for sequence in before..before + after {
            router.on_video_unit(unit(sequence)).unwrap();
        }

        let expected: Vec<u64> = (0..before + after).collect();
        prop_assert_eq!(left.seen(), expected.clone());
        prop_assert_eq!(right.seen(), expected);
        prop_assert_eq!(registry.live_count(), 0);
    }

    #[test]
    fn bounded_queue_keeps_newest_in_order(cap in 1usize..32, before in 0u64..100) {
        let router = VideoRouter::new(
            SharedBufferRegistry::shared(),
            &VideoConfig { max_pending: cap, overflow_policy: OverflowPolicy::DropOldest },
        );
        let registry = router.registry().clone();
        let left = ReleasingSink::new(&registry);
        let right = ReleasingSink::new(&registry);

        for sequence in 0..before {
            router.on_video_unit(unit(sequence)).unwrap();
        }
        router.attach(Eye::Left, left.clone()).unwrap();
        router.attach(Eye::Right, right.clone()).unwrap();

        let kept = before.min(cap as u64);
        let expected: Vec<u64> = (before - kept..before).collect();
        prop_assert_eq!(left.seen(), expected.clone());
        prop_assert_eq!(right.seen(), expected);
        prop_assert_eq!(registry.live_count(), 0);
    }
}
