//! Mirroring Session Simulator
//!
//! Drives a session with a synthetic sender while the two video sinks
//! attach late, then prints the session statistics.

use anyhow::Result;
use bytes::Bytes;
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mirror_fanout::{
    audio::{AudioFormat, AudioFormatDescriptor, AudioSink},
    buffer::SharedBufferRegistry,
    config::AppConfig,
    error::SinkError,
    protocol::{AudioStreamInfo, MediaConsumer, VideoStreamInfo},
    video::{Eye, FrameHandle, VideoSink},
    MirrorSession,
};

const VIDEO_UNITS: u64 = 300;
const FRAME_INTERVAL: Duration = Duration::from_millis(2);
const KEYFRAME_INTERVAL: u64 = 30;

/// Video sink handing frames to a decode thread over a channel
struct ChannelVideoSink {
    name: String,
    tx: Sender<FrameHandle>,
}

impl VideoSink for ChannelVideoSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn push(&self, handle: FrameHandle) -> Result<(), SinkError> {
        self.tx.send(handle).map_err(|_| SinkError::NotRunning)
    }
}

/// Stand-in decode thread: reads each payload, checks ordering, releases it
fn spawn_decoder(eye: Eye, rx: Receiver<FrameHandle>, registry: Arc<SharedBufferRegistry>) -> Result<JoinHandle<u64>> {
    let handle = thread::Builder::new()
        .name(format!("decode-{}", eye))
        .spawn(move || {
            let mut decoded = 0u64;
            let mut expected = 0u64;
            for frame in rx {
                match registry.deref_handle(frame.payload) {
                    Ok(bytes) => debug_assert_eq!(bytes.len(), frame.len),
                    Err(e) => tracing::warn!(%eye, error = %e, "Payload missing"),
                }
                if frame.sequence != expected {
                    tracing::error!(%eye, expected, got = frame.sequence, "Out-of-order frame");
                }
                expected = frame.sequence + 1;
                decoded += 1;

                if let Err(e) = registry.release(frame.payload) {
                    tracing::warn!(%eye, error = %e, "Release failed");
                }
            }
            decoded
        })?;
    Ok(handle)
}

/// Audio sink that only counts what it is given
#[derive(Default)]
struct CountingAudioSink {
    units: AtomicU64,
    bytes: AtomicU64,
}

impl AudioSink for CountingAudioSink {
    fn name(&self) -> &str {
        "counting-audio"
    }

    fn configure(&self, format: AudioFormatDescriptor) -> Result<(), SinkError> {
        tracing::info!("Audio output configured: {}", format);
        Ok(())
    }

    fn push(&self, unit: Bytes) -> Result<(), SinkError> {
        self.units.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(unit.len() as u64, Ordering::Relaxed);
        Ok(())
    }
}

/// Synthetic Annex-B access unit
fn video_unit(sequence: u64) -> Bytes {
    let nal_header = if sequence % KEYFRAME_INTERVAL == 0 { 0x65 } else { 0x41 };
    let mut unit = vec![0, 0, 0, 1, nal_header];
    unit.extend(std::iter::repeat((sequence & 0xFF) as u8).take(512));
    Bytes::from(unit)
}

fn run_sender(session: Arc<MirrorSession>) {
    session.on_video_format(VideoStreamInfo {
        connection_id: "sim-connection".into(),
    });
    session.on_audio_format(AudioStreamInfo::from_code(AudioFormat::AacEld44100_2.code()));

    for sequence in 0..VIDEO_UNITS {
        session.on_video(video_unit(sequence));
        session.on_audio(Bytes::from(vec![0u8; 256]));
        if sequence % 50 == 0 {
            // Keep-alive noise from the transport
            session.on_audio(Bytes::from_static(&[0, 0, 0, 0]));
        }
        thread::sleep(FRAME_INTERVAL);
    }

    session.on_video_disconnect();
    session.on_audio_disconnect();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting mirroring session simulator");

    let config = match std::env::args().nth(1) {
        Some(path) => AppConfig::load(&PathBuf::from(path))?,
        None => AppConfig::load_or_default()?,
    };

    let audio_sink = Arc::new(CountingAudioSink::default());
    let session = Arc::new(MirrorSession::new(&config, audio_sink.clone())?);
    let registry = session.registry();

    let sender = {
        let session = session.clone();
        tokio::task::spawn_blocking(move || run_sender(session))
    };

    // Surfaces come up at different times while the sender is running
    let mut decoders = Vec::new();
    for (eye, delay) in [(Eye::Left, 40), (Eye::Right, 150)] {
        tokio::time::sleep(Duration::from_millis(delay)).await;

        let (tx, rx) = unbounded();
        decoders.push((eye, spawn_decoder(eye, rx, registry.clone())?));
        session.attach_video(
            eye,
            Arc::new(ChannelVideoSink {
                name: format!("{}-surface", eye),
                tx,
            }),
        )?;
        tracing::info!("{} surface attached after {}ms", eye, delay);
    }

    sender.await?;

    // Dropping the sinks closes the decoder channels
    for eye in Eye::ALL {
        session.detach_video(eye);
    }
    for (eye, decoder) in decoders {
        match decoder.join() {
            Ok(decoded) => tracing::info!("{} decoder finished: {} frames", eye, decoded),
            Err(_) => tracing::error!("{} decoder panicked", eye),
        }
    }

    tracing::info!(
        "Audio sink received {} units, {:.1} KB",
        audio_sink.units.load(Ordering::Relaxed),
        audio_sink.bytes.load(Ordering::Relaxed) as f64 / 1024.0
    );

    let stats = session.stats();
    println!("{}", serde_json::to_string_pretty(&stats)?);

    let unreleased = session.shutdown();
    if unreleased > 0 {
        tracing::warn!("{} payloads were never released", unreleased);
    }

    Ok(())
}
