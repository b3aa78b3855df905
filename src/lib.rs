//! # Mirror Fan-out
//!
//! Dual-sink media distribution core for a screen-mirroring receiver.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │               Protocol thread (protocol::MediaConsumer)              │
//! │     video units │ video format │ audio units │ audio format          │
//! └────────┬─────────────────────────────────────────┬───────────────────┘
//!          │                                         │
//!          ▼                                         ▼
//! ┌──────────────────────────────────┐     ┌──────────────────────────┐
//! │  Video Router (video::router)    │     │ Audio Router             │
//! │  register once, count = 2        │     │ (audio::router)          │
//! │  ┌────────────┐  ┌────────────┐  │     │ negotiate format         │
//! │  │ Left lane  │  │ Right lane │  │     │ configure, then push     │
//! │  │ Pending Q  │  │ Pending Q  │  │     └────────────┬─────────────┘
//! │  └─────┬──────┘  └─────┬──────┘  │                  │
//! └────────┼───────────────┼─────────┘                  ▼
//!          │               │                     ┌─────────────┐
//!          ▼               ▼                     │ Audio Sink  │
//!   ┌────────────┐   ┌────────────┐              └─────────────┘
//!   │ Left Sink  │   │ Right Sink │  ◄── attach on surface ready
//!   └─────┬──────┘   └─────┬──────┘      (host lifecycle thread)
//!         │ release        │ release
//!         ▼                ▼
//! ┌──────────────────────────────────────┐
//! │ Shared Buffer Registry (buffer)      │
//! │ id → bytes + remaining shares        │
//! └──────────────────────────────────────┘
//! ```

pub mod audio;
pub mod buffer;
pub mod config;
pub mod error;
pub mod protocol;
pub mod session;
pub mod video;

pub use error::{Error, Result};
pub use session::{MirrorSession, SessionStats};

/// Application-wide constants
pub mod constants {
    /// Consumers sharing each video payload, one per eye
    pub const VIDEO_CONSUMERS: usize = 2;

    /// Default per-eye pending queue capacity (in frame handles)
    pub const DEFAULT_MAX_PENDING: usize = 1000;

    /// Audio units shorter than this are treated as transport noise
    pub const DEFAULT_MIN_AUDIO_UNIT_BYTES: usize = 10;

    /// PCM depth the audio sink always outputs
    pub const NORMALIZED_BITS_PER_SAMPLE: u16 = 16;

    /// Sample rate assumed for unrecognised audio formats
    pub const FALLBACK_SAMPLE_RATE: u32 = 44100;

    /// Channel count assumed for unrecognised audio formats
    pub const FALLBACK_CHANNELS: u16 = 2;
}
