//! Audio format negotiation and routing

pub mod format;
pub mod router;
pub mod sink;

pub use format::{negotiate, AudioFormat, AudioFormatDescriptor, AudioFormatId};
pub use router::{AudioOutcome, AudioRouter, AudioRouterStats};
pub use sink::AudioSink;
