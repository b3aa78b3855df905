//! Video fan-out to the two eye sinks

pub mod handle;
pub mod nal;
pub mod router;
pub mod sink;

pub use handle::{Eye, FrameHandle};
pub use router::{LaneStats, VideoRouter, VideoRouterStats};
pub use sink::{SinkState, VideoSink};
