//! Downstream video sink contract

use serde::Serialize;

use crate::error::SinkError;
use crate::video::FrameHandle;

/// A decode/render target for one eye.
///
/// # Implementation Notes
///
/// - `push` is called from whichever thread is draining the slot, never
///   with a router lock held; it should hand the handle off quickly
/// - once done with a handle, the sink releases `handle.payload` on the
///   session's [`SharedBufferRegistry`](crate::buffer::SharedBufferRegistry)
/// - returning an error means the handle was not accepted; the router then
///   releases the share on the sink's behalf
pub trait VideoSink: Send + Sync {
    /// Human-readable name for logging
    fn name(&self) -> &str;

    /// Accept one frame handle
    fn push(&self, handle: FrameHandle) -> Result<(), SinkError>;
}

/// Readiness of a video slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkState {
    NotReady,
    Ready,
}
