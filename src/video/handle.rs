//! Lightweight per-sink references to shared video payloads

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::buffer::PayloadId;

/// Video output slot, one per rendering surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Eye {
    Left,
    Right,
}

impl Eye {
    pub const ALL: [Eye; 2] = [Eye::Left, Eye::Right];

    pub fn index(self) -> usize {
        match self {
            Eye::Left => 0,
            Eye::Right => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Eye::Left => "left",
            Eye::Right => "right",
        }
    }
}

impl fmt::Display for Eye {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference to a registered video payload plus unit metadata.
///
/// Holding a handle does not keep the payload alive; the sink that receives
/// it must release `payload` on the registry once it is done.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameHandle {
    /// Registry entry holding the access unit bytes
    pub payload: PayloadId,
    /// Arrival order from the producer, shared by both eyes
    pub sequence: u64,
    /// Slot this handle was derived for
    pub eye: Eye,
    /// Payload length in bytes
    pub len: usize,
    /// IDR/SPS present, `None` when the unit is not Annex-B framed
    pub keyframe: Option<bool>,
}

impl FrameHandle {
    pub fn new(payload: PayloadId, sequence: u64, eye: Eye, len: usize, keyframe: Option<bool>) -> Self {
        Self {
            payload,
            sequence,
            eye,
            len,
            keyframe,
        }
    }

    pub fn is_keyframe(&self) -> bool {
        self.keyframe.unwrap_or(false)
    }
}
