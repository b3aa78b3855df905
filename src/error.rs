//! Error types for the media fan-out core

use thiserror::Error;

use crate::buffer::PayloadId;
use crate::video::Eye;

/// Main error type for the crate
#[derive(Error, Debug)]
pub enum Error {
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Router error: {0}")]
    Router(#[from] RouterError),

    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Shared buffer registry errors
///
/// Every variant is an invalid-state condition caused by the caller, not a
/// runtime failure of the registry itself.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Payload {0} was never registered")]
    UnknownPayload(PayloadId),

    #[error("Payload {0} released more times than its consumer count")]
    OverReleased(PayloadId),

    #[error("Payload {0} has already been reclaimed")]
    Reclaimed(PayloadId),

    #[error("Consumer count must be at least 1")]
    ZeroConsumers,
}

/// Video routing errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RouterError {
    #[error("Sink already attached to {0} slot")]
    AlreadyAttached(Eye),
}

/// Errors reported by downstream sinks
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SinkError {
    #[error("Sink is not running")]
    NotRunning,

    #[error("Sink rejected unit: {0}")]
    Rejected(String),

    #[error("Sink configuration failed: {0}")]
    Configure(String),
}

/// Result type alias for the crate
pub type Result<T> = std::result::Result<T, Error>;
