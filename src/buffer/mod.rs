//! Shared payload storage and per-sink holding queues

pub mod pending;
pub mod registry;

pub use pending::{OverflowPolicy, PendingQueue};
pub use registry::{PayloadId, RegistryStats, Released, SharedBufferRegistry};
