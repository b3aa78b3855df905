//! Reference-counted registry of immutable payloads
//!
//! Each registered payload is stored once and shared by every consumer that
//! holds its [`PayloadId`]. The entry is removed when the last consumer
//! releases it.

use bytes::Bytes;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::RegistryError;

/// Opaque identifier of a registered payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct PayloadId(u64);

impl PayloadId {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for PayloadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Outcome of a successful release
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Released {
    /// Other consumers still hold shares
    Retained { remaining: usize },
    /// Last share released, entry removed
    Reclaimed,
}

struct PayloadEntry {
    bytes: Bytes,
    /// Shares not yet released, always >= 1 while the entry exists
    remaining: usize,
}

/// Registry of shared payloads for one mirroring session
pub struct SharedBufferRegistry {
    entries: DashMap<PayloadId, PayloadEntry>,
    next_id: AtomicU64,
    live_bytes: AtomicUsize,
    registered: AtomicU64,
    reclaimed: AtomicU64,
    over_releases: AtomicU64,
}

impl SharedBufferRegistry {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            next_id: AtomicU64::new(1),
            live_bytes: AtomicUsize::new(0),
            registered: AtomicU64::new(0),
            reclaimed: AtomicU64::new(0),
            over_releases: AtomicU64::new(0),
        }
    }

    /// Create a registry wrapped for sharing between router and sinks
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Store `bytes` once for `consumer_count` consumers
    pub fn register(&self, bytes: Bytes, consumer_count: usize) -> Result<PayloadId, RegistryError> {
        if consumer_count == 0 {
            return Err(RegistryError::ZeroConsumers);
        }

        let id = PayloadId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let len = bytes.len();
        self.entries.insert(
            id,
            PayloadEntry {
                bytes,
                remaining: consumer_count,
            },
        );
        self.live_bytes.fetch_add(len, Ordering::Relaxed);
        self.registered.fetch_add(1, Ordering::Relaxed);

        tracing::trace!(payload = %id, len, consumer_count, "Payload registered");
        Ok(id)
    }

    /// Read-only view of a payload.
    ///
    /// The returned [`Bytes`] points at the registered storage; no copy is made.
    pub fn deref_handle(&self, id: PayloadId) -> Result<Bytes, RegistryError> {
        match self.entries.get(&id) {
            Some(entry) => Ok(entry.bytes.clone()),
            None if self.was_issued(id) => Err(RegistryError::Reclaimed(id)),
            None => Err(RegistryError::UnknownPayload(id)),
        }
    }

    /// Release one consumer's share of a payload.
    ///
    /// Releasing a payload more times than its consumer count yields
    /// [`RegistryError::OverReleased`]. The same applies to ids dropped by
    /// [`clear`](Self::clear).
    pub fn release(&self, id: PayloadId) -> Result<Released, RegistryError> {
        match self.entries.entry(id) {
            Entry::Occupied(mut occupied) => {
                let remaining = {
                    let entry = occupied.get_mut();
                    entry.remaining -= 1;
                    entry.remaining
                };

                if remaining > 0 {
                    return Ok(Released::Retained { remaining });
                }

                let (_, entry) = occupied.remove_entry();
                self.live_bytes.fetch_sub(entry.bytes.len(), Ordering::Relaxed);
                self.reclaimed.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(payload = %id, "Payload reclaimed");
                Ok(Released::Reclaimed)
            }
            Entry::Vacant(_) => {
                if self.was_issued(id) {
                    self.over_releases.fetch_add(1, Ordering::Relaxed);
                    Err(RegistryError::OverReleased(id))
                } else {
                    Err(RegistryError::UnknownPayload(id))
                }
            }
        }
    }

    /// Shares still outstanding for a live payload
    pub fn remaining(&self, id: PayloadId) -> Option<usize> {
        self.entries.get(&id).map(|entry| entry.remaining)
    }

    /// Check whether a payload is still held by at least one consumer
    pub fn contains(&self, id: PayloadId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Number of live payloads
    pub fn live_count(&self) -> usize {
        self.entries.len()
    }

    /// Total size of live payloads in bytes
    pub fn live_bytes(&self) -> usize {
        self.live_bytes.load(Ordering::Relaxed)
    }

    /// Drop every unreleased payload, returning how many were dropped.
    ///
    /// Called on session teardown.
    pub fn clear(&self) -> usize {
        let mut dropped = 0usize;
        let mut dropped_bytes = 0usize;
        self.entries.retain(|_, entry| {
            dropped += 1;
            dropped_bytes += entry.bytes.len();
            false
        });
        self.live_bytes.fetch_sub(dropped_bytes, Ordering::Relaxed);

        if dropped > 0 {
            tracing::warn!(
                dropped,
                dropped_bytes,
                "Registry cleared with unreleased payloads"
            );
        }
        dropped
    }

    /// Get statistics
    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            registered: self.registered.load(Ordering::Relaxed),
            reclaimed: self.reclaimed.load(Ordering::Relaxed),
            live: self.live_count(),
            live_bytes: self.live_bytes(),
            over_releases: self.over_releases.load(Ordering::Relaxed),
        }
    }

    fn was_issued(&self, id: PayloadId) -> bool {
        id.0 != 0 && id.0 < self.next_id.load(Ordering::Relaxed)
    }
}

impl Default for SharedBufferRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Registry statistics
#[derive(Debug, Clone, Serialize)]
pub struct RegistryStats {
    pub registered: u64,
    pub reclaimed: u64,
    pub live: usize,
    pub live_bytes: usize,
    pub over_releases: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reclaimed_only_after_both_releases() {
        let registry = SharedBufferRegistry::new();
        let id = registry.register(Bytes::from_static(b"access-unit"), 2).unwrap();

        assert_eq!(registry.release(id).unwrap(), Released::Retained { remaining: 1 });
        assert!(registry.contains(id));
        assert_eq!(registry.live_bytes(), 11);

        assert_eq!(registry.release(id).unwrap(), Released::Reclaimed);
        assert!(!registry.contains(id));
        assert_eq!(registry.live_bytes(), 0);
        assert_eq!(registry.stats().reclaimed, 1);
    }

    #[test]
    fn test_third_release_is_invalid_state() {
        let registry = SharedBufferRegistry::new();
        let id = registry.register(Bytes::from_static(b"frame"), 2).unwrap();

        registry.release(id).unwrap();
        registry.release(id).unwrap();

        assert_eq!(registry.release(id), Err(RegistryError::OverReleased(id)));
        assert_eq!(registry.stats().over_releases, 1);
    }

    #[test]
    fn test_unknown_payload() {
        let registry = SharedBufferRegistry::new();
        let bogus = PayloadId(42);

        assert_eq!(registry.release(bogus), Err(RegistryError::UnknownPayload(bogus)));
        assert_eq!(registry.deref_handle(bogus), Err(RegistryError::UnknownPayload(bogus)));
    }

    #[test]
    fn test_zero_consumers_rejected() {
        let registry = SharedBufferRegistry::new();
        assert_eq!(
            registry.register(Bytes::from_static(b"x"), 0),
            Err(RegistryError::ZeroConsumers)
        );
        assert_eq!(registry.live_count(), 0);
    }

    #[test]
    fn test_deref_shares_storage() {
        let registry = SharedBufferRegistry::new();
        let original = Bytes::from(vec![7u8; 4096]);
        let ptr = original.as_ptr();
        let id = registry.register(original, 2).unwrap();

        let left = registry.deref_handle(id).unwrap();
        let right = registry.deref_handle(id).unwrap();
        assert_eq!(left.as_ptr(), ptr);
        assert_eq!(right.as_ptr(), ptr);

        registry.release(id).unwrap();
        registry.release(id).unwrap();
        assert_eq!(registry.deref_handle(id), Err(RegistryError::Reclaimed(id)));
    }

    #[test]
    fn test_clear_drops_unreleased() {
        let registry = SharedBufferRegistry::new();
        let a = registry.register(Bytes::from_static(b"aaaa"), 2).unwrap();
        let _b = registry.register(Bytes::from_static(b"bb"), 2).unwrap();
        registry.release(a).unwrap();

        assert_eq!(registry.clear(), 2);
        assert_eq!(registry.live_count(), 0);
        assert_eq!(registry.live_bytes(), 0);
        assert_eq!(registry.release(a), Err(RegistryError::OverReleased(a)));
    }

    #[test]
    fn test_concurrent_release_reclaims_once() {
        let registry = SharedBufferRegistry::shared();
        let ids: Vec<_> = (0..500)
            .map(|i| registry.register(Bytes::from(vec![i as u8; 8]), 2).unwrap())
            .collect();

        let workers: Vec<_> = (0..2)
            .map(|_| {
                let registry = registry.clone();
                let ids = ids.clone();
                std::thread::spawn(move || {
                    ids.iter()
                        .filter(|id| registry.release(**id).unwrap() == Released::Reclaimed)
                        .count()
                })
            })
            .collect();

        let reclaimed: usize = workers.into_iter().map(|w| w.join().unwrap()).sum();
        assert_eq!(reclaimed, 500);
        assert_eq!(registry.live_count(), 0);
    }
}
