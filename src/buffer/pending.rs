//! Ordered holding queue for a sink that is not ready yet

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::video::FrameHandle;

/// What to do when a bounded queue is full
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Evict the oldest queued handle to make room
    #[default]
    DropOldest,
    /// Refuse the incoming handle
    DropNewest,
    /// Never evict
    Unbounded,
}

/// FIFO of frame handles awaiting one sink.
///
/// Not synchronised; the owning router serialises access.
#[derive(Debug)]
pub struct PendingQueue {
    items: VecDeque<FrameHandle>,
    capacity: usize,
    policy: OverflowPolicy,
    high_water_mark: usize,
    evicted: u64,
}

impl PendingQueue {
    /// Create a queue holding at most `capacity` handles under `policy`
    pub fn new(capacity: usize, policy: OverflowPolicy) -> Self {
        Self {
            items: VecDeque::new(),
            capacity,
            policy,
            high_water_mark: 0,
            evicted: 0,
        }
    }

    pub fn unbounded() -> Self {
        Self::new(usize::MAX, OverflowPolicy::Unbounded)
    }

    /// Append a handle.
    ///
    /// Returns the handle evicted to respect the capacity, if any. The caller
    /// owns the evicted handle's payload share.
    pub fn enqueue(&mut self, handle: FrameHandle) -> Option<FrameHandle> {
        let evicted = match self.policy {
            OverflowPolicy::Unbounded => None,
            _ if self.items.len() < self.capacity => None,
            OverflowPolicy::DropNewest => {
                self.evicted += 1;
                return Some(handle);
            }
            OverflowPolicy::DropOldest => {
                self.evicted += 1;
                self.items.pop_front()
            }
        };

        self.items.push_back(handle);
        self.high_water_mark = self.high_water_mark.max(self.items.len());
        evicted
    }

    /// Remove every queued handle in arrival order, calling `deliver` once
    /// per handle. Returns the number delivered.
    pub fn drain_into<F>(&mut self, mut deliver: F) -> usize
    where
        F: FnMut(FrameHandle),
    {
        let count = self.items.len();
        while let Some(handle) = self.items.pop_front() {
            deliver(handle);
        }
        count
    }

    /// Move all queued handles into a new batch, leaving this queue empty
    pub fn take(&mut self) -> PendingQueue {
        PendingQueue {
            items: std::mem::take(&mut self.items),
            capacity: self.capacity,
            policy: self.policy,
            high_water_mark: 0,
            evicted: 0,
        }
    }

    /// Discard all queued handles, returning them
    pub fn clear(&mut self) -> Vec<FrameHandle> {
        self.items.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn policy(&self) -> OverflowPolicy {
        self.policy
    }

    /// Largest length reached so far
    pub fn high_water_mark(&self) -> usize {
        self.high_water_mark
    }

    /// Handles evicted by the overflow policy
    pub fn evicted(&self) -> u64 {
        self.evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::SharedBufferRegistry;
    use crate::video::Eye;
    use bytes::Bytes;

    fn handles(count: u64) -> Vec<FrameHandle> {
        let registry = SharedBufferRegistry::new();
        (0..count)
            .map(|sequence| {
                let payload = registry.register(Bytes::from_static(b"nal"), 1).unwrap();
                FrameHandle::new(payload, sequence, Eye::Left, 3, None)
            })
            .collect()
    }

    fn sequences(queue: &mut PendingQueue) -> Vec<u64> {
        let mut seen = Vec::new();
        queue.drain_into(|h| seen.push(h.sequence));
        seen
    }

    #[test]
    fn test_drain_is_fifo_and_empties() {
        let mut queue = PendingQueue::unbounded();
        for handle in handles(5) {
            assert!(queue.enqueue(handle).is_none());
        }

        assert_eq!(sequences(&mut queue), vec![0, 1, 2, 3, 4]);
        assert!(queue.is_empty());
        assert_eq!(queue.high_water_mark(), 5);
    }

    #[test]
    fn test_drop_oldest_evicts_front() {
        let mut queue = PendingQueue::new(3, OverflowPolicy::DropOldest);
        let mut evicted = Vec::new();
        for handle in handles(5) {
            if let Some(old) = queue.enqueue(handle) {
                evicted.push(old.sequence);
            }
        }

        assert_eq!(evicted, vec![0, 1]);
        assert_eq!(queue.evicted(), 2);
        assert_eq!(sequences(&mut queue), vec![2, 3, 4]);
    }

    #[test]
    fn test_drop_newest_refuses_incoming() {
        let mut queue = PendingQueue::new(2, OverflowPolicy::DropNewest);
        let mut refused = Vec::new();
        for handle in handles(4) {
            if let Some(h) = queue.enqueue(handle) {
                refused.push(h.sequence);
            }
        }

        assert_eq!(refused, vec![2, 3]);
        assert_eq!(sequences(&mut queue), vec![0, 1]);
    }

    #[test]
    fn test_take_moves_batch() {
        let mut queue = PendingQueue::new(8, OverflowPolicy::DropOldest);
        for handle in handles(3) {
            queue.enqueue(handle);
        }

        let mut batch = queue.take();
        assert!(queue.is_empty());
        assert_eq!(queue.high_water_mark(), 3);
        assert_eq!(batch.len(), 3);
        assert_eq!(sequences(&mut batch), vec![0, 1, 2]);
    }
}
