//! Pending snapshot buffer ordered by capture time.
//!
//! Uses index-based separation:
//! - a sorted `Vec` stores lightweight metadata (capture time + slab key)
//! - a `Slab` stores the buffered snapshots themselves
//!
//! Reordering only moves metadata, never entity lists.

use std::fmt;

use contracts::{BufferStats, PendingSnapshot};
use slab::Slab;

/// Lightweight metadata kept in capture order
#[derive(Debug, Clone, Copy)]
struct SnapshotMeta {
    captured_at_ms: i64,
    slab_key: usize,
}

/// Bounded, capture-ordered buffer of snapshots awaiting release
///
/// On overflow the entry with the smallest `captured_at_ms` is evicted,
/// which may be the snapshot that was just pushed.
pub struct SnapshotBuffer {
    /// Ascending by `captured_at_ms`; ties keep arrival order
    index: Vec<SnapshotMeta>,
    storage: Slab<PendingSnapshot>,
    capacity: usize,
    dropped_count: u64,
    out_of_order_count: u64,
    last_captured_at_ms: Option<i64>,
}

impl fmt::Debug for SnapshotBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnapshotBuffer")
            .field("len", &self.index.len())
            .field("capacity", &self.capacity)
            .field("dropped", &self.dropped_count)
            .finish()
    }
}

impl SnapshotBuffer {
    /// Create a buffer holding at most `capacity` snapshots (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            index: Vec::with_capacity(capacity + 1),
            storage: Slab::with_capacity(capacity + 1),
            capacity,
            dropped_count: 0,
            out_of_order_count: 0,
            last_captured_at_ms: None,
        }
    }

    /// Insert a snapshot in capture order
    ///
    /// Returns the evicted snapshot when capacity was exceeded.
    pub fn push(&mut self, pending: PendingSnapshot) -> Option<PendingSnapshot> {
        let captured_at_ms = pending.snapshot.captured_at_ms;

        if let Some(last) = self.last_captured_at_ms {
            if captured_at_ms < last {
                self.out_of_order_count += 1;
            }
        }
        self.last_captured_at_ms = Some(captured_at_ms);

        let slab_key = self.storage.insert(pending);
        let position = self
            .index
            .partition_point(|meta| meta.captured_at_ms <= captured_at_ms);
        self.index.insert(
            position,
            SnapshotMeta {
                captured_at_ms,
                slab_key,
            },
        );

        if self.index.len() > self.capacity {
            let oldest = self.index.remove(0);
            self.dropped_count += 1;
            return Some(self.storage.remove(oldest.slab_key));
        }
        None
    }

    /// Remove every snapshot captured at or before `cutoff_ms`, oldest first
    pub fn drain_until(&mut self, cutoff_ms: f64) -> Vec<PendingSnapshot> {
        let released = self
            .index
            .partition_point(|meta| meta.captured_at_ms as f64 <= cutoff_ms);

        self.index
            .drain(..released)
            .map(|meta| self.storage.remove(meta.slab_key))
            .collect()
    }

    /// Earliest buffered snapshot
    pub fn peek_oldest(&self) -> Option<&PendingSnapshot> {
        self.index
            .first()
            .and_then(|meta| self.storage.get(meta.slab_key))
    }

    /// Buffered snapshots in capture order
    pub fn iter(&self) -> impl Iterator<Item = &PendingSnapshot> {
        self.index
            .iter()
            .filter_map(|meta| self.storage.get(meta.slab_key))
    }

    /// Drop all buffered snapshots, keeping counters
    pub fn clear(&mut self) {
        self.index.clear();
        self.storage.clear();
        self.last_captured_at_ms = None;
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn dropped_count(&self) -> u64 {
        self.dropped_count
    }

    #[inline]
    pub fn out_of_order_count(&self) -> u64 {
        self.out_of_order_count
    }

    pub fn stats(&self) -> BufferStats {
        BufferStats {
            depth: self.index.len(),
            dropped_count: self.dropped_count,
            out_of_order_count: self.out_of_order_count,
            oldest_captured_at_ms: self.index.first().map(|meta| meta.captured_at_ms),
            newest_captured_at_ms: self.index.last().map(|meta| meta.captured_at_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::WorldSnapshot;

    fn make_pending(tick_id: u64, captured_at_ms: i64) -> PendingSnapshot {
        PendingSnapshot {
            snapshot: WorldSnapshot {
                tick_id,
                captured_at_ms,
                ..Default::default()
            },
            received_at_ms: 0.0,
        }
    }

    fn captured(pending: &[PendingSnapshot]) -> Vec<i64> {
        pending.iter().map(|p| p.snapshot.captured_at_ms).collect()
    }

    #[test]
    fn test_buffer_sorts_on_insert() {
        let mut buffer = SnapshotBuffer::new(10);

        buffer.push(make_pending(3, 300));
        buffer.push(make_pending(1, 100));
        buffer.push(make_pending(2, 200));

        let order: Vec<i64> = buffer.iter().map(|p| p.snapshot.captured_at_ms).collect();
        assert_eq!(order, vec![100, 200, 300]);
        assert_eq!(buffer.peek_oldest().unwrap().snapshot.tick_id, 1);
    }

    #[test]
    fn test_drain_releases_up_to_cutoff() {
        let mut buffer = SnapshotBuffer::new(10);
        for (tick, at) in [(4, 400), (1, 100), (3, 300), (2, 200)] {
            buffer.push(make_pending(tick, at));
        }

        assert_eq!(captured(&buffer.drain_until(250.0)), vec![100, 200]);
        assert!(buffer.drain_until(299.9).is_empty());
        assert_eq!(captured(&buffer.drain_until(300.0)), vec![300]);
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn test_overflow_drops_oldest() {
        let mut buffer = SnapshotBuffer::new(3);

        buffer.push(make_pending(2, 200));
        buffer.push(make_pending(3, 300));
        buffer.push(make_pending(4, 400));
        let evicted = buffer.push(make_pending(5, 500)).unwrap();

        assert_eq!(evicted.snapshot.captured_at_ms, 200);
        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.dropped_count(), 1);
    }

    #[test]
    fn test_overflow_can_evict_the_late_arrival() {
        let mut buffer = SnapshotBuffer::new(2);

        buffer.push(make_pending(2, 200));
        buffer.push(make_pending(3, 300));
        let evicted = buffer.push(make_pending(1, 100)).unwrap();

        assert_eq!(evicted.snapshot.tick_id, 1);
        assert_eq!(buffer.stats().oldest_captured_at_ms, Some(200));
    }

    #[test]
    fn test_equal_capture_times_keep_arrival_order() {
        let mut buffer = SnapshotBuffer::new(4);
        buffer.push(make_pending(1, 100));
        buffer.push(make_pending(2, 100));

        let drained = buffer.drain_until(100.0);
        let ticks: Vec<u64> = drained.iter().map(|p| p.snapshot.tick_id).collect();
        assert_eq!(ticks, vec![1, 2]);
    }

    #[test]
    fn test_out_of_order_detection() {
        let mut buffer = SnapshotBuffer::new(10);

        buffer.push(make_pending(1, 100));
        buffer.push(make_pending(3, 300));
        buffer.push(make_pending(2, 200));

        let stats = buffer.stats();
        assert_eq!(stats.out_of_order_count, 1);
        assert_eq!(stats.depth, 3);
        assert_eq!(stats.newest_captured_at_ms, Some(300));
    }

    #[test]
    fn test_clear() {
        let mut buffer = SnapshotBuffer::new(2);
        buffer.push(make_pending(1, 100));
        buffer.clear();
        assert!(buffer.is_empty());
        assert!(buffer.peek_oldest().is_none());
    }
}
