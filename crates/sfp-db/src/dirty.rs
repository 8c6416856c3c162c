//! Tracks which rows have changed since the last flush cycle.
//!
//! Every mutable order column is written on every flush of a dirty row —
//! a single bulk `unnest`/`ON CONFLICT` statement can't cheaply vary its
//! column list per row within one batch — so the dirty set gates which
//! rows are written at all, not which columns within a row.

use std::hash::Hash;

use dashmap::DashSet;

/// Generic dirty-key accumulator, drained on each flush cycle. Used with
/// `Uuid` for orders and `(String, String)` (`user_id`, `symbol`) for
/// positions.
#[derive(Default)]
pub struct DirtyTracker<K: Eq + Hash + Clone> {
    dirty: DashSet<K>,
}

impl<K: Eq + Hash + Clone> DirtyTracker<K> {
    pub fn new() -> Self {
        Self { dirty: DashSet::new() }
    }

    pub fn mark(&self, key: K) {
        self.dirty.insert(key);
    }

    pub fn pending_count(&self) -> usize {
        self.dirty.len()
    }

    /// Drain up to `limit` dirty keys for the next flush batch, in no
    /// particular order — cross-row ordering is unconstrained.
    pub fn drain_batch(&self, limit: usize) -> Vec<K> {
        let keys: Vec<K> = self.dirty.iter().take(limit).map(|e| e.key().clone()).collect();
        for key in &keys {
            self.dirty.remove(key);
        }
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn marking_the_same_key_twice_collapses_to_one_entry() {
        let tracker: DirtyTracker<Uuid> = DirtyTracker::new();
        let id = Uuid::new_v4();
        tracker.mark(id);
        tracker.mark(id);

        let batch = tracker.drain_batch(10);
        assert_eq!(batch.len(), 1);
    }

    #[test]
    fn drain_batch_respects_limit() {
        let tracker: DirtyTracker<Uuid> = DirtyTracker::new();
        for _ in 0..5 {
            tracker.mark(Uuid::new_v4());
        }
        assert_eq!(tracker.drain_batch(3).len(), 3);
        assert_eq!(tracker.pending_count(), 2);
    }

    #[test]
    fn drained_keys_are_removed_from_pending() {
        let tracker: DirtyTracker<Uuid> = DirtyTracker::new();
        let id = Uuid::new_v4();
        tracker.mark(id);
        tracker.drain_batch(10);
        assert_eq!(tracker.pending_count(), 0);
    }

    #[test]
    fn position_keys_track_independently_of_orders() {
        let tracker: DirtyTracker<(String, String)> = DirtyTracker::new();
        tracker.mark(("u1".to_string(), "RELIANCE".to_string()));
        tracker.mark(("u1".to_string(), "TCS".to_string()));
        assert_eq!(tracker.pending_count(), 2);
    }
}
