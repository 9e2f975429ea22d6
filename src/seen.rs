//! Seen tracking and transcript retention.
//!
//! The tracker is the single owner of "has this entry been processed". It also
//! remembers which batches are still retained so the transcript can be kept to
//! a bounded window without dropping anything that was never processed.

use std::collections::{HashSet, VecDeque};

use crate::model::{BatchId, EntryId};
use crate::transport::{RawBatch, RawEntry};

#[derive(Debug)]
struct RetainedBatch {
    id: BatchId,
    /// Entries with primary text; placeholders never need marking.
    entries: Vec<EntryId>,
}

#[derive(Debug)]
pub struct SeenTracker {
    enabled: bool,
    seen: HashSet<EntryId>,
    retained: VecDeque<RetainedBatch>,
}

impl SeenTracker {
    /// A tracker with marking on or off. When off, nothing is ever considered
    /// seen and retention is a plain capacity bound.
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            seen: HashSet::new(),
            retained: VecDeque::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_seen(&self, id: &EntryId) -> bool {
        self.seen.contains(id)
    }

    pub fn seen_len(&self) -> usize {
        self.seen.len()
    }

    /// Marks `ids` as seen and returns the ones that were not seen before.
    /// Marking an already-seen entry has no effect.
    pub fn mark<'a, I>(&mut self, ids: I) -> Vec<EntryId>
    where
        I: IntoIterator<Item = &'a EntryId>,
    {
        if !self.enabled {
            return Vec::new();
        }
        ids.into_iter()
            .filter(|id| self.seen.insert((*id).clone()))
            .cloned()
            .collect()
    }

    /// Returns the entries not seen before and marks them.
    pub fn filter_and_mark<'a, I>(&mut self, entries: I) -> Vec<&'a RawEntry>
    where
        I: IntoIterator<Item = &'a RawEntry>,
    {
        if !self.enabled {
            return entries.into_iter().collect();
        }
        entries
            .into_iter()
            .filter(|entry| self.seen.insert(entry.id.clone()))
            .collect()
    }

    /// Records `batch` as retained, newest last. A batch seen again keeps its
    /// place and picks up any entries that arrived since.
    pub fn observe(&mut self, batch: &RawBatch) {
        let texts = batch
            .entries
            .iter()
            .filter(|e| e.primary_text().is_some())
            .map(|e| e.id.clone());

        if let Some(existing) = self.retained.iter_mut().find(|r| r.id == batch.id) {
            for id in texts {
                if !existing.entries.contains(&id) {
                    existing.entries.push(id);
                }
            }
        } else {
            self.retained.push_back(RetainedBatch {
                id: batch.id.clone(),
                entries: texts.collect(),
            });
        }
    }

    pub fn retained_len(&self) -> usize {
        self.retained.len()
    }

    /// Evicts the oldest batches beyond `window`. `0` disables eviction.
    ///
    /// Eviction stops at the first batch that still holds an unmarked entry,
    /// so the retained count can stay above `window` until that batch has
    /// been processed. Evicted entries are forgotten: they can never be
    /// fetched again.
    pub fn enforce_window(&mut self, window: usize) -> Vec<BatchId> {
        let mut evicted = Vec::new();
        if window == 0 {
            return evicted;
        }
        while self.retained.len() > window {
            let Some(oldest) = self.retained.front() else {
                break;
            };
            if !self.is_settled(oldest) {
                tracing::debug!(batch = %oldest.id, "oldest batch has unmarked entries, not evicting");
                break;
            }
            if let Some(batch) = self.retained.pop_front() {
                for id in &batch.entries {
                    self.seen.remove(id);
                }
                evicted.push(batch.id);
            }
        }
        evicted
    }

    fn is_settled(&self, batch: &RetainedBatch) -> bool {
        !self.enabled || batch.entries.iter().all(|id| self.seen.contains(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::BatchAuthor;

    fn batch(id: &str, entries: &[&str]) -> RawBatch {
        RawBatch {
            id: BatchId::new(id),
            author: BatchAuthor::Named("Ann".into()),
            entries: entries
                .iter()
                .map(|e| RawEntry::text(e, &format!("text of {e}")))
                .collect(),
        }
    }

    fn ids(entries: &[&RawEntry]) -> Vec<String> {
        entries.iter().map(|e| e.id.0.clone()).collect()
    }

    #[test]
    fn filter_and_mark_twice_returns_nothing_new() {
        let mut tracker = SeenTracker::new(true);
        let b = batch("b1", &["e1", "e2"]);

        assert_eq!(ids(&tracker.filter_and_mark(&b.entries)), vec!["e1", "e2"]);
        assert!(tracker.filter_and_mark(&b.entries).is_empty());
    }

    #[test]
    fn marking_is_idempotent() {
        let mut once = SeenTracker::new(true);
        let mut twice = SeenTracker::new(true);
        let e1 = EntryId::new("e1");

        assert_eq!(once.mark([&e1]), vec![e1.clone()]);
        twice.mark([&e1]);
        assert!(twice.mark([&e1]).is_empty());

        assert_eq!(once.seen_len(), twice.seen_len());
        assert_eq!(once.is_seen(&e1), twice.is_seen(&e1));
    }

    #[test]
    fn disabled_tracker_never_marks() {
        let mut tracker = SeenTracker::new(false);
        let b = batch("b1", &["e1"]);
        assert_eq!(tracker.filter_and_mark(&b.entries).len(), 1);
        assert_eq!(tracker.filter_and_mark(&b.entries).len(), 1);
        assert!(!tracker.is_seen(&EntryId::new("e1")));
    }

    #[test]
    fn window_keeps_most_recent_marked_batches() {
        let mut tracker = SeenTracker::new(true);
        for i in 0..5 {
            let b = batch(&format!("b{i}"), &[&format!("e{i}")]);
            tracker.observe(&b);
            tracker.filter_and_mark(&b.entries);
        }

        let evicted = tracker.enforce_window(3);
        assert_eq!(evicted, vec![BatchId::new("b0"), BatchId::new("b1")]);
        assert_eq!(tracker.retained_len(), 3);
        assert!(!tracker.is_seen(&EntryId::new("e0")));
        assert!(tracker.is_seen(&EntryId::new("e4")));
    }

    #[test]
    fn window_larger_than_history_keeps_everything() {
        let mut tracker = SeenTracker::new(true);
        for i in 0..2 {
            let b = batch(&format!("b{i}"), &[&format!("e{i}")]);
            tracker.observe(&b);
            tracker.filter_and_mark(&b.entries);
        }
        assert!(tracker.enforce_window(10).is_empty());
        assert_eq!(tracker.retained_len(), 2);
    }

    #[test]
    fn zero_window_disables_eviction() {
        let mut tracker = SeenTracker::new(true);
        for i in 0..4 {
            let b = batch(&format!("b{i}"), &[]);
            tracker.observe(&b);
        }
        assert!(tracker.enforce_window(0).is_empty());
        assert_eq!(tracker.retained_len(), 4);
    }

    #[test]
    fn unmarked_batch_is_never_evicted() {
        let mut tracker = SeenTracker::new(true);
        let pending = batch("b0", &["e0"]);
        tracker.observe(&pending);
        for i in 1..4 {
            let b = batch(&format!("b{i}"), &[&format!("e{i}")]);
            tracker.observe(&b);
            tracker.filter_and_mark(&b.entries);
        }

        assert!(tracker.enforce_window(1).is_empty());
        assert_eq!(tracker.retained_len(), 4);

        tracker.filter_and_mark(&pending.entries);
        assert_eq!(tracker.enforce_window(1).len(), 3);
        assert_eq!(tracker.retained_len(), 1);
    }

    #[test]
    fn observing_again_merges_new_entries() {
        let mut tracker = SeenTracker::new(true);
        tracker.observe(&batch("b0", &["e0"]));
        tracker.observe(&batch("b0", &["e0", "e1"]));
        tracker.observe(&batch("b1", &["e2"]));
        assert_eq!(tracker.retained_len(), 2);

        tracker.mark([&EntryId::new("e0"), &EntryId::new("e2")]);
        // e1 arrived later in b0 and is still unmarked.
        assert!(tracker.enforce_window(1).is_empty());
    }

    #[test]
    fn disabled_tracker_evicts_by_capacity() {
        let mut tracker = SeenTracker::new(false);
        for i in 0..3 {
            tracker.observe(&batch(&format!("b{i}"), &[&format!("e{i}")]));
        }
        assert_eq!(tracker.enforce_window(1).len(), 2);
        assert_eq!(tracker.retained_len(), 1);
    }
}
