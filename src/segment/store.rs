//! Ordered in-memory collection of an entity's segments.
//!
//! Every mutation renumbers the `order` field so that, after any sequence of
//! [`append`](SegmentStore::append), [`remove`](SegmentStore::remove) and
//! [`swap`](SegmentStore::swap) calls, the order indices are exactly
//! `0..len`.
//!
//! ```rust
//! use talenta_audio::segment::{Provenance, Segment, SegmentStore};
//!
//! let mut store = SegmentStore::new();
//! store.append(Segment::persisted("a".into(), "http://cdn/a", Provenance::Recorded));
//! store.append(Segment::persisted("b".into(), "http://cdn/b", Provenance::Recorded));
//! store.swap(0, 1).unwrap();
//!
//! let orders: Vec<usize> = store.snapshot().iter().map(|s| s.order).collect();
//! assert_eq!(orders, vec![0, 1]);
//! ```

use thiserror::Error;
use uuid::Uuid;

use super::model::{Segment, SegmentId};

// ---------------------------------------------------------------------------
// IndexOutOfRange
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("segment index {index} is out of range (playlist has {len} segments)")]
pub struct IndexOutOfRange {
    pub index: usize,
    pub len: usize,
}

// ---------------------------------------------------------------------------
// SegmentStore
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct SegmentStore {
    segments: Vec<Segment>,
}

impl SegmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from an already ordered list (e.g. a remote fetch).
    pub fn from_segments(segments: Vec<Segment>) -> Self {
        let mut store = Self { segments };
        store.renumber();
        store
    }

    /// Add `segment` at the end and return its position.
    pub fn append(&mut self, mut segment: Segment) -> usize {
        let index = self.segments.len();
        segment.order = index;
        self.segments.push(segment);
        index
    }

    /// Remove and return the segment at `index`; later segments shift down.
    pub fn remove(&mut self, index: usize) -> Result<Segment, IndexOutOfRange> {
        self.check(index)?;
        let removed = self.segments.remove(index);
        self.renumber();
        Ok(removed)
    }

    /// Exchange the segments at `a` and `b`.
    pub fn swap(&mut self, a: usize, b: usize) -> Result<(), IndexOutOfRange> {
        self.check(a)?;
        self.check(b)?;
        self.segments.swap(a, b);
        self.renumber();
        Ok(())
    }

    /// Replace the segment at `index` in place, keeping its position.
    pub fn replace_at(&mut self, index: usize, mut segment: Segment) -> Result<Segment, IndexOutOfRange> {
        self.check(index)?;
        segment.order = index;
        Ok(std::mem::replace(&mut self.segments[index], segment))
    }

    /// Discard the current contents in favour of `segments`.
    pub fn replace_all(&mut self, segments: Vec<Segment>) {
        self.segments = segments;
        self.renumber();
    }

    /// Copy of the current order, detached from the store.
    pub fn snapshot(&self) -> Vec<Segment> {
        self.segments.clone()
    }

    pub fn get(&self, index: usize) -> Option<&Segment> {
        self.segments.get(index)
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn position_of_remote(&self, id: &SegmentId) -> Option<usize> {
        self.segments.iter().position(|s| s.remote_id() == Some(id))
    }

    pub fn position_of_local(&self, local_id: Uuid) -> Option<usize> {
        self.segments
            .iter()
            .position(|s| s.local_id() == Some(local_id))
    }

    /// Remote identifiers in playlist order. Pending segments are skipped.
    pub fn persisted_ids(&self) -> Vec<SegmentId> {
        self.segments
            .iter()
            .filter_map(|s| s.remote_id().cloned())
            .collect()
    }

    pub fn pending(&self) -> impl Iterator<Item = &Segment> {
        self.segments.iter().filter(|s| s.is_pending())
    }

    fn check(&self, index: usize) -> Result<(), IndexOutOfRange> {
        if index < self.segments.len() {
            Ok(())
        } else {
            Err(IndexOutOfRange {
                index,
                len: self.segments.len(),
            })
        }
    }

    fn renumber(&mut self) {
        for (i, segment) in self.segments.iter_mut().enumerate() {
            segment.order = i;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::{Blob, MimeType};
    use crate::segment::Provenance;

    fn persisted(id: &str) -> Segment {
        Segment::persisted(id.into(), format!("http://cdn/{id}"), Provenance::Recorded)
    }

    fn ids(store: &SegmentStore) -> Vec<String> {
        store
            .snapshot()
            .iter()
            .map(|s| s.remote_id().map(|id| id.0.clone()).unwrap_or_default())
            .collect()
    }

    fn assert_dense(store: &SegmentStore) {
        let orders: Vec<usize> = store.snapshot().iter().map(|s| s.order).collect();
        let expected: Vec<usize> = (0..store.len()).collect();
        assert_eq!(orders, expected);
    }

    #[test]
    fn append_assigns_next_index() {
        let mut store = SegmentStore::new();
        assert_eq!(store.append(persisted("a")), 0);
        assert_eq!(store.append(persisted("b")), 1);
        assert_eq!(store.len(), 2);
        assert_dense(&store);
    }

    #[test]
    fn remove_shifts_later_segments_down() {
        let mut store = SegmentStore::from_segments(vec![persisted("a"), persisted("b"), persisted("c")]);
        let removed = store.remove(1).unwrap();
        assert_eq!(removed.remote_id(), Some(&SegmentId::from("b")));
        assert_eq!(ids(&store), vec!["a", "c"]);
        assert_dense(&store);
    }

    #[test]
    fn remove_out_of_range_fails() {
        let mut store = SegmentStore::from_segments(vec![persisted("a")]);
        assert_eq!(store.remove(1), Err(IndexOutOfRange { index: 1, len: 1 }));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn swap_exchanges_positions() {
        let mut store = SegmentStore::from_segments(vec![persisted("a"), persisted("b"), persisted("c")]);
        store.swap(0, 2).unwrap();
        assert_eq!(ids(&store), vec!["c", "b", "a"]);
        assert_dense(&store);
    }

    #[test]
    fn swap_with_invalid_index_leaves_store_untouched() {
        let mut store = SegmentStore::from_segments(vec![persisted("a"), persisted("b")]);
        assert!(store.swap(0, 5).is_err());
        assert!(store.swap(7, 0).is_err());
        assert_eq!(ids(&store), vec!["a", "b"]);
    }

    #[test]
    fn snapshot_is_detached_from_store() {
        let mut store = SegmentStore::from_segments(vec![persisted("a"), persisted("b")]);
        let before = store.snapshot();
        store.remove(0).unwrap();
        assert_eq!(before.len(), 2);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn replace_at_keeps_position() {
        let blob = Blob::new(vec![0u8; 4], MimeType::Unspecified);
        let mut store = SegmentStore::from_segments(vec![persisted("a")]);
        let pending = Segment::pending(blob, "blob:talenta/p", Provenance::Uploaded);
        let local = pending.local_id().unwrap();
        store.append(pending);
        store.append(persisted("c"));

        let index = store.position_of_local(local).unwrap();
        store.replace_at(index, persisted("b")).unwrap();

        assert_eq!(ids(&store), vec!["a", "b", "c"]);
        assert_dense(&store);
    }

    #[test]
    fn persisted_ids_skip_pending() {
        let blob = Blob::new(vec![0u8; 4], MimeType::Unspecified);
        let mut store = SegmentStore::from_segments(vec![persisted("a")]);
        store.append(Segment::pending(blob, "blob:talenta/p", Provenance::Recorded));
        store.append(persisted("c"));

        assert_eq!(store.persisted_ids(), vec![SegmentId::from("a"), SegmentId::from("c")]);
        assert_eq!(store.pending().count(), 1);
    }

    /// Drives a long pseudo-random mix of operations and checks density after
    /// every step.
    #[test]
    fn order_stays_dense_under_mixed_operations() {
        let mut store = SegmentStore::new();
        let mut seed: u64 = 0x2545_F491_4F6C_DD1D;
        let mut next = || {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            seed
        };

        for step in 0..500 {
            let len = store.len();
            match next() % 3 {
                0 => {
                    store.append(persisted(&format!("s{step}")));
                }
                1 if len > 0 => {
                    store.remove((next() as usize) % len).unwrap();
                }
                2 if len > 1 => {
                    let a = (next() as usize) % len;
                    let b = (next() as usize) % len;
                    store.swap(a, b).unwrap();
                }
                _ => {
                    let _ = store.remove(len);
                }
            }
            assert_dense(&store);
        }
    }
}
