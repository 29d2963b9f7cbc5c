//! Stabbing-query interval indices over cached byte ranges.
//!
//! Two flavors share the same storage shape but differ in what eviction
//! means for them: a `PlainIntervalIndex` never evicts (used for ranges
//! fetched to serve a read that must stay resident for the life of the
//! open file), an `EvictingIntervalIndex` additionally timestamps every
//! insert and can drop entries older than a cutoff.
//!
//! Intervals are half-open `[begin, end)`. Entries are identified by
//! allocation (`Arc::ptr_eq`), not by value, so two byte-identical ranges
//! inserted separately are distinct entries for eviction purposes.

use std::sync::Arc;
use std::time::Instant;

/// A cached byte range plus its bytes, identified by pointer identity.
#[derive(Debug)]
pub struct CachedInterval {
    pub begin: u64,
    pub end: u64,
    pub data: Vec<u8>,
}

impl CachedInterval {
    pub fn new(begin: u64, data: Vec<u8>) -> Arc<Self> {
        let end = begin + data.len() as u64;
        Arc::new(Self { begin, end, data })
    }

    pub fn len(&self) -> u64 {
        self.end - self.begin
    }

    pub fn is_empty(&self) -> bool {
        self.begin == self.end
    }

    fn overlaps(&self, begin: u64, end: u64) -> bool {
        self.begin < end && begin < self.end
    }
}

/// Intervals that never expire on their own; removal is always explicit.
#[derive(Debug, Default)]
pub struct PlainIntervalIndex {
    entries: Vec<Arc<CachedInterval>>,
}

impl PlainIntervalIndex {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    pub fn insert(&mut self, interval: Arc<CachedInterval>) {
        self.entries.push(interval);
    }

    /// All entries overlapping `[begin, end)`, in insertion order.
    pub fn query(&self, begin: u64, end: u64) -> Vec<Arc<CachedInterval>> {
        self.entries
            .iter()
            .filter(|entry| entry.overlaps(begin, end))
            .cloned()
            .collect()
    }

    pub fn remove(&mut self, target: &Arc<CachedInterval>) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| !Arc::ptr_eq(entry, target));
        self.entries.len() != before
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<CachedInterval>> {
        self.entries.iter()
    }
}

/// Intervals timestamped at insertion, queryable by "older than a cutoff"
/// for time-based eviction. No ad-hoc `remove`: every entry leaves through
/// `evict_older_than` so the time ordering stays consistent.
#[derive(Debug, Default)]
pub struct EvictingIntervalIndex {
    entries: Vec<(Instant, Arc<CachedInterval>)>,
}

impl EvictingIntervalIndex {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    pub fn insert(&mut self, interval: Arc<CachedInterval>) {
        self.entries.push((Instant::now(), interval));
    }

    pub fn query(&self, begin: u64, end: u64) -> Vec<Arc<CachedInterval>> {
        self.entries
            .iter()
            .filter(|(_, entry)| entry.overlaps(begin, end))
            .map(|(_, entry)| entry.clone())
            .collect()
    }

    /// Remove and return every entry whose insertion timestamp is older
    /// than `cutoff` (measured as time elapsed since insertion).
    pub fn evict_older_than(&mut self, max_age: std::time::Duration) -> Vec<Arc<CachedInterval>> {
        let mut evicted = Vec::new();
        self.entries.retain(|(inserted_at, entry)| {
            if inserted_at.elapsed() >= max_age {
                evicted.push(entry.clone());
                false
            } else {
                true
            }
        });
        evicted
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::time::Duration;

    #[test]
    fn plain_query_returns_overlapping_only() {
        let mut index = PlainIntervalIndex::new();
        index.insert(CachedInterval::new(0, vec![0; 10]));
        index.insert(CachedInterval::new(20, vec![0; 10]));

        let hits = index.query(5, 15);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].begin, 0);

        let hits = index.query(10, 20);
        assert!(hits.is_empty(), "half-open ranges must not touch at the boundary");
    }

    #[test]
    fn remove_matches_by_identity_not_value() {
        let mut index = PlainIntervalIndex::new();
        let a = CachedInterval::new(0, vec![1, 2, 3]);
        let b = CachedInterval::new(0, vec![1, 2, 3]);
        index.insert(a.clone());
        index.insert(b.clone());

        assert!(index.remove(&a));
        assert_eq!(index.len(), 1);
        assert!(index.query(0, 3).iter().any(|entry| Arc::ptr_eq(entry, &b)));
    }

    #[test]
    fn evicting_index_drops_only_stale_entries() {
        let mut index = EvictingIntervalIndex::new();
        index.insert(CachedInterval::new(0, vec![0; 4]));
        std::thread::sleep(Duration::from_millis(20));
        index.insert(CachedInterval::new(10, vec![0; 4]));

        let evicted = index.evict_older_than(Duration::from_millis(10));
        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].begin, 0);
        assert_eq!(index.len(), 1);
    }
}
