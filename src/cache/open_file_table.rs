//! Component C: path → `RangeCache` registry with touched-set bookkeeping
//! for the eviction worker.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{format_err, Error};
use log::warn;

use crate::bucket::{CachedBucket, FileInfo};

use super::range_cache::RangeCache;

/// Strip a single leading '/' so "path" and "/path" are the same key.
fn normalize(path: &str) -> String {
    path.strip_prefix('/').unwrap_or(path).to_string()
}

struct State {
    caches: HashMap<String, Arc<RangeCache>>,
    touched_this_interval: HashSet<String>,
    touched_previous_interval: HashSet<String>,
}

/// Tracks every currently-open file's `RangeCache`, and which files have
/// been read since the last eviction tick.
pub struct OpenFileTable {
    state: Mutex<State>,
    next_handle: AtomicU64,
}

impl OpenFileTable {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                caches: HashMap::new(),
                touched_this_interval: HashSet::new(),
                touched_previous_interval: HashSet::new(),
            }),
            next_handle: AtomicU64::new(1),
        }
    }

    /// Ensure a `RangeCache` exists for `path`, constructing it from
    /// `file_info` if this is the first open, and return a fresh handle.
    /// The handle is opaque: every subsequent op still dispatches by path.
    pub fn open(&self, path: &str, file_info: FileInfo, bucket: Arc<CachedBucket>) -> u64 {
        let key = normalize(path);
        let mut state = self.state.lock().unwrap();
        state
            .caches
            .entry(key)
            .or_insert_with(|| Arc::new(RangeCache::new(file_info, bucket)));
        self.next_handle.fetch_add(1, Ordering::SeqCst)
    }

    /// Fetch `length` bytes at `offset` from `path`'s cache, marking it
    /// touched for the next eviction tick.
    pub async fn read(&self, path: &str, offset: u64, length: u64) -> Result<Vec<u8>, Error> {
        let key = normalize(path);

        let cache = {
            let mut state = self.state.lock().unwrap();
            state.touched_this_interval.insert(key.clone());
            state
                .caches
                .get(&key)
                .cloned()
                .ok_or_else(|| format_err!("no open range cache for '{}'", key))?
        };

        cache.get(offset, length).await
    }

    /// Every currently-open path, normalized (no leading '/'). Used by
    /// `readdir` to surface files that are open but may not (yet, or any
    /// longer) appear in the bucket listing.
    pub fn open_paths(&self) -> Vec<String> {
        self.state.lock().unwrap().caches.keys().cloned().collect()
    }

    /// Drop the `RangeCache` for `path`. No remote side-effect.
    pub fn release(&self, path: &str) {
        let key = normalize(path);
        let mut state = self.state.lock().unwrap();
        state.caches.remove(&key);
    }

    /// Two-set touched bookkeeping: a file stays eligible for eviction for
    /// at least one full tick after it was last read, even if that read
    /// landed right before this tick fired.
    pub async fn evict_tick(&self, ttl: Duration) {
        let (union, caches): (HashSet<String>, HashMap<String, Arc<RangeCache>>) = {
            let mut state = self.state.lock().unwrap();
            let union: HashSet<String> = state
                .touched_this_interval
                .union(&state.touched_previous_interval)
                .cloned()
                .collect();
            state.touched_previous_interval = std::mem::take(&mut state.touched_this_interval);

            let caches = union
                .iter()
                .filter_map(|key| state.caches.get(key).map(|cache| (key.clone(), cache.clone())))
                .collect();

            (union, caches)
        };

        for key in &union {
            if let Some(cache) = caches.get(key) {
                cache.evict_older_than(ttl);
            }
        }
    }
}

impl Default for OpenFileTable {
    fn default() -> Self {
        Self::new()
    }
}
