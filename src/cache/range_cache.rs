//! Component B: the per-open-file read-range cache.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Error;

use crate::bucket::{CachedBucket, FileInfo};

use super::interval_index::{CachedInterval, EvictingIntervalIndex, PlainIntervalIndex};

/// Reads shorter than this are amplified up to this length on a cache miss.
pub const MIN_READ_LEN_WITHOUT_CACHE: u64 = 16_384;

struct Indices {
    perm: PlainIntervalIndex,
    temp: EvictingIntervalIndex,
}

/// `amplify(offset, length)`: never shifts the start backward, grows short
/// reads up to `MIN_READ_LEN_WITHOUT_CACHE`, and routes offset-zero reads
/// (file headers) to the permanent tier.
fn amplify(offset: u64, length: u64) -> (u64, u64, bool) {
    let new_offset = offset;
    let new_length = length.max(MIN_READ_LEN_WITHOUT_CACHE);
    let keep = offset == 0;
    (new_offset, new_length, keep)
}

/// A cached, range-fetching view of one remote object's bytes.
pub struct RangeCache {
    file_info: FileInfo,
    bucket: Arc<CachedBucket>,
    indices: Mutex<Indices>,
    parallel_counter: AtomicUsize,
}

impl RangeCache {
    pub fn new(file_info: FileInfo, bucket: Arc<CachedBucket>) -> Self {
        Self {
            file_info,
            bucket,
            indices: Mutex::new(Indices {
                perm: PlainIntervalIndex::new(),
                temp: EvictingIntervalIndex::new(),
            }),
            parallel_counter: AtomicUsize::new(0),
        }
    }

    pub fn file_info(&self) -> &FileInfo {
        &self.file_info
    }

    /// In-flight fetch count, for observability only.
    pub fn parallel_fetches(&self) -> usize {
        self.parallel_counter.load(Ordering::Relaxed)
    }

    async fn fetch(&self, begin: u64, end: u64) -> Result<Vec<u8>, Error> {
        self.parallel_counter.fetch_add(1, Ordering::SeqCst);
        let result = self
            .bucket
            .download_range(&self.file_info.file_id, begin, end - 1)
            .await;
        self.parallel_counter.fetch_sub(1, Ordering::SeqCst);
        result
    }

    fn store(&self, begin: u64, data: Vec<u8>, keep: bool) -> Arc<CachedInterval> {
        let interval = CachedInterval::new(begin, data);
        let mut indices = self.indices.lock().unwrap();
        if keep {
            indices.perm.insert(interval.clone());
        } else {
            indices.temp.insert(interval.clone());
        }
        interval
    }

    /// Serve `length` bytes starting at `offset`, fetching and caching
    /// whatever isn't already resident.
    pub async fn get(&self, offset: u64, length: u64) -> Result<Vec<u8>, Error> {
        let lo = offset;
        let hi = offset + length;

        let mut overlapping = {
            let indices = self.indices.lock().unwrap();
            let mut hits = indices.perm.query(lo, hi);
            hits.extend(indices.temp.query(lo, hi));
            hits
        };
        overlapping.sort_by_key(|interval| interval.begin);

        if overlapping.is_empty() {
            let (new_offset, new_length, keep) = amplify(offset, length);
            let data = self.fetch(new_offset, new_offset + new_length).await?;
            self.store(new_offset, data.clone(), keep);
            let start = (offset - new_offset) as usize;
            let end = start + length as usize;
            return Ok(data[start..end].to_vec());
        }

        let mut result = Vec::with_capacity(length as usize);

        if overlapping[0].begin > lo {
            let hole_end = overlapping[0].begin;
            let data = self.fetch(lo, hole_end).await?;
            self.store(lo, data.clone(), false);
            result.extend_from_slice(&data);
        }

        let mut prev_end = overlapping[0].begin;
        for interval in &overlapping {
            if interval.begin > prev_end {
                let data = self.fetch(prev_end, interval.begin).await?;
                self.store(prev_end, data.clone(), false);
                result.extend_from_slice(&data);
                prev_end = interval.begin;
            }

            let overlap = prev_end.saturating_sub(interval.begin);
            let slice_start = (lo.saturating_sub(interval.begin) + overlap) as usize;
            let slice_end = (hi.min(interval.end) - interval.begin) as usize;

            if slice_end > slice_start {
                result.extend_from_slice(&interval.data[slice_start..slice_end]);
            }

            prev_end = prev_end.max(interval.end);
        }

        if (result.len() as u64) < length {
            let remaining_begin = offset + result.len() as u64;
            let data = self.fetch(remaining_begin, offset + length).await?;
            self.store(remaining_begin, data.clone(), false);
            result.extend_from_slice(&data);
        }

        result.truncate(length as usize);
        Ok(result)
    }

    /// Drop every `temp` entry older than `max_age`. Permanent-tier entries
    /// are never touched.
    pub fn evict_older_than(&self, max_age: Duration) -> usize {
        let mut indices = self.indices.lock().unwrap();
        indices.temp.evict_older_than(max_age).len()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::bucket::mock::MockBucketClient;

    fn make_object(size: usize) -> Vec<u8> {
        (0..size).map(|i| (i % 256) as u8).collect()
    }

    fn make_cache(client: MockBucketClient, file_id: &str, size: u64) -> RangeCache {
        let bucket = Arc::new(CachedBucket::new(Arc::new(client), Duration::from_secs(120)));
        RangeCache::new(
            FileInfo {
                file_id: file_id.to_string(),
                file_name: "plot".to_string(),
                size,
                upload_timestamp: 0,
                content_sha1: String::new(),
            },
            bucket,
        )
    }

    #[tokio::test]
    async fn s1_header_then_overlapping_read() {
        let client = MockBucketClient::new();
        let data = make_object(100_000);
        client.put(
            FileInfo {
                file_id: "f1".into(),
                file_name: "plot".into(),
                size: 100_000,
                upload_timestamp: 0,
                content_sha1: String::new(),
            },
            data.clone(),
        );
        let cache = make_cache(client.clone(), "f1", 100_000);

        let got = cache.get(0, 16_384).await.unwrap();
        assert_eq!(got, data[0..16_384]);

        client.clear_download_calls();
        let got = cache.get(0, 8_000).await.unwrap();
        assert_eq!(got, data[0..8_000]);
        assert!(client.download_calls().is_empty());

        client.clear_download_calls();
        let got = cache.get(10_000, 20_000).await.unwrap();
        assert_eq!(got, data[10_000..30_000]);
        let calls = client.download_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0], ("f1".to_string(), 16_384, 29_999));
    }

    #[tokio::test]
    async fn s2_mid_file_read_is_amplified() {
        let client = MockBucketClient::new();
        let data = make_object(100_000);
        client.put(
            FileInfo {
                file_id: "f1".into(),
                file_name: "plot".into(),
                size: 100_000,
                upload_timestamp: 0,
                content_sha1: String::new(),
            },
            data.clone(),
        );
        let cache = make_cache(client.clone(), "f1", 100_000);

        let got = cache.get(50_000, 4_096).await.unwrap();
        assert_eq!(got, data[50_000..54_096]);

        let calls = client.download_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0], ("f1".to_string(), 50_000, 66_383));
    }

    #[tokio::test]
    async fn s3_eviction_releases_temp_but_not_perm() {
        let client = MockBucketClient::new();
        let data = make_object(100_000);
        client.put(
            FileInfo {
                file_id: "f1".into(),
                file_name: "plot".into(),
                size: 100_000,
                upload_timestamp: 0,
                content_sha1: String::new(),
            },
            data.clone(),
        );
        let cache = make_cache(client.clone(), "f1", 100_000);

        cache.get(0, 16_384).await.unwrap();
        cache.get(50_000, 4_096).await.unwrap();

        cache.evict_older_than(Duration::from_millis(0));

        client.clear_download_calls();
        cache.get(0, 16_384).await.unwrap();
        assert!(client.download_calls().is_empty(), "permanent tier must survive eviction");

        client.clear_download_calls();
        cache.get(50_000, 4_096).await.unwrap();
        assert_eq!(client.download_calls().len(), 1, "temp tier entry must have been evicted");
    }

    #[tokio::test]
    async fn s4_hole_between_two_cached_ranges() {
        let client = MockBucketClient::new();
        let mut data = vec![0u8; 500];
        for (i, byte) in data.iter_mut().enumerate() {
            *byte = (i % 256) as u8;
        }
        client.put(
            FileInfo {
                file_id: "f1".into(),
                file_name: "plot".into(),
                size: 500,
                upload_timestamp: 0,
                content_sha1: String::new(),
            },
            data.clone(),
        );
        let cache = make_cache(client.clone(), "f1", 500);

        // Seed temp = {[100,200), [400,500)} directly via two amplification-
        // free fetches (lengths below MIN_READ_LEN_WITHOUT_CACHE are still
        // amplified on miss, so we seed through the private store path by
        // issuing reads and then overwriting expectations around them).
        cache.store_for_test(100, data[100..200].to_vec());
        cache.store_for_test(400, data[400..500].to_vec());

        client.clear_download_calls();
        let got = cache.get(150, 300).await.unwrap();
        let mut expected = Vec::new();
        expected.extend_from_slice(&data[150..200]);
        expected.extend_from_slice(&data[200..400]);
        expected.extend_from_slice(&data[400..450]);
        assert_eq!(got, expected);

        let calls = client.download_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0], ("f1".to_string(), 200, 399));
    }

    impl RangeCache {
        /// Test-only direct insert into `temp`, bypassing `get`'s fetch path.
        fn store_for_test(&self, begin: u64, data: Vec<u8>) {
            self.store(begin, data, false);
        }
    }
}
