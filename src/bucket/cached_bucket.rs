//! Component F: time-bounded memoization of bucket listings over a
//! `BucketClient`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Error;
use tokio::sync::Mutex as AsyncMutex;

use super::client::{BucketClient, FileInfo};

struct ListingEntry {
    fetched_at: Instant,
    entries: Arc<Vec<(FileInfo, ())>>,
}

/// Wraps a `BucketClient`, memoizing `ls()` for `ttl` and serializing
/// refreshes behind a single per-bucket lock so concurrent cache misses
/// don't stampede the remote listing endpoint.
pub struct CachedBucket {
    client: Arc<dyn BucketClient>,
    ttl: Duration,
    // Keyed by the `recursive` flag: non-recursive and recursive listings
    // are independent memoized values.
    listings: AsyncMutex<HashMap<bool, ListingEntry>>,
}

impl CachedBucket {
    pub fn new(client: Arc<dyn BucketClient>, ttl: Duration) -> Self {
        Self {
            client,
            ttl,
            listings: AsyncMutex::new(HashMap::new()),
        }
    }

    /// Return the memoized listing if it is still within `ttl`, otherwise
    /// refresh it. The lock is held across the refresh's `.await` on
    /// purpose: that's what prevents a stampede.
    pub async fn ls(&self, recursive: bool) -> Result<Arc<Vec<(FileInfo, ())>>, Error> {
        let mut listings = self.listings.lock().await;

        if let Some(entry) = listings.get(&recursive) {
            if entry.fetched_at.elapsed() < self.ttl {
                return Ok(entry.entries.clone());
            }
        }

        let fresh = self.client.ls(recursive).await?;
        let entries = Arc::new(fresh);
        listings.insert(
            recursive,
            ListingEntry {
                fetched_at: Instant::now(),
                entries: entries.clone(),
            },
        );

        Ok(entries)
    }

    pub async fn download_range(
        &self,
        file_id: &str,
        inclusive_lo: u64,
        inclusive_hi: u64,
    ) -> Result<Vec<u8>, Error> {
        self.client.download_range(file_id, inclusive_lo, inclusive_hi).await
    }

    pub async fn delete_file_version(&self, file_id: &str, file_name: &str) -> Result<(), Error> {
        self.client.delete_file_version(file_id, file_name).await
    }

    pub async fn upload_bytes(&self, data: Vec<u8>, file_name: &str) -> Result<FileInfo, Error> {
        self.client.upload_bytes(data, file_name).await
    }
}
