//! In-memory `BucketClient` used by tests.

use anyhow::{bail, Error};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use super::client::{BoxFuture, BucketClient, FileInfo};

struct Inner {
    objects: HashMap<String, (FileInfo, Vec<u8>)>,
    download_calls: Vec<(String, u64, u64)>,
    ls_calls: usize,
}

/// A `BucketClient` backed by an in-memory map, cheaply cloneable (it's
/// really a handle to shared state) so the same mock can be held both by
/// the `CachedBucket` under test and by the test itself for assertions.
#[derive(Clone)]
pub struct MockBucketClient {
    inner: Arc<Mutex<Inner>>,
}

impl MockBucketClient {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                objects: HashMap::new(),
                download_calls: Vec::new(),
                ls_calls: 0,
            })),
        }
    }

    pub fn put(&self, info: FileInfo, data: Vec<u8>) {
        let mut inner = self.inner.lock().unwrap();
        inner.objects.insert(info.file_id.clone(), (info, data));
    }

    pub fn ls_call_count(&self) -> usize {
        self.inner.lock().unwrap().ls_calls
    }

    /// Every `download_range` call observed so far, as `(file_id, lo, hi)`
    /// inclusive-inclusive, in call order.
    pub fn download_calls(&self) -> Vec<(String, u64, u64)> {
        self.inner.lock().unwrap().download_calls.clone()
    }

    pub fn clear_download_calls(&self) {
        self.inner.lock().unwrap().download_calls.clear();
    }
}

impl Default for MockBucketClient {
    fn default() -> Self {
        Self::new()
    }
}

impl BucketClient for MockBucketClient {
    fn ls<'a>(&'a self, _recursive: bool) -> BoxFuture<'a, Vec<(FileInfo, ())>> {
        Box::pin(async move {
            let mut inner = self.inner.lock().unwrap();
            inner.ls_calls += 1;
            Ok(inner.objects.values().map(|(info, _)| (info.clone(), ())).collect())
        })
    }

    fn download_range<'a>(
        &'a self,
        file_id: &'a str,
        inclusive_lo: u64,
        inclusive_hi: u64,
    ) -> BoxFuture<'a, Vec<u8>> {
        Box::pin(async move {
            let mut inner = self.inner.lock().unwrap();
            inner
                .download_calls
                .push((file_id.to_string(), inclusive_lo, inclusive_hi));

            let (_, data) = inner
                .objects
                .get(file_id)
                .ok_or_else(|| anyhow::anyhow!("no such file_id '{}'", file_id))?;

            let lo = inclusive_lo as usize;
            let hi = inclusive_hi as usize;
            if hi >= data.len() || lo > hi {
                bail!("range [{}, {}] out of bounds for object of length {}", lo, hi, data.len());
            }

            Ok(data[lo..=hi].to_vec())
        })
    }

    fn delete_file_version<'a>(&'a self, file_id: &'a str, _file_name: &'a str) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let mut inner = self.inner.lock().unwrap();
            inner.objects.remove(file_id);
            Ok(())
        })
    }

    fn upload_bytes<'a>(&'a self, data: Vec<u8>, file_name: &'a str) -> BoxFuture<'a, FileInfo> {
        Box::pin(async move {
            static NEXT_ID: AtomicUsize = AtomicUsize::new(1);
            let file_id = NEXT_ID.fetch_add(1, Ordering::SeqCst).to_string();
            let info = FileInfo {
                file_id: file_id.clone(),
                file_name: file_name.to_string(),
                size: data.len() as u64,
                upload_timestamp: 0,
                content_sha1: String::new(),
            };
            let mut inner = self.inner.lock().unwrap();
            inner.objects.insert(file_id, (info.clone(), data));
            Ok(info)
        })
    }
}
