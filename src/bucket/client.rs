//! The `BucketClient` contract and the `FileInfo` descriptor it deals in.
//!
//! Kept as a manually boxed-future trait object rather than pulling in
//! `async-trait`: a hand-written `Pin<Box<dyn Future<...>>>` return type
//! covers the one async method this trait needs without an extra
//! proc-macro dependency.

use anyhow::Error;
use std::future::Future;
use std::pin::Pin;

/// An immutable descriptor of a remote object. Produced by a bucket
/// listing; a refresh replaces the whole descriptor rather than mutating
/// it in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    pub file_id: String,
    pub file_name: String,
    pub size: u64,
    /// Milliseconds since epoch.
    pub upload_timestamp: i64,
    pub content_sha1: String,
}

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, Error>> + Send + 'a>>;

/// Narrow interface to the remote object-storage bucket. Implementations
/// are free to talk whatever wire protocol the bucket actually speaks;
/// nothing upstream of this trait cares.
pub trait BucketClient: Send + Sync {
    /// List the bucket's objects. The second tuple element is reserved
    /// for backend-specific metadata (e.g. a version id) that callers in
    /// this crate never need.
    fn ls<'a>(&'a self, recursive: bool) -> BoxFuture<'a, Vec<(FileInfo, ())>>;

    /// Fetch `[inclusive_lo, inclusive_hi]` (both ends inclusive) of the
    /// object identified by `file_id`.
    fn download_range<'a>(
        &'a self,
        file_id: &'a str,
        inclusive_lo: u64,
        inclusive_hi: u64,
    ) -> BoxFuture<'a, Vec<u8>>;

    /// Delete a specific object version. Unused by the read-only core.
    fn delete_file_version<'a>(&'a self, file_id: &'a str, file_name: &'a str) -> BoxFuture<'a, ()>;

    /// Upload new bytes under `file_name`. Unused by the read-only core.
    fn upload_bytes<'a>(&'a self, data: Vec<u8>, file_name: &'a str) -> BoxFuture<'a, FileInfo>;
}
