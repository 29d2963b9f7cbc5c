pub mod cached_bucket;
pub mod client;
pub mod http;
pub mod mock;

pub use cached_bucket::CachedBucket;
pub use client::{BoxFuture, BucketClient, FileInfo};
pub use http::HttpBucketClient;
