pub mod eviction;
pub mod interval_index;
pub mod open_file_table;
pub mod range_cache;

pub use eviction::EvictionWorker;
pub use interval_index::{CachedInterval, EvictingIntervalIndex, PlainIntervalIndex};
pub use open_file_table::OpenFileTable;
pub use range_cache::RangeCache;
