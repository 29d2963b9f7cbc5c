//! bucketfs: mounts a remote object-storage bucket as a read-only,
//! range-cached FUSE filesystem.
//!
//! A flat bucket listing (`bucket::CachedBucket`) is projected into a
//! directory tree (`directory::DirectoryStructure`); open files are
//! served out of a per-file read-range cache (`cache::RangeCache`)
//! managed by `cache::OpenFileTable` and periodically pruned by
//! `cache::EvictionWorker`; `filesystem::FilesystemFacade` wires all of
//! that into the kernel filesystem operation set via `fuser`.

pub mod bucket;
pub mod buildcfg;
pub mod cache;
pub mod config;
pub mod directory;
pub mod error;
pub mod filesystem;
pub mod inode;
pub mod runtime;
