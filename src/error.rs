//! Error taxonomy for the filesystem-facing operations.
//!
//! Internal helpers return `anyhow::Result`; `BucketFsError` is the
//! narrower type the kernel-op dispatcher deals in, mapped to a POSIX
//! errno at the edge.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BucketFsError {
    #[error("no such entry: {0}")]
    NotFound(String),

    #[error("access denied: {0}")]
    AccessDenied(String),

    #[error("not implemented: {0}")]
    NotImplemented(&'static str),

    #[error("remote failure: {0}")]
    RemoteFailure(#[from] anyhow::Error),

    #[error("eviction failed: {0}")]
    EvictionError(String),
}

impl BucketFsError {
    /// Map to the POSIX errno the kernel binding expects in its reply.
    pub fn errno(&self) -> libc::c_int {
        match self {
            BucketFsError::NotFound(_) => libc::ENOENT,
            BucketFsError::AccessDenied(_) => libc::EACCES,
            BucketFsError::NotImplemented(_) => libc::ENOSYS,
            BucketFsError::RemoteFailure(_) => libc::EIO,
            BucketFsError::EvictionError(_) => libc::EIO,
        }
    }
}
