//! Bridges `fuser::Filesystem`'s synchronous callbacks to this crate's
//! async cache and bucket operations by handing off to a shared Tokio
//! runtime rather than spinning up one per call.

use std::future::Future;

use tokio::runtime::Handle;

/// Run `future` to completion on `handle`, blocking the calling thread.
///
/// `fuser`'s session loop dispatches each kernel op on a plain OS thread,
/// never on a Tokio-owned worker, so a bare `Handle::block_on` is safe
/// here: there is no outer task on this thread for it to starve. (Unlike
/// `tokio::task::block_in_place`, which requires the calling thread to
/// already be a runtime worker and would panic in this context.)
pub fn block_on<F: Future>(handle: &Handle, future: F) -> F::Output {
    handle.block_on(future)
}
