//! Component D: the periodic eviction background task.

use std::sync::Arc;
use std::time::Duration;

use log::debug;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::open_file_table::OpenFileTable;

/// How often the worker wakes up and how far back its eviction cutoff
/// reaches; the two are the same constant so a freshly-touched file
/// survives at least one full tick before it can be reclaimed.
pub const TICK: Duration = Duration::from_secs(30);

/// Runs `OpenFileTable::evict_tick` on a fixed interval until told to stop.
///
/// Unlike a bare daemon thread, shutdown is cooperative: dropping the
/// `EvictionWorker` (or calling `stop`) flips a `tokio::sync::watch`
/// channel that the loop selects on between sleeps, so the task exits
/// promptly instead of outliving the filesystem.
pub struct EvictionWorker {
    stop_tx: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
}

impl EvictionWorker {
    pub fn spawn(table: Arc<OpenFileTable>) -> Self {
        let (stop_tx, mut stop_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(TICK) => {
                        debug!("eviction tick firing");
                        table.evict_tick(TICK).await;
                    }
                    _ = stop_rx.changed() => {
                        if *stop_rx.borrow() {
                            debug!("eviction worker stopping");
                            break;
                        }
                    }
                }
            }
        });

        Self {
            stop_tx,
            handle: Some(handle),
        }
    }

    /// Signal the worker to stop and wait for it to exit.
    pub async fn stop(mut self) {
        let _ = self.stop_tx.send(true);
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for EvictionWorker {
    fn drop(&mut self) {
        let _ = self.stop_tx.send(true);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn stop_returns_promptly() {
        let table = Arc::new(OpenFileTable::new());
        let worker = EvictionWorker::spawn(table);
        // Cooperative shutdown must not wait for a full TICK.
        let started = std::time::Instant::now();
        worker.stop().await;
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
