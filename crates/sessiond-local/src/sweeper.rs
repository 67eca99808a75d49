//! Background eviction of expired sessions.

use std::{sync::Arc, time::Duration};

use sessiond_core::now_ms;
use tokio::{task::JoinHandle, time::MissedTickBehavior};

use crate::LocalFileBackend;

/// Periodic sweep task over a file-backed session store.
///
/// The task is aborted on `shutdown()` or when the handle is dropped.
pub struct ExpirationSweeper {
    handle: JoinHandle<()>,
}

impl ExpirationSweeper {
    /// Start sweeping `backend` every `interval`.
    #[must_use]
    pub fn start(backend: Arc<LocalFileBackend>, interval: Duration) -> Self {
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick fires immediately; skip it so a freshly
            // started sweeper does not race session creation.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let purged = backend.sweep(now_ms()).await;
                if purged > 0 {
                    tracing::debug!(purged, "expired sessions purged");
                }
            }
        });
        Self { handle }
    }

    /// Stop the sweep task.
    pub fn shutdown(&self) {
        self.handle.abort();
    }
}

impl Drop for ExpirationSweeper {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sessiond_core::{Session, SessionBackend};

    #[tokio::test]
    async fn purges_expired_records_on_schedule() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(LocalFileBackend::open(dir.path()).unwrap());

        let mut expired = Session::new("old", 1);
        expired.last_accessed_time -= 2000;
        backend.put(&expired).await.unwrap();
        backend.put(&Session::new("fresh", 1800)).await.unwrap();

        let sweeper = ExpirationSweeper::start(Arc::clone(&backend), Duration::from_millis(20));
        tokio::time::sleep(Duration::from_millis(120)).await;
        sweeper.shutdown();

        assert!(!backend.record_path("old").exists());
        assert!(backend.record_path("fresh").exists());
    }
}
