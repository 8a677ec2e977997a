use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::error::QueueError;
use crate::store::QueueStore;

use super::SyncCallbacks;

/// Observable sync state for status displays.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStatus {
    pub is_online: bool,
    pub pending_count: u64,
    pub failed_count: u64,
    pub is_syncing: bool,
    pub last_sync_at: Option<DateTime<Utc>>,
}

/// Folds manager callbacks into a [`SyncStatus`] that can be read or watched.
pub struct StatusTracker {
    tx: watch::Sender<SyncStatus>,
}

impl StatusTracker {
    pub fn new(is_online: bool) -> Self {
        let (tx, _rx) = watch::channel(SyncStatus {
            is_online,
            ..SyncStatus::default()
        });
        Self { tx }
    }

    pub fn snapshot(&self) -> SyncStatus {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SyncStatus> {
        self.tx.subscribe()
    }

    /// Reload counts from the store, e.g. at startup or after a producer enqueued.
    pub async fn refresh_counts(&self, store: &dyn QueueStore) -> Result<(), QueueError> {
        let counts = store.count_by_status().await?;
        self.on_queue_change(counts.pending, counts.failed);
        Ok(())
    }

    fn update(&self, f: impl FnOnce(&mut SyncStatus)) {
        self.tx.send_modify(f);
    }
}

impl SyncCallbacks for StatusTracker {
    fn on_sync_start(&self) {
        self.update(|s| s.is_syncing = true);
    }

    fn on_sync_complete(&self, processed: u64, failed: u64) {
        self.update(|s| {
            s.is_syncing = false;
            if processed > 0 || failed > 0 {
                s.last_sync_at = Some(Utc::now());
            }
        });
    }

    fn on_online_change(&self, online: bool) {
        self.update(|s| s.is_online = online);
    }

    fn on_queue_change(&self, pending: u64, failed: u64) {
        self.update(|s| {
            s.pending_count = pending;
            s.failed_count = failed;
        });
    }
}
