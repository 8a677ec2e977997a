pub mod manager;
pub mod policy;
pub mod status;

use serde::{Deserialize, Serialize};

pub use manager::SyncManager;
pub use policy::RetryPolicy;
pub use status::{StatusTracker, SyncStatus};

/// Totals for one drain cycle. `failed` counts failed attempts, not entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub processed: u64,
    pub failed: u64,
}

/// Lifecycle notifications from a [`SyncManager`]. All methods default to no-ops.
pub trait SyncCallbacks: Send + Sync {
    fn on_sync_start(&self) {}

    fn on_sync_complete(&self, _processed: u64, _failed: u64) {}

    fn on_online_change(&self, _online: bool) {}

    fn on_queue_change(&self, _pending: u64, _failed: u64) {}
}

pub struct NoopCallbacks;

impl SyncCallbacks for NoopCallbacks {}
