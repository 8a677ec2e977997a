use std::sync::Arc;

use crate::connectivity::Connectivity;
use crate::store::QueueStore;
use crate::sync::{StatusTracker, SyncManager};

pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub store: Arc<dyn QueueStore>,
    pub manager: Arc<SyncManager>,
    pub status: Arc<StatusTracker>,
    pub connectivity: Connectivity,
}
