pub mod config;
pub mod connectivity;
pub mod db;
pub mod error;
pub mod models;
pub mod routes;
pub mod state;
pub mod store;
pub mod sync;
pub mod transport;

use std::sync::Arc;

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::connectivity::Connectivity;
use crate::state::{AppState, SharedState};
use crate::store::QueueStore;
use crate::sync::{RetryPolicy, StatusTracker, SyncManager};
use crate::transport::Transport;

/// Wire the queue store, transport and connectivity signal into one owned state.
///
/// The manager is not started here; call `state.manager.start()` once the
/// runtime is up.
pub fn build_state(
    store: Arc<dyn QueueStore>,
    transport: Arc<dyn Transport>,
    connectivity: Connectivity,
    policy: RetryPolicy,
) -> SharedState {
    let status = Arc::new(StatusTracker::new(connectivity.is_online()));

    let manager = Arc::new(SyncManager::new(
        Arc::clone(&store),
        transport,
        connectivity.clone(),
        status.clone(),
        policy,
    ));

    Arc::new(AppState {
        store,
        manager,
        status,
        connectivity,
    })
}

pub fn build_app(state: SharedState) -> Router {
    Router::new()
        .merge(routes::api_routes())
        .route("/health", axum::routing::get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
