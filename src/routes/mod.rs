pub mod queue;
pub mod sync;

use axum::routing::{get, post, put};
use axum::Router;

use crate::state::SharedState;

pub fn api_routes() -> Router<SharedState> {
    Router::new()
        // Sync status and control
        .route("/api/v1/status", get(sync::status))
        .route("/api/v1/sync", post(sync::trigger))
        .route("/api/v1/connectivity", put(sync::set_connectivity))
        // Queue
        .route(
            "/api/v1/queue",
            get(queue::list).post(queue::enqueue).delete(queue::clear),
        )
        .route("/api/v1/queue/retry-failed", post(queue::retry_failed))
        .route("/api/v1/queue/{id}", get(queue::get).delete(queue::remove))
}
