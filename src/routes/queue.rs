use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::error::AppError;
use crate::models::{HttpMethod, QueueEntry, QueueStatus};
use crate::state::SharedState;
use crate::store;

#[derive(Deserialize)]
pub struct EnqueueRequest {
    pub action: String,
    pub endpoint: String,
    pub method: String,
    pub body: Option<serde_json::Value>,
}

#[derive(Deserialize)]
pub struct ListParams {
    pub status: Option<String>,
}

pub async fn enqueue(
    State(state): State<SharedState>,
    Json(req): Json<EnqueueRequest>,
) -> Result<Json<QueueEntry>, AppError> {
    if req.action.trim().is_empty() {
        return Err(AppError::BadRequest("action is required".to_string()));
    }
    if !req.endpoint.starts_with('/') {
        return Err(AppError::BadRequest(
            "endpoint must be a path starting with '/'".to_string(),
        ));
    }
    let method: HttpMethod = req.method.parse().map_err(AppError::BadRequest)?;

    let entry = store::queue_api_call(
        state.store.as_ref(),
        &req.action,
        &req.endpoint,
        method,
        req.body.as_ref(),
    )
    .await?;

    state.status.refresh_counts(state.store.as_ref()).await?;

    if state.manager.is_online() {
        state.manager.spawn_sync();
    }

    Ok(Json(entry))
}

pub async fn list(
    State(state): State<SharedState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<QueueEntry>>, AppError> {
    let status = match params.status {
        Some(s) => s.parse::<QueueStatus>().map_err(AppError::BadRequest)?,
        None => QueueStatus::Failed,
    };

    let entries = state.store.list_by_status(status).await?;
    Ok(Json(entries))
}

pub async fn get(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<QueueEntry>, AppError> {
    let entry = state
        .store
        .get(&id)
        .await?
        .ok_or_else(|| AppError::NotFound("Queue entry not found".to_string()))?;
    Ok(Json(entry))
}

pub async fn remove(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.store.remove_entry(&id).await?;
    state.status.refresh_counts(state.store.as_ref()).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn clear(State(state): State<SharedState>) -> Result<StatusCode, AppError> {
    state.store.clear().await?;
    state.status.refresh_counts(state.store.as_ref()).await?;
    tracing::info!("Queue cleared");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn retry_failed(
    State(state): State<SharedState>,
) -> Result<Json<serde_json::Value>, AppError> {
    let requeued = state.store.requeue_failed().await?;
    state.status.refresh_counts(state.store.as_ref()).await?;

    if requeued > 0 && state.manager.is_online() {
        state.manager.spawn_sync();
    }

    Ok(Json(json!({ "requeued": requeued })))
}
