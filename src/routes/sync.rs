use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use crate::error::AppError;
use crate::state::SharedState;
use crate::sync::{SyncReport, SyncStatus};

#[derive(Deserialize)]
pub struct SetConnectivity {
    pub online: bool,
}

pub async fn status(State(state): State<SharedState>) -> Json<SyncStatus> {
    Json(state.status.snapshot())
}

pub async fn trigger(State(state): State<SharedState>) -> Result<Json<SyncReport>, AppError> {
    let report = state.manager.sync().await?;
    Ok(Json(report))
}

pub async fn set_connectivity(
    State(state): State<SharedState>,
    Json(req): Json<SetConnectivity>,
) -> Json<SyncStatus> {
    state.connectivity.set_online(req.online);
    Json(state.status.snapshot())
}
