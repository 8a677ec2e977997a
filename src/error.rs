use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Errors raised by queue store operations.
///
/// These are never folded into the retry bookkeeping of a drain cycle.
#[derive(Debug)]
pub enum QueueError {
    StorageUnavailable(sqlx::Error),
    EntryNotFound(String),
    Serialization(serde_json::Error),
}

impl std::fmt::Display for QueueError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueueError::StorageUnavailable(err) => write!(f, "Storage unavailable: {err}"),
            QueueError::EntryNotFound(id) => write!(f, "Queue entry {id} not found"),
            QueueError::Serialization(err) => write!(f, "Failed to serialize request body: {err}"),
        }
    }
}

impl std::error::Error for QueueError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            QueueError::StorageUnavailable(err) => Some(err),
            QueueError::EntryNotFound(_) => None,
            QueueError::Serialization(err) => Some(err),
        }
    }
}

impl From<sqlx::Error> for QueueError {
    fn from(err: sqlx::Error) -> Self {
        QueueError::StorageUnavailable(err)
    }
}

impl From<sqlx::migrate::MigrateError> for QueueError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        QueueError::StorageUnavailable(sqlx::Error::Migrate(Box::new(err)))
    }
}

impl From<serde_json::Error> for QueueError {
    fn from(err: serde_json::Error) -> Self {
        QueueError::Serialization(err)
    }
}

/// Errors returned by the local HTTP API.
#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    BadRequest(String),
    Queue(QueueError),
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppError::NotFound(msg) => write!(f, "Not Found: {msg}"),
            AppError::BadRequest(msg) => write!(f, "Bad Request: {msg}"),
            AppError::Queue(err) => write!(f, "Queue Error: {err}"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Queue(QueueError::EntryNotFound(id)) => {
                (StatusCode::NOT_FOUND, format!("Queue entry {id} not found"))
            }
            AppError::Queue(QueueError::Serialization(err)) => {
                (StatusCode::BAD_REQUEST, format!("Invalid body: {err}"))
            }
            AppError::Queue(err) => {
                tracing::error!("Queue error: {err}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

impl From<QueueError> for AppError {
    fn from(err: QueueError) -> Self {
        AppError::Queue(err)
    }
}
