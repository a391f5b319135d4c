//! Health handlers

use axum::{extract::State, Json};
use chrono::Utc;
use serde_json::{json, Value};

use crate::error::{ApiError, ErrorKind};
use crate::AppState;

/// Liveness probe
pub async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Readiness probe; pings the Store through the port
pub async fn readiness_check(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    state
        .store
        .due_queue_entries(Utc::now(), 1)
        .await
        .map_err(|e| ApiError::new(ErrorKind::Unavailable, format!("store not ready: {}", e)))?;
    Ok(Json(json!({ "status": "ready" })))
}
