//! Health check HTTP handlers

use axum::{extract::State, response::Response};

use crate::web::{AppState, responses::{HealthResponse, ok}};

/// Basic liveness plus the configured cache root
pub async fn health_check(State(state): State<AppState>) -> Response {
    let cache_path = state.coordinator.cache().root().display().to_string();
    ok(HealthResponse::healthy(cache_path))
}
