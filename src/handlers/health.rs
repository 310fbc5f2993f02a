use axum::{extract::State, Json};
use tracing::debug;

use crate::models::{HealthResponse, ReadyResponse};
use crate::state::AppState;

/// Health check endpoint
pub async fn health_check() -> Json<HealthResponse> {
    debug!("Health check requested");
    Json(HealthResponse {
        status: "ok".to_string(),
        message: "Server is running".to_string(),
    })
}

/// Readiness check endpoint
pub async fn ready_check(State(state): State<AppState>) -> Json<ReadyResponse> {
    debug!("Readiness check requested");
    Json(ReadyResponse {
        status: "ok".to_string(),
        message: "Service is ready".to_string(),
        store: state.service.store_name().to_string(),
    })
}
