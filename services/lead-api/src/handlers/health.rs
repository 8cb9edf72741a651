//! Health check handlers

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Serialize)]
pub struct ReadyResponse {
    pub status: &'static str,
    pub payments: &'static str,
    pub queued_jobs: usize,
}

/// Liveness probe - always returns OK if the service is running
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Readiness probe - reports feature flags and queue depth; there is no
/// local database to check, the Lead Store is only reached per-request
pub async fn ready(State(state): State<AppState>) -> Json<ReadyResponse> {
    Json(ReadyResponse {
        status: "ready",
        payments: if state.config.payments_enabled {
            "enabled"
        } else {
            "disabled"
        },
        queued_jobs: state.jobs.as_ref().map(|j| j.depth()).unwrap_or(0),
    })
}
