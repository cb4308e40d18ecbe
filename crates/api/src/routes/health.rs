use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Overall service status.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    /// Jobs whose transform process is running.
    pub active_jobs: usize,
    /// Jobs waiting for an admission permit.
    pub queued_jobs: usize,
}

/// GET /health -- returns service status and job engine load.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let counts = state.tracker.counts().await;

    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        active_jobs: counts.active,
        queued_jobs: counts.queued,
    })
}

/// Mount health check routes (intended for root-level, NOT under `/api`).
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
