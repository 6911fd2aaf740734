use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    pub ok: bool,
    /// Overall service status.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    /// Runs currently in flight.
    pub active_runs: usize,
    pub max_concurrent_runs: usize,
}

/// GET /health -- returns service status and run load.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let active_runs = state.orchestrator.active_runs();
    let max_concurrent_runs = state.orchestrator.max_concurrent_runs();
    let status = if active_runs < max_concurrent_runs {
        "ok"
    } else {
        "busy"
    };

    Json(HealthResponse {
        ok: true,
        status,
        version: env!("CARGO_PKG_VERSION"),
        active_runs,
        max_concurrent_runs,
    })
}

/// Mount health check routes (intended for root-level, NOT under `/api/v1`).
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
