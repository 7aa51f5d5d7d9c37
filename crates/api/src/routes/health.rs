use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::handlers::jobs::COOKIES_FILE_NAME;
use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Overall service status.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    /// Jobs currently tracked (running, queued, or finished but not evicted).
    pub jobs: usize,
    /// Whether a stored cookies file will be used by default.
    pub cookies_present: bool,
}

/// GET /health -- service status and job count.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let cookies_present = tokio::fs::metadata(state.config.cookies_dir.join(COOKIES_FILE_NAME))
        .await
        .is_ok_and(|m| m.is_file());

    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        jobs: state.orchestrator.job_count(),
        cookies_present,
    })
}

/// GET /healthz -- plain-text liveness probe.
async fn liveness() -> &'static str {
    "ok"
}

/// Mount health check routes.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/healthz", get(liveness))
}
