//! Route definitions for extraction jobs.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::jobs;
use crate::state::AppState;

/// Job routes, mounted at the root.
///
/// ```text
/// POST   /start             -> start_job
/// GET    /progress/{id}     -> job_progress (SSE)
/// GET    /result/{id}       -> job_result (file download)
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/start", post(jobs::start_job))
        .route("/progress/{id}", get(jobs::job_progress))
        .route("/result/{id}", get(jobs::job_result))
}
