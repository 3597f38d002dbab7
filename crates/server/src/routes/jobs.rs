// crates/server/src/routes/jobs.rs
//! API routes for download job state.
//!
//! - GET /jobs - Snapshots of all running jobs
//! - GET /jobs/{id} - Latest snapshot of one job

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use std::sync::Arc;

use fetchtube_core::ProgressSnapshot;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// GET /api/jobs - List all running jobs.
async fn list_jobs(State(state): State<Arc<AppState>>) -> Json<Vec<ProgressSnapshot>> {
    let mut jobs = state.store.active();
    jobs.sort_by(|a, b| a.id.cmp(&b.id));
    Json(jobs)
}

/// GET /api/jobs/{id} - Latest snapshot, finished jobs included until evicted.
async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<ProgressSnapshot>> {
    state
        .store
        .get(&id)
        .map(Json)
        .ok_or(ApiError::JobNotFound(id))
}

/// Build the jobs router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/jobs", get(list_jobs))
        .route("/jobs/{id}", get(get_job))
}
