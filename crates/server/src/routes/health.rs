// crates/server/src/routes/health.rs
//! `GET /api/health`: liveness plus a glance at the broadcast engine.

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    /// Downloads still short of `complete`/`error`.
    pub active_jobs: usize,
    /// Jobs someone is watching over `/api/progress`.
    pub observed_jobs: usize,
}

impl HealthResponse {
    fn from_state(state: &AppState) -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_secs: state.uptime_secs(),
            active_jobs: state.store.active().len(),
            observed_jobs: state.registry.job_count(),
        }
    }
}

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse::from_state(&state))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(health_check))
}
