//! `GET /metrics` in Prometheus text format.
//!
//! Counters are recorded as work happens. Store and registry sizes are
//! sampled here, right before rendering, so a scrape always sees current
//! values.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use metrics::gauge;

use crate::metrics::render_metrics;
use crate::state::AppState;

const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

fn sample_gauges(state: &AppState) {
    gauge!("progress_jobs_stored").set(state.store.len() as f64);
    gauge!("progress_jobs_active").set(state.store.active().len() as f64);
    gauge!("progress_observed_jobs").set(state.registry.job_count() as f64);
}

/// 503 until `init_metrics` has installed the recorder.
pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> Response {
    sample_gauges(&state);
    let Some(output) = render_metrics() else {
        return (StatusCode::SERVICE_UNAVAILABLE, "Metrics not initialized").into_response();
    };
    ([(header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)], output).into_response()
}

/// Mounted at the root, not under `/api`.
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/metrics", get(metrics_handler))
}
