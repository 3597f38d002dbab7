//! API route handlers for the fetchtube server.

pub mod download;
pub mod files;
pub mod health;
pub mod info;
pub mod jobs;
pub mod media;
pub mod metrics;
pub mod preview;
pub mod progress;

use std::sync::Arc;

use axum::Router;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Create the combined router.
///
/// Routes:
/// - GET  /api/health - Health check
/// - GET  /api/info?url= - Video metadata
/// - GET  /api/preview?id&format - Embed URL (mp4) or short audio preview (mp3)
/// - GET|POST /api/download?id&format&resolution - Start a download job
/// - GET  /api/progress?id= - SSE stream of one job's progress
/// - GET  /api/getFile?id&format - Locator of a finished download
/// - GET  /api/jobs - Snapshots of running jobs
/// - GET  /api/jobs/{id} - Latest snapshot of one job
/// - GET  /media/* - Downloaded files and previews
/// - GET  /metrics - Prometheus metrics
pub fn api_routes(state: Arc<AppState>) -> Router {
    let media_root = state.media.root().to_path_buf();
    Router::new()
        .nest("/api", health::router())
        .nest("/api", info::router())
        .nest("/api", preview::router())
        .nest("/api", download::router())
        .nest("/api", progress::router())
        .nest("/api", files::router())
        .nest("/api", jobs::router())
        .merge(media::router(&media_root))
        .merge(metrics::router())
        .with_state(state)
}

/// A query parameter that must be present and non-blank.
pub(crate) fn required(value: Option<String>, name: &str) -> ApiResult<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::BadRequest(format!("Missing required parameter: {name}")))
}
