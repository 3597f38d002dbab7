//! Download job submission.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use fetchtube_core::{is_valid_video_id, MediaError, MediaFormat, Resolution};

use super::required;
use crate::error::{ApiError, ApiResult};
use crate::fetcher::DownloadRequest;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    pub id: Option<String>,
    pub format: Option<String>,
    pub resolution: Option<String>,
}

#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(Deserialize))]
pub struct DownloadStarted {
    pub status: String,
    pub id: String,
}

/// GET|POST /api/download - start a background download.
///
/// Progress is reported on `/api/progress?id=<id>`; failures after this
/// point only show up there as an `error` snapshot.
pub async fn start_download(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DownloadQuery>,
) -> ApiResult<Json<DownloadStarted>> {
    let id = required(query.id, "id")?;
    let format: MediaFormat = required(query.format, "format")?.parse()?;
    if !is_valid_video_id(&id) {
        return Err(MediaError::InvalidId(id).into());
    }
    let request = DownloadRequest {
        id: id.clone(),
        format,
        resolution: Resolution::parse(query.resolution.as_deref()),
    };

    if state.downloads.start(request).is_none() {
        return Err(ApiError::Conflict(format!(
            "A download for {id} is already running"
        )));
    }

    Ok(Json(DownloadStarted {
        status: "started".to_string(),
        id,
    }))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/download", get(start_download).post(start_download))
}
