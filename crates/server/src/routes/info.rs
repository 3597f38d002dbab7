//! Video metadata lookup.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use fetchtube_core::{extract_video_id, VideoInfo};

use super::required;
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct InfoQuery {
    pub url: Option<String>,
}

/// GET /api/info?url= - title, thumbnail, duration and uploader of a video.
pub async fn video_info(
    State(state): State<Arc<AppState>>,
    Query(query): Query<InfoQuery>,
) -> ApiResult<Json<VideoInfo>> {
    let url = required(query.url, "url")?;
    let id = extract_video_id(&url)?;
    let info = state.backend.video_info(&id, &url).await?;
    tracing::debug!(video_id = %id, title = %info.title, "Video info fetched");
    Ok(Json(info))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/info", get(video_info))
}
