//! Preview endpoint.
//!
//! Video previews are the platform's embeddable player; audio previews are
//! a short mp3 cut generated on first request and reused afterwards.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::routing::get;
use axum::Router;
use serde::Deserialize;

use fetchtube_core::{embed_url, is_valid_video_id, MediaError, MediaFormat};

use super::required;
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PreviewQuery {
    pub id: Option<String>,
    pub format: Option<String>,
    /// Accepted for symmetry with `/download`; previews ignore it.
    pub resolution: Option<String>,
}

/// GET /api/preview - responds with a URL as plain text.
pub async fn preview(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PreviewQuery>,
) -> ApiResult<String> {
    let id = required(query.id, "id")?;
    let format: MediaFormat = required(query.format, "format")?.parse()?;
    if !is_valid_video_id(&id) {
        return Err(MediaError::InvalidId(id).into());
    }

    match format {
        MediaFormat::Mp4 => Ok(embed_url(&id)),
        MediaFormat::Mp3 => Ok(state.backend.preview(&id).await?),
    }
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/preview", get(preview))
}
