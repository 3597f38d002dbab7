//! Locator lookup for finished downloads.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use fetchtube_core::MediaFormat;

use super::required;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct FileQuery {
    pub id: Option<String>,
    pub format: Option<String>,
}

#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(Deserialize))]
#[serde(rename_all = "camelCase")]
pub struct FileLocation {
    pub file_path: String,
}

/// GET /api/getFile?id&format - `{"filePath": "/media/<id>.<ext>"}` if the
/// download is on disk.
pub async fn get_file(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FileQuery>,
) -> ApiResult<Json<FileLocation>> {
    let id = required(query.id, "id")?;
    let format: MediaFormat = required(query.format, "format")?.parse()?;
    let path = state.media.output_file(&id, format)?;

    match tokio::fs::try_exists(&path).await {
        Ok(true) => Ok(Json(FileLocation {
            file_path: state.media.locator(&id, format)?,
        })),
        Ok(false) => Err(ApiError::FileNotFound(id)),
        Err(e) => Err(ApiError::Internal(format!(
            "stat {}: {e}",
            path.display()
        ))),
    }
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/getFile", get(get_file))
}
