// crates/server/src/error.rs
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use fetchtube_core::{MediaError, VideoIdError};
use serde::Serialize;
use thiserror::Error;

use crate::fetcher::FetchError;

/// Structured JSON error response for API errors
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
        }
    }

    pub fn with_details(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: Some(details.into()),
        }
    }
}

/// API error types that map to HTTP status codes
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Invalid video URL: {0}")]
    VideoId(#[from] VideoIdError),

    #[error("Invalid media request: {0}")]
    Media(#[from] MediaError),

    #[error("Fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_response) = match &self {
            ApiError::JobNotFound(id) => {
                tracing::warn!(job_id = %id, "Job not found");
                (
                    StatusCode::NOT_FOUND,
                    ErrorResponse::with_details("Job not found", format!("Job ID: {}", id)),
                )
            }
            ApiError::FileNotFound(id) => {
                tracing::warn!(job_id = %id, "File not found");
                (
                    StatusCode::NOT_FOUND,
                    ErrorResponse::with_details("File not found", format!("Video ID: {}", id)),
                )
            }
            ApiError::VideoId(err) => {
                tracing::warn!(error = %err, "Invalid video URL");
                (
                    StatusCode::BAD_REQUEST,
                    ErrorResponse::with_details("Invalid YouTube URL", err.to_string()),
                )
            }
            ApiError::Media(err) => {
                tracing::warn!(error = %err, "Invalid media request");
                (
                    StatusCode::BAD_REQUEST,
                    ErrorResponse::with_details("Bad request", err.to_string()),
                )
            }
            ApiError::Fetch(err) => {
                tracing::error!(error = %err, "Media tool failed");
                let message = match err {
                    FetchError::Parse { .. } => "Failed to parse video information",
                    _ => "Failed to fetch media",
                };
                (StatusCode::INTERNAL_SERVER_ERROR, ErrorResponse::new(message))
            }
            ApiError::Internal(msg) => {
                tracing::error!(message = %msg, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::new("Internal server error"),
                )
            }
            ApiError::BadRequest(msg) => {
                tracing::warn!(message = %msg, "Bad request");
                (
                    StatusCode::BAD_REQUEST,
                    ErrorResponse::with_details("Bad request", msg.clone()),
                )
            }
            ApiError::Conflict(msg) => {
                tracing::warn!(message = %msg, "Conflict");
                (
                    StatusCode::CONFLICT,
                    ErrorResponse::with_details("Conflict", msg.clone()),
                )
            }
        };

        (status, Json(error_response)).into_response()
    }
}

/// Result type alias for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
