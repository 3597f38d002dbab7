// crates/core/src/error.rs
use thiserror::Error;

/// Errors that can occur when extracting a video id from a URL
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VideoIdError {
    #[error("URL is empty")]
    Empty,

    #[error("Invalid YouTube URL: {url}")]
    NotRecognized { url: String },
}

/// Errors that can occur when interpreting media request parameters
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MediaError {
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid media id: {0}")]
    InvalidId(String),
}

impl VideoIdError {
    pub fn not_recognized(url: impl Into<String>) -> Self {
        Self::NotRecognized { url: url.into() }
    }
}
