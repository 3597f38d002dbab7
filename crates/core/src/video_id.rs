// crates/core/src/video_id.rs
//! Video id extraction from the URL shapes browsers paste in.

use std::sync::OnceLock;

use regex_lite::Regex;

use crate::error::VideoIdError;

fn video_url_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"(?:youtube\.com/(?:[^/]+/.+/|(?:v|e(?:mbed)?)/|.*[?&]v=)|youtu\.be/)([^"&?/\s]{11})"#,
        )
        .expect("valid video url regex")
    })
}

/// Extract the 11-character video id from a watch, short, embed or `/v/` URL.
pub fn extract_video_id(url: &str) -> Result<String, VideoIdError> {
    let url = url.trim();
    if url.is_empty() {
        return Err(VideoIdError::Empty);
    }
    video_url_regex()
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| VideoIdError::not_recognized(url))
}

/// Whether `id` is safe to use as a job id and as a file stem.
///
/// Ids end up in filesystem paths under the media directory, so only the
/// characters that appear in real video ids are accepted.
pub fn is_valid_video_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 64
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

/// Canonical watch URL handed to the fetch tool.
pub fn watch_url(id: &str) -> String {
    format!("https://www.youtube.com/watch?v={id}")
}

/// Embeddable player URL used as the video preview.
pub fn embed_url(id: &str) -> String {
    format!("https://www.youtube.com/embed/{id}")
}
