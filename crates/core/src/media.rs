// crates/core/src/media.rs
//! Media formats, quality presets and result-file bookkeeping.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::MediaError;
use crate::video_id::is_valid_video_id;

/// URL prefix under which the media directory is served.
pub const MEDIA_URL_PREFIX: &str = "/media";

/// Output container requested by the browser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaFormat {
    Mp4,
    Mp3,
}

impl MediaFormat {
    pub fn extension(self) -> &'static str {
        match self {
            MediaFormat::Mp4 => "mp4",
            MediaFormat::Mp3 => "mp3",
        }
    }
}

impl FromStr for MediaFormat {
    type Err = MediaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mp4" => Ok(MediaFormat::Mp4),
            "mp3" => Ok(MediaFormat::Mp3),
            other => Err(MediaError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// Video quality preset. Anything unrecognized falls back to `Best`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Resolution {
    P360,
    P480,
    #[default]
    P720,
    P1080,
    Best,
}

impl Resolution {
    /// Parse a `720p`-style label. Missing labels mean 720p.
    pub fn parse(label: Option<&str>) -> Self {
        match label.map(str::trim) {
            None | Some("") => Resolution::P720,
            Some("360p") => Resolution::P360,
            Some("480p") => Resolution::P480,
            Some("720p") => Resolution::P720,
            Some("1080p") => Resolution::P1080,
            Some(_) => Resolution::Best,
        }
    }

    /// Format selector passed to the fetch tool.
    pub fn format_code(self) -> &'static str {
        match self {
            Resolution::P360 => "18",
            Resolution::P480 => "135",
            Resolution::P720 => "22",
            Resolution::P1080 => "137+140",
            Resolution::Best => "best",
        }
    }
}

/// Content type for a file served from the media directory.
pub fn content_type_for(path: &Path) -> Option<&'static str> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("mp4") => Some("video/mp4"),
        Some("mp3") => Some("audio/mpeg"),
        Some("webm") => Some("video/webm"),
        _ => None,
    }
}

/// Maps job ids to files inside the media directory and to the public
/// locators browsers use to fetch them.
#[derive(Debug, Clone)]
pub struct MediaLayout {
    root: PathBuf,
}

impl MediaLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn checked(id: &str) -> Result<&str, MediaError> {
        if is_valid_video_id(id) {
            Ok(id)
        } else {
            Err(MediaError::InvalidId(id.to_string()))
        }
    }

    /// Where the downloaded result for `id` is written.
    pub fn output_file(&self, id: &str, format: MediaFormat) -> Result<PathBuf, MediaError> {
        let id = Self::checked(id)?;
        Ok(self.root.join(format!("{id}.{}", format.extension())))
    }

    /// Public path of the downloaded result, e.g. `/media/<id>.mp4`.
    pub fn locator(&self, id: &str, format: MediaFormat) -> Result<String, MediaError> {
        let id = Self::checked(id)?;
        Ok(format!("{MEDIA_URL_PREFIX}/{id}.{}", format.extension()))
    }

    pub fn preview_file(&self, id: &str) -> Result<PathBuf, MediaError> {
        let id = Self::checked(id)?;
        Ok(self.root.join(format!("{id}_preview.mp3")))
    }

    pub fn preview_temp_file(&self, id: &str) -> Result<PathBuf, MediaError> {
        let id = Self::checked(id)?;
        Ok(self.root.join(format!("{id}_temp.webm")))
    }

    pub fn preview_locator(&self, id: &str) -> Result<String, MediaError> {
        let id = Self::checked(id)?;
        Ok(format!("{MEDIA_URL_PREFIX}/{id}_preview.mp3"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_format_parse() {
        assert_eq!("mp4".parse::<MediaFormat>().unwrap(), MediaFormat::Mp4);
        assert_eq!(" MP3 ".parse::<MediaFormat>().unwrap(), MediaFormat::Mp3);
        assert_eq!(
            "flac".parse::<MediaFormat>().unwrap_err(),
            MediaError::UnsupportedFormat("flac".to_string())
        );
    }

    #[test]
    fn test_resolution_format_codes() {
        assert_eq!(Resolution::parse(Some("360p")).format_code(), "18");
        assert_eq!(Resolution::parse(Some("480p")).format_code(), "135");
        assert_eq!(Resolution::parse(Some("720p")).format_code(), "22");
        assert_eq!(Resolution::parse(Some("1080p")).format_code(), "137+140");
        assert_eq!(Resolution::parse(Some("4k")).format_code(), "best");
    }

    #[test]
    fn test_resolution_defaults_to_720p() {
        assert_eq!(Resolution::parse(None), Resolution::P720);
        assert_eq!(Resolution::parse(Some("")), Resolution::P720);
    }

    #[test]
    fn test_layout_paths() {
        let layout = MediaLayout::new("/srv/media");
        assert_eq!(
            layout.output_file("abc", MediaFormat::Mp4).unwrap(),
            PathBuf::from("/srv/media/abc.mp4")
        );
        assert_eq!(layout.locator("abc", MediaFormat::Mp3).unwrap(), "/media/abc.mp3");
        assert_eq!(
            layout.preview_file("abc").unwrap(),
            PathBuf::from("/srv/media/abc_preview.mp3")
        );
        assert_eq!(
            layout.preview_temp_file("abc").unwrap(),
            PathBuf::from("/srv/media/abc_temp.webm")
        );
        assert_eq!(layout.preview_locator("abc").unwrap(), "/media/abc_preview.mp3");
    }

    #[test]
    fn test_layout_rejects_traversal() {
        let layout = MediaLayout::new("/srv/media");
        assert!(layout.output_file("../secret", MediaFormat::Mp4).is_err());
        assert!(layout.locator("a/b", MediaFormat::Mp4).is_err());
    }

    #[test]
    fn test_content_types() {
        assert_eq!(content_type_for(Path::new("a.mp4")), Some("video/mp4"));
        assert_eq!(content_type_for(Path::new("a.mp3")), Some("audio/mpeg"));
        assert_eq!(content_type_for(Path::new("a.webm")), Some("video/webm"));
        assert_eq!(content_type_for(Path::new("a.txt")), None);
    }
}
