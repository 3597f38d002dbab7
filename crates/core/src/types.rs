// crates/core/src/types.rs
use serde::{Deserialize, Serialize};

/// Opaque, caller-supplied job identifier. For downloads this is the video id.
pub type JobId = String;

/// Lifecycle of a background job.
///
/// `Pending` is implicit until the first update. `Complete` and `Error` are
/// terminal: nothing follows them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Downloading,
    Complete,
    Error,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Complete | JobStatus::Error)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Downloading => "downloading",
            JobStatus::Complete => "complete",
            JobStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State of one job at one point in time.
///
/// Serialized flat as `{"id","progress","status","filePath"?}`; this is the
/// payload of every progress event sent to browsers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    pub id: JobId,
    pub progress: f64,
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
}

impl ProgressSnapshot {
    pub fn new(
        id: impl Into<JobId>,
        progress: f64,
        status: JobStatus,
        file_path: Option<String>,
    ) -> Self {
        Self {
            id: id.into(),
            progress,
            status,
            file_path,
        }
    }

    pub fn downloading(id: impl Into<JobId>, progress: f64) -> Self {
        Self::new(id, progress, JobStatus::Downloading, None)
    }

    /// Terminal success. The locator is the public path of the result file.
    pub fn complete(id: impl Into<JobId>, file_path: impl Into<String>) -> Self {
        Self::new(id, 100.0, JobStatus::Complete, Some(file_path.into()))
    }

    pub fn error(id: impl Into<JobId>) -> Self {
        Self::new(id, 0.0, JobStatus::Error, None)
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Metadata reported by the fetch tool for a single video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoInfo {
    pub id: String,
    pub title: String,
    pub thumbnail: String,
    pub duration: u64,
    pub author: String,
}
