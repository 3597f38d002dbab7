//! Media fetch/transcode tools behind the `MediaBackend` seam.
//!
//! `YtDlpBackend` shells out to `yt-dlp` and `ffmpeg` with
//! `tokio::process::Command`. Tests and alternative deployments substitute
//! their own `MediaBackend`.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;

use fetchtube_core::{
    parse_progress_line, watch_url, MediaError, MediaFormat, MediaLayout, Resolution, VideoInfo,
};

/// Seconds of audio in a generated preview.
pub const PREVIEW_SECONDS: u32 = 10;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Failed to spawn {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} failed ({status}): {stderr}")]
    Failed {
        tool: String,
        status: String,
        stderr: String,
    },

    #[error("Failed to parse {tool} output: {message}")]
    Parse { tool: String, message: String },

    #[error(transparent)]
    Media(#[from] MediaError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// One download requested by a browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub id: String,
    pub format: MediaFormat,
    pub resolution: Resolution,
}

#[async_trait]
pub trait MediaBackend: Send + Sync {
    /// Metadata for the video at `url`, reported under `id`.
    async fn video_info(&self, id: &str, url: &str) -> Result<VideoInfo, FetchError>;

    /// Make sure a short mp3 preview exists; returns its public locator.
    async fn preview(&self, id: &str) -> Result<String, FetchError>;

    /// Fetch the full media file, sending every percentage the tool reports
    /// to `progress`. Returns the public locator of the result.
    async fn download(
        &self,
        request: &DownloadRequest,
        progress: mpsc::Sender<f64>,
    ) -> Result<String, FetchError>;
}

#[derive(Debug, Deserialize)]
struct RawInfo {
    title: String,
    #[serde(default)]
    thumbnail: Option<String>,
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default)]
    uploader: Option<String>,
}

/// Turn `yt-dlp --dump-json` output into `VideoInfo`.
pub fn parse_video_info(id: &str, dump: &[u8]) -> Result<VideoInfo, FetchError> {
    let raw: RawInfo = serde_json::from_slice(dump).map_err(|e| FetchError::Parse {
        tool: "yt-dlp".to_string(),
        message: e.to_string(),
    })?;
    Ok(VideoInfo {
        id: id.to_string(),
        title: raw.title,
        thumbnail: raw.thumbnail.unwrap_or_default(),
        duration: raw.duration.map_or(0, |d| d.max(0.0) as u64),
        author: raw.uploader.unwrap_or_default(),
    })
}

/// Arguments for a full download of `request` into `output`.
pub fn download_args(request: &DownloadRequest, output: &Path) -> Vec<String> {
    let output = output.to_string_lossy().into_owned();
    let mut args = vec!["--newline".to_string()];
    match request.format {
        MediaFormat::Mp4 => args.extend([
            "--format".to_string(),
            request.resolution.format_code().to_string(),
            "--merge-output-format".to_string(),
            "mp4".to_string(),
        ]),
        MediaFormat::Mp3 => args.extend([
            "--extract-audio".to_string(),
            "--audio-format".to_string(),
            "mp3".to_string(),
            "--audio-quality".to_string(),
            "0".to_string(),
        ]),
    }
    args.extend(["-o".to_string(), output, watch_url(&request.id)]);
    args
}

/// `yt-dlp` + `ffmpeg` implementation of `MediaBackend`.
#[derive(Debug, Clone)]
pub struct YtDlpBackend {
    yt_dlp: PathBuf,
    ffmpeg: PathBuf,
    layout: MediaLayout,
}

impl YtDlpBackend {
    pub fn new(yt_dlp: impl Into<PathBuf>, ffmpeg: impl Into<PathBuf>, layout: MediaLayout) -> Self {
        Self {
            yt_dlp: yt_dlp.into(),
            ffmpeg: ffmpeg.into(),
            layout,
        }
    }

    fn command(program: &Path) -> Command {
        let mut cmd = Command::new(program);
        cmd.stdin(Stdio::null()).kill_on_drop(true);
        cmd
    }

    /// Run a tool to completion, failing on a non-zero exit.
    async fn run_to_end(program: &Path, mut cmd: Command) -> Result<Vec<u8>, FetchError> {
        let tool = tool_name(program);
        let output = cmd
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|source| FetchError::Spawn {
                tool: tool.clone(),
                source,
            })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(failed(tool, output.status, last_line(&stderr)));
        }
        Ok(output.stdout)
    }
}

fn tool_name(program: &Path) -> String {
    program
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| program.display().to_string())
}

fn failed(tool: String, status: ExitStatus, stderr: &str) -> FetchError {
    FetchError::Failed {
        tool,
        status: status.to_string(),
        stderr: stderr.chars().take(500).collect(),
    }
}

/// One line of tool output, without the trailing `\r` of CRLF endings.
fn decode_line(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).trim_end_matches('\r').to_string()
}

fn last_line(text: &str) -> &str {
    text.lines().rev().find(|l| !l.trim().is_empty()).unwrap_or("")
}

#[async_trait]
impl MediaBackend for YtDlpBackend {
    async fn video_info(&self, id: &str, url: &str) -> Result<VideoInfo, FetchError> {
        let mut cmd = Self::command(&self.yt_dlp);
        cmd.args(["--dump-json", url]);
        let dump = Self::run_to_end(&self.yt_dlp, cmd).await?;
        parse_video_info(id, &dump)
    }

    async fn preview(&self, id: &str) -> Result<String, FetchError> {
        let preview = self.layout.preview_file(id)?;
        let locator = self.layout.preview_locator(id)?;
        if tokio::fs::try_exists(&preview).await? {
            return Ok(locator);
        }

        let temp = self.layout.preview_temp_file(id)?;
        let mut fetch = Self::command(&self.yt_dlp);
        fetch
            .args(["--format", "bestaudio", "--output"])
            .arg(&temp)
            .arg("--postprocessor-args")
            .arg(format!("-ss 0 -t {PREVIEW_SECONDS}"))
            .arg(watch_url(id));
        Self::run_to_end(&self.yt_dlp, fetch).await?;

        let mut transcode = Self::command(&self.ffmpeg);
        transcode
            .arg("-i")
            .arg(&temp)
            .args(["-f", "mp3", "-ab", "128k", "-y"])
            .arg(&preview);
        let converted = Self::run_to_end(&self.ffmpeg, transcode).await;

        if let Err(e) = tokio::fs::remove_file(&temp).await {
            tracing::debug!(path = %temp.display(), error = %e, "Preview temp file not removed");
        }
        converted?;
        tracing::info!(video_id = %id, "Audio preview generated");
        Ok(locator)
    }

    async fn download(
        &self,
        request: &DownloadRequest,
        progress: mpsc::Sender<f64>,
    ) -> Result<String, FetchError> {
        let output = self.layout.output_file(&request.id, request.format)?;
        let locator = self.layout.locator(&request.id, request.format)?;
        let tool = tool_name(&self.yt_dlp);

        let mut cmd = Self::command(&self.yt_dlp);
        cmd.args(download_args(request, &output))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        tracing::info!(
            video_id = %request.id,
            format = request.format.extension(),
            resolution = request.resolution.format_code(),
            "Spawning download"
        );
        let mut child = cmd.spawn().map_err(|source| FetchError::Spawn {
            tool: tool.clone(),
            source,
        })?;

        let stdout = child.stdout.take().ok_or_else(|| FetchError::Parse {
            tool: tool.clone(),
            message: "failed to capture stdout".to_string(),
        })?;
        let stderr = child.stderr.take().ok_or_else(|| FetchError::Parse {
            tool: tool.clone(),
            message: "failed to capture stderr".to_string(),
        })?;
        // Raw segments: the tool may print bytes that are not UTF-8.
        let mut out_lines = BufReader::new(stdout).split(b'\n');
        let mut err_lines = BufReader::new(stderr).split(b'\n');
        let (mut out_done, mut err_done) = (false, false);
        let mut last_error = String::new();
        let mut read_error = None;

        // yt-dlp prints progress on stdout and warnings on stderr; scan both
        // until both reach EOF.
        while !(out_done && err_done) {
            let line = tokio::select! {
                segment = out_lines.next_segment(), if !out_done => match segment {
                    Ok(Some(bytes)) => decode_line(&bytes),
                    Ok(None) => {
                        out_done = true;
                        continue;
                    }
                    Err(e) => {
                        read_error = Some(e);
                        break;
                    }
                },
                segment = err_lines.next_segment(), if !err_done => match segment {
                    Ok(Some(bytes)) => {
                        let line = decode_line(&bytes);
                        if !line.trim().is_empty() {
                            last_error.clone_from(&line);
                        }
                        line
                    }
                    Ok(None) => {
                        err_done = true;
                        continue;
                    }
                    Err(e) => {
                        read_error = Some(e);
                        break;
                    }
                },
                else => break,
            };
            if let Some(pct) = parse_progress_line(&line) {
                // The job runner may have stopped listening; keep draining.
                let _ = progress.send(pct).await;
            }
        }

        if let Some(e) = read_error {
            // Nobody drains the pipes any more; the tool would block on a full one.
            tracing::warn!(video_id = %request.id, error = %e, "Lost tool output, killing download");
            if let Err(kill) = child.kill().await {
                tracing::debug!(error = %kill, "Download process already gone");
            }
            return Err(FetchError::Io(e));
        }

        let status = child.wait().await?;
        if !status.success() {
            return Err(failed(tool, status, &last_error));
        }
        Ok(locator)
    }
}
