//! Integration tests for the `/api/progress` SSE stream.
//!
//! A scripted `MediaBackend` stands in for `yt-dlp`: each test drives a
//! download through `/api/download` (or publishes directly) and reads the
//! SSE body to verify what an observer sees.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use futures_util::StreamExt;
use tokio::sync::{mpsc, Notify};
use tower::ServiceExt;

use fetchtube_core::{JobStatus, MediaLayout, VideoInfo};
use fetchtube_server::{create_app, AppState, DownloadRequest, FetchError, MediaBackend};
use fetchtube_server_jobs::DeliveryConfig;

const VIDEO_ID: &str = "dQw4w9WgXcQ";

/// Waits for `go`, reports `steps`, then finishes.
struct ScriptedBackend {
    layout: MediaLayout,
    steps: Vec<f64>,
    fail: bool,
    go: Arc<Notify>,
}

#[async_trait]
impl MediaBackend for ScriptedBackend {
    async fn video_info(&self, _id: &str, _url: &str) -> Result<VideoInfo, FetchError> {
        unreachable!("not used by progress tests")
    }

    async fn preview(&self, _id: &str) -> Result<String, FetchError> {
        unreachable!("not used by progress tests")
    }

    async fn download(
        &self,
        request: &DownloadRequest,
        progress: mpsc::Sender<f64>,
    ) -> Result<String, FetchError> {
        self.go.notified().await;
        for pct in &self.steps {
            let _ = progress.send(*pct).await;
        }
        if self.fail {
            return Err(FetchError::Failed {
                tool: "yt-dlp".into(),
                status: "exit status: 1".into(),
                stderr: "ERROR: Video unavailable".into(),
            });
        }
        Ok(self.layout.locator(&request.id, request.format)?)
    }
}

struct Harness {
    state: Arc<AppState>,
    go: Arc<Notify>,
    _dir: tempfile::TempDir,
}

fn harness(steps: Vec<f64>, fail: bool, delivery: DeliveryConfig) -> Harness {
    let dir = tempfile::tempdir().expect("temp media dir");
    let layout = MediaLayout::new(dir.path());
    let go = Arc::new(Notify::new());
    let backend = Arc::new(ScriptedBackend {
        layout: layout.clone(),
        steps,
        fail,
        go: go.clone(),
    });
    Harness {
        state: AppState::new(layout, backend, delivery),
        go,
        _dir: dir,
    }
}

impl Harness {
    fn app(&self) -> Router {
        create_app(self.state.clone())
    }

    async fn open_stream(&self, id: &str) -> Body {
        let response = self
            .app()
            .oneshot(
                Request::builder()
                    .uri(format!("/api/progress?id={id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        // The session attaches on its own task; wait until it has.
        wait_until(|| self.state.registry.subscriber_count(id) > 0).await;
        response.into_body()
    }

    async fn start_download(&self, query: &str) -> StatusCode {
        let response = self
            .app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/api/download?{query}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        response.status()
    }
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

async fn read_to_end(body: Body) -> String {
    let bytes = tokio::time::timeout(Duration::from_secs(5), axum::body::to_bytes(body, usize::MAX))
        .await
        .expect("stream did not end")
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Parse an SSE body into its `data:` payloads and the number of comment
/// (heartbeat) lines.
fn parse_sse_body(body: &str) -> (Vec<serde_json::Value>, usize) {
    let mut events = Vec::new();
    let mut comments = 0;
    let mut current_data = String::new();

    for line in body.lines() {
        if let Some(data) = line.strip_prefix("data:") {
            current_data.push_str(data.trim());
        } else if line.starts_with(':') {
            comments += 1;
        } else if line.is_empty() && !current_data.is_empty() {
            if let Ok(json) = serde_json::from_str::<serde_json::Value>(&current_data) {
                events.push(json);
            }
            current_data.clear();
        }
    }

    // Handle final event (SSE body may not have trailing blank line)
    if !current_data.is_empty() {
        if let Ok(json) = serde_json::from_str::<serde_json::Value>(&current_data) {
            events.push(json);
        }
    }

    (events, comments)
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn test_observer_sees_download_from_start_to_complete() {
    let h = harness(vec![50.0], false, DeliveryConfig::default());
    let body = h.open_stream(VIDEO_ID).await;

    let status = h
        .start_download(&format!("id={VIDEO_ID}&format=mp4&resolution=720p"))
        .await;
    assert_eq!(status, StatusCode::OK);
    // The 5% publish happens before the backend is released.
    wait_until(|| h.state.store.get(VIDEO_ID).is_some_and(|s| s.progress == 5.0)).await;
    h.go.notify_one();

    let (events, _) = parse_sse_body(&read_to_end(body).await);
    let summary: Vec<(f64, String)> = events
        .iter()
        .map(|e| {
            (
                e["progress"].as_f64().unwrap(),
                e["status"].as_str().unwrap().to_string(),
            )
        })
        .collect();
    assert_eq!(
        summary,
        vec![
            (5.0, "downloading".to_string()),
            (50.0, "downloading".to_string()),
            (100.0, "complete".to_string()),
        ]
    );
    assert_eq!(events[2]["filePath"], format!("/media/{VIDEO_ID}.mp4"));
    assert!(events[0].get("filePath").is_none());

    wait_until(|| h.state.registry.job_count() == 0).await;
}

#[tokio::test]
async fn test_failed_download_ends_stream_with_error() {
    let h = harness(vec![12.5], true, DeliveryConfig::default());
    let body = h.open_stream(VIDEO_ID).await;

    assert_eq!(
        h.start_download(&format!("id={VIDEO_ID}&format=mp3")).await,
        StatusCode::OK
    );
    wait_until(|| h.state.store.get(VIDEO_ID).is_some_and(|s| s.progress == 5.0)).await;
    h.go.notify_one();

    let (events, _) = parse_sse_body(&read_to_end(body).await);
    let last = events.last().expect("at least one event");
    assert_eq!(last["status"], "error");
    assert_eq!(last["progress"], 0.0);
    assert_eq!(
        h.state.store.get(VIDEO_ID).map(|s| s.status),
        Some(JobStatus::Error)
    );
}

#[tokio::test]
async fn test_late_observer_starts_from_latest_snapshot() {
    let h = harness(vec![], false, DeliveryConfig::default());
    let publisher = &h.state.publisher;
    publisher.publish("J1", 5.0, JobStatus::Downloading, None).await;
    publisher.publish("J1", 42.0, JobStatus::Downloading, None).await;

    let body = h.open_stream("J1").await;
    publisher.publish("J1", 80.0, JobStatus::Downloading, None).await;
    publisher
        .publish("J1", 100.0, JobStatus::Complete, Some("/media/J1.mp4".into()))
        .await;

    let (events, _) = parse_sse_body(&read_to_end(body).await);
    let progress: Vec<f64> = events.iter().map(|e| e["progress"].as_f64().unwrap()).collect();
    assert_eq!(progress, vec![42.0, 80.0, 100.0]);
}

#[tokio::test]
async fn test_idle_stream_gets_keepalive_and_detaches_on_disconnect() {
    let delivery = DeliveryConfig {
        heartbeat_interval: Duration::from_millis(20),
        ..DeliveryConfig::default()
    };
    let h = harness(vec![], false, delivery);
    let body = h.open_stream("J2").await;

    let mut frames = body.into_data_stream();
    let first = tokio::time::timeout(Duration::from_secs(5), frames.next())
        .await
        .expect("no heartbeat within timeout")
        .expect("stream ended early")
        .unwrap();
    let text = String::from_utf8(first.to_vec()).unwrap();
    let (events, comments) = parse_sse_body(&text);
    assert!(events.is_empty(), "unexpected data for unknown job: {text}");
    assert_eq!(comments, 1);
    assert!(text.contains("keepalive"));

    // Client goes away.
    drop(frames);
    wait_until(|| h.state.registry.job_count() == 0).await;
    let stats = h.state.registry.stats();
    assert_eq!(stats.attached, 1);
    assert_eq!(stats.detached, 1);
}

#[tokio::test]
async fn test_two_observers_each_get_the_full_sequence() {
    let h = harness(vec![30.0, 60.0, 90.0], false, DeliveryConfig::default());
    let first = h.open_stream(VIDEO_ID).await;
    let second = h.open_stream(VIDEO_ID).await;
    wait_until(|| h.state.registry.subscriber_count(VIDEO_ID) == 2).await;

    assert_eq!(
        h.start_download(&format!("id={VIDEO_ID}&format=mp4")).await,
        StatusCode::OK
    );
    wait_until(|| h.state.store.get(VIDEO_ID).is_some_and(|s| s.progress == 5.0)).await;
    h.go.notify_one();

    let (a, b) = tokio::join!(read_to_end(first), read_to_end(second));
    let (a, _) = parse_sse_body(&a);
    let (b, _) = parse_sse_body(&b);
    assert_eq!(a, b);
    assert_eq!(a.len(), 5);
    assert_eq!(a.iter().filter(|e| e["status"] == "complete").count(), 1);
}

#[tokio::test]
async fn test_duplicate_download_conflicts_until_finished() {
    let h = harness(vec![], false, DeliveryConfig::default());
    let query = format!("id={VIDEO_ID}&format=mp4");

    assert_eq!(h.start_download(&query).await, StatusCode::OK);
    assert_eq!(h.start_download(&query).await, StatusCode::CONFLICT);

    wait_until(|| h.state.store.get(VIDEO_ID).is_some_and(|s| s.progress == 5.0)).await;
    h.go.notify_one();
    wait_until(|| !h.state.store.is_running(VIDEO_ID)).await;

    assert_eq!(h.start_download(&query).await, StatusCode::OK);
}

#[test]
fn test_parse_sse_body_handles_comments_and_missing_trailer() {
    let body = ": keepalive\n\ndata: {\"id\":\"a\",\"progress\":5.0,\"status\":\"downloading\"}\n\ndata: {\"id\":\"a\",\"progress\":100.0,\"status\":\"complete\"}";
    let (events, comments) = parse_sse_body(body);
    assert_eq!(comments, 1);
    assert_eq!(events.len(), 2);
    assert_eq!(events[1]["status"], "complete");
}
