//! Background download jobs.
//!
//! Each job runs on its own task and is the single writer for its job id:
//! it publishes `downloading` snapshots as the backend reports progress and
//! ends with exactly one terminal publish.

use std::sync::Arc;

use metrics::counter;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use fetchtube_core::{monotonic_progress, JobStatus};
use fetchtube_server_jobs::ProgressPublisher;

use crate::fetcher::{DownloadRequest, MediaBackend};

/// Progress shown as soon as the tool has been launched.
pub const INITIAL_PROGRESS: f64 = 5.0;

/// Starts download jobs and drives them to a terminal publish.
#[derive(Clone)]
pub struct DownloadJobs {
    publisher: ProgressPublisher,
    backend: Arc<dyn MediaBackend>,
}

impl DownloadJobs {
    pub fn new(publisher: ProgressPublisher, backend: Arc<dyn MediaBackend>) -> Self {
        Self { publisher, backend }
    }

    /// Spawn a job for `request`. Returns `None` if a job for the same id is
    /// still running.
    pub fn start(&self, request: DownloadRequest) -> Option<JoinHandle<JobStatus>> {
        if !self.publisher.begin(&request.id) {
            return None;
        }
        counter!("download_jobs_total", "outcome" => "started").increment(1);
        tracing::info!(
            job_id = %request.id,
            format = request.format.extension(),
            "Download started"
        );
        let jobs = self.clone();
        Some(tokio::spawn(async move { jobs.run(request).await }))
    }

    async fn run(self, request: DownloadRequest) -> JobStatus {
        let id = request.id.as_str();
        self.publisher
            .publish(id, INITIAL_PROGRESS, JobStatus::Downloading, None)
            .await;

        let (tx, mut rx) = mpsc::channel::<f64>(32);
        let fetch = self.backend.download(&request, tx);
        tokio::pin!(fetch);

        let mut last = INITIAL_PROGRESS;
        let result = loop {
            tokio::select! {
                result = &mut fetch => break result,
                Some(reported) = rx.recv() => {
                    last = monotonic_progress(last, reported);
                    self.publisher.publish(id, last, JobStatus::Downloading, None).await;
                }
            }
        };
        // Lines read just before the tool exited.
        while let Ok(reported) = rx.try_recv() {
            last = monotonic_progress(last, reported);
            self.publisher.publish(id, last, JobStatus::Downloading, None).await;
        }

        match result {
            Ok(locator) => {
                tracing::info!(job_id = %id, file_path = %locator, "Download complete");
                counter!("download_jobs_total", "outcome" => "complete").increment(1);
                self.publisher
                    .publish(id, 100.0, JobStatus::Complete, Some(locator))
                    .await;
                JobStatus::Complete
            }
            Err(e) => {
                tracing::warn!(job_id = %id, error = %e, "Download failed");
                counter!("download_jobs_total", "outcome" => "error").increment(1);
                self.publisher.publish(id, 0.0, JobStatus::Error, None).await;
                JobStatus::Error
            }
        }
    }
}
