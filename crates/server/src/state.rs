// crates/server/src/state.rs
//! Application state for the Axum server.

use std::sync::Arc;
use std::time::Instant;

use fetchtube_core::MediaLayout;
use fetchtube_server_jobs::{
    DeliveryConfig, JobStore, ProgressPublisher, SessionContext, SubscriberRegistry,
};

use crate::downloads::DownloadJobs;
use crate::fetcher::MediaBackend;

/// Shared application state accessible from all route handlers.
pub struct AppState {
    /// Server start time for uptime tracking.
    pub start_time: Instant,
    /// Latest snapshot per job.
    pub store: Arc<JobStore>,
    /// Observer sinks per job.
    pub registry: Arc<SubscriberRegistry>,
    pub publisher: ProgressPublisher,
    /// Sink sizing, heartbeat and session limits for progress streams.
    pub delivery: DeliveryConfig,
    /// Where results live on disk and under `/media`.
    pub media: MediaLayout,
    /// Fetch/transcode tools.
    pub backend: Arc<dyn MediaBackend>,
    pub downloads: DownloadJobs,
}

impl AppState {
    /// Create a new application state wrapped in an Arc for sharing.
    pub fn new(
        media: MediaLayout,
        backend: Arc<dyn MediaBackend>,
        delivery: DeliveryConfig,
    ) -> Arc<Self> {
        let store = Arc::new(JobStore::new());
        let registry = Arc::new(SubscriberRegistry::new());
        let publisher = ProgressPublisher::new(store.clone(), registry.clone(), &delivery);
        let downloads = DownloadJobs::new(publisher.clone(), backend.clone());
        Arc::new(Self {
            start_time: Instant::now(),
            store,
            registry,
            publisher,
            delivery,
            media,
            backend,
            downloads,
        })
    }

    /// Get the server uptime in seconds.
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Handles for one progress streaming session.
    pub fn session_context(&self) -> SessionContext {
        SessionContext::new(self.store.clone(), self.registry.clone(), self.delivery)
    }
}
