//! Application metrics for Prometheus monitoring.
//!
//! This module provides:
//! - Prometheus metrics recorder initialization
//! - Metric descriptions for the broadcast engine and download jobs
//! - Rendering for the `/metrics` endpoint
//!
//! The counters themselves are recorded where the work happens
//! (`fetchtube_server_jobs` and `downloads`) through the `metrics` facade.

use metrics::{describe_counter, describe_gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

/// Global Prometheus handle for rendering metrics.
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// This should be called once at application startup, before any metrics are recorded.
/// Returns `true` if this call installed the recorder, `false` if already initialized.
pub fn init_metrics() -> bool {
    let mut installed = false;
    PROMETHEUS_HANDLE.get_or_init(|| {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        if metrics::set_global_recorder(recorder).is_err() {
            tracing::warn!("Failed to set global metrics recorder (already set)");
        } else {
            describe_metrics();
            tracing::info!("Prometheus metrics initialized");
            installed = true;
        }
        handle
    });
    installed
}

fn describe_metrics() {
    // Publisher
    describe_counter!(
        "progress_publishes_total",
        "Snapshots accepted by the job store, by status"
    );
    describe_counter!(
        "progress_deliveries_total",
        "Snapshots delivered to observer sinks"
    );
    describe_counter!(
        "progress_deliveries_dropped_total",
        "Snapshots dropped for a sink that stayed full past the send timeout"
    );
    describe_counter!(
        "progress_deliveries_closed_total",
        "Deliveries skipped because the observer session had already closed"
    );

    // Sessions and retention
    describe_gauge!(
        "progress_sessions_active",
        "Observer streaming sessions currently open"
    );
    describe_counter!(
        "progress_jobs_evicted_total",
        "Finished jobs removed from the store by the retention sweep"
    );

    // Point-in-time sizes, refreshed on every scrape
    describe_gauge!(
        "progress_jobs_stored",
        "Jobs with a snapshot in the store, finished ones included"
    );
    describe_gauge!(
        "progress_jobs_active",
        "Jobs that have not reached a terminal status"
    );
    describe_gauge!(
        "progress_observed_jobs",
        "Job ids with at least one observer sink attached"
    );

    // Jobs
    describe_counter!(
        "download_jobs_total",
        "Download jobs by outcome (started, complete, error)"
    );
}

/// Render current metrics in Prometheus text format.
///
/// Returns `None` if metrics are not initialized.
pub fn render_metrics() -> Option<String> {
    PROMETHEUS_HANDLE.get().map(|h| h.render())
}
