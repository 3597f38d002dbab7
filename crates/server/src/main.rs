// crates/server/src/main.rs
//! Fetchtube server binary.
//!
//! Parses configuration, installs logging and metrics, makes sure the media
//! directory exists, starts the retention sweep for finished jobs and serves
//! the HTTP API until interrupted.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use fetchtube_core::MediaLayout;
use fetchtube_server::{create_app_with_static, init_metrics, AppState, Config, YtDlpBackend};
use fetchtube_server_jobs::JobStore;

/// How often finished jobs are checked against the retention window.
const RETENTION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

const DEFAULT_LOG_FILTER: &str = "warn,fetchtube_server=info,fetchtube_server_jobs=info";

fn init_tracing(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Drop finished jobs once they have been terminal for `retention`.
fn spawn_retention_sweep(store: Arc<JobStore>, retention: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(RETENTION_SWEEP_INTERVAL);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            let evicted = store.evict_finished(retention);
            if evicted > 0 {
                metrics::counter!("progress_jobs_evicted_total").increment(evicted as u64);
                tracing::debug!(evicted, remaining = store.len(), "Evicted finished jobs");
            }
        }
    });
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::parse();
    init_tracing(config.log_json);
    init_metrics();

    tokio::fs::create_dir_all(&config.media_dir)
        .await
        .with_context(|| format!("creating media directory {}", config.media_dir.display()))?;

    let layout = MediaLayout::new(&config.media_dir);
    let backend = Arc::new(YtDlpBackend::new(
        &config.yt_dlp,
        &config.ffmpeg,
        layout.clone(),
    ));
    let delivery = config.delivery();
    let state = AppState::new(layout, backend, delivery);
    spawn_retention_sweep(state.store.clone(), config.retention());

    let app = create_app_with_static(state, config.static_dir.as_deref());

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(
        %addr,
        media_dir = %config.media_dir.display(),
        sink_capacity = delivery.sink_capacity,
        send_timeout_ms = delivery.send_timeout.map(|t| t.as_millis() as u64),
        "Fetchtube listening"
    );
    if let Some(dir) = &config.static_dir {
        tracing::info!(static_dir = %dir.display(), "Serving frontend");
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    Ok(())
}
