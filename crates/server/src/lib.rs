// crates/server/src/lib.rs
//! Fetchtube server library.
//!
//! This crate provides the Axum-based HTTP server: video info and preview
//! lookups, background download jobs driven by `yt-dlp`, and a Server-Sent
//! Events stream of each job's progress backed by `fetchtube_server_jobs`.

pub mod config;
pub mod downloads;
pub mod error;
pub mod fetcher;
pub mod metrics;
pub mod routes;
pub mod state;

pub use config::Config;
pub use downloads::DownloadJobs;
pub use error::*;
pub use fetcher::{DownloadRequest, FetchError, MediaBackend, YtDlpBackend};
pub use self::metrics::{init_metrics, render_metrics};
pub use routes::api_routes;
pub use state::AppState;

use std::path::Path;
use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

/// Create the Axum application with all routes and middleware.
///
/// This sets up:
/// - API routes, `/media` and `/metrics`
/// - CORS (allows any origin, method and header)
/// - Request tracing
pub fn create_app(state: Arc<AppState>) -> Router {
    create_app_with_static(state, None)
}

/// Like `create_app`, additionally serving a frontend build from
/// `static_dir` for every path no route claims.
pub fn create_app_with_static(state: Arc<AppState>, static_dir: Option<&Path>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let mut app = api_routes(state);
    if let Some(dir) = static_dir {
        let index = dir.join("index.html");
        app = app.fallback_service(ServeDir::new(dir).fallback(ServeFile::new(index)));
    }

    app.layer(cors).layer(TraceLayer::new_for_http())
}

// ============================================================================
// Integration Tests
// ============================================================================
