//! Static serving of downloaded files and previews under `/media`.

use std::path::Path;
use std::sync::Arc;

use axum::extract::Request;
use axum::http::{header, HeaderValue};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::Router;
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeaderLayer;

use fetchtube_core::{content_type_for, MEDIA_URL_PREFIX};

use crate::state::AppState;

/// Content type by file extension; unknown extensions keep the guessed one.
async fn media_content_type(request: Request, next: Next) -> Response {
    let content_type = content_type_for(Path::new(request.uri().path()));
    let mut response = next.run(request).await;
    if let Some(content_type) = content_type {
        if response.status().is_success() {
            response
                .headers_mut()
                .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
        }
    }
    response
}

pub fn router(root: &Path) -> Router<Arc<AppState>> {
    Router::new()
        .nest_service(MEDIA_URL_PREFIX, ServeDir::new(root))
        .layer(middleware::from_fn(media_content_type))
        // Play in the browser rather than prompting a save.
        .layer(SetResponseHeaderLayer::overriding(
            header::CONTENT_DISPOSITION,
            HeaderValue::from_static("inline"),
        ))
}
