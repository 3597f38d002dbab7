//! Live progress for one job as Server-Sent Events.
//!
//! `GET /api/progress?id=<job>` replays the job's latest snapshot, then
//! streams every new one as a `data:` event until the job reaches a terminal
//! status. Idle streams get a `: keepalive` comment every heartbeat interval.
//!
//! The streaming session runs on its own task and writes into a one-slot
//! channel that the response body drains. Dropping the body (client gone)
//! cancels the session, which detaches its sink.

use std::convert::Infallible;
use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{Query, State};
use axum::response::sse::{Event, Sse};
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use fetchtube_server_jobs::session::{self, SessionMessage, SessionTransport, TransportClosed};

use super::required;
use crate::error::ApiResult;
use crate::state::AppState;

/// Comment text sent as the SSE heartbeat.
pub const KEEPALIVE_COMMENT: &str = "keepalive";

#[derive(Debug, Deserialize)]
pub struct ProgressQuery {
    pub id: Option<String>,
}

/// Writes session messages as SSE events.
struct SseTransport {
    tx: mpsc::Sender<Event>,
}

#[async_trait]
impl SessionTransport for SseTransport {
    async fn send(&mut self, message: SessionMessage) -> Result<(), TransportClosed> {
        let event = match message {
            SessionMessage::Snapshot(snapshot) => match serde_json::to_string(&snapshot) {
                Ok(json) => Event::default().data(json),
                Err(e) => {
                    tracing::error!(job_id = %snapshot.id, error = %e, "Failed to serialize snapshot");
                    return Ok(());
                }
            },
            SessionMessage::Heartbeat => Event::default().comment(KEEPALIVE_COMMENT),
        };
        self.tx.send(event).await.map_err(|_| TransportClosed)
    }
}

/// GET /api/progress?id= - SSE stream of one job's snapshots.
pub async fn progress_stream(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ProgressQuery>,
) -> ApiResult<Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>>> {
    let job_id = required(query.id, "id")?;
    let (tx, mut rx) = mpsc::channel::<Event>(1);
    let cancel = CancellationToken::new();

    let ctx = state.session_context();
    let session_cancel = cancel.clone();
    tokio::spawn(async move {
        let mut transport = SseTransport { tx };
        let outcome = session::run(&ctx, &job_id, &mut transport, &session_cancel).await;
        tracing::debug!(job_id = %job_id, outcome = ?outcome, "Progress stream finished");
    });

    let guard = cancel.drop_guard();
    let stream = async_stream::stream! {
        let _guard = guard;
        while let Some(event) = rx.recv().await {
            yield Ok::<_, Infallible>(event);
        }
    };

    Ok(Sse::new(stream))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/progress", get(progress_stream))
}
