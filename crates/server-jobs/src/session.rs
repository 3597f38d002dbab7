//! Per-observer streaming session.
//!
//! A session attaches a sink for one job, replays the last known snapshot,
//! then waits on four sources at once: observer cancellation, the optional
//! lifetime deadline, new snapshots, and the heartbeat timer. It ends after
//! the first terminal snapshot, on disconnect, on a failed write, or when its
//! sink closes. The sink is detached on every one of those paths.

use std::sync::Arc;

use async_trait::async_trait;
use metrics::gauge;
use thiserror::Error;
use tokio::time::{interval_at, sleep_until, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use fetchtube_core::{JobStatus, ProgressSnapshot};

use crate::publisher::DeliveryConfig;
use crate::registry::SubscriberRegistry;
use crate::store::{JobStore, Sequenced};

/// One message written to the observer.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionMessage {
    Snapshot(ProgressSnapshot),
    /// No-op keep-alive for idle connections.
    Heartbeat,
}

/// The observer's connection is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("observer transport closed")]
pub struct TransportClosed;

/// Where a session writes its messages, one discrete message per call.
#[async_trait]
pub trait SessionTransport: Send {
    async fn send(&mut self, message: SessionMessage) -> Result<(), TransportClosed>;
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// A terminal snapshot was delivered.
    Finished(JobStatus),
    /// The observer cancelled.
    Disconnected,
    /// Writing to the observer failed.
    TransportClosed,
    /// The sink stopped producing.
    SinkClosed,
    /// The maximum session lifetime elapsed.
    Expired,
}

/// Shared handles every session needs.
#[derive(Clone)]
pub struct SessionContext {
    pub store: Arc<JobStore>,
    pub registry: Arc<SubscriberRegistry>,
    pub config: DeliveryConfig,
}

impl SessionContext {
    pub fn new(store: Arc<JobStore>, registry: Arc<SubscriberRegistry>, config: DeliveryConfig) -> Self {
        Self {
            store,
            registry,
            config,
        }
    }
}

/// Keeps `progress_sessions_active` in step with live sessions.
struct ActiveSession;

impl ActiveSession {
    fn enter() -> Self {
        gauge!("progress_sessions_active").increment(1.0);
        ActiveSession
    }
}

impl Drop for ActiveSession {
    fn drop(&mut self) {
        gauge!("progress_sessions_active").decrement(1.0);
    }
}

/// Stream `job_id` to one observer until the session closes.
///
/// `cancel` is the observer's disconnect signal; it wins over every other
/// ready event, including a write that is still in progress.
pub async fn run<T>(
    ctx: &SessionContext,
    job_id: &str,
    transport: &mut T,
    cancel: &CancellationToken,
) -> SessionOutcome
where
    T: SessionTransport + ?Sized,
{
    let _active = ActiveSession::enter();
    let mut subscription = ctx.registry.subscribe(job_id, ctx.config.sink_capacity);
    tracing::debug!(job_id = %job_id, sink_id = subscription.sink_id(), "Observer attached");

    let outcome = 'session: {
        if let Some(Sequenced { seq, snapshot }) = ctx.store.get_sequenced(job_id) {
            // Anything published between attach and this read is already queued.
            subscription.skip_through(seq);
            let status = snapshot.status;
            if let Err(outcome) = emit(transport, cancel, SessionMessage::Snapshot(snapshot)).await {
                break 'session outcome;
            }
            if status.is_terminal() {
                break 'session SessionOutcome::Finished(status);
            }
        }

        let period = ctx.config.heartbeat_interval;
        let mut heartbeat = interval_at(Instant::now() + period, period);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let deadline = ctx.config.max_session_lifetime.map(|d| Instant::now() + d);
        let expiry = async move {
            match deadline {
                Some(at) => sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(expiry);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break SessionOutcome::Disconnected,
                _ = &mut expiry => break SessionOutcome::Expired,
                next = subscription.recv() => {
                    let Some(snapshot) = next else {
                        break SessionOutcome::SinkClosed;
                    };
                    debug_assert_eq!(snapshot.id, job_id);
                    let status = snapshot.status;
                    if let Err(outcome) = emit(transport, cancel, SessionMessage::Snapshot(snapshot)).await {
                        break outcome;
                    }
                    if status.is_terminal() {
                        break SessionOutcome::Finished(status);
                    }
                }
                _ = heartbeat.tick() => {
                    if let Err(outcome) = emit(transport, cancel, SessionMessage::Heartbeat).await {
                        break outcome;
                    }
                }
            }
        }
    };

    drop(subscription);
    tracing::debug!(job_id = %job_id, outcome = ?outcome, "Observer session closed");
    outcome
}

async fn emit<T>(
    transport: &mut T,
    cancel: &CancellationToken,
    message: SessionMessage,
) -> Result<(), SessionOutcome>
where
    T: SessionTransport + ?Sized,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(SessionOutcome::Disconnected),
        sent = transport.send(message) => sent.map_err(|TransportClosed| {
            tracing::debug!("Observer write failed, closing session");
            SessionOutcome::TransportClosed
        }),
    }
}
