//! The update path: store the snapshot, then fan it out to every sink.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use metrics::counter;
use tokio::sync::mpsc::error::SendTimeoutError;

use fetchtube_core::{JobStatus, ProgressSnapshot};

use crate::registry::{SinkId, SinkSender, SubscriberRegistry};
use crate::store::{JobStore, Sequenced};

/// Delivery and session tuning shared by the publisher and sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryConfig {
    /// Buffered snapshots per sink before delivery has to wait.
    pub sink_capacity: usize,
    /// How long a publish waits for room in one sink before dropping the
    /// snapshot for that sink. `None` waits indefinitely: a stalled observer
    /// then stalls the job runner that is publishing.
    pub send_timeout: Option<Duration>,
    /// Interval between keep-alive messages on an idle session.
    pub heartbeat_interval: Duration,
    /// Sessions close after this long even if the job never finishes.
    pub max_session_lifetime: Option<Duration>,
}

impl DeliveryConfig {
    /// Rendezvous-style delivery: one-slot sinks and unbounded waits.
    pub fn blocking() -> Self {
        Self {
            sink_capacity: 1,
            send_timeout: None,
            ..Self::default()
        }
    }
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            sink_capacity: 16,
            send_timeout: Some(Duration::from_secs(5)),
            heartbeat_interval: Duration::from_secs(30),
            max_session_lifetime: None,
        }
    }
}

/// What happened to one `publish` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PublishOutcome {
    /// Whether the store accepted the snapshot. Rejected snapshots are not
    /// fanned out.
    pub stored: bool,
    pub delivered: usize,
    /// Sinks that stayed full past the send timeout.
    pub dropped: usize,
    /// Sinks whose session had already gone away.
    pub closed: usize,
}

enum Delivery {
    Delivered,
    Dropped,
    Closed,
}

/// Publishes job progress: updates the `JobStore`, then pushes the snapshot
/// to all sinks registered for the job.
///
/// Calls for one job must be made sequentially (one runner per job); that is
/// what makes per-sink delivery order match publish order. Calls for
/// different jobs never wait on each other.
#[derive(Clone)]
pub struct ProgressPublisher {
    store: Arc<JobStore>,
    registry: Arc<SubscriberRegistry>,
    send_timeout: Option<Duration>,
}

impl ProgressPublisher {
    pub fn new(
        store: Arc<JobStore>,
        registry: Arc<SubscriberRegistry>,
        config: &DeliveryConfig,
    ) -> Self {
        Self {
            store,
            registry,
            send_timeout: config.send_timeout,
        }
    }

    pub fn store(&self) -> &Arc<JobStore> {
        &self.store
    }

    pub fn registry(&self) -> &Arc<SubscriberRegistry> {
        &self.registry
    }

    /// Mark `job_id` as freshly started (`downloading`, 0%) without notifying
    /// observers. Any finished run under the same id is forgotten.
    ///
    /// Returns `false`, leaving the store alone, if a run is still in progress.
    pub fn begin(&self, job_id: &str) -> bool {
        let started = self.store.start(ProgressSnapshot::downloading(job_id, 0.0));
        if started {
            tracing::debug!(job_id = %job_id, "Job started");
        }
        started
    }

    pub async fn publish(
        &self,
        job_id: &str,
        progress: f64,
        status: JobStatus,
        file_path: Option<String>,
    ) -> PublishOutcome {
        self.publish_snapshot(ProgressSnapshot::new(job_id, progress, status, file_path))
            .await
    }

    pub async fn publish_snapshot(&self, snapshot: ProgressSnapshot) -> PublishOutcome {
        let status = snapshot.status;
        let Some(seq) = self.store.record(snapshot.clone()) else {
            tracing::warn!(
                job_id = %snapshot.id,
                status = %status,
                "Publish after terminal status ignored"
            );
            return PublishOutcome::default();
        };
        counter!("progress_publishes_total", "status" => status.as_str()).increment(1);

        let sinks = self.registry.subscribers(&snapshot.id);
        if sinks.is_empty() {
            return PublishOutcome {
                stored: true,
                ..PublishOutcome::default()
            };
        }

        let deliveries = sinks
            .into_iter()
            .map(|(sink_id, tx)| self.deliver(sink_id, tx, Sequenced::new(seq, snapshot.clone())));
        let mut outcome = PublishOutcome {
            stored: true,
            ..PublishOutcome::default()
        };
        for delivery in join_all(deliveries).await {
            match delivery {
                Delivery::Delivered => outcome.delivered += 1,
                Delivery::Dropped => outcome.dropped += 1,
                Delivery::Closed => outcome.closed += 1,
            }
        }

        counter!("progress_deliveries_total").increment(outcome.delivered as u64);
        if outcome.dropped > 0 {
            counter!("progress_deliveries_dropped_total").increment(outcome.dropped as u64);
            tracing::warn!(
                job_id = %snapshot.id,
                dropped = outcome.dropped,
                "Slow observers: snapshot dropped"
            );
        }
        if outcome.closed > 0 {
            counter!("progress_deliveries_closed_total").increment(outcome.closed as u64);
        }
        outcome
    }

    async fn deliver(&self, sink_id: SinkId, tx: SinkSender, item: Sequenced) -> Delivery {
        match self.send_timeout {
            None => match tx.send(item).await {
                Ok(()) => Delivery::Delivered,
                Err(_) => {
                    tracing::debug!(sink_id, "Sink closed during delivery");
                    Delivery::Closed
                }
            },
            Some(timeout) => match tx.send_timeout(item, timeout).await {
                Ok(()) => Delivery::Delivered,
                Err(SendTimeoutError::Timeout(_)) => Delivery::Dropped,
                Err(SendTimeoutError::Closed(_)) => {
                    tracing::debug!(sink_id, "Sink closed during delivery");
                    Delivery::Closed
                }
            },
        }
    }
}
