//! Observer sinks attached to each job.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc;

use fetchtube_core::{JobId, ProgressSnapshot};

use crate::store::{Seq, Sequenced};

/// Identity of one sink. Unique for the lifetime of the registry.
pub type SinkId = u64;

/// Sending half of a sink. The registry only ever holds clones of it; the
/// receiving half belongs to the observer's session.
pub type SinkSender = mpsc::Sender<Sequenced>;

/// Lifetime attach/detach totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RegistryStats {
    pub attached: u64,
    pub detached: u64,
}

/// Maps job ids to the sinks currently streaming that job.
///
/// Attachment lifetime is independent of job lifetime: a job id may have
/// observers before its first update and after its last one.
pub struct SubscriberRegistry {
    next_sink: AtomicU64,
    sinks: Mutex<HashMap<JobId, HashMap<SinkId, SinkSender>>>,
    attached: AtomicU64,
    detached: AtomicU64,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self {
            next_sink: AtomicU64::new(1),
            sinks: Mutex::new(HashMap::new()),
            attached: AtomicU64::new(0),
            detached: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<JobId, HashMap<SinkId, SinkSender>>> {
        self.sinks.lock().unwrap_or_else(|poisoned| {
            tracing::error!("Mutex poisoned on subscriber registry, recovering");
            poisoned.into_inner()
        })
    }

    /// Allocate a fresh sink id.
    pub fn next_sink_id(&self) -> SinkId {
        self.next_sink.fetch_add(1, Ordering::Relaxed)
    }

    /// Register `sender` under `job_id`. Re-attaching an id that is already
    /// present is a no-op and returns `false`.
    pub fn attach(&self, job_id: &str, sink_id: SinkId, sender: SinkSender) -> bool {
        let mut sinks = self.lock();
        let set = sinks.entry(job_id.to_string()).or_default();
        if set.contains_key(&sink_id) {
            return false;
        }
        set.insert(sink_id, sender);
        self.attached.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Remove a sink. The job's entry disappears with its last sink.
    pub fn detach(&self, job_id: &str, sink_id: SinkId) -> bool {
        let mut sinks = self.lock();
        let Some(set) = sinks.get_mut(job_id) else {
            return false;
        };
        let removed = set.remove(&sink_id).is_some();
        if set.is_empty() {
            sinks.remove(job_id);
        }
        if removed {
            self.detached.fetch_add(1, Ordering::Relaxed);
        }
        removed
    }

    /// Sinks to fan out to, captured under the lock. Deliver outside it.
    pub fn subscribers(&self, job_id: &str) -> Vec<(SinkId, SinkSender)> {
        self.lock()
            .get(job_id)
            .map(|set| set.iter().map(|(id, tx)| (*id, tx.clone())).collect())
            .unwrap_or_default()
    }

    pub fn subscriber_count(&self, job_id: &str) -> usize {
        self.lock().get(job_id).map_or(0, HashMap::len)
    }

    /// Number of job ids with at least one sink.
    pub fn job_count(&self) -> usize {
        self.lock().len()
    }

    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            attached: self.attached.load(Ordering::Relaxed),
            detached: self.detached.load(Ordering::Relaxed),
        }
    }

    /// Create a sink of the given capacity and attach it to `job_id`.
    ///
    /// The returned guard owns the receiving half and detaches on drop.
    pub fn subscribe(self: &Arc<Self>, job_id: &str, capacity: usize) -> Subscription {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let sink_id = self.next_sink_id();
        self.attach(job_id, sink_id, tx);
        Subscription {
            registry: Arc::clone(self),
            job_id: job_id.to_string(),
            sink_id,
            rx,
            seen_through: 0,
        }
    }
}

impl Default for SubscriberRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// One observer's attachment to one job.
pub struct Subscription {
    registry: Arc<SubscriberRegistry>,
    job_id: JobId,
    sink_id: SinkId,
    rx: mpsc::Receiver<Sequenced>,
    /// Writes up to here were already shown to the observer.
    seen_through: Seq,
}

impl Subscription {
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn sink_id(&self) -> SinkId {
        self.sink_id
    }

    /// Next snapshot for this job, skipping anything at or before
    /// `skip_through`. `None` once every sender is gone.
    pub async fn recv(&mut self) -> Option<ProgressSnapshot> {
        loop {
            let item = self.rx.recv().await?;
            if item.seq > self.seen_through {
                return Some(item.snapshot);
            }
        }
    }

    /// Mark every write up to `seq` as already seen. A snapshot replayed from
    /// the store may also be queued here if it was published after attach.
    pub fn skip_through(&mut self, seq: Seq) {
        self.seen_through = self.seen_through.max(seq);
    }

    /// Whether no snapshot is waiting in the sink.
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        // Close first so a publisher blocked on this sink wakes up with an error.
        self.rx.close();
        self.registry.detach(&self.job_id, self.sink_id);
        tracing::debug!(job_id = %self.job_id, sink_id = self.sink_id, "Observer detached");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_attach_then_detach_removes_job_entry() {
        let registry = SubscriberRegistry::new();
        let (tx, _rx) = mpsc::channel(1);
        let id = registry.next_sink_id();

        assert!(registry.attach("j1", id, tx));
        assert_eq!(registry.subscriber_count("j1"), 1);
        assert!(registry.detach("j1", id));
        assert_eq!(registry.subscriber_count("j1"), 0);
        assert_eq!(registry.job_count(), 0);
    }

    #[test]
    fn test_attach_is_idempotent_per_sink() {
        let registry = SubscriberRegistry::new();
        let (tx, _rx) = mpsc::channel(1);
        let id = registry.next_sink_id();

        assert!(registry.attach("j1", id, tx.clone()));
        assert!(!registry.attach("j1", id, tx));
        assert_eq!(registry.subscriber_count("j1"), 1);
        assert_eq!(registry.stats().attached, 1);
    }

    #[test]
    fn test_detach_keeps_other_sinks() {
        let registry = SubscriberRegistry::new();
        let (tx1, _rx1) = mpsc::channel(1);
        let (tx2, _rx2) = mpsc::channel(1);
        let a = registry.next_sink_id();
        let b = registry.next_sink_id();
        registry.attach("j1", a, tx1);
        registry.attach("j1", b, tx2);

        registry.detach("j1", a);
        assert_eq!(registry.job_count(), 1);
        let remaining: Vec<SinkId> = registry.subscribers("j1").into_iter().map(|(id, _)| id).collect();
        assert_eq!(remaining, vec![b]);
    }

    #[test]
    fn test_detach_unknown_sink() {
        let registry = SubscriberRegistry::new();
        assert!(!registry.detach("nope", 7));
        assert_eq!(registry.stats(), RegistryStats::default());
    }

    #[test]
    fn test_subscribers_of_unknown_job_is_empty() {
        let registry = SubscriberRegistry::new();
        assert!(registry.subscribers("nope").is_empty());
    }

    #[test]
    fn test_sink_ids_are_unique() {
        let registry = SubscriberRegistry::new();
        let a = registry.next_sink_id();
        let b = registry.next_sink_id();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_subscription_drop_detaches_once() {
        let registry = Arc::new(SubscriberRegistry::new());
        let sub = registry.subscribe("j1", 4);
        assert_eq!(sub.job_id(), "j1");
        assert_eq!(registry.subscriber_count("j1"), 1);

        drop(sub);
        assert_eq!(registry.job_count(), 0);
        assert_eq!(
            registry.stats(),
            RegistryStats {
                attached: 1,
                detached: 1
            }
        );
    }

    #[tokio::test]
    async fn test_subscription_receives_sent_snapshots() {
        let registry = Arc::new(SubscriberRegistry::new());
        let mut sub = registry.subscribe("j1", 4);
        for (_, tx) in registry.subscribers("j1") {
            tx.send(Sequenced::new(1, ProgressSnapshot::downloading("j1", 12.5)))
                .await
                .unwrap();
        }
        let snap = sub.recv().await.unwrap();
        assert_eq!(snap.progress, 12.5);
    }

    #[tokio::test]
    async fn test_send_after_subscription_dropped_fails() {
        let registry = Arc::new(SubscriberRegistry::new());
        let sub = registry.subscribe("j1", 1);
        let (_, tx) = registry.subscribers("j1").pop().unwrap();
        drop(sub);
        assert!(tx
            .send(Sequenced::new(1, ProgressSnapshot::downloading("j1", 1.0)))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_skip_through_drops_already_seen_writes() {
        let registry = Arc::new(SubscriberRegistry::new());
        let mut sub = registry.subscribe("j1", 4);
        let (_, tx) = registry.subscribers("j1").pop().unwrap();
        for (seq, pct) in [(3, 30.0), (4, 40.0), (5, 50.0)] {
            tx.send(Sequenced::new(seq, ProgressSnapshot::downloading("j1", pct)))
                .await
                .unwrap();
        }

        sub.skip_through(4);
        sub.skip_through(2);
        assert_eq!(sub.recv().await.unwrap().progress, 50.0);
        assert!(sub.is_empty());
    }
}
