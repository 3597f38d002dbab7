//! Latest progress snapshot per job.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use tokio::time::Instant;

use fetchtube_core::{JobId, ProgressSnapshot};

/// Store-wide write order. Every accepted snapshot gets a larger one.
pub type Seq = u64;

/// A stored snapshot together with the position of its write.
#[derive(Debug, Clone, PartialEq)]
pub struct Sequenced {
    pub seq: Seq,
    pub snapshot: ProgressSnapshot,
}

impl Sequenced {
    pub fn new(seq: Seq, snapshot: ProgressSnapshot) -> Self {
        Self { seq, snapshot }
    }
}

struct Entry {
    seq: Seq,
    snapshot: ProgressSnapshot,
    /// Set when the entry first became terminal; drives retention.
    finished_at: Option<Instant>,
}

/// Authoritative job state, keyed by job id.
///
/// Every operation takes the lock for a single map access and never across
/// an `.await`, so readers and writers of different jobs only contend for
/// that short critical section.
pub struct JobStore {
    jobs: Mutex<HashMap<JobId, Entry>>,
    next_seq: AtomicU64,
}

impl JobStore {
    pub fn new() -> Self {
        Self {
            jobs: Mutex::new(HashMap::new()),
            next_seq: AtomicU64::new(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<JobId, Entry>> {
        self.jobs.lock().unwrap_or_else(|poisoned| {
            tracing::error!("Mutex poisoned on job store, recovering");
            poisoned.into_inner()
        })
    }

    /// Replace the snapshot stored for `snapshot.id`.
    ///
    /// Returns `false` without touching the entry when the job is already
    /// terminal and the update is not: terminal status is sticky.
    pub fn set_or_update(&self, snapshot: ProgressSnapshot) -> bool {
        self.record(snapshot).is_some()
    }

    /// `set_or_update`, returning the sequence number the write was given.
    pub fn record(&self, snapshot: ProgressSnapshot) -> Option<Seq> {
        let mut jobs = self.lock();
        let existing = jobs.get(&snapshot.id);
        if existing.is_some_and(|e| e.snapshot.is_terminal() && !snapshot.is_terminal()) {
            return None;
        }
        let finished_at = if snapshot.is_terminal() {
            existing
                .and_then(|e| e.finished_at)
                .or_else(|| Some(Instant::now()))
        } else {
            None
        };
        // Allocated under the lock so seq order is write order.
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        jobs.insert(
            snapshot.id.clone(),
            Entry {
                seq,
                snapshot,
                finished_at,
            },
        );
        Some(seq)
    }

    /// Store the first snapshot of a new run, discarding any finished run
    /// under the same id. Returns `false` if the job is still running.
    pub fn start(&self, snapshot: ProgressSnapshot) -> bool {
        let mut jobs = self.lock();
        if jobs.get(&snapshot.id).is_some_and(|e| !e.snapshot.is_terminal()) {
            return false;
        }
        let finished_at = snapshot.is_terminal().then(Instant::now);
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        jobs.insert(
            snapshot.id.clone(),
            Entry {
                seq,
                snapshot,
                finished_at,
            },
        );
        true
    }

    /// Forget a job entirely.
    pub fn reset(&self, job_id: &str) -> Option<ProgressSnapshot> {
        self.lock().remove(job_id).map(|e| e.snapshot)
    }

    pub fn get(&self, job_id: &str) -> Option<ProgressSnapshot> {
        self.lock().get(job_id).map(|e| e.snapshot.clone())
    }

    /// The current snapshot and the sequence number of the write that
    /// produced it.
    pub fn get_sequenced(&self, job_id: &str) -> Option<Sequenced> {
        self.lock()
            .get(job_id)
            .map(|e| Sequenced::new(e.seq, e.snapshot.clone()))
    }

    /// Whether a job exists and has not reached a terminal status.
    pub fn is_running(&self, job_id: &str) -> bool {
        self.lock()
            .get(job_id)
            .is_some_and(|e| !e.snapshot.is_terminal())
    }

    /// Snapshots of all non-terminal jobs.
    pub fn active(&self) -> Vec<ProgressSnapshot> {
        self.lock()
            .values()
            .filter(|e| !e.snapshot.is_terminal())
            .map(|e| e.snapshot.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop terminal entries that finished at least `older_than` ago.
    /// Returns how many were removed.
    pub fn evict_finished(&self, older_than: Duration) -> usize {
        let now = Instant::now();
        let mut jobs = self.lock();
        let before = jobs.len();
        jobs.retain(|_, e| match e.finished_at {
            Some(at) => now.duration_since(at) < older_than,
            None => true,
        });
        before - jobs.len()
    }
}

impl Default for JobStore {
    fn default() -> Self {
        Self::new()
    }
}
