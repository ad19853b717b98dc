//! Live job progress, published as one consistent snapshot.

use filex_core::{BulkAction, JobPhase, JobProgress};
use tokio::sync::watch;
use uuid::Uuid;

/// Owns the progress snapshot for one orchestrator. Consumers subscribe and
/// always see `processed`, `total`, phase and flags from the same update.
#[derive(Debug)]
pub struct ProgressTracker {
    tx: watch::Sender<JobProgress>,
}

impl Default for ProgressTracker {
    fn default() -> Self { Self::new() }
}

impl ProgressTracker {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(JobProgress::default());
        Self { tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<JobProgress> { self.tx.subscribe() }

    pub fn snapshot(&self) -> JobProgress { self.tx.borrow().clone() }

    pub fn percentage(&self) -> u8 { self.tx.borrow().percentage() }

    pub fn set_phase(&self, phase: JobPhase) {
        self.tx.send_modify(|p| p.phase = phase);
    }

    /// Start of a batched job: counters at zero, both busy flags raised.
    pub fn begin(&self, job_id: Uuid, action: BulkAction, total: usize) {
        self.tx.send_replace(JobProgress {
            job_id: Some(job_id),
            action: Some(action),
            phase: JobPhase::Running,
            processed: 0,
            total,
            is_loading: true,
            is_processing: true,
        });
    }

    /// Start of a single-item call: only the loading flag is raised, counters stay untouched.
    pub fn begin_single(&self, job_id: Uuid, action: BulkAction) {
        self.tx.send_modify(|p| {
            p.job_id = Some(job_id);
            p.action = Some(action);
            p.phase = JobPhase::Running;
            p.is_loading = true;
        });
    }

    /// Move `processed` forward. Never decreases and never passes `total`.
    pub fn advance(&self, processed: usize) -> JobProgress {
        self.tx.send_modify(|p| p.processed = p.processed.max(processed.min(p.total)));
        self.snapshot()
    }

    /// Terminal phase with flags down and counters at zero, published as one update.
    pub fn finish(&self, phase: JobPhase) {
        self.tx.send_modify(|p| {
            p.phase = phase;
            p.processed = 0;
            p.total = 0;
            p.is_loading = false;
            p.is_processing = false;
        });
    }

    /// Back to idle: flags down, counters at zero.
    pub fn reset(&self) {
        self.tx.send_replace(JobProgress::default());
    }
}
