//! Runs one confirmed share / reassign / delete request to completion.

use std::sync::Arc;
use std::time::Instant;

use filex_api::FileBackend;
use filex_core::{BulkAction, EntityId, EventSink, ExplorerEvent, JobPhase, JobProgress, JobStatus, Notice};
use futures::StreamExt;
use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::OpsConfig;
use crate::dispatch::{run_batched, DispatchError};
use crate::progress::ProgressTracker;
use crate::slot::JobSlot;
use crate::OpsError;

pub const MSG_SELECT_SHARE_USER: &str = "Please select a user to share with";
pub const MSG_SELECT_NEW_OWNER: &str = "Please select a new owner";
pub const MSG_NO_FILES: &str = "No files selected";

/// What a request acts on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Target {
    /// One identified file with a known display name; handled without batching.
    Single { id: EntityId, name: String },
    Many(Vec<EntityId>),
}

impl Target {
    /// A single target needs both a non-empty id and a non-empty name; anything
    /// else falls back to the id list.
    pub fn from_parts(file_id: Option<EntityId>, file_name: Option<String>, ids: Vec<EntityId>) -> Self {
        match (file_id, file_name) {
            (Some(id), Some(name)) if !id.as_str().is_empty() && !name.is_empty() => Self::Single { id, name },
            _ => Self::Many(ids),
        }
    }

    pub fn len(&self) -> usize {
        match self { Self::Single { .. } => 1, Self::Many(ids) => ids.len() }
    }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    pub fn ids(&self) -> Vec<EntityId> {
        match self { Self::Single { id, .. } => vec![id.clone()], Self::Many(ids) => ids.clone() }
    }
}

/// A confirmed action. `target` is a snapshot; later selection changes do not reach it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkRequest {
    pub action: BulkAction,
    pub target: Target,
    /// Share recipient or new owner.
    pub user_id: Option<String>,
}

impl BulkRequest {
    pub fn share(target: Target, user_id: Option<String>) -> Self {
        Self { action: BulkAction::Share, target, user_id }
    }

    pub fn reassign(target: Target, new_owner_id: Option<String>) -> Self {
        Self { action: BulkAction::ReassignOwner, target, user_id: new_owner_id }
    }

    pub fn delete(ids: Vec<EntityId>) -> Self {
        Self { action: BulkAction::Delete, target: Target::Many(ids), user_id: None }
    }

    fn user(&self) -> Option<&str> {
        self.user_id.as_deref().map(str::trim).filter(|u| !u.is_empty())
    }

    /// Local precondition checks; nothing is touched when they fail.
    pub fn validate(&self) -> Result<(), OpsError> {
        if self.action.needs_target_user() && self.user().is_none() {
            let msg = match self.action {
                BulkAction::Share => MSG_SELECT_SHARE_USER,
                _ => MSG_SELECT_NEW_OWNER,
            };
            return Err(OpsError::Validation(msg.to_string()));
        }
        if self.target.is_empty() {
            return Err(OpsError::Validation(MSG_NO_FILES.to_string()));
        }
        Ok(())
    }

    pub fn success_message(&self) -> String {
        match (&self.action, &self.target) {
            (BulkAction::Share, Target::Single { .. }) => "File shared successfully".to_string(),
            (BulkAction::Share, t) => format!("Successfully shared {} files with the selected user", t.len()),
            (BulkAction::ReassignOwner, Target::Single { name, .. }) => format!("Successfully transferred ownership of \"{}\"", name),
            (BulkAction::ReassignOwner, t) => format!("Successfully transferred ownership of {} files", t.len()),
            (BulkAction::Delete, t) => format!("{} file(s) deleted successfully", t.len()),
        }
    }
}

/// The in-flight job record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkJob {
    pub id: Uuid,
    pub action: BulkAction,
    pub target_ids: Vec<EntityId>,
    pub chunk_size: usize,
    pub processed: usize,
    pub status: JobStatus,
}

impl BulkJob {
    pub fn new(action: BulkAction, target_ids: Vec<EntityId>, chunk_size: usize) -> Self {
        Self { id: Uuid::new_v4(), action, target_ids, chunk_size, processed: 0, status: JobStatus::Idle }
    }

    pub fn total(&self) -> usize { self.target_ids.len() }

    /// Past validation; remote calls may now be issued.
    pub fn start(&mut self) {
        self.status = JobStatus::Running;
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobReport {
    pub job_id: Uuid,
    pub action: BulkAction,
    pub status: JobStatus,
    pub processed: usize,
    pub total: usize,
    /// True when the single-item path was used.
    pub single: bool,
    pub message: String,
}

pub struct Orchestrator {
    backend: Arc<dyn FileBackend>,
    cfg: OpsConfig,
    tracker: ProgressTracker,
    slot: JobSlot,
    events: EventSink,
}

impl Orchestrator {
    pub fn new(backend: Arc<dyn FileBackend>, cfg: OpsConfig) -> Self {
        Self { backend, cfg, tracker: ProgressTracker::new(), slot: JobSlot::new(), events: EventSink::none() }
    }

    pub fn with_events(mut self, events: EventSink) -> Self {
        self.events = events;
        self
    }

    pub fn config(&self) -> OpsConfig { self.cfg }

    pub fn backend(&self) -> &Arc<dyn FileBackend> { &self.backend }

    pub fn subscribe(&self) -> watch::Receiver<JobProgress> { self.tracker.subscribe() }

    pub fn progress(&self) -> JobProgress { self.tracker.snapshot() }

    pub fn is_busy(&self) -> bool { self.slot.is_busy() }

    /// Validate, run and settle one request. Emits exactly one notice and, when the
    /// job got past validation, one `OperationSettled` event.
    pub async fn run(&self, req: BulkRequest) -> Result<JobReport, OpsError> {
        let Some(_guard) = self.slot.try_acquire(&self.tracker) else {
            warn!(action = %req.action, "ops: rejected, another job is running");
            let err = OpsError::Busy;
            self.events.notice(err.notice());
            return Err(err);
        };
        self.tracker.set_phase(JobPhase::Validating);
        if let Err(err) = req.validate().and_then(|_| self.check_chunking(&req.target)) {
            debug!(action = %req.action, error = %err, "ops: validation failed");
            self.events.notice(err.notice());
            return Err(err);
        }

        let mut job = BulkJob::new(req.action, req.target.ids(), self.cfg.chunk_size);
        let user = req.user().unwrap_or_default().to_string();
        job.start();
        let t0 = Instant::now();
        info!(job = %job.id, action = %job.action, total = job.total(), "ops: job start");

        let (single, outcome) = match &req.target {
            Target::Single { id, .. } => (true, self.run_single(&mut job, id, &user).await),
            Target::Many(_) => (false, self.run_many(&mut job, user).await),
        };
        histogram!("filex_job_ms", t0.elapsed().as_secs_f64() * 1000.0);

        match outcome {
            Ok(()) => {
                job.status = JobStatus::Succeeded;
                self.tracker.finish(JobPhase::Succeeded);
                counter!("filex_jobs_total", 1u64, "outcome" => "succeeded");
                info!(job = %job.id, action = %job.action, processed = job.processed, took_ms = %t0.elapsed().as_millis(), "ops: job ok");
                let message = req.success_message();
                self.events.notice(Notice::success(message.clone()));
                self.settle(&job);
                Ok(JobReport {
                    job_id: job.id,
                    action: job.action,
                    status: job.status,
                    processed: job.processed,
                    total: job.total(),
                    single,
                    message,
                })
            }
            Err(err) => {
                job.status = JobStatus::Failed;
                self.tracker.finish(JobPhase::Failed);
                counter!("filex_jobs_total", 1u64, "outcome" => "failed");
                warn!(job = %job.id, action = %job.action, processed = job.processed, error = %err, "ops: job failed");
                self.events.notice(err.notice());
                self.settle(&job);
                Err(err)
            }
        }
    }

    /// Batched targets need a usable chunk size; single targets never chunk.
    fn check_chunking(&self, target: &Target) -> Result<(), OpsError> {
        match target {
            Target::Many(_) if self.cfg.chunk_size == 0 => Err(OpsError::Validation(DispatchError::ZeroChunkSize.to_string())),
            _ => Ok(()),
        }
    }

    fn settle(&self, job: &BulkJob) {
        self.events.emit(ExplorerEvent::OperationSettled {
            action: job.action,
            status: job.status,
            processed: job.processed,
            total: job.total(),
        });
    }

    async fn run_single(&self, job: &mut BulkJob, id: &EntityId, user: &str) -> Result<(), OpsError> {
        self.tracker.begin_single(job.id, job.action);
        let res = match job.action {
            BulkAction::Share => self.backend.share_entity(id, user).await,
            BulkAction::ReassignOwner => self.backend.reassign_owner(id, user).await,
            BulkAction::Delete => self.backend.delete_entities(std::slice::from_ref(id)).await,
        };
        res.map_err(|source| OpsError::Remote { action: job.action, processed: 0, total: 1, source })?;
        job.processed = 1;
        Ok(())
    }

    async fn run_many(&self, job: &mut BulkJob, user: String) -> Result<(), OpsError> {
        self.tracker.begin(job.id, job.action, job.total());
        let action = job.action;
        let backend = Arc::clone(&self.backend);
        let user: Arc<str> = user.into();
        let submit = move |chunk: Vec<EntityId>| {
            let backend = Arc::clone(&backend);
            let user = Arc::clone(&user);
            async move {
                match action {
                    BulkAction::Share => backend.share_entities_bulk(&chunk, &user).await,
                    BulkAction::ReassignOwner => backend.reassign_owner_bulk(&chunk, &user).await,
                    BulkAction::Delete => backend.delete_entities(&chunk).await,
                }
            }
        };
        let steps = run_batched(job.target_ids.clone(), job.chunk_size, self.cfg.pace, submit);
        futures::pin_mut!(steps);
        while let Some(step) = steps.next().await {
            match step {
                Ok(cp) => {
                    job.processed = cp.processed;
                    let snap = self.tracker.advance(cp.processed);
                    self.events.emit(ExplorerEvent::OperationProgress(snap));
                }
                Err(DispatchError::Chunk { processed, total, source, .. }) => {
                    job.processed = processed;
                    return Err(OpsError::Remote { action, processed, total, source });
                }
                Err(e @ DispatchError::ZeroChunkSize) => return Err(OpsError::Validation(e.to_string())),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn many(n: usize) -> Target {
        Target::Many((0..n).map(|i| EntityId::new(format!("069{}", i))).collect())
    }

    #[test]
    fn single_target_needs_id_and_name() {
        let ids = vec![EntityId::new("069A")];
        assert!(matches!(Target::from_parts(Some("069A".into()), Some("a.pdf".into()), vec![]), Target::Single { .. }));
        assert_eq!(Target::from_parts(Some("069A".into()), None, ids.clone()), Target::Many(ids.clone()));
        assert_eq!(Target::from_parts(Some("069A".into()), Some(String::new()), ids.clone()), Target::Many(ids));
    }

    #[test]
    fn validation_checks_user_before_targets() {
        let no_user = BulkRequest::share(many(0), None);
        assert_eq!(no_user.validate(), Err(OpsError::Validation(MSG_SELECT_SHARE_USER.into())));
        let blank_owner = BulkRequest::reassign(many(3), Some("  ".into()));
        assert_eq!(blank_owner.validate(), Err(OpsError::Validation(MSG_SELECT_NEW_OWNER.into())));
        let empty = BulkRequest::share(many(0), Some("005A".into()));
        assert_eq!(empty.validate(), Err(OpsError::Validation(MSG_NO_FILES.into())));
        assert_eq!(BulkRequest::delete(vec![]).validate(), Err(OpsError::Validation(MSG_NO_FILES.into())));
        assert!(BulkRequest::delete(vec!["069A".into()]).validate().is_ok());
    }

    #[test]
    fn job_runs_between_idle_and_terminal() {
        let mut job = BulkJob::new(BulkAction::Delete, vec!["069A".into()], 10);
        assert_eq!(job.status, JobStatus::Idle);
        job.start();
        assert_eq!(job.status, JobStatus::Running);
        assert!(!job.status.is_terminal());
    }

    #[test]
    fn success_messages_follow_action_and_target() {
        let single = Target::Single { id: "069A".into(), name: "report.pdf".into() };
        assert_eq!(BulkRequest::share(single.clone(), None).success_message(), "File shared successfully");
        assert_eq!(BulkRequest::share(many(23), None).success_message(), "Successfully shared 23 files with the selected user");
        assert_eq!(BulkRequest::reassign(single, None).success_message(), "Successfully transferred ownership of \"report.pdf\"");
        assert_eq!(BulkRequest::reassign(many(23), None).success_message(), "Successfully transferred ownership of 23 files");
        assert_eq!(BulkRequest::delete(vec!["1".into(), "2".into(), "3".into()]).success_message(), "3 file(s) deleted successfully");
    }
}
