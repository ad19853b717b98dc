//! filex ops: bulk share / reassign / delete against a capacity-limited backend.
//!
//! `dispatch` splits an id set into paced chunks, `progress` publishes the job
//! snapshot, `slot` keeps one job at a time, and `orchestrator` ties them together
//! with validation, notices and the settle lifecycle.

#![forbid(unsafe_code)]

pub mod config;
pub mod dispatch;
pub mod orchestrator;
pub mod progress;
pub mod slot;

use filex_api::BackendError;
use filex_core::{BulkAction, Notice};

pub use config::OpsConfig;
pub use dispatch::{chunk_count, run_batched, Checkpoint, DispatchError};
pub use orchestrator::{BulkJob, BulkRequest, JobReport, Orchestrator, Target};
pub use progress::ProgressTracker;
pub use slot::{JobSlot, SlotGuard};

pub const MSG_BUSY: &str = "Another operation is already in progress";

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OpsError {
    #[error("validation: {0}")]
    Validation(String),
    #[error("busy: a bulk job is already running")]
    Busy,
    #[error("remote: {action} stopped after {processed} of {total}: {source}")]
    Remote {
        action: BulkAction,
        processed: usize,
        total: usize,
        #[source]
        source: BackendError,
    },
}

impl OpsError {
    /// Toast for this error: warnings for local rejections, errors for remote failures.
    pub fn notice(&self) -> Notice {
        match self {
            Self::Validation(msg) => Notice::warning(msg.clone()),
            Self::Busy => Notice::warning(MSG_BUSY),
            Self::Remote { source, .. } => Notice::error(source.user_message()),
        }
    }
}
