//! Outbound events and user notices.

use std::sync::mpsc;

use serde::{Deserialize, Serialize};

use crate::{BulkAction, EntityId, Filters, JobProgress, JobStatus, SortDirection, SortKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoticeKind {
    Info,
    Success,
    Warning,
    Error,
}

/// A toast-style message for the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub title: String,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self { Self { kind: NoticeKind::Info, title: "Info".into(), message: message.into() } }
    pub fn success(message: impl Into<String>) -> Self { Self { kind: NoticeKind::Success, title: "Success".into(), message: message.into() } }
    pub fn warning(message: impl Into<String>) -> Self { Self { kind: NoticeKind::Warning, title: "Warning".into(), message: message.into() } }
    pub fn error(message: impl Into<String>) -> Self { Self { kind: NoticeKind::Error, title: "Error".into(), message: message.into() } }
}

/// Which modal the explorer has open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModalKind {
    Preview { version_id: String },
    Share { file_id: EntityId, file_name: String },
    BulkShare { file_ids: Vec<EntityId> },
    /// `file` is set for a single-file transfer, `None` for a bulk one.
    Ownership { file: Option<(EntityId, String)>, current_owner: String, file_ids: Vec<EntityId> },
    Connections { file_id: EntityId, file_name: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExplorerEvent {
    SelectionChanged { selected: usize },
    SearchChanged { search_term: String },
    FiltersChanged { filters: Filters },
    SortChanged { sort_by: SortKey, sort_direction: SortDirection },
    PageChanged { page_number: u32, page_size: u32 },
    Loaded { items: usize, total_count: u64, page_number: u32 },
    BulkActionRequested { action: BulkAction, count: usize },
    OperationProgress(JobProgress),
    OperationSettled { action: BulkAction, status: JobStatus, processed: usize, total: usize },
    ConnectionsRequested { file_id: EntityId, file_name: String },
    ModalChanged(Option<ModalKind>),
    Notice(Notice),
}

/// Fire-and-forget event channel. A missing or closed receiver is not an error.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<mpsc::Sender<ExplorerEvent>>,
}

impl EventSink {
    pub fn none() -> Self { Self { tx: None } }

    pub fn channel() -> (Self, mpsc::Receiver<ExplorerEvent>) {
        let (tx, rx) = mpsc::channel();
        (Self { tx: Some(tx) }, rx)
    }

    pub fn emit(&self, ev: ExplorerEvent) {
        if let Some(tx) = &self.tx { let _ = tx.send(ev); }
    }

    pub fn notice(&self, notice: Notice) { self.emit(ExplorerEvent::Notice(notice)); }
}

/// Drain everything currently queued on `rx`.
pub fn drain(rx: &mpsc::Receiver<ExplorerEvent>) -> Vec<ExplorerEvent> {
    rx.try_iter().collect()
}

/// Only the notices among `events`.
pub fn notices(events: &[ExplorerEvent]) -> Vec<&Notice> {
    events.iter().filter_map(|e| match e { ExplorerEvent::Notice(n) => Some(n), _ => None }).collect()
}
