//! filex backend façade.
//!
//! This crate defines the remote operations the console depends on. The platform
//! behind them (query execution, sharing rules, auth) is an external collaborator;
//! `RestBackend` talks to it over HTTP and `MockBackend` stands in for it in tests.

#![forbid(unsafe_code)]

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use filex_core::filters::keys;
use filex_core::{
    Connection, EntityId, ExplorerQuery, FileRecord, FilterValue, ListResponse, PicklistOption, ShareType,
    SortDirection, SortKey, UsageLevel, UserOption,
};
use serde::{Deserialize, Serialize};

pub mod rest;

pub use rest::{RestBackend, RestConfig};

/// Shown when the backend gives no message of its own.
pub const GENERIC_ERROR_MESSAGE: &str = "An unexpected error occurred";

/// Backend errors suitable for transport and for user-facing notices.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum BackendError {
    #[error("rejected: {}", .message.as_deref().unwrap_or("(no message)"))]
    Rejected { code: Option<String>, message: Option<String> },
    #[error("not_found: {0}")]
    NotFound(String),
    #[error("validation: {0}")]
    Validation(String),
    #[error("transport: {0}")]
    Transport(String),
    #[error("decode: {0}")]
    Decode(String),
}

impl BackendError {
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected { code: None, message: Some(message.into()) }
    }

    /// Message supplied by the platform, if it sent one.
    pub fn backend_message(&self) -> Option<&str> {
        match self {
            Self::Rejected { message, .. } => message.as_deref().filter(|m| !m.is_empty()),
            Self::NotFound(m) | Self::Validation(m) => Some(m.as_str()),
            Self::Transport(_) | Self::Decode(_) => None,
        }
    }

    pub fn user_message(&self) -> String {
        self.backend_message().unwrap_or(GENERIC_ERROR_MESSAGE).to_string()
    }
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Remote operations exposed by the platform.
#[async_trait::async_trait]
pub trait FileBackend: Send + Sync {
    /// One page of files for the query. Filters are sent already normalized.
    async fn list_entities(&self, query: &ExplorerQuery) -> BackendResult<ListResponse>;

    async fn delete_entities(&self, ids: &[EntityId]) -> BackendResult<()>;

    async fn share_entity(&self, id: &EntityId, user_id: &str) -> BackendResult<()>;

    async fn share_entities_bulk(&self, ids: &[EntityId], user_id: &str) -> BackendResult<()>;

    async fn reassign_owner(&self, id: &EntityId, new_owner_id: &str) -> BackendResult<()>;

    async fn reassign_owner_bulk(&self, ids: &[EntityId], new_owner_id: &str) -> BackendResult<()>;

    async fn list_active_users(&self) -> BackendResult<Vec<UserOption>>;

    async fn list_entity_connections(&self, id: &EntityId) -> BackendResult<Vec<Connection>>;

    /// Option source for the file type filter.
    async fn list_file_types(&self) -> BackendResult<Vec<PicklistOption>>;

    /// Option source for the owner filter.
    async fn list_file_owners(&self) -> BackendResult<Vec<PicklistOption>>;
}

// ----------------- Mock implementation -----------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    List,
    Delete,
    Share,
    ShareBulk,
    Reassign,
    ReassignBulk,
    Users,
    Connections,
    FileTypes,
    FileOwners,
}

/// A recorded backend call, in issue order.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    List(ExplorerQuery),
    Delete(Vec<EntityId>),
    Share { id: EntityId, user_id: String },
    ShareBulk { ids: Vec<EntityId>, user_id: String },
    Reassign { id: EntityId, owner_id: String },
    ReassignBulk { ids: Vec<EntityId>, owner_id: String },
    Users,
    Connections(EntityId),
    FileTypes,
    FileOwners,
}

impl Call {
    pub fn kind(&self) -> CallKind {
        match self {
            Self::List(_) => CallKind::List,
            Self::Delete(_) => CallKind::Delete,
            Self::Share { .. } => CallKind::Share,
            Self::ShareBulk { .. } => CallKind::ShareBulk,
            Self::Reassign { .. } => CallKind::Reassign,
            Self::ReassignBulk { .. } => CallKind::ReassignBulk,
            Self::Users => CallKind::Users,
            Self::Connections(_) => CallKind::Connections,
            Self::FileTypes => CallKind::FileTypes,
            Self::FileOwners => CallKind::FileOwners,
        }
    }

    /// Ids carried by a mutating call.
    pub fn ids(&self) -> Vec<EntityId> {
        match self {
            Self::Delete(ids) | Self::ShareBulk { ids, .. } | Self::ReassignBulk { ids, .. } => ids.clone(),
            Self::Share { id, .. } | Self::Reassign { id, .. } | Self::Connections(id) => vec![id.clone()],
            _ => Vec::new(),
        }
    }
}

#[derive(Default)]
struct MockState {
    files: Vec<FileRecord>,
    users: Vec<UserOption>,
    connections: HashMap<EntityId, Vec<Connection>>,
    file_types: Vec<PicklistOption>,
    file_owners: Vec<PicklistOption>,
    calls: Vec<Call>,
    seen: HashMap<CallKind, usize>,
    /// (kind, 1-based occurrence) -> error
    failures: HashMap<(CallKind, usize), BackendError>,
}

/// In-memory platform for tests: records every call, applies mutations to its own
/// file list, and fails chosen calls on demand.
#[derive(Default)]
pub struct MockBackend {
    state: Mutex<MockState>,
    latency: Duration,
}

impl MockBackend {
    pub fn new() -> Self { Self::default() }

    /// `n` PDF files with ids `069000000000001`.. and names `file-1.pdf`..
    pub fn seeded(n: usize) -> Self {
        let files = (1..=n)
            .map(|i| {
                let mut f = FileRecord::new(format!("069{:012}", i), format!("file-{}.pdf", i));
                f.content_version_id = Some(format!("068{:012}", i));
                f.file_type = Some("PDF".into());
                f.content_size = (i as i64) * 1024;
                f.download_url = Some(format!("/sfc/servlet.shepherd/document/download/069{:012}", i));
                f.usage_level = Some(UsageLevel::from_link_count((i % 4) as u32));
                f
            })
            .collect();
        Self::new().with_files(files)
    }

    pub fn with_files(self, files: Vec<FileRecord>) -> Self {
        self.lock().files = files;
        self
    }

    pub fn with_users(self, users: Vec<UserOption>) -> Self {
        self.lock().users = users;
        self
    }

    pub fn with_connections(self, id: impl Into<EntityId>, conns: Vec<Connection>) -> Self {
        self.lock().connections.insert(id.into(), conns);
        self
    }

    pub fn with_file_types(self, types: Vec<PicklistOption>) -> Self {
        self.lock().file_types = types;
        self
    }

    pub fn with_file_owners(self, owners: Vec<PicklistOption>) -> Self {
        self.lock().file_owners = owners;
        self
    }

    /// Delay every call by `latency` (lets tests observe in-flight state).
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Make the `nth` (1-based) call of `kind` fail with `err`.
    pub fn fail_nth(self, kind: CallKind, nth: usize, err: BackendError) -> Self {
        self.lock().failures.insert((kind, nth), err);
        self
    }

    pub fn calls(&self) -> Vec<Call> { self.lock().calls.clone() }

    pub fn calls_of(&self, kind: CallKind) -> Vec<Call> {
        self.lock().calls.iter().filter(|c| c.kind() == kind).cloned().collect()
    }

    pub fn files(&self) -> Vec<FileRecord> { self.lock().files.clone() }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Record the call and decide whether it fails.
    async fn enter(&self, call: Call) -> BackendResult<()> {
        if !self.latency.is_zero() { tokio::time::sleep(self.latency).await; }
        let mut st = self.lock();
        let kind = call.kind();
        st.calls.push(call);
        let n = {
            let seen = st.seen.entry(kind).or_insert(0);
            *seen += 1;
            *seen
        };
        match st.failures.remove(&(kind, n)) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn owner_label(st: &MockState, owner_id: &str) -> String {
        st.users.iter().find(|u| u.id == owner_id).map(|u| u.label.clone()).unwrap_or_else(|| owner_id.to_string())
    }

    fn share_with(st: &mut MockState, id: &EntityId, user_id: &str) {
        let name = Self::owner_label(st, user_id);
        let conns = st.connections.entry(id.clone()).or_default();
        if !conns.iter().any(|c| c.linked_entity_id == user_id) {
            conns.push(Connection {
                linked_entity_id: user_id.to_string(),
                entity_name: name,
                entity_type: Some("User".into()),
                share_type: ShareType::Viewer,
                visibility: Some("AllUsers".into()),
                url: Some(format!("/lightning/r/User/{}/view", user_id)),
            });
        }
    }

    fn reassign(st: &mut MockState, id: &EntityId, owner_id: &str) {
        let label = Self::owner_label(st, owner_id);
        if let Some(f) = st.files.iter_mut().find(|f| &f.content_document_id == id) {
            f.owner_id = Some(owner_id.to_string());
            f.current_owner = Some(label);
        }
    }
}

fn matches_filters(f: &FileRecord, query: &ExplorerQuery) -> bool {
    if !query.search_term.is_empty() && !f.file_name.to_lowercase().contains(&query.search_term.to_lowercase()) {
        return false;
    }
    for (key, value) in query.filters.iter().filter(|(_, v)| v.is_active()) {
        let ok = match (key.as_str(), value) {
            (keys::FILE_TYPE, FilterValue::Text(t)) => f.file_type.as_deref().map(|ft| ft.eq_ignore_ascii_case(t)).unwrap_or(false),
            (keys::OWNER_ID, FilterValue::Text(o)) => f.owner_id.as_deref() == Some(o.as_str()),
            (keys::USAGE_LEVEL, FilterValue::Text(u)) => f.usage_level.map(|l| l.as_str() == u.as_str()).unwrap_or(false),
            (keys::SHOW_ORPHANED, FilterValue::Flag(true)) => f.usage_level == Some(UsageLevel::Orphaned),
            (keys::MIN_SIZE, FilterValue::Number(kb)) => f.content_size >= kb * 1024,
            (keys::MAX_SIZE, FilterValue::Number(kb)) => f.content_size <= kb * 1024,
            _ => true,
        };
        if !ok { return false; }
    }
    true
}

fn sort_files(files: &mut [FileRecord], key: SortKey, dir: SortDirection) {
    files.sort_by(|a, b| {
        let ord = match key {
            SortKey::CreatedDate => a.created_date.cmp(&b.created_date),
            SortKey::LastModifiedDate => a.last_modified_date.cmp(&b.last_modified_date),
            SortKey::Title => a.file_name.to_lowercase().cmp(&b.file_name.to_lowercase()),
            SortKey::ContentSize => a.content_size.cmp(&b.content_size),
            SortKey::CreatedByName => a.created_by.cmp(&b.created_by),
        }
        .then_with(|| a.content_document_id.cmp(&b.content_document_id));
        match dir { SortDirection::Asc => ord, SortDirection::Desc => ord.reverse() }
    });
}

#[async_trait::async_trait]
impl FileBackend for MockBackend {
    async fn list_entities(&self, query: &ExplorerQuery) -> BackendResult<ListResponse> {
        self.enter(Call::List(query.clone())).await?;
        let st = self.lock();
        let mut hits: Vec<FileRecord> = st.files.iter().filter(|f| matches_filters(f, query)).cloned().collect();
        sort_files(&mut hits, query.sort_by, query.sort_direction);
        let total = hits.len() as u64;
        let size = query.page_size.max(1) as usize;
        let pages = hits.len().div_ceil(size).max(1);
        let page = (query.page_number.max(1) as usize).min(pages);
        let files = hits.into_iter().skip((page - 1) * size).take(size).collect();
        Ok(ListResponse { files, total_count: total, page_number: Some(page as u32) })
    }

    async fn delete_entities(&self, ids: &[EntityId]) -> BackendResult<()> {
        self.enter(Call::Delete(ids.to_vec())).await?;
        let mut st = self.lock();
        st.files.retain(|f| !ids.contains(&f.content_document_id));
        for id in ids { st.connections.remove(id); }
        Ok(())
    }

    async fn share_entity(&self, id: &EntityId, user_id: &str) -> BackendResult<()> {
        self.enter(Call::Share { id: id.clone(), user_id: user_id.to_string() }).await?;
        Self::share_with(&mut self.lock(), id, user_id);
        Ok(())
    }

    async fn share_entities_bulk(&self, ids: &[EntityId], user_id: &str) -> BackendResult<()> {
        self.enter(Call::ShareBulk { ids: ids.to_vec(), user_id: user_id.to_string() }).await?;
        let mut st = self.lock();
        for id in ids { Self::share_with(&mut st, id, user_id); }
        Ok(())
    }

    async fn reassign_owner(&self, id: &EntityId, new_owner_id: &str) -> BackendResult<()> {
        self.enter(Call::Reassign { id: id.clone(), owner_id: new_owner_id.to_string() }).await?;
        Self::reassign(&mut self.lock(), id, new_owner_id);
        Ok(())
    }

    async fn reassign_owner_bulk(&self, ids: &[EntityId], new_owner_id: &str) -> BackendResult<()> {
        self.enter(Call::ReassignBulk { ids: ids.to_vec(), owner_id: new_owner_id.to_string() }).await?;
        let mut st = self.lock();
        for id in ids { Self::reassign(&mut st, id, new_owner_id); }
        Ok(())
    }

    async fn list_active_users(&self) -> BackendResult<Vec<UserOption>> {
        self.enter(Call::Users).await?;
        Ok(self.lock().users.clone())
    }

    async fn list_entity_connections(&self, id: &EntityId) -> BackendResult<Vec<Connection>> {
        self.enter(Call::Connections(id.clone())).await?;
        Ok(self.lock().connections.get(id).cloned().unwrap_or_default())
    }

    async fn list_file_types(&self) -> BackendResult<Vec<PicklistOption>> {
        self.enter(Call::FileTypes).await?;
        Ok(self.lock().file_types.clone())
    }

    async fn list_file_owners(&self) -> BackendResult<Vec<PicklistOption>> {
        self.enter(Call::FileOwners).await?;
        Ok(self.lock().file_owners.clone())
    }
}
