//! filex core types: documents, explorer queries and pages, bulk actions, job progress.

#![forbid(unsafe_code)]

pub mod events;
pub mod filters;
pub mod paging;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use events::{EventSink, ExplorerEvent, ModalKind, Notice, NoticeKind};
pub use filters::{normalize_filters, FilterForm, FilterValue, Filters};
pub use paging::{PageNav, PageWindow};

/// Page sizes offered by the explorer.
pub const PAGE_SIZE_OPTIONS: [u32; 3] = [25, 50, 100];
pub const DEFAULT_PAGE_SIZE: u32 = 25;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    #[error("unknown sort key: {0}")]
    UnknownSortKey(String),
    #[error("unknown sort direction: {0} (expect ASC or DESC)")]
    UnknownSortDirection(String),
    #[error("unsupported page size: {0} (expect 25, 50 or 100)")]
    PageSize(u32),
    #[error("invalid value for filter {key}: {value}")]
    FilterValue { key: String, value: String },
}

/// Opaque identifier of a manageable document. Equality is string equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self { Self(id.into()) }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

impl From<&str> for EntityId {
    fn from(v: &str) -> Self { Self(v.to_string()) }
}

impl From<String> for EntityId {
    fn from(v: String) -> Self { Self(v) }
}

impl AsRef<str> for EntityId {
    fn as_ref(&self) -> &str { &self.0 }
}

/// How many records reference a file, bucketed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageLevel {
    Orphaned,
    LowUsage,
    LightlyConnected,
    HeavyUsage,
    #[serde(other)]
    Unknown,
}

impl UsageLevel {
    pub fn from_link_count(links: u32) -> Self {
        match links {
            0 => Self::Orphaned,
            1 => Self::LowUsage,
            2 => Self::LightlyConnected,
            _ => Self::HeavyUsage,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Orphaned => "orphaned",
            Self::LowUsage => "low_usage",
            Self::LightlyConnected => "lightly_connected",
            Self::HeavyUsage => "heavy_usage",
            Self::Unknown => "unknown",
        }
    }

    /// Badge text shown next to a file.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Orphaned => "Orphaned",
            Self::LowUsage => "Low Usage",
            Self::LightlyConnected => "Lightly Connected",
            Self::HeavyUsage => "Heavy Usage",
            Self::Unknown => "Unknown",
        }
    }

    /// Option text in the usage filter.
    pub fn filter_label(&self) -> &'static str {
        match self {
            Self::Orphaned => "Truly Orphaned (0 links)",
            Self::LowUsage => "Low Usage (1 link)",
            Self::LightlyConnected => "Lightly Connected (2 links)",
            Self::HeavyUsage => "Heavy Usage (3+ links)",
            Self::Unknown => "All Files",
        }
    }
}

/// One document row as returned by the platform listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    pub content_document_id: EntityId,
    /// Latest version id; previews are addressed by version, not document.
    #[serde(default)]
    pub content_version_id: Option<String>,
    #[serde(default)]
    pub file_name: String,
    #[serde(default)]
    pub file_type: Option<String>,
    /// Size in bytes.
    #[serde(default)]
    pub content_size: i64,
    #[serde(default)]
    pub created_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_modified_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default)]
    pub current_owner: Option<String>,
    #[serde(default)]
    pub owner_id: Option<String>,
    #[serde(default)]
    pub download_url: Option<String>,
    #[serde(default)]
    pub usage_level: Option<UsageLevel>,
    #[serde(default)]
    pub link_count: Option<u32>,
}

impl FileRecord {
    pub fn new(id: impl Into<EntityId>, file_name: impl Into<String>) -> Self {
        Self {
            content_document_id: id.into(),
            content_version_id: None,
            file_name: file_name.into(),
            file_type: None,
            content_size: 0,
            created_date: None,
            last_modified_date: None,
            created_by: None,
            current_owner: None,
            owner_id: None,
            download_url: None,
            usage_level: None,
            link_count: None,
        }
    }

    pub fn id(&self) -> &EntityId { &self.content_document_id }
}

/// Server-side sort keys (platform field names).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SortKey {
    #[default]
    CreatedDate,
    LastModifiedDate,
    Title,
    ContentSize,
    #[serde(rename = "CreatedBy.Name")]
    CreatedByName,
}

impl SortKey {
    pub const ALL: [SortKey; 5] = [Self::CreatedDate, Self::LastModifiedDate, Self::Title, Self::ContentSize, Self::CreatedByName];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreatedDate => "CreatedDate",
            Self::LastModifiedDate => "LastModifiedDate",
            Self::Title => "Title",
            Self::ContentSize => "ContentSize",
            Self::CreatedByName => "CreatedBy.Name",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::CreatedDate => "Created Date",
            Self::LastModifiedDate => "Modified Date",
            Self::Title => "File Name",
            Self::ContentSize => "File Size",
            Self::CreatedByName => "Created By",
        }
    }
}

impl FromStr for SortKey {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(k) = Self::ALL.iter().find(|k| k.as_str().eq_ignore_ascii_case(s)) {
            return Ok(*k);
        }
        // Short aliases for the CLI
        match s.to_ascii_lowercase().as_str() {
            "created" => Ok(Self::CreatedDate),
            "modified" => Ok(Self::LastModifiedDate),
            "name" => Ok(Self::Title),
            "size" => Ok(Self::ContentSize),
            "creator" => Ok(Self::CreatedByName),
            _ => Err(CoreError::UnknownSortKey(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SortDirection {
    #[serde(rename = "ASC")]
    Asc,
    #[default]
    #[serde(rename = "DESC")]
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Asc => "ASC", Self::Desc => "DESC" }
    }

    pub fn toggled(self) -> Self {
        match self { Self::Asc => Self::Desc, Self::Desc => Self::Asc }
    }
}

impl FromStr for SortDirection {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ASC" => Ok(Self::Asc),
            "DESC" => Ok(Self::Desc),
            _ => Err(CoreError::UnknownSortDirection(s.to_string())),
        }
    }
}

pub fn validate_page_size(size: u32) -> Result<u32, CoreError> {
    if PAGE_SIZE_OPTIONS.contains(&size) { Ok(size) } else { Err(CoreError::PageSize(size)) }
}

/// Parameters of one listing call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplorerQuery {
    pub search_term: String,
    pub filters: Filters,
    pub page_number: u32,
    pub page_size: u32,
    pub sort_by: SortKey,
    pub sort_direction: SortDirection,
}

impl Default for ExplorerQuery {
    fn default() -> Self {
        Self {
            search_term: String::new(),
            filters: Filters::new(),
            page_number: 1,
            page_size: DEFAULT_PAGE_SIZE,
            sort_by: SortKey::default(),
            sort_direction: SortDirection::default(),
        }
    }
}

impl ExplorerQuery {
    /// True when a search term or any filter narrows the listing.
    pub fn is_narrowed(&self) -> bool {
        !self.search_term.is_empty() || !self.filters.is_empty()
    }

    /// Copy of this query with only active filters, as sent to the backend.
    pub fn outgoing(&self) -> ExplorerQuery {
        ExplorerQuery { filters: normalize_filters(&self.filters), ..self.clone() }
    }
}

/// Listing result from the backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse {
    #[serde(default)]
    pub files: Vec<FileRecord>,
    #[serde(default)]
    pub total_count: u64,
    #[serde(default)]
    pub page_number: Option<u32>,
}

/// The currently loaded page. Replaced wholesale on each load.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExplorerPage {
    pub items: Vec<FileRecord>,
    pub total_count: u64,
    pub query: ExplorerQuery,
}

impl ExplorerPage {
    pub fn contains(&self, id: &EntityId) -> bool { self.items.iter().any(|f| &f.content_document_id == id) }

    pub fn find(&self, id: &EntityId) -> Option<&FileRecord> { self.items.iter().find(|f| &f.content_document_id == id) }

    pub fn ids(&self) -> impl Iterator<Item = &EntityId> { self.items.iter().map(|f| &f.content_document_id) }

    pub fn window(&self) -> PageWindow {
        PageWindow { page_number: self.query.page_number, page_size: self.query.page_size, total_count: self.total_count }
    }

    pub fn empty_message(&self) -> &'static str {
        if self.query.is_narrowed() {
            "No files found matching your criteria."
        } else {
            "No files found in the organization."
        }
    }
}

/// Remote actions a bulk job can perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BulkAction {
    Share,
    ReassignOwner,
    Delete,
}

impl BulkAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Share => "share",
            Self::ReassignOwner => "reassign_owner",
            Self::Delete => "delete",
        }
    }

    /// Share and reassign need a user picked before they can run.
    pub fn needs_target_user(&self) -> bool { !matches!(self, Self::Delete) }
}

impl fmt::Display for BulkAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum JobStatus {
    #[default]
    Idle,
    Running,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool { matches!(self, Self::Succeeded | Self::Failed) }
}

/// Orchestrator lifecycle: Idle -> Validating -> Running -> Succeeded|Failed -> Idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum JobPhase {
    #[default]
    Idle,
    Validating,
    Running,
    Succeeded,
    Failed,
}

/// `round(processed / total * 100)` clamped to 0..=100; 0 when total is 0.
pub fn percentage(processed: usize, total: usize) -> u8 {
    if total == 0 { return 0; }
    let pct = (processed as f64 / total as f64 * 100.0).round();
    pct.clamp(0.0, 100.0) as u8
}

/// One consistent view of the running job, as published to the UI.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobProgress {
    pub job_id: Option<uuid::Uuid>,
    pub action: Option<BulkAction>,
    pub phase: JobPhase,
    pub processed: usize,
    pub total: usize,
    pub is_loading: bool,
    pub is_processing: bool,
}

impl JobProgress {
    pub fn percentage(&self) -> u8 { percentage(self.processed, self.total) }
}

/// A user choice (share target, new owner).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserOption {
    #[serde(alias = "value")]
    pub id: String,
    pub label: String,
}

/// Generic label/value pair for filter option lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PicklistOption {
    pub label: String,
    pub value: String,
}

impl PicklistOption {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self { label: label.into(), value: value.into() }
    }
}

/// Prepend a placeholder entry (empty value) to an option list.
pub fn with_placeholder(placeholder: &str, options: &[PicklistOption]) -> Vec<PicklistOption> {
    let mut out = Vec::with_capacity(options.len() + 1);
    out.push(PicklistOption::new(placeholder, ""));
    out.extend(options.iter().cloned());
    out
}

/// Share classification of a connection. Unknown codes are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ShareType {
    Viewer,
    Collaborator,
    Inferred,
    Other(String),
}

impl ShareType {
    pub fn code(&self) -> &str {
        match self {
            Self::Viewer => "V",
            Self::Collaborator => "C",
            Self::Inferred => "I",
            Self::Other(s) => s,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Self::Viewer => "Viewer",
            Self::Collaborator => "Collaborator",
            Self::Inferred => "Inferred",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for ShareType {
    fn from(v: String) -> Self {
        match v.as_str() {
            "V" => Self::Viewer,
            "C" => Self::Collaborator,
            "I" => Self::Inferred,
            _ => Self::Other(v),
        }
    }
}

impl From<ShareType> for String {
    fn from(v: ShareType) -> Self { v.code().to_string() }
}

/// A record through which a file is shared or referenced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub linked_entity_id: String,
    #[serde(default)]
    pub entity_name: String,
    #[serde(default)]
    pub entity_type: Option<String>,
    pub share_type: ShareType,
    #[serde(default)]
    pub visibility: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkTarget {
    /// Navigate in place (relative path or same host).
    Internal,
    /// Open in a new window.
    External,
}

pub fn classify_url(url: &str, host: &str) -> LinkTarget {
    if url.starts_with('/') || (!host.is_empty() && url.contains(host)) {
        LinkTarget::Internal
    } else {
        LinkTarget::External
    }
}

/// Rendition URL used to preview a content version.
pub fn preview_url(version_id: &str) -> String {
    format!(
        "/sfc/servlet.shepherd/version/renditionDownload?rendition=THUMB720BY480&versionId={}&operationContext=CHATTER&contentId={}",
        version_id, version_id
    )
}

pub mod prelude {
    pub use super::{
        BulkAction, Connection, EntityId, ExplorerPage, ExplorerQuery, FileRecord, JobPhase, JobProgress, JobStatus,
        ListResponse, ShareType, SortDirection, SortKey, UserOption,
    };
}
