//! filex explorer store: the loaded page, the query that produced it, the
//! selection, the open modal, and reconciliation after bulk jobs settle.
//!
//! Pages are published through an `ArcSwap` with a `watch` epoch so readers can
//! grab a consistent snapshot without holding the store.

#![forbid(unsafe_code)]

pub mod options;
pub mod selection;

use std::sync::Arc;
use std::time::Instant;

use arc_swap::ArcSwap;
use filex_api::{BackendError, FileBackend};
use filex_core::filters::keys;
use filex_core::{
    normalize_filters, preview_url, validate_page_size, BulkAction, CoreError, EntityId, EventSink, ExplorerEvent,
    ExplorerPage, ExplorerQuery, FilterForm, FilterValue, Filters, JobProgress, ModalKind, Notice, PageNav,
    PicklistOption, SortDirection, SortKey, DEFAULT_PAGE_SIZE,
};
use filex_ops::{BulkRequest, JobReport, OpsConfig, OpsError, Orchestrator, Target};
use metrics::histogram;
use tokio::sync::watch;
use tracing::{debug, info, warn};

pub use options::{connection_views, ConnectionView};
pub use selection::Selection;

pub const MSG_SELECT_AT_LEAST_ONE: &str = "Please select at least one file";
pub const UNKNOWN_FILE: &str = "Unknown File";

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Ops(#[from] OpsError),
    #[error("no open modal has an action to confirm")]
    NothingToConfirm,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub page_size: u32,
    /// Restrict every listing to orphaned files.
    pub show_orphaned_only: bool,
    /// Instance host, used to classify connection links.
    pub host: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { page_size: DEFAULT_PAGE_SIZE, show_orphaned_only: false, host: String::new() }
    }
}

impl StoreConfig {
    /// `FILEX_PAGE_SIZE`; values other than 25, 50 or 100 fall back to 25.
    pub fn from_env() -> Self {
        let page_size = std::env::var("FILEX_PAGE_SIZE")
            .ok()
            .and_then(|s| s.trim().parse::<u32>().ok())
            .and_then(|n| validate_page_size(n).ok())
            .unwrap_or(DEFAULT_PAGE_SIZE);
        Self { page_size, ..Self::default() }
    }
}

/// Read side of the store.
#[derive(Clone)]
pub struct StoreHandle {
    snap: Arc<ArcSwap<ExplorerPage>>,
    epoch_rx: watch::Receiver<u64>,
}

impl StoreHandle {
    pub fn current(&self) -> Arc<ExplorerPage> { self.snap.load_full() }
    pub fn subscribe_epoch(&self) -> watch::Receiver<u64> { self.epoch_rx.clone() }
}

pub struct ExplorerStore {
    backend: Arc<dyn FileBackend>,
    ops: Arc<Orchestrator>,
    cfg: StoreConfig,
    query: ExplorerQuery,
    snap: Arc<ArcSwap<ExplorerPage>>,
    epoch: u64,
    epoch_tx: watch::Sender<u64>,
    selection: Selection,
    modal: Option<ModalKind>,
    loading: bool,
    last_error: Option<String>,
    events: EventSink,
}

impl ExplorerStore {
    pub fn new(backend: Arc<dyn FileBackend>, ops_cfg: OpsConfig, cfg: StoreConfig, events: EventSink) -> Self {
        let ops = Arc::new(Orchestrator::new(Arc::clone(&backend), ops_cfg).with_events(events.clone()));
        let query = ExplorerQuery { page_size: cfg.page_size, ..ExplorerQuery::default() };
        let snap = Arc::new(ArcSwap::from_pointee(ExplorerPage { query: query.clone(), ..ExplorerPage::default() }));
        let (epoch_tx, _rx) = watch::channel(0u64);
        Self {
            backend,
            ops,
            cfg,
            query,
            snap,
            epoch: 0,
            epoch_tx,
            selection: Selection::default(),
            modal: None,
            loading: false,
            last_error: None,
            events,
        }
    }

    /// Start from `query` instead of the defaults. Filters are normalized.
    pub fn with_query(mut self, query: ExplorerQuery) -> Self {
        self.query = ExplorerQuery { filters: normalize_filters(&query.filters), ..query };
        self
    }

    pub fn handle(&self) -> StoreHandle {
        StoreHandle { snap: Arc::clone(&self.snap), epoch_rx: self.epoch_tx.subscribe() }
    }

    pub fn page(&self) -> Arc<ExplorerPage> { self.snap.load_full() }
    pub fn query(&self) -> &ExplorerQuery { &self.query }
    pub fn orchestrator(&self) -> &Arc<Orchestrator> { &self.ops }
    pub fn progress(&self) -> JobProgress { self.ops.progress() }
    pub fn is_loading(&self) -> bool { self.loading || self.ops.progress().is_loading }
    pub fn last_error(&self) -> Option<&str> { self.last_error.as_deref() }
    pub fn modal(&self) -> Option<&ModalKind> { self.modal.as_ref() }
    pub fn selection(&self) -> &Selection { &self.selection }

    /// Query as sent to the backend: active filters only, plus the orphaned flag when enabled.
    pub fn outgoing_query(&self) -> ExplorerQuery {
        let mut q = self.query.outgoing();
        if self.cfg.show_orphaned_only {
            q.filters.insert(keys::SHOW_ORPHANED.to_string(), FilterValue::Flag(true));
        }
        q
    }

    fn publish(&mut self, page: ExplorerPage) {
        self.snap.store(Arc::new(page));
        self.epoch = self.epoch.saturating_add(1);
        self.epoch_tx.send_replace(self.epoch);
    }

    fn clear_selection_quiet(&mut self) {
        self.selection.clear();
        self.events.emit(ExplorerEvent::SelectionChanged { selected: 0 });
    }

    /// Fetch the current query's page and replace the loaded page wholesale.
    /// The selection is cleared either way; a failure leaves an empty page.
    pub async fn load(&mut self) -> Result<(), StoreError> {
        let outgoing = self.outgoing_query();
        let t0 = Instant::now();
        debug!(page = outgoing.page_number, size = outgoing.page_size, sort = outgoing.sort_by.as_str(), "store: load start");
        self.loading = true;
        let res = self.backend.list_entities(&outgoing).await;
        self.loading = false;
        histogram!("filex_list_ms", t0.elapsed().as_secs_f64() * 1000.0);
        self.clear_selection_quiet();
        match res {
            Ok(resp) => {
                if let Some(n) = resp.page_number.filter(|n| *n >= 1) {
                    self.query.page_number = n;
                }
                let page = ExplorerPage { items: resp.files, total_count: resp.total_count, query: self.query.clone() };
                info!(items = page.items.len(), total = page.total_count, page = self.query.page_number, took_ms = %t0.elapsed().as_millis(), "store: load ok");
                self.events.emit(ExplorerEvent::Loaded {
                    items: page.items.len(),
                    total_count: page.total_count,
                    page_number: self.query.page_number,
                });
                self.publish(page);
                self.last_error = None;
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "store: load failed");
                let message = err.user_message();
                self.publish(ExplorerPage { items: Vec::new(), total_count: 0, query: self.query.clone() });
                self.events.notice(Notice::error(message.clone()));
                self.last_error = Some(message);
                Err(err.into())
            }
        }
    }

    // ----------------- Query -----------------

    pub async fn set_search(&mut self, term: impl Into<String>) -> Result<(), StoreError> {
        self.query.search_term = term.into();
        self.query.page_number = 1;
        self.events.emit(ExplorerEvent::SearchChanged { search_term: self.query.search_term.clone() });
        self.load().await
    }

    pub async fn set_filters(&mut self, filters: Filters) -> Result<(), StoreError> {
        self.query.filters = normalize_filters(&filters);
        self.query.page_number = 1;
        self.events.emit(ExplorerEvent::FiltersChanged { filters: self.query.filters.clone() });
        self.load().await
    }

    /// Search term and filters from the sidebar in one reload.
    pub async fn apply_filter_form(&mut self, form: &FilterForm) -> Result<(), StoreError> {
        self.query.search_term = form.search_term.clone();
        self.query.filters = form.active();
        self.query.page_number = 1;
        self.events.emit(ExplorerEvent::FiltersChanged { filters: self.query.filters.clone() });
        self.load().await
    }

    pub async fn clear_filters(&mut self) -> Result<(), StoreError> {
        self.query.search_term.clear();
        self.query.filters.clear();
        self.query.page_number = 1;
        self.events.emit(ExplorerEvent::FiltersChanged { filters: Filters::new() });
        self.load().await
    }

    pub async fn set_sort(&mut self, sort_by: SortKey, sort_direction: SortDirection) -> Result<(), StoreError> {
        self.query.sort_by = sort_by;
        self.query.sort_direction = sort_direction;
        self.query.page_number = 1;
        self.events.emit(ExplorerEvent::SortChanged { sort_by, sort_direction });
        self.load().await
    }

    pub async fn toggle_sort_direction(&mut self) -> Result<(), StoreError> {
        self.set_sort(self.query.sort_by, self.query.sort_direction.toggled()).await
    }

    /// Only 25, 50 and 100 are accepted; anything else is refused before loading.
    pub async fn set_page_size(&mut self, size: u32) -> Result<(), StoreError> {
        self.query.page_size = validate_page_size(size)?;
        self.query.page_number = 1;
        self.events.emit(ExplorerEvent::PageChanged { page_number: 1, page_size: size });
        self.load().await
    }

    /// Move to another page, keeping every other query parameter.
    /// Returns `false` without loading when `nav` goes nowhere.
    pub async fn go_to(&mut self, nav: PageNav) -> Result<bool, StoreError> {
        let Some(target) = self.page().window().target(nav) else { return Ok(false) };
        self.query.page_number = target;
        self.events.emit(ExplorerEvent::PageChanged { page_number: target, page_size: self.query.page_size });
        self.load().await?;
        Ok(true)
    }

    // ----------------- Selection -----------------

    /// Refuses ids that are not on the loaded page.
    pub fn select(&mut self, id: &EntityId) -> bool {
        let page = self.page();
        let ok = self.selection.select(&page, id);
        if ok { self.events.emit(ExplorerEvent::SelectionChanged { selected: self.selection.len() }); }
        ok
    }

    pub fn deselect(&mut self, id: &EntityId) -> bool {
        let ok = self.selection.deselect(id);
        if ok { self.events.emit(ExplorerEvent::SelectionChanged { selected: self.selection.len() }); }
        ok
    }

    pub fn toggle(&mut self, id: &EntityId) -> bool {
        if self.selection.contains(id) { self.deselect(id) } else { self.select(id) }
    }

    /// Current page only.
    pub fn select_all(&mut self) {
        let page = self.page();
        self.selection.select_all(&page);
        self.events.emit(ExplorerEvent::SelectionChanged { selected: self.selection.len() });
    }

    pub fn clear_all(&mut self) { self.clear_selection_quiet(); }

    pub fn is_selected(&self, id: &EntityId) -> bool { self.selection.contains(id) }

    /// Selected ids in page order.
    pub fn selected_ids(&self) -> Vec<EntityId> { self.selection.ordered(&self.page()) }

    pub fn all_selected(&self) -> bool { self.selection.all_selected(&self.page()) }

    /// "N files" with nothing selected, otherwise "K of N selected".
    pub fn selection_text(&self) -> String {
        let total = self.page().total_count;
        if self.selection.is_empty() {
            format!("{} files", total)
        } else {
            format!("{} of {} selected", self.selection.len(), total)
        }
    }

    /// Download links of selected files; files without one are skipped.
    pub fn bulk_download_urls(&self) -> Vec<String> {
        let page = self.page();
        page.items
            .iter()
            .filter(|f| self.selection.contains(&f.content_document_id))
            .filter_map(|f| f.download_url.clone())
            .collect()
    }

    // ----------------- Modals -----------------

    fn set_modal(&mut self, modal: Option<ModalKind>) {
        self.modal = modal.clone();
        self.events.emit(ExplorerEvent::ModalChanged(modal));
    }

    fn file_name(&self, id: &EntityId) -> String {
        self.page()
            .find(id)
            .map(|f| f.file_name.clone())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| UNKNOWN_FILE.to_string())
    }

    /// Open the preview for a file on the page. `None` when it has no version to render.
    pub fn open_preview(&mut self, id: &EntityId) -> Option<String> {
        let version_id = self.page().find(id)?.content_version_id.clone()?;
        let url = preview_url(&version_id);
        self.set_modal(Some(ModalKind::Preview { version_id }));
        Some(url)
    }

    pub fn open_share(&mut self, id: &EntityId) {
        let file_name = self.file_name(id);
        self.set_modal(Some(ModalKind::Share { file_id: id.clone(), file_name }));
    }

    pub fn open_ownership(&mut self, id: &EntityId) {
        let file_name = self.file_name(id);
        let current_owner = self.page().find(id).and_then(|f| f.current_owner.clone()).unwrap_or_default();
        self.set_modal(Some(ModalKind::Ownership { file: Some((id.clone(), file_name)), current_owner, file_ids: vec![id.clone()] }));
    }

    pub fn open_connections(&mut self, id: &EntityId) {
        let file_name = self.file_name(id);
        self.events.emit(ExplorerEvent::ConnectionsRequested { file_id: id.clone(), file_name: file_name.clone() });
        self.set_modal(Some(ModalKind::Connections { file_id: id.clone(), file_name }));
    }

    /// Closing a bulk share or ownership modal also clears the selection and reloads.
    pub async fn close_modal(&mut self) -> Result<(), StoreError> {
        match self.modal.take() {
            Some(ModalKind::BulkShare { .. }) | Some(ModalKind::Ownership { .. }) => {
                self.set_modal(None);
                self.clear_selection_quiet();
                self.load().await
            }
            Some(_) => {
                self.set_modal(None);
                Ok(())
            }
            None => Ok(()),
        }
    }

    // ----------------- Bulk actions -----------------

    /// Toolbar bulk button. Share and reassign open their modal over a snapshot of
    /// the selection; delete asks for confirmation and runs at once.
    pub async fn request_bulk(&mut self, action: BulkAction) -> Result<Option<JobReport>, StoreError> {
        let ids = self.selected_ids();
        if ids.is_empty() {
            self.events.notice(Notice::warning(MSG_SELECT_AT_LEAST_ONE));
            return Err(OpsError::Validation(MSG_SELECT_AT_LEAST_ONE.to_string()).into());
        }
        self.events.emit(ExplorerEvent::BulkActionRequested { action, count: ids.len() });
        match action {
            BulkAction::Share => {
                self.set_modal(Some(ModalKind::BulkShare { file_ids: ids }));
                Ok(None)
            }
            BulkAction::ReassignOwner => {
                self.set_modal(Some(ModalKind::Ownership { file: None, current_owner: String::new(), file_ids: ids }));
                Ok(None)
            }
            BulkAction::Delete => {
                self.events.notice(Notice::info(delete_confirm_text(ids.len())));
                let res = self.ops.run(BulkRequest::delete(ids)).await;
                self.settle(res, false).await.map(Some)
            }
        }
    }

    /// Submit the open share or ownership modal with the picked user.
    pub async fn confirm_modal(&mut self, user_id: Option<String>) -> Result<JobReport, StoreError> {
        let req = match &self.modal {
            Some(ModalKind::Share { file_id, file_name }) => {
                BulkRequest::share(Target::from_parts(Some(file_id.clone()), Some(file_name.clone()), vec![file_id.clone()]), user_id)
            }
            Some(ModalKind::BulkShare { file_ids }) => BulkRequest::share(Target::Many(file_ids.clone()), user_id),
            Some(ModalKind::Ownership { file, file_ids, .. }) => {
                let (id, name) = file.clone().unzip();
                BulkRequest::reassign(Target::from_parts(id, name, file_ids.clone()), user_id)
            }
            _ => return Err(StoreError::NothingToConfirm),
        };
        let res = self.ops.run(req).await;
        self.settle(res, true).await
    }

    /// After a job ran: clear the selection and reload from the backend. A
    /// successful job also closes the modal; a failed one leaves it open.
    /// Requests rejected before running change nothing.
    async fn settle(&mut self, res: Result<JobReport, OpsError>, close_modal: bool) -> Result<JobReport, StoreError> {
        match res {
            Err(err @ (OpsError::Validation(_) | OpsError::Busy)) => Err(err.into()),
            Ok(report) => {
                if close_modal { self.set_modal(None); }
                self.clear_selection_quiet();
                self.reload_after_job().await;
                Ok(report)
            }
            Err(err) => {
                self.clear_selection_quiet();
                self.reload_after_job().await;
                Err(err.into())
            }
        }
    }

    /// A failed reload is already reported through its notice and `last_error`;
    /// the job's own outcome is what the caller gets back.
    async fn reload_after_job(&mut self) {
        if let Err(err) = self.load().await {
            debug!(error = %err, "store: reload after job failed");
        }
    }

    // ----------------- Lookups -----------------

    pub async fn connections(&self, id: &EntityId) -> Result<Vec<ConnectionView>, StoreError> {
        match self.backend.list_entity_connections(id).await {
            Ok(conns) => Ok(connection_views(conns, &self.cfg.host)),
            Err(err) => Err(self.lookup_failed("connections", err)),
        }
    }

    pub async fn file_type_options(&self) -> Result<Vec<PicklistOption>, StoreError> {
        match self.backend.list_file_types().await {
            Ok(types) => Ok(options::file_type_options(&types)),
            Err(err) => Err(self.lookup_failed("file types", err)),
        }
    }

    pub async fn owner_options(&self) -> Result<Vec<PicklistOption>, StoreError> {
        match self.backend.list_file_owners().await {
            Ok(owners) => Ok(options::owner_options(&owners)),
            Err(err) => Err(self.lookup_failed("owners", err)),
        }
    }

    pub async fn user_options(&self) -> Result<Vec<PicklistOption>, StoreError> {
        match self.backend.list_active_users().await {
            Ok(users) => Ok(options::user_options(&users)),
            Err(err) => Err(self.lookup_failed("users", err)),
        }
    }

    fn lookup_failed(&self, what: &str, err: BackendError) -> StoreError {
        warn!(what, error = %err, "store: lookup failed");
        self.events.notice(Notice::error(err.user_message()));
        err.into()
    }
}

pub fn delete_confirm_text(count: usize) -> String {
    format!("Are you sure you want to delete {} file(s)?", count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confirm_text() {
        assert_eq!(delete_confirm_text(3), "Are you sure you want to delete 3 file(s)?");
    }

    #[test]
    fn default_config_uses_default_page_size() {
        let cfg = StoreConfig::default();
        assert_eq!(cfg.page_size, 25);
        assert!(!cfg.show_orphaned_only);
    }
}
