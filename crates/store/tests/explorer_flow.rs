#![forbid(unsafe_code)]

use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::time::Duration;

use filex_api::{BackendError, Call, CallKind, MockBackend};
use filex_core::events::{drain, notices};
use filex_core::filters::keys;
use filex_core::{
    BulkAction, Connection, EntityId, EventSink, ExplorerEvent, ExplorerQuery, FileRecord, FilterValue, Filters,
    LinkTarget, ModalKind, NoticeKind, PageNav, PicklistOption, ShareType, SortDirection, SortKey, UserOption,
};
use filex_ops::{OpsConfig, OpsError};
use filex_store::{ExplorerStore, StoreConfig, StoreError, MSG_SELECT_AT_LEAST_ONE, UNKNOWN_FILE};

fn store_with(api: Arc<MockBackend>, cfg: StoreConfig) -> (ExplorerStore, Receiver<ExplorerEvent>) {
    let (sink, rx) = EventSink::channel();
    let store = ExplorerStore::new(api, OpsConfig { chunk_size: 10, pace: Duration::ZERO }, cfg, sink);
    (store, rx)
}

fn last_list(api: &MockBackend) -> ExplorerQuery {
    match api.calls_of(CallKind::List).last() {
        Some(Call::List(q)) => q.clone(),
        other => panic!("no list call: {:?}", other),
    }
}

fn ada() -> Vec<UserOption> {
    vec![UserOption { id: "005A".into(), label: "Ada".into() }, UserOption { id: "005B".into(), label: "Grace".into() }]
}

#[tokio::test]
async fn load_replaces_page_and_clears_selection() {
    let api = Arc::new(MockBackend::seeded(30));
    let (mut store, rx) = store_with(api.clone(), StoreConfig::default());
    store.load().await.unwrap();
    let page = store.page();
    assert_eq!(page.items.len(), 25);
    assert_eq!(page.total_count, 30);
    assert_eq!(page.window().info(), "1-25 of 30");

    assert!(store.select(&page.items[0].content_document_id));
    assert!(store.select(&page.items[1].content_document_id));
    assert!(!store.select(&EntityId::new("not-on-page")));
    assert_eq!(store.selection_text(), "2 of 30 selected");

    store.load().await.unwrap();
    assert!(store.selection().is_empty());
    assert_eq!(store.selection_text(), "30 files");
    let events = drain(&rx);
    assert!(matches!(events.last(), Some(ExplorerEvent::Loaded { items: 25, total_count: 30, page_number: 1 })));
}

#[tokio::test]
async fn query_changes_reset_to_first_page() {
    let api = Arc::new(MockBackend::seeded(60));
    let (mut store, _rx) = store_with(api.clone(), StoreConfig::default());
    store.load().await.unwrap();

    assert!(store.go_to(PageNav::Next).await.unwrap());
    assert_eq!(last_list(&api).page_number, 2);

    store.set_search("file").await.unwrap();
    let q = last_list(&api);
    assert_eq!((q.page_number, q.search_term.as_str()), (1, "file"));

    // page-only changes keep everything else
    assert!(store.go_to(PageNav::Last).await.unwrap());
    let q = last_list(&api);
    assert_eq!((q.page_number, q.search_term.as_str()), (3, "file"));

    store.set_sort(SortKey::Title, SortDirection::Asc).await.unwrap();
    let q = last_list(&api);
    assert_eq!((q.page_number, q.sort_by, q.sort_direction), (1, SortKey::Title, SortDirection::Asc));

    store.go_to(PageNav::To(2)).await.unwrap();
    store.set_page_size(50).await.unwrap();
    let q = last_list(&api);
    assert_eq!((q.page_number, q.page_size, q.sort_by), (1, 50, SortKey::Title));

    store.go_to(PageNav::Next).await.unwrap();
    store.set_filters(Filters::new()).await.unwrap();
    assert_eq!(last_list(&api).page_number, 1);

    store.go_to(PageNav::Next).await.unwrap();
    store.toggle_sort_direction().await.unwrap();
    let q = last_list(&api);
    assert_eq!((q.page_number, q.sort_direction), (1, SortDirection::Desc));
}

#[tokio::test]
async fn navigation_at_the_edges_does_not_load() {
    let api = Arc::new(MockBackend::seeded(10));
    let (mut store, _rx) = store_with(api.clone(), StoreConfig::default());
    store.load().await.unwrap();
    assert!(!store.go_to(PageNav::Previous).await.unwrap());
    assert!(!store.go_to(PageNav::Next).await.unwrap());
    assert!(!store.go_to(PageNav::To(4)).await.unwrap());
    assert_eq!(api.calls_of(CallKind::List).len(), 1);
}

#[tokio::test]
async fn unsupported_page_size_is_refused() {
    let api = Arc::new(MockBackend::seeded(3));
    let (mut store, _rx) = store_with(api.clone(), StoreConfig::default());
    let err = store.set_page_size(30).await.unwrap_err();
    assert!(matches!(err, StoreError::Core(_)));
    assert!(api.calls().is_empty());
    assert_eq!(store.query().page_size, 25);
}

#[tokio::test]
async fn inactive_filters_never_reach_the_backend() {
    let api = Arc::new(MockBackend::seeded(4));
    let (mut store, _rx) = store_with(api.clone(), StoreConfig::default());
    let mut f = Filters::new();
    f.insert(keys::FILE_TYPE.into(), "pdf".into());
    f.insert(keys::MIN_SIZE.into(), FilterValue::Null);
    f.insert(keys::INACTIVE_OWNERS.into(), false.into());
    store.set_filters(f).await.unwrap();

    let mut expected = Filters::new();
    expected.insert(keys::FILE_TYPE.into(), FilterValue::Text("pdf".into()));
    assert_eq!(last_list(&api).filters, expected);
    assert_eq!(store.page().total_count, 4);
}

#[tokio::test]
async fn filter_form_applies_search_and_active_filters() {
    let api = Arc::new(MockBackend::seeded(12));
    let (mut store, _rx) = store_with(api.clone(), StoreConfig::default());
    let mut form = filex_core::FilterForm { search_term: "file-1".into(), ..Default::default() };
    form.set(keys::MAX_SIZE, "5").unwrap();
    store.apply_filter_form(&form).await.unwrap();
    let q = last_list(&api);
    assert_eq!(q.search_term, "file-1");
    assert_eq!(q.filters.len(), 1);
    // file-1 (1 KB) only; file-10..12 are over 5 KB
    assert_eq!(store.page().total_count, 1);

    store.clear_filters().await.unwrap();
    let q = last_list(&api);
    assert!(q.search_term.is_empty() && q.filters.is_empty());
    assert_eq!(store.page().empty_message(), "No files found in the organization.");
}

#[tokio::test]
async fn failed_load_empties_the_page() {
    let api = Arc::new(MockBackend::seeded(5).fail_nth(CallKind::List, 2, BackendError::rejected("query timeout")));
    let (mut store, rx) = store_with(api.clone(), StoreConfig::default());
    store.load().await.unwrap();
    store.select_all();
    let err = store.load().await.unwrap_err();
    assert_eq!(err, StoreError::Backend(BackendError::rejected("query timeout")));

    let page = store.page();
    assert!(page.items.is_empty());
    assert_eq!(page.total_count, 0);
    assert_eq!(page.window().info(), "No records to display");
    assert!(store.selection().is_empty());
    assert_eq!(store.last_error(), Some("query timeout"));
    let events = drain(&rx);
    let ns = notices(&events);
    assert_eq!(ns.len(), 1);
    assert_eq!((ns[0].kind, ns[0].message.as_str()), (NoticeKind::Error, "query timeout"));

    store.load().await.unwrap();
    assert_eq!(store.last_error(), None);
}

#[tokio::test]
async fn backend_page_number_is_adopted() {
    let api = Arc::new(MockBackend::seeded(30));
    let (mut store, _rx) = store_with(api.clone(), StoreConfig::default());
    store.load().await.unwrap();
    store.go_to(PageNav::Last).await.unwrap();
    assert_eq!(store.page().items.len(), 5);

    store.select_all();
    store.request_bulk(BulkAction::Delete).await.unwrap();
    // page 2 no longer exists; the backend answers with page 1
    assert_eq!(last_list(&api).page_number, 2);
    assert_eq!(store.query().page_number, 1);
    assert_eq!(store.page().total_count, 25);
}

#[tokio::test]
async fn bulk_delete_confirms_runs_and_reloads() {
    let api = Arc::new(MockBackend::seeded(12));
    let (mut store, rx) = store_with(api.clone(), StoreConfig::default());
    store.load().await.unwrap();
    store.select_all();
    assert!(store.all_selected());

    let report = store.request_bulk(BulkAction::Delete).await.unwrap().unwrap();
    assert_eq!((report.processed, report.total), (12, 12));
    let sizes: Vec<usize> = api.calls_of(CallKind::Delete).iter().map(|c| c.ids().len()).collect();
    assert_eq!(sizes, vec![10, 2]);

    assert!(store.selection().is_empty());
    assert_eq!(store.page().total_count, 0);
    let events = drain(&rx);
    let ns = notices(&events);
    assert_eq!(ns[0].kind, NoticeKind::Info);
    assert_eq!(ns[0].message, "Are you sure you want to delete 12 file(s)?");
    assert_eq!(ns[1].message, "12 file(s) deleted successfully");
    assert!(events.iter().any(|e| matches!(e, ExplorerEvent::BulkActionRequested { action: BulkAction::Delete, count: 12 })));
}

#[tokio::test]
async fn bulk_request_needs_a_selection() {
    let api = Arc::new(MockBackend::seeded(3));
    let (mut store, rx) = store_with(api.clone(), StoreConfig::default());
    store.load().await.unwrap();
    let err = store.request_bulk(BulkAction::Share).await.unwrap_err();
    assert_eq!(err, StoreError::Ops(OpsError::Validation(MSG_SELECT_AT_LEAST_ONE.into())));
    assert!(store.modal().is_none());
    let events = drain(&rx);
    assert_eq!(notices(&events)[0].kind, NoticeKind::Warning);
}

#[tokio::test]
async fn bulk_share_modal_works_on_a_snapshot() {
    let api = Arc::new(MockBackend::seeded(3).with_users(ada()));
    let (mut store, rx) = store_with(api.clone(), StoreConfig::default());
    store.load().await.unwrap();
    store.select_all();
    assert_eq!(store.request_bulk(BulkAction::Share).await.unwrap(), None);
    let snapshot = store.selected_ids();

    // later selection edits do not reach the open modal
    store.deselect(&snapshot[0]);
    assert_eq!(store.modal(), Some(&ModalKind::BulkShare { file_ids: snapshot.clone() }));

    let err = store.confirm_modal(None).await.unwrap_err();
    assert_eq!(err, StoreError::Ops(OpsError::Validation("Please select a user to share with".into())));
    assert!(store.modal().is_some());
    assert_eq!(store.selection().len(), 2);
    assert!(api.calls_of(CallKind::ShareBulk).is_empty());

    let report = store.confirm_modal(Some("005A".into())).await.unwrap();
    assert_eq!(report.processed, 3);
    assert!(store.modal().is_none());
    assert!(store.selection().is_empty());
    assert_eq!(api.calls_of(CallKind::ShareBulk)[0].ids(), snapshot);
    let events = drain(&rx);
    assert!(notices(&events).iter().any(|n| n.message == "Successfully shared 3 files with the selected user"));
}

#[tokio::test]
async fn failed_bulk_reassign_keeps_modal_and_reloads() {
    let api = Arc::new(MockBackend::seeded(15).fail_nth(CallKind::ReassignBulk, 2, BackendError::rejected("cannot transfer")));
    let (mut store, rx) = store_with(api.clone(), StoreConfig::default());
    store.load().await.unwrap();
    store.select_all();
    store.request_bulk(BulkAction::ReassignOwner).await.unwrap();
    assert!(matches!(store.modal(), Some(ModalKind::Ownership { file: None, .. })));

    let err = store.confirm_modal(Some("005B".into())).await.unwrap_err();
    assert!(matches!(err, StoreError::Ops(OpsError::Remote { processed: 10, total: 15, .. })));
    assert!(matches!(store.modal(), Some(ModalKind::Ownership { .. })));
    assert!(store.selection().is_empty());
    assert_eq!(api.calls_of(CallKind::List).len(), 2);
    let moved = store.page().items.iter().filter(|f| f.owner_id.as_deref() == Some("005B")).count();
    assert_eq!(moved, 10);
    let events = drain(&rx);
    assert!(notices(&events).iter().any(|n| n.kind == NoticeKind::Error && n.message == "cannot transfer"));
}

#[tokio::test]
async fn row_share_uses_the_single_item_call() {
    let api = Arc::new(MockBackend::seeded(2).with_users(ada()));
    let (mut store, _rx) = store_with(api.clone(), StoreConfig::default());
    store.load().await.unwrap();
    let id = store.page().items[0].content_document_id.clone();
    store.open_share(&id);
    assert!(matches!(store.modal(), Some(ModalKind::Share { file_name, .. }) if file_name.starts_with("file-")));

    let report = store.confirm_modal(Some("005A".into())).await.unwrap();
    assert!(report.single);
    assert_eq!(report.message, "File shared successfully");
    assert_eq!(api.calls_of(CallKind::Share).len(), 1);
    assert!(api.calls_of(CallKind::ShareBulk).is_empty());
}

#[tokio::test]
async fn row_ownership_resolves_name_and_owner() {
    let mut f = FileRecord::new("069X", "contract.docx");
    f.current_owner = Some("Ada".into());
    let api = Arc::new(MockBackend::new().with_files(vec![f]).with_users(ada()));
    let (mut store, _rx) = store_with(api.clone(), StoreConfig::default());
    store.load().await.unwrap();
    store.open_ownership(&"069X".into());
    assert_eq!(
        store.modal(),
        Some(&ModalKind::Ownership { file: Some(("069X".into(), "contract.docx".into())), current_owner: "Ada".into(), file_ids: vec!["069X".into()] })
    );
    let report = store.confirm_modal(Some("005B".into())).await.unwrap();
    assert_eq!(report.message, "Successfully transferred ownership of \"contract.docx\"");
    assert_eq!(store.page().items[0].current_owner.as_deref(), Some("Grace"));

    store.open_share(&"gone".into());
    assert!(matches!(store.modal(), Some(ModalKind::Share { file_name, .. }) if file_name == UNKNOWN_FILE));
}

#[tokio::test]
async fn closing_modals() {
    let api = Arc::new(MockBackend::seeded(3));
    let (mut store, _rx) = store_with(api.clone(), StoreConfig::default());
    store.load().await.unwrap();
    let id = store.page().items[0].content_document_id.clone();

    let url = store.open_preview(&id).unwrap();
    assert!(url.contains("versionId=068"));
    store.close_modal().await.unwrap();
    assert!(store.modal().is_none());
    assert_eq!(api.calls_of(CallKind::List).len(), 1);

    store.select_all();
    store.request_bulk(BulkAction::Share).await.unwrap();
    store.close_modal().await.unwrap();
    assert!(store.modal().is_none());
    assert!(store.selection().is_empty());
    assert_eq!(api.calls_of(CallKind::List).len(), 2);

    assert_eq!(store.confirm_modal(Some("005A".into())).await.unwrap_err(), StoreError::NothingToConfirm);
}

#[tokio::test]
async fn connections_are_labelled_and_classified() {
    let conns = vec![
        Connection {
            linked_entity_id: "001A".into(),
            entity_name: "Acme".into(),
            entity_type: Some("Account".into()),
            share_type: ShareType::Inferred,
            visibility: Some("AllUsers".into()),
            url: Some("/lightning/r/Account/001A/view".into()),
        },
        Connection {
            linked_entity_id: "005A".into(),
            entity_name: "Ada".into(),
            entity_type: Some("User".into()),
            share_type: ShareType::Collaborator,
            visibility: None,
            url: Some("https://partner.example.org/u/005A".into()),
        },
    ];
    let api = Arc::new(MockBackend::seeded(1).with_connections("069000000000001", conns));
    let cfg = StoreConfig { host: "acme.my.salesforce.com".into(), ..StoreConfig::default() };
    let (mut store, rx) = store_with(api.clone(), cfg);
    store.load().await.unwrap();
    let id = EntityId::new("069000000000001");
    store.open_connections(&id);
    let views = store.connections(&id).await.unwrap();
    assert_eq!(views.iter().map(|v| v.share_label.as_str()).collect::<Vec<_>>(), vec!["Inferred", "Collaborator"]);
    assert_eq!(views[0].link, Some(LinkTarget::Internal));
    assert_eq!(views[1].link, Some(LinkTarget::External));
    let events = drain(&rx);
    assert!(events.iter().any(|e| matches!(e, ExplorerEvent::ConnectionsRequested { file_name, .. } if file_name == "file-1.pdf")));
}

#[tokio::test]
async fn option_lists_carry_placeholders() {
    let api = Arc::new(
        MockBackend::new()
            .with_users(ada())
            .with_file_types(vec![PicklistOption::new("PDF", "PDF")])
            .with_file_owners(vec![PicklistOption::new("Ada", "005A")]),
    );
    let (store, _rx) = store_with(api.clone(), StoreConfig::default());
    let types = store.file_type_options().await.unwrap();
    assert_eq!(types[0], PicklistOption::new("All Types", ""));
    assert_eq!(types[1].value, "PDF");
    assert_eq!(store.owner_options().await.unwrap()[0].label, "All Owners");
    let users = store.user_options().await.unwrap();
    assert_eq!(users.len(), 3);
    assert_eq!(users[0].label, "Select a user...");
}

#[tokio::test]
async fn lookup_failure_raises_error_notice() {
    let api = Arc::new(MockBackend::new().fail_nth(CallKind::Users, 1, BackendError::rejected("no access")));
    let (store, rx) = store_with(api.clone(), StoreConfig::default());
    assert!(store.user_options().await.is_err());
    let events = drain(&rx);
    assert_eq!(notices(&events)[0].message, "no access");
}

#[tokio::test]
async fn orphaned_only_store_narrows_every_listing() {
    let api = Arc::new(MockBackend::seeded(12));
    let cfg = StoreConfig { show_orphaned_only: true, ..StoreConfig::default() };
    let (mut store, _rx) = store_with(api.clone(), cfg);
    store.load().await.unwrap();
    assert_eq!(last_list(&api).filters.get(keys::SHOW_ORPHANED), Some(&FilterValue::Flag(true)));
    assert_eq!(store.page().total_count, 3);

    store.set_filters(Filters::new()).await.unwrap();
    assert_eq!(last_list(&api).filters.get(keys::SHOW_ORPHANED), Some(&FilterValue::Flag(true)));
}

#[tokio::test]
async fn download_urls_skip_files_without_links() {
    let mut a = FileRecord::new("069A", "a.pdf");
    a.download_url = Some("/sfc/servlet.shepherd/document/download/069A".into());
    let b = FileRecord::new("069B", "b.pdf");
    let mut c = FileRecord::new("069C", "c.pdf");
    c.download_url = Some("/sfc/servlet.shepherd/document/download/069C".into());
    let api = Arc::new(MockBackend::new().with_files(vec![a, b, c]));
    let (mut store, _rx) = store_with(api.clone(), StoreConfig::default());
    store.load().await.unwrap();
    store.select(&"069A".into());
    store.select(&"069B".into());
    assert_eq!(store.bulk_download_urls(), vec!["/sfc/servlet.shepherd/document/download/069A".to_string()]);
}

#[tokio::test]
async fn handle_sees_each_published_page() {
    let api = Arc::new(MockBackend::seeded(2));
    let (mut store, _rx) = store_with(api.clone(), StoreConfig::default());
    let handle = store.handle();
    let epoch = handle.subscribe_epoch();
    assert_eq!(*epoch.borrow(), 0);
    store.load().await.unwrap();
    store.load().await.unwrap();
    assert_eq!(*epoch.borrow(), 2);
    assert_eq!(handle.current().items.len(), 2);
}

#[tokio::test]
async fn unusable_chunk_size_rejects_bulk_delete_before_it_starts() {
    let api = Arc::new(MockBackend::seeded(5));
    let (sink, rx) = EventSink::channel();
    let mut store =
        ExplorerStore::new(api.clone(), OpsConfig { chunk_size: 0, pace: Duration::ZERO }, StoreConfig::default(), sink);
    store.load().await.unwrap();
    store.select_all();
    drain(&rx);

    let err = store.request_bulk(BulkAction::Delete).await.unwrap_err();
    assert!(matches!(err, StoreError::Ops(OpsError::Validation(_))));
    assert!(api.calls_of(CallKind::Delete).is_empty());
    assert_eq!(api.calls_of(CallKind::List).len(), 1);
    assert_eq!(store.selection().len(), 5);
    assert!(!store.is_loading());

    let events = drain(&rx);
    assert!(!events.iter().any(|e| matches!(e, ExplorerEvent::OperationSettled { .. } | ExplorerEvent::OperationProgress(_))));
    assert_eq!(notices(&events).last().map(|n| n.kind), Some(NoticeKind::Warning));
}

#[tokio::test]
async fn failed_reload_after_a_job_keeps_the_job_result() {
    let api = Arc::new(MockBackend::seeded(3).fail_nth(CallKind::List, 2, BackendError::Transport("reset".into())));
    let (mut store, rx) = store_with(api.clone(), StoreConfig::default());
    store.load().await.unwrap();
    store.select_all();

    let report = store.request_bulk(BulkAction::Delete).await.unwrap().unwrap();
    assert_eq!(report.processed, 3);
    assert!(store.selection().is_empty());
    assert_eq!(store.last_error(), Some(filex_api::GENERIC_ERROR_MESSAGE));
    let events = drain(&rx);
    let ns = notices(&events);
    assert_eq!(ns.last().map(|n| n.kind), Some(NoticeKind::Error));
}
