use std::sync::atomic::{AtomicBool, AtomicU16, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use pricelist_catalog::{FilterLayer, SelectionTracker, VisibilityPolicy};
use pricelist_client::storage::{self, CART_KEY};
use pricelist_client::{
    ApiError, ApiUrl, CatalogApi, CatalogSession, DirectorySink, DownloadSink, ExportCoordinator,
    ExportError, ExportFormat, HealthMonitor, LocalStorage, Notifier, ProbeState, ProductStore,
};
use pricelist_core::ProductId;
use serde_json::json;

/// Scriptable stand-in for the catalog backend.
#[derive(Default)]
struct Backend {
    products: Mutex<serde_json::Value>,
    products_status: AtomicU16,
    malformed: AtomicBool,
    export_status: AtomicU16,
    export_delay_ms: AtomicU64,
    product_hits: AtomicUsize,
    export_hits: AtomicUsize,
    last_export: Mutex<Option<(String, Vec<i64>)>>,
}

impl Backend {
    fn with_products(products: serde_json::Value) -> Arc<Self> {
        let backend = Self::default();
        *backend.products.lock().unwrap() = products;
        Arc::new(backend)
    }
}

async fn list_products(State(backend): State<Arc<Backend>>) -> Response {
    backend.product_hits.fetch_add(1, Ordering::SeqCst);
    let status = backend.products_status.load(Ordering::SeqCst);
    if status != 0 {
        return StatusCode::from_u16(status).unwrap().into_response();
    }
    if backend.malformed.load(Ordering::SeqCst) {
        return (StatusCode::OK, "<html>maintenance</html>").into_response();
    }
    let products = backend.products.lock().unwrap().clone();
    Json(products).into_response()
}

async fn export_gate(backend: &Backend) -> Option<Response> {
    backend.export_hits.fetch_add(1, Ordering::SeqCst);
    let delay = backend.export_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }
    let status = backend.export_status.load(Ordering::SeqCst);
    (status != 0).then(|| StatusCode::from_u16(status).unwrap().into_response())
}

async fn export_all(State(backend): State<Arc<Backend>>, Path(format): Path<String>) -> Response {
    if let Some(failure) = export_gate(&backend).await {
        return failure;
    }
    format!("{format}:all").into_bytes().into_response()
}

async fn export_selected(
    State(backend): State<Arc<Backend>>,
    Path(format): Path<String>,
    Json(ids): Json<Vec<i64>>,
) -> Response {
    if let Some(failure) = export_gate(&backend).await {
        return failure;
    }
    let body = format!("{format}:{ids:?}").into_bytes();
    *backend.last_export.lock().unwrap() = Some((format, ids));
    body.into_response()
}

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn(backend: Arc<Backend>) -> Self {
        let app = Router::new()
            .route("/products", get(list_products))
            .route("/export/:format", get(export_all).post(export_selected))
            .with_state(backend);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }

    fn api(&self) -> CatalogApi {
        CatalogApi::new(ApiUrl::new(self.base_url.as_str()))
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[derive(Default)]
struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }
}

fn sample_catalog() -> serde_json::Value {
    json!([
        { "id": 1, "title": "Drill", "brand": "Bosch", "category_name": "Tools",
          "price_uah": "1 200,50", "price_usd": "30", "stock": 4 },
        { "id": 2, "title": "Saw", "brand": "Makita", "category_name": "Tools",
          "price_uah": 900, "price_usd": 22.5, "stock": "2" },
        { "id": 3, "title": "Blade", "brand": "Bosch", "category_name": "Parts",
          "price_uah": "150", "price_usd": "4", "stock": 10 }
    ])
}

fn coordinator(
    srv: &TestServer,
    dir: &tempfile::TempDir,
) -> (ExportCoordinator, Arc<RecordingNotifier>) {
    let notifier = Arc::new(RecordingNotifier::default());
    let coordinator = ExportCoordinator::new(
        srv.api(),
        Arc::new(DirectorySink::new(dir.path())),
        notifier.clone(),
    );
    (coordinator, notifier)
}

fn selection(ids: &[i64]) -> SelectionTracker {
    let mut selection = SelectionTracker::new();
    for id in ids {
        selection.toggle(ProductId::new(*id));
    }
    selection
}

#[tokio::test]
async fn load_replaces_catalog_and_coerces_numbers() {
    let backend = Backend::with_products(sample_catalog());
    let srv = TestServer::spawn(backend.clone()).await;
    let api = srv.api();

    let mut store = ProductStore::new(VisibilityPolicy::permissive());
    assert_eq!(store.load(&api).await.unwrap(), 3);

    let drill = store.get(ProductId::new(1)).unwrap();
    assert_eq!(drill.price_uah.value(), Some(1200.5));
    assert_eq!(drill.price_uah.text(), "1 200,50");
    assert_eq!(store.get(ProductId::new(2)).unwrap().stock.value(), Some(2.0));

    *backend.products.lock().unwrap() = json!([{ "id": 7, "stock": 1 }]);
    assert_eq!(store.load(&api).await.unwrap(), 1);
    assert!(!store.contains(ProductId::new(1)));
    assert_eq!(store.generation(), 2);
}

#[tokio::test]
async fn failed_load_keeps_previous_snapshot() {
    let backend = Backend::with_products(sample_catalog());
    let srv = TestServer::spawn(backend.clone()).await;
    let api = srv.api();

    let mut store = ProductStore::new(VisibilityPolicy::permissive());
    store.load(&api).await.unwrap();

    backend.products_status.store(503, Ordering::SeqCst);
    let err = store.load(&api).await.unwrap_err();
    assert_eq!(err.http_status(), Some(503));
    assert!(err.to_string().contains("503"));
    assert_eq!(store.len(), 3);
    assert_eq!(store.error(), Some(&err));

    backend.products_status.store(0, Ordering::SeqCst);
    store.load(&api).await.unwrap();
    assert!(store.error().is_none());
}

#[tokio::test]
async fn malformed_listing_is_a_decode_error() {
    let backend = Backend::with_products(sample_catalog());
    backend.malformed.store(true, Ordering::SeqCst);
    let srv = TestServer::spawn(backend).await;

    let mut store = ProductStore::new(VisibilityPolicy::permissive());
    let err = store.load(&srv.api()).await.unwrap_err();
    assert!(matches!(err, ApiError::Decode(_)));
    assert!(store.is_empty());
    assert!(!store.is_loaded());
}

#[tokio::test]
async fn store_layer_drops_invisible_and_duplicate_products() {
    let backend = Backend::with_products(json!([
        { "id": 1, "price_uah": "10", "price_usd": "1", "stock": 1 },
        { "id": 1, "title": "duplicate", "price_uah": "10", "price_usd": "1", "stock": 1 },
        { "id": 2, "price_uah": "10", "price_usd": "1", "stock": 0 },
        { "id": 3, "price_uah": "n/a", "price_usd": "1", "stock": 5 }
    ]));
    let srv = TestServer::spawn(backend).await;

    let mut store = ProductStore::new(VisibilityPolicy::default().at(FilterLayer::Store));
    assert_eq!(store.load(&srv.api()).await.unwrap(), 1);
    assert_eq!(store.products()[0].title, None);
}

#[tokio::test]
async fn export_all_delivers_spreadsheet() {
    let backend = Backend::with_products(sample_catalog());
    let srv = TestServer::spawn(backend.clone()).await;
    let dir = tempfile::tempdir().unwrap();
    let (coordinator, notifier) = coordinator(&srv, &dir);

    let delivered = coordinator.export_all().await.unwrap();
    assert_eq!(delivered.file_name, "products.xlsx");
    assert_eq!(
        delivered.content_type,
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
    );
    assert_eq!(std::fs::read(dir.path().join("products.xlsx")).unwrap(), b"xlsx:all");
    assert_eq!(delivered.bytes, 8);
    assert_eq!(backend.export_hits.load(Ordering::SeqCst), 1);
    assert!(!coordinator.is_busy());
    assert!(notifier.messages().is_empty());
}

#[tokio::test]
async fn export_selected_posts_ids_in_selection_order() {
    let backend = Backend::with_products(sample_catalog());
    let srv = TestServer::spawn(backend.clone()).await;
    let dir = tempfile::tempdir().unwrap();
    let (coordinator, _) = coordinator(&srv, &dir);

    let delivered = coordinator
        .export_selected(ExportFormat::Xml, &selection(&[5, 2, 9]))
        .await
        .unwrap();

    assert_eq!(delivered.file_name, "products.xml");
    assert_eq!(delivered.content_type, "application/xml");
    assert!(dir.path().join("products.xml").exists());
    assert_eq!(
        backend.last_export.lock().unwrap().clone(),
        Some(("xml".to_string(), vec![5, 2, 9]))
    );
}

/// Sink that blocks until the test releases it.
struct GatedSink {
    dir: std::path::PathBuf,
    release: Mutex<std::sync::mpsc::Receiver<()>>,
}

impl DownloadSink for GatedSink {
    fn deliver(&self, file_name: &str, payload: &[u8]) -> anyhow::Result<std::path::PathBuf> {
        self.release
            .lock()
            .unwrap()
            .recv_timeout(Duration::from_secs(2))?;
        DirectorySink::new(&self.dir).deliver(file_name, payload)
    }
}

#[tokio::test]
async fn delivery_does_not_block_the_runtime() {
    let backend = Backend::with_products(sample_catalog());
    let srv = TestServer::spawn(backend).await;
    let dir = tempfile::tempdir().unwrap();
    let (tx, rx) = std::sync::mpsc::channel();
    let coordinator = ExportCoordinator::new(
        srv.api(),
        Arc::new(GatedSink {
            dir: dir.path().to_path_buf(),
            release: Mutex::new(rx),
        }),
        Arc::new(RecordingNotifier::default()),
    );

    // On a single-threaded runtime the release below can only run while the
    // sink waits off the runtime thread.
    let (delivered, _) = tokio::join!(coordinator.export_all(), async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        tx.send(()).unwrap();
    });

    let delivered = delivered.unwrap();
    assert_eq!(std::fs::read(&delivered.path).unwrap(), b"xlsx:all");
}

#[tokio::test]
async fn export_default_follows_selection() {
    let backend = Backend::with_products(sample_catalog());
    let srv = TestServer::spawn(backend.clone()).await;
    let dir = tempfile::tempdir().unwrap();
    let (coordinator, _) = coordinator(&srv, &dir);

    coordinator.export_default(&selection(&[])).await.unwrap();
    assert!(backend.last_export.lock().unwrap().is_none());

    coordinator.export_default(&selection(&[3])).await.unwrap();
    assert_eq!(
        backend.last_export.lock().unwrap().clone(),
        Some(("xlsx".to_string(), vec![3]))
    );
}

#[tokio::test]
async fn empty_selection_is_rejected_without_a_request() {
    let backend = Backend::with_products(sample_catalog());
    let srv = TestServer::spawn(backend.clone()).await;
    let dir = tempfile::tempdir().unwrap();
    let (coordinator, notifier) = coordinator(&srv, &dir);

    let err = coordinator
        .export_selected(ExportFormat::Spreadsheet, &SelectionTracker::new())
        .await
        .unwrap_err();

    assert!(matches!(err, ExportError::Validation(_)));
    assert_eq!(backend.export_hits.load(Ordering::SeqCst), 0);
    assert_eq!(notifier.messages().len(), 1);
    assert!(!coordinator.is_busy());
}

#[tokio::test]
async fn second_export_while_busy_is_rejected() {
    let backend = Backend::with_products(sample_catalog());
    backend.export_delay_ms.store(300, Ordering::SeqCst);
    let srv = TestServer::spawn(backend.clone()).await;
    let dir = tempfile::tempdir().unwrap();
    let (coordinator, notifier) = coordinator(&srv, &dir);

    let (first, second) = tokio::join!(coordinator.export_all(), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(coordinator.is_busy());
        coordinator.export_selected(ExportFormat::Xml, &selection(&[1])).await
    });

    assert!(first.is_ok());
    assert!(matches!(second, Err(ExportError::Busy)));
    assert_eq!(backend.export_hits.load(Ordering::SeqCst), 1);
    assert!(notifier.messages().is_empty());
    assert!(!coordinator.is_busy());
}

#[tokio::test]
async fn failed_export_notifies_and_releases_the_gate() {
    let backend = Backend::with_products(sample_catalog());
    backend.export_status.store(500, Ordering::SeqCst);
    let srv = TestServer::spawn(backend.clone()).await;
    let dir = tempfile::tempdir().unwrap();
    let (coordinator, notifier) = coordinator(&srv, &dir);

    let err = coordinator.export_all().await.unwrap_err();
    match &err {
        ExportError::Api(api) => assert_eq!(api.http_status(), Some(500)),
        other => panic!("unexpected error: {other:?}"),
    }
    let messages = notifier.messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("500"));
    assert!(!coordinator.is_busy());
    assert!(!dir.path().join("products.xlsx").exists());

    backend.export_status.store(0, Ordering::SeqCst);
    coordinator.export_all().await.unwrap();
}

#[tokio::test]
async fn cancelled_export_releases_the_gate() {
    let backend = Backend::with_products(sample_catalog());
    backend.export_delay_ms.store(500, Ordering::SeqCst);
    let srv = TestServer::spawn(backend.clone()).await;
    let dir = tempfile::tempdir().unwrap();
    let (coordinator, _) = coordinator(&srv, &dir);

    let outcome =
        tokio::time::timeout(Duration::from_millis(50), coordinator.export_all()).await;
    assert!(outcome.is_err());
    assert!(!coordinator.is_busy());
    assert!(coordinator.in_flight().is_none());
}

#[tokio::test]
async fn health_monitor_reports_item_count() {
    let backend = Backend::with_products(sample_catalog());
    let srv = TestServer::spawn(backend).await;

    let handle = HealthMonitor::new(srv.api(), Duration::from_secs(3600)).activate();
    let mut rx = handle.subscribe();
    let probe = tokio::time::timeout(
        Duration::from_secs(5),
        rx.wait_for(|probe| probe.state.is_connected()),
    )
    .await
    .unwrap()
    .unwrap()
    .clone();

    match probe.state {
        ProbeState::Connected { item_count, .. } => assert_eq!(item_count, 3),
        other => panic!("unexpected state: {other:?}"),
    }
    assert_eq!(probe.cycle, 1);
    assert!(handle.is_active());
    handle.shutdown().await;
}

#[tokio::test]
async fn health_monitor_reports_http_status_on_failure() {
    let backend = Backend::with_products(sample_catalog());
    backend.products_status.store(503, Ordering::SeqCst);
    let srv = TestServer::spawn(backend).await;

    let handle = HealthMonitor::new(srv.api(), Duration::from_secs(3600)).activate();
    let mut rx = handle.subscribe();
    let probe = tokio::time::timeout(
        Duration::from_secs(5),
        rx.wait_for(|probe| matches!(probe.state, ProbeState::Failed { .. })),
    )
    .await
    .unwrap()
    .unwrap()
    .clone();

    match probe.state {
        ProbeState::Failed { message } => assert!(message.contains("503")),
        other => panic!("unexpected state: {other:?}"),
    }
    handle.shutdown().await;
}

#[tokio::test]
async fn health_monitor_stops_probing_after_shutdown() {
    let backend = Backend::with_products(sample_catalog());
    let srv = TestServer::spawn(backend.clone()).await;

    let handle = HealthMonitor::new(srv.api(), Duration::from_millis(20)).activate();
    let mut rx = handle.subscribe();
    tokio::time::timeout(
        Duration::from_secs(5),
        rx.wait_for(|probe| probe.cycle >= 3 && probe.state.is_connected()),
    )
    .await
    .unwrap()
    .unwrap();

    handle.shutdown().await;
    // Let a request already on the wire reach the handler.
    tokio::time::sleep(Duration::from_millis(50)).await;
    let hits = backend.product_hits.load(Ordering::SeqCst);
    let last = rx.borrow().clone();

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(backend.product_hits.load(Ordering::SeqCst), hits);
    assert_eq!(rx.borrow().cycle, last.cycle);
}

#[tokio::test]
async fn session_restores_saved_cart_and_persists_changes() {
    let backend = Backend::with_products(sample_catalog());
    let srv = TestServer::spawn(backend).await;
    let dir = tempfile::tempdir().unwrap();
    let storage = LocalStorage::open(dir.path().join("storage.json"));
    storage.set_item(CART_KEY, "[2, 99]").unwrap();

    let mut session = CatalogSession::new(srv.api(), VisibilityPolicy::default())
        .with_storage(storage.clone());
    assert_eq!(
        session.selection().ids(),
        &[ProductId::new(2), ProductId::new(99)]
    );

    session.load().await.unwrap();
    assert_eq!(session.selection().ids(), &[ProductId::new(2)]);
    assert_eq!(storage::load_cart(&storage), vec![ProductId::new(2)]);

    session.toggle(ProductId::new(3));
    assert_eq!(
        storage::load_cart(&storage),
        vec![ProductId::new(2), ProductId::new(3)]
    );

    session.set_brand_filter("Bosch");
    let checked: Vec<i64> = session
        .rows()
        .iter()
        .filter(|row| row.checked)
        .map(|row| row.product.id.get())
        .collect();
    assert_eq!(checked, vec![3]);
    assert_eq!(session.selection().len(), 2);
}

#[tokio::test]
async fn saved_cart_is_kept_while_the_backend_is_down() {
    let backend = Backend::with_products(sample_catalog());
    backend.products_status.store(503, Ordering::SeqCst);
    let srv = TestServer::spawn(backend.clone()).await;
    let dir = tempfile::tempdir().unwrap();
    let storage = LocalStorage::open(dir.path().join("storage.json"));
    storage::save_cart(&storage, &[ProductId::new(2), ProductId::new(7)]).unwrap();

    let mut session = CatalogSession::new(srv.api(), VisibilityPolicy::permissive())
        .with_storage(storage.clone());
    assert!(session.load().await.is_err());

    session.toggle(ProductId::new(3));
    assert_eq!(
        storage::load_cart(&storage),
        vec![ProductId::new(2), ProductId::new(7), ProductId::new(3)]
    );

    backend.products_status.store(0, Ordering::SeqCst);
    session.load().await.unwrap();
    assert_eq!(
        session.selection().ids(),
        &[ProductId::new(2), ProductId::new(3)]
    );
    assert_eq!(
        storage::load_cart(&storage),
        vec![ProductId::new(2), ProductId::new(3)]
    );
}

#[tokio::test]
async fn unreachable_or_relative_backend_is_a_network_error() {
    let api = CatalogApi::new(ApiUrl::new("http://127.0.0.1:9"));
    let err = api.list_products().await.unwrap_err();
    assert!(matches!(err, ApiError::Network { status: None, .. }));

    let api = CatalogApi::new(ApiUrl::default());
    let err = api.list_products().await.unwrap_err();
    assert!(matches!(err, ApiError::Network { status: None, .. }));
}
