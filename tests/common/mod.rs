#![allow(dead_code)]

use std::collections::VecDeque;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::Router;
use reqwest::Client;
use serde_json::{json, Value};
use tempfile::TempDir;

use syncqueue::connectivity::Connectivity;
use syncqueue::error::QueueError;
use syncqueue::models::{EntryUpdate, HttpMethod, QueueCounts, QueueEntry, QueueStatus};
use syncqueue::state::SharedState;
use syncqueue::store::{QueueStore, SqliteStore};
use syncqueue::sync::{RetryPolicy, SyncCallbacks};
use syncqueue::transport::{RequestFailed, Transport};

// ── Store ───────────────────────────────────────────────────────

/// A SQLite store in a temporary directory that lives as long as this value.
pub struct TestStore {
    pub store: SqliteStore,
    pub dir: TempDir,
}

impl TestStore {
    pub fn url(&self) -> String {
        db_url(&self.dir)
    }

    /// Close the pool and open the same database file again.
    pub async fn reopen(self) -> TestStore {
        self.store.close().await;
        let store = SqliteStore::connect(&db_url(&self.dir))
            .await
            .expect("Failed to reopen queue database");
        TestStore {
            store,
            dir: self.dir,
        }
    }
}

fn db_url(dir: &TempDir) -> String {
    format!("sqlite://{}", dir.path().join("queue.db").display())
}

pub async fn open_store() -> TestStore {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let store = SqliteStore::connect(&db_url(&dir))
        .await
        .expect("Failed to open queue database");
    TestStore { store, dir }
}

/// Retry policy with millisecond delays so tests do not wait on real backoff.
pub fn fast_policy() -> RetryPolicy {
    RetryPolicy {
        max_retries: 5,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(16),
    }
}

pub async fn enqueue(store: &dyn QueueStore, action: &str) -> QueueEntry {
    store
        .enqueue(action, "/inventory", HttpMethod::Post, Some(r#"{"id":"c1"}"#))
        .await
        .expect("enqueue failed")
}

/// Delegates to a real store, with switchable storage failures.
pub struct FlakyStore {
    pub inner: SqliteStore,
    pub fail_removes: std::sync::atomic::AtomicBool,
}

impl FlakyStore {
    pub fn new(inner: SqliteStore) -> Self {
        Self {
            inner,
            fail_removes: std::sync::atomic::AtomicBool::new(false),
        }
    }

    pub fn fail_removes(&self, fail: bool) {
        self.fail_removes
            .store(fail, std::sync::atomic::Ordering::SeqCst);
    }
}

#[async_trait]
impl QueueStore for FlakyStore {
    async fn enqueue(
        &self,
        action: &str,
        endpoint: &str,
        method: HttpMethod,
        body: Option<&str>,
    ) -> Result<QueueEntry, QueueError> {
        self.inner.enqueue(action, endpoint, method, body).await
    }

    async fn dequeue_oldest_pending(&self) -> Result<Option<QueueEntry>, QueueError> {
        self.inner.dequeue_oldest_pending().await
    }

    async fn get(&self, id: &str) -> Result<Option<QueueEntry>, QueueError> {
        self.inner.get(id).await
    }

    async fn update_entry(&self, id: &str, update: EntryUpdate) -> Result<(), QueueError> {
        self.inner.update_entry(id, update).await
    }

    async fn remove_entry(&self, id: &str) -> Result<(), QueueError> {
        if self.fail_removes.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(QueueError::StorageUnavailable(sqlx::Error::PoolClosed));
        }
        self.inner.remove_entry(id).await
    }

    async fn list_by_status(&self, status: QueueStatus) -> Result<Vec<QueueEntry>, QueueError> {
        self.inner.list_by_status(status).await
    }

    async fn count_by_status(&self) -> Result<QueueCounts, QueueError> {
        self.inner.count_by_status().await
    }

    async fn clear(&self) -> Result<(), QueueError> {
        self.inner.clear().await
    }

    async fn recover_interrupted(&self) -> Result<u64, QueueError> {
        self.inner.recover_interrupted().await
    }

    async fn requeue_failed(&self) -> Result<u64, QueueError> {
        self.inner.requeue_failed().await
    }
}

// ── Transport ───────────────────────────────────────────────────

/// Replies from a script (then succeeds) and records the action of every attempt.
#[derive(Default)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Result<(), RequestFailed>>>,
    calls: Mutex<Vec<String>>,
    delay: Duration,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn fail_next(&self, times: usize, status: u16) {
        let mut script = self.script.lock().unwrap();
        for _ in 0..times {
            script.push_back(Err(RequestFailed::status(status)));
        }
    }

    pub fn succeed_next(&self) {
        self.script.lock().unwrap().push_back(Ok(()));
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, entry: &QueueEntry) -> Result<(), RequestFailed> {
        self.calls.lock().unwrap().push(entry.action.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.script.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }
}

// ── Callbacks ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    SyncStart,
    SyncComplete(u64, u64),
    OnlineChange(bool),
    QueueChange(u64, u64),
}

#[derive(Default)]
pub struct RecordingCallbacks {
    events: Mutex<Vec<Event>>,
}

impl RecordingCallbacks {
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    fn push(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}

impl SyncCallbacks for RecordingCallbacks {
    fn on_sync_start(&self) {
        self.push(Event::SyncStart);
    }

    fn on_sync_complete(&self, processed: u64, failed: u64) {
        self.push(Event::SyncComplete(processed, failed));
    }

    fn on_online_change(&self, online: bool) {
        self.push(Event::OnlineChange(online));
    }

    fn on_queue_change(&self, pending: u64, failed: u64) {
        self.push(Event::QueueChange(pending, failed));
    }
}

/// Poll `check` until it returns true, panicking after five seconds.
pub async fn wait_for<F, Fut>(what: &str, mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !check().await {
        if tokio::time::Instant::now() >= deadline {
            panic!("timed out waiting for {what}");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

// ── Mock backend ────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub content_type: Option<String>,
    pub body: String,
}

#[derive(Default)]
pub struct BackendState {
    pub statuses: Mutex<VecDeque<u16>>,
    pub requests: Mutex<Vec<RecordedRequest>>,
}

/// A stand-in for the REST backend: answers every request with the next
/// scripted status (200 once the script runs out) and records what it saw.
pub struct MockBackend {
    pub addr: SocketAddr,
    pub state: Arc<BackendState>,
}

impl MockBackend {
    pub fn base_url(&self) -> String {
        format!("http://{}/api", self.addr)
    }

    pub fn respond_with(&self, status: u16, times: usize) {
        let mut statuses = self.state.statuses.lock().unwrap();
        for _ in 0..times {
            statuses.push_back(status);
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().unwrap().clone()
    }
}

async fn backend_handler(
    State(state): State<Arc<BackendState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> StatusCode {
    state.requests.lock().unwrap().push(RecordedRequest {
        method: method.to_string(),
        path: uri.path().to_string(),
        content_type: headers
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        body,
    });

    let status = state.statuses.lock().unwrap().pop_front().unwrap_or(200);
    StatusCode::from_u16(status).unwrap_or(StatusCode::OK)
}

pub async fn spawn_backend() -> MockBackend {
    let state = Arc::new(BackendState::default());
    let app = Router::new()
        .fallback(backend_handler)
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind to random port");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    MockBackend { addr, state }
}

// ── Local API ───────────────────────────────────────────────────

/// A running local API backed by a temporary store and a mock backend.
pub struct TestApp {
    pub addr: SocketAddr,
    pub client: Client,
    pub state: SharedState,
    pub backend: MockBackend,
    pub connectivity: Connectivity,
    pub store: Arc<SqliteStore>,
    _dir: TempDir,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn get(&self, path: &str) -> (Value, StatusCode) {
        let resp = self
            .client
            .get(self.url(path))
            .send()
            .await
            .expect("get request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    pub async fn post(&self, path: &str, body: &Value) -> (Value, StatusCode) {
        let resp = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .expect("post request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    pub async fn put(&self, path: &str, body: &Value) -> (Value, StatusCode) {
        let resp = self
            .client
            .put(self.url(path))
            .json(body)
            .send()
            .await
            .expect("put request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    pub async fn delete(&self, path: &str) -> StatusCode {
        self.client
            .delete(self.url(path))
            .send()
            .await
            .expect("delete request failed")
            .status()
    }

    pub async fn status(&self) -> Value {
        let (body, status) = self.get("/api/v1/status").await;
        assert_eq!(status, StatusCode::OK, "status request failed: {body}");
        body
    }
}

/// Spawn the local API with a fresh store, starting offline or online.
pub async fn spawn_app(online: bool) -> TestApp {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let store = Arc::new(
        SqliteStore::connect(&db_url(&dir))
            .await
            .expect("Failed to open queue database"),
    );

    let backend = spawn_backend().await;
    let transport = syncqueue::transport::HttpTransport::new(
        &backend.base_url(),
        Duration::from_secs(5),
    )
    .expect("Failed to build transport");

    let connectivity = Connectivity::new(online);
    let state = syncqueue::build_state(
        store.clone(),
        Arc::new(transport),
        connectivity.clone(),
        fast_policy(),
    );
    state.manager.start();

    let app = syncqueue::build_app(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind to random port");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        addr,
        client: Client::new(),
        state,
        backend,
        connectivity,
        store,
        _dir: dir,
    }
}
