//! In-process stand-in for the ticketing service: cookie login, concert browsing, a queue-entry
//! endpoint with a configurable admission mode, the waiting-queue WebSocket, and a seat-status
//! resource gated by `X-Access-Key`.

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Form, Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::time::{Duration, sleep};

pub const PATH_API: &str = "/api";
pub const PATH_WS: &str = "/ws/waitqueue";

const ACCESS_KEY_HEADER: &str = "x-access-key";

/// How `POST /api/queue/enter` answers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueMode {
    /// `IMMEDIATE_ENTRY` with a fresh access key.
    Immediate,
    /// `WAITING`, then the WebSocket pushes one `RANK_UPDATE` per rank and finally `ADMIT`.
    Admit { ranks: Vec<u64>, interval: Duration },
    /// `WAITING`, then nothing is ever pushed.
    Silent { rank: u64 },
    /// `ERROR` with the given message and status 409.
    Refuse { message: String },
}

#[derive(Debug, Clone)]
pub struct ServerOptions {
    pub queue: QueueMode,
    /// When set, logins with any other password get 401.
    pub password: Option<String>,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            queue: QueueMode::Immediate,
            password: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TestServerStats {
    requests_total: Arc<AtomicU64>,
    logins: Arc<AtomicU64>,
    registrations: Arc<AtomicU64>,
    queue_entries: Arc<AtomicU64>,
    ws_connections: Arc<AtomicU64>,
    ws_open: Arc<AtomicU64>,
    ws_max_open: Arc<AtomicU64>,
    gated_granted: Arc<AtomicU64>,
    gated_denied: Arc<AtomicU64>,
}

impl TestServerStats {
    fn inc_requests_total(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
    }

    fn ws_opened(&self) {
        self.ws_connections.fetch_add(1, Ordering::Relaxed);
        let open = self.ws_open.fetch_add(1, Ordering::SeqCst) + 1;
        self.ws_max_open.fetch_max(open, Ordering::SeqCst);
    }

    fn ws_closed(&self) {
        self.ws_open.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn requests_total(&self) -> u64 {
        self.requests_total.load(Ordering::Relaxed)
    }

    pub fn logins(&self) -> u64 {
        self.logins.load(Ordering::Relaxed)
    }

    pub fn registrations(&self) -> u64 {
        self.registrations.load(Ordering::Relaxed)
    }

    pub fn queue_entries(&self) -> u64 {
        self.queue_entries.load(Ordering::Relaxed)
    }

    pub fn ws_connections(&self) -> u64 {
        self.ws_connections.load(Ordering::Relaxed)
    }

    pub fn ws_open(&self) -> u64 {
        self.ws_open.load(Ordering::SeqCst)
    }

    pub fn ws_max_open(&self) -> u64 {
        self.ws_max_open.load(Ordering::SeqCst)
    }

    pub fn gated_granted(&self) -> u64 {
        self.gated_granted.load(Ordering::Relaxed)
    }

    pub fn gated_denied(&self) -> u64 {
        self.gated_denied.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Default)]
struct Registry {
    accounts: HashSet<String>,
    issued_keys: HashSet<String>,
    next_key: u64,
}

#[derive(Clone)]
struct AppState {
    options: Arc<ServerOptions>,
    stats: TestServerStats,
    registry: Arc<Mutex<Registry>>,
}

impl AppState {
    fn registry(&self) -> std::sync::MutexGuard<'_, Registry> {
        self.registry
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn issue_key(&self, username: &str) -> String {
        let mut reg = self.registry();
        reg.next_key += 1;
        let key = format!("key-{username}-{}", reg.next_key);
        reg.issued_keys.insert(key.clone());
        key
    }
}

/// `access` cookie value from the request, if any.
fn session_user(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == "access")
        .and_then(|(_, value)| value.strip_prefix("acc-"))
        .map(str::to_string)
}

fn json_response(status: StatusCode, body: serde_json::Value) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, "application/json")],
        body.to_string(),
    )
        .into_response()
}

#[derive(Debug, Deserialize)]
struct LoginForm {
    username: String,
    password: String,
}

async fn handle_login(State(st): State<AppState>, Form(form): Form<LoginForm>) -> Response {
    st.stats.inc_requests_total();
    if st
        .options
        .password
        .as_deref()
        .is_some_and(|expected| expected != form.password)
    {
        return json_response(StatusCode::UNAUTHORIZED, json!({ "message": "bad credentials" }));
    }
    st.stats.logins.fetch_add(1, Ordering::Relaxed);

    let mut res = json_response(StatusCode::OK, json!({ "data": null }));
    for cookie in [
        format!("access=acc-{}; Path=/; HttpOnly", form.username),
        format!("refresh=ref-{}; Path=/; HttpOnly", form.username),
    ] {
        if let Ok(value) = cookie.parse() {
            res.headers_mut().append(header::SET_COOKIE, value);
        }
    }
    res
}

#[derive(Debug, Deserialize)]
struct RegisterBody {
    username: String,
    email: String,
}

async fn handle_register(State(st): State<AppState>, body: axum::body::Bytes) -> Response {
    st.stats.inc_requests_total();
    let Ok(req) = serde_json::from_slice::<RegisterBody>(&body) else {
        return json_response(StatusCode::BAD_REQUEST, json!({ "message": "bad json" }));
    };
    if req.email.is_empty() {
        return json_response(StatusCode::BAD_REQUEST, json!({ "message": "email required" }));
    }
    if !st.registry().accounts.insert(req.username) {
        return json_response(StatusCode::CONFLICT, json!({ "message": "already registered" }));
    }
    st.stats.registrations.fetch_add(1, Ordering::Relaxed);
    json_response(StatusCode::OK, json!({ "data": null }))
}

fn concert(id: u64) -> serde_json::Value {
    json!({ "id": id, "title": format!("concert {id}"), "artist": "IU" })
}

async fn handle_list(
    State(st): State<AppState>,
    headers: HeaderMap,
    Query(_query): Query<HashMap<String, String>>,
) -> Response {
    st.stats.inc_requests_total();
    if session_user(&headers).is_none() {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    json_response(StatusCode::OK, json!({ "data": { "content": [concert(111), concert(112)] } }))
}

async fn handle_search(
    State(st): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    st.stats.inc_requests_total();
    if session_user(&headers).is_none() {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    match query.get("query") {
        Some(q) if !q.is_empty() => json_response(StatusCode::OK, json!({ "data": [concert(111)] })),
        _ => StatusCode::BAD_REQUEST.into_response(),
    }
}

async fn handle_filter(
    State(st): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    st.stats.inc_requests_total();
    if session_user(&headers).is_none() {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    if query.contains_key("startDate") && query.contains_key("endDate") {
        json_response(StatusCode::OK, json!({ "data": [] }))
    } else {
        StatusCode::BAD_REQUEST.into_response()
    }
}

async fn handle_detail(
    State(st): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<u64>,
) -> Response {
    st.stats.inc_requests_total();
    if session_user(&headers).is_none() {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    json_response(StatusCode::OK, json!({ "data": concert(id) }))
}

async fn handle_ai_summary(
    State(st): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<u64>,
) -> Response {
    st.stats.inc_requests_total();
    if session_user(&headers).is_none() {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    json_response(StatusCode::OK, json!({ "data": { "concertId": id, "summary": "great show" } }))
}

async fn handle_seat_status(
    State(st): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<u64>,
) -> Response {
    st.stats.inc_requests_total();
    if session_user(&headers).is_none() {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let key = headers.get(ACCESS_KEY_HEADER).and_then(|v| v.to_str().ok());
    let status = match key {
        None => StatusCode::UNAUTHORIZED,
        Some(key) if st.registry().issued_keys.contains(key) => StatusCode::OK,
        Some(_) => StatusCode::FORBIDDEN,
    };
    if status == StatusCode::OK {
        st.stats.gated_granted.fetch_add(1, Ordering::Relaxed);
        json_response(status, json!({ "data": { "concertId": id, "available": 42 } }))
    } else {
        st.stats.gated_denied.fetch_add(1, Ordering::Relaxed);
        json_response(status, json!({ "message": "access key required" }))
    }
}

async fn handle_enter(
    State(st): State<AppState>,
    headers: HeaderMap,
    Query(_query): Query<HashMap<String, String>>,
) -> Response {
    st.stats.inc_requests_total();
    let Some(user) = session_user(&headers) else {
        return StatusCode::UNAUTHORIZED.into_response();
    };
    st.stats.queue_entries.fetch_add(1, Ordering::Relaxed);

    match &st.options.queue {
        QueueMode::Immediate => json_response(
            StatusCode::OK,
            json!({ "data": { "status": "IMMEDIATE_ENTRY", "accessKey": st.issue_key(&user) } }),
        ),
        QueueMode::Admit { ranks, .. } => {
            let rank = ranks.first().copied().unwrap_or(1) + 1;
            json_response(StatusCode::OK, json!({ "data": { "status": "WAITING", "rank": rank } }))
        }
        QueueMode::Silent { rank } => {
            json_response(StatusCode::OK, json!({ "data": { "status": "WAITING", "rank": rank } }))
        }
        QueueMode::Refuse { message } => json_response(
            StatusCode::CONFLICT,
            json!({ "data": { "status": "ERROR", "message": message } }),
        ),
    }
}

async fn handle_ws(
    State(st): State<AppState>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    st.stats.inc_requests_total();
    let Some(user) = session_user(&headers) else {
        return StatusCode::UNAUTHORIZED.into_response();
    };
    ws.on_upgrade(move |socket| push_queue(socket, st, user))
}

async fn push_queue(mut socket: WebSocket, st: AppState, user: String) {
    st.stats.ws_opened();

    if let QueueMode::Admit { ranks, interval } = &st.options.queue {
        for rank in ranks {
            sleep(*interval).await;
            let frame = json!({ "type": "RANK_UPDATE", "rank": rank }).to_string();
            if socket.send(Message::Text(frame.into())).await.is_err() {
                st.stats.ws_closed();
                return;
            }
        }
        sleep(*interval).await;
        let frame = json!({ "type": "ADMIT", "accessKey": st.issue_key(&user) }).to_string();
        let _ = socket.send(Message::Text(frame.into())).await;
    }

    // Hold the channel until the client leaves.
    while let Some(Ok(msg)) = socket.recv().await {
        if matches!(msg, Message::Close(_)) {
            break;
        }
    }
    st.stats.ws_closed();
}

pub fn router(options: ServerOptions, stats: TestServerStats) -> Router {
    let state = AppState {
        options: Arc::new(options),
        stats,
        registry: Arc::default(),
    };

    let api = Router::new()
        .route("/auth/login", post(handle_login))
        .route("/auth/register", post(handle_register))
        .route("/concerts", get(handle_list))
        .route("/concerts/search", get(handle_search))
        .route("/concerts/filter", get(handle_filter))
        .route("/concerts/{id}", get(handle_detail))
        .route("/concerts/{id}/ai-summary", get(handle_ai_summary))
        .route("/seats/concerts/{id}/status", get(handle_seat_status))
        .route("/queue/enter", post(handle_enter));

    Router::new()
        .nest(PATH_API, api)
        .route(PATH_WS, get(handle_ws))
        .with_state(state)
}

pub struct TestServer {
    addr: SocketAddr,
    stats: TestServerStats,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl TestServer {
    pub async fn start() -> std::io::Result<Self> {
        Self::start_with(ServerOptions::default()).await
    }

    pub async fn start_with(options: ServerOptions) -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let stats = TestServerStats::default();
        let app = router(options, stats.clone());

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            });
            let _ = serve.await;
        });

        Ok(Self {
            addr,
            stats,
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// API root, e.g. `http://127.0.0.1:1234/api`.
    pub fn base_url(&self) -> String {
        format!("http://{}{PATH_API}", self.addr)
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}{PATH_WS}", self.addr)
    }

    pub fn stats(&self) -> &TestServerStats {
        &self.stats
    }

    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if self.shutdown_tx.is_some()
            && let Some(task) = self.task.take()
        {
            task.abort();
        }
    }
}
