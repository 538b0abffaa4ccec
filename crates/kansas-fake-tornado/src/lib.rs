//! ---
//! kansas_section: "04-test-servers"
//! kansas_subsection: "module"
//! kansas_type: "source"
//! kansas_scope: "code"
//! kansas_description: "Pretend Tornado event queue server."
//! kansas_version: "v0.1.0"
//! kansas_owner: "tbd"
//! ---
//! A stand-in for the Tornado event queue used to exercise the load
//! scenarios without a real deployment.
//!
//! Event routes are mounted under both `/json` and `/api/v1`. Polls always
//! answer with a heartbeat; blocking polls (`dont_block=false`) are held for
//! the configured sleep first.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Form, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub const QUEUE_ID_HEADER: &str = "x-tornado-queue-id";
pub const DEFAULT_SLEEP: Duration = Duration::from_secs(50);

/// How `POST /api/v1/register` answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RegistrationMode {
    /// Allocate a queue and report success.
    #[default]
    Success,
    /// Answer with the given status code.
    Reject(u16),
    /// HTTP 200 with a non-success `result`.
    Unsuccessful,
    /// HTTP 200 with a body that is not JSON.
    Malformed,
}

/// Counters of what the server has seen.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ServerStats {
    pub registrations: u64,
    pub rejected_registrations: u64,
    pub internal_events: u64,
    pub deleted_queues: u64,
    /// Poll count per queue id.
    pub polls: HashMap<String, u64>,
    pub last_authorization: Option<String>,
    pub last_shard: Option<String>,
}

impl ServerStats {
    pub fn total_polls(&self) -> u64 {
        self.polls.values().sum()
    }
}

struct ServerState {
    sleep: Duration,
    registration: RegistrationMode,
    authorization: Option<String>,
    next_queue_id: Mutex<u64>,
    heartbeat_id: Mutex<u64>,
    stats: Mutex<ServerStats>,
}

impl ServerState {
    fn allocate_queue_id(&self) -> String {
        let mut next = self.next_queue_id.lock();
        *next += 1;
        format!("{}:1", *next)
    }
}

/// Builder used to configure and spawn the fake server.
#[derive(Debug, Clone)]
pub struct FakeTornadoBuilder {
    listen: SocketAddr,
    sleep: Duration,
    registration: RegistrationMode,
    authorization: Option<String>,
}

impl FakeTornadoBuilder {
    pub fn new(listen: SocketAddr) -> Self {
        Self {
            listen,
            sleep: DEFAULT_SLEEP,
            registration: RegistrationMode::default(),
            authorization: None,
        }
    }

    /// How long blocking polls are held.
    pub fn with_sleep(mut self, sleep: Duration) -> Self {
        self.sleep = sleep;
        self
    }

    pub fn with_registration_mode(mut self, mode: RegistrationMode) -> Self {
        self.registration = mode;
        self
    }

    /// Reject registrations whose `Authorization` header differs from `value`.
    pub fn require_authorization(mut self, value: impl Into<String>) -> Self {
        self.authorization = Some(value.into());
        self
    }

    /// Bind the listener and serve in a background task.
    pub async fn spawn(self) -> anyhow::Result<FakeTornadoHandle> {
        let listener = TcpListener::bind(self.listen).await?;
        let local_addr = listener.local_addr()?;
        info!(address = %local_addr, sleep_secs = self.sleep.as_secs(), "fake tornado listening");

        let state = Arc::new(ServerState {
            sleep: self.sleep,
            registration: self.registration,
            authorization: self.authorization,
            next_queue_id: Mutex::new(0),
            heartbeat_id: Mutex::new(0),
            stats: Mutex::new(ServerStats::default()),
        });
        let router = router(state.clone());

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let server = axum::serve(listener, router).with_graceful_shutdown(async move {
            let _ = shutdown_rx.changed().await;
        });
        let task = tokio::spawn(async move {
            if let Err(err) = server.await {
                warn!(error = %err, "fake tornado exited with error");
            }
        });

        Ok(FakeTornadoHandle {
            address: local_addr,
            state,
            task,
            shutdown: shutdown_tx,
        })
    }
}

/// Handle returned from [`FakeTornadoBuilder::spawn`].
pub struct FakeTornadoHandle {
    address: SocketAddr,
    state: Arc<ServerState>,
    task: JoinHandle<()>,
    shutdown: watch::Sender<bool>,
}

impl FakeTornadoHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.address
    }

    /// Base URL suitable as a load target host.
    pub fn base_url(&self) -> String {
        format!("http://{}", self.address)
    }

    pub fn stats(&self) -> ServerStats {
        self.state.stats.lock().clone()
    }

    /// Request graceful shutdown and wait for the server task to finish.
    pub async fn shutdown(self) -> anyhow::Result<()> {
        let _ = self.shutdown.send(true);
        match self.task.await {
            Ok(()) => Ok(()),
            Err(join) => Err(anyhow::anyhow!(join)),
        }
    }
}

fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK!" }))
        .nest("/json", event_routes())
        .nest(
            "/api/v1",
            event_routes().route("/register", post(register)),
        )
        .with_state(state)
}

fn event_routes() -> Router<Arc<ServerState>> {
    Router::new()
        .route("/events/internal", post(create_queue))
        .route("/events", get(poll_events).delete(delete_queue))
}

#[derive(Debug, Deserialize)]
struct QueueIdForm {
    queue_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PollParams {
    queue_id: String,
    #[serde(default)]
    dont_block: Option<String>,
}

async fn register(State(state): State<Arc<ServerState>>, headers: HeaderMap) -> Response {
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);

    let authorised = match &state.authorization {
        Some(expected) => authorization.as_deref() == Some(expected.as_str()),
        None => true,
    };
    {
        let mut stats = state.stats.lock();
        stats.last_authorization = authorization;
        if !authorised || state.registration != RegistrationMode::Success {
            stats.rejected_registrations += 1;
        }
    }

    if !authorised {
        debug!("registration rejected: bad credentials");
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"result": "error", "msg": "Not logged in: API authentication or user session required"})),
        )
            .into_response();
    }

    match state.registration {
        RegistrationMode::Success => {
            let queue_id = state.allocate_queue_id();
            state.stats.lock().registrations += 1;
            debug!(queue_id = %queue_id, "queue registered");
            Json(json!({"result": "success", "msg": "", "queue_id": queue_id})).into_response()
        }
        RegistrationMode::Reject(status) => {
            let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (status, "registration rejected").into_response()
        }
        RegistrationMode::Unsuccessful => {
            Json(json!({"result": "error", "msg": "registration refused"})).into_response()
        }
        RegistrationMode::Malformed => "<html>not json</html>".into_response(),
    }
}

async fn create_queue(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Form(form): Form<QueueIdForm>,
) -> Response {
    let queue_id = match form.queue_id {
        Some(provided) => provided,
        None => state.allocate_queue_id(),
    };
    {
        let mut stats = state.stats.lock();
        stats.internal_events += 1;
        stats.last_shard = headers
            .get("x-tornado-shard")
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);
    }
    debug!(queue_id = %queue_id, "internal event queue created");

    let body = json!({"result": "success", "msg": "", "events": [], "queue_id": queue_id});
    ([(QUEUE_ID_HEADER, queue_id)], Json(body)).into_response()
}

async fn delete_queue(
    State(state): State<Arc<ServerState>>,
    Form(form): Form<QueueIdForm>,
) -> Response {
    let Some(queue_id) = form.queue_id else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"result": "error", "msg": "Missing 'queue_id' argument"})),
        )
            .into_response();
    };
    state.stats.lock().deleted_queues += 1;
    (
        [(QUEUE_ID_HEADER, queue_id)],
        Json(json!({"result": "success", "msg": ""})),
    )
        .into_response()
}

async fn poll_events(
    State(state): State<Arc<ServerState>>,
    Query(params): Query<PollParams>,
) -> Json<serde_json::Value> {
    *state
        .stats
        .lock()
        .polls
        .entry(params.queue_id.clone())
        .or_default() += 1;

    if params.dont_block.as_deref() == Some("false") {
        tokio::time::sleep(state.sleep).await;
    }

    let heartbeat = {
        let mut id = state.heartbeat_id.lock();
        *id += 1;
        *id
    };
    Json(json!({
        "result": "success",
        "msg": "",
        "events": [{"type": "heartbeat", "id": heartbeat}],
        "queue_id": params.queue_id,
    }))
}
