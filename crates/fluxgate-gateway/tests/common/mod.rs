// crates/fluxgate-gateway/tests/common/mod.rs
// ============================================================================
// Module: Gateway Test Fixtures
// Description: In-process things-service stub for resolver tests.
// Purpose: Serve publish configurations over real HTTP on a loopback port.
// Dependencies: axum, fluxgate-core, tokio
// ============================================================================

//! ## Overview
//! [`spawn_things_stub`] serves [`RESOLVE_PATH`] on `127.0.0.1:0`, checks the
//! bearer token, and answers 200, 401, 404, or 500 like the things service.

#![allow(dead_code, reason = "Shared test helpers may be unused in some cases.")]
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::unwrap_in_result,
    reason = "Test fixtures favor direct unwraps for setup clarity."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use async_trait::async_trait;
use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use axum::http::header::AUTHORIZATION;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::post;
use fluxgate_core::BrokerError;
use fluxgate_core::Message;
use fluxgate_core::MessageHandler;
use fluxgate_core::ProfileConfig;
use fluxgate_core::ProfileId;
use fluxgate_core::PublishConfig;
use fluxgate_core::ThingId;
use fluxgate_gateway::RESOLVE_PATH;
use serde::Deserialize;
use tokio::sync::oneshot;

// ============================================================================
// SECTION: Things Service Stub
// ============================================================================

/// Bearer token the stub expects.
pub const SERVICE_TOKEN: &str = "things-service-token";

/// Key the stub resolves to `thing-1`.
pub const GOOD_KEY: &str = "good-key";

#[derive(Deserialize)]
struct ResolveBody {
    key: String,
}

#[derive(Clone)]
struct StubState {
    keys: Arc<Mutex<BTreeMap<String, PublishConfig>>>,
    failing: Arc<AtomicBool>,
    requests: Arc<AtomicUsize>,
}

/// Handle for the running things-service stub.
pub struct ThingsStub {
    base_url: String,
    state: StubState,
    shutdown: Option<oneshot::Sender<()>>,
}

impl ThingsStub {
    /// Returns the base URL (without the resolve path).
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the number of resolve requests served.
    pub fn requests(&self) -> usize {
        self.state.requests.load(Ordering::SeqCst)
    }

    /// Makes every subsequent request answer 500.
    pub fn fail(&self, failing: bool) {
        self.state.failing.store(failing, Ordering::SeqCst);
    }

    /// Revokes a key.
    pub fn revoke(&self, key: &str) {
        self.state.keys.lock().unwrap().remove(key);
    }
}

impl Drop for ThingsStub {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

/// Publish configuration served for [`GOOD_KEY`].
pub fn good_config() -> PublishConfig {
    PublishConfig {
        publisher_id: ThingId::new("thing-1"),
        profile_id: Some(ProfileId::new("profile-1")),
        profile_config: ProfileConfig {
            content_type: "application/json".to_string(),
            write: true,
            ..ProfileConfig::default()
        },
    }
}

/// Starts the stub on an ephemeral loopback port.
pub async fn spawn_things_stub() -> ThingsStub {
    let mut keys = BTreeMap::new();
    keys.insert(GOOD_KEY.to_string(), good_config());
    let state = StubState {
        keys: Arc::new(Mutex::new(keys)),
        failing: Arc::new(AtomicBool::new(false)),
        requests: Arc::new(AtomicUsize::new(0)),
    };
    let app = Router::new().route(RESOLVE_PATH, post(resolve)).with_state(state.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    tokio::spawn(async move {
        let server = axum::serve(listener, app).with_graceful_shutdown(async move {
            let _ = shutdown_rx.await;
        });
        let _ = server.await;
    });
    ThingsStub {
        base_url: format!("http://{addr}/"),
        state,
        shutdown: Some(shutdown_tx),
    }
}

async fn resolve(
    State(state): State<StubState>,
    headers: HeaderMap,
    Json(body): Json<ResolveBody>,
) -> Response {
    state.requests.fetch_add(1, Ordering::SeqCst);
    if state.failing.load(Ordering::SeqCst) {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    let expected = format!("Bearer {SERVICE_TOKEN}");
    let authorized = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value == expected);
    if !authorized {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let config = state.keys.lock().unwrap().get(&body.key).cloned();
    match config {
        Some(config) => Json(config).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

// ============================================================================
// SECTION: Handlers
// ============================================================================

/// Handler collecting delivered messages.
#[derive(Default)]
pub struct Inbox {
    messages: Mutex<Vec<Message>>,
}

impl Inbox {
    /// Returns delivered messages.
    pub fn messages(&self) -> Vec<Message> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessageHandler for Inbox {
    async fn handle(&self, message: &Message) -> Result<(), BrokerError> {
        self.messages.lock().unwrap().push(message.clone());
        Ok(())
    }
}
