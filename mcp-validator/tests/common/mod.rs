//! Mock MCP servers shared by the integration tests

#![allow(dead_code)]

use axum::{
    Json, Router,
    extract::State,
    http::{StatusCode, header::WWW_AUTHENTICATE},
    response::{
        IntoResponse, Response,
        sse::{Event, Sse},
    },
    routing::{get, post},
};
use mcp_compliance_validator::{RetryConfig, ValidatorConfig};
use serde_json::{Value, json};
use std::convert::Infallible;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};
use url::Url;

/// Counts `initialize` requests, detection probes included
#[derive(Debug, Clone, Default)]
pub struct Hits(Arc<AtomicUsize>);

impl Hits {
    pub fn initialize(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    fn record(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// How the mock answers the handshake
#[derive(Debug, Clone)]
pub struct MockServer {
    pub protocol_version: String,
    pub capabilities: Value,
    pub server_info: Option<Value>,
    pub delay: Option<Duration>,
    pub require_auth: bool,
    pub failing_lists: Vec<&'static str>,
}

impl Default for MockServer {
    fn default() -> Self {
        Self {
            protocol_version: "2025-06-18".to_string(),
            capabilities: json!({ "tools": {}, "resources": {} }),
            server_info: Some(json!({ "name": "mock-server", "version": "1.0.0" })),
            delay: None,
            require_auth: false,
            failing_lists: Vec::new(),
        }
    }
}

impl MockServer {
    pub fn with_version(mut self, version: &str) -> Self {
        self.protocol_version = version.to_string();
        self
    }

    pub fn with_capabilities(mut self, capabilities: Value) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_server_info(mut self, name: &str, version: &str) -> Self {
        self.server_info = Some(json!({ "name": name, "version": version }));
        self
    }

    pub fn without_server_info(mut self) -> Self {
        self.server_info = None;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn requiring_auth(mut self) -> Self {
        self.require_auth = true;
        self
    }

    pub fn failing(mut self, method: &'static str) -> Self {
        self.failing_lists.push(method);
        self
    }

    fn initialize_result(&self) -> Value {
        let mut result = json!({
            "protocolVersion": self.protocol_version,
            "capabilities": self.capabilities,
        });
        if let Some(ref info) = self.server_info {
            result["serverInfo"] = info.clone();
        }
        result
    }

    /// Serve a streamable HTTP endpoint at `/mcp`
    pub async fn spawn(self) -> (Url, Hits) {
        let hits = Hits::default();
        let router = self.streamable_router(hits.clone());
        (spawn(router).await, hits)
    }

    /// Serve a streamable endpoint at `/mcp` and an event stream at `/sse`
    pub async fn spawn_with_sse(self) -> (Url, Hits) {
        let hits = Hits::default();
        let router = self.streamable_router(hits.clone()).merge(self.sse_router(hits.clone()));
        (spawn(router).await, hits)
    }

    /// Serve only the legacy event-stream endpoints
    pub async fn spawn_sse(self) -> (Url, Hits) {
        let hits = Hits::default();
        let router = self.sse_router(hits.clone());
        (spawn(router).await, hits)
    }

    fn streamable_router(&self, hits: Hits) -> Router {
        Router::new()
            .route(
                "/mcp",
                post(streamable_post).delete(|| async { StatusCode::NO_CONTENT }),
            )
            .with_state((Arc::new(self.clone()), hits))
    }

    fn sse_router(&self, hits: Hits) -> Router {
        let state = SseState {
            server: Arc::new(self.clone()),
            hits,
            stream: Arc::new(Mutex::new(None)),
        };
        Router::new()
            .route("/sse", get(sse_stream))
            .route("/messages", post(sse_message))
            .with_state(state)
    }
}

/// Serve `router` on an ephemeral local port and return its base URL
pub async fn spawn(router: Router) -> Url {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    Url::parse(&format!("http://{addr}")).unwrap()
}

fn reply(request: &Value, result: Value) -> Value {
    json!({ "jsonrpc": "2.0", "id": request["id"], "result": result })
}

fn rpc_error(request: &Value, code: i64, message: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": request["id"],
        "error": { "code": code, "message": message }
    })
}

async fn streamable_post(
    State((server, hits)): State<(Arc<MockServer>, Hits)>,
    Json(body): Json<Value>,
) -> Response {
    let method = body["method"].as_str().unwrap_or_default().to_string();
    if body.get("id").is_none() {
        return StatusCode::ACCEPTED.into_response();
    }
    if method == "initialize" {
        hits.record();
    }

    if server.require_auth {
        return (
            StatusCode::UNAUTHORIZED,
            [(WWW_AUTHENTICATE, "Bearer realm=\"mcp\"")],
            Json(json!({ "error": "unauthorized" })),
        )
            .into_response();
    }

    if let Some(delay) = server.delay {
        tokio::time::sleep(delay).await;
    }

    if server.failing_lists.contains(&method.as_str()) {
        return Json(rpc_error(&body, -32603, "listing unavailable")).into_response();
    }

    let result = match method.as_str() {
        "initialize" => server.initialize_result(),
        "tools/list" => json!({ "tools": [{ "name": "echo", "inputSchema": { "type": "object" } }] }),
        "resources/list" => json!({ "resources": [] }),
        "prompts/list" => json!({ "prompts": [] }),
        _ => return Json(rpc_error(&body, -32601, "Method not found")).into_response(),
    };
    Json(reply(&body, result)).into_response()
}

#[derive(Clone)]
struct SseState {
    server: Arc<MockServer>,
    hits: Hits,
    /// Sender for the most recently opened stream
    stream: Arc<Mutex<Option<mpsc::UnboundedSender<Event>>>>,
}

async fn sse_stream(
    State(state): State<SseState>,
) -> Sse<impl futures::Stream<Item = Result<Event, Infallible>>> {
    let (sender, receiver) = mpsc::unbounded_channel();
    *state.stream.lock().await = Some(sender);

    let announce = Event::default()
        .event("endpoint")
        .data("/messages?sessionId=mock");
    let events = futures::stream::unfold(
        (Some(announce), receiver),
        |(first, mut receiver)| async move {
            if let Some(event) = first {
                return Some((Ok(event), (None, receiver)));
            }
            let event = receiver.recv().await?;
            Some((Ok(event), (None, receiver)))
        },
    );
    Sse::new(events)
}

async fn sse_message(State(state): State<SseState>, Json(body): Json<Value>) -> StatusCode {
    if body["method"] != "initialize" {
        return StatusCode::ACCEPTED;
    }
    state.hits.record();

    if let Some(sender) = state.stream.lock().await.as_ref() {
        let response = reply(&body, state.server.initialize_result());
        let _ = sender.send(Event::default().event("message").data(response.to_string()));
    }
    StatusCode::ACCEPTED
}

/// Fast retries so exhaustion tests finish quickly
pub fn fast_retries(max_attempts: u32) -> RetryConfig {
    RetryConfig::default()
        .with_max_attempts(max_attempts)
        .with_delays(Duration::from_millis(10), Duration::from_millis(50))
}

pub fn config() -> ValidatorConfig {
    ValidatorConfig::default()
}
