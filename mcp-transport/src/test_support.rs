//! In-process mock MCP servers for the transport tests

use crate::TransportSettings;
use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{
        IntoResponse, Response,
        sse::{Event, Sse},
    },
    routing::{get, post},
};
use futures::StreamExt;
use mcp_compliance_protocol::{MCP_PROTOCOL_VERSION_HEADER, MCP_SESSION_ID_HEADER};
use serde_json::{Value, json};
use std::convert::Infallible;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use url::Url;

pub const TEST_SESSION: &str = "session-1";

/// Serve `router` on an ephemeral local port and return its base URL
pub async fn spawn(router: Router) -> Url {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    Url::parse(&format!("http://{addr}")).unwrap()
}

pub fn settings() -> TransportSettings {
    settings_with_timeout(Duration::from_secs(5))
}

pub fn settings_with_timeout(timeout: Duration) -> TransportSettings {
    TransportSettings::new(reqwest::Client::new(), timeout)
}

pub fn initialize_result(version: &str) -> Value {
    json!({
        "protocolVersion": version,
        "capabilities": {
            "tools": {},
            "resources": { "subscribe": true }
        },
        "serverInfo": { "name": "test-server", "version": "1.0.0" }
    })
}

/// Success envelope answering `request`
pub fn reply(request: &Value, result: Value) -> Value {
    json!({ "jsonrpc": "2.0", "id": request["id"], "result": result })
}

pub fn rpc_error(request: &Value, code: i64, message: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": request["id"],
        "error": { "code": code, "message": message }
    })
}

/// What the mock saw for one inbound request
#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub http_method: &'static str,
    pub rpc_method: Option<String>,
    pub session: Option<String>,
    pub protocol_version: Option<String>,
    pub authorization: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Recorder(Arc<Mutex<Vec<SeenRequest>>>);

impl Recorder {
    fn push(&self, http_method: &'static str, body: Option<&Value>, headers: &HeaderMap) {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
        };
        self.0.lock().unwrap().push(SeenRequest {
            http_method,
            rpc_method: body.and_then(|b| b["method"].as_str()).map(str::to_string),
            session: header(MCP_SESSION_ID_HEADER),
            protocol_version: header(MCP_PROTOCOL_VERSION_HEADER),
            authorization: header("authorization"),
        });
    }

    pub fn requests(&self) -> Vec<SeenRequest> {
        self.0.lock().unwrap().clone()
    }

    pub fn find(&self, rpc_method: &str) -> Option<SeenRequest> {
        self.requests()
            .into_iter()
            .find(|r| r.rpc_method.as_deref() == Some(rpc_method))
    }
}

async fn mcp_post(
    State(recorder): State<Recorder>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    recorder.push("POST", Some(&body), &headers);
    match body["method"].as_str().unwrap_or_default() {
        "initialize" => (
            [(MCP_SESSION_ID_HEADER, TEST_SESSION)],
            Json(reply(&body, initialize_result("2025-03-26"))),
        )
            .into_response(),
        "notifications/initialized" => StatusCode::ACCEPTED.into_response(),
        "tools/list" => Json(reply(
            &body,
            json!({ "tools": [{ "name": "echo", "inputSchema": { "type": "object" } }] }),
        ))
        .into_response(),
        "resources/list" => Json(reply(
            &body,
            json!({ "resources": [{ "uri": "file:///readme", "name": "readme" }] }),
        ))
        .into_response(),
        "prompts/list" => Json(reply(&body, json!({ "prompts": [] }))).into_response(),
        _ => Json(rpc_error(&body, -32601, "Method not found")).into_response(),
    }
}

async fn mcp_delete(State(recorder): State<Recorder>, headers: HeaderMap) -> StatusCode {
    recorder.push("DELETE", None, &headers);
    StatusCode::NO_CONTENT
}

/// A well-behaved request/response server at `/mcp`
pub fn mcp_router() -> (Router, Recorder) {
    let recorder = Recorder::default();
    let router = Router::new()
        .route("/mcp", post(mcp_post).delete(mcp_delete))
        .with_state(recorder.clone());
    (router, recorder)
}

#[derive(Clone)]
struct SseState {
    outbound: mpsc::UnboundedSender<Event>,
    inbound: Arc<tokio::sync::Mutex<Option<mpsc::UnboundedReceiver<Event>>>>,
    respond: bool,
}

async fn sse_stream(
    State(state): State<SseState>,
) -> Sse<impl futures::Stream<Item = Result<Event, Infallible>>> {
    let receiver = state.inbound.lock().await.take();
    let announce = Event::default()
        .event("endpoint")
        .data("/messages?sessionId=abc");
    let events = futures::stream::unfold(
        (Some(announce), receiver),
        |(first, mut receiver)| async move {
            if let Some(event) = first {
                return Some((Ok(event), (None, receiver)));
            }
            let event = receiver.as_mut()?.recv().await?;
            Some((Ok(event), (None, receiver)))
        },
    );
    Sse::new(events)
}

async fn sse_message(State(state): State<SseState>, Json(body): Json<Value>) -> StatusCode {
    if state.respond && body["method"] == "initialize" {
        let _ = state.outbound.send(
            Event::default()
                .event("message")
                .data(json!({ "jsonrpc": "2.0", "method": "notifications/message" }).to_string()),
        );
        let _ = state.outbound.send(
            Event::default()
                .event("message")
                .data(reply(&body, initialize_result("2024-11-05")).to_string()),
        );
    }
    StatusCode::ACCEPTED
}

/// A legacy event-stream server: GET `/sse`, POST `/messages`.
///
/// With `respond` unset the POST is acknowledged but no answer is ever
/// streamed back.
pub fn sse_router(respond: bool) -> Router {
    let (outbound, inbound) = mpsc::unbounded_channel();
    let state = SseState {
        outbound,
        inbound: Arc::new(tokio::sync::Mutex::new(Some(inbound))),
        respond,
    };
    Router::new()
        .route("/sse", get(sse_stream))
        .route("/messages", post(sse_message))
        .with_state(state)
}

/// An event stream that never announces an endpoint
pub fn silent_sse_router() -> Router {
    Router::new().route(
        "/sse",
        get(|| async {
            let events = futures::stream::once(async {
                Ok::<_, Infallible>(Event::default().event("ping").data("{}"))
            })
            .chain(futures::stream::pending());
            Sse::new(events)
        }),
    )
}
