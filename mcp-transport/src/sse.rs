//! Legacy event-stream (SSE) client binding
//!
//! The binding works in two phases. [`SseTransport::connect`] opens a
//! long-lived GET and waits for the server to announce where messages should
//! be POSTed. Requests then go to that URL, and their responses come back on
//! the open stream rather than in the POST response.

use crate::{
    Transport, TransportError, TransportSettings, TransportType, content_type,
    is_event_stream_content_type,
};
use async_trait::async_trait;
use mcp_compliance_protocol::{
    EVENT_STREAM_CONTENT_TYPE, InitializeRequestParams, InitializeResult, ListPromptsResult,
    ListResourcesResult, ListToolsResult, Request, Response, SseDecoder, SseEvent,
    decode_response, methods,
};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::time::timeout;
use tracing::{debug, info, warn};
use url::Url;

/// How long `connect` waits for the `endpoint` event
pub const ENDPOINT_DISCOVERY_TIMEOUT: Duration = Duration::from_secs(1);

/// How long `initialize` waits for its response on the stream
pub const RESPONSE_WAIT_TIMEOUT: Duration = Duration::from_secs(2);

const ENDPOINT_EVENT: &str = "endpoint";

/// Open GET stream plus the events decoded but not yet consumed
struct EventStream {
    response: reqwest::Response,
    decoder: SseDecoder,
    pending: VecDeque<SseEvent>,
}

impl EventStream {
    fn new(response: reqwest::Response) -> Self {
        Self {
            response,
            decoder: SseDecoder::new(),
            pending: VecDeque::new(),
        }
    }

    /// Next complete event, or `None` once the server closed the stream
    async fn next_event(&mut self) -> Result<Option<SseEvent>, TransportError> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Ok(Some(event));
            }
            match self.response.chunk().await {
                Ok(Some(chunk)) => self.pending.extend(self.decoder.feed(&chunk)),
                Ok(None) => return Ok(self.decoder.finish()),
                Err(e) => {
                    return Err(TransportError::Connection(format!(
                        "event stream failed: {e}"
                    )));
                }
            }
        }
    }

    async fn wait_for_endpoint(&mut self) -> Result<String, TransportError> {
        while let Some(event) = self.next_event().await? {
            if event.event_type() == ENDPOINT_EVENT {
                return Ok(event.data);
            }
            debug!("Ignoring '{}' event before endpoint", event.event_type());
        }
        Err(TransportError::Connection(
            "event stream closed before an endpoint was announced".to_string(),
        ))
    }

    /// Next JSON-RPC response on the stream; server requests and
    /// notifications are skipped
    async fn wait_for_response(&mut self) -> Result<Response, TransportError> {
        while let Some(event) = self.next_event().await? {
            if !event.is_jsonrpc() {
                continue;
            }
            let response = decode_response(&event.data)?;
            if response.result.is_none() && response.error.is_none() {
                debug!("Skipping non-response message on event stream");
                continue;
            }
            return Ok(response);
        }
        Err(TransportError::Connection(
            "event stream closed before the response arrived".to_string(),
        ))
    }
}

/// Resolve an announced message endpoint.
///
/// Absolute URLs are used as-is. Anything else is a path on the server's
/// origin, so `messages` under `http://host/api/sse` is `http://host/messages`.
pub fn message_endpoint(endpoint: &Url, announced: &str) -> Result<Url, TransportError> {
    let announced = announced.trim();
    let invalid = |e: url::ParseError| {
        TransportError::InvalidResponse(format!("invalid endpoint '{announced}': {e}"))
    };

    if announced.is_empty() {
        return Err(TransportError::InvalidResponse(
            "server announced an empty endpoint".to_string(),
        ));
    }
    match Url::parse(announced) {
        Ok(url) => return Ok(url),
        Err(url::ParseError::RelativeUrlWithoutBase) => {}
        Err(e) => return Err(invalid(e)),
    }

    if announced.starts_with('/') {
        endpoint.join(announced).map_err(invalid)
    } else {
        endpoint.join(&format!("/{announced}")).map_err(invalid)
    }
}

/// Client for the legacy event-stream binding
pub struct SseTransport {
    endpoint: Url,
    settings: TransportSettings,
    next_id: AtomicI64,
    stream: Mutex<Option<EventStream>>,
    message_url: RwLock<Option<Url>>,
}

impl SseTransport {
    /// Create an unconnected client for the stream at `endpoint`
    pub fn new(endpoint: Url, settings: TransportSettings) -> Self {
        Self {
            endpoint,
            settings,
            next_id: AtomicI64::new(1),
            stream: Mutex::new(None),
            message_url: RwLock::new(None),
        }
    }

    /// URL of the event stream
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// URL announced by the server, once connected
    pub async fn message_url(&self) -> Option<Url> {
        self.message_url.read().await.clone()
    }

    /// Open the stream and wait for the message endpoint.
    ///
    /// Sending the GET is bounded by the configured timeout. Waiting for the
    /// `endpoint` event is bounded by [`ENDPOINT_DISCOVERY_TIMEOUT`] on top.
    pub async fn connect(&self) -> Result<Url, TransportError> {
        let request = self
            .settings
            .client
            .get(self.endpoint.clone())
            .headers(self.settings.headers.clone())
            .header(ACCEPT, EVENT_STREAM_CONTENT_TYPE)
            .send();

        let response = timeout(self.settings.timeout, request)
            .await
            .map_err(|_| TransportError::Timeout(self.settings.timeout))?
            .map_err(|e| TransportError::from_reqwest(e, self.settings.timeout))?;

        let status = response.status().as_u16();
        if status != 200 {
            let headers = response.headers().clone();
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::from_status(status, &headers, body));
        }

        let content_type = content_type(response.headers());
        if !is_event_stream_content_type(&content_type) {
            return Err(TransportError::InvalidResponse(format!(
                "expected an event stream, got content type '{content_type}'"
            )));
        }

        let mut stream = EventStream::new(response);
        let announced = timeout(ENDPOINT_DISCOVERY_TIMEOUT, stream.wait_for_endpoint())
            .await
            .map_err(|_| TransportError::EndpointNotAnnounced(ENDPOINT_DISCOVERY_TIMEOUT))??;

        let message_url = message_endpoint(&self.endpoint, &announced)?;
        info!("Event stream at {} announced {}", self.endpoint, message_url);

        *self.stream.lock().await = Some(stream);
        *self.message_url.write().await = Some(message_url.clone());
        Ok(message_url)
    }

    fn not_implemented(operation: &'static str) -> TransportError {
        TransportError::NotImplemented {
            operation,
            transport: TransportType::Sse,
        }
    }
}

#[async_trait]
impl Transport for SseTransport {
    async fn initialize(&self) -> Result<InitializeResult, TransportError> {
        let message_url = self
            .message_url
            .read()
            .await
            .clone()
            .ok_or(TransportError::NotConnected)?;

        // Held across the POST so no other caller consumes our response
        let mut guard = self.stream.lock().await;
        let stream = guard.as_mut().ok_or(TransportError::NotConnected)?;

        let negotiator = &self.settings.negotiator;
        let params = InitializeRequestParams::new(
            negotiator.latest(),
            self.settings.client_info.clone(),
        );
        let params = serde_json::to_value(params)
            .map_err(|e| TransportError::Protocol(e.into()))?;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let request = Request::new(id, methods::INITIALIZE, Some(params));

        debug!("-> {} (id {}) to {}", methods::INITIALIZE, id, message_url);
        let ack = self
            .settings
            .client
            .post(message_url)
            .headers(self.settings.headers.clone())
            .header(CONTENT_TYPE, "application/json")
            .timeout(self.settings.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(e, self.settings.timeout))?;

        let status = ack.status().as_u16();
        if status != 200 && status != 202 {
            let headers = ack.headers().clone();
            let body = ack.text().await.unwrap_or_default();
            return Err(TransportError::from_status(status, &headers, body));
        }
        drop(ack);

        let response = timeout(RESPONSE_WAIT_TIMEOUT, stream.wait_for_response())
            .await
            .map_err(|_| TransportError::ResponseNotReceived(RESPONSE_WAIT_TIMEOUT))??;

        if response.numeric_id() != Some(id) {
            return Err(TransportError::IdMismatch {
                expected: id,
                actual: response.id.to_string(),
            });
        }

        let raw = response.into_result().map_err(|error| TransportError::Rpc {
            code: error.code,
            message: error.message,
        })?;
        let mut result: InitializeResult = serde_json::from_value(raw.clone()).map_err(|e| {
            TransportError::InvalidResponse(format!("malformed initialize result: {e}"))
        })?;

        if result.protocol_version.is_empty() {
            result.protocol_version = negotiator.detect_version_from_response(None, &raw);
            warn!(
                "Server omitted protocolVersion, inferred {}",
                result.protocol_version
            );
        }

        Ok(result)
    }

    fn name(&self) -> TransportType {
        TransportType::Sse
    }

    fn supports_session_management(&self) -> bool {
        false
    }

    /// Drops the stream; the server sees the connection close
    async fn close(&self) -> Result<(), TransportError> {
        if self.stream.lock().await.take().is_some() {
            debug!("Closed event stream at {}", self.endpoint);
        }
        *self.message_url.write().await = None;
        Ok(())
    }

    async fn list_tools(&self) -> Result<ListToolsResult, TransportError> {
        Err(Self::not_implemented(methods::TOOLS_LIST))
    }

    async fn list_resources(&self) -> Result<ListResourcesResult, TransportError> {
        Err(Self::not_implemented(methods::RESOURCES_LIST))
    }

    async fn list_prompts(&self) -> Result<ListPromptsResult, TransportError> {
        Err(Self::not_implemented(methods::PROMPTS_LIST))
    }
}
