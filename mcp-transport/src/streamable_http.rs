//! Streamable HTTP client binding
//!
//! Every call is a POST of one JSON-RPC envelope. The server may answer with
//! plain JSON or with a short event stream carrying the response, so both
//! framings are accepted.

use crate::{
    Transport, TransportError, TransportSettings, TransportType, content_type,
    is_event_stream_content_type,
};
use async_trait::async_trait;
use mcp_compliance_protocol::{
    InitializeRequestParams, InitializeResult, ListPromptsResult, ListResourcesResult,
    ListToolsResult, MCP_PROTOCOL_VERSION_HEADER, MCP_SESSION_ID_HEADER, Notification, Request,
    decode_response, extract_json_payload, methods,
};
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::RwLock;
use tracing::{debug, warn};
use url::Url;

const ACCEPT_BOTH: &str = "application/json, text/event-stream";

/// Request/response binding over HTTP POST
pub struct StreamableHttpTransport {
    endpoint: Url,
    settings: TransportSettings,
    next_id: AtomicI64,
    session_id: RwLock<Option<String>>,
    protocol_version: RwLock<Option<String>>,
}

impl StreamableHttpTransport {
    /// Create a client for the endpoint at `endpoint`
    pub fn new(endpoint: Url, settings: TransportSettings) -> Self {
        Self {
            endpoint,
            settings,
            next_id: AtomicI64::new(1),
            session_id: RwLock::new(None),
            protocol_version: RwLock::new(None),
        }
    }

    /// URL requests are POSTed to
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Session token issued by the server, if any
    pub async fn session_id(&self) -> Option<String> {
        self.session_id.read().await.clone()
    }

    /// Version sent in the protocol version header after the handshake
    pub async fn negotiated_version(&self) -> Option<String> {
        self.protocol_version.read().await.clone()
    }

    async fn post(&self, body: &impl serde::Serialize) -> Result<reqwest::Response, TransportError> {
        let mut request = self
            .settings
            .client
            .post(self.endpoint.clone())
            .headers(self.settings.headers.clone())
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, ACCEPT_BOTH)
            .timeout(self.settings.timeout)
            .json(body);

        if let Some(session) = self.session_id.read().await.as_deref() {
            request = request.header(MCP_SESSION_ID_HEADER, session);
        }
        if let Some(version) = self.protocol_version.read().await.as_deref() {
            request = request.header(MCP_PROTOCOL_VERSION_HEADER, version);
        }

        let response = request
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(e, self.settings.timeout))?;

        self.capture_session(response.headers()).await;
        Ok(response)
    }

    async fn capture_session(&self, headers: &HeaderMap) {
        let session = headers
            .get(MCP_SESSION_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.is_empty());

        if let Some(session) = session {
            let mut current = self.session_id.write().await;
            if current.as_deref() != Some(session) {
                debug!("Server issued session {}", session);
                *current = Some(session.to_string());
            }
        }
    }

    /// Send one request and return its raw result with the response headers
    async fn send_request(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> Result<(Value, HeaderMap), TransportError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let request = Request::new(id, method, params);
        debug!("-> {} (id {}) to {}", method, id, self.endpoint);

        let response = self.post(&request).await?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::from_reqwest(e, self.settings.timeout))?;

        if status != 200 {
            return Err(TransportError::from_status(status, &headers, body));
        }

        let payload = if is_event_stream_content_type(&content_type(&headers)) {
            extract_json_payload(&body)?
        } else {
            body
        };

        let envelope = decode_response(&payload)?;
        if envelope.numeric_id() != Some(id) {
            return Err(TransportError::IdMismatch {
                expected: id,
                actual: envelope.id.to_string(),
            });
        }

        let result = envelope.into_result().map_err(|error| TransportError::Rpc {
            code: error.code,
            message: error.message,
        })?;
        debug!("<- {} (id {})", method, id);
        Ok((result, headers))
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> Result<T, TransportError> {
        let (result, _) = self.send_request(method, params).await?;
        serde_json::from_value(result).map_err(|e| {
            TransportError::InvalidResponse(format!("malformed {method} result: {e}"))
        })
    }

    /// Send a notification; the server acknowledges with 200, 202 or 204
    async fn notify(&self, method: &str, params: Option<Value>) -> Result<(), TransportError> {
        let notification = Notification::new(method, params);
        let response = self.post(&notification).await?;
        let status = response.status().as_u16();

        match status {
            200 | 202 | 204 => Ok(()),
            _ => {
                let headers = response.headers().clone();
                let body = response.text().await.unwrap_or_default();
                Err(TransportError::from_status(status, &headers, body))
            }
        }
    }
}

#[async_trait]
impl Transport for StreamableHttpTransport {
    async fn initialize(&self) -> Result<InitializeResult, TransportError> {
        let negotiator = &self.settings.negotiator;
        let params = InitializeRequestParams::new(
            negotiator.latest(),
            self.settings.client_info.clone(),
        );
        let params = serde_json::to_value(params)
            .map_err(|e| TransportError::Protocol(e.into()))?;

        let (raw, headers) = self.send_request(methods::INITIALIZE, Some(params)).await?;
        let mut result: InitializeResult = serde_json::from_value(raw.clone()).map_err(|e| {
            TransportError::InvalidResponse(format!("malformed initialize result: {e}"))
        })?;

        if result.protocol_version.is_empty() {
            let header = headers
                .get(MCP_PROTOCOL_VERSION_HEADER)
                .and_then(|value| value.to_str().ok());
            result.protocol_version = negotiator.detect_version_from_response(header, &raw);
            warn!(
                "Server omitted protocolVersion, inferred {}",
                result.protocol_version
            );
        }

        let negotiated = negotiator.negotiate_version(&[result.protocol_version.as_str()]);
        *self.protocol_version.write().await = Some(negotiated);

        if let Err(e) = self.notify(methods::INITIALIZED, None).await {
            warn!("initialized notification was not acknowledged: {}", e);
        }

        Ok(result)
    }

    fn name(&self) -> TransportType {
        TransportType::StreamableHttp
    }

    fn supports_session_management(&self) -> bool {
        true
    }

    /// Ends the server-side session when one was issued
    async fn close(&self) -> Result<(), TransportError> {
        let Some(session) = self.session_id.write().await.take() else {
            return Ok(());
        };

        let response = self
            .settings
            .client
            .delete(self.endpoint.clone())
            .headers(self.settings.headers.clone())
            .header(MCP_SESSION_ID_HEADER, session.as_str())
            .timeout(self.settings.timeout)
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(e, self.settings.timeout))?;

        let status = response.status();
        if status.is_success() || status.as_u16() == 404 || status.as_u16() == 405 {
            debug!("Session {} closed ({})", session, status);
            Ok(())
        } else {
            let headers = response.headers().clone();
            let body = response.text().await.unwrap_or_default();
            Err(TransportError::from_status(status.as_u16(), &headers, body))
        }
    }

    async fn list_tools(&self) -> Result<ListToolsResult, TransportError> {
        self.call(methods::TOOLS_LIST, Some(json!({}))).await
    }

    async fn list_resources(&self) -> Result<ListResourcesResult, TransportError> {
        self.call(methods::RESOURCES_LIST, Some(json!({}))).await
    }

    async fn list_prompts(&self) -> Result<ListPromptsResult, TransportError> {
        self.call(methods::PROMPTS_LIST, Some(json!({}))).await
    }
}
