//! Client-side transport bindings for MCP compliance checking
//!
//! This crate speaks to a remote MCP server over either of the two HTTP
//! bindings: the request/response "streamable HTTP" binding and the legacy
//! event-stream (SSE) binding. It can also work out which of the two a server
//! speaks without being told.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use mcp_compliance_transport::{
//!     HttpClientConfig, Transport, TransportDetector, TransportFactory, TransportSettings,
//! };
//! use std::time::Duration;
//!
//! # async fn run() -> Result<(), mcp_compliance_transport::TransportError> {
//! let http = HttpClientConfig::default();
//! let detector = TransportDetector::new(http.build_probe_client()?, Duration::from_secs(10));
//! let base = url::Url::parse("http://localhost:3000").unwrap();
//!
//! let detection = detector.detect(&base, None).await?;
//! let settings = TransportSettings::new(http.build_client()?, Duration::from_secs(10));
//! let transport = TransportFactory::create(detection.transport, detection.endpoint, settings)?;
//! if let Some(sse) = transport.as_sse() {
//!     sse.connect().await?;
//! }
//! let result = transport.initialize().await?;
//! println!("server speaks {}", result.protocol_version);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod detector;
pub mod sse;
pub mod streamable_http;

#[cfg(test)]
mod test_support;

use async_trait::async_trait;
use mcp_compliance_protocol::{
    InitializeResult, ListPromptsResult, ListResourcesResult, ListToolsResult, ProtocolError,
};
use reqwest::header::{HeaderMap, WWW_AUTHENTICATE};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error as ThisError;
use url::Url;

pub use config::{AuthConfig, HttpClientConfig, TransportSettings};
pub use detector::{Detection, PROBE_TIMEOUT_CAP, TransportDetector};
pub use sse::{ENDPOINT_DISCOVERY_TIMEOUT, RESPONSE_WAIT_TIMEOUT, SseTransport};
pub use streamable_http::StreamableHttpTransport;

/// Default path of the request/response binding
pub const STREAMABLE_HTTP_DEFAULT_PATH: &str = "/mcp";

/// Default path of the event-stream binding
pub const SSE_DEFAULT_PATH: &str = "/sse";

/// Errors raised while talking to a server
#[derive(Debug, ThisError)]
pub enum TransportError {
    /// Invalid client settings, URL or headers
    #[error("Transport configuration error: {0}")]
    Config(String),

    /// The server could not be reached or the stream broke
    #[error("Connection error: {0}")]
    Connection(String),

    /// No answer within the configured timeout
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Non-success status other than 401
    #[error("HTTP {status}: {body}")]
    Http {
        /// Status code
        status: u16,
        /// Response body
        body: String,
    },

    /// The server answered 401
    #[error("Authentication required (HTTP 401, scheme: {})", .scheme.as_deref().unwrap_or("unknown"))]
    Unauthorized {
        /// Scheme named in `WWW-Authenticate`
        scheme: Option<String>,
        /// Response body
        body: String,
    },

    /// The body is not the expected JSON-RPC payload
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The response answers a different request
    #[error("Response id mismatch: expected {expected}, got {actual}")]
    IdMismatch {
        /// Id of the request sent
        expected: i64,
        /// Id the server returned
        actual: String,
    },

    /// The server returned a JSON-RPC error object
    #[error("JSON-RPC error {code}: {message}")]
    Rpc {
        /// JSON-RPC error code
        code: i64,
        /// JSON-RPC error message
        message: String,
    },

    /// The event stream opened but no `endpoint` event arrived
    #[error("Server did not announce a message endpoint within {0:?}")]
    EndpointNotAnnounced(Duration),

    /// The POST was accepted but its response never showed up on the stream
    #[error("No JSON-RPC response arrived on the event stream within {0:?}")]
    ResponseNotReceived(Duration),

    /// `initialize` was called before `connect`
    #[error("Transport is not connected")]
    NotConnected,

    /// The binding cannot perform the operation
    #[error("{operation} is not implemented for the {transport} transport")]
    NotImplemented {
        /// Operation that was requested
        operation: &'static str,
        /// Binding that lacks it
        transport: TransportType,
    },

    /// No binding answered at any probed endpoint
    #[error("Could not detect an MCP transport (tried {})", .attempted.join(", "))]
    DetectionFailed {
        /// Endpoints that were probed
        attempted: Vec<String>,
    },

    /// Encoding or decoding failed
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

impl TransportError {
    /// Map a reqwest failure, keeping the whole source chain in the message
    pub fn from_reqwest(error: reqwest::Error, timeout: Duration) -> Self {
        if error.is_timeout() {
            return Self::Timeout(timeout);
        }
        Self::Connection(error_chain(&error))
    }

    /// Build an error for a non-success status
    pub fn from_status(status: u16, headers: &HeaderMap, body: String) -> Self {
        if status == 401 {
            Self::Unauthorized {
                scheme: auth_scheme(headers),
                body,
            }
        } else {
            Self::Http { status, body }
        }
    }

    /// Whether the server asked for credentials
    pub fn is_auth_error(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }

    /// Authentication scheme named by the server, if any
    pub fn auth_scheme(&self) -> Option<&str> {
        match self {
            Self::Unauthorized { scheme, .. } => scheme.as_deref(),
            _ => None,
        }
    }
}

fn error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}

/// First token of the `WWW-Authenticate` header, e.g. `Bearer`
pub fn auth_scheme(headers: &HeaderMap) -> Option<String> {
    headers
        .get(WWW_AUTHENTICATE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split_whitespace().next())
        .map(|scheme| scheme.trim_end_matches(',').to_string())
        .filter(|scheme| !scheme.is_empty())
}

/// Whether a content type carries JSON
pub fn is_json_content_type(content_type: &str) -> bool {
    let content_type = content_type.to_ascii_lowercase();
    content_type.contains("application/json") || content_type.contains("+json")
}

/// Whether a content type announces event-stream framing
pub fn is_event_stream_content_type(content_type: &str) -> bool {
    content_type
        .to_ascii_lowercase()
        .contains(mcp_compliance_protocol::EVENT_STREAM_CONTENT_TYPE)
}

pub(crate) fn content_type(headers: &HeaderMap) -> String {
    headers
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

/// The wire binding a server speaks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransportType {
    /// POST-based request/response binding
    StreamableHttp,
    /// Legacy long-lived event-stream binding
    Sse,
    /// Detection failed
    Unknown,
}

impl TransportType {
    /// Name used on the command line and in reports
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StreamableHttp => "streamable-http",
            Self::Sse => "sse",
            Self::Unknown => "unknown",
        }
    }

    /// Path probed and used when the caller configures none
    pub fn default_path(&self) -> Option<&'static str> {
        match self {
            Self::StreamableHttp => Some(STREAMABLE_HTTP_DEFAULT_PATH),
            Self::Sse => Some(SSE_DEFAULT_PATH),
            Self::Unknown => None,
        }
    }
}

impl fmt::Display for TransportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransportType {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "streamable-http" | "streamable_http" | "http" => Ok(Self::StreamableHttp),
            "sse" => Ok(Self::Sse),
            other => Err(TransportError::Config(format!(
                "unknown transport '{other}', expected 'streamable-http' or 'sse'"
            ))),
        }
    }
}

/// Join a configured or default path onto a base URL.
///
/// A query in `path` (e.g. `/mcp?key=abc`) replaces the base URL's query;
/// otherwise the base query is kept.
pub fn endpoint_url(base: &Url, path: &str) -> Url {
    let (path, query) = match path.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (path, None),
    };

    let mut url = base.clone();
    let joined = format!(
        "{}/{}",
        base.path().trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    url.set_path(&joined);
    if let Some(query) = query {
        url.set_query(Some(query).filter(|q| !q.is_empty()));
    }
    url
}

/// Operations every binding offers to the validation engine
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform the `initialize` handshake
    async fn initialize(&self) -> Result<InitializeResult, TransportError>;

    /// Binding this transport speaks
    fn name(&self) -> TransportType;

    /// Whether the binding tracks a server-issued session id
    fn supports_session_management(&self) -> bool;

    /// Release the session or stream
    async fn close(&self) -> Result<(), TransportError>;

    /// Call `tools/list`
    async fn list_tools(&self) -> Result<ListToolsResult, TransportError>;

    /// Call `resources/list`
    async fn list_resources(&self) -> Result<ListResourcesResult, TransportError>;

    /// Call `prompts/list`
    async fn list_prompts(&self) -> Result<ListPromptsResult, TransportError>;
}

/// The two concrete bindings behind one type
pub enum McpTransport {
    /// Request/response binding
    StreamableHttp(StreamableHttpTransport),
    /// Legacy event-stream binding
    Sse(SseTransport),
}

impl McpTransport {
    /// The event-stream binding, which needs `connect` before `initialize`
    pub fn as_sse(&self) -> Option<&SseTransport> {
        match self {
            Self::Sse(transport) => Some(transport),
            Self::StreamableHttp(_) => None,
        }
    }

    /// URL the binding talks to
    pub fn endpoint(&self) -> &Url {
        match self {
            Self::StreamableHttp(transport) => transport.endpoint(),
            Self::Sse(transport) => transport.endpoint(),
        }
    }
}

#[async_trait]
impl Transport for McpTransport {
    async fn initialize(&self) -> Result<InitializeResult, TransportError> {
        match self {
            Self::StreamableHttp(transport) => transport.initialize().await,
            Self::Sse(transport) => transport.initialize().await,
        }
    }

    fn name(&self) -> TransportType {
        match self {
            Self::StreamableHttp(transport) => transport.name(),
            Self::Sse(transport) => transport.name(),
        }
    }

    fn supports_session_management(&self) -> bool {
        match self {
            Self::StreamableHttp(transport) => transport.supports_session_management(),
            Self::Sse(transport) => transport.supports_session_management(),
        }
    }

    async fn close(&self) -> Result<(), TransportError> {
        match self {
            Self::StreamableHttp(transport) => transport.close().await,
            Self::Sse(transport) => transport.close().await,
        }
    }

    async fn list_tools(&self) -> Result<ListToolsResult, TransportError> {
        match self {
            Self::StreamableHttp(transport) => transport.list_tools().await,
            Self::Sse(transport) => transport.list_tools().await,
        }
    }

    async fn list_resources(&self) -> Result<ListResourcesResult, TransportError> {
        match self {
            Self::StreamableHttp(transport) => transport.list_resources().await,
            Self::Sse(transport) => transport.list_resources().await,
        }
    }

    async fn list_prompts(&self) -> Result<ListPromptsResult, TransportError> {
        match self {
            Self::StreamableHttp(transport) => transport.list_prompts().await,
            Self::Sse(transport) => transport.list_prompts().await,
        }
    }
}

/// Builds the binding selected by detection or by the caller
pub struct TransportFactory;

impl TransportFactory {
    /// Build a `kind` binding for `endpoint`; only http(s) URLs are accepted
    pub fn create(
        kind: TransportType,
        endpoint: Url,
        settings: TransportSettings,
    ) -> Result<McpTransport, TransportError> {
        match endpoint.scheme() {
            "http" | "https" => {}
            other => {
                return Err(TransportError::Config(format!(
                    "unsupported scheme '{other}' for endpoint {endpoint}"
                )));
            }
        }

        match kind {
            TransportType::StreamableHttp => Ok(McpTransport::StreamableHttp(
                StreamableHttpTransport::new(endpoint, settings),
            )),
            TransportType::Sse => Ok(McpTransport::Sse(SseTransport::new(endpoint, settings))),
            TransportType::Unknown => Err(TransportError::Config(
                "cannot create a transport of unknown type".to_string(),
            )),
        }
    }
}
