//! HTTP client and authentication configuration shared by all bindings

use crate::TransportError;
use mcp_compliance_protocol::{Implementation, VersionNegotiator};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use reqwest::redirect::Policy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Connection pool settings, applied once when the clients are built
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpClientConfig {
    /// Maximum idle connections kept per host
    pub pool_max_idle_per_host: usize,

    /// Seconds an idle pooled connection is kept
    pub pool_idle_timeout_secs: u64,

    /// TCP keep-alive interval in seconds (disabled when absent)
    pub tcp_keepalive_secs: Option<u64>,

    /// User agent sent with every request
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            pool_max_idle_per_host: 10,
            pool_idle_timeout_secs: 90,
            tcp_keepalive_secs: Some(60),
            user_agent: format!("mcp-compliance/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl HttpClientConfig {
    fn builder(&self) -> reqwest::ClientBuilder {
        let mut builder = reqwest::Client::builder()
            .pool_max_idle_per_host(self.pool_max_idle_per_host)
            .pool_idle_timeout(Duration::from_secs(self.pool_idle_timeout_secs))
            .user_agent(self.user_agent.clone());
        if let Some(secs) = self.tcp_keepalive_secs {
            builder = builder.tcp_keepalive(Duration::from_secs(secs));
        }
        builder
    }

    /// Client used for transport traffic.
    ///
    /// No client-level timeout is set: the event-stream GET must stay open, so
    /// request/response calls carry their own per-request timeout instead.
    pub fn build_client(&self) -> Result<reqwest::Client, TransportError> {
        self.builder()
            .build()
            .map_err(|e| TransportError::Config(format!("Failed to create HTTP client: {e}")))
    }

    /// Client used for detection probes; redirects are not followed
    pub fn build_probe_client(&self) -> Result<reqwest::Client, TransportError> {
        self.builder()
            .redirect(Policy::none())
            .build()
            .map_err(|e| TransportError::Config(format!("Failed to create probe client: {e}")))
    }
}

/// Credentials attached to every outbound request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Sent as `Authorization: Bearer <token>`
    pub bearer_token: Option<String>,

    /// Custom headers, e.g. an API key header
    pub headers: HashMap<String, String>,
}

impl AuthConfig {
    /// Whether no credentials are configured
    pub fn is_empty(&self) -> bool {
        self.bearer_token.is_none() && self.headers.is_empty()
    }

    /// Render the configuration as request headers
    pub fn header_map(&self) -> Result<HeaderMap, TransportError> {
        let mut headers = HeaderMap::new();

        if let Some(ref token) = self.bearer_token {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| TransportError::Config(format!("Invalid bearer token: {e}")))?;
            headers.insert(AUTHORIZATION, value);
        }

        for (key, value) in &self.headers {
            let name = HeaderName::from_bytes(key.as_bytes()).map_err(|e| {
                TransportError::Config(format!("Invalid header name '{key}': {e}"))
            })?;
            let value = HeaderValue::from_str(value).map_err(|e| {
                TransportError::Config(format!("Invalid value for header '{key}': {e}"))
            })?;
            headers.insert(name, value);
        }

        Ok(headers)
    }
}

/// Everything a binding needs for one validation run
#[derive(Debug, Clone)]
pub struct TransportSettings {
    /// Shared, pooled client
    pub client: reqwest::Client,

    /// Per-request timeout for request/response calls
    pub timeout: Duration,

    /// Extra headers (credentials) sent with every request
    pub headers: HeaderMap,

    /// Identity announced in `initialize`
    pub client_info: Implementation,

    /// Protocol versions offered and accepted
    pub negotiator: VersionNegotiator,
}

impl TransportSettings {
    /// Settings with no extra headers and the default client identity
    pub fn new(client: reqwest::Client, timeout: Duration) -> Self {
        Self {
            client,
            timeout,
            headers: HeaderMap::new(),
            client_info: Implementation::new("mcp-compliance-validator", env!("CARGO_PKG_VERSION")),
            negotiator: VersionNegotiator::new(),
        }
    }

    /// Send these headers with every request
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Announce a different client identity
    pub fn with_client_info(mut self, client_info: Implementation) -> Self {
        self.client_info = client_info;
        self
    }

    /// Offer a different set of protocol versions
    pub fn with_negotiator(mut self, negotiator: VersionNegotiator) -> Self {
        self.negotiator = negotiator;
        self
    }
}
