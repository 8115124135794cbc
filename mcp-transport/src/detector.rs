//! Transport detection
//!
//! Probes a base URL to learn which binding a server speaks. The
//! request/response binding is tried first and wins whenever both would
//! answer; the event-stream binding is the fallback.

use crate::{
    TransportError, TransportType, content_type, endpoint_url, is_event_stream_content_type,
    is_json_content_type,
};
use mcp_compliance_protocol::{
    EVENT_STREAM_CONTENT_TYPE, Implementation, InitializeRequestParams, LATEST_PROTOCOL_VERSION,
    Request, has_stream_markers, methods,
};
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

/// Upper bound for a single probe, whatever the caller's timeout
pub const PROBE_TIMEOUT_CAP: Duration = Duration::from_secs(2);

/// How long the event-stream probe waits for a first body chunk
const MARKER_READ_TIMEOUT: Duration = Duration::from_millis(250);

/// Outcome of a successful detection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    /// Binding that answered
    pub transport: TransportType,
    /// Full endpoint URL the binding answered on
    pub endpoint: Url,
}

/// Why a single probe did or did not match
#[derive(Debug, Clone, PartialEq, Eq)]
enum ProbeOutcome {
    Detected,
    Rejected(String),
}

/// Issues lightweight probes against candidate endpoints
#[derive(Debug, Clone)]
pub struct TransportDetector {
    client: reqwest::Client,
    timeout: Duration,
    headers: HeaderMap,
}

impl TransportDetector {
    /// `client` should not follow redirects; see
    /// [`HttpClientConfig::build_probe_client`](crate::HttpClientConfig::build_probe_client)
    pub fn new(client: reqwest::Client, timeout: Duration) -> Self {
        Self {
            client,
            timeout,
            headers: HeaderMap::new(),
        }
    }

    /// Attach credentials to the probes
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Timeout applied to each probe
    pub fn probe_timeout(&self) -> Duration {
        self.timeout.min(PROBE_TIMEOUT_CAP)
    }

    /// Detect the binding served under `base_url`.
    ///
    /// A configured path replaces both default paths.
    pub async fn detect(
        &self,
        base_url: &Url,
        configured_path: Option<&str>,
    ) -> Result<Detection, TransportError> {
        let candidates = [TransportType::StreamableHttp, TransportType::Sse].map(|kind| {
            let path = configured_path
                .filter(|p| !p.trim().is_empty())
                .or(kind.default_path())
                .unwrap_or("/");
            (kind, endpoint_url(base_url, path))
        });

        let mut attempted = Vec::with_capacity(candidates.len());
        for (kind, url) in candidates {
            let outcome = match kind {
                TransportType::StreamableHttp => self.probe_streamable_http(&url).await,
                _ => self.probe_sse(&url).await,
            };

            match outcome {
                ProbeOutcome::Detected => {
                    info!("Detected {} transport at {}", kind, url);
                    return Ok(Detection {
                        transport: kind,
                        endpoint: url,
                    });
                }
                ProbeOutcome::Rejected(reason) => {
                    debug!("{} probe at {} rejected: {}", kind, url, reason);
                    attempted.push(url.to_string());
                }
            }
        }

        Err(TransportError::DetectionFailed { attempted })
    }

    async fn probe_streamable_http(&self, url: &Url) -> ProbeOutcome {
        let params = InitializeRequestParams::new(
            LATEST_PROTOCOL_VERSION,
            Implementation::new("mcp-compliance-probe", env!("CARGO_PKG_VERSION")),
        );
        let params = match serde_json::to_value(params) {
            Ok(params) => params,
            Err(e) => return ProbeOutcome::Rejected(format!("could not encode probe: {e}")),
        };
        let probe = Request::new(0, methods::INITIALIZE, Some(params));

        let response = self
            .client
            .post(url.clone())
            .headers(self.headers.clone())
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json, text/event-stream")
            .timeout(self.probe_timeout())
            .json(&probe)
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(e) => return ProbeOutcome::Rejected(e.to_string()),
        };

        let status = response.status().as_u16();
        let content_type = content_type(response.headers());
        classify_streamable_http(status, &content_type)
    }

    async fn probe_sse(&self, url: &Url) -> ProbeOutcome {
        let response = self
            .client
            .get(url.clone())
            .headers(self.headers.clone())
            .header(ACCEPT, EVENT_STREAM_CONTENT_TYPE)
            .timeout(self.probe_timeout())
            .send()
            .await;

        let mut response = match response {
            Ok(response) => response,
            Err(e) => return ProbeOutcome::Rejected(e.to_string()),
        };

        let status = response.status().as_u16();
        let content_type = content_type(response.headers());
        let outcome = classify_sse(status, &content_type);
        if outcome != ProbeOutcome::Detected {
            return outcome;
        }

        // The content type already decided it; markers only add confidence
        match tokio::time::timeout(MARKER_READ_TIMEOUT, response.chunk()).await {
            Ok(Ok(Some(chunk))) if has_stream_markers(&String::from_utf8_lossy(&chunk)) => {
                debug!("Event-stream markers seen at {}", url);
            }
            _ => debug!("No event-stream markers read from {}", url),
        }

        outcome
    }
}

fn classify_streamable_http(status: u16, content_type: &str) -> ProbeOutcome {
    match status {
        200 => ProbeOutcome::Detected,
        401 if is_json_content_type(content_type) => ProbeOutcome::Detected,
        400 => ProbeOutcome::Rejected("server rejected the JSON-RPC payload (400)".to_string()),
        404 | 405 => ProbeOutcome::Rejected(format!("endpoint not served ({status})")),
        other => ProbeOutcome::Rejected(format!(
            "unexpected status {other} with content type '{content_type}'"
        )),
    }
}

fn classify_sse(status: u16, content_type: &str) -> ProbeOutcome {
    if !is_event_stream_content_type(content_type) {
        return ProbeOutcome::Rejected(format!(
            "content type '{content_type}' is not an event stream"
        ));
    }
    match status {
        // 401 means the stream exists behind auth; 403 is treated as absence
        200 | 401 => ProbeOutcome::Detected,
        other => ProbeOutcome::Rejected(format!("unexpected status {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_streamable_http_classification() {
        assert_eq!(classify_streamable_http(200, ""), ProbeOutcome::Detected);
        assert_eq!(
            classify_streamable_http(200, "text/event-stream"),
            ProbeOutcome::Detected
        );
        assert_eq!(
            classify_streamable_http(401, "application/json; charset=utf-8"),
            ProbeOutcome::Detected
        );
        assert!(matches!(
            classify_streamable_http(401, "text/html"),
            ProbeOutcome::Rejected(_)
        ));
        for status in [400, 404, 405, 500] {
            assert!(matches!(
                classify_streamable_http(status, "application/json"),
                ProbeOutcome::Rejected(_)
            ));
        }
    }

    #[test]
    fn test_sse_classification_asymmetry() {
        assert_eq!(classify_sse(200, "text/event-stream"), ProbeOutcome::Detected);
        assert_eq!(classify_sse(401, "text/event-stream"), ProbeOutcome::Detected);
        assert!(matches!(
            classify_sse(403, "text/event-stream"),
            ProbeOutcome::Rejected(_)
        ));
        assert!(matches!(
            classify_sse(200, "application/json"),
            ProbeOutcome::Rejected(_)
        ));
    }

    #[test]
    fn test_probe_timeout_is_capped() {
        let client = reqwest::Client::new();
        let detector = TransportDetector::new(client.clone(), Duration::from_secs(30));
        assert_eq!(detector.probe_timeout(), PROBE_TIMEOUT_CAP);

        let detector = TransportDetector::new(client, Duration::from_millis(500));
        assert_eq!(detector.probe_timeout(), Duration::from_millis(500));
    }
}
