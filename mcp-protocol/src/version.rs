//! Protocol version negotiation
//!
//! Versions are `YYYY-MM-DD` strings and are ordered by plain string
//! comparison. That ordering only holds while every supported version keeps
//! the date shape.

use crate::SUPPORTED_PROTOCOL_VERSIONS;
use serde_json::Value;
use std::cmp::Ordering;
use tracing::debug;

/// Tracks the versions this client speaks and picks one for a server
#[derive(Debug, Clone)]
pub struct VersionNegotiator {
    /// Newest first
    supported: Vec<String>,
}

impl Default for VersionNegotiator {
    fn default() -> Self {
        Self::new()
    }
}

impl VersionNegotiator {
    /// Negotiator over the built-in supported versions
    pub fn new() -> Self {
        Self::with_versions(SUPPORTED_PROTOCOL_VERSIONS.iter().map(|v| v.to_string()))
    }

    /// Build a negotiator over a custom list; it is sorted newest first
    pub fn with_versions<I, S>(versions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut supported: Vec<String> = versions.into_iter().map(Into::into).collect();
        supported.sort_by(|a, b| compare_versions(b, a));
        supported.dedup();
        Self { supported }
    }

    /// Supported versions, newest first
    pub fn supported(&self) -> &[String] {
        &self.supported
    }

    /// Newest supported version
    pub fn latest(&self) -> &str {
        self.supported.first().map(String::as_str).unwrap_or_default()
    }

    /// Oldest supported version
    pub fn oldest(&self) -> &str {
        self.supported.last().map(String::as_str).unwrap_or_default()
    }

    /// Whether `version` is one of the supported versions
    pub fn is_supported(&self, version: &str) -> bool {
        self.supported.iter().any(|v| v == version)
    }

    /// All supported versions are treated as mutually compatible
    pub fn is_compatible(&self, a: &str, b: &str) -> bool {
        self.is_supported(a) && self.is_supported(b)
    }

    /// Pick the client's most preferred version the server also offers.
    ///
    /// Falls back to the oldest supported version when there is no overlap.
    pub fn negotiate_version<S: AsRef<str>>(&self, server_versions: &[S]) -> String {
        self.supported
            .iter()
            .find(|ours| server_versions.iter().any(|theirs| theirs.as_ref() == ours.as_str()))
            .cloned()
            .unwrap_or_else(|| self.oldest().to_string())
    }

    /// Work out which version a server speaks from what it sent back.
    ///
    /// Checked in order: the version header, the `protocolVersion` body field,
    /// then the shape of the capabilities block. A value that is not supported
    /// falls through to the next source.
    pub fn detect_version_from_response(&self, header: Option<&str>, body: &Value) -> String {
        if let Some(version) = header.map(str::trim).filter(|v| self.is_supported(v)) {
            debug!("Protocol version {} taken from response header", version);
            return version.to_string();
        }

        if let Some(version) = body
            .get("protocolVersion")
            .and_then(Value::as_str)
            .filter(|v| self.is_supported(v))
        {
            debug!("Protocol version {} taken from response body", version);
            return version.to_string();
        }

        let capabilities = body.get("capabilities").unwrap_or(body);
        if capabilities.get("roots").is_some() {
            if let Some(version) = self.supported.first().filter(|v| self.is_supported(v)) {
                return version.clone();
            }
        }
        let tools_list_changed = capabilities
            .get("tools")
            .and_then(|tools| tools.get("listChanged"))
            .is_some();
        if tools_list_changed {
            if let Some(version) = self.supported.get(1) {
                return version.clone();
            }
        }

        self.oldest().to_string()
    }
}

/// Lexical ordering of two date-stamped versions
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    a.cmp(b)
}
