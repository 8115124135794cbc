//! Compliance validation for MCP servers
//!
//! Point the validator at a running server and it works out which HTTP
//! transport the server speaks, performs the initialize handshake, and checks
//! what comes back: the protocol version, the server identity, and the
//! advertised capabilities. Every finding is reported as a coded issue with
//! suggestions and a documentation link.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use mcp_compliance_validator::{ValidationOptions, Validator, ValidatorConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let validator = Validator::new(ValidatorConfig::default())?.with_retries();
//!
//!     let options = ValidationOptions::default().with_required_capabilities(["tools"]);
//!     let result = validator.validate("http://localhost:3000", &options).await?;
//!
//!     if result.success {
//!         println!("Server is compliant ({})", result.transport);
//!     } else {
//!         for issue in &result.issues {
//!             println!("  [{}] {}: {}", issue.level, issue.code, issue.message);
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod catalog;
pub mod config;
pub mod error;
pub mod metrics;
pub mod report;
pub mod retry;
pub mod validator;

pub use catalog::{IssueCatalog, IssueTemplate, codes};
pub use config::{DefaultsConfig, ValidationOptions, ValidatorConfig};
pub use error::{Result, ValidationError};
pub use metrics::{InMemoryRecorder, MetricsRecorder, MetricsSnapshot, NoopRecorder};
pub use report::{IssueLevel, ValidationIssue, ValidationResult};
pub use retry::{RetryConfig, RetryingValidator};
pub use validator::Validator;

pub use mcp_compliance_protocol::{LATEST_PROTOCOL_VERSION, SUPPORTED_PROTOCOL_VERSIONS};
pub use mcp_compliance_transport::TransportType;

/// Default timeout for each request made during a run
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

/// Validate a server URL format
pub fn validate_server_url(url: &str) -> Result<url::Url> {
    let parsed_url =
        url::Url::parse(url).map_err(|e| ValidationError::invalid_url(url, e.to_string()))?;

    // Only HTTP transports are validated
    match parsed_url.scheme() {
        "http" | "https" => Ok(parsed_url),
        scheme => Err(ValidationError::invalid_url(
            url,
            format!("Unsupported scheme: {scheme}. Only http and https are allowed."),
        )),
    }
}
