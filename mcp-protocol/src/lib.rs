//! Model Context Protocol wire types for compliance checking
//!
//! This crate holds the pieces of MCP a validator needs to talk to a server:
//! JSON-RPC 2.0 envelopes, the handshake and capability-list payloads,
//! Server-Sent-Event framing, and protocol version negotiation.
//!
//! # Quick Start
//!
//! ```rust
//! use mcp_compliance_protocol::{VersionNegotiator, extract_json_payload};
//!
//! let negotiator = VersionNegotiator::new();
//! assert_eq!(negotiator.negotiate_version(&["2025-03-26", "2024-11-05"]), "2025-03-26");
//!
//! let body = "event: message\ndata: {\"jsonrpc\":\"2.0\",\"id\":1,\"result\":{}}\n\n";
//! assert!(extract_json_payload(body).unwrap().contains("\"result\""));
//! ```

pub mod error;
pub mod model;
pub mod sse;
pub mod version;


pub use error::ProtocolError;
pub use model::*;
pub use sse::{
    EVENT_STREAM_CONTENT_TYPE, SseDecoder, SseEvent, extract_json_payload, has_stream_markers,
    parse_sse_events,
};
pub use version::{VersionNegotiator, compare_versions};

/// Supported protocol versions, newest first
pub const SUPPORTED_PROTOCOL_VERSIONS: &[&str] = &["2025-06-18", "2025-03-26", "2024-11-05"];

/// Newest protocol version the client offers
pub const LATEST_PROTOCOL_VERSION: &str = "2025-06-18";

/// Oldest protocol version the client falls back to
pub const OLDEST_PROTOCOL_VERSION: &str = "2024-11-05";

/// Header carrying the negotiated protocol version
pub const MCP_PROTOCOL_VERSION_HEADER: &str = "MCP-Protocol-Version";

/// Header carrying the session token of the request/response binding
pub const MCP_SESSION_ID_HEADER: &str = "Mcp-Session-Id";

/// Check if a protocol version is supported
pub fn is_protocol_version_supported(version: &str) -> bool {
    SUPPORTED_PROTOCOL_VERSIONS.contains(&version)
}
