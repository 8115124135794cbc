//! Error types for the MCP wire codec

use thiserror::Error;

/// Errors raised while encoding or decoding protocol messages
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// JSON serialization/deserialization error
    #[error("JSON error: {source}")]
    Json {
        /// Underlying serde error
        #[from]
        source: serde_json::Error,
    },

    /// The message parsed as JSON but is not a valid JSON-RPC envelope
    #[error("Invalid JSON-RPC envelope: {0}")]
    InvalidEnvelope(String),

    /// An event-stream body carried no usable `data:` payload
    #[error("No JSON payload found in event stream")]
    EmptyEventStream,
}

impl ProtocolError {
    /// Create an invalid envelope error
    pub fn invalid_envelope<S: Into<String>>(details: S) -> Self {
        Self::InvalidEnvelope(details.into())
    }
}
