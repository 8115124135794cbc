//! Error types for validation runs
//!
//! Most things that go wrong with a server are reported as issues inside a
//! [`ValidationResult`](crate::ValidationResult). These errors cover what
//! happens outside a run: bad input, bad configuration, and cancellation.

use mcp_compliance_transport::TransportError;
use thiserror::Error;

/// Result type for validator operations
pub type Result<T> = std::result::Result<T, ValidationError>;

/// Errors that can occur before, around, or instead of a validation run
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Invalid server URL provided
    #[error("Invalid server URL '{url}': {reason}")]
    InvalidServerUrl {
        /// URL as given
        url: String,
        /// Why it was rejected
        reason: String,
    },

    /// Configuration or options error
    #[error("Configuration error: {message}")]
    ConfigurationError {
        /// What is wrong
        message: String,
    },

    /// Transport setup failed outside a run (client construction, bad headers)
    #[error("Transport error: {source}")]
    Transport {
        /// Underlying transport failure
        #[from]
        source: TransportError,
    },

    /// The caller cancelled the run
    #[error("Validation cancelled")]
    Cancelled,
}

impl ValidationError {
    /// Create a new configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::ConfigurationError {
            message: message.into(),
        }
    }

    /// Create a new invalid URL error
    pub fn invalid_url<U: Into<String>, R: Into<String>>(url: U, reason: R) -> Self {
        Self::InvalidServerUrl {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Check if this error is worth another attempt
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ValidationError::Transport {
                source: TransportError::Timeout(_) | TransportError::Connection(_)
            }
        )
    }

    /// Check if this error indicates a configuration problem
    pub fn is_configuration_issue(&self) -> bool {
        matches!(
            self,
            ValidationError::InvalidServerUrl { .. } | ValidationError::ConfigurationError { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_error_categorization() {
        let timeout_error = ValidationError::from(TransportError::Timeout(Duration::from_secs(1)));
        assert!(timeout_error.is_recoverable());
        assert!(!timeout_error.is_configuration_issue());

        let config_error = ValidationError::invalid_url("invalid", "bad format");
        assert!(!config_error.is_recoverable());
        assert!(config_error.is_configuration_issue());

        assert!(!ValidationError::Cancelled.is_recoverable());
    }

    #[test]
    fn test_error_display() {
        let error = ValidationError::configuration("timeout must be greater than 0");
        assert_eq!(
            error.to_string(),
            "Configuration error: timeout must be greater than 0"
        );
        assert_eq!(ValidationError::Cancelled.to_string(), "Validation cancelled");
    }
}
