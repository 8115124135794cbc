//! Retry wrapper with exponential backoff
//!
//! Re-runs a validation when the failure looks transient: a connection that
//! could not be established, a timeout, a DNS hiccup. Failures a retry cannot
//! fix (a wrong protocol version, missing credentials) are returned after the
//! first attempt.

use crate::catalog::codes;
use crate::config::ValidationOptions;
use crate::report::{IssueLevel, ValidationResult};
use crate::validator::Validator;
use crate::{Result, ValidationError};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Retry policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts including the first; 0 and 1 both mean no retries
    pub max_attempts: u32,

    /// Delay before the first retry
    pub initial_delay_ms: u64,

    /// Upper bound for any single delay
    pub max_delay_ms: u64,

    /// Growth factor applied per retry
    pub multiplier: f64,

    /// Case-insensitive substrings marking an error as transient
    pub retryable_errors: Vec<String>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 500,
            max_delay_ms: 5_000,
            multiplier: 2.0,
            retryable_errors: default_retryable_errors(),
        }
    }
}

fn default_retryable_errors() -> Vec<String> {
    [
        "connection refused",
        "connection reset",
        "timeout",
        "timed out",
        "no such host",
        "dns error",
        "temporary failure in name resolution",
        "network is unreachable",
        "broken pipe",
        "unexpected eof",
        "service unavailable",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl RetryConfig {
    /// Policy that never retries
    pub fn disabled() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Set the total number of attempts
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Set the first backoff delay and its cap
    pub fn with_delays(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_delay_ms = u64::try_from(initial.as_millis()).unwrap_or(u64::MAX);
        self.max_delay_ms = u64::try_from(max.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Delay before retry number `retry` (0-based): `initial * multiplier^retry`, capped
    pub fn delay_for_attempt(&self, retry: u32) -> Duration {
        let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
        let millis = self.initial_delay_ms as f64 * self.multiplier.powi(exponent);
        let capped = millis.min(self.max_delay_ms as f64);
        Duration::from_millis(capped as u64)
    }

    /// Whether `message` contains one of the retryable patterns
    pub fn is_retryable_message(&self, message: &str) -> bool {
        let message = message.to_lowercase();
        self.retryable_errors
            .iter()
            .any(|pattern| message.contains(&pattern.to_lowercase()))
    }

    /// Whether a run outcome is worth another attempt
    pub fn is_retryable(&self, outcome: &Result<ValidationResult>) -> bool {
        match outcome {
            Ok(result) => {
                // Credentials, not time, fix an auth failure
                if result.requires_auth {
                    return false;
                }
                result.issues.iter().any(|issue| {
                    codes::TRANSPORT_ESTABLISHMENT.contains(&issue.code.as_str())
                        || self.is_retryable_message(&issue.message)
                })
            }
            Err(ValidationError::Cancelled) => false,
            Err(e) if e.is_configuration_issue() => false,
            Err(e) => e.is_recoverable() || self.is_retryable_message(&e.to_string()),
        }
    }

    /// Reject unusable retry settings
    pub fn validate(&self) -> Result<()> {
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(ValidationError::configuration(
                "Retry multiplier must be at least 1.0",
            ));
        }
        if self.initial_delay_ms > self.max_delay_ms {
            return Err(ValidationError::configuration(
                "Initial retry delay must not exceed the maximum delay",
            ));
        }
        Ok(())
    }
}

/// Runs a [`Validator`] under a [`RetryConfig`]
pub struct RetryingValidator {
    validator: Validator,
    config: RetryConfig,
}

impl RetryingValidator {
    /// Wrap `validator` with the retry policy
    pub fn new(validator: Validator, config: RetryConfig) -> Self {
        Self { validator, config }
    }

    /// Wrapped validator
    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    /// Retry policy
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Validate with retries
    pub async fn validate(
        &self,
        server_url: &str,
        options: &ValidationOptions,
    ) -> Result<ValidationResult> {
        self.validate_with_cancellation(server_url, options, &CancellationToken::new())
            .await
    }

    /// Validate with retries until `cancel` fires.
    ///
    /// Cancellation aborts both a running attempt and a backoff sleep, and is
    /// reported as [`ValidationError::Cancelled`] without a result.
    pub async fn validate_with_cancellation(
        &self,
        server_url: &str,
        options: &ValidationOptions,
        cancel: &CancellationToken,
    ) -> Result<ValidationResult> {
        let max_attempts = self.config.max_attempts;
        if max_attempts <= 1 {
            return tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(ValidationError::Cancelled),
                outcome = self.validator.validate(server_url, options) => outcome,
            };
        }

        let mut retries = 0u32;

        loop {
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ValidationError::Cancelled),
                outcome = self.validator.validate(server_url, options) => outcome,
            };
            let attempt = retries + 1;

            if matches!(&outcome, Ok(result) if result.success) {
                if retries > 0 {
                    info!("{} validated after {} retries", server_url, retries);
                }
                return self.finish(server_url, retries, outcome);
            }

            if !self.config.is_retryable(&outcome) {
                debug!("Attempt {} for {} is not retryable", attempt, server_url);
                return self.finish(server_url, retries, outcome);
            }

            if attempt >= max_attempts {
                warn!(
                    "Giving up on {} after {} attempts",
                    server_url, attempt
                );
                let outcome = outcome.map(|mut result| {
                    let issue = self.validator.catalog().issue(
                        IssueLevel::Info,
                        codes::RETRIES_EXHAUSTED,
                        format!("Validation still failing after {attempt} attempts"),
                    );
                    result.add_issue(issue);
                    result
                });
                return self.finish(server_url, retries, outcome);
            }

            let delay = self.config.delay_for_attempt(retries);
            warn!(
                "Attempt {}/{} for {} failed, retrying in {:?}",
                attempt, max_attempts, server_url, delay
            );
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ValidationError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
            retries += 1;
        }
    }

    fn finish(
        &self,
        server_url: &str,
        retries: u32,
        outcome: Result<ValidationResult>,
    ) -> Result<ValidationResult> {
        if retries > 0 {
            self.validator.metrics().record_retries(server_url, retries);
        }
        outcome
    }
}
