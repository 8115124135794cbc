//! Metrics recording for validation runs
//!
//! The validator reports to a [`MetricsRecorder`] it is given at construction.
//! Exporting to a real metrics backend is left to implementations of the trait.

use crate::report::{IssueLevel, ValidationResult};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Sink for validation metrics.
///
/// Implementations are shared across validators and called concurrently.
pub trait MetricsRecorder: Send + Sync {
    /// Called once at the end of every validation run
    fn record_validation(&self, result: &ValidationResult);

    /// Called by the retry wrapper when at least one retry happened
    fn record_retries(&self, endpoint: &str, retries: u32);
}

/// Recorder that drops everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopRecorder;

impl MetricsRecorder for NoopRecorder {
    fn record_validation(&self, _result: &ValidationResult) {}

    fn record_retries(&self, _endpoint: &str, _retries: u32) {}
}

/// Point-in-time copy of an [`InMemoryRecorder`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Completed validation runs
    pub validations_total: u64,
    /// Runs that passed
    pub validations_succeeded: u64,
    /// Runs that failed
    pub validations_failed: u64,
    /// Sum of retries across all wrapped runs
    pub retries_total: u64,
    /// Wrapped runs that needed at least one retry
    pub retried_validations: u64,
    /// Error-level issues raised
    pub error_issues: u64,
    /// Warning-level issues raised
    pub warning_issues: u64,
    /// Info-level issues raised
    pub info_issues: u64,
    /// Runs that hit an auth challenge
    pub auth_required: u64,
    /// Sum of run durations
    pub total_duration_ms: u64,
}

impl MetricsSnapshot {
    /// Share of passing runs, `0.0` when nothing was recorded
    pub fn success_rate(&self) -> f64 {
        if self.validations_total > 0 {
            self.validations_succeeded as f64 / self.validations_total as f64
        } else {
            0.0
        }
    }

    /// Mean run duration, `0.0` when nothing was recorded
    pub fn average_duration_ms(&self) -> f64 {
        if self.validations_total > 0 {
            self.total_duration_ms as f64 / self.validations_total as f64
        } else {
            0.0
        }
    }
}

/// Recorder keeping counters in memory
#[derive(Debug, Default)]
pub struct InMemoryRecorder {
    validations_total: AtomicU64,
    validations_succeeded: AtomicU64,
    validations_failed: AtomicU64,
    retries_total: AtomicU64,
    retried_validations: AtomicU64,
    error_issues: AtomicU64,
    warning_issues: AtomicU64,
    info_issues: AtomicU64,
    auth_required: AtomicU64,
    total_duration_ms: AtomicU64,
}

impl InMemoryRecorder {
    /// Recorder with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy the current counters
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            validations_total: self.validations_total.load(Ordering::Relaxed),
            validations_succeeded: self.validations_succeeded.load(Ordering::Relaxed),
            validations_failed: self.validations_failed.load(Ordering::Relaxed),
            retries_total: self.retries_total.load(Ordering::Relaxed),
            retried_validations: self.retried_validations.load(Ordering::Relaxed),
            error_issues: self.error_issues.load(Ordering::Relaxed),
            warning_issues: self.warning_issues.load(Ordering::Relaxed),
            info_issues: self.info_issues.load(Ordering::Relaxed),
            auth_required: self.auth_required.load(Ordering::Relaxed),
            total_duration_ms: self.total_duration_ms.load(Ordering::Relaxed),
        }
    }
}

impl MetricsRecorder for InMemoryRecorder {
    fn record_validation(&self, result: &ValidationResult) {
        self.validations_total.fetch_add(1, Ordering::Relaxed);
        if result.success {
            self.validations_succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.validations_failed.fetch_add(1, Ordering::Relaxed);
        }
        if result.requires_auth {
            self.auth_required.fetch_add(1, Ordering::Relaxed);
        }

        for issue in &result.issues {
            let counter = match issue.level {
                IssueLevel::Error => &self.error_issues,
                IssueLevel::Warning => &self.warning_issues,
                IssueLevel::Info => &self.info_issues,
            };
            counter.fetch_add(1, Ordering::Relaxed);
        }

        let millis = u64::try_from(result.duration.as_millis()).unwrap_or(u64::MAX);
        self.total_duration_ms.fetch_add(millis, Ordering::Relaxed);
    }

    fn record_retries(&self, _endpoint: &str, retries: u32) {
        self.retries_total
            .fetch_add(u64::from(retries), Ordering::Relaxed);
        self.retried_validations.fetch_add(1, Ordering::Relaxed);
    }
}
