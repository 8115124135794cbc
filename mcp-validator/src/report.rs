//! Validation results and issue tracking

use mcp_compliance_protocol::Implementation;
use mcp_compliance_transport::TransportType;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Severity of a finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueLevel {
    /// Informational message
    Info,
    /// Quality problem that does not fail a lenient run
    Warning,
    /// Compliance failure
    Error,
}

impl IssueLevel {
    /// Lowercase name used in reports
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueLevel::Info => "info",
            IssueLevel::Warning => "warning",
            IssueLevel::Error => "error",
        }
    }
}

impl fmt::Display for IssueLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Individual validation finding
///
/// The guidance fields are filled from the issue catalog when the issue is
/// raised. A code the catalog does not know keeps all three empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// Severity
    pub level: IssueLevel,

    /// Machine-readable code, e.g. `INVALID_PROTOCOL`
    pub code: String,

    /// Human-readable description
    pub message: String,

    /// Actionable remediation steps, in order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,

    /// Where the relevant rules are documented
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documentation_url: Option<String>,

    /// Codes of issues that often appear together with this one
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub related_issues: Vec<String>,
}

impl ValidationIssue {
    /// Create a bare issue without guidance
    pub fn new<C: Into<String>, M: Into<String>>(level: IssueLevel, code: C, message: M) -> Self {
        Self {
            level,
            code: code.into(),
            message: message.into(),
            suggestions: Vec::new(),
            documentation_url: None,
            related_issues: Vec::new(),
        }
    }

    /// Error-level issue without guidance
    pub fn error<C: Into<String>, M: Into<String>>(code: C, message: M) -> Self {
        Self::new(IssueLevel::Error, code, message)
    }

    /// Warning-level issue without guidance
    pub fn warning<C: Into<String>, M: Into<String>>(code: C, message: M) -> Self {
        Self::new(IssueLevel::Warning, code, message)
    }

    /// Info-level issue without guidance
    pub fn info<C: Into<String>, M: Into<String>>(code: C, message: M) -> Self {
        Self::new(IssueLevel::Info, code, message)
    }

    /// Whether catalog guidance has been attached
    pub fn is_enhanced(&self) -> bool {
        !self.suggestions.is_empty() && self.documentation_url.is_some()
    }
}

/// Outcome of one validation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    /// No error-level issue was raised
    pub success: bool,

    /// Full endpoint URL the run talked to
    pub endpoint: String,

    /// Binding used for the run
    pub transport: TransportType,

    /// Version reported by the server; empty when the handshake never completed
    pub protocol_version: String,

    /// Advertised capability names in protocol order
    pub capabilities: Vec<String>,

    /// Server name and version from the handshake
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_info: Option<Implementation>,

    /// Findings in the order they were raised
    pub issues: Vec<ValidationIssue>,

    /// The server answered the handshake with 401
    pub requires_auth: bool,

    /// Scheme named in `WWW-Authenticate`, e.g. `Bearer`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_type: Option<String>,

    /// Wall-clock time of the run
    pub duration: Duration,
}

impl ValidationResult {
    /// Create an empty, successful result for `endpoint`
    pub fn new<S: Into<String>>(endpoint: S) -> Self {
        Self {
            success: true,
            endpoint: endpoint.into(),
            transport: TransportType::Unknown,
            protocol_version: String::new(),
            capabilities: Vec::new(),
            server_info: None,
            issues: Vec::new(),
            requires_auth: false,
            auth_type: None,
            duration: Duration::ZERO,
        }
    }

    /// Append an issue; an error-level issue fails the run
    pub fn add_issue(&mut self, issue: ValidationIssue) {
        if issue.level == IssueLevel::Error {
            self.success = false;
        }
        self.issues.push(issue);
    }

    /// Issues with the given severity
    pub fn issues_by_level(&self, level: IssueLevel) -> Vec<&ValidationIssue> {
        self.issues.iter().filter(|i| i.level == level).collect()
    }

    /// Error-level issues
    pub fn errors(&self) -> Vec<&ValidationIssue> {
        self.issues_by_level(IssueLevel::Error)
    }

    /// Warning-level issues
    pub fn warnings(&self) -> Vec<&ValidationIssue> {
        self.issues_by_level(IssueLevel::Warning)
    }

    /// Number of error-level issues
    pub fn error_count(&self) -> usize {
        self.errors().len()
    }

    /// Whether an issue with `code` was raised
    pub fn has_issue(&self, code: &str) -> bool {
        self.issues.iter().any(|i| i.code == code)
    }

    /// First issue with `code`
    pub fn find_issue(&self, code: &str) -> Option<&ValidationIssue> {
        self.issues.iter().find(|i| i.code == code)
    }

    /// Get status as string
    pub fn status_string(&self) -> &'static str {
        if !self.success {
            "NON-COMPLIANT"
        } else if self.issues.iter().any(|i| i.level == IssueLevel::Warning) {
            "WARNING"
        } else {
            "COMPLIANT"
        }
    }

    /// Generate a summary string
    pub fn summary(&self) -> String {
        format!(
            "MCP Compliance: {} - {} ({}), {} errors, {} warnings",
            self.status_string(),
            self.endpoint,
            self.transport,
            self.error_count(),
            self.warnings().len()
        )
    }
}
