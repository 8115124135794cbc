//! Issue catalog
//!
//! Maps issue codes to remediation guidance. The catalog is an ordinary value
//! owned by the [`Validator`](crate::Validator); callers may register extra
//! templates or override built-in ones.

use crate::report::{IssueLevel, ValidationIssue};
use crate::{Result, ValidationError};
use std::collections::HashMap;

/// Issue codes raised by the validator
pub mod codes {
    /// No binding answered at the server URL
    pub const TRANSPORT_DETECTION_FAILED: &str = "TRANSPORT_DETECTION_FAILED";
    /// A binding was detected but could not be built
    pub const TRANSPORT_CREATION_FAILED: &str = "TRANSPORT_CREATION_FAILED";
    /// The event stream could not be opened or never announced an endpoint
    pub const SSE_CONNECTION_FAILED: &str = "SSE_CONNECTION_FAILED";
    /// The `initialize` handshake failed
    pub const INITIALIZE_FAILED: &str = "INITIALIZE_FAILED";
    /// The server demands credentials
    pub const AUTH_REQUIRED: &str = "AUTH_REQUIRED";
    /// The server reported an unsupported protocol version
    pub const INVALID_PROTOCOL: &str = "INVALID_PROTOCOL";
    /// The handshake result lacks `serverInfo`
    pub const MISSING_SERVER_INFO: &str = "MISSING_SERVER_INFO";
    /// The server advertised no capabilities
    pub const NO_CAPABILITIES: &str = "NO_CAPABILITIES";
    /// A required capability was not advertised
    pub const MISSING_CAPABILITY: &str = "MISSING_CAPABILITY";
    /// `tools/list` failed
    pub const TOOLS_LIST_FAILED: &str = "TOOLS_LIST_FAILED";
    /// `resources/list` failed
    pub const RESOURCES_LIST_FAILED: &str = "RESOURCES_LIST_FAILED";
    /// `prompts/list` failed
    pub const PROMPTS_LIST_FAILED: &str = "PROMPTS_LIST_FAILED";
    /// Every retry attempt failed
    pub const RETRIES_EXHAUSTED: &str = "RETRIES_EXHAUSTED";

    /// Every code the validator can raise
    pub const ALL: &[&str] = &[
        TRANSPORT_DETECTION_FAILED,
        TRANSPORT_CREATION_FAILED,
        SSE_CONNECTION_FAILED,
        INITIALIZE_FAILED,
        AUTH_REQUIRED,
        INVALID_PROTOCOL,
        MISSING_SERVER_INFO,
        NO_CAPABILITIES,
        MISSING_CAPABILITY,
        TOOLS_LIST_FAILED,
        RESOURCES_LIST_FAILED,
        PROMPTS_LIST_FAILED,
        RETRIES_EXHAUSTED,
    ];

    /// Codes that mean a connection could not be established at all
    pub const TRANSPORT_ESTABLISHMENT: &[&str] = &[
        TRANSPORT_DETECTION_FAILED,
        TRANSPORT_CREATION_FAILED,
        SSE_CONNECTION_FAILED,
    ];
}

const SPEC_BASE: &str = "https://modelcontextprotocol.io/specification/2025-06-18";

/// Guidance attached to every issue with a given code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueTemplate {
    /// Issue code this template applies to
    pub code: String,
    /// Remediation steps, in order
    pub suggestions: Vec<String>,
    /// Where the relevant rules are documented
    pub documentation_url: String,
    /// Codes that often appear alongside
    pub related_issues: Vec<String>,
}

impl IssueTemplate {
    /// Template with no suggestions yet
    pub fn new<C: Into<String>, U: Into<String>>(code: C, documentation_url: U) -> Self {
        Self {
            code: code.into(),
            suggestions: Vec::new(),
            documentation_url: documentation_url.into(),
            related_issues: Vec::new(),
        }
    }

    /// Append a remediation step
    pub fn with_suggestion<S: Into<String>>(mut self, suggestion: S) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    /// Append a related issue code
    pub fn with_related<S: Into<String>>(mut self, code: S) -> Self {
        self.related_issues.push(code.into());
        self
    }

    /// Whether the template can fully enhance an issue
    pub fn is_complete(&self) -> bool {
        !self.code.trim().is_empty()
            && !self.suggestions.is_empty()
            && !self.documentation_url.trim().is_empty()
    }
}

/// Registry of issue templates keyed by code
#[derive(Debug, Clone)]
pub struct IssueCatalog {
    templates: HashMap<String, IssueTemplate>,
}

impl Default for IssueCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl IssueCatalog {
    /// Catalog holding the built-in templates
    pub fn new() -> Self {
        let templates = builtin_templates()
            .into_iter()
            .map(|template| (template.code.clone(), template))
            .collect();
        Self { templates }
    }

    /// Catalog with no templates
    pub fn empty() -> Self {
        Self {
            templates: HashMap::new(),
        }
    }

    /// Insert a template, replacing any existing one with the same code.
    ///
    /// Templates must carry a code, at least one suggestion and a documentation
    /// URL, so every enhanced issue gets all three.
    pub fn register(&mut self, template: IssueTemplate) -> Result<()> {
        if !template.is_complete() {
            return Err(ValidationError::configuration(format!(
                "Issue template '{}' needs a code, a suggestion and a documentation URL",
                template.code
            )));
        }
        self.templates.insert(template.code.clone(), template);
        Ok(())
    }

    /// Template registered for `code`
    pub fn get(&self, code: &str) -> Option<&IssueTemplate> {
        self.templates.get(code)
    }

    /// Whether `code` has a template
    pub fn contains(&self, code: &str) -> bool {
        self.templates.contains_key(code)
    }

    /// Number of registered templates
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Whether no template is registered
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Registered codes, sorted
    pub fn codes(&self) -> Vec<&str> {
        let mut codes: Vec<&str> = self.templates.keys().map(String::as_str).collect();
        codes.sort_unstable();
        codes
    }

    /// Attach guidance for the issue's code; unknown codes pass through untouched
    pub fn enhance(&self, mut issue: ValidationIssue) -> ValidationIssue {
        if let Some(template) = self.templates.get(&issue.code) {
            issue.suggestions = template.suggestions.clone();
            issue.documentation_url = Some(template.documentation_url.clone());
            issue.related_issues = template.related_issues.clone();
        }
        issue
    }

    /// Build an issue and enhance it in one step
    pub fn issue<M: Into<String>>(&self, level: IssueLevel, code: &str, message: M) -> ValidationIssue {
        self.enhance(ValidationIssue::new(level, code, message))
    }
}

fn builtin_templates() -> Vec<IssueTemplate> {
    use codes::*;

    let transports = format!("{SPEC_BASE}/basic/transports");
    let lifecycle = format!("{SPEC_BASE}/basic/lifecycle");

    vec![
        IssueTemplate::new(TRANSPORT_DETECTION_FAILED, &transports)
            .with_suggestion("Check that the server is running and reachable from this host")
            .with_suggestion("Serve the streamable HTTP binding at /mcp or the SSE binding at /sse, or pass the path explicitly")
            .with_suggestion("Make sure the endpoint does not redirect; detection probes do not follow redirects")
            .with_related(TRANSPORT_CREATION_FAILED)
            .with_related(SSE_CONNECTION_FAILED),
        IssueTemplate::new(TRANSPORT_CREATION_FAILED, &transports)
            .with_suggestion("Use an http or https URL for the server endpoint")
            .with_suggestion("Choose either the streamable-http or the sse transport")
            .with_related(TRANSPORT_DETECTION_FAILED),
        IssueTemplate::new(SSE_CONNECTION_FAILED, &transports)
            .with_suggestion("Respond to GET with Content-Type: text/event-stream and keep the stream open")
            .with_suggestion("Send an `endpoint` event naming the message URL as soon as the stream opens")
            .with_suggestion("Consider migrating to the streamable HTTP binding")
            .with_related(TRANSPORT_DETECTION_FAILED)
            .with_related(INITIALIZE_FAILED),
        IssueTemplate::new(INITIALIZE_FAILED, &lifecycle)
            .with_suggestion("Answer `initialize` with a JSON-RPC 2.0 result echoing the request id")
            .with_suggestion("Include protocolVersion, capabilities and serverInfo in the result")
            .with_suggestion("Check the server logs for errors raised while handling initialize")
            .with_related(INVALID_PROTOCOL)
            .with_related(AUTH_REQUIRED),
        IssueTemplate::new(AUTH_REQUIRED, format!("{SPEC_BASE}/basic/authorization"))
            .with_suggestion("Supply credentials with --token or a custom auth header")
            .with_suggestion("Allow the initialize handshake without credentials if the server is meant to be public")
            .with_related(INITIALIZE_FAILED),
        IssueTemplate::new(INVALID_PROTOCOL, format!("{SPEC_BASE}/basic/lifecycle#version-negotiation"))
            .with_suggestion("Return one of the supported protocol versions: 2025-06-18, 2025-03-26, 2024-11-05")
            .with_suggestion("Use the date-stamped YYYY-MM-DD version format")
            .with_related(INITIALIZE_FAILED),
        IssueTemplate::new(MISSING_SERVER_INFO, &lifecycle)
            .with_suggestion("Include serverInfo with a non-empty name and a version in the initialize result")
            .with_related(INITIALIZE_FAILED),
        IssueTemplate::new(NO_CAPABILITIES, &lifecycle)
            .with_suggestion("Advertise at least one of tools, resources or prompts in the capabilities object")
            .with_related(MISSING_CAPABILITY),
        IssueTemplate::new(MISSING_CAPABILITY, &lifecycle)
            .with_suggestion("Advertise every capability the server implements in the initialize result")
            .with_suggestion("Drop the capability from the required list if the server is not expected to provide it")
            .with_related(NO_CAPABILITIES),
        IssueTemplate::new(TOOLS_LIST_FAILED, format!("{SPEC_BASE}/server/tools"))
            .with_suggestion("Implement tools/list and return a `tools` array")
            .with_suggestion("Stop advertising the tools capability if tools are not supported")
            .with_related(MISSING_CAPABILITY),
        IssueTemplate::new(RESOURCES_LIST_FAILED, format!("{SPEC_BASE}/server/resources"))
            .with_suggestion("Implement resources/list and return a `resources` array")
            .with_suggestion("Stop advertising the resources capability if resources are not supported")
            .with_related(MISSING_CAPABILITY),
        IssueTemplate::new(PROMPTS_LIST_FAILED, format!("{SPEC_BASE}/server/prompts"))
            .with_suggestion("Implement prompts/list and return a `prompts` array")
            .with_suggestion("Stop advertising the prompts capability if prompts are not supported")
            .with_related(MISSING_CAPABILITY),
        IssueTemplate::new(RETRIES_EXHAUSTED, &transports)
            .with_suggestion("Check whether the server finished starting before validation began")
            .with_suggestion("Increase max_attempts or the retry delays for slow-starting servers")
            .with_related(TRANSPORT_DETECTION_FAILED)
            .with_related(INITIALIZE_FAILED),
    ]
}
