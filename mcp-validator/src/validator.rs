//! Validation engine
//!
//! One call to [`Validator::validate`] walks a fixed pipeline: detect the
//! transport, create it, run the handshake, then check the version, the server
//! identity and the capabilities. Findings accumulate as issues; only a failure
//! to reach the server or to complete the handshake ends a run early.

use crate::catalog::{IssueCatalog, codes};
use crate::config::{ValidationOptions, ValidatorConfig};
use crate::metrics::{MetricsRecorder, NoopRecorder};
use crate::report::{IssueLevel, ValidationResult};
use crate::retry::RetryingValidator;
use crate::{Result, validate_server_url};
use mcp_compliance_protocol::{InitializeResult, VersionNegotiator};
use mcp_compliance_transport::{
    McpTransport, Transport, TransportDetector, TransportError, TransportFactory,
    TransportSettings, TransportType, endpoint_url,
};
use reqwest::header::HeaderMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use url::Url;

/// Validates MCP servers.
///
/// The HTTP clients are built once here and shared by every run, so a single
/// validator can check many servers, concurrently if the caller wishes.
pub struct Validator {
    config: ValidatorConfig,
    client: reqwest::Client,
    probe_client: reqwest::Client,
    auth_headers: HeaderMap,
    negotiator: VersionNegotiator,
    catalog: IssueCatalog,
    metrics: Arc<dyn MetricsRecorder>,
}

impl Validator {
    /// Create a validator with custom configuration
    pub fn new(config: ValidatorConfig) -> Result<Self> {
        config.validate()?;

        let client = config.http.build_client()?;
        let probe_client = config.http.build_probe_client()?;
        let auth_headers = config.auth.header_map()?;

        Ok(Self {
            config,
            client,
            probe_client,
            auth_headers,
            negotiator: VersionNegotiator::new(),
            catalog: IssueCatalog::new(),
            metrics: Arc::new(NoopRecorder),
        })
    }

    /// Create a validator configured from `MCP_VALIDATOR_*` variables
    pub fn from_env() -> Result<Self> {
        Self::new(ValidatorConfig::from_env()?)
    }

    /// Replace the issue catalog
    pub fn with_catalog(mut self, catalog: IssueCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Record every run with `metrics`
    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsRecorder>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Restrict or extend the accepted protocol versions
    pub fn with_negotiator(mut self, negotiator: VersionNegotiator) -> Self {
        self.negotiator = negotiator;
        self
    }

    /// Configuration the validator was built from
    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Issue catalog used to enhance findings
    pub fn catalog(&self) -> &IssueCatalog {
        &self.catalog
    }

    /// Mutable access for registering extra templates
    pub fn catalog_mut(&mut self) -> &mut IssueCatalog {
        &mut self.catalog
    }

    /// Recorder receiving run outcomes
    pub fn metrics(&self) -> &Arc<dyn MetricsRecorder> {
        &self.metrics
    }

    /// Options built from the configured defaults
    pub fn default_options(&self) -> ValidationOptions {
        self.config.defaults.options()
    }

    /// Wrap this validator with the configured retry policy
    pub fn with_retries(self) -> RetryingValidator {
        let retry = self.config.retry.clone();
        RetryingValidator::new(self, retry)
    }

    /// Validate the server at `server_url`.
    ///
    /// Problems with the server are reported as issues in the returned result.
    /// An `Err` means the run could not start: a bad URL or bad options.
    pub async fn validate(
        &self,
        server_url: &str,
        options: &ValidationOptions,
    ) -> Result<ValidationResult> {
        options.validate()?;
        let base = validate_server_url(server_url)?;

        let started = Instant::now();
        info!("Validating MCP server at {}", base);

        let mut result = ValidationResult::new(base.as_str());
        self.run(&base, options, &mut result).await;

        if options.strict && result.issues.iter().any(|i| i.level >= IssueLevel::Warning) {
            result.success = false;
        }
        result.duration = started.elapsed();

        self.metrics.record_validation(&result);
        info!("{} in {:?}", result.summary(), result.duration);
        Ok(result)
    }

    async fn run(&self, base: &Url, options: &ValidationOptions, result: &mut ValidationResult) {
        let (kind, endpoint) = match options.transport {
            Some(kind) => {
                let path = options
                    .path
                    .as_deref()
                    .filter(|p| !p.trim().is_empty())
                    .or(kind.default_path())
                    .unwrap_or("/");
                debug!("Transport {} set explicitly, skipping detection", kind);
                (kind, endpoint_url(base, path))
            }
            None => {
                let detector = TransportDetector::new(self.probe_client.clone(), options.timeout)
                    .with_headers(self.auth_headers.clone());
                match detector.detect(base, options.path.as_deref()).await {
                    Ok(detection) => (detection.transport, detection.endpoint),
                    Err(e) => {
                        self.raise(
                            result,
                            IssueLevel::Error,
                            codes::TRANSPORT_DETECTION_FAILED,
                            e.to_string(),
                        );
                        return;
                    }
                }
            }
        };
        result.transport = kind;
        result.endpoint = endpoint.to_string();

        let settings = TransportSettings::new(self.client.clone(), options.timeout)
            .with_headers(self.auth_headers.clone())
            .with_negotiator(self.negotiator.clone());
        let transport = match TransportFactory::create(kind, endpoint, settings) {
            Ok(transport) => transport,
            Err(e) => {
                self.raise(
                    result,
                    IssueLevel::Error,
                    codes::TRANSPORT_CREATION_FAILED,
                    format!("Could not create {kind} transport: {e}"),
                );
                return;
            }
        };

        if self.connect(&transport, result).await {
            self.check_server(&transport, options, result).await;
        }

        if let Err(e) = transport.close().await {
            warn!("Failed to close {} transport: {}", kind, e);
        }
    }

    /// Open the event stream when the binding needs it; false ends the run
    async fn connect(&self, transport: &McpTransport, result: &mut ValidationResult) -> bool {
        let Some(sse) = transport.as_sse() else {
            return true;
        };

        match sse.connect().await {
            Ok(message_url) => {
                debug!("Event stream ready, posting to {}", message_url);
                true
            }
            Err(e) if e.is_auth_error() => {
                self.auth_required(result, &e);
                false
            }
            Err(e) => {
                self.raise(
                    result,
                    IssueLevel::Error,
                    codes::SSE_CONNECTION_FAILED,
                    format!("Event stream connection failed: {e}"),
                );
                false
            }
        }
    }

    async fn check_server(
        &self,
        transport: &McpTransport,
        options: &ValidationOptions,
        result: &mut ValidationResult,
    ) {
        let init = match transport.initialize().await {
            Ok(init) => init,
            Err(e) if e.is_auth_error() => {
                self.auth_required(result, &e);
                return;
            }
            Err(e) => {
                self.raise(
                    result,
                    IssueLevel::Error,
                    codes::INITIALIZE_FAILED,
                    format!("Initialize failed: {e}"),
                );
                return;
            }
        };

        self.check_version(&init, result);
        self.check_server_info(&init, result);
        self.check_capabilities(&init, options, result);

        if transport.name() == TransportType::StreamableHttp {
            self.probe_capabilities(transport, &init, result).await;
        } else {
            debug!("Skipping capability probes on the {} transport", transport.name());
        }
    }

    fn auth_required(&self, result: &mut ValidationResult, error: &TransportError) {
        result.requires_auth = true;
        result.auth_type = error.auth_scheme().map(str::to_string);
        let scheme = result.auth_type.as_deref().unwrap_or("unspecified scheme");
        let message = format!("Server requires authentication to initialize ({scheme})");
        self.raise(result, IssueLevel::Warning, codes::AUTH_REQUIRED, message);
        result.success = false;
    }

    fn check_version(&self, init: &InitializeResult, result: &mut ValidationResult) {
        result.protocol_version = init.protocol_version.clone();
        if !self.negotiator.is_supported(&init.protocol_version) {
            self.raise(
                result,
                IssueLevel::Error,
                codes::INVALID_PROTOCOL,
                format!(
                    "Unsupported protocol version '{}', supported versions: {}",
                    init.protocol_version,
                    self.negotiator.supported().join(", ")
                ),
            );
        }
    }

    fn check_server_info(&self, init: &InitializeResult, result: &mut ValidationResult) {
        result.server_info = init.server_info.clone();
        let message = match &init.server_info {
            None => "Server did not provide serverInfo",
            Some(info) if info.name.trim().is_empty() => "serverInfo.name is empty",
            Some(_) => return,
        };
        self.raise(result, IssueLevel::Error, codes::MISSING_SERVER_INFO, message);
    }

    fn check_capabilities(
        &self,
        init: &InitializeResult,
        options: &ValidationOptions,
        result: &mut ValidationResult,
    ) {
        let capabilities = &init.capabilities;
        result.capabilities = capabilities.names();

        if capabilities.is_empty() {
            self.raise(
                result,
                IssueLevel::Warning,
                codes::NO_CAPABILITIES,
                "Server advertised no capabilities",
            );
        }

        for required in &options.required_capabilities {
            if !capabilities.has(required) {
                self.raise(
                    result,
                    IssueLevel::Error,
                    codes::MISSING_CAPABILITY,
                    format!("Required capability '{required}' is not advertised by the server"),
                );
            }
        }
    }

    /// Call the list method of every advertised capability
    async fn probe_capabilities(
        &self,
        transport: &McpTransport,
        init: &InitializeResult,
        result: &mut ValidationResult,
    ) {
        let capabilities = &init.capabilities;

        if capabilities.tools.is_some() {
            match transport.list_tools().await {
                Ok(list) => debug!("tools/list returned {} tools", list.tools.len()),
                Err(e) => self.raise(
                    result,
                    IssueLevel::Warning,
                    codes::TOOLS_LIST_FAILED,
                    format!("tools/list failed: {e}"),
                ),
            }
        }

        if capabilities.resources.is_some() {
            match transport.list_resources().await {
                Ok(list) => debug!("resources/list returned {} resources", list.resources.len()),
                Err(e) => self.raise(
                    result,
                    IssueLevel::Warning,
                    codes::RESOURCES_LIST_FAILED,
                    format!("resources/list failed: {e}"),
                ),
            }
        }

        if capabilities.prompts.is_some() {
            match transport.list_prompts().await {
                Ok(list) => debug!("prompts/list returned {} prompts", list.prompts.len()),
                Err(e) => self.raise(
                    result,
                    IssueLevel::Warning,
                    codes::PROMPTS_LIST_FAILED,
                    format!("prompts/list failed: {e}"),
                ),
            }
        }
    }

    fn raise<M: Into<String>>(
        &self,
        result: &mut ValidationResult,
        level: IssueLevel,
        code: &str,
        message: M,
    ) {
        let issue = self.catalog.issue(level, code, message);
        match level {
            IssueLevel::Error => warn!("[{}] {}", issue.code, issue.message),
            _ => debug!("[{}] {} ({})", issue.code, issue.message, level),
        }
        result.add_issue(issue);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator() -> Validator {
        Validator::new(ValidatorConfig::default()).unwrap()
    }

    #[test]
    fn test_validator_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Validator>();
    }

    #[test]
    fn test_catalog_is_owned_and_extensible() {
        let mut validator = validator();
        assert!(validator.catalog().contains(codes::INITIALIZE_FAILED));

        validator
            .catalog_mut()
            .register(
                crate::catalog::IssueTemplate::new("CUSTOM", "https://example.com")
                    .with_suggestion("custom"),
            )
            .unwrap();
        assert!(validator.catalog().contains("CUSTOM"));

        let validator = validator.with_catalog(IssueCatalog::empty());
        assert!(validator.catalog().is_empty());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = ValidatorConfig::default();
        config.defaults.timeout_secs = 0;
        assert!(Validator::new(config).is_err());
    }

    #[tokio::test]
    async fn test_invalid_url_is_an_error() {
        let validator = validator();
        let options = ValidationOptions::default();

        let err = validator.validate("not-a-url", &options).await.unwrap_err();
        assert!(err.is_configuration_issue());

        let err = validator.validate("ftp://example.com", &options).await.unwrap_err();
        assert!(err.to_string().contains("ftp"));
    }

    #[tokio::test]
    async fn test_invalid_options_are_an_error() {
        let validator = validator();
        let options = ValidationOptions::default().with_required_capabilities(["sampling"]);

        assert!(validator.validate("http://localhost:1", &options).await.is_err());
    }
}
