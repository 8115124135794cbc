//! Configuration for the validator and for individual runs

use crate::retry::RetryConfig;
use crate::{DEFAULT_TIMEOUT_SECONDS, Result, ValidationError};
use mcp_compliance_transport::{AuthConfig, HttpClientConfig, TransportType};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Capability names that may be required of a server
pub const KNOWN_CAPABILITIES: &[&str] = &["tools", "resources", "prompts", "logging"];

/// Validator configuration, usually loaded once per process
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Connection pool settings for the shared HTTP clients
    pub http: HttpClientConfig,

    /// Credentials sent with every request
    pub auth: AuthConfig,

    /// Defaults for each run
    pub defaults: DefaultsConfig,

    /// Retry policy used by the retry wrapper
    pub retry: RetryConfig,
}

/// Per-run defaults, turned into [`ValidationOptions`] by [`DefaultsConfig::options`]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultsConfig {
    /// Per-request timeout in seconds
    pub timeout_secs: u64,

    /// Fail the run on warnings too
    pub strict: bool,

    /// Endpoint path overriding `/mcp` and `/sse`
    pub path: Option<String>,

    /// Skip detection and use this binding
    pub transport: Option<TransportType>,

    /// Capabilities the server must advertise
    pub required_capabilities: Vec<String>,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECONDS,
            strict: false,
            path: None,
            transport: None,
            required_capabilities: Vec::new(),
        }
    }
}

impl DefaultsConfig {
    /// Per-run options built from these defaults
    pub fn options(&self) -> ValidationOptions {
        ValidationOptions {
            required_capabilities: self.required_capabilities.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
            strict: self.strict,
            path: self.path.clone(),
            transport: self.transport,
        }
    }
}

impl ValidatorConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ValidationError::configuration(format!("Failed to read config file: {e}"))
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| {
            ValidationError::configuration(format!("Failed to parse config file: {e}"))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Override fields from `MCP_VALIDATOR_*` variables looked up through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(timeout) = lookup("MCP_VALIDATOR_TIMEOUT") {
            self.defaults.timeout_secs = timeout.trim().parse().map_err(|e| {
                ValidationError::configuration(format!("Invalid MCP_VALIDATOR_TIMEOUT: {e}"))
            })?;
        }

        if let Some(token) = lookup("MCP_VALIDATOR_TOKEN").filter(|t| !t.is_empty()) {
            self.auth.bearer_token = Some(token);
        }

        if let Some(path) = lookup("MCP_VALIDATOR_PATH").filter(|p| !p.is_empty()) {
            self.defaults.path = Some(path);
        }

        if let Some(attempts) = lookup("MCP_VALIDATOR_MAX_ATTEMPTS") {
            self.retry.max_attempts = attempts.trim().parse().map_err(|e| {
                ValidationError::configuration(format!("Invalid MCP_VALIDATOR_MAX_ATTEMPTS: {e}"))
            })?;
        }

        if let Some(strict) = lookup("MCP_VALIDATOR_STRICT") {
            self.defaults.strict = parse_flag(&strict).ok_or_else(|| {
                ValidationError::configuration(format!(
                    "Invalid MCP_VALIDATOR_STRICT: '{strict}' is not a boolean"
                ))
            })?;
        }

        Ok(())
    }

    /// Validate configuration settings
    pub fn validate(&self) -> Result<()> {
        self.defaults.options().validate()?;
        self.retry.validate()?;
        self.auth.header_map()?;
        Ok(())
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Options for one validation run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationOptions {
    /// Capabilities the server must advertise
    pub required_capabilities: Vec<String>,

    /// Per-request timeout
    pub timeout: Duration,

    /// Fail the run on warning-level issues too
    pub strict: bool,

    /// Endpoint path overriding both default paths
    pub path: Option<String>,

    /// Use this binding instead of detecting one
    pub transport: Option<TransportType>,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        DefaultsConfig::default().options()
    }
}

impl ValidationOptions {
    /// Options with the built-in defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the per-request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Require these capabilities
    pub fn with_required_capabilities<I, S>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_capabilities = capabilities.into_iter().map(Into::into).collect();
        self
    }

    /// Treat warnings as failures
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Use this endpoint path instead of `/mcp` or `/sse`
    pub fn with_path<S: Into<String>>(mut self, path: S) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Skip detection and use this binding
    pub fn with_transport(mut self, transport: TransportType) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Reject unusable option values
    pub fn validate(&self) -> Result<()> {
        if self.timeout.is_zero() {
            return Err(ValidationError::configuration(
                "Timeout must be greater than 0",
            ));
        }

        for capability in &self.required_capabilities {
            if !KNOWN_CAPABILITIES.contains(&capability.as_str()) {
                return Err(ValidationError::configuration(format!(
                    "Unknown capability '{capability}', expected one of: {}",
                    KNOWN_CAPABILITIES.join(", ")
                )));
            }
        }

        if self.transport == Some(TransportType::Unknown) {
            return Err(ValidationError::configuration(
                "Transport override must be streamable-http or sse",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = ValidatorConfig::default();
        assert!(config.validate().is_ok());

        let options = config.defaults.options();
        assert_eq!(options.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECONDS));
        assert!(!options.strict);
        assert!(options.path.is_none());
        assert!(options.transport.is_none());
        assert_eq!(config.retry.max_attempts, 3);
    }

    #[test]
    fn test_options_validation() {
        assert!(ValidationOptions::new().validate().is_ok());

        let options = ValidationOptions::new().with_timeout(Duration::ZERO);
        assert!(options.validate().is_err());

        let options = ValidationOptions::new().with_required_capabilities(["tools", "sampling"]);
        let err = options.validate().unwrap_err();
        assert!(err.to_string().contains("sampling"));

        let options = ValidationOptions::new()
            .with_required_capabilities(["tools", "resources", "prompts", "logging"]);
        assert!(options.validate().is_ok());

        let options = ValidationOptions::new().with_transport(TransportType::Unknown);
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_config_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[http]
pool_max_idle_per_host = 4

[auth]
bearer_token = "abc123"

[auth.headers]
X-API-Key = "key"

[defaults]
timeout_secs = 5
strict = true
path = "/custom"
transport = "sse"
required_capabilities = ["tools"]

[retry]
max_attempts = 5
initial_delay_ms = 50
            "#
        )
        .unwrap();

        let config = ValidatorConfig::from_file(file.path()).unwrap();
        assert_eq!(config.http.pool_max_idle_per_host, 4);
        assert_eq!(config.http.pool_idle_timeout_secs, 90);
        assert_eq!(config.auth.bearer_token.as_deref(), Some("abc123"));
        assert_eq!(config.auth.headers.get("X-API-Key").unwrap(), "key");
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.initial_delay_ms, 50);
        assert_eq!(config.retry.max_delay_ms, 5_000);

        let options = config.defaults.options();
        assert_eq!(options.timeout, Duration::from_secs(5));
        assert!(options.strict);
        assert_eq!(options.path.as_deref(), Some("/custom"));
        assert_eq!(options.transport, Some(TransportType::Sse));
        assert_eq!(options.required_capabilities, vec!["tools"]);
    }

    #[test]
    fn test_config_from_file_rejects_bad_values() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[defaults]\ntimeout_secs = 0").unwrap();
        assert!(ValidatorConfig::from_file(file.path()).is_err());

        let err = ValidatorConfig::from_file("/nonexistent/validator.toml").unwrap_err();
        assert!(err.is_configuration_issue());
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_apply_env() {
        let vars = HashMap::from([
            ("MCP_VALIDATOR_TIMEOUT", "12"),
            ("MCP_VALIDATOR_TOKEN", "tok"),
            ("MCP_VALIDATOR_PATH", "/rpc"),
            ("MCP_VALIDATOR_MAX_ATTEMPTS", "1"),
            ("MCP_VALIDATOR_STRICT", "yes"),
        ]);
        let mut config = ValidatorConfig::default();
        config
            .apply_env(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.defaults.timeout_secs, 12);
        assert_eq!(config.auth.bearer_token.as_deref(), Some("tok"));
        assert_eq!(config.defaults.path.as_deref(), Some("/rpc"));
        assert_eq!(config.retry.max_attempts, 1);
        assert!(config.defaults.strict);
    }

    #[test]
    fn test_apply_env_rejects_garbage() {
        let mut config = ValidatorConfig::default();
        let result = config.apply_env(|key| {
            (key == "MCP_VALIDATOR_STRICT").then(|| "maybe".to_string())
        });
        assert!(result.is_err());

        let result = config.apply_env(|key| {
            (key == "MCP_VALIDATOR_TIMEOUT").then(|| "ten".to_string())
        });
        assert!(result.is_err());
    }
}
