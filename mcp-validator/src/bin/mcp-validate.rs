//! Command-line tool for validating MCP servers

use anyhow::Context;
use clap::{Parser, ValueEnum};
use mcp_compliance_validator::{
    IssueLevel, TransportType, ValidationResult, Validator, ValidatorConfig,
};
use std::process::ExitCode;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mcp-validate")]
#[command(about = "Check an MCP server for protocol compliance")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Base URL of the server, e.g. http://localhost:3000
    server_url: String,

    /// Configuration file path (TOML)
    #[arg(long, short)]
    config: Option<String>,

    /// Endpoint path to probe instead of /mcp and /sse
    #[arg(long)]
    path: Option<String>,

    /// Skip detection and use this transport (streamable-http or sse)
    #[arg(long)]
    transport: Option<TransportType>,

    /// Per-request timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Bearer token sent with every request
    #[arg(long, env = "MCP_VALIDATOR_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Capability the server must advertise (repeatable)
    #[arg(long = "require", value_name = "CAPABILITY")]
    required: Vec<String>,

    /// Treat warnings as failures
    #[arg(long)]
    strict: bool,

    /// Attempts before giving up (1 disables retries)
    #[arg(long)]
    max_attempts: Option<u32>,

    /// Output format
    #[arg(long, short, value_enum, default_value_t = OutputFormat::Text)]
    output: OutputFormat,

    /// Verbose output
    #[arg(long, short)]
    verbose: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
    Yaml,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match run(&cli).await {
        Ok(result) if result.success => ExitCode::SUCCESS,
        Ok(_) => ExitCode::from(1),
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(2)
        }
    }
}

async fn run(cli: &Cli) -> anyhow::Result<ValidationResult> {
    let config = load_config(cli)?;
    debug!("Using configuration: {:?}", config);

    let validator = Validator::new(config)
        .context("Failed to create validator")?
        .with_retries();
    let options = validator.validator().default_options();

    let result = validator
        .validate(&cli.server_url, &options)
        .await
        .with_context(|| format!("Validation of {} did not run", cli.server_url))?;

    match cli.output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        OutputFormat::Yaml => println!("{}", serde_yaml::to_string(&result)?),
        OutputFormat::Text => print_text_report(&result),
    }

    Ok(result)
}

fn load_config(cli: &Cli) -> anyhow::Result<ValidatorConfig> {
    let mut config = match cli.config {
        Some(ref path) => ValidatorConfig::from_file(path)
            .with_context(|| format!("Failed to load configuration from {path}"))?,
        None => ValidatorConfig::from_env().context("Invalid MCP_VALIDATOR_* environment")?,
    };

    // Command-line arguments win over the file and the environment
    let defaults = &mut config.defaults;
    if let Some(timeout) = cli.timeout {
        defaults.timeout_secs = timeout;
    }
    if cli.path.is_some() {
        defaults.path = cli.path.clone();
    }
    if cli.transport.is_some() {
        defaults.transport = cli.transport;
    }
    if !cli.required.is_empty() {
        defaults.required_capabilities = cli.required.clone();
    }
    defaults.strict |= cli.strict;

    if cli.token.is_some() {
        config.auth.bearer_token = cli.token.clone();
    }
    if let Some(attempts) = cli.max_attempts {
        config.retry.max_attempts = attempts;
    }

    Ok(config)
}

fn print_text_report(result: &ValidationResult) {
    println!("MCP Compliance Report");
    println!("=====================");
    println!("Endpoint: {}", result.endpoint);
    println!("Transport: {}", result.transport);
    if !result.protocol_version.is_empty() {
        println!("Protocol Version: {}", result.protocol_version);
    }
    if let Some(ref info) = result.server_info {
        println!("Server: {} {}", info.name, info.version);
    }
    if !result.capabilities.is_empty() {
        println!("Capabilities: {}", result.capabilities.join(", "));
    }
    if result.requires_auth {
        println!(
            "Authentication: required ({})",
            result.auth_type.as_deref().unwrap_or("unknown scheme")
        );
    }
    println!("Status: {}", result.status_string());
    println!("Duration: {:.2}s", result.duration.as_secs_f64());

    if result.issues.is_empty() {
        return;
    }

    println!();
    println!("Issues Found ({}):", result.issues.len());
    for (i, issue) in result.issues.iter().enumerate() {
        let marker = match issue.level {
            IssueLevel::Error => "error",
            IssueLevel::Warning => "warn",
            IssueLevel::Info => "info",
        };
        println!("  {}. [{}] {}: {}", i + 1, marker, issue.code, issue.message);
        for suggestion in &issue.suggestions {
            println!("     - {}", suggestion);
        }
        if let Some(ref url) = issue.documentation_url {
            println!("     See {}", url);
        }
    }
}
