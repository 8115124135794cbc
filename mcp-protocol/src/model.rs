//! MCP model types for the subset of protocol messages a compliance check exchanges

use crate::error::ProtocolError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// JSON-RPC protocol version carried by every envelope
pub const JSONRPC_VERSION: &str = "2.0";

/// JSON-RPC 2.0 Request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// JSON-RPC version (always "2.0")
    pub jsonrpc: String,
    /// Request ID
    pub id: i64,
    /// Request method name
    pub method: String,
    /// Request parameters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl Request {
    /// Create a request with the given id
    pub fn new(id: i64, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            method: method.into(),
            params,
        }
    }
}

/// JSON-RPC 2.0 Notification (a request without an `id`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// JSON-RPC version (always "2.0")
    pub jsonrpc: String,
    /// Notification method name
    pub method: String,
    /// Notification parameters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl Notification {
    /// Create a notification
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
        }
    }
}

/// JSON-RPC 2.0 error object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    /// Error code, e.g. `-32601` for an unknown method
    pub code: i64,
    /// Short description of the error
    pub message: String,
    /// Extra error details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// JSON-RPC 2.0 Response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// JSON-RPC version (always "2.0")
    pub jsonrpc: String,
    /// Request ID this response answers
    #[serde(default)]
    pub id: Value,
    /// Response result (if successful)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Response error (if failed)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl Response {
    /// Numeric id of the response, if the server sent one
    pub fn numeric_id(&self) -> Option<i64> {
        self.id.as_i64()
    }

    /// Split the response into its payload.
    ///
    /// An `error` object wins over `result` when a server sends both.
    pub fn into_result(self) -> Result<Value, RpcError> {
        if let Some(error) = self.error {
            return Err(error);
        }
        Ok(self.result.unwrap_or(Value::Null))
    }
}

/// Decode a JSON-RPC response envelope from raw text
pub fn decode_response(text: &str) -> Result<Response, ProtocolError> {
    let response: Response = serde_json::from_str(text)?;
    if response.jsonrpc != JSONRPC_VERSION {
        return Err(ProtocolError::InvalidEnvelope(format!(
            "unexpected jsonrpc version '{}'",
            response.jsonrpc
        )));
    }
    Ok(response)
}

/// Client or server implementation information
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Implementation {
    /// Implementation name
    pub name: String,
    /// Implementation version
    pub version: String,
}

impl Implementation {
    /// Create implementation info
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

/// Initialize request parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitializeRequestParams {
    /// Version the client asks for
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
    /// Client capabilities; empty for a compliance check
    pub capabilities: Value,
    /// Identity of the client
    #[serde(rename = "clientInfo")]
    pub client_info: Implementation,
}

impl InitializeRequestParams {
    /// Initialize parameters with empty client capabilities
    pub fn new(protocol_version: impl Into<String>, client_info: Implementation) -> Self {
        Self {
            protocol_version: protocol_version.into(),
            capabilities: Value::Object(Map::new()),
            client_info,
        }
    }
}

/// Initialize result
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InitializeResult {
    /// Empty when the server omitted the field
    #[serde(rename = "protocolVersion", default)]
    pub protocol_version: String,
    /// Capabilities the server advertised
    #[serde(default)]
    pub capabilities: ServerCapabilities,
    /// Server name and version, when sent
    #[serde(rename = "serverInfo", default, skip_serializing_if = "Option::is_none")]
    pub server_info: Option<Implementation>,
    /// Usage hints for the client
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

/// Server capabilities advertised during the handshake
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ServerCapabilities {
    /// Tool listing support
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<ToolsCapability>,
    /// Resource listing support
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourcesCapability>,
    /// Prompt listing support
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompts: Option<PromptsCapability>,
    /// Log message support
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logging: Option<Value>,
    /// Argument completion support
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completions: Option<Value>,
    /// Capability keys this model does not type (`roots`, `experimental`, ...)
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

/// Tools capability flags
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ToolsCapability {
    /// Server emits list-changed notifications
    #[serde(rename = "listChanged", default, skip_serializing_if = "Option::is_none")]
    pub list_changed: Option<bool>,
}

/// Resources capability flags
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResourcesCapability {
    /// Server supports resource subscriptions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscribe: Option<bool>,
    /// Server emits list-changed notifications
    #[serde(rename = "listChanged", default, skip_serializing_if = "Option::is_none")]
    pub list_changed: Option<bool>,
}

/// Prompts capability flags
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PromptsCapability {
    /// Server emits list-changed notifications
    #[serde(rename = "listChanged", default, skip_serializing_if = "Option::is_none")]
    pub list_changed: Option<bool>,
}

impl ServerCapabilities {
    /// Names of the advertised capabilities in protocol order
    pub fn names(&self) -> Vec<String> {
        let mut names = Vec::new();
        if self.tools.is_some() {
            names.push("tools".to_string());
        }
        if self.resources.is_some() {
            names.push("resources".to_string());
        }
        if self.prompts.is_some() {
            names.push("prompts".to_string());
        }
        if self.logging.is_some() {
            names.push("logging".to_string());
        }
        if self.completions.is_some() {
            names.push("completions".to_string());
        }
        names
    }

    /// Whether the named capability was advertised
    pub fn has(&self, name: &str) -> bool {
        match name {
            "tools" => self.tools.is_some(),
            "resources" => self.resources.is_some(),
            "prompts" => self.prompts.is_some(),
            "logging" => self.logging.is_some(),
            "completions" => self.completions.is_some(),
            other => self.other.contains_key(other),
        }
    }

    /// Whether no capability was advertised at all
    pub fn is_empty(&self) -> bool {
        self.names().is_empty() && self.other.is_empty()
    }
}

/// Tool definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    /// Tool name
    pub name: String,
    /// What the tool does
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON Schema of the tool's arguments
    #[serde(rename = "inputSchema", default)]
    pub input_schema: Value,
}

/// Result of `tools/list`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ListToolsResult {
    /// Tools on this page
    #[serde(default)]
    pub tools: Vec<Tool>,
    /// Cursor for the next page
    #[serde(rename = "nextCursor", default, skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// Resource definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    /// Resource URI
    pub uri: String,
    /// Resource name
    pub name: String,
    /// What the resource holds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// MIME type of the contents
    #[serde(rename = "mimeType", default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

/// Result of `resources/list`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ListResourcesResult {
    /// Resources on this page
    #[serde(default)]
    pub resources: Vec<Resource>,
    /// Cursor for the next page
    #[serde(rename = "nextCursor", default, skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// Prompt definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prompt {
    /// Prompt name
    pub name: String,
    /// What the prompt does
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Arguments the prompt accepts
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub arguments: Vec<PromptArgument>,
}

/// Prompt argument definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptArgument {
    /// Argument name
    pub name: String,
    /// What the argument means
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Whether the argument must be given
    #[serde(default)]
    pub required: bool,
}

/// Result of `prompts/list`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ListPromptsResult {
    /// Prompts on this page
    #[serde(default)]
    pub prompts: Vec<Prompt>,
    /// Cursor for the next page
    #[serde(rename = "nextCursor", default, skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// Method names used by the compliance checks
pub mod methods {
    /// Handshake request
    pub const INITIALIZE: &str = "initialize";
    /// Sent after a successful handshake
    pub const INITIALIZED: &str = "notifications/initialized";
    /// List tools
    pub const TOOLS_LIST: &str = "tools/list";
    /// List resources
    pub const RESOURCES_LIST: &str = "resources/list";
    /// List prompts
    pub const PROMPTS_LIST: &str = "prompts/list";
}
