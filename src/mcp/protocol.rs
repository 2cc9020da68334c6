//! MCP Protocol Types (JSON-RPC 2.0)
//!
//! Wire types for the subset of the Model Context Protocol the harness speaks:
//! the `initialize` handshake, the `notifications/initialized` notification,
//! `tools/list` and `tools/call`.
//!
//! # Framing
//!
//! Every message is one UTF-8 JSON object followed by a single `\n`. There is
//! no length prefix and no batching. Framing itself lives in the transport
//! layer; this module only covers (de)serialization.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// JSON-RPC 2.0 version constant
pub const JSONRPC_VERSION: &str = "2.0";

/// The single protocol version the harness offers during the handshake
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// A JSON-RPC 2.0 request message
///
/// Ids are assigned by the client, start at 1 and strictly increase for the
/// lifetime of a connection. `params` is serialized straight from its typed
/// form, so struct field order is the order on the wire.
///
/// # Example
///
/// ```json
/// {"jsonrpc":"2.0","id":2,"method":"tools/list","params":{}}
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct McpRequest<P = Value> {
    /// JSON-RPC version (always "2.0")
    pub jsonrpc: String,

    /// Request identifier (used to match responses)
    pub id: u64,

    /// Method name to invoke
    pub method: String,

    /// Method parameters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<P>,
}

impl<P> McpRequest<P> {
    /// Create a new MCP request
    pub fn new(id: u64, method: impl Into<String>, params: Option<P>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            method: method.into(),
            params,
        }
    }
}

/// A JSON-RPC 2.0 notification
///
/// Notifications carry no id and never receive a response.
///
/// ```json
/// {"jsonrpc":"2.0","method":"notifications/initialized"}
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct McpNotification {
    /// JSON-RPC version (always "2.0")
    pub jsonrpc: String,

    /// Notification method
    pub method: String,

    /// Optional parameters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl McpNotification {
    /// Create a notification without parameters
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params: None,
        }
    }

    /// The handshake-complete notification
    pub fn initialized() -> Self {
        Self::new(McpMethod::Initialized.as_str())
    }
}

/// A JSON-RPC 2.0 response message
///
/// A well-formed response carries exactly one of `result` or `error`; see
/// [`McpResponse::check_shape`].
///
/// # Example (Success)
///
/// ```json
/// {"jsonrpc":"2.0","id":1,"result":{"tools":[]}}
/// ```
///
/// # Example (Error)
///
/// ```json
/// {"jsonrpc":"2.0","id":1,"error":{"code":-32601,"message":"Method not found"}}
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct McpResponse {
    /// JSON-RPC version (always "2.0")
    #[serde(default = "default_jsonrpc")]
    pub jsonrpc: String,

    /// Request identifier (must match the request's ID)
    pub id: u64,

    /// Result payload (present on success; `Some(Null)` for `"result":null`)
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    /// Error information (present on failure)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<McpError>,
}

fn default_jsonrpc() -> String {
    JSONRPC_VERSION.to_string()
}

// Only called when the key exists, so an explicit null stays `Some`.
fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

impl McpResponse {
    /// Create a successful response
    pub fn ok(id: u64, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Create an error response
    pub fn err(id: u64, error: McpError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }

    /// Check if the response is successful
    pub fn is_success(&self) -> bool {
        self.result.is_some() && self.error.is_none()
    }

    /// Verify that exactly one of `result` / `error` is present
    pub fn check_shape(&self) -> Result<(), &'static str> {
        match (&self.result, &self.error) {
            (Some(_), None) | (None, Some(_)) => Ok(()),
            (Some(_), Some(_)) => Err("response carries both result and error"),
            (None, None) => Err("response carries neither result nor error"),
        }
    }

    /// Get the result, or the error if unsuccessful
    pub fn into_result(self) -> Result<Value, McpError> {
        match (self.result, self.error) {
            (Some(result), None) => Ok(result),
            (_, Some(error)) => Err(error),
            (None, None) => Err(McpError::internal_error(
                "Invalid response: neither result nor error present",
            )),
        }
    }

    /// Entries of `result.content` (empty when absent or not a sequence)
    pub fn content(&self) -> Vec<ToolContent> {
        self.result
            .as_ref()
            .and_then(|result| result.get("content"))
            .and_then(|content| serde_json::from_value(content.clone()).ok())
            .unwrap_or_default()
    }

    /// Whether `result.content` is present and is a sequence
    pub fn has_content_array(&self) -> bool {
        self.result
            .as_ref()
            .and_then(|result| result.get("content"))
            .is_some_and(Value::is_array)
    }

    /// Whether the server flagged a tool-level failure (`result.isError`)
    pub fn is_tool_error(&self) -> bool {
        self.result
            .as_ref()
            .and_then(|result| result.get("isError"))
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Concatenated `text` fields of the content entries
    pub fn text(&self) -> String {
        self.content()
            .into_iter()
            .filter_map(|item| item.text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// A JSON-RPC 2.0 error object
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct McpError {
    /// Error code (JSON-RPC defined or server-specific)
    pub code: i64,

    /// Human-readable error message
    #[serde(default)]
    pub message: String,

    /// Additional error data (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl McpError {
    /// Create a new error
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Parse error (-32700): Invalid JSON was received
    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::new(-32700, message)
    }

    /// Method not found (-32601)
    pub fn method_not_found(method: impl Into<String>) -> Self {
        Self::new(-32601, format!("Method not found: {}", method.into()))
    }

    /// Invalid params (-32602)
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(-32602, message)
    }

    /// Internal error (-32603)
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(-32603, message)
    }
}

impl std::fmt::Display for McpError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[Error {}] {}", self.code, self.message)
    }
}

impl std::error::Error for McpError {}

/// MCP method identifiers used by the harness
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum McpMethod {
    /// Open the session (must be called first)
    Initialize,

    /// Handshake-complete notification
    Initialized,

    /// List available tools
    ToolsList,

    /// Call a specific tool
    ToolsCall,
}

impl McpMethod {
    /// Convert to string for JSON-RPC method field
    pub fn as_str(&self) -> &str {
        match self {
            Self::Initialize => "initialize",
            Self::Initialized => "notifications/initialized",
            Self::ToolsList => "tools/list",
            Self::ToolsCall => "tools/call",
        }
    }
}

/// Initialization parameters sent with the `initialize` request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InitializeParams {
    /// Client protocol version
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,

    /// Client capabilities (always empty for the harness)
    pub capabilities: ClientCapabilities,

    /// Client information
    #[serde(rename = "clientInfo")]
    pub client_info: ClientInfo,
}

impl InitializeParams {
    /// Handshake parameters for the fixed protocol version
    pub fn new(client_info: ClientInfo) -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: ClientCapabilities::default(),
            client_info,
        }
    }
}

/// Client capabilities advertised during initialization
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClientCapabilities {
    /// Sampling capability (object or null)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sampling: Option<Value>,

    /// Experimental features
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experimental: Option<Value>,
}

/// Client identification information
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClientInfo {
    /// Client name
    pub name: String,

    /// Client version
    pub version: String,
}

impl Default for ClientInfo {
    fn default() -> Self {
        Self {
            name: "mcp-test-client".to_string(),
            version: "1.0.0".to_string(),
        }
    }
}

/// Server identification information
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerInfo {
    /// Server name
    #[serde(default)]
    pub name: String,

    /// Server version
    #[serde(default)]
    pub version: String,
}

/// The `result` of a successful `initialize` call
///
/// Every field is optional on the wire; a server that answers `{}` still
/// completes the handshake.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct InitializeResult {
    /// Protocol version chosen by the server
    #[serde(rename = "protocolVersion", default)]
    pub protocol_version: Option<String>,

    /// Server capabilities
    #[serde(default)]
    pub capabilities: Value,

    /// Server information
    #[serde(rename = "serverInfo", default)]
    pub server_info: Option<ServerInfo>,
}

/// Tool descriptor advertised by `tools/list`
///
/// `description` and `inputSchema` default when missing so that conformance
/// tests can report the omission instead of the whole listing failing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tool {
    /// Tool name (unique identifier)
    pub name: String,

    /// Tool description
    #[serde(default)]
    pub description: String,

    /// Tool input schema (JSON Schema)
    #[serde(rename = "inputSchema", default)]
    pub input_schema: Value,
}

/// Tool call parameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCallParams {
    /// Name of the tool to call
    pub name: String,

    /// Tool arguments
    pub arguments: Value,
}

/// One entry of a tool call's `result.content`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolContent {
    /// Content type (`text`, `image`, ...)
    #[serde(rename = "type", default)]
    pub kind: Option<String>,

    /// Text payload, when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_handshake_request_wire_format() {
        let params = InitializeParams::new(ClientInfo {
            name: "mcp-test-client".to_string(),
            version: "1.0.0".to_string(),
        });
        let req = McpRequest::new(1, McpMethod::Initialize.as_str(), Some(params));
        let json = serde_json::to_string(&req).unwrap();

        assert_eq!(
            json,
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2024-11-05","capabilities":{},"clientInfo":{"name":"mcp-test-client","version":"1.0.0"}}}"#
        );
    }

    #[test]
    fn test_initialized_notification_wire_format() {
        let json = serde_json::to_string(&McpNotification::initialized()).unwrap();
        assert_eq!(json, r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#);
    }

    #[test]
    fn test_tool_call_request_wire_format() {
        let params = ToolCallParams {
            name: "decompile_class".to_string(),
            arguments: json!({"className": "a.B"}),
        };
        let req = McpRequest::new(3, McpMethod::ToolsCall.as_str(), Some(params));
        let json = serde_json::to_string(&req).unwrap();
        assert_eq!(
            json,
            r#"{"jsonrpc":"2.0","id":3,"method":"tools/call","params":{"name":"decompile_class","arguments":{"className":"a.B"}}}"#
        );
    }

    #[test]
    fn test_null_result_is_present() {
        let resp: McpResponse = serde_json::from_str(r#"{"jsonrpc":"2.0","id":2,"result":null}"#).unwrap();
        assert_eq!(resp.result, Some(Value::Null));
        assert!(resp.check_shape().is_ok());
        assert_eq!(resp.into_result().unwrap(), Value::Null);

        let missing: McpResponse = serde_json::from_str(r#"{"jsonrpc":"2.0","id":2}"#).unwrap();
        assert!(missing.result.is_none());
    }

    #[test]
    fn test_tools_list_request_has_empty_params() {
        let req = McpRequest::new(2, McpMethod::ToolsList.as_str(), Some(json!({})));
        let json = serde_json::to_string(&req).unwrap();
        assert_eq!(json, r#"{"jsonrpc":"2.0","id":2,"method":"tools/list","params":{}}"#);
    }

    #[test]
    fn test_deserialize_success_response() {
        let json = r#"{"jsonrpc":"2.0","id":1,"result":{"tools":[]}}"#;
        let resp: McpResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.id, 1);
        assert!(resp.is_success());
        assert!(resp.check_shape().is_ok());
    }

    #[test]
    fn test_deserialize_error_response() {
        let json = r#"{"jsonrpc":"2.0","id":4,"error":{"code":-32601,"message":"Method not found"}}"#;
        let resp: McpResponse = serde_json::from_str(json).unwrap();
        assert!(!resp.is_success());
        assert!(resp.check_shape().is_ok());

        let err = resp.into_result().unwrap_err();
        assert_eq!(err.code, -32601);
        assert_eq!(err.to_string(), "[Error -32601] Method not found");
    }

    #[test]
    fn test_shape_check_rejects_both_and_neither() {
        let both: McpResponse = serde_json::from_str(
            r#"{"jsonrpc":"2.0","id":1,"result":{},"error":{"code":1,"message":"x"}}"#,
        )
        .unwrap();
        assert!(both.check_shape().is_err());

        let neither: McpResponse = serde_json::from_str(r#"{"jsonrpc":"2.0","id":1}"#).unwrap();
        assert!(neither.check_shape().is_err());
    }

    #[test]
    fn test_response_without_id_is_rejected() {
        let result: Result<McpResponse, _> = serde_json::from_str(r#"{"jsonrpc":"2.0","result":{}}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_tool_descriptor_parsing() {
        let tool: Tool = serde_json::from_value(json!({
            "name": "scan_dependencies",
            "description": "x",
            "inputSchema": {}
        }))
        .unwrap();
        assert_eq!(tool.name, "scan_dependencies");
        assert!(tool.input_schema.is_object());

        let bare: Tool = serde_json::from_value(json!({"name": "bare"})).unwrap();
        assert!(bare.description.is_empty());
        assert!(bare.input_schema.is_null());
    }

    #[test]
    fn test_tool_call_content_helpers() {
        let resp = McpResponse::ok(
            3,
            json!({
                "content": [
                    {"type": "text", "text": "first"},
                    {"type": "image"},
                    {"type": "text", "text": "second"}
                ],
                "isError": false
            }),
        );

        assert!(resp.has_content_array());
        assert_eq!(resp.content().len(), 3);
        assert_eq!(resp.text(), "first\nsecond");
        assert!(!resp.is_tool_error());
    }

    #[test]
    fn test_tool_error_flag() {
        let resp = McpResponse::ok(
            5,
            json!({"content": [{"type": "text", "text": "run scan first"}], "isError": true}),
        );
        assert!(resp.is_tool_error());

        let rpc_err = McpResponse::err(5, McpError::invalid_params("className required"));
        assert!(!rpc_err.has_content_array());
        assert!(rpc_err.content().is_empty());
    }

    #[test]
    fn test_method_names() {
        assert_eq!(McpMethod::Initialize.as_str(), "initialize");
        assert_eq!(McpMethod::Initialized.as_str(), "notifications/initialized");
        assert_eq!(McpMethod::ToolsList.as_str(), "tools/list");
        assert_eq!(McpMethod::ToolsCall.as_str(), "tools/call");
    }

    #[test]
    fn test_initialize_result_tolerates_missing_fields() {
        let result: InitializeResult = serde_json::from_value(json!({})).unwrap();
        assert!(result.server_info.is_none());
        assert!(result.protocol_version.is_none());
    }
}
