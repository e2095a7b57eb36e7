//! Wire types for the tool server protocol (JSON-RPC 2.0 over HTTP).
//!
//! Only the subset needed for discovery and invocation is modelled:
//! `initialize`, `notifications/initialized`, `tools/list` and
//! `tools/call`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Opens a session with the server
pub const METHOD_INITIALIZE: &str = "initialize";
/// Sent once `initialize` succeeded
pub const METHOD_INITIALIZED: &str = "notifications/initialized";
/// Pages through the server's tools
pub const METHOD_TOOLS_LIST: &str = "tools/list";
/// Runs one tool
pub const METHOD_TOOLS_CALL: &str = "tools/call";

/// A JSON-RPC 2.0 request object.
///
/// `id` is `None` only for notifications.
///
/// # Examples
///
/// ```
/// use lore::mcp::types::JsonRpcRequest;
///
/// let req = JsonRpcRequest::new(1, "tools/list", None);
/// let json = serde_json::to_string(&req).unwrap();
/// assert!(json.contains("\"method\":\"tools/list\""));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    /// Build a request expecting a response
    pub fn new(id: u64, method: &str, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: Some(Value::from(id)),
            method: method.to_string(),
            params,
        }
    }

    /// Build a notification (no id, no response)
    pub fn notification(method: &str, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: None,
            method: method.to_string(),
            params,
        }
    }
}

/// A JSON-RPC 2.0 response object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    /// Echo of the request id; `None` for server notifications
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// A tool advertised by a tool server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McpTool {
    /// Name unique within its server
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Argument schema; an empty object schema when the server omits it
    #[serde(default = "empty_object_schema")]
    pub input_schema: Value,
}

fn empty_object_schema() -> Value {
    serde_json::json!({ "type": "object", "properties": {} })
}

/// Response to a `tools/list` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListToolsResponse {
    pub tools: Vec<McpTool>,
    /// Cursor for the following page, absent on the last one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// Response to a `tools/call` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallToolResponse {
    #[serde(default)]
    pub content: Vec<ToolResponseContent>,
    /// Set when the failure is reported in `content`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
    /// Structured output, when the tool declares one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured_content: Option<Value>,
}

impl CallToolResponse {
    /// Concatenate every text item, one per line
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|item| match item {
                ToolResponseContent::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// One content item of a `tools/call` result, tagged by `type`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolResponseContent {
    Text {
        text: String,
    },
    /// Base64 image data, ignored when rendering text
    Image {
        data: String,
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
    Resource {
        resource: Value,
    },
    /// Any content type this client does not model.
    #[serde(other)]
    Unsupported,
}
