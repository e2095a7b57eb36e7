//! HTTP JSON-RPC client for dynamic tool servers.
//!
//! Every JSON-RPC message is sent as an HTTP POST to the server endpoint.
//! The server may answer with:
//!
//! - `application/json`: the JSON-RPC response as the body
//! - `text/event-stream`: one or more SSE `data:` events, one of which is
//!   the response matching the request id
//! - `202 Accepted`: an acknowledgement with no body (notifications)
//!
//! After `initialize` the server may return an `Mcp-Session-Id` header,
//! which is attached to every later request.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use bytes::Bytes;
use reqwest::StatusCode;
use serde_json::{json, Value};
use tokio::sync::RwLock;

use super::types::{
    CallToolResponse, JsonRpcRequest, JsonRpcResponse, ListToolsResponse, McpTool,
    METHOD_INITIALIZE, METHOD_INITIALIZED, METHOD_TOOLS_CALL, METHOD_TOOLS_LIST,
};
use crate::error::{LoreError, Result};

/// Session header name
const SESSION_HEADER: &str = "Mcp-Session-Id";

/// Guard against servers that never stop paginating
const MAX_LIST_PAGES: usize = 32;

/// JSON-RPC client bound to one tool server endpoint
#[derive(Debug)]
pub struct McpClient {
    http: reqwest::Client,
    endpoint: url::Url,
    protocol_version: String,
    session_id: RwLock<Option<String>>,
    next_id: AtomicU64,
}

impl McpClient {
    /// Create a client; no network I/O happens until [`initialize`](Self::initialize)
    ///
    /// # Errors
    ///
    /// Returns error if HTTP client initialization fails
    pub fn new(endpoint: url::Url, timeout: Duration, protocol_version: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LoreError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            endpoint,
            protocol_version: protocol_version.to_string(),
            session_id: RwLock::new(None),
            next_id: AtomicU64::new(1),
        })
    }

    /// The server endpoint
    pub fn endpoint(&self) -> &url::Url {
        &self.endpoint
    }

    /// Perform the `initialize` handshake and send `notifications/initialized`
    ///
    /// # Returns
    ///
    /// The server's `initialize` result (capabilities, server info)
    pub async fn initialize(&self) -> Result<Value> {
        let result = self
            .request(
                METHOD_INITIALIZE,
                Some(json!({
                    "protocolVersion": self.protocol_version,
                    "capabilities": {},
                    "clientInfo": {
                        "name": "lore",
                        "version": env!("CARGO_PKG_VERSION"),
                    }
                })),
            )
            .await?;

        self.notify(METHOD_INITIALIZED, None).await?;
        Ok(result)
    }

    /// Fetch the complete tool catalog, following pagination cursors
    pub async fn list_tools(&self) -> Result<Vec<McpTool>> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;

        for _ in 0..MAX_LIST_PAGES {
            let params = cursor.as_ref().map(|c| json!({ "cursor": c }));
            let result = self.request(METHOD_TOOLS_LIST, params).await?;
            let page: ListToolsResponse = serde_json::from_value(result)
                .map_err(|e| LoreError::Mcp(format!("Malformed tools/list result: {}", e)))?;

            tools.extend(page.tools);
            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => return Ok(tools),
            }
        }

        tracing::warn!(
            endpoint = %self.endpoint,
            pages = MAX_LIST_PAGES,
            "Tool list pagination limit reached"
        );
        Ok(tools)
    }

    /// Invoke a tool by its server-side name
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<CallToolResponse> {
        let result = self
            .request(
                METHOD_TOOLS_CALL,
                Some(json!({ "name": name, "arguments": arguments })),
            )
            .await?;
        serde_json::from_value(result)
            .map_err(|e| LoreError::Mcp(format!("Malformed tools/call result: {}", e)).into())
    }

    async fn request(&self, method: &str, params: Option<Value>) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let request = JsonRpcRequest::new(id, method, params);

        let response = self.post(&request).await?;
        let is_event_stream = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.contains("text/event-stream"))
            .unwrap_or(false);

        let body: Bytes = response
            .bytes()
            .await
            .map_err(|e| LoreError::McpTransport(format!("failed to read response body: {}", e)))?;
        let text = std::str::from_utf8(&body)
            .map_err(|e| LoreError::McpTransport(format!("response is not UTF-8: {}", e)))?;

        let payloads = if is_event_stream {
            parse_sse_events(text)
        } else {
            vec![text.to_string()]
        };

        let response = find_response(&payloads, id)?;
        if let Some(error) = response.error {
            return Err(LoreError::Mcp(format!(
                "{} failed: {} (code {})",
                method, error.message, error.code
            ))
            .into());
        }
        Ok(response.result.unwrap_or(Value::Null))
    }

    async fn notify(&self, method: &str, params: Option<Value>) -> Result<()> {
        let notification = JsonRpcRequest::notification(method, params);
        self.post(&notification).await?;
        Ok(())
    }

    async fn post(&self, message: &JsonRpcRequest) -> Result<reqwest::Response> {
        let mut request = self
            .http
            .post(self.endpoint.as_str())
            .header("Accept", "application/json, text/event-stream")
            .header("MCP-Protocol-Version", &self.protocol_version)
            .json(message);

        {
            let sid = self.session_id.read().await;
            if let Some(ref id) = *sid {
                request = request.header(SESSION_HEADER, id.as_str());
            }
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() || e.is_connect() {
                LoreError::UpstreamTimeout(format!("tool server {} unreachable: {}", self.endpoint, e))
            } else {
                LoreError::McpTransport(format!("HTTP POST failed: {}", e))
            }
        })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(LoreError::Authentication(format!(
                "tool server {} returned {}",
                self.endpoint, status
            ))
            .into());
        }
        if !status.is_success() {
            return Err(LoreError::McpTransport(format!(
                "HTTP POST returned status {}",
                status
            ))
            .into());
        }

        if let Some(new_session_id) = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
        {
            let mut sid = self.session_id.write().await;
            if sid.is_none() {
                *sid = Some(new_session_id);
            }
        }

        Ok(response)
    }
}

/// Extract the `data:` payloads of every event in an SSE body
///
/// Multi-line data fields are joined with `\n`; ping events are dropped.
pub fn parse_sse_events(body: &str) -> Vec<String> {
    let normalized = body.replace("\r\n", "\n");
    normalized
        .split("\n\n")
        .filter_map(|block| {
            let mut data_lines = Vec::new();
            let mut event_type = None;
            for line in block.lines() {
                if let Some(value) = line.strip_prefix("data:") {
                    data_lines.push(value.trim());
                } else if let Some(value) = line.strip_prefix("event:") {
                    event_type = Some(value.trim());
                }
            }
            if event_type.is_some_and(|t| t.eq_ignore_ascii_case("ping")) || data_lines.is_empty() {
                return None;
            }
            Some(data_lines.join("\n"))
        })
        .collect()
}

fn find_response(payloads: &[String], id: u64) -> Result<JsonRpcResponse> {
    let expected = Value::from(id);
    for payload in payloads {
        let Ok(response) = serde_json::from_str::<JsonRpcResponse>(payload) else {
            continue;
        };
        if response.id.as_ref() == Some(&expected) {
            return Ok(response);
        }
    }
    Err(LoreError::Mcp(format!("no response for request id {}", id)).into())
}
