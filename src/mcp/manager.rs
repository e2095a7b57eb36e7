//! Discovery cache and invocation bridge for dynamic tool servers.
//!
//! Each distinct `(name, url)` pair is connected once; its tool list is
//! cached for the life of the process. A server that fails to connect is
//! skipped and left alone until [`FAILURE_BACKOFF`] has passed.
//!
//! Remote tools are exposed to the model as `<server>__<tool>`, with any
//! character outside `[A-Za-z0-9_-]` replaced by `_` and the result capped
//! at 64 characters.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};
use std::time::{Duration, Instant};

use futures::future::join_all;
use regex::Regex;
use serde_json::{json, Value};
use tokio::sync::RwLock;

use super::client::McpClient;
use super::types::McpTool;
use crate::config::{McpConfig, RetryConfig};
use crate::error::{LoreError, Result};
use crate::retry::RetryPolicy;
use crate::storage::ToolServer;
use crate::tools::{tool_error, Tool};

/// Separator between server and tool in exposed names
pub const NAMESPACE_SEPARATOR: &str = "__";

/// Longest tool name accepted by OpenAI-compatible function calling
pub const MAX_TOOL_NAME_LEN: usize = 64;

/// How long a server that failed discovery is left alone
pub const FAILURE_BACKOFF: Duration = Duration::from_secs(30);

static INVALID_CHARS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[^A-Za-z0-9_-]").expect("tool name sanitizing regex must compile")
});

/// Build the model-facing name for a remote tool
///
/// # Examples
///
/// ```
/// use lore::mcp::namespaced_tool_name;
///
/// assert_eq!(namespaced_tool_name("docs", "lookup"), "docs__lookup");
/// assert_eq!(namespaced_tool_name("my docs", "find.page"), "my_docs__find_page");
/// ```
pub fn namespaced_tool_name(server: &str, tool: &str) -> String {
    let raw = format!("{}{}{}", server, NAMESPACE_SEPARATOR, tool);
    let mut name = INVALID_CHARS.replace_all(&raw, "_").into_owned();
    name.truncate(MAX_TOOL_NAME_LEN);
    name
}

/// A connected server and its discovered tools
struct ServerEntry {
    server: ToolServer,
    client: Arc<McpClient>,
    tools: Vec<McpTool>,
}

/// A remote tool resolved from a model-facing name
#[derive(Clone)]
pub struct RemoteTool {
    /// Server hosting the tool
    pub server: ToolServer,
    /// Name the server knows the tool by
    pub remote_name: String,
    client: Arc<McpClient>,
}

impl std::fmt::Debug for RemoteTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteTool")
            .field("server", &self.server)
            .field("remote_name", &self.remote_name)
            .finish()
    }
}

impl RemoteTool {
    /// Invoke the tool once
    ///
    /// Remote calls may have side effects, so they are never retried.
    /// A result flagged `isError` becomes `{"error": text}`; otherwise the
    /// structured content is returned when present, or `{"content": text}`.
    pub async fn call(&self, args: Value) -> Result<Value> {
        tracing::info!(
            server = %self.server.name,
            tool = %self.remote_name,
            "Calling remote tool"
        );
        let response = self.client.call_tool(&self.remote_name, args).await?;
        let text = response.text();

        if response.is_error.unwrap_or(false) {
            let reason = if text.is_empty() {
                format!("{} reported an error", self.remote_name)
            } else {
                text
            };
            return Ok(tool_error(reason));
        }

        Ok(match response.structured_content {
            Some(structured) => structured,
            None => json!({ "content": text }),
        })
    }
}

/// Connects to tool servers and caches their tool catalogs
pub struct McpManager {
    timeout: Duration,
    protocol_version: String,
    retry: RetryPolicy,
    servers: RwLock<HashMap<ToolServer, Arc<ServerEntry>>>,
    failures: RwLock<HashMap<ToolServer, Instant>>,
}

impl Default for McpManager {
    fn default() -> Self {
        let config = McpConfig::default();
        Self::new(
            Duration::from_secs(config.timeout_seconds),
            &config.protocol_version,
            RetryPolicy::from(&RetryConfig::default()),
        )
    }
}

impl McpManager {
    pub fn new(timeout: Duration, protocol_version: &str, retry: RetryPolicy) -> Self {
        Self {
            timeout,
            protocol_version: protocol_version.to_string(),
            retry,
            servers: RwLock::new(HashMap::new()),
            failures: RwLock::new(HashMap::new()),
        }
    }

    /// Build a manager from configuration
    pub fn from_config(mcp: &McpConfig, retry: &RetryConfig) -> Self {
        Self::new(
            Duration::from_secs(mcp.timeout_seconds),
            &mcp.protocol_version,
            RetryPolicy::from(retry),
        )
    }

    /// Connect to every server not yet cached
    ///
    /// New servers are contacted concurrently. Failures are logged, left out
    /// of the cache and skipped by later calls for [`FAILURE_BACKOFF`].
    pub async fn discover(&self, servers: &[ToolServer]) {
        let pending: Vec<ToolServer> = {
            let cache = self.servers.read().await;
            let failures = self.failures.read().await;
            let mut seen = Vec::new();
            for server in servers {
                let backing_off = failures
                    .get(server)
                    .is_some_and(|failed| failed.elapsed() < FAILURE_BACKOFF);
                if !cache.contains_key(server) && !backing_off && !seen.contains(server) {
                    seen.push(server.clone());
                }
            }
            seen
        };
        if pending.is_empty() {
            return;
        }

        let results = join_all(pending.into_iter().map(|server| async move {
            let outcome = self.connect(&server).await;
            (server, outcome)
        }))
        .await;

        let mut cache = self.servers.write().await;
        let mut failures = self.failures.write().await;
        for (server, outcome) in results {
            match outcome {
                Ok(entry) => {
                    failures.remove(&server);
                    tracing::info!(
                        server = %server.name,
                        url = %server.url,
                        tools = entry.tools.len(),
                        "Discovered tool server"
                    );
                    cache.insert(server, Arc::new(entry));
                }
                Err(e) => {
                    tracing::warn!(
                        server = %server.name,
                        url = %server.url,
                        error = %e,
                        "Tool server unavailable; skipping"
                    );
                    failures.insert(server, Instant::now());
                }
            }
        }
    }

    async fn connect(&self, server: &ToolServer) -> Result<ServerEntry> {
        let endpoint = url::Url::parse(&server.url)
            .map_err(|e| LoreError::Validation(format!("invalid tool server URL {}: {}", server.url, e)))?;

        let label = format!("discover {}", server.name);
        let (client, tools) = self
            .retry
            .execute(&label, || {
                let endpoint = endpoint.clone();
                async move {
                    let client = McpClient::new(endpoint, self.timeout, &self.protocol_version)?;
                    client.initialize().await?;
                    let tools = client.list_tools().await?;
                    Ok((client, tools))
                }
            })
            .await?;

        Ok(ServerEntry {
            server: server.clone(),
            client: Arc::new(client),
            tools,
        })
    }

    /// Cached entries for `servers`, in order, without contacting anything
    async fn cached_entries(&self, servers: &[ToolServer]) -> Vec<Arc<ServerEntry>> {
        let cache = self.servers.read().await;
        let mut entries: Vec<Arc<ServerEntry>> = Vec::new();
        for server in servers {
            if let Some(entry) = cache.get(server) {
                if !entries.iter().any(|e| e.server == *server) {
                    entries.push(Arc::clone(entry));
                }
            }
        }
        entries
    }

    /// Schemas of every tool on the reachable servers, grouped by server
    pub async fn tool_schemas(&self, servers: &[ToolServer]) -> Vec<Tool> {
        self.discover(servers).await;
        self.cached_entries(servers)
            .await
            .iter()
            .flat_map(|entry| {
                entry.tools.iter().map(move |tool| {
                    let description = match tool.description.as_deref() {
                        Some(d) if !d.is_empty() => format!("[{}] {}", entry.server.name, d),
                        _ => format!("[{}] {}", entry.server.name, tool.name),
                    };
                    Tool::new(
                        namespaced_tool_name(&entry.server.name, &tool.name),
                        description,
                        tool.input_schema.clone(),
                    )
                })
            })
            .collect()
    }

    /// Find the remote tool behind a model-facing name
    ///
    /// Looks in the cache first. Discovery only runs when the name is not
    /// found there, and then only reaches servers outside their backoff.
    pub async fn resolve(&self, name: &str, servers: &[ToolServer]) -> Option<RemoteTool> {
        if let Some(tool) = self.find_cached(name, servers).await {
            return Some(tool);
        }
        self.discover(servers).await;
        self.find_cached(name, servers).await
    }

    async fn find_cached(&self, name: &str, servers: &[ToolServer]) -> Option<RemoteTool> {
        self.cached_entries(servers).await.into_iter().find_map(|entry| {
            entry
                .tools
                .iter()
                .find(|tool| namespaced_tool_name(&entry.server.name, &tool.name) == name)
                .map(|tool| RemoteTool {
                    server: entry.server.clone(),
                    remote_name: tool.name.clone(),
                    client: Arc::clone(&entry.client),
                })
        })
    }

    /// Number of servers currently cached
    pub async fn cached_servers(&self) -> usize {
        self.servers.read().await.len()
    }

    /// Number of servers currently in failure backoff
    pub async fn failed_servers(&self) -> usize {
        self.failures
            .read()
            .await
            .values()
            .filter(|failed| failed.elapsed() < FAILURE_BACKOFF)
            .count()
    }
}
