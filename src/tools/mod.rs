//! Tools module for Lore
//!
//! This module contains tool definitions, the tool registry, and the
//! built-in research tools: web search, content extraction, semantic
//! search, and the two findings tools that work against the session's
//! research index.
//!
//! Tools come in two flavours, resolved through one [`ToolRegistry`]:
//! built-ins implementing [`ToolExecutor`], and remote tools contributed by
//! dynamic tool servers (see [`crate::mcp`]).

pub mod dispatcher;
pub mod findings;
pub mod search;
pub mod semantic_search;
pub mod web_search;

pub use dispatcher::ToolDispatcher;
pub use findings::{PersistFindingTool, SearchFindingsTool};
pub use search::SearchClient;
pub use semantic_search::SemanticSearchTool;
pub use web_search::{ExtractContentTool, WebSearchTool};

use crate::config::Config;
use crate::error::Result;
use crate::mcp::{McpManager, RemoteTool};
use crate::retry::RetryPolicy;
use crate::storage::{IndexedItem, ToolServer};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

/// Model-facing name of the web search tool
pub const WEB_SEARCH: &str = "web_search";
/// Model-facing name of the content extraction tool
pub const EXTRACT_CONTENT: &str = "extract_content";
/// Model-facing name of the semantic search tool
pub const SEMANTIC_SEARCH: &str = "semantic_search";
/// Model-facing name of the persist-finding tool
pub const PERSIST_FINDING: &str = "persist_finding";
/// Model-facing name of the search-findings tool
pub const SEARCH_FINDINGS: &str = "search_findings";

/// Tool definition structure
///
/// Represents a tool that can be called by the AI provider.
/// Follows the OpenAI function calling format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    /// Name of the tool
    pub name: String,
    /// Description of what the tool does
    pub description: String,
    /// JSON schema for the tool's parameters
    pub parameters: Value,
}

impl Tool {
    /// Create a new tool definition
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}

/// Read-only context for one turn's tool calls
///
/// Credentials arrive with each request and are never persisted. The index
/// is a snapshot of the session's findings taken before the batch starts.
#[derive(Debug, Clone, Default)]
pub struct ToolContext {
    /// Web search / extraction provider key
    pub tavily_key: Option<String>,
    /// Semantic search provider key
    pub exa_key: Option<String>,
    /// Dynamic tool servers for this request
    pub tool_servers: Vec<ToolServer>,
    /// Snapshot of the session's research index
    pub index: Vec<IndexedItem>,
}

impl ToolContext {
    /// Build a context from optional credentials; blank keys count as missing
    pub fn new(tavily_key: Option<String>, exa_key: Option<String>) -> Self {
        Self {
            tavily_key: tavily_key.filter(|k| !k.trim().is_empty()),
            exa_key: exa_key.filter(|k| !k.trim().is_empty()),
            ..Default::default()
        }
    }

    /// Attach the dynamic tool servers for this request
    pub fn with_servers(mut self, servers: Vec<ToolServer>) -> Self {
        self.tool_servers = servers;
        self
    }

    /// Attach a snapshot of the session index
    pub fn with_index(mut self, index: Vec<IndexedItem>) -> Self {
        self.index = index;
        self
    }
}

/// Build the structured error value recorded as a tool result
///
/// # Examples
///
/// ```
/// use lore::tools::tool_error;
///
/// let value = tool_error("Tavily API key missing");
/// assert_eq!(value["error"], "Tavily API key missing");
/// ```
pub fn tool_error(reason: impl Into<String>) -> Value {
    json!({ "error": reason.into() })
}

/// Tool executor trait for built-in tools
///
/// Implementations return `Ok` with the value to record as the tool result.
/// Expected failures (missing credentials) may be returned as
/// [`tool_error`] values; anything returned as `Err` is converted into one
/// by the [`ToolDispatcher`].
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use lore::error::Result;
/// use lore::tools::{Tool, ToolContext, ToolExecutor};
/// use serde_json::{json, Value};
///
/// struct Echo;
///
/// #[async_trait]
/// impl ToolExecutor for Echo {
///     fn tool_definition(&self) -> Tool {
///         Tool::new("echo", "Echo the arguments", json!({"type": "object"}))
///     }
///
///     async fn execute(&self, args: Value, _ctx: &ToolContext) -> Result<Value> {
///         Ok(args)
///     }
/// }
/// ```
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Returns the schema shown to the model
    fn tool_definition(&self) -> Tool;

    /// Executes the tool with the given arguments
    ///
    /// # Errors
    ///
    /// Returns error if execution fails
    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<Value>;
}

/// A tool name resolved to something executable
#[derive(Clone)]
pub enum ResolvedTool {
    /// One of the registered built-in tools
    Builtin(Arc<dyn ToolExecutor>),
    /// A tool hosted by a dynamic tool server
    Remote(RemoteTool),
}

/// Tool registry for built-in and remote tools
///
/// Built-ins keep their registration order, which is the order the model
/// sees them in. Remote tools are appended per request, grouped by server.
pub struct ToolRegistry {
    builtins: Vec<Arc<dyn ToolExecutor>>,
    mcp: Arc<McpManager>,
}

impl ToolRegistry {
    /// Create a registry with no built-ins
    pub fn new(mcp: Arc<McpManager>) -> Self {
        Self {
            builtins: Vec::new(),
            mcp,
        }
    }

    /// Create a registry with the five built-in research tools
    ///
    /// # Errors
    ///
    /// Returns error if the search HTTP client cannot be built
    pub fn with_builtins(config: &Config, mcp: Arc<McpManager>) -> Result<Self> {
        let client = Arc::new(SearchClient::new(
            std::time::Duration::from_secs(config.search.timeout_seconds),
            RetryPolicy::from(&config.retry),
        )?);

        let mut registry = Self::new(mcp);
        registry.register(Arc::new(WebSearchTool::new(
            Arc::clone(&client),
            &config.search.tavily_base_url,
        )));
        registry.register(Arc::new(ExtractContentTool::new(
            Arc::clone(&client),
            &config.search.tavily_base_url,
        )));
        registry.register(Arc::new(SemanticSearchTool::new(
            client,
            &config.search.exa_base_url,
            config.search.default_num_results,
        )));
        registry.register(Arc::new(PersistFindingTool));
        registry.register(Arc::new(SearchFindingsTool));
        Ok(registry)
    }

    /// Register a built-in tool
    ///
    /// A tool with the same name replaces the earlier one in place, keeping
    /// its position.
    pub fn register(&mut self, executor: Arc<dyn ToolExecutor>) {
        let name = executor.tool_definition().name;
        if let Some(slot) = self
            .builtins
            .iter_mut()
            .find(|existing| existing.tool_definition().name == name)
        {
            *slot = executor;
        } else {
            self.builtins.push(executor);
        }
    }

    /// Schemas of the built-in tools in declared order
    pub fn builtin_schemas(&self) -> Vec<Tool> {
        self.builtins.iter().map(|t| t.tool_definition()).collect()
    }

    /// Built-ins followed by the tools of every reachable server
    pub async fn list_tool_schemas(&self, servers: &[ToolServer]) -> Vec<Tool> {
        let mut schemas = self.builtin_schemas();
        if !servers.is_empty() {
            schemas.extend(self.mcp.tool_schemas(servers).await);
        }
        schemas
    }

    /// Resolve a tool name, checking built-ins before the dynamic set
    pub async fn resolve(&self, name: &str, servers: &[ToolServer]) -> Option<ResolvedTool> {
        if let Some(builtin) = self
            .builtins
            .iter()
            .find(|t| t.tool_definition().name == name)
        {
            return Some(ResolvedTool::Builtin(Arc::clone(builtin)));
        }

        if servers.is_empty() {
            return None;
        }
        self.mcp.resolve(name, servers).await.map(ResolvedTool::Remote)
    }

    /// Get the number of registered built-in tools
    pub fn len(&self) -> usize {
        self.builtins.len()
    }

    /// Check if no built-in tools are registered
    pub fn is_empty(&self) -> bool {
        self.builtins.is_empty()
    }
}
