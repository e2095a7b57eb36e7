//! Tool execution with failures folded into result values.
//!
//! [`ToolDispatcher::execute`] never returns an error: unknown names,
//! handler errors and timeouts all become `{"error": reason}` so a turn can
//! always continue to the synthesis step.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use super::{tool_error, ResolvedTool, Tool, ToolContext, ToolRegistry};
use crate::error::LoreError;
use crate::responses;
use crate::storage::ToolServer;

/// Overall budget for one tool call, retries included
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(90);

/// Runs tools resolved through the [`ToolRegistry`]
pub struct ToolDispatcher {
    registry: Arc<ToolRegistry>,
    call_timeout: Duration,
}

impl ToolDispatcher {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            registry,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    /// Override the per-call budget
    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    /// The registry tools are resolved through
    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Merged schema list for a request's tool servers
    pub async fn list_tool_schemas(&self, servers: &[ToolServer]) -> Vec<Tool> {
        self.registry.list_tool_schemas(servers).await
    }

    /// Execute one tool call
    ///
    /// # Arguments
    ///
    /// * `name` - Tool name as requested by the model
    /// * `args` - Parsed argument object
    /// * `ctx` - Credentials, tool servers and index snapshot for the turn
    ///
    /// # Returns
    ///
    /// The tool's result, or `{"error": reason}`
    pub async fn execute(&self, name: &str, args: Value, ctx: &ToolContext) -> Value {
        let Some(resolved) = self.registry.resolve(name, &ctx.tool_servers).await else {
            tracing::warn!(tool = name, "Tool not implemented");
            return tool_error(format!("tool not implemented: {}", name));
        };

        tracing::debug!(tool = name, "Executing tool");
        let outcome = tokio::time::timeout(self.call_timeout, async {
            match resolved {
                ResolvedTool::Builtin(tool) => tool.execute(args, ctx).await,
                ResolvedTool::Remote(remote) => remote.call(args).await,
            }
        })
        .await;

        match outcome {
            Ok(Ok(value)) => value,
            Ok(Err(e)) => {
                tracing::warn!(tool = name, error = %e, "Tool execution failed");
                match e.downcast_ref::<LoreError>() {
                    Some(LoreError::UpstreamTimeout(_)) => tool_error(responses::TOOL_TIMEOUT),
                    _ => tool_error(e.to_string()),
                }
            }
            Err(_) => {
                tracing::warn!(
                    tool = name,
                    timeout_secs = self.call_timeout.as_secs(),
                    "Tool call exceeded its budget"
                );
                tool_error(responses::TOOL_TIMEOUT)
            }
        }
    }
}
