//! One research turn: model call, tool fan-out, synthesis.
//!
//! A turn is at most two completions. The first sees the transcript and
//! the merged tool list; if it asks for tools, every call runs
//! concurrently and the second completion synthesizes the answer from the
//! results. Failures never escape: they become user-facing text or error
//! values inside the tool call records.

use std::sync::Arc;

use futures::future::join_all;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::prompts::SYSTEM_PROMPT;
use crate::error::LoreError;
use crate::providers::{Message, Provider, ToolCall};
use crate::responses;
use crate::storage::{ChatMessage, ToolCallRecord};
use crate::tools::{tool_error, ToolContext, ToolDispatcher};

/// What a turn produced
#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutcome {
    /// Assistant text shown to the user
    pub content: String,
    /// Tool calls in the order the model requested them; `None` when no
    /// tools ran
    pub tool_calls: Option<Vec<ToolCallRecord>>,
}

impl TurnOutcome {
    fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tool_calls: None,
        }
    }
}

/// Drives the model and the tools for a single user message
pub struct Orchestrator {
    provider: Arc<dyn Provider>,
    dispatcher: Arc<ToolDispatcher>,
}

impl Orchestrator {
    pub fn new(provider: Arc<dyn Provider>, dispatcher: Arc<ToolDispatcher>) -> Self {
        Self {
            provider,
            dispatcher,
        }
    }

    /// The dispatcher tool calls are routed through
    pub fn dispatcher(&self) -> &Arc<ToolDispatcher> {
        &self.dispatcher
    }

    /// Model completions are requested from
    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    /// Run one turn
    ///
    /// # Arguments
    ///
    /// * `text` - The new user message
    /// * `history` - Prior messages of the session, without `text`
    /// * `ctx` - Credentials, tool servers and index snapshot for the turn
    pub async fn process_message(
        &self,
        text: &str,
        history: &[ChatMessage],
        ctx: Arc<ToolContext>,
    ) -> TurnOutcome {
        if let Some(issue) = self.provider.configuration_issue() {
            warn!(issue = %issue, "Skipping model call");
            return TurnOutcome::text(responses::AI_CONFIG_ERROR);
        }

        let mut transcript = build_transcript(text, history);
        let schemas: Vec<Value> = self
            .dispatcher
            .list_tool_schemas(&ctx.tool_servers)
            .await
            .iter()
            .filter_map(|tool| serde_json::to_value(tool).ok())
            .collect();

        info!(
            model = self.provider.model_name(),
            history = history.len(),
            tools = schemas.len(),
            "Starting research turn"
        );

        let first = match self.provider.complete(&transcript, &schemas).await {
            Ok(response) => response.message,
            Err(e) => {
                tracing::error!(error = %e, "Model call failed");
                return TurnOutcome::text(classify_model_failure(&e));
            }
        };

        let requested = first.requested_tools().to_vec();
        if requested.is_empty() {
            debug!("Model answered without tools");
            return TurnOutcome::text(first.text());
        }

        info!(calls = requested.len(), "Executing tool calls");
        let records = self.execute_tools(&requested, ctx).await;

        transcript.push(first);
        for record in &records {
            transcript.push(Message::tool_result(
                record.id.clone(),
                render_result(record.result.as_ref()),
            ));
        }

        match self.provider.complete(&transcript, &[]).await {
            Ok(response) => {
                let content = response.message.text().trim().to_string();
                info!(tool_calls = records.len(), "Research turn complete");
                TurnOutcome {
                    content: if content.is_empty() {
                        responses::RESEARCH_COMPLETE.to_string()
                    } else {
                        response.message.text().to_string()
                    },
                    tool_calls: Some(records),
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Synthesis call failed");
                TurnOutcome {
                    content: responses::SYNTHESIS_APOLOGY.to_string(),
                    tool_calls: Some(records),
                }
            }
        }
    }

    /// Run every requested call concurrently, keeping request order
    async fn execute_tools(&self, requested: &[ToolCall], ctx: Arc<ToolContext>) -> Vec<ToolCallRecord> {
        let handles: Vec<_> = requested
            .iter()
            .cloned()
            .map(|call| {
                let dispatcher = Arc::clone(&self.dispatcher);
                let ctx = Arc::clone(&ctx);
                tokio::spawn(async move { run_call(&dispatcher, call, &ctx).await })
            })
            .collect();

        join_all(handles)
            .await
            .into_iter()
            .zip(requested)
            .map(|(joined, call)| match joined {
                Ok(record) => record,
                Err(e) => {
                    warn!(tool = %call.function.name, error = %e, "Tool task aborted");
                    ToolCallRecord {
                        id: call.id.clone(),
                        name: call.function.name.clone(),
                        arguments: parse_arguments(&call.function.arguments).unwrap_or_else(|_| json!({})),
                        result: Some(tool_error(format!(
                            "{} failed unexpectedly",
                            call.function.name
                        ))),
                    }
                }
            })
            .collect()
    }
}

async fn run_call(dispatcher: &ToolDispatcher, call: ToolCall, ctx: &ToolContext) -> ToolCallRecord {
    let ToolCall { id, function } = call;
    match parse_arguments(&function.arguments) {
        Ok(arguments) => {
            let result = dispatcher
                .execute(&function.name, arguments.clone(), ctx)
                .await;
            ToolCallRecord {
                id,
                name: function.name,
                arguments,
                result: Some(result),
            }
        }
        Err(e) => {
            warn!(tool = %function.name, error = %e, "Unparseable tool arguments");
            ToolCallRecord {
                id,
                result: Some(tool_error(format!(
                    "invalid arguments for {}: {}",
                    function.name, e
                ))),
                name: function.name,
                arguments: json!({}),
            }
        }
    }
}

/// Parse the model's argument string; blank means no arguments
fn parse_arguments(raw: &str) -> serde_json::Result<Value> {
    if raw.trim().is_empty() {
        return Ok(json!({}));
    }
    serde_json::from_str(raw)
}

/// System instruction, prior history as role/content pairs, then the new message
fn build_transcript(text: &str, history: &[ChatMessage]) -> Vec<Message> {
    let mut transcript = Vec::with_capacity(history.len() + 2);
    transcript.push(Message::system(SYSTEM_PROMPT));
    transcript.extend(history.iter().map(|m| Message {
        role: m.role.as_str().to_string(),
        content: Some(m.content.clone()),
        tool_calls: None,
        tool_call_id: None,
    }));
    transcript.push(Message::user(text));
    transcript
}

/// Tool result as `tool` message content
fn render_result(result: Option<&Value>) -> String {
    match result {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => Value::Null.to_string(),
    }
}

/// Map a first-call failure to the text shown to the user
fn classify_model_failure(err: &anyhow::Error) -> &'static str {
    match err.downcast_ref::<LoreError>() {
        Some(LoreError::Config(_)) => responses::AI_CONFIG_ERROR,
        Some(LoreError::Authentication(_)) => responses::AI_AUTH_ERROR,
        Some(LoreError::UpstreamTimeout(_)) => responses::AI_SERVICE_UNAVAILABLE,
        Some(LoreError::Http(e)) if e.is_timeout() || e.is_connect() => {
            responses::AI_SERVICE_UNAVAILABLE
        }
        _ => responses::PROCESSING_ERROR,
    }
}
