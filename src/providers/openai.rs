//! OpenAI-compatible chat completions provider
//!
//! Talks to any gateway that exposes `POST {base_url}/chat/completions`
//! with bearer authentication and OpenAI function calling.

use crate::config::ModelConfig;
use crate::error::{LoreError, Result};
use crate::providers::{CompletionResponse, FunctionCall, Message, Provider, TokenUsage, ToolCall};
use crate::retry::{with_timeout, RetryPolicy};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Markers that identify an unconfigured endpoint or key
const PLACEHOLDER_MARKERS: &[&str] = &["your_", "your-", "placeholder", "<"];

/// OpenAI-compatible provider
#[derive(Debug, Clone)]
pub struct OpenAiProvider {
    client: Client,
    config: ModelConfig,
    retry: RetryPolicy,
}

/// Request structure for the chat completions API
#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ChatTool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ChatToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct ChatToolCall {
    id: String,
    r#type: &'static str,
    function: ChatFunctionCall,
}

#[derive(Debug, Serialize)]
struct ChatFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Debug, Serialize)]
struct ChatTool {
    r#type: &'static str,
    function: ChatFunction,
}

#[derive(Debug, Serialize)]
struct ChatFunction {
    name: String,
    description: String,
    parameters: Value,
}

/// Response structure for the chat completions API
#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ChatResponseToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ChatResponseToolCall {
    #[serde(default)]
    id: Option<String>,
    function: ChatResponseFunction,
}

#[derive(Debug, Deserialize)]
struct ChatResponseFunction {
    name: String,
    /// Usually a JSON string; some gateways send an object
    #[serde(default)]
    arguments: Value,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: usize,
    #[serde(default)]
    completion_tokens: usize,
}

/// Detect placeholder or missing model credentials
///
/// # Examples
///
/// ```
/// use lore::config::ModelConfig;
/// use lore::providers::openai::placeholder_issue;
///
/// let config = ModelConfig::default();
/// assert!(placeholder_issue(&config).is_some());
/// ```
pub fn placeholder_issue(config: &ModelConfig) -> Option<String> {
    let is_placeholder = |value: &str| {
        let lower = value.trim().to_lowercase();
        lower.is_empty() || PLACEHOLDER_MARKERS.iter().any(|m| lower.contains(m))
    };

    if is_placeholder(&config.base_url) {
        return Some("model base URL is missing or a placeholder".to_string());
    }
    if is_placeholder(&config.api_key) {
        return Some("model API key is missing or a placeholder".to_string());
    }
    None
}

impl OpenAiProvider {
    /// Create a new provider
    ///
    /// # Errors
    ///
    /// Returns error if HTTP client initialization fails
    pub fn new(config: ModelConfig, retry: RetryPolicy) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(concat!("lore/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| LoreError::Provider(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config,
            retry,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }

    /// Convert transcript messages to the wire format
    fn convert_messages(&self, messages: &[Message]) -> Vec<ChatMessage> {
        messages
            .iter()
            .map(|m| ChatMessage {
                role: m.role.clone(),
                content: m.content.clone(),
                tool_calls: m.tool_calls.as_ref().map(|calls| {
                    calls
                        .iter()
                        .map(|tc| ChatToolCall {
                            id: tc.id.clone(),
                            r#type: "function",
                            function: ChatFunctionCall {
                                name: tc.function.name.clone(),
                                arguments: tc.function.arguments.clone(),
                            },
                        })
                        .collect()
                }),
                tool_call_id: m.tool_call_id.clone(),
            })
            .collect()
    }

    /// Convert tool schemas to the function calling format
    fn convert_tools(&self, tools: &[Value]) -> Vec<ChatTool> {
        tools
            .iter()
            .filter_map(|t| {
                let obj = t.as_object()?;
                let name = obj.get("name")?.as_str()?.to_string();
                let description = obj
                    .get("description")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                let parameters = obj
                    .get("parameters")
                    .cloned()
                    .unwrap_or_else(|| serde_json::json!({"type": "object", "properties": {}}));

                Some(ChatTool {
                    r#type: "function",
                    function: ChatFunction {
                        name,
                        description,
                        parameters,
                    },
                })
            })
            .collect()
    }

    /// Convert the first choice back to a transcript message
    fn convert_response_message(&self, message: ChatResponseMessage) -> Message {
        let content = message.content.filter(|c| !c.is_empty());
        match message.tool_calls {
            Some(tool_calls) if !tool_calls.is_empty() => {
                let millis = std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .unwrap_or_default()
                    .as_millis();
                let converted: Vec<ToolCall> = tool_calls
                    .into_iter()
                    .enumerate()
                    .map(|(idx, tc)| ToolCall {
                        id: tc
                            .id
                            .filter(|id| !id.is_empty())
                            .unwrap_or_else(|| format!("call_{}_{}", millis, idx)),
                        function: FunctionCall {
                            name: tc.function.name,
                            arguments: match tc.function.arguments {
                                Value::String(s) => s,
                                Value::Null => "{}".to_string(),
                                other => other.to_string(),
                            },
                        },
                    })
                    .collect();
                Message::assistant_with_tools(content, converted)
            }
            _ => Message::assistant(content.unwrap_or_default()),
        }
    }

    async fn send_once(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Model request failed: {}", e);
                if e.is_timeout() || e.is_connect() {
                    LoreError::UpstreamTimeout(format!("model endpoint unreachable: {}", e))
                } else {
                    LoreError::Provider(format!("model request failed: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!("Model endpoint returned error {}: {}", status, error_text);
            return Err(format_api_error(status, &error_text).into());
        }

        response.json::<ChatResponse>().await.map_err(|e| {
            tracing::error!("Failed to parse model response: {}", e);
            LoreError::Provider(format!("Failed to parse model response: {}", e)).into()
        })
    }
}

/// Classify a non-success status from the model endpoint
fn format_api_error(status: StatusCode, body: &str) -> LoreError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => LoreError::Authentication(format!(
            "model endpoint rejected credentials ({})",
            status
        )),
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
            LoreError::UpstreamTimeout(format!("model endpoint timed out ({})", status))
        }
        _ => LoreError::Provider(format!("model endpoint returned {}: {}", status, body)),
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    async fn complete(&self, messages: &[Message], tools: &[Value]) -> Result<CompletionResponse> {
        if let Some(issue) = self.configuration_issue() {
            return Err(LoreError::Config(issue).into());
        }

        let converted_tools = self.convert_tools(tools);
        let request = ChatRequest {
            model: self.config.model.clone(),
            messages: self.convert_messages(messages),
            tool_choice: (!converted_tools.is_empty()).then_some("auto"),
            tools: converted_tools,
        };

        tracing::debug!(
            model = %request.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Sending completion request"
        );

        let timeout = Duration::from_secs(self.config.timeout_seconds);
        let response = self
            .retry
            .execute("model completion", || {
                with_timeout(timeout, "model endpoint", self.send_once(&request))
            })
            .await?;

        let usage = response
            .usage
            .map(|u| TokenUsage::new(u.prompt_tokens, u.completion_tokens));
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LoreError::Provider("model response had no choices".to_string()))?;

        let message = self.convert_response_message(choice.message);
        Ok(match usage {
            Some(usage) => CompletionResponse::with_usage(message, usage),
            None => CompletionResponse::new(message),
        })
    }

    fn configuration_issue(&self) -> Option<String> {
        placeholder_issue(&self.config)
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}
