//! Provider module for Lore
//!
//! This module contains the model provider abstraction and the
//! OpenAI-compatible implementation used to reach the AI gateway.

pub mod base;
pub mod openai;

pub use base::{CompletionResponse, FunctionCall, Message, Provider, TokenUsage, ToolCall};
pub use openai::OpenAiProvider;

use crate::config::Config;
use crate::error::Result;
use crate::retry::RetryPolicy;
use std::sync::Arc;

/// Create the provider described by configuration
///
/// Placeholder credentials do not fail here; they are reported through
/// [`Provider::configuration_issue`] when a turn starts.
///
/// # Errors
///
/// Returns error if the HTTP client cannot be built
pub fn create_provider(config: &Config) -> Result<Arc<dyn Provider>> {
    let provider = OpenAiProvider::new(config.model.clone(), RetryPolicy::from(&config.retry))?;
    if let Some(issue) = provider.configuration_issue() {
        tracing::warn!(issue = %issue, "Model endpoint is not configured");
    }
    Ok(Arc::new(provider))
}
