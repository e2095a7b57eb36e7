//! Shared HTTP client for the search providers.
//!
//! Every provider call is a JSON POST with a per-request timeout and the
//! bounded retry budget from [`RetryPolicy`]. Search calls have no remote
//! side effects, so a transport failure may be retried once.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde_json::Value;

use crate::error::{LoreError, Result};
use crate::retry::{with_timeout, RetryPolicy};

/// JSON-over-HTTP client used by the search tools
#[derive(Debug, Clone)]
pub struct SearchClient {
    client: Client,
    timeout: Duration,
    retry: RetryPolicy,
}

impl SearchClient {
    /// Create a client with the given per-request timeout and retry policy
    ///
    /// # Errors
    ///
    /// Returns error if HTTP client initialization fails
    pub fn new(timeout: Duration, retry: RetryPolicy) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("lore/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| LoreError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            timeout,
            retry,
        })
    }

    /// POST `body` to `url` and parse the JSON response
    ///
    /// # Arguments
    ///
    /// * `provider` - Provider name used in logs and error messages
    /// * `url` - Endpoint URL
    /// * `headers` - Extra request headers (e.g. API key headers)
    /// * `body` - JSON request body
    ///
    /// # Errors
    ///
    /// - [`LoreError::UpstreamTimeout`] when the provider is unreachable or slow
    /// - [`LoreError::Authentication`] on 401/403
    /// - [`LoreError::ToolExecution`] on any other failure status or a
    ///   malformed body
    pub async fn post_json(
        &self,
        provider: &str,
        url: &str,
        headers: &[(&str, &str)],
        body: &Value,
    ) -> Result<Value> {
        self.retry
            .execute(provider, || {
                with_timeout(self.timeout, provider, self.post_once(provider, url, headers, body))
            })
            .await
    }

    async fn post_once(
        &self,
        provider: &str,
        url: &str,
        headers: &[(&str, &str)],
        body: &Value,
    ) -> Result<Value> {
        let mut request = self.client.post(url).json(body);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }

        tracing::debug!(provider, url, "Sending search request");

        let response = request.send().await.map_err(|e| {
            tracing::warn!("{} request failed: {}", provider, e);
            if e.is_timeout() || e.is_connect() {
                LoreError::UpstreamTimeout(format!("{} is unreachable: {}", provider, e))
            } else {
                LoreError::ToolExecution(format!("{} request failed: {}", provider, e))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!("{} returned error {}: {}", provider, status, error_text);
            return Err(format_provider_error(provider, status, &error_text).into());
        }

        response.json::<Value>().await.map_err(|e| {
            tracing::error!("Failed to parse {} response: {}", provider, e);
            LoreError::ToolExecution(format!("Failed to parse {} response: {}", provider, e)).into()
        })
    }
}

fn format_provider_error(provider: &str, status: StatusCode, body: &str) -> LoreError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => LoreError::Authentication(format!(
            "{} rejected the API key ({})",
            provider, status
        )),
        _ => LoreError::ToolExecution(format!("{} returned error {}: {}", provider, status, body)),
    }
}
