//! Web search and content extraction through the Tavily API.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{tool_error, SearchClient, Tool, ToolContext, ToolExecutor, EXTRACT_CONTENT, WEB_SEARCH};
use crate::error::{LoreError, Result};

const PROVIDER: &str = "Tavily";

/// Reported when no web search key accompanies the request
pub const MISSING_KEY: &str = "Tavily API key missing";

/// Real-time web search
pub struct WebSearchTool {
    client: Arc<SearchClient>,
    endpoint: String,
}

impl WebSearchTool {
    pub fn new(client: Arc<SearchClient>, base_url: &str) -> Self {
        Self {
            client,
            endpoint: format!("{}/search", base_url.trim_end_matches('/')),
        }
    }
}

#[async_trait]
impl ToolExecutor for WebSearchTool {
    fn tool_definition(&self) -> Tool {
        Tool::new(
            WEB_SEARCH,
            "Search the web for real-time information. Returns a list of results with titles, URLs and content snippets.",
            json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "The search query"
                    },
                    "search_depth": {
                        "type": "string",
                        "enum": ["basic", "advanced"],
                        "default": "basic",
                        "description": "Use advanced for deeper but slower searches"
                    }
                },
                "required": ["query"]
            }),
        )
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<Value> {
        let Some(api_key) = ctx.tavily_key.as_deref() else {
            return Ok(tool_error(MISSING_KEY));
        };

        let query = required_str(&args, "query")?;
        let depth = match args.get("search_depth").and_then(Value::as_str) {
            Some("advanced") => "advanced",
            _ => "basic",
        };

        let response = self
            .client
            .post_json(
                PROVIDER,
                &self.endpoint,
                &[],
                &json!({
                    "api_key": api_key,
                    "query": query,
                    "search_depth": depth,
                }),
            )
            .await?;

        let results = response
            .get("results")
            .cloned()
            .unwrap_or_else(|| Value::Array(Vec::new()));
        tracing::info!(
            query,
            results = results.as_array().map(Vec::len).unwrap_or(0),
            "Web search complete"
        );
        Ok(results)
    }
}

/// Clean-content extraction for a list of URLs
pub struct ExtractContentTool {
    client: Arc<SearchClient>,
    endpoint: String,
}

impl ExtractContentTool {
    pub fn new(client: Arc<SearchClient>, base_url: &str) -> Self {
        Self {
            client,
            endpoint: format!("{}/extract", base_url.trim_end_matches('/')),
        }
    }
}

#[async_trait]
impl ToolExecutor for ExtractContentTool {
    fn tool_definition(&self) -> Tool {
        Tool::new(
            EXTRACT_CONTENT,
            "Extract clean text content from one or more web pages.",
            json!({
                "type": "object",
                "properties": {
                    "urls": {
                        "type": "array",
                        "items": { "type": "string" },
                        "minItems": 1,
                        "description": "List of URLs to extract content from"
                    }
                },
                "required": ["urls"]
            }),
        )
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<Value> {
        let Some(api_key) = ctx.tavily_key.as_deref() else {
            return Ok(tool_error(MISSING_KEY));
        };

        // Models sometimes pass a single URL as a bare string
        let urls: Vec<String> = match args.get("urls") {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            Some(Value::String(url)) => vec![url.clone()],
            _ => Vec::new(),
        };
        if urls.is_empty() {
            return Err(LoreError::ToolExecution("urls must contain at least one URL".into()).into());
        }

        // Raw provider payload, unmodified
        self.client
            .post_json(
                PROVIDER,
                &self.endpoint,
                &[],
                &json!({ "api_key": api_key, "urls": urls }),
            )
            .await
    }
}

/// Fetch a required non-empty string argument
pub(crate) fn required_str<'a>(args: &'a Value, name: &str) -> Result<&'a str> {
    args.get(name)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| LoreError::ToolExecution(format!("{} is required", name)).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::RetryPolicy;
    use std::time::Duration;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client() -> Arc<SearchClient> {
        Arc::new(SearchClient::new(Duration::from_secs(5), RetryPolicy::none()).unwrap())
    }

    fn keyed() -> ToolContext {
        ToolContext::new(Some("tvly-key".to_string()), None)
    }

    #[tokio::test]
    async fn test_missing_key_makes_no_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let tool = WebSearchTool::new(client(), &server.uri());
        let result = tool
            .execute(json!({"query": "rust"}), &ToolContext::default())
            .await
            .unwrap();
        assert_eq!(result, json!({"error": MISSING_KEY}));
    }

    #[tokio::test]
    async fn test_search_returns_result_list() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .and(body_string_contains("\"search_depth\":\"advanced\""))
            .and(body_string_contains("tvly-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "query": "rust",
                "results": [
                    {"title": "A", "url": "https://a.example", "content": "a"},
                    {"title": "B", "url": "https://b.example", "content": "b"}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let tool = WebSearchTool::new(client(), &format!("{}/", server.uri()));
        let result = tool
            .execute(json!({"query": "rust", "search_depth": "advanced"}), &keyed())
            .await
            .unwrap();
        assert_eq!(result.as_array().unwrap().len(), 2);
        assert_eq!(result[1]["title"], "B");
    }

    #[tokio::test]
    async fn test_search_requires_query() {
        let tool = WebSearchTool::new(client(), "http://127.0.0.1:9");
        let err = tool.execute(json!({}), &keyed()).await.unwrap_err();
        assert!(err.to_string().contains("query is required"));
    }

    #[tokio::test]
    async fn test_extract_returns_raw_payload() {
        let server = MockServer::start().await;
        let payload = json!({
            "results": [{"url": "https://a.example", "raw_content": "text"}],
            "failed_results": []
        });
        Mock::given(method("POST"))
            .and(path("/extract"))
            .and(body_string_contains("https://a.example"))
            .respond_with(ResponseTemplate::new(200).set_body_json(payload.clone()))
            .expect(1)
            .mount(&server)
            .await;

        let tool = ExtractContentTool::new(client(), &server.uri());
        let result = tool
            .execute(json!({"urls": ["https://a.example"]}), &keyed())
            .await
            .unwrap();
        assert_eq!(result, payload);
    }

    #[tokio::test]
    async fn test_extract_rejects_empty_url_list() {
        let tool = ExtractContentTool::new(client(), "http://127.0.0.1:9");
        assert!(tool.execute(json!({"urls": []}), &keyed()).await.is_err());
    }

    #[tokio::test]
    async fn test_extract_missing_key() {
        let tool = ExtractContentTool::new(client(), "http://127.0.0.1:9");
        let result = tool
            .execute(json!({"urls": ["https://a.example"]}), &ToolContext::default())
            .await
            .unwrap();
        assert_eq!(result["error"], MISSING_KEY);
    }
}
