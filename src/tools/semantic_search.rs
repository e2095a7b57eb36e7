//! Neural link search through the Exa API.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::web_search::required_str;
use super::{tool_error, SearchClient, Tool, ToolContext, ToolExecutor, SEMANTIC_SEARCH};
use crate::error::Result;

const PROVIDER: &str = "Exa";

/// Reported when no semantic search key accompanies the request
pub const MISSING_KEY: &str = "Exa API key missing";

/// Upper bound on requested results
const MAX_RESULTS: u64 = 25;

/// Semantic search for high-quality links and documents
pub struct SemanticSearchTool {
    client: Arc<SearchClient>,
    endpoint: String,
    default_num_results: u32,
}

impl SemanticSearchTool {
    pub fn new(client: Arc<SearchClient>, base_url: &str, default_num_results: u32) -> Self {
        Self {
            client,
            endpoint: format!("{}/search", base_url.trim_end_matches('/')),
            default_num_results,
        }
    }
}

#[async_trait]
impl ToolExecutor for SemanticSearchTool {
    fn tool_definition(&self) -> Tool {
        Tool::new(
            SEMANTIC_SEARCH,
            "Neural search to find high-quality links and documents similar in meaning to the query.",
            json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Semantic search query"
                    },
                    "num_results": {
                        "type": "integer",
                        "minimum": 1,
                        "maximum": MAX_RESULTS,
                        "default": self.default_num_results,
                        "description": "Number of results to return"
                    }
                },
                "required": ["query"]
            }),
        )
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<Value> {
        let Some(api_key) = ctx.exa_key.as_deref() else {
            return Ok(tool_error(MISSING_KEY));
        };

        let query = required_str(&args, "query")?;
        // Accept the provider's camelCase spelling too
        let num_results = args
            .get("num_results")
            .or_else(|| args.get("numResults"))
            .and_then(Value::as_u64)
            .unwrap_or(u64::from(self.default_num_results))
            .clamp(1, MAX_RESULTS);

        let response = self
            .client
            .post_json(
                PROVIDER,
                &self.endpoint,
                &[("x-api-key", api_key)],
                &json!({
                    "query": query,
                    "useAutoprompt": true,
                    "numResults": num_results,
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
            "Semantic search complete"
        );
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::RetryPolicy;
    use std::time::Duration;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn tool(base: &str) -> SemanticSearchTool {
        let client =
            Arc::new(SearchClient::new(Duration::from_secs(5), RetryPolicy::none()).unwrap());
        SemanticSearchTool::new(client, base, 5)
    }

    #[tokio::test]
    async fn test_missing_key_makes_no_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let result = tool(&server.uri())
            .execute(json!({"query": "rust"}), &ToolContext::default())
            .await
            .unwrap();
        assert_eq!(result["error"], MISSING_KEY);
    }

    #[tokio::test]
    async fn test_sends_key_header_and_default_count() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .and(header("x-api-key", "exa-key"))
            .and(body_string_contains("\"numResults\":5"))
            .and(body_string_contains("\"useAutoprompt\":true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [{"title": "Paper", "url": "https://p.example"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let ctx = ToolContext::new(None, Some("exa-key".to_string()));
        let result = tool(&server.uri())
            .execute(json!({"query": "ownership"}), &ctx)
            .await
            .unwrap();
        assert_eq!(result.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_result_count_is_clamped() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("\"numResults\":25"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": []})))
            .expect(1)
            .mount(&server)
            .await;

        let ctx = ToolContext::new(None, Some("exa-key".to_string()));
        let result = tool(&server.uri())
            .execute(json!({"query": "q", "num_results": 500}), &ctx)
            .await
            .unwrap();
        assert_eq!(result, json!([]));
    }

    #[test]
    fn test_schema_advertises_default_count() {
        let definition = tool("http://127.0.0.1:9").tool_definition();
        assert_eq!(definition.parameters["properties"]["num_results"]["default"], 5);
    }
}
