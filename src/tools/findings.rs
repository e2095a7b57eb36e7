//! Tools backed by the session's research index.
//!
//! Neither tool touches session state. `persist_finding` only validates and
//! acknowledges; the orchestration layer appends the finding after the
//! batch completes. `search_findings` filters the read-only index snapshot
//! carried in the [`ToolContext`].

use async_trait::async_trait;
use serde_json::{json, Value};

use super::web_search::required_str;
use super::{Tool, ToolContext, ToolExecutor, PERSIST_FINDING, SEARCH_FINDINGS};
use crate::error::Result;

/// Acknowledgement text returned before the finding is stored
pub const PERSIST_ACK: &str = "Finding queued for the research index.";

/// Save a finding into the session's research index
pub struct PersistFindingTool;

#[async_trait]
impl ToolExecutor for PersistFindingTool {
    fn tool_definition(&self) -> Tool {
        Tool::new(
            PERSIST_FINDING,
            "Save an important finding or extracted text into the research index for later retrieval.",
            json!({
                "type": "object",
                "properties": {
                    "title": {
                        "type": "string",
                        "description": "Title for the indexed item"
                    },
                    "content": {
                        "type": "string",
                        "description": "The text content to save"
                    },
                    "url": {
                        "type": "string",
                        "description": "Source URL"
                    }
                },
                "required": ["title", "content"]
            }),
        )
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext) -> Result<Value> {
        // Validate now so the post-batch pass only sees well-formed calls
        required_str(&args, "title")?;
        required_str(&args, "content")?;
        Ok(json!({ "success": true, "message": PERSIST_ACK }))
    }
}

/// Keyword search over the session's research index
pub struct SearchFindingsTool;

#[async_trait]
impl ToolExecutor for SearchFindingsTool {
    fn tool_definition(&self) -> Tool {
        Tool::new(
            SEARCH_FINDINGS,
            "Search previously saved research findings in this session.",
            json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Keywords to look for in indexed titles, content and URLs"
                    }
                },
                "required": ["query"]
            }),
        )
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<Value> {
        let query = required_str(&args, "query")?;
        let matches: Vec<&crate::storage::IndexedItem> =
            ctx.index.iter().filter(|item| item.matches(query)).collect();

        tracing::debug!(query, matches = matches.len(), "Searched research index");
        Ok(json!({
            "query": query,
            "count": matches.len(),
            "matches": matches,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::IndexedItem;

    #[tokio::test]
    async fn test_persist_acknowledges_valid_finding() {
        let result = PersistFindingTool
            .execute(json!({"title": "T", "content": "C"}), &ToolContext::default())
            .await
            .unwrap();
        assert_eq!(result["success"], true);
    }

    #[tokio::test]
    async fn test_persist_requires_title_and_content() {
        let ctx = ToolContext::default();
        assert!(PersistFindingTool
            .execute(json!({"title": "T"}), &ctx)
            .await
            .is_err());
        assert!(PersistFindingTool
            .execute(json!({"content": "C"}), &ctx)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_search_filters_snapshot() {
        let ctx = ToolContext::default().with_index(vec![
            IndexedItem::new("Tokio runtime", "work stealing scheduler", None),
            IndexedItem::new("Serde", "derive macros", Some("https://serde.rs".into())),
        ]);

        let result = SearchFindingsTool
            .execute(json!({"query": "SCHEDULER"}), &ctx)
            .await
            .unwrap();
        assert_eq!(result["count"], 1);
        assert_eq!(result["matches"][0]["title"], "Tokio runtime");

        let result = SearchFindingsTool
            .execute(json!({"query": "serde.rs"}), &ctx)
            .await
            .unwrap();
        assert_eq!(result["matches"][0]["sourceUrl"], "https://serde.rs");
    }

    #[tokio::test]
    async fn test_search_empty_index() {
        let result = SearchFindingsTool
            .execute(json!({"query": "anything"}), &ToolContext::default())
            .await
            .unwrap();
        assert_eq!(result["count"], 0);
        assert_eq!(result["matches"], json!([]));
    }
}
