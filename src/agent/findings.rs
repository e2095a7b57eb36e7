//! Post-batch pass that stores acknowledged findings.
//!
//! `persist_finding` only acknowledges during the batch. Once the turn's
//! tool calls are complete, each acknowledged call is turned into an
//! [`IndexedItem`] and its result is patched with the stored item's id.

use serde_json::Value;

use crate::storage::{IndexedItem, ToolCallRecord};
use crate::tools::PERSIST_FINDING;

/// Result message once the finding is in the index
pub const PERSISTED_MESSAGE: &str = "Finding saved to the research index.";

/// Append every acknowledged finding to `index`
///
/// Returns the number of items added. Calls whose result is an error value
/// are left untouched.
pub fn apply_persisted_findings(records: &mut [ToolCallRecord], index: &mut Vec<IndexedItem>) -> usize {
    let mut added = 0;
    for record in records.iter_mut().filter(|r| r.name == PERSIST_FINDING) {
        let acknowledged = record
            .result
            .as_ref()
            .and_then(|r| r.get("success"))
            .and_then(Value::as_bool)
            .unwrap_or(false);
        if !acknowledged {
            continue;
        }

        let field = |key: &str| {
            record
                .arguments
                .get(key)
                .and_then(Value::as_str)
                .map(str::to_string)
        };
        let (Some(title), Some(content)) = (field("title"), field("content")) else {
            continue;
        };
        let item = IndexedItem::new(title, content, field("url").filter(|u| !u.trim().is_empty()));

        if let Some(Value::Object(result)) = record.result.as_mut() {
            result.insert("itemId".to_string(), Value::String(item.id.clone()));
            result.insert("message".to_string(), Value::String(PERSISTED_MESSAGE.to_string()));
        }
        tracing::info!(item_id = %item.id, title = %item.title, "Finding indexed");
        index.push(item);
        added += 1;
    }
    added
}
