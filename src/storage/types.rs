//! Session data model
//!
//! These types are both the persisted representation (as JSON inside the
//! session table) and the wire representation returned by the HTTP API, so
//! they serialize with camelCase field names.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Model used for sessions created without an explicit choice
pub const DEFAULT_MODEL: &str = "google-ai-studio/gemini-2.5-flash";

/// Message author
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
    Tool,
}

impl Role {
    /// Role string used on the model wire format
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
            Self::Tool => "tool",
        }
    }
}

/// One executed tool invocation, as recorded on an assistant message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    /// Id assigned by the model provider (or synthesized)
    pub id: String,
    /// Tool name as requested by the model
    pub name: String,
    /// Parsed argument object
    pub arguments: Value,
    /// Tool output, or `{"error": reason}`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

impl ToolCallRecord {
    /// Whether the result is an error marker
    pub fn is_error(&self) -> bool {
        self.result
            .as_ref()
            .and_then(|r| r.get("error"))
            .is_some()
    }
}

/// A transcript entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallRecord>>,
}

impl ChatMessage {
    /// Create a message with a fresh id and the current time
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
            tool_calls: None,
        }
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create an assistant message, attaching tool calls when there are any
    pub fn assistant(content: impl Into<String>, tool_calls: Option<Vec<ToolCallRecord>>) -> Self {
        let mut message = Self::new(Role::Assistant, content);
        message.tool_calls = tool_calls.filter(|calls| !calls.is_empty());
        message
    }
}

/// A finding persisted into the session's research index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexedItem {
    pub id: String,
    pub title: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl IndexedItem {
    /// Create a finding with a fresh id
    pub fn new(title: impl Into<String>, content: impl Into<String>, source_url: Option<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.into(),
            content: content.into(),
            source_url,
            timestamp: Utc::now(),
        }
    }

    /// Case-insensitive substring match against title, content and source URL
    pub fn matches(&self, query: &str) -> bool {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return false;
        }
        self.title.to_lowercase().contains(&needle)
            || self.content.to_lowercase().contains(&needle)
            || self
                .source_url
                .as_deref()
                .map(|u| u.to_lowercase().contains(&needle))
                .unwrap_or(false)
    }
}

/// A dynamic tool server registered by the caller
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ToolServer {
    /// Logical name, unique within a session
    pub name: String,
    /// JSON-RPC endpoint URL
    pub url: String,
}

impl ToolServer {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

/// Full per-session state
///
/// Only ever written as a whole through
/// [`SqliteStorage::replace_session`](crate::storage::SqliteStorage::replace_session).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub session_id: String,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub index: Vec<IndexedItem>,
    #[serde(default, rename = "mcpServers")]
    pub tool_servers: Vec<ToolServer>,
    #[serde(default)]
    pub is_processing: bool,
    /// Model that answered the most recent turn
    ///
    /// Informational only. Every request goes to the configured model.
    pub model: String,
}

impl Session {
    /// Fresh, empty state for `session_id`
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            messages: Vec::new(),
            index: Vec::new(),
            tool_servers: Vec::new(),
            is_processing: false,
            model: DEFAULT_MODEL.to_string(),
        }
    }
}

/// Directory entry for one session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
}
