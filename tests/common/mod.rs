use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use lore::config::Config;
use lore::error::Result;
use lore::providers::{CompletionResponse, FunctionCall, Message, Provider, ToolCall};
use lore::server::AppState;
use lore::storage::SqliteStorage;
use tempfile::TempDir;

#[allow(dead_code)]
pub fn create_temp_storage() -> (Arc<SqliteStorage>, TempDir) {
    let tmp = TempDir::new().expect("failed to create tempdir");
    let db_path = tmp.path().join("lore.db");
    let storage =
        SqliteStorage::new_with_path(db_path).expect("failed to create sqlite storage with path");
    (Arc::new(storage), tmp)
}

/// Configuration pointing the search providers at `search_base`
#[allow(dead_code)]
pub fn test_config(search_base: &str) -> Config {
    let mut config = Config::default();
    config.model.base_url = "http://127.0.0.1:9/v1".to_string();
    config.model.api_key = "sk-test".to_string();
    config.search.tavily_base_url = search_base.to_string();
    config.search.exa_base_url = search_base.to_string();
    config.search.timeout_seconds = 5;
    config.retry.max_attempts = 1;
    config
}

/// App state over a throwaway database and the given provider
#[allow(dead_code)]
pub fn test_state(config: &Config, provider: Arc<dyn Provider>) -> (AppState, TempDir) {
    let (storage, tmp) = create_temp_storage();
    let state = AppState::with_provider(config, storage, provider).expect("failed to build state");
    (state, tmp)
}

/// Provider that replays scripted messages and records every transcript
#[allow(dead_code)]
pub struct MockProvider {
    responses: Mutex<Vec<Message>>,
    transcripts: Mutex<Vec<Vec<Message>>>,
    tool_lists: Mutex<Vec<Vec<serde_json::Value>>>,
}

#[allow(dead_code)]
impl MockProvider {
    pub fn new(responses: Vec<Message>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses),
            transcripts: Mutex::new(Vec::new()),
            tool_lists: Mutex::new(Vec::new()),
        })
    }

    pub fn call_count(&self) -> usize {
        self.transcripts.lock().unwrap().len()
    }

    pub fn transcript(&self, call: usize) -> Vec<Message> {
        self.transcripts.lock().unwrap()[call].clone()
    }

    pub fn tools_offered(&self, call: usize) -> Vec<serde_json::Value> {
        self.tool_lists.lock().unwrap()[call].clone()
    }
}

#[async_trait]
impl Provider for MockProvider {
    async fn complete(
        &self,
        messages: &[Message],
        tools: &[serde_json::Value],
    ) -> Result<CompletionResponse> {
        self.transcripts.lock().unwrap().push(messages.to_vec());
        self.tool_lists.lock().unwrap().push(tools.to_vec());
        let mut responses = self.responses.lock().unwrap();
        let next = if responses.is_empty() {
            Message::assistant("Done")
        } else {
            responses.remove(0)
        };
        Ok(CompletionResponse::new(next))
    }
}

/// Assistant turn requesting one tool call
#[allow(dead_code)]
pub fn tool_request(id: &str, name: &str, arguments: serde_json::Value) -> Message {
    Message::assistant_with_tools(
        None,
        vec![ToolCall {
            id: id.to_string(),
            function: FunctionCall {
                name: name.to_string(),
                arguments: arguments.to_string(),
            },
        }],
    )
}
