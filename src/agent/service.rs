//! Session-level chat operations.
//!
//! [`ChatService`] owns the turn lifecycle around the [`Orchestrator`]:
//! input validation, the per-session lock, persisting the user message and
//! processing flag, storing findings, and keeping the session directory in
//! step. Each session is single-writer; turns on different sessions run in
//! parallel.

use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex as StdMutex};

use futures::FutureExt;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{error, info};

use super::findings::apply_persisted_findings;
use super::orchestrator::Orchestrator;
use crate::error::{LoreError, Result};
use crate::responses;
use crate::storage::directory::title_from_message;
use crate::storage::{
    ChatMessage, Role, Session, SessionDirectory, SessionInfo, SqliteStorage, ToolCallRecord,
    ToolServer,
};
use crate::tools::ToolContext;

/// Inputs for one turn besides the session id
#[derive(Debug, Clone, Default)]
pub struct TurnRequest {
    /// The user's message
    pub message: String,
    /// Web search / extraction key for this request only
    pub tavily_key: Option<String>,
    /// Semantic search key for this request only
    pub exa_key: Option<String>,
    /// Extra tool servers for this request only
    pub tool_servers: Vec<ToolServer>,
}

/// Result of a turn
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatReply {
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallRecord>>,
    pub session: Session,
}

/// Chat operations over persisted sessions
pub struct ChatService {
    storage: Arc<SqliteStorage>,
    directory: Arc<SessionDirectory>,
    orchestrator: Arc<Orchestrator>,
    locks: StdMutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ChatService {
    pub fn new(
        storage: Arc<SqliteStorage>,
        directory: Arc<SessionDirectory>,
        orchestrator: Arc<Orchestrator>,
    ) -> Self {
        Self {
            storage,
            directory,
            orchestrator,
            locks: StdMutex::new(HashMap::new()),
        }
    }

    /// The session directory
    pub fn directory(&self) -> &Arc<SessionDirectory> {
        &self.directory
    }

    /// The orchestrator turns are run through
    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        &self.orchestrator
    }

    /// Run `work` while holding the lock of session `id`
    ///
    /// The lock entry is dropped from the map once no other caller holds or
    /// waits on it.
    async fn with_session_lock<T, F, Fut>(&self, id: &str, work: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            Arc::clone(locks.entry(id.to_string()).or_default())
        };
        let output = {
            let _guard = lock.lock().await;
            work().await
        };
        drop(lock);

        let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if locks.get(id).is_some_and(|held| Arc::strong_count(held) == 1) {
            locks.remove(id);
        }
        output
    }

    #[cfg(test)]
    fn tracked_locks(&self) -> usize {
        self.locks.lock().map(|locks| locks.len()).unwrap_or_default()
    }

    /// Run one turn for session `id`
    ///
    /// # Errors
    ///
    /// - [`LoreError::Validation`] when the message is blank; nothing is
    ///   written in that case
    /// - [`LoreError::Internal`] when the turn faults; the processing flag
    ///   is reset before returning
    /// - storage errors from reading or writing the session
    pub async fn send_message(&self, id: &str, request: TurnRequest) -> Result<ChatReply> {
        let text = request.message.trim().to_string();
        if text.is_empty() {
            return Err(LoreError::Validation(responses::MISSING_MESSAGE.to_string()).into());
        }

        self.with_session_lock(id, || self.run_turn(id, text, request))
            .await
    }

    async fn run_turn(&self, id: &str, text: String, request: TurnRequest) -> Result<ChatReply> {
        let mut session = self.storage.read_session(id)?;
        let history = session.messages.clone();
        session.messages.push(ChatMessage::user(text.clone()));
        session.is_processing = true;
        session.model = self.orchestrator.model_name().to_string();
        self.storage.replace_session(id, &session)?;

        let mut servers = session.tool_servers.clone();
        for server in request.tool_servers {
            if !servers.contains(&server) {
                servers.push(server);
            }
        }
        let ctx = Arc::new(
            ToolContext::new(request.tavily_key, request.exa_key)
                .with_servers(servers)
                .with_index(session.index.clone()),
        );

        info!(session_id = %id, "Processing message");
        let turn = AssertUnwindSafe(self.orchestrator.process_message(&text, &history, ctx))
            .catch_unwind()
            .await;
        let outcome = match turn {
            Ok(outcome) => outcome,
            Err(_) => {
                error!(session_id = %id, "Turn panicked");
                session.is_processing = false;
                return Err(self.abort_turn(id, &session));
            }
        };

        let mut tool_calls = outcome.tool_calls;
        if let Some(records) = tool_calls.as_mut() {
            let added = apply_persisted_findings(records, &mut session.index);
            if added > 0 {
                info!(session_id = %id, added, "Research index updated");
            }
        }

        session
            .messages
            .push(ChatMessage::assistant(outcome.content.clone(), tool_calls.clone()));
        session.is_processing = false;
        if let Err(e) = self.storage.replace_session(id, &session) {
            error!(session_id = %id, error = %e, "Failed to store turn");
            return Err(self.abort_turn(id, &session));
        }

        self.record_activity(id, &session).await?;

        Ok(ChatReply {
            content: outcome.content,
            tool_calls,
            session,
        })
    }

    /// Best-effort reset of the processing flag after a faulted turn
    fn abort_turn(&self, id: &str, session: &Session) -> anyhow::Error {
        let mut reset = match self.storage.read_session(id) {
            Ok(stored) => stored,
            Err(_) => session.clone(),
        };
        reset.is_processing = false;
        if let Err(e) = self.storage.replace_session(id, &reset) {
            error!(session_id = %id, error = %e, "Failed to reset processing flag");
        }
        LoreError::Internal(responses::INTERNAL_ERROR.to_string()).into()
    }

    /// Create the directory entry on first contact, touch it afterwards
    async fn record_activity(&self, id: &str, session: &Session) -> Result<()> {
        if self.directory.get(id).await?.is_some() {
            return self.directory.touch(id).await;
        }
        let first = session
            .messages
            .iter()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or_default();
        self.directory
            .add(id, Some(&title_from_message(first)))
            .await?;
        Ok(())
    }

    /// Snapshot of a session; unknown ids get a fresh persisted session
    pub async fn read_session(&self, id: &str) -> Result<Session> {
        self.storage.read_session(id)
    }

    /// Empty a session's messages and index
    pub async fn clear_session(&self, id: &str) -> Result<Session> {
        let session = self
            .with_session_lock(id, || async move { self.storage.clear_session(id) })
            .await?;
        info!(session_id = %id, "Session cleared");
        Ok(session)
    }

    /// Replace the tool servers registered on a session
    ///
    /// # Errors
    ///
    /// Returns [`LoreError::Validation`] for a blank name or an unparseable URL
    pub async fn set_tool_servers(&self, id: &str, servers: Vec<ToolServer>) -> Result<Session> {
        for server in &servers {
            if server.name.trim().is_empty() {
                return Err(LoreError::Validation("tool server name required".to_string()).into());
            }
            url::Url::parse(&server.url).map_err(|e| {
                LoreError::Validation(format!("invalid tool server URL {}: {}", server.url, e))
            })?;
        }

        let session = self
            .with_session_lock(id, || async move {
                let mut session = self.storage.read_session(id)?;
                session.tool_servers = servers;
                self.storage.replace_session(id, &session)?;
                Ok::<_, anyhow::Error>(session)
            })
            .await?;
        info!(
            session_id = %id,
            servers = session.tool_servers.len(),
            "Tool servers registered"
        );
        Ok(session)
    }

    /// Add a directory entry for a new or existing session id
    ///
    /// The title is `title` when given, otherwise derived from
    /// `first_message`, otherwise the dated default.
    pub async fn create_session(
        &self,
        session_id: Option<String>,
        title: Option<&str>,
        first_message: Option<&str>,
    ) -> Result<SessionInfo> {
        let id = session_id
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let title = match (title.filter(|t| !t.trim().is_empty()), first_message) {
            (Some(title), _) => title.to_string(),
            (None, Some(message)) => title_from_message(message),
            (None, None) => crate::storage::directory::default_title(),
        };
        self.directory.add(&id, Some(&title)).await
    }
}
