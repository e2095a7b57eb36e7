//! HTTP surface for Lore
//!
//! Every handler answers with the `{ success, data?, error? }` envelope
//! from [`response`]. Shared handles live in [`AppState`], built once at
//! startup.

pub mod response;
pub mod routes;

use std::sync::Arc;

use axum::routing::{delete, get, post, put};
use axum::Router;

use crate::agent::{ChatService, Orchestrator};
use crate::config::Config;
use crate::error::{LoreError, Result};
use crate::mcp::McpManager;
use crate::providers::{create_provider, Provider};
use crate::storage::{SessionDirectory, SqliteStorage};
use crate::tools::{ToolDispatcher, ToolRegistry};

/// Handles shared by every request
#[derive(Clone)]
pub struct AppState {
    pub chat: Arc<ChatService>,
    pub registry: Arc<ToolRegistry>,
}

impl AppState {
    /// Wire storage, tools, provider and chat service from configuration
    ///
    /// # Errors
    ///
    /// Returns error if the database cannot be opened or an HTTP client
    /// cannot be built
    pub fn from_config(config: &Config) -> Result<Self> {
        let storage = Arc::new(SqliteStorage::from_config(&config.storage)?);
        let provider = create_provider(config)?;
        Self::with_provider(config, storage, provider)
    }

    /// Same as [`from_config`](Self::from_config) with an explicit store and provider
    pub fn with_provider(
        config: &Config,
        storage: Arc<SqliteStorage>,
        provider: Arc<dyn Provider>,
    ) -> Result<Self> {
        let mcp = Arc::new(McpManager::from_config(&config.mcp, &config.retry));
        let registry = Arc::new(ToolRegistry::with_builtins(config, mcp)?);
        let dispatcher = Arc::new(ToolDispatcher::new(Arc::clone(&registry)));
        let orchestrator = Arc::new(Orchestrator::new(provider, dispatcher));
        let directory = Arc::new(SessionDirectory::new(Arc::clone(&storage)));

        Ok(Self {
            chat: Arc::new(ChatService::new(storage, directory, orchestrator)),
            registry,
        })
    }
}

/// Build the router over `state`
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/chat/:id/chat", post(routes::send_message))
        .route("/api/chat/:id/messages", get(routes::get_messages))
        .route("/api/chat/:id/clear", delete(routes::clear_session))
        .route("/api/chat/:id/servers", put(routes::set_servers))
        .route(
            "/api/sessions",
            get(routes::list_sessions)
                .post(routes::create_session)
                .delete(routes::clear_all_sessions),
        )
        .route("/api/sessions/stats", get(routes::session_stats))
        .route(
            "/api/sessions/:id",
            get(routes::get_session).delete(routes::delete_session),
        )
        .route("/api/sessions/:id/title", put(routes::rename_session))
        .route("/api/tools", get(routes::list_tools))
        .route("/api/health", get(routes::health))
        .fallback(routes::not_found)
        .with_state(state)
}

/// Serve the router on `bind` until Ctrl-C
///
/// # Errors
///
/// Returns error if the address cannot be bound
pub async fn serve(state: AppState, bind: &str) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .map_err(|e| LoreError::Config(format!("Failed to bind {}: {}", bind, e)))?;

    tracing::info!("listening on http://{}", bind);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = %e, "Failed to listen for shutdown signal");
            }
            tracing::info!("Shutting down");
        })
        .await?;
    Ok(())
}
