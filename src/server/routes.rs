//! Route handlers for the chat, session directory and tool endpoints.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::response::{ApiError, ApiResponse};
use super::AppState;
use crate::agent::{ChatReply, TurnRequest};
use crate::responses;
use crate::storage::{Session, SessionInfo, ToolServer};
use crate::tools::Tool;

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

/// Per-request credentials and tool servers
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeys {
    pub tavily_key: Option<String>,
    pub exa_key: Option<String>,
    #[serde(default)]
    pub mcp_servers: Vec<ToolServer>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatBody {
    pub message: Option<String>,
    #[serde(default)]
    pub api_keys: Option<ApiKeys>,
}

#[derive(Debug, Deserialize)]
pub struct ServersBody {
    #[serde(default)]
    pub servers: Vec<ToolServer>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionBody {
    pub session_id: Option<String>,
    pub title: Option<String>,
    pub first_message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TitleBody {
    pub title: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedSession {
    pub session_id: String,
    pub title: String,
}

/// POST /api/chat/:id/chat
pub async fn send_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<ChatBody>, JsonRejection>,
) -> ApiResult<ChatReply> {
    let Json(body) = body.map_err(|e| {
        tracing::debug!(error = %e, "Rejected chat body");
        ApiError::bad_request(responses::MISSING_MESSAGE)
    })?;
    let keys = body.api_keys.unwrap_or_default();

    let reply = state
        .chat
        .send_message(
            &id,
            TurnRequest {
                message: body.message.unwrap_or_default(),
                tavily_key: keys.tavily_key,
                exa_key: keys.exa_key,
                tool_servers: keys.mcp_servers,
            },
        )
        .await?;
    Ok(ApiResponse::ok(reply))
}

/// GET /api/chat/:id/messages
pub async fn get_messages(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Session> {
    Ok(ApiResponse::ok(state.chat.read_session(&id).await?))
}

/// DELETE /api/chat/:id/clear
pub async fn clear_session(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Session> {
    Ok(ApiResponse::ok(state.chat.clear_session(&id).await?))
}

/// PUT /api/chat/:id/servers
pub async fn set_servers(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<ServersBody>, JsonRejection>,
) -> ApiResult<Session> {
    let Json(body) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;
    Ok(ApiResponse::ok(
        state.chat.set_tool_servers(&id, body.servers).await?,
    ))
}

/// GET /api/sessions
pub async fn list_sessions(State(state): State<AppState>) -> ApiResult<Vec<SessionInfo>> {
    Ok(ApiResponse::ok(state.chat.directory().list().await?))
}

/// POST /api/sessions
pub async fn create_session(
    State(state): State<AppState>,
    body: Result<Json<CreateSessionBody>, JsonRejection>,
) -> ApiResult<CreatedSession> {
    // An absent or empty body creates an untitled session
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let info = state
        .chat
        .create_session(
            body.session_id,
            body.title.as_deref(),
            body.first_message.as_deref(),
        )
        .await?;
    Ok(ApiResponse::ok(CreatedSession {
        session_id: info.id,
        title: info.title,
    }))
}

/// GET /api/sessions/stats
pub async fn session_stats(State(state): State<AppState>) -> ApiResult<Value> {
    let total = state.chat.directory().count().await?;
    Ok(ApiResponse::ok(json!({ "totalSessions": total })))
}

/// GET /api/sessions/:id
pub async fn get_session(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<SessionInfo> {
    match state.chat.directory().get(&id).await? {
        Some(info) => Ok(ApiResponse::ok(info)),
        None => Err(ApiError::not_found()),
    }
}

/// PUT /api/sessions/:id/title
pub async fn rename_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<TitleBody>, JsonRejection>,
) -> ApiResult<Value> {
    let title = body
        .ok()
        .and_then(|Json(b)| b.title)
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::bad_request("Title required"))?;

    if state.chat.directory().rename(&id, &title).await? {
        Ok(ApiResponse::ok(json!({ "sessionId": id, "title": title })))
    } else {
        Err(ApiError::not_found())
    }
}

/// DELETE /api/sessions/:id
pub async fn delete_session(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Value> {
    if state.chat.directory().remove(&id).await? {
        Ok(ApiResponse::ok(json!({ "deleted": true })))
    } else {
        Err(ApiError::not_found())
    }
}

/// DELETE /api/sessions
pub async fn clear_all_sessions(State(state): State<AppState>) -> ApiResult<Value> {
    let removed = state.chat.directory().clear_all().await?;
    Ok(ApiResponse::ok(json!({ "deletedCount": removed })))
}

/// GET /api/tools
pub async fn list_tools(State(state): State<AppState>) -> ApiResult<Vec<Tool>> {
    Ok(ApiResponse::ok(state.registry.builtin_schemas()))
}

/// GET /api/health
pub async fn health() -> ApiResult<Value> {
    Ok(ApiResponse::ok(json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
    })))
}

/// Any unmatched route
pub async fn not_found() -> ApiError {
    ApiError::not_found()
}
