//! Dynamic tool server support for Lore
//!
//! Tool servers speak JSON-RPC 2.0 over HTTP. Lore connects to the servers
//! a request names, lists their tools and exposes them to the model next to
//! the built-in research tools.
//!
//! # Module Layout
//!
//! - `types`   -- JSON-RPC primitives and the tool discovery/invocation types
//! - `client`  -- HTTP client for one server (JSON and SSE responses)
//! - `manager` -- per-server discovery cache, namespacing and invocation

pub mod client;
pub mod manager;
pub mod types;

pub use client::McpClient;
pub use manager::{namespaced_tool_name, McpManager, RemoteTool};
pub use types::{CallToolResponse, McpTool};
