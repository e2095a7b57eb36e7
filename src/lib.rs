//! Lore - tool-augmented research conversations
//!
//! This library provides the core functionality behind the Lore service: a
//! conversation orchestrator that lets a chat model call research tools
//! (web search, content extraction, semantic search, a per-session research
//! index, and tools from dynamic tool servers), persisted sessions, and an
//! HTTP API over them.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `agent`: Research turn orchestration and the per-session chat service
//! - `providers`: Model provider abstraction and the OpenAI-compatible client
//! - `tools`: Built-in research tools, tool registry and dispatcher
//! - `mcp`: Dynamic tool server discovery and invocation
//! - `storage`: SQLite session state and session directory
//! - `server`: HTTP routes and response envelope
//! - `config`: Configuration management and validation
//! - `error`: Error types and result aliases
//! - `cli`: Command-line interface definition
//!
//! # Example
//!
//! ```no_run
//! use clap::Parser;
//! use lore::cli::Cli;
//! use lore::server::AppState;
//! use lore::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let cli = Cli::parse_from(["lore", "serve"]);
//!     let config = Config::load("config/config.yaml", &cli)?;
//!     config.validate()?;
//!
//!     let state = AppState::from_config(&config)?;
//!     lore::server::serve(state, &config.server.bind).await
//! }
//! ```

pub mod agent;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod mcp;
pub mod providers;
pub mod responses;
pub mod retry;
pub mod server;
pub mod storage;
pub mod tools;

// Re-export commonly used types
pub use agent::{ChatService, Orchestrator};
pub use config::Config;
pub use error::{LoreError, Result};
