//! Command-line interface definition for Lore
//!
//! This module defines the CLI structure using clap's derive API,
//! providing commands for serving the HTTP API, running a single research
//! turn, managing sessions and inspecting the tool catalogue.

use clap::{Parser, Subcommand};

/// Lore - tool-augmented research conversations
///
/// Serve the chat API or run research turns from the terminal. Search
/// credentials are supplied per invocation and never stored.
#[derive(Parser, Debug, Clone)]
#[command(name = "lore")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/config.yaml")]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Override the session database location
    #[arg(long, env = "LORE_DB")]
    pub storage_path: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for Lore
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Serve the chat and session HTTP API
    Serve {
        /// Socket address to bind (overrides config)
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Send one message to a session and print the answer
    Ask {
        /// Session to continue; a new one is created when omitted
        #[arg(short, long)]
        session: Option<String>,

        /// Web search / extraction provider key
        #[arg(long, env = "TAVILY_API_KEY", hide_env_values = true)]
        tavily_key: Option<String>,

        /// Semantic search provider key
        #[arg(long, env = "EXA_API_KEY", hide_env_values = true)]
        exa_key: Option<String>,

        /// Dynamic tool server as NAME=URL (repeatable)
        #[arg(long = "server", value_parser = parse_server_arg)]
        servers: Vec<(String, String)>,

        /// The message to send
        message: String,
    },

    /// Manage the session directory
    Sessions {
        /// Session subcommand
        #[command(subcommand)]
        command: SessionCommand,
    },

    /// Print the tool schemas offered to the model
    Tools {
        /// Dynamic tool server as NAME=URL (repeatable)
        #[arg(long = "server", value_parser = parse_server_arg)]
        servers: Vec<(String, String)>,

        /// Print raw JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

/// Session directory subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum SessionCommand {
    /// List sessions, most recently active first
    List,

    /// Show a session's messages and findings
    Show {
        /// Session ID
        id: String,
    },

    /// Rename a session
    Rename {
        /// Session ID
        id: String,
        /// New title
        title: String,
    },

    /// Remove a session from the directory
    Delete {
        /// Session ID
        id: String,
    },

    /// Remove every session from the directory
    ClearAll,
}

/// Parse a `NAME=URL` tool server argument
fn parse_server_arg(value: &str) -> Result<(String, String), String> {
    let (name, url) = value
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=URL, got '{}'", value))?;
    let name = name.trim();
    let url = url.trim();
    if name.is_empty() {
        return Err("tool server name cannot be empty".to_string());
    }
    url::Url::parse(url).map_err(|e| format!("invalid tool server URL '{}': {}", url, e))?;
    Ok((name.to_string(), url.to_string()))
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
