/*!
Command handlers for the CLI

This module provides command handlers invoked by the CLI entrypoint.

- `serve`    - Run the HTTP chat and session API
- `ask`      - Run one research turn from the terminal
- `tools`    - Print the tool schemas offered to the model
- `sessions` - Manage the session directory

These handlers are small and use the library components: storage, tools,
providers, and the chat service.
*/

use crate::config::Config;
use crate::error::Result;
use crate::storage::ToolServer;
use std::sync::Arc;

// Session directory management
pub mod sessions;

/// Convert `NAME=URL` pairs from the command line into tool servers
fn tool_servers(pairs: Vec<(String, String)>) -> Vec<ToolServer> {
    pairs
        .into_iter()
        .map(|(name, url)| ToolServer::new(name, url))
        .collect()
}

// HTTP server command handler
pub mod serve {
    //! Starts the HTTP surface with handles built from configuration.

    use super::*;
    use crate::server::{self, AppState};

    /// Run the server until Ctrl-C
    ///
    /// # Arguments
    ///
    /// * `config` - Loaded configuration
    /// * `bind` - Optional bind address overriding `server.bind`
    pub async fn run_serve(config: Config, bind: Option<String>) -> Result<()> {
        let bind = bind.unwrap_or_else(|| config.server.bind.clone());
        let state = AppState::from_config(&config)?;
        tracing::info!(
            bind = %bind,
            model = %config.model.model,
            tools = state.registry.len(),
            "Starting Lore server"
        );
        server::serve(state, &bind).await
    }
}

// Single-turn command handler
pub mod ask {
    //! Runs one research turn against local storage and prints the result.

    use super::*;
    use crate::agent::TurnRequest;
    use crate::server::AppState;
    use colored::Colorize;

    /// Send `message` to a session and print the answer and tool calls
    pub async fn run_ask(
        config: Config,
        session: Option<String>,
        tavily_key: Option<String>,
        exa_key: Option<String>,
        servers: Vec<(String, String)>,
        message: String,
    ) -> Result<()> {
        let state = AppState::from_config(&config)?;
        let session_id = session.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let reply = state
            .chat
            .send_message(
                &session_id,
                TurnRequest {
                    message,
                    tavily_key,
                    exa_key,
                    tool_servers: tool_servers(servers),
                },
            )
            .await?;

        for call in reply.tool_calls.iter().flatten() {
            let status = if call.is_error() { "error".red() } else { "ok".green() };
            println!("{} {} {} [{}]", "tool".dimmed(), call.name.cyan(), call.arguments, status);
        }
        if reply.tool_calls.is_some() {
            println!();
        }
        println!("{}", reply.content);
        println!();
        println!("{} {}", "session:".dimmed(), session_id.cyan());
        Ok(())
    }
}

// Tool listing command handler
pub mod tools {
    //! Prints the merged tool list: built-ins followed by the tools of any
    //! reachable server given on the command line.

    use super::*;
    use crate::mcp::McpManager;
    use crate::tools::ToolRegistry;
    use colored::Colorize;
    use prettytable::{format, Table};

    /// Print tool schemas as a table or JSON
    pub async fn list_tools(config: &Config, servers: Vec<(String, String)>, json: bool) -> Result<()> {
        let mcp = Arc::new(McpManager::from_config(&config.mcp, &config.retry));
        let registry = ToolRegistry::with_builtins(config, mcp)?;
        let schemas = registry.list_tool_schemas(&tool_servers(servers)).await;

        if json {
            println!("{}", serde_json::to_string_pretty(&schemas)?);
            return Ok(());
        }

        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_BORDERS_ONLY);
        table.add_row(prettytable::row!["Name".bold(), "Description".bold()]);
        for tool in &schemas {
            table.add_row(prettytable::row![tool.name.cyan(), tool.description]);
        }

        println!("\nTools:");
        table.printstd();
        println!();
        Ok(())
    }
}
