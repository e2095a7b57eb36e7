use std::sync::Arc;

use crate::cli::SessionCommand;
use crate::config::Config;
use crate::error::{LoreError, Result};
use crate::storage::{Role, SessionDirectory, SqliteStorage};
use colored::Colorize;
use prettytable::{format, Table};

/// Handle session directory commands
pub async fn handle_sessions(config: &Config, command: SessionCommand) -> Result<()> {
    let storage = Arc::new(SqliteStorage::from_config(&config.storage)?);
    let directory = SessionDirectory::new(Arc::clone(&storage));

    match command {
        SessionCommand::List => {
            let sessions = directory.list().await?;

            if sessions.is_empty() {
                println!("{}", "No sessions found.".yellow());
                return Ok(());
            }

            let mut table = Table::new();
            table.set_format(*format::consts::FORMAT_BORDERS_ONLY);
            table.add_row(prettytable::row![
                "ID".bold(),
                "Title".bold(),
                "Created".bold(),
                "Last Active".bold()
            ]);

            for session in sessions {
                table.add_row(prettytable::row![
                    session.id.cyan(),
                    session.title,
                    session.created_at.format("%Y-%m-%d %H:%M").to_string(),
                    session.last_active.format("%Y-%m-%d %H:%M").to_string()
                ]);
            }

            println!("\nSessions:");
            table.printstd();
            println!();
            println!(
                "Use {} to continue a session.",
                "lore ask --session <ID> <MESSAGE>".cyan()
            );
            println!();
        }
        SessionCommand::Show { id } => {
            let Some(info) = directory.get(&id).await? else {
                return Err(LoreError::NotFound(format!("session {}", id)).into());
            };
            let session = storage.read_session(&id)?;

            println!("{} {}", info.title.bold(), format!("({})", info.id).dimmed());
            println!();
            for message in &session.messages {
                let label = match message.role {
                    Role::User => "you".green().bold(),
                    Role::Assistant => "lore".cyan().bold(),
                    Role::System => "system".dimmed(),
                    Role::Tool => "tool".dimmed(),
                };
                println!("{} {}", label, message.content);
                for call in message.tool_calls.iter().flatten() {
                    let status = if call.is_error() { "error".red() } else { "ok".green() };
                    println!("    {} {} [{}]", "↳".dimmed(), call.name, status);
                }
                println!();
            }

            if !session.index.is_empty() {
                println!("{}", "Research index:".bold());
                for item in &session.index {
                    match &item.source_url {
                        Some(url) => println!("  - {} {}", item.title, url.dimmed()),
                        None => println!("  - {}", item.title),
                    }
                }
            }
        }
        SessionCommand::Rename { id, title } => {
            if !directory.rename(&id, &title).await? {
                return Err(LoreError::NotFound(format!("session {}", id)).into());
            }
            println!("{}", format!("Renamed session {}", id).green());
        }
        SessionCommand::Delete { id } => {
            if !directory.remove(&id).await? {
                return Err(LoreError::NotFound(format!("session {}", id)).into());
            }
            println!("{}", format!("Deleted session {}", id).green());
        }
        SessionCommand::ClearAll => {
            let removed = directory.clear_all().await?;
            println!("{}", format!("Removed {} session(s)", removed).green());
        }
    }

    Ok(())
}
