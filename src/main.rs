//! Lore - tool-augmented research conversations
//!
#![doc = "Main entry point for the Lore service and CLI."]

use anyhow::Result;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use lore::cli::{Cli, Commands};
use lore::commands;
use lore::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Initialize tracing
    init_tracing(cli.verbose);

    // Load configuration
    let config_path = cli.config.as_deref().unwrap_or("config/config.yaml");
    let config = Config::load(config_path, &cli)?;

    // Validate configuration
    config.validate()?;

    // Execute command
    match cli.command {
        Commands::Serve { bind } => {
            commands::serve::run_serve(config, bind).await?;
            Ok(())
        }
        Commands::Ask {
            session,
            tavily_key,
            exa_key,
            servers,
            message,
        } => {
            if let Some(id) = &session {
                tracing::debug!("Continuing session: {}", id);
            }
            commands::ask::run_ask(config, session, tavily_key, exa_key, servers, message).await?;
            Ok(())
        }
        Commands::Sessions { command } => {
            commands::sessions::handle_sessions(&config, command).await?;
            Ok(())
        }
        Commands::Tools { servers, json } => {
            commands::tools::list_tools(&config, servers, json).await?;
            Ok(())
        }
    }
}

/// Initialize tracing subscriber with environment filter
///
/// `RUST_LOG` wins over the default filter; `LORE_LOG_FORMAT=json` selects
/// the JSON formatter. Logs go to stderr so command output stays clean.
fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "lore=debug" } else { "lore=info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let json = std::env::var("LORE_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(env_filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
