//! Configuration management for Lore
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.

use crate::error::{LoreError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure for Lore
///
/// Holds the model endpoint, search provider endpoints, tool server and
/// retry settings, the HTTP bind address and the storage location.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Model endpoint configuration
    #[serde(default)]
    pub model: ModelConfig,
    /// Search provider configuration
    #[serde(default)]
    pub search: SearchConfig,
    /// Dynamic tool server configuration
    #[serde(default)]
    pub mcp: McpConfig,
    /// Retry budget for idempotent outbound calls
    #[serde(default)]
    pub retry: RetryConfig,
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Session storage configuration
    #[serde(default)]
    pub storage: StorageConfig,
}

/// OpenAI-compatible model endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Gateway base URL; `/chat/completions` is appended
    #[serde(default = "default_model_base_url")]
    pub base_url: String,

    /// Bearer token for the gateway
    #[serde(default)]
    pub api_key: String,

    /// Model identifier sent with every completion request
    #[serde(default = "default_model_name")]
    pub model: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_model_timeout")]
    pub timeout_seconds: u64,
}

fn default_model_base_url() -> String {
    "https://gateway.example.com/YOUR_ACCOUNT/openai".to_string()
}

fn default_model_name() -> String {
    "google-ai-studio/gemini-2.5-flash".to_string()
}

fn default_model_timeout() -> u64 {
    120
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: default_model_base_url(),
            api_key: String::new(),
            model: default_model_name(),
            timeout_seconds: default_model_timeout(),
        }
    }
}

/// Search provider endpoints
///
/// Credentials are never configured here; they arrive with each request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Base URL for the web search and extraction provider
    #[serde(default = "default_tavily_base_url")]
    pub tavily_base_url: String,

    /// Base URL for the semantic search provider
    #[serde(default = "default_exa_base_url")]
    pub exa_base_url: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_search_timeout")]
    pub timeout_seconds: u64,

    /// Result count used when the model does not ask for one
    #[serde(default = "default_num_results")]
    pub default_num_results: u32,
}

fn default_tavily_base_url() -> String {
    "https://api.tavily.com".to_string()
}

fn default_exa_base_url() -> String {
    "https://api.exa.ai".to_string()
}

fn default_search_timeout() -> u64 {
    30
}

fn default_num_results() -> u32 {
    5
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            tavily_base_url: default_tavily_base_url(),
            exa_base_url: default_exa_base_url(),
            timeout_seconds: default_search_timeout(),
            default_num_results: default_num_results(),
        }
    }
}

/// Dynamic tool server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpConfig {
    /// Per-request timeout in seconds for discovery and invocation
    #[serde(default = "default_mcp_timeout")]
    pub timeout_seconds: u64,

    /// Protocol version announced during `initialize`
    #[serde(default = "default_mcp_protocol_version")]
    pub protocol_version: String,
}

fn default_mcp_timeout() -> u64 {
    30
}

fn default_mcp_protocol_version() -> String {
    "2025-03-26".to_string()
}

impl Default for McpConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_mcp_timeout(),
            protocol_version: default_mcp_protocol_version(),
        }
    }
}

/// Retry budget for idempotent calls
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Attempts including the first; at most 2
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Backoff before the retry, in milliseconds
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
}

fn default_max_attempts() -> u32 {
    2
}

fn default_initial_backoff_ms() -> u64 {
    250
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Socket address to bind
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_bind() -> String {
    "127.0.0.1:8787".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

/// Session storage configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Database file; defaults to the platform data directory
    #[serde(default)]
    pub path: Option<String>,
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// # Arguments
    ///
    /// * `path` - Path to configuration file
    /// * `cli` - CLI arguments for overrides
    ///
    /// # Returns
    ///
    /// Returns the loaded and merged configuration
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed
    pub fn load(path: &str, cli: &crate::cli::Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| LoreError::Config(format!("Failed to read config file: {}", e)))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| LoreError::Config(format!("Failed to parse config: {}", e)).into())
    }

    fn apply_env_vars(&mut self) {
        if let Ok(base_url) = std::env::var("LORE_AI_BASE_URL") {
            self.model.base_url = base_url;
        }

        if let Ok(api_key) = std::env::var("LORE_AI_API_KEY") {
            self.model.api_key = api_key;
        }

        if let Ok(model) = std::env::var("LORE_MODEL") {
            self.model.model = model;
        }

        if let Ok(timeout) = std::env::var("LORE_MODEL_TIMEOUT_SECONDS") {
            if let Ok(value) = timeout.parse() {
                self.model.timeout_seconds = value;
            } else {
                tracing::warn!("Invalid LORE_MODEL_TIMEOUT_SECONDS: {}", timeout);
            }
        }

        if let Ok(base_url) = std::env::var("LORE_TAVILY_BASE_URL") {
            self.search.tavily_base_url = base_url;
        }

        if let Ok(base_url) = std::env::var("LORE_EXA_BASE_URL") {
            self.search.exa_base_url = base_url;
        }

        if let Ok(timeout) = std::env::var("LORE_SEARCH_TIMEOUT_SECONDS") {
            if let Ok(value) = timeout.parse() {
                self.search.timeout_seconds = value;
            } else {
                tracing::warn!("Invalid LORE_SEARCH_TIMEOUT_SECONDS: {}", timeout);
            }
        }

        if let Ok(bind) = std::env::var("LORE_BIND") {
            self.server.bind = bind;
        }

        if let Ok(db) = std::env::var("LORE_DB") {
            tracing::debug!(path = %db, "Env override: LORE_DB");
            self.storage.path = Some(db);
        }
    }

    fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) {
        if cli.verbose {
            tracing::debug!("Verbose mode enabled");
        }

        if let Some(path) = &cli.storage_path {
            self.storage.path = Some(path.clone());
        }
    }

    /// Validate the configuration
    ///
    /// Placeholder model credentials are not rejected here; each turn
    /// reports them as a configuration message.
    ///
    /// # Errors
    ///
    /// Returns error if any validation check fails
    pub fn validate(&self) -> Result<()> {
        if self.model.model.trim().is_empty() {
            return Err(LoreError::Config("model.model cannot be empty".to_string()).into());
        }

        for (name, value) in [
            ("search.tavily_base_url", &self.search.tavily_base_url),
            ("search.exa_base_url", &self.search.exa_base_url),
        ] {
            url::Url::parse(value)
                .map_err(|e| LoreError::Config(format!("{} is not a valid URL: {}", name, e)))?;
        }

        if self.model.timeout_seconds == 0
            || self.search.timeout_seconds == 0
            || self.mcp.timeout_seconds == 0
        {
            return Err(
                LoreError::Config("timeout_seconds must be greater than 0".to_string()).into(),
            );
        }

        if self.retry.max_attempts == 0 || self.retry.max_attempts > 2 {
            return Err(LoreError::Config(
                "retry.max_attempts must be 1 or 2".to_string(),
            )
            .into());
        }

        if self.server.bind.parse::<std::net::SocketAddr>().is_err() {
            return Err(LoreError::Config(format!(
                "server.bind is not a socket address: {}",
                self.server.bind
            ))
            .into());
        }

        Ok(())
    }
}
