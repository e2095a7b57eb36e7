//! Error types for Lore
//!
//! This module defines all error types used throughout the service,
//! using `thiserror` for ergonomic error handling.
//!
//! Functions return [`Result`], an `anyhow` alias, so call sites can attach
//! context freely. Layers that need to classify a failure (the orchestrator
//! and the HTTP surface) recover the typed variant with
//! `err.downcast_ref::<LoreError>()`.

use thiserror::Error;

/// Main error type for Lore operations
///
/// The variants follow the failure classes a conversation turn can hit:
/// configuration and credential problems, upstream failures from the model
/// endpoint, search providers and tool servers, malformed input, and
/// storage faults.
#[derive(Error, Debug)]
pub enum LoreError {
    /// Configuration-related errors (including placeholder model credentials)
    #[error("Configuration error: {0}")]
    Config(String),

    /// An upstream service rejected the supplied credentials
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Unknown session, route or tool
    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed input rejected before any state mutation
    #[error("Validation error: {0}")]
    Validation(String),

    /// A single tool invocation failed
    #[error("Tool execution error: {0}")]
    ToolExecution(String),

    /// An upstream endpoint was unreachable or did not answer in time
    #[error("Upstream timeout: {0}")]
    UpstreamTimeout(String),

    /// Model endpoint errors (bad status, malformed response)
    #[error("Provider error: {0}")]
    Provider(String),

    /// Tool server protocol errors (JSON-RPC error objects, bad payloads)
    #[error("MCP error: {0}")]
    Mcp(String),

    /// Tool server transport errors (HTTP failures, unexpected status)
    #[error("MCP transport error: {0}")]
    McpTransport(String),

    /// Session storage errors (database operations)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Unexpected fault inside a turn
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl LoreError {
    /// Whether a failed call may be attempted once more.
    ///
    /// Only transport-level failures qualify; a request the upstream answered
    /// (even with an error) is never repeated.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::UpstreamTimeout(_) => true,
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}

/// Result type alias for Lore operations
///
/// This is a convenience alias that uses `anyhow::Error` as the error type,
/// allowing for rich error context and easy error propagation.
pub type Result<T> = anyhow::Result<T>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let error = LoreError::Config("missing api key".to_string());
        assert_eq!(error.to_string(), "Configuration error: missing api key");
    }

    #[test]
    fn test_authentication_error_display() {
        let error = LoreError::Authentication("401 Unauthorized".to_string());
        assert_eq!(error.to_string(), "Authentication error: 401 Unauthorized");
    }

    #[test]
    fn test_not_found_error_display() {
        let error = LoreError::NotFound("session abc".to_string());
        assert_eq!(error.to_string(), "Not found: session abc");
    }

    #[test]
    fn test_validation_error_display() {
        let error = LoreError::Validation("Message required".to_string());
        assert_eq!(error.to_string(), "Validation error: Message required");
    }

    #[test]
    fn test_tool_execution_error_display() {
        let error = LoreError::ToolExecution("bad arguments".to_string());
        assert_eq!(error.to_string(), "Tool execution error: bad arguments");
    }

    #[test]
    fn test_upstream_timeout_display() {
        let error = LoreError::UpstreamTimeout("api.tavily.com".to_string());
        assert_eq!(error.to_string(), "Upstream timeout: api.tavily.com");
    }

    #[test]
    fn test_storage_error_display() {
        let error = LoreError::Storage("disk full".to_string());
        assert_eq!(error.to_string(), "Storage error: disk full");
    }

    #[test]
    fn test_only_timeouts_are_retryable() {
        assert!(LoreError::UpstreamTimeout("slow".into()).is_retryable());
        assert!(!LoreError::Authentication("nope".into()).is_retryable());
        assert!(!LoreError::Provider("500".into()).is_retryable());
        assert!(!LoreError::Mcp("bad".into()).is_retryable());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let error: LoreError = io_error.into();
        assert!(matches!(error, LoreError::Io(_)));
    }

    #[test]
    fn test_json_error_conversion() {
        let json_error = serde_json::from_str::<serde_json::Value>("{invalid json}").unwrap_err();
        let error: LoreError = json_error.into();
        assert!(matches!(error, LoreError::Serialization(_)));
    }

    #[test]
    fn test_yaml_error_conversion() {
        let yaml_error = serde_yaml::from_str::<serde_yaml::Value>("invalid: : yaml").unwrap_err();
        let error: LoreError = yaml_error.into();
        assert!(matches!(error, LoreError::Yaml(_)));
    }

    #[test]
    fn test_downcast_through_anyhow() {
        let err: anyhow::Error = LoreError::Validation("empty".into()).into();
        assert!(matches!(
            err.downcast_ref::<LoreError>(),
            Some(LoreError::Validation(_))
        ));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<LoreError>();
    }
}
