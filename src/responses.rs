//! User-facing response strings.
//!
//! Failures in the model round-trips are reported to the user as assistant
//! text rather than as request errors, so the wording lives in one place.

/// Send-message request with empty or missing text
pub const MISSING_MESSAGE: &str = "Message required";

/// First model call failed for a reason outside the other classes
pub const PROCESSING_ERROR: &str = "The archivist encountered a failure while retrieving data.";

/// Unknown route, session or tool
pub const NOT_FOUND: &str = "The requested archive entry was not found.";

/// Unexpected fault during a turn
pub const INTERNAL_ERROR: &str = "A systemic failure occurred in the library.";

/// Model endpoint configured with placeholder or missing credentials
pub const AI_CONFIG_ERROR: &str =
    "AI service placeholders detected. Please configure the AI gateway endpoint and key.";

/// Model endpoint rejected the configured credentials
pub const AI_AUTH_ERROR: &str = "The AI service rejected the configured credentials.";

/// Model endpoint unreachable or timed out
pub const AI_SERVICE_UNAVAILABLE: &str = "The AI service is temporarily out of reach.";

/// Tool results were gathered but the synthesis call failed
pub const SYNTHESIS_APOLOGY: &str = "I gathered research results but could not synthesize a final answer. The tool results are attached below.";

/// Synthesis call returned no text
pub const RESEARCH_COMPLETE: &str = "Research loop complete.";

/// A tool exceeded its time budget
pub const TOOL_TIMEOUT: &str = "Research tool took too long to respond.";
