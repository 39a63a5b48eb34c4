//! Error types for loz
//!
//! Crate-level error handling using thiserror. The agent core has its own
//! narrower error types (protocol, safety, tool, llm); this enum covers the
//! persistence layer the CLI drives after a run.

use thiserror::Error;

/// All error types that can escape the loz library surface
#[derive(Debug, Error)]
pub enum LozError {
    /// Chat history persistence error
    #[error("History error: {0}")]
    History(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for loz operations
pub type Result<T> = std::result::Result<T, LozError>;
