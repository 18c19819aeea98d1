//! Error types for the finance agent

use thiserror::Error;

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

#[derive(Error, Debug)]
pub enum AgentError {

    // =============================
    // Loop & Backend Errors
    // =============================

    #[error("Completion backend error: {0}")]
    Backend(String),

    #[error("Configuration error: {0}")]
    Config(String),

    // =============================
    // Tool Errors
    // =============================

    #[error("Tool already registered: {0}")]
    DuplicateTool(String),

    #[error("Tool {0} not found")]
    ToolNotFound(String),

    #[error("Invalid tool input: {0}")]
    InvalidToolInput(String),

    #[error("Tool error: {0}")]
    ToolError(String),

    #[error("Browser action failed: {0}")]
    Browser(String),

    #[error("Memory store error: {0}")]
    Memory(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
