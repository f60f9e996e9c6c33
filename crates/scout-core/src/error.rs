//! Crate-wide error types

use thiserror::Error;

/// Result type alias for scout operations
pub type ScoutResult<T> = Result<T, ScoutError>;

/// Main error type for the scout agent
#[derive(Error, Debug)]
pub enum ScoutError {
    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Chat model client errors
    #[error("LLM error: {0}")]
    Llm(String),

    /// Agent loop errors
    #[error("Agent error: {0}")]
    Agent(String),

    /// Tool server protocol errors
    #[error(transparent)]
    Mcp(#[from] crate::mcp::McpError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ScoutError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create an LLM error
    pub fn llm(message: impl Into<String>) -> Self {
        Self::Llm(message.into())
    }

    /// Create an agent error
    pub fn agent(message: impl Into<String>) -> Self {
        Self::Agent(message.into())
    }
}
