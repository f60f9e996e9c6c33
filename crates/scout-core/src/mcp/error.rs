//! Tool-server error types

use thiserror::Error;

/// Errors from the tool-server channel, transport, and request client
#[derive(Debug, Error, Clone)]
pub enum McpError {
    /// The tool server process could not be launched
    #[error("Failed to spawn tool server: {0}")]
    Spawn(String),

    /// The startup handshake did not complete
    #[error("Handshake failed: {0}")]
    Handshake(String),

    /// The channel to the tool server is gone
    #[error("Connection error: {0}")]
    Connection(String),

    /// Mid-session stream failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// The peer returned a protocol-level error for a request
    #[error("Server error {code}: {message}")]
    Remote { code: i32, message: String },

    /// A request did not resolve in time
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// Message could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// An operation was attempted before the handshake
    #[error("Client not initialized")]
    NotInitialized,

    /// The handshake was attempted twice
    #[error("Client already initialized")]
    AlreadyInitialized,
}

impl McpError {
    /// Create a Spawn error
    pub fn spawn(message: impl Into<String>) -> Self {
        Self::Spawn(message.into())
    }

    /// Create a Handshake error
    pub fn handshake(message: impl Into<String>) -> Self {
        Self::Handshake(message.into())
    }

    /// Create a Connection error
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection(message.into())
    }

    /// Create a Transport error
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    /// Create a Remote error
    pub fn remote(code: i32, message: impl Into<String>) -> Self {
        Self::Remote {
            code,
            message: message.into(),
        }
    }

    /// Whether the error is fatal to the session rather than to one request
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Spawn(_) | Self::Handshake(_) | Self::Connection(_) | Self::Transport(_)
        )
    }
}

impl From<std::io::Error> for McpError {
    fn from(err: std::io::Error) -> Self {
        Self::transport(err.to_string())
    }
}

impl From<serde_json::Error> for McpError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
