//! Error types for the aria voice client

use thiserror::Error;

/// Result type alias for aria operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the aria voice client
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Audio device could not be acquired or started
    #[error("audio device error: {0}")]
    Acquisition(String),

    /// Transport failed to open or dropped
    #[error("connection error: {0}")]
    Connection(String),

    /// Malformed audio payload
    #[error("decode error: {0}")]
    Decode(String),

    /// Tool execution failed or arguments were malformed
    #[error("tool error: {0}")]
    Tool(String),

    /// Unexpected or malformed inbound event
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Memory store error
    #[error("memory store error: {0}")]
    Memory(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}
