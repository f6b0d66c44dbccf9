//! Error types for Vitalis

use thiserror::Error;

/// Main error type for Vitalis operations
#[derive(Error, Debug)]
pub enum VitalisError {
    /// Backing key-value/vector store errors
    #[error("Store error: {0}")]
    Store(String),

    /// Embedding generation errors
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Memory tier operation errors
    #[error("Memory error: {0}")]
    Memory(String),

    /// LLM agent invocation errors
    #[error("Agent error: {0}")]
    Agent(String),

    /// HTTP server errors
    #[error("Server error: {0}")]
    Server(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// General errors
    #[error("{0}")]
    General(String),
}

/// Result type alias for Vitalis operations
pub type Result<T> = std::result::Result<T, VitalisError>;
