//! Unified error types for Mender

use thiserror::Error;

/// Unified error type for all Mender operations
#[derive(Error, Debug)]
pub enum MenderError {
    // Analyzer errors
    #[error("Clone failed: {0}")]
    Clone(String),

    #[error("Repository analysis failed: {0}")]
    Analysis(String),

    // Sandbox errors
    #[error("Sandbox error: {0}")]
    Sandbox(String),

    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),

    // LLM errors
    #[error("API error: {0}")]
    Api(String),

    #[error("API limit reached: {0}")]
    ApiLimit(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    // Version control errors
    #[error("Git command failed: {0}")]
    Git(String),

    // Run lifecycle errors
    #[error("Invalid stage transition: {0}")]
    InvalidTransition(String),

    #[error("Run exceeded deadline of {0}s")]
    Deadline(u64),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Configuration error: {0}")]
    Config(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic
    #[error("{0}")]
    Other(String),
}

/// Result type alias using MenderError
pub type Result<T> = std::result::Result<T, MenderError>;
