//! CLI-specific error types

use thiserror::Error;

/// Errors that can occur during CLI operations
#[derive(Debug, Error)]
pub enum CliError {
    /// Consent coordinator error
    #[error("Consent error: {0}")]
    Consent(#[from] hubgate_core::ConsentError),

    /// Decision storage error
    #[error("Storage error: {0}")]
    Store(#[from] hubgate_core::StoreError),

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration file could not be parsed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error (filesystem, stdout, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
