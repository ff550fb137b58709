//! Top-level error type for consent operations.

use thiserror::Error;

use crate::prompt::PromptError;
use crate::store::StoreError;

/// Errors returned by the consent coordinator and prompt flow.
///
/// A failed consent request must never reach the requesting origin as an
/// error: callers at the message boundary map every variant to
/// `granted: false`.
#[derive(Debug, Error)]
pub enum ConsentError {
    /// Reading or writing persisted decisions failed.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// The prompt surface failed.
    #[error("prompt error: {0}")]
    Prompt(#[from] PromptError),

    /// Configuration error (missing prompt sink, invalid TTL)
    #[error("configuration error: {0}")]
    Config(String),
}

impl ConsentError {
    /// Returns true if this is a storage error
    pub fn is_store(&self) -> bool {
        matches!(self, Self::Store(_))
    }

    /// Returns true if this is a prompt error
    pub fn is_prompt(&self) -> bool {
        matches!(self, Self::Prompt(_))
    }

    /// Returns true if this is a configuration error
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

/// Result type alias for consent operations.
pub type Result<T> = std::result::Result<T, ConsentError>;
