//! Decision storage trait and implementations.
//!
//! Stores hold two keyed records: the consent decisions (origin → decision)
//! and the pending set (origins currently inside a prompt flow). They carry
//! no business logic; expiry and de-duplication live in the coordinator.

mod file;
mod memory;

pub use file::FileDecisionStore;
pub use memory::MemoryDecisionStore;

use crate::decision::ConsentDecision;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};

/// Record name for the decision map.
pub const DECISIONS_KEY: &str = "consent_decisions";

/// Record name for the pending set.
pub const PENDING_KEY: &str = "pending_consent";

/// Errors that can occur in decision store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Failed to read decisions from storage.
    #[error("Failed to read decisions: {0}")]
    Read(String),

    /// Failed to write decisions to storage.
    #[error("Failed to write decisions: {0}")]
    Write(String),

    /// IO error during storage operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Database backend error.
    #[error("Database error: {0}")]
    Database(String),
}

/// Trait for decision storage implementations.
///
/// Every mutation must be atomic for its key: two concurrent writers touching
/// different origins must never lose each other's update. Errors propagate to
/// the caller untouched.
#[async_trait]
pub trait DecisionStore: Send + Sync {
    /// Load every stored decision, keyed by origin.
    async fn get_all(&self) -> Result<HashMap<String, ConsentDecision>, StoreError>;

    /// Load the decision for a single origin.
    async fn get(&self, origin: &str) -> Result<Option<ConsentDecision>, StoreError> {
        Ok(self.get_all().await?.remove(origin))
    }

    /// Store `decision` for `origin`, replacing any previous decision.
    async fn set(&self, origin: &str, decision: ConsentDecision) -> Result<(), StoreError>;

    /// Remove the decision for `origin`.
    ///
    /// Returns `true` if a decision was removed, `false` if none existed.
    async fn remove(&self, origin: &str) -> Result<bool, StoreError>;

    /// Remove every decision.
    async fn remove_all(&self) -> Result<(), StoreError>;

    /// Origins currently marked as pending.
    async fn get_pending(&self) -> Result<HashSet<String>, StoreError>;

    /// Mark or unmark `origin` as pending.
    async fn set_pending(&self, origin: &str, pending: bool) -> Result<(), StoreError>;

    /// Remove every pending marker.
    async fn clear_pending(&self) -> Result<(), StoreError>;
}
