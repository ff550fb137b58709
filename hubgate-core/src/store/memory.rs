use super::{DecisionStore, StoreError};
use crate::decision::ConsentDecision;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};

/// In-memory decision store.
///
/// Decisions are lost when the process exits. This is the default store
/// used by the coordinator.
pub struct MemoryDecisionStore {
    decisions: RwLock<HashMap<String, ConsentDecision>>,
    pending: RwLock<HashSet<String>>,
}

impl MemoryDecisionStore {
    /// Create a new empty memory store.
    pub fn new() -> Self {
        Self {
            decisions: RwLock::new(HashMap::new()),
            pending: RwLock::new(HashSet::new()),
        }
    }

    /// Create a store seeded with existing decisions.
    pub fn with_decisions(decisions: impl IntoIterator<Item = ConsentDecision>) -> Self {
        let store = Self::new();
        {
            let mut map = store.decisions.write();
            for decision in decisions {
                map.insert(decision.origin.clone(), decision);
            }
        }
        store
    }
}

impl Default for MemoryDecisionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DecisionStore for MemoryDecisionStore {
    async fn get_all(&self) -> Result<HashMap<String, ConsentDecision>, StoreError> {
        Ok(self.decisions.read().clone())
    }

    async fn get(&self, origin: &str) -> Result<Option<ConsentDecision>, StoreError> {
        Ok(self.decisions.read().get(origin).cloned())
    }

    async fn set(&self, origin: &str, decision: ConsentDecision) -> Result<(), StoreError> {
        self.decisions.write().insert(origin.to_string(), decision);
        Ok(())
    }

    async fn remove(&self, origin: &str) -> Result<bool, StoreError> {
        Ok(self.decisions.write().remove(origin).is_some())
    }

    async fn remove_all(&self) -> Result<(), StoreError> {
        self.decisions.write().clear();
        Ok(())
    }

    async fn get_pending(&self) -> Result<HashSet<String>, StoreError> {
        Ok(self.pending.read().clone())
    }

    async fn set_pending(&self, origin: &str, pending: bool) -> Result<(), StoreError> {
        let mut set = self.pending.write();
        if pending {
            set.insert(origin.to_string());
        } else {
            set.remove(origin);
        }
        Ok(())
    }

    async fn clear_pending(&self) -> Result<(), StoreError> {
        self.pending.write().clear();
        Ok(())
    }
}
