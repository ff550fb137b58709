use super::{DecisionStore, StoreError};
use crate::decision::ConsentDecision;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// On-disk layout: two keyed records in a single JSON document.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreDocument {
    #[serde(default)]
    consent_decisions: HashMap<String, ConsentDecision>,
    #[serde(default)]
    pending_consent: HashMap<String, bool>,
}

/// File-based decision store.
///
/// Decisions are persisted to a JSON file holding the `consent_decisions` and
/// `pending_consent` records. The file is created automatically on the first
/// write.
///
/// Each mutation loads, modifies and flushes the document while holding one
/// lock, so concurrent writers for different origins cannot clobber each
/// other within a process.
pub struct FileDecisionStore {
    path: PathBuf,
    cache: Mutex<Option<StoreDocument>>,
}

impl FileDecisionStore {
    /// Create a new file-based store at the given path.
    ///
    /// The file does not need to exist.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: Mutex::new(None),
        }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<StoreDocument, StoreError> {
        if !self.path.exists() {
            return Ok(StoreDocument::default());
        }
        let contents = std::fs::read_to_string(&self.path)?;
        if contents.trim().is_empty() {
            return Ok(StoreDocument::default());
        }
        Ok(serde_json::from_str(&contents)?)
    }

    fn flush(&self, document: &StoreDocument) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(document)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }

    /// Run `f` against the cached document, loading it first if needed.
    fn read<T>(&self, f: impl FnOnce(&StoreDocument) -> T) -> Result<T, StoreError> {
        let mut cache = self.cache.lock();
        if cache.is_none() {
            *cache = Some(self.load()?);
        }
        match cache.as_ref() {
            Some(document) => Ok(f(document)),
            None => Err(StoreError::Read("decision cache unavailable".to_string())),
        }
    }

    /// Apply `f` to the document and flush it, all under the cache lock.
    ///
    /// The write is skipped when `f` reports no change.
    fn update<T>(
        &self,
        f: impl FnOnce(&mut StoreDocument) -> (T, bool),
    ) -> Result<T, StoreError> {
        let mut cache = self.cache.lock();
        let mut document = match cache.take() {
            Some(document) => document,
            None => self.load()?,
        };
        let (result, changed) = f(&mut document);
        let flushed = if changed {
            self.flush(&document)
        } else {
            Ok(())
        };
        if flushed.is_ok() {
            *cache = Some(document);
        }
        flushed.map(|_| result)
    }
}

#[async_trait]
impl DecisionStore for FileDecisionStore {
    async fn get_all(&self) -> Result<HashMap<String, ConsentDecision>, StoreError> {
        self.read(|doc| doc.consent_decisions.clone())
    }

    async fn get(&self, origin: &str) -> Result<Option<ConsentDecision>, StoreError> {
        self.read(|doc| doc.consent_decisions.get(origin).cloned())
    }

    async fn set(&self, origin: &str, decision: ConsentDecision) -> Result<(), StoreError> {
        self.update(|doc| {
            doc.consent_decisions.insert(origin.to_string(), decision);
            ((), true)
        })
    }

    async fn remove(&self, origin: &str) -> Result<bool, StoreError> {
        self.update(|doc| {
            let removed = doc.consent_decisions.remove(origin).is_some();
            (removed, removed)
        })
    }

    async fn remove_all(&self) -> Result<(), StoreError> {
        self.update(|doc| {
            doc.consent_decisions.clear();
            ((), true)
        })
    }

    async fn get_pending(&self) -> Result<HashSet<String>, StoreError> {
        self.read(|doc| {
            doc.pending_consent
                .iter()
                .filter(|(_, pending)| **pending)
                .map(|(origin, _)| origin.clone())
                .collect()
        })
    }

    async fn set_pending(&self, origin: &str, pending: bool) -> Result<(), StoreError> {
        self.update(|doc| {
            let changed = if pending {
                doc.pending_consent.insert(origin.to_string(), true) != Some(true)
            } else {
                doc.pending_consent.remove(origin).is_some()
            };
            ((), changed)
        })
    }

    async fn clear_pending(&self) -> Result<(), StoreError> {
        self.update(|doc| {
            let changed = !doc.pending_consent.is_empty();
            doc.pending_consent.clear();
            ((), changed)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_file_store_basic() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("consent.json");

        let store = FileDecisionStore::new(&path);

        assert!(store.get_all().await.unwrap().is_empty());

        store
            .set("a.com", ConsentDecision::granted("a.com", true))
            .await
            .unwrap();

        assert!(path.exists());
        assert!(store.get("a.com").await.unwrap().unwrap().permanent);

        // New instance reads what the first one wrote
        let store2 = FileDecisionStore::new(&path);
        let decision = store2.get("a.com").await.unwrap().unwrap();
        assert!(decision.granted);
        assert!(decision.permanent);
    }

    #[tokio::test]
    async fn test_file_store_layout_uses_keyed_records() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("consent.json");

        let store = FileDecisionStore::new(&path);
        store
            .set("a.com", ConsentDecision::denied("a.com"))
            .await
            .unwrap();
        store.set_pending("b.com", true).await.unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["consent_decisions"]["a.com"]["granted"], false);
        assert_eq!(raw["pending_consent"]["b.com"], true);
    }

    #[tokio::test]
    async fn test_file_store_creates_parent_dirs() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("nested/dir/consent.json");

        let store = FileDecisionStore::new(&path);
        store.set_pending("a.com", true).await.unwrap();

        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_file_store_handles_empty_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("consent.json");
        std::fs::write(&path, "").unwrap();

        let store = FileDecisionStore::new(&path);
        assert!(store.get_all().await.unwrap().is_empty());
        assert!(store.get_pending().await.unwrap().is_empty());

        store
            .set("a.com", ConsentDecision::granted("a.com", false))
            .await
            .unwrap();
        assert_eq!(store.get_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_file_store_corrupt_file_is_an_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("consent.json");
        std::fs::write(&path, "{not json").unwrap();

        let store = FileDecisionStore::new(&path);
        assert!(matches!(
            store.get_all().await,
            Err(StoreError::Json(_))
        ));
    }

    #[tokio::test]
    async fn test_file_store_remove_and_clear() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = FileDecisionStore::new(temp_dir.path().join("consent.json"));

        store
            .set("a.com", ConsentDecision::granted("a.com", false))
            .await
            .unwrap();
        store
            .set("b.com", ConsentDecision::denied("b.com"))
            .await
            .unwrap();
        store.set_pending("c.com", true).await.unwrap();

        assert!(store.remove("a.com").await.unwrap());
        assert!(!store.remove("a.com").await.unwrap());

        store.remove_all().await.unwrap();
        store.clear_pending().await.unwrap();
        assert!(store.get_all().await.unwrap().is_empty());
        assert!(store.get_pending().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_file_store_concurrent_writers_keep_both() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("consent.json");
        let store = std::sync::Arc::new(FileDecisionStore::new(&path));

        let a = {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .set("a.com", ConsentDecision::granted("a.com", false))
                    .await
            })
        };
        let b = {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .set("b.com", ConsentDecision::denied("b.com"))
                    .await
            })
        };
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        let reopened = FileDecisionStore::new(&path);
        assert_eq!(reopened.get_all().await.unwrap().len(), 2);
    }
}
