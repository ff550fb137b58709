use async_trait::async_trait;
use chrono::DateTime;
use hubgate_core::{ConsentDecision, DecisionStore, StoreError};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

/// SQLite-based decision storage
///
/// One row per origin in `consent_decisions` and `pending_consent`. Every
/// mutation is a single statement on a single row, so concurrent writers for
/// different origins never overwrite each other, even across processes.
///
/// # Example
/// ```no_run
/// use hubgate_cli::SqliteDecisionStore;
/// use hubgate_core::{ConsentCoordinator, NotificationCenter};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = SqliteDecisionStore::new("~/.local/share/hubgate/consent.db")?;
/// let coordinator = ConsentCoordinator::builder()
///     .with_store(store)
///     .with_prompt_sink(NotificationCenter::new())
///     .build()
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct SqliteDecisionStore {
    conn: Arc<Mutex<Connection>>,
}

fn db_error(e: rusqlite::Error) -> StoreError {
    StoreError::Database(e.to_string())
}

fn decision_from_row(row: &Row<'_>) -> rusqlite::Result<(String, bool, bool, i64)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

fn into_decision(
    (origin, granted, permanent, timestamp): (String, bool, bool, i64),
) -> Result<ConsentDecision, StoreError> {
    let timestamp = DateTime::from_timestamp_millis(timestamp)
        .ok_or_else(|| StoreError::Read(format!("invalid timestamp for {}: {}", origin, timestamp)))?;
    Ok(ConsentDecision {
        origin,
        granted,
        timestamp,
        permanent,
    })
}

impl SqliteDecisionStore {
    /// Create new SQLite store at path
    ///
    /// Creates the database file and tables if they don't exist. A leading
    /// `~` is expanded to the home directory.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let path_str = path.to_string_lossy().to_string();
        let path = PathBuf::from(shellexpand::tilde(&path_str).as_ref());

        // Create parent directory if needed
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(&path).map_err(db_error)?;
        Self::with_connection(conn)
    }

    /// Create a store backed by a private in-memory database.
    pub fn in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory().map_err(db_error)?)
    }

    /// Use the default location (`hubgate/consent.db` in the user data directory)
    pub fn default_location() -> Result<Self, StoreError> {
        let dir = dirs::data_dir()
            .ok_or_else(|| StoreError::Read("no data directory for this user".to_string()))?;
        Self::new(dir.join("hubgate").join("consent.db"))
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(include_str!("schema.sql"))
            .map_err(|e| StoreError::Database(format!("Failed to initialize schema: {}", e)))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

#[async_trait]
impl DecisionStore for SqliteDecisionStore {
    async fn get_all(&self) -> Result<HashMap<String, ConsentDecision>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare("SELECT origin, granted, permanent, timestamp FROM consent_decisions")
            .map_err(db_error)?;

        let rows = stmt
            .query_map([], decision_from_row)
            .map_err(db_error)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_error)?;

        rows.into_iter()
            .map(|row| {
                let decision = into_decision(row)?;
                Ok((decision.origin.clone(), decision))
            })
            .collect()
    }

    async fn get(&self, origin: &str) -> Result<Option<ConsentDecision>, StoreError> {
        let row = {
            let conn = self.conn.lock();
            conn.query_row(
                "SELECT origin, granted, permanent, timestamp FROM consent_decisions WHERE origin = ?",
                params![origin],
                decision_from_row,
            )
            .optional()
            .map_err(db_error)?
        };
        row.map(into_decision).transpose()
    }

    async fn set(&self, origin: &str, decision: ConsentDecision) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO consent_decisions (origin, granted, permanent, timestamp)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(origin) DO UPDATE SET
                 granted = excluded.granted,
                 permanent = excluded.permanent,
                 timestamp = excluded.timestamp",
            params![
                origin,
                decision.granted,
                decision.permanent,
                decision.timestamp.timestamp_millis()
            ],
        )
        .map_err(|e| StoreError::Write(e.to_string()))?;
        Ok(())
    }

    async fn remove(&self, origin: &str) -> Result<bool, StoreError> {
        let conn = self.conn.lock();
        let deleted = conn
            .execute(
                "DELETE FROM consent_decisions WHERE origin = ?",
                params![origin],
            )
            .map_err(|e| StoreError::Write(e.to_string()))?;
        Ok(deleted > 0)
    }

    async fn remove_all(&self) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        conn.execute("DELETE FROM consent_decisions", [])
            .map_err(|e| StoreError::Write(e.to_string()))?;
        Ok(())
    }

    async fn get_pending(&self) -> Result<HashSet<String>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare("SELECT origin FROM pending_consent")
            .map_err(db_error)?;
        let origins = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(db_error)?
            .collect::<Result<HashSet<_>, _>>()
            .map_err(db_error)?;
        Ok(origins)
    }

    async fn set_pending(&self, origin: &str, pending: bool) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        let sql = if pending {
            "INSERT OR IGNORE INTO pending_consent (origin) VALUES (?)"
        } else {
            "DELETE FROM pending_consent WHERE origin = ?"
        };
        conn.execute(sql, params![origin])
            .map_err(|e| StoreError::Write(e.to_string()))?;
        Ok(())
    }

    async fn clear_pending(&self) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        conn.execute("DELETE FROM pending_consent", [])
            .map_err(|e| StoreError::Write(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_round_trip_preserves_fields() {
        let store = SqliteDecisionStore::in_memory().unwrap();
        let at = Utc::now() - Duration::hours(5);
        let decision = ConsentDecision::granted("a.com", true).with_timestamp(at);

        store.set("a.com", decision).await.unwrap();
        let loaded = store.get("a.com").await.unwrap().unwrap();

        assert!(loaded.granted);
        assert!(loaded.permanent);
        assert_eq!(loaded.timestamp.timestamp_millis(), at.timestamp_millis());
        assert!(store.get("b.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_replaces_existing() {
        let store = SqliteDecisionStore::in_memory().unwrap();
        store
            .set("a.com", ConsentDecision::denied("a.com"))
            .await
            .unwrap();
        store
            .set("a.com", ConsentDecision::granted("a.com", false))
            .await
            .unwrap();

        let all = store.get_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert!(all["a.com"].granted);
    }

    #[tokio::test]
    async fn test_remove_and_remove_all() {
        let store = SqliteDecisionStore::in_memory().unwrap();
        for origin in ["a.com", "b.com"] {
            store
                .set(origin, ConsentDecision::granted(origin, false))
                .await
                .unwrap();
        }

        assert!(store.remove("a.com").await.unwrap());
        assert!(!store.remove("a.com").await.unwrap());
        assert_eq!(store.get_all().await.unwrap().len(), 1);

        store.remove_all().await.unwrap();
        assert!(store.get_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_pending_markers() {
        let store = SqliteDecisionStore::in_memory().unwrap();
        store.set_pending("a.com", true).await.unwrap();
        store.set_pending("a.com", true).await.unwrap();
        store.set_pending("b.com", true).await.unwrap();
        store.set_pending("b.com", false).await.unwrap();

        let pending = store.get_pending().await.unwrap();
        assert_eq!(pending, HashSet::from(["a.com".to_string()]));

        store.clear_pending().await.unwrap();
        assert!(store.get_pending().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("consent.db");

        {
            let store = SqliteDecisionStore::new(&path).unwrap();
            store
                .set("a.com", ConsentDecision::granted("a.com", true))
                .await
                .unwrap();
            store.set_pending("b.com", true).await.unwrap();
        }

        let store = SqliteDecisionStore::new(&path).unwrap();
        assert!(store.get("a.com").await.unwrap().unwrap().permanent);
        assert!(store.get_pending().await.unwrap().contains("b.com"));
    }

    #[tokio::test]
    async fn test_two_handles_do_not_lose_updates() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("consent.db");
        let first = SqliteDecisionStore::new(&path).unwrap();
        let second = SqliteDecisionStore::new(&path).unwrap();

        first
            .set("a.com", ConsentDecision::granted("a.com", false))
            .await
            .unwrap();
        second
            .set("b.com", ConsentDecision::denied("b.com"))
            .await
            .unwrap();

        let all = first.get_all().await.unwrap();
        assert_eq!(all.len(), 2);
    }
}
