//! Consent configuration file.
//!
//! ```json
//! {
//!   "store": "~/.local/share/hubgate/consent.db",
//!   "decisionTtlHours": 24,
//!   "promptTimeoutSecs": 300,
//!   "reconcilePending": true
//! }
//! ```
//!
//! Every field is optional. A `promptTimeoutSecs` of 0 waits for the user
//! indefinitely.

use std::path::Path;
use std::time::Duration;

use hubgate_core::{
    ConsentCoordinator, PromptSink, SessionRegistry, DEFAULT_DECISION_TTL, DEFAULT_PROMPT_TIMEOUT,
};
use serde::{Deserialize, Serialize};

use crate::error::CliError;
use crate::store::SqliteDecisionStore;

/// Settings for a SQLite-backed coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsentConfig {
    /// Database path; the user data directory when absent.
    #[serde(default)]
    pub store: Option<String>,
    #[serde(default = "default_ttl_hours")]
    pub decision_ttl_hours: u64,
    #[serde(default = "default_timeout_secs")]
    pub prompt_timeout_secs: u64,
    #[serde(default = "default_true")]
    pub reconcile_pending: bool,
}

fn default_ttl_hours() -> u64 {
    DEFAULT_DECISION_TTL.as_secs() / 3600
}

fn default_timeout_secs() -> u64 {
    DEFAULT_PROMPT_TIMEOUT.as_secs()
}

fn default_true() -> bool {
    true
}

impl Default for ConsentConfig {
    fn default() -> Self {
        Self {
            store: None,
            decision_ttl_hours: default_ttl_hours(),
            prompt_timeout_secs: default_timeout_secs(),
            reconcile_pending: true,
        }
    }
}

impl ConsentConfig {
    /// Open the configured store.
    pub fn open_store(&self) -> Result<SqliteDecisionStore, CliError> {
        let store = match &self.store {
            Some(path) => SqliteDecisionStore::new(path)?,
            None => SqliteDecisionStore::default_location()?,
        };
        Ok(store)
    }

    /// Build a coordinator from this configuration.
    pub async fn build(
        &self,
        sink: impl PromptSink + 'static,
        registry: impl SessionRegistry + 'static,
    ) -> Result<ConsentCoordinator, CliError> {
        if self.decision_ttl_hours == 0 {
            return Err(CliError::Config(
                "decisionTtlHours must be at least 1".to_string(),
            ));
        }
        let ttl_secs = self.decision_ttl_hours.checked_mul(3600).ok_or_else(|| {
            CliError::Config(format!(
                "decisionTtlHours is too large: {}",
                self.decision_ttl_hours
            ))
        })?;

        let builder = ConsentCoordinator::builder()
            .with_store(self.open_store()?)
            .with_prompt_sink(sink)
            .with_session_registry(registry)
            .with_decision_ttl(Duration::from_secs(ttl_secs))
            .reconcile_pending_on_start(self.reconcile_pending);

        let builder = match self.prompt_timeout_secs {
            0 => builder.without_prompt_timeout(),
            secs => builder.with_prompt_timeout(Duration::from_secs(secs)),
        };

        Ok(builder.build().await?)
    }
}

/// Load a consent configuration from a JSON file
///
/// The path is expanded using shell expansion (e.g., `~/.config/hubgate.json`).
pub async fn load_config_file(path: impl AsRef<Path>) -> Result<ConsentConfig, CliError> {
    let path_str = path.as_ref().to_string_lossy().to_string();
    let expanded_path = shellexpand::tilde(&path_str);
    let path = Path::new(expanded_path.as_ref());

    let content = tokio::fs::read_to_string(path).await?;
    let config: ConsentConfig = serde_json::from_str(&content)?;
    log::debug!("loaded consent config from {}", path.display());
    Ok(config)
}
