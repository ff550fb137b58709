//! Builder for [`ConsentCoordinator`].

use std::sync::Arc;
use std::time::Duration;

use super::inflight::InflightRegistry;
use super::ConsentCoordinator;
use crate::error::{ConsentError, Result};
use crate::events::{ConsentEvents, DEFAULT_EVENT_CAPACITY};
use crate::prompt::{ConsentPrompt, PromptSink};
use crate::revocation::{NoSessionRegistry, RevocationHook, SessionRegistry};
use crate::store::{DecisionStore, MemoryDecisionStore};

/// How long a non-permanent decision stays valid.
pub const DEFAULT_DECISION_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// How long each prompt stage waits for the user before giving up.
pub const DEFAULT_PROMPT_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Builder for creating a [`ConsentCoordinator`].
///
/// A prompt sink is required; everything else has a default:
///
/// | Setting | Default |
/// |---------|---------|
/// | store | [`MemoryDecisionStore`] |
/// | session registry | [`NoSessionRegistry`] |
/// | decision TTL | [`DEFAULT_DECISION_TTL`] (24 hours) |
/// | prompt timeout | [`DEFAULT_PROMPT_TIMEOUT`] (5 minutes per stage) |
/// | pending reconciliation | on |
///
/// # Example
///
/// ```rust
/// use hubgate_core::{ConsentCoordinator, FileDecisionStore, NotificationCenter};
/// use std::time::Duration;
///
/// # tokio_test::block_on(async {
/// let center = NotificationCenter::new();
///
/// let coordinator = ConsentCoordinator::builder()
///     .with_store(FileDecisionStore::new("/tmp/hubgate-doc/consent.json"))
///     .with_prompt_sink(center.clone())
///     .with_prompt_timeout(Duration::from_secs(60))
///     .build()
///     .await
///     .unwrap();
/// # });
/// ```
pub struct ConsentCoordinatorBuilder {
    pub(super) store: Option<Arc<dyn DecisionStore>>,
    pub(super) sink: Option<Arc<dyn PromptSink>>,
    pub(super) registry: Option<Arc<dyn SessionRegistry>>,
    pub(super) events: Option<ConsentEvents>,
    pub(super) event_capacity: usize,
    pub(super) decision_ttl: Duration,
    pub(super) prompt_timeout: Option<Duration>,
    pub(super) reconcile_pending: bool,
}

impl Default for ConsentCoordinatorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsentCoordinatorBuilder {
    /// Create a new builder with default settings
    pub fn new() -> Self {
        Self {
            store: None,
            sink: None,
            registry: None,
            events: None,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            decision_ttl: DEFAULT_DECISION_TTL,
            prompt_timeout: Some(DEFAULT_PROMPT_TIMEOUT),
            reconcile_pending: true,
        }
    }

    /// Set the decision store.
    pub fn with_store(self, store: impl DecisionStore + 'static) -> Self {
        self.with_shared_store(Arc::new(store))
    }

    /// Set a decision store that is also used elsewhere.
    pub fn with_shared_store(mut self, store: Arc<dyn DecisionStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the surface that shows consent prompts.
    pub fn with_prompt_sink(mut self, sink: impl PromptSink + 'static) -> Self {
        self.sink = Some(Arc::new(sink));
        self
    }

    /// Set the registry whose sessions are closed on revocation.
    pub fn with_session_registry(mut self, registry: impl SessionRegistry + 'static) -> Self {
        self.registry = Some(Arc::new(registry));
        self
    }

    /// Publish change events on an existing channel.
    pub fn with_events(mut self, events: ConsentEvents) -> Self {
        self.events = Some(events);
        self
    }

    /// Buffer size of the change event channel created by the builder.
    ///
    /// Ignored when [`with_events`](Self::with_events) is used.
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Set how long non-permanent decisions stay valid.
    pub fn with_decision_ttl(mut self, ttl: Duration) -> Self {
        self.decision_ttl = ttl;
        self
    }

    /// Set how long each prompt stage waits for the user.
    ///
    /// An unanswered stage 1 resolves as denied without storing a decision;
    /// an unanswered stage 2 resolves as "This Session Only".
    pub fn with_prompt_timeout(mut self, timeout: Duration) -> Self {
        self.prompt_timeout = Some(timeout);
        self
    }

    /// Wait for the user indefinitely.
    ///
    /// A sink that never answers then leaves the request (and everyone
    /// joined to it) waiting forever.
    pub fn without_prompt_timeout(mut self) -> Self {
        self.prompt_timeout = None;
        self
    }

    /// Whether `build()` clears pending markers left by a previous process.
    pub fn reconcile_pending_on_start(mut self, enabled: bool) -> Self {
        self.reconcile_pending = enabled;
        self
    }

    /// Build the coordinator.
    ///
    /// # Errors
    ///
    /// Returns [`ConsentError::Config`] if no prompt sink was configured or
    /// the TTL is out of range, and [`ConsentError::Store`] if startup
    /// reconciliation fails.
    pub async fn build(self) -> Result<ConsentCoordinator> {
        let sink = self.sink.ok_or_else(|| {
            ConsentError::Config(
                "No prompt sink configured. Call .with_prompt_sink() before .build()".to_string(),
            )
        })?;
        let decision_ttl = chrono::Duration::from_std(self.decision_ttl)
            .map_err(|e| ConsentError::Config(format!("Invalid decision TTL: {}", e)))?;

        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryDecisionStore::new()));
        let registry = self
            .registry
            .unwrap_or_else(|| Arc::new(NoSessionRegistry));
        let events = self
            .events
            .unwrap_or_else(|| ConsentEvents::new(self.event_capacity));

        let coordinator = ConsentCoordinator {
            prompt: ConsentPrompt::new(sink, store.clone(), self.prompt_timeout),
            revocation: RevocationHook::new(registry, events.clone()),
            store,
            events,
            inflight: Arc::new(InflightRegistry::default()),
            decision_ttl,
        };

        if self.reconcile_pending {
            coordinator.reconcile_pending().await?;
        }

        Ok(coordinator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::NotificationCenter;

    #[test]
    fn test_builder_defaults() {
        let builder = ConsentCoordinatorBuilder::new();
        assert_eq!(builder.decision_ttl, DEFAULT_DECISION_TTL);
        assert_eq!(builder.prompt_timeout, Some(DEFAULT_PROMPT_TIMEOUT));
        assert!(builder.reconcile_pending);
        assert!(builder.store.is_none());
    }

    #[test]
    fn test_builder_timeout_settings() {
        let builder = ConsentCoordinatorBuilder::new().with_prompt_timeout(Duration::from_secs(3));
        assert_eq!(builder.prompt_timeout, Some(Duration::from_secs(3)));

        let builder = builder.without_prompt_timeout();
        assert_eq!(builder.prompt_timeout, None);
    }

    #[tokio::test]
    async fn test_build_requires_prompt_sink() {
        let result = ConsentCoordinatorBuilder::new().build().await;
        assert!(matches!(result, Err(ConsentError::Config(_))));
    }

    #[tokio::test]
    async fn test_build_with_sink() {
        let coordinator = ConsentCoordinatorBuilder::new()
            .with_prompt_sink(NotificationCenter::new())
            .build()
            .await
            .unwrap();
        assert_eq!(coordinator.decision_ttl(), chrono::Duration::hours(24));
    }
}
