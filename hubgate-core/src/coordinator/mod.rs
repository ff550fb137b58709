//! Consent coordinator.
//!
//! The coordinator is the public face of the consent subsystem. It answers
//! "may this origin connect?", runs at most one prompt per origin at a time,
//! expires stale decisions, and cascades revocations to the session registry.

mod builder;
mod inflight;

pub use builder::{ConsentCoordinatorBuilder, DEFAULT_DECISION_TTL, DEFAULT_PROMPT_TIMEOUT};

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::broadcast;

use crate::decision::{ConsentDecision, ConsentStatus};
use crate::error::Result;
use crate::events::{ConsentEvent, ConsentEvents};
use crate::prompt::{ConsentPrompt, PromptResolution};
use crate::revocation::RevocationHook;
use crate::store::DecisionStore;
use inflight::{wait_for_leader, Entry, InflightRegistry};

/// Decides, persists and revokes per-origin consent.
///
/// # Example
///
/// ```rust
/// use hubgate_core::{ConsentCoordinator, NotificationCenter};
///
/// # tokio_test::block_on(async {
/// let center = NotificationCenter::new();
/// let coordinator = ConsentCoordinator::builder()
///     .with_prompt_sink(center.clone())
///     .build()
///     .await
///     .unwrap();
///
/// // Nothing stored yet
/// assert!(!coordinator.has_consent("https://example.com").await.unwrap());
/// # });
/// ```
pub struct ConsentCoordinator {
    pub(super) store: Arc<dyn DecisionStore>,
    pub(super) prompt: ConsentPrompt,
    pub(super) revocation: RevocationHook,
    pub(super) events: ConsentEvents,
    pub(super) inflight: Arc<InflightRegistry>,
    pub(super) decision_ttl: chrono::Duration,
}

impl ConsentCoordinator {
    /// Create a new builder.
    pub fn builder() -> ConsentCoordinatorBuilder {
        ConsentCoordinatorBuilder::new()
    }

    /// Validity window for non-permanent decisions.
    pub fn decision_ttl(&self) -> chrono::Duration {
        self.decision_ttl
    }

    /// Subscribe to `consent-updated` notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<ConsentEvent> {
        self.events.subscribe()
    }

    /// The change event channel.
    pub fn events(&self) -> &ConsentEvents {
        &self.events
    }

    /// Check whether `origin` currently has consent.
    ///
    /// A non-permanent decision older than the TTL is deleted and treated as
    /// absent, whether it granted or denied. Permanent decisions never expire.
    pub async fn has_consent(&self, origin: &str) -> Result<bool> {
        let Some(decision) = self.store.get(origin).await? else {
            return Ok(false);
        };

        if decision.is_expired(self.decision_ttl, Utc::now()) {
            log::debug!("decision for {} expired, removing", origin);
            self.store.remove(origin).await?;
            return Ok(false);
        }

        Ok(decision.granted)
    }

    /// Ask for consent on behalf of `origin`, prompting the user if needed.
    ///
    /// Concurrent requests for the same origin share a single prompt: the
    /// first one displays it, the rest wait for it to finish and then re-read
    /// the stored decision. Requests for different origins prompt
    /// independently.
    ///
    /// The pending marker for the origin is cleared on every exit path before
    /// this returns, including when the prompt fails.
    pub async fn request_consent(&self, origin: &str, session_id: &str, url: &str) -> Result<bool> {
        if self.has_consent(origin).await? {
            return Ok(true);
        }

        let mut guard = match self.inflight.enter(origin) {
            Entry::Leader(guard) => guard,
            Entry::Follower(rx) => {
                log::debug!("joining in-flight consent prompt for {}", origin);
                wait_for_leader(rx).await;
                return self.has_consent(origin).await;
            }
        };

        // A previous leader may have stored a decision since the first check.
        if self.has_consent(origin).await? {
            return Ok(true);
        }

        if self.store.get_pending().await?.contains(origin) {
            log::warn!("stale pending marker for {}, prompting anyway", origin);
        }
        self.store.set_pending(origin, true).await?;
        guard.marker_set(self.store.clone());

        log::debug!("prompting for consent: origin={} session={}", origin, session_id);
        let outcome = self.prompt_and_persist(origin, session_id, url).await;

        let cleared = self.store.set_pending(origin, false).await;
        if cleared.is_ok() {
            guard.marker_cleared();
        }
        drop(guard);

        let resolution = outcome?;
        cleared?;

        if resolution != PromptResolution::Unanswered {
            let granted = resolution.is_granted();
            log::info!(
                "consent {} for {}",
                if granted { "granted" } else { "denied" },
                origin
            );
            self.events.publish(ConsentEvent::decided(origin, granted));
        }

        Ok(resolution.is_granted())
    }

    async fn prompt_and_persist(
        &self,
        origin: &str,
        session_id: &str,
        url: &str,
    ) -> Result<PromptResolution> {
        let resolution = self.prompt.run(origin, session_id, url).await?;
        if let PromptResolution::Granted { permanent } = resolution {
            self.store
                .set(origin, ConsentDecision::granted(origin, permanent))
                .await?;
        }
        Ok(resolution)
    }

    /// Remove the decision for `origin` and disconnect its sessions.
    ///
    /// Returns `true` if a decision was stored. The disconnect and change
    /// notification happen either way.
    pub async fn remove_consent(&self, origin: &str) -> Result<bool> {
        let removed = self.store.remove(origin).await?;
        log::info!("removed consent for {}", origin);
        self.revocation.revoke(origin).await;
        Ok(removed)
    }

    /// Remove every decision and pending marker.
    ///
    /// Origins that were granted before the call are disconnected, once each.
    /// Returns those origins.
    pub async fn clear_all(&self) -> Result<Vec<String>> {
        let granted = self.list_granted_origins().await?;

        self.store.remove_all().await?;
        self.store.clear_pending().await?;
        log::info!("cleared all consent decisions ({} granted)", granted.len());

        self.revocation.revoke_all(&granted).await;
        Ok(granted)
    }

    /// Origins whose stored decision grants access, sorted.
    pub async fn list_granted_origins(&self) -> Result<Vec<String>> {
        let mut origins: Vec<String> = self
            .store
            .get_all()
            .await?
            .into_iter()
            .filter_map(|(origin, decision)| decision.granted.then_some(origin))
            .collect();
        origins.sort();
        Ok(origins)
    }

    /// Every stored decision, keyed by origin.
    pub async fn decisions(&self) -> Result<HashMap<String, ConsentDecision>> {
        Ok(self.store.get_all().await?)
    }

    /// Badge status for `origin`, without applying expiry.
    pub async fn status(&self, origin: &str) -> Result<ConsentStatus> {
        Ok(ConsentStatus::of(self.store.get(origin).await?.as_ref()))
    }

    /// Origins with a prompt currently running in this process.
    pub fn prompting_origins(&self) -> Vec<String> {
        let mut origins = self.inflight.origins();
        origins.sort();
        origins
    }

    /// Clear pending markers left behind by a previous process.
    ///
    /// Markers for prompts running in this process are kept.
    pub async fn reconcile_pending(&self) -> Result<usize> {
        let stale: Vec<String> = self
            .store
            .get_pending()
            .await?
            .into_iter()
            .filter(|origin| !self.inflight.contains(origin))
            .collect();

        for origin in &stale {
            log::warn!("clearing stale pending marker for {}", origin);
            self.store.set_pending(origin, false).await?;
        }
        Ok(stale.len())
    }
}
