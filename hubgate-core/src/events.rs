//! Consent change notifications.
//!
//! Every change to the stored decisions (a new decision, a removal, a bulk
//! clear) is broadcast as a [`ConsentEvent`]. Subscribers such as a live
//! settings view refresh from it. Broadcasting with nobody listening is normal.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Default number of events buffered for slow subscribers.
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// A `consent-updated` notification.
///
/// All fields are optional: a bulk clear carries none, a removal only the
/// origin, and a fresh decision all three.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsentEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub granted: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_new_decision: Option<bool>,
}

impl ConsentEvent {
    /// The user just decided for `origin`.
    pub fn decided(origin: impl Into<String>, granted: bool) -> Self {
        Self {
            origin: Some(origin.into()),
            granted: Some(granted),
            is_new_decision: Some(true),
        }
    }

    /// The decision for `origin` was removed.
    pub fn revoked(origin: impl Into<String>) -> Self {
        Self {
            origin: Some(origin.into()),
            ..Self::default()
        }
    }

    /// Every decision was cleared.
    pub fn cleared() -> Self {
        Self::default()
    }
}

/// Broadcast channel for [`ConsentEvent`]s. Clones share the channel.
#[derive(Clone)]
pub struct ConsentEvents {
    sender: broadcast::Sender<ConsentEvent>,
}

impl ConsentEvents {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ConsentEvent> {
        self.sender.subscribe()
    }

    /// Broadcast `event`, returning how many subscribers received it.
    pub fn publish(&self, event: ConsentEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }
}

impl Default for ConsentEvents {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}
