//! Per-origin registry of in-flight prompts.
//!
//! The first request for an origin becomes the leader and holds a
//! [`LeaderGuard`]; later requests for the same origin get a receiver that
//! fires when the leader finishes, however it finishes.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;

use crate::store::DecisionStore;

pub(crate) enum Entry {
    Leader(LeaderGuard),
    Follower(watch::Receiver<bool>),
}

#[derive(Default)]
pub(crate) struct InflightRegistry {
    waiters: Mutex<HashMap<String, watch::Receiver<bool>>>,
}

impl InflightRegistry {
    /// Join the in-flight prompt for `origin`, or become its leader.
    pub(crate) fn enter(self: &Arc<Self>, origin: &str) -> Entry {
        let mut waiters = self.waiters.lock();
        if let Some(rx) = waiters.get(origin) {
            return Entry::Follower(rx.clone());
        }
        let (done, rx) = watch::channel(false);
        waiters.insert(origin.to_string(), rx);
        Entry::Leader(LeaderGuard {
            registry: Arc::clone(self),
            origin: origin.to_string(),
            done,
            persisted_marker: None,
        })
    }

    pub(crate) fn contains(&self, origin: &str) -> bool {
        self.waiters.lock().contains_key(origin)
    }

    pub(crate) fn origins(&self) -> Vec<String> {
        self.waiters.lock().keys().cloned().collect()
    }
}

/// Wait until the leader behind `rx` has finished.
pub(crate) async fn wait_for_leader(mut rx: watch::Receiver<bool>) {
    // Err means the leader's sender is gone, which also means it finished.
    let _ = rx.wait_for(|done| *done).await;
}

/// Held by the request that is prompting for an origin.
///
/// Dropping the guard (on return, on error, or when the request future is
/// cancelled) unregisters the origin and wakes every follower. If the
/// persisted pending marker was set and not yet cleared, the drop schedules
/// its removal.
pub(crate) struct LeaderGuard {
    registry: Arc<InflightRegistry>,
    origin: String,
    done: watch::Sender<bool>,
    persisted_marker: Option<Arc<dyn DecisionStore>>,
}

impl LeaderGuard {
    /// Record that the persisted pending marker is set in `store`.
    pub(crate) fn marker_set(&mut self, store: Arc<dyn DecisionStore>) {
        self.persisted_marker = Some(store);
    }

    /// Record that the persisted pending marker has been cleared.
    pub(crate) fn marker_cleared(&mut self) {
        self.persisted_marker = None;
    }
}

impl Drop for LeaderGuard {
    fn drop(&mut self) {
        self.registry.waiters.lock().remove(&self.origin);
        let _ = self.done.send(true);

        if let Some(store) = self.persisted_marker.take() {
            let origin = std::mem::take(&mut self.origin);
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    handle.spawn(async move {
                        if let Err(e) = store.set_pending(&origin, false).await {
                            log::warn!("failed to clear pending marker for {}: {}", origin, e);
                        }
                    });
                }
                Err(_) => log::warn!("pending marker for {} left set", origin),
            }
        }
    }
}
