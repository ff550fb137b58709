//! Revocation side effects.
//!
//! Removing consent must also tear down whatever the origin already has open
//! on the hub. The hub's session registry is an external collaborator reached
//! through [`SessionRegistry`]; this module calls it and then broadcasts the
//! change.

use std::sync::Arc;

use async_trait::async_trait;

use crate::events::{ConsentEvent, ConsentEvents};

/// Error reported by a session registry.
#[derive(Debug, thiserror::Error)]
#[error("session registry error: {0}")]
pub struct RegistryError(pub String);

/// Owner of live protocol sessions.
#[async_trait]
pub trait SessionRegistry: Send + Sync {
    /// Close every live session opened by `origin`.
    async fn disconnect(&self, origin: &str) -> Result<(), RegistryError>;
}

/// Registry used when the hub has none attached. Disconnects are no-ops.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSessionRegistry;

#[async_trait]
impl SessionRegistry for NoSessionRegistry {
    async fn disconnect(&self, _origin: &str) -> Result<(), RegistryError> {
        Ok(())
    }
}

/// Disconnects revoked origins and announces the change.
#[derive(Clone)]
pub struct RevocationHook {
    registry: Arc<dyn SessionRegistry>,
    events: ConsentEvents,
}

impl RevocationHook {
    pub fn new(registry: Arc<dyn SessionRegistry>, events: ConsentEvents) -> Self {
        Self { registry, events }
    }

    /// Disconnect `origin` and broadcast its removal.
    pub async fn revoke(&self, origin: &str) {
        self.disconnect(origin).await;
        self.events.publish(ConsentEvent::revoked(origin));
    }

    /// Disconnect each of `origins` once and broadcast a single clear event.
    pub async fn revoke_all(&self, origins: &[String]) {
        for origin in origins {
            self.disconnect(origin).await;
        }
        self.events.publish(ConsentEvent::cleared());
    }

    async fn disconnect(&self, origin: &str) {
        match self.registry.disconnect(origin).await {
            Ok(()) => log::info!("disconnected sessions for {}", origin),
            Err(e) => log::warn!("failed to disconnect sessions for {}: {}", origin, e),
        }
    }
}
