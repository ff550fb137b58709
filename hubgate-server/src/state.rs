//! Application state for the hubgate server.

use std::sync::Arc;

use hubgate_core::ConsentCoordinator;

/// Shared state for the consent handlers.
///
/// Cloned for each request; all clones share one coordinator.
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<ConsentCoordinator>,
}

impl AppState {
    pub fn from_arc(coordinator: Arc<ConsentCoordinator>) -> Self {
        Self { coordinator }
    }
}
