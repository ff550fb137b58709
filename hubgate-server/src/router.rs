//! Router builder for hubgate HTTP endpoints.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use hubgate_core::{ConsentCoordinator, NotificationCenter};
use tower_http::cors::CorsLayer;

use crate::error::BuildError;
use crate::handler::{
    action_handler, decisions_handler, dismiss_handler, events_handler, granted_handler,
    message_handler, prompts_handler,
};
use crate::state::AppState;

/// Builder for configuring hubgate HTTP endpoints.
///
/// [`with_consent`](Self::with_consent) mounts, under its base path:
///
/// | Method | Path | Purpose |
/// |--------|------|---------|
/// | POST | `/messages` | `request-consent`, `remove-consent`, `clear-all-consent` |
/// | GET | `/decisions` | stored decisions with status labels |
/// | GET | `/granted` | granted origins |
/// | GET | `/events` | SSE stream of `consent-updated` |
///
/// [`with_prompts`](Self::with_prompts) adds `GET /prompts`,
/// `POST /prompts/action` and `POST /prompts/dismiss` for a web front end
/// answering a [`NotificationCenter`].
///
/// # Example
///
/// ```rust,no_run
/// use hubgate_core::{ConsentCoordinator, NotificationCenter};
/// use hubgate_server::ConsentRouter;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let center = NotificationCenter::new();
/// let coordinator = ConsentCoordinator::builder()
///     .with_prompt_sink(center.clone())
///     .build()
///     .await?;
///
/// let app = ConsentRouter::new(coordinator)
///     .with_consent("/api/consent")
///     .with_prompts(center)
///     .build()?;
///
/// let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await?;
/// axum::serve(listener, app).await?;
/// # Ok(())
/// # }
/// ```
pub struct ConsentRouter {
    coordinator: Arc<ConsentCoordinator>,
    consent_path: Option<String>,
    center: Option<NotificationCenter>,
    cors: Option<CorsLayer>,
}

impl ConsentRouter {
    /// Create a new router builder for `coordinator`.
    pub fn new(coordinator: ConsentCoordinator) -> Self {
        Self::from_arc(Arc::new(coordinator))
    }

    /// Create a new router builder from a shared coordinator.
    ///
    /// Use this when the hub also calls the coordinator directly.
    pub fn from_arc(coordinator: Arc<ConsentCoordinator>) -> Self {
        Self {
            coordinator,
            consent_path: None,
            center: None,
            cors: None,
        }
    }

    /// Mount the consent endpoints under `path`.
    pub fn with_consent(mut self, path: impl Into<String>) -> Self {
        self.consent_path = Some(path.into().trim_end_matches('/').to_string());
        self
    }

    /// Mount prompt endpoints answering `center`.
    ///
    /// They live under the consent path, so this has no effect without
    /// [`with_consent`](Self::with_consent).
    pub fn with_prompts(mut self, center: NotificationCenter) -> Self {
        self.center = Some(center);
        self
    }

    /// Apply a CORS policy to every endpoint.
    pub fn with_cors(mut self, cors: CorsLayer) -> Self {
        self.cors = Some(cors);
        self
    }

    /// Build the router with all configured endpoints.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::NoEndpoints`] if `.with_consent()` was not called.
    pub fn build(self) -> Result<Router, BuildError> {
        let base = self.consent_path.ok_or(BuildError::NoEndpoints)?;
        let state = AppState::from_arc(self.coordinator);

        let mut router = Router::new()
            .route(&format!("{}/messages", base), post(message_handler))
            .route(&format!("{}/decisions", base), get(decisions_handler))
            .route(&format!("{}/granted", base), get(granted_handler))
            .route(&format!("{}/events", base), get(events_handler))
            .with_state(state);

        if let Some(center) = self.center {
            let prompts = Router::new()
                .route(&format!("{}/prompts", base), get(prompts_handler))
                .route(&format!("{}/prompts/action", base), post(action_handler))
                .route(&format!("{}/prompts/dismiss", base), post(dismiss_handler))
                .with_state(center);
            router = router.merge(prompts);
        }

        if let Some(cors) = self.cors {
            router = router.layer(cors);
        }

        Ok(router)
    }

    /// Build the router and nest it under a prefix path.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::NoEndpoints`] if no endpoints were configured.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// # use hubgate_core::{ConsentCoordinator, NotificationCenter};
    /// # use hubgate_server::ConsentRouter;
    /// # use axum::Router;
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// # let coordinator = ConsentCoordinator::builder()
    /// #     .with_prompt_sink(NotificationCenter::new())
    /// #     .build()
    /// #     .await?;
    /// // Consent routes at /hub/consent/...
    /// let consent = ConsentRouter::new(coordinator)
    ///     .with_consent("/consent")
    ///     .build_nested("/hub")?;
    ///
    /// let app = Router::new().merge(consent);
    /// # Ok(())
    /// # }
    /// ```
    pub fn build_nested(self, prefix: impl Into<String>) -> Result<Router, BuildError> {
        Ok(Router::new().nest(&prefix.into(), self.build()?))
    }
}

#[cfg(test)]
#[path = "router_tests.rs"]
mod tests;
