//! Error types for the hubgate server.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use hubgate_core::{ConsentError, PromptError};

/// Errors that can occur when building a router.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// No endpoints were configured.
    #[error("No endpoints configured. Call .with_consent() before .build()")]
    NoEndpoints,
}

/// Errors returned by the HTTP handlers.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Error from the consent coordinator.
    #[error("Consent error: {0}")]
    Consent(#[from] ConsentError),

    /// Error from the notification center.
    #[error("Prompt error: {0}")]
    Prompt(#[from] PromptError),
}

impl ServerError {
    fn status(&self) -> StatusCode {
        match self {
            ServerError::Consent(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServerError::Prompt(PromptError::NotFound(_)) => StatusCode::NOT_FOUND,
            ServerError::Prompt(PromptError::DuplicateId(_)) => StatusCode::CONFLICT,
            ServerError::Prompt(PromptError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            log::error!("request failed: {}", self);
        }

        let body = Json(serde_json::json!({
            "error": self.to_string(),
            "code": status.as_u16(),
        }));

        (status, body).into_response()
    }
}

/// Result type alias for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
