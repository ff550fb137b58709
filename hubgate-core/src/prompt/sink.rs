//! Prompt sink contract.
//!
//! A sink is whatever surface shows the user an interactive confirmation: a
//! desktop notification, a terminal prompt, a web UI. Each displayed prompt
//! hands back a [`PromptSubscription`] that yields exactly one terminal event
//! for that instance and nothing else.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

/// Which stage of the consent flow a prompt belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PromptKind {
    /// Stage 1: deny or allow the origin.
    AllowDeny,
    /// Stage 2: remember the grant for this session or always.
    Permanence,
}

impl PromptKind {
    /// Stable identifier used in prompt ids.
    pub fn as_str(&self) -> &'static str {
        match self {
            PromptKind::AllowDeny => "allow-deny",
            PromptKind::Permanence => "permanence",
        }
    }
}

impl std::fmt::Display for PromptKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifier of a single displayed prompt: `<kind>-<origin>-<timestamp_ms>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PromptId(String);

impl PromptId {
    /// Build the id for a prompt of `kind` shown for `origin` at `at`.
    pub fn new(kind: PromptKind, origin: &str, at: DateTime<Utc>) -> Self {
        Self(format!("{}-{}-{}", kind.as_str(), origin, at.timestamp_millis()))
    }

    /// Borrow the id as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for PromptId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for PromptId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl std::fmt::Display for PromptId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Everything a sink needs to render one prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptRequest {
    pub id: PromptId,
    pub kind: PromptKind,
    pub origin: String,
    pub title: String,
    pub message: String,
    /// Exactly two labeled actions; events refer to them by index.
    pub actions: [String; 2],
    /// The prompt must stay open until the user acts on it.
    pub require_interaction: bool,
    /// Page that triggered the request, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Session the request came from, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl PromptRequest {
    /// Stage 1 prompt for `origin`.
    pub fn allow_deny(origin: &str, at: DateTime<Utc>) -> Self {
        Self {
            id: PromptId::new(PromptKind::AllowDeny, origin, at),
            kind: PromptKind::AllowDeny,
            origin: origin.to_string(),
            title: "MCP Server Connection Request".to_string(),
            message: format!(
                "Website \"{}\" has an MCP server. Do you trust it to connect and access tools?",
                origin
            ),
            actions: ["Deny".to_string(), "Allow".to_string()],
            require_interaction: true,
            url: None,
            session_id: None,
        }
    }

    /// Stage 2 prompt for `origin`.
    pub fn permanence(origin: &str, at: DateTime<Utc>) -> Self {
        Self {
            id: PromptId::new(PromptKind::Permanence, origin, at),
            kind: PromptKind::Permanence,
            origin: origin.to_string(),
            title: "Remember This Decision?".to_string(),
            message: format!(
                "Always allow \"{}\" to connect, or just for this session?",
                origin
            ),
            actions: ["This Session Only".to_string(), "Always Allow".to_string()],
            require_interaction: true,
            url: None,
            session_id: None,
        }
    }

    /// Attach the requesting page and session.
    pub fn with_context(mut self, session_id: &str, url: &str) -> Self {
        self.session_id = Some(session_id.to_string());
        self.url = Some(url.to_string());
        self
    }
}

/// Terminal event for one displayed prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PromptEvent {
    /// The user clicked the action at this index.
    Action { index: usize },
    /// The user closed the prompt without choosing.
    Dismissed,
}

/// Errors raised by prompt sinks.
#[derive(Debug, thiserror::Error)]
pub enum PromptError {
    /// The surface refused to display the prompt.
    #[error("Prompt could not be displayed: {0}")]
    Unavailable(String),

    /// A prompt with this id is already open.
    #[error("Prompt already open: {0}")]
    DuplicateId(PromptId),

    /// No open prompt has this id (already answered, cleared, or never shown).
    #[error("Prompt not found: {0}")]
    NotFound(PromptId),
}

/// Subscription to the terminal event of one displayed prompt.
///
/// Owned by the flow that showed the prompt. Dropping it deregisters the
/// listener; the sink then has nowhere to deliver events for that id.
#[derive(Debug)]
pub struct PromptSubscription {
    id: PromptId,
    receiver: oneshot::Receiver<PromptEvent>,
}

impl PromptSubscription {
    /// Create a subscription for `id` and the sender half the sink keeps.
    pub fn channel(id: PromptId) -> (oneshot::Sender<PromptEvent>, Self) {
        let (sender, receiver) = oneshot::channel();
        (sender, Self { id, receiver })
    }

    /// Id of the prompt this subscription listens to.
    pub fn id(&self) -> &PromptId {
        &self.id
    }

    /// Wait for the terminal event.
    ///
    /// Returns `None` when the sink dropped the listener without delivering
    /// an event (for example because the prompt was closed programmatically).
    pub async fn recv(self) -> Option<PromptEvent> {
        self.receiver.await.ok()
    }
}

/// Surface that displays consent prompts.
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use hubgate_core::prompt::{
///     PromptError, PromptEvent, PromptId, PromptRequest, PromptSink, PromptSubscription,
/// };
///
/// /// Denies everything without asking.
/// struct AlwaysDeny;
///
/// #[async_trait]
/// impl PromptSink for AlwaysDeny {
///     async fn show(&self, request: PromptRequest) -> Result<PromptSubscription, PromptError> {
///         let (tx, subscription) = PromptSubscription::channel(request.id);
///         let _ = tx.send(PromptEvent::Action { index: 0 });
///         Ok(subscription)
///     }
///
///     async fn clear(&self, _id: &PromptId) {}
/// }
/// ```
#[async_trait]
pub trait PromptSink: Send + Sync {
    /// Display `request` and subscribe to its terminal event.
    async fn show(&self, request: PromptRequest) -> Result<PromptSubscription, PromptError>;

    /// Remove a displayed prompt. Unknown ids are ignored.
    async fn clear(&self, id: &PromptId);
}
