//! HTTP handlers for the consent endpoints.

use std::convert::Infallible;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::stream::Stream;
use hubgate_core::{ConsentDecision, NotificationCenter, PromptId, PromptRequest};
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

use crate::error::ServerResult;
use crate::messages::{handle_message, ConsentMessage, ConsentReply};
use crate::state::AppState;

/// One stored decision as listed in a settings view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionView {
    pub origin: String,
    pub granted: bool,
    pub permanent: bool,
    /// Epoch milliseconds.
    pub timestamp: i64,
    /// Badge label ("Always Allowed", "Session", "Denied").
    pub status: String,
}

impl DecisionView {
    fn new(origin: String, decision: &ConsentDecision) -> Self {
        Self {
            origin,
            granted: decision.granted,
            permanent: decision.permanent,
            timestamp: decision.timestamp.timestamp_millis(),
            status: decision.status().label().to_string(),
        }
    }
}

/// Request body for answering a prompt.
#[derive(Debug, Deserialize)]
pub struct ActionRequest {
    pub id: PromptId,
    pub index: usize,
}

/// Request body for closing a prompt.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DismissRequest {
    pub id: PromptId,
    #[serde(default = "default_true")]
    pub by_user: bool,
}

fn default_true() -> bool {
    true
}

fn ok() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Handle an inbound consent message.
///
/// `request-consent` waits for the user and returns a `consent-response`;
/// the other messages return `{"status": "ok"}` once applied.
pub async fn message_handler(
    State(state): State<AppState>,
    Json(message): Json<ConsentMessage>,
) -> Json<serde_json::Value> {
    match handle_message(&state.coordinator, message).await {
        Some(reply) => Json(serde_json::to_value(reply).unwrap_or_else(|e| {
            serde_json::json!({ "error": format!("Failed to serialize reply: {}", e) })
        })),
        None => ok(),
    }
}

/// List every stored decision, sorted by origin.
pub async fn decisions_handler(State(state): State<AppState>) -> ServerResult<Json<Vec<DecisionView>>> {
    let mut views: Vec<DecisionView> = state
        .coordinator
        .decisions()
        .await?
        .into_iter()
        .map(|(origin, decision)| DecisionView::new(origin, &decision))
        .collect();
    views.sort_by(|a, b| a.origin.cmp(&b.origin));
    Ok(Json(views))
}

/// List granted origins.
pub async fn granted_handler(State(state): State<AppState>) -> ServerResult<Json<serde_json::Value>> {
    let origins = state.coordinator.list_granted_origins().await?;
    Ok(Json(serde_json::json!({ "origins": origins })))
}

/// Stream `consent-updated` messages as server-sent events.
pub async fn events_handler(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = BroadcastStream::new(state.coordinator.subscribe()).filter_map(|event| {
        // Lagged subscribers skip what they missed
        let event = event.ok()?;
        let json = serde_json::to_string(&ConsentReply::from(event)).ok()?;
        Some(Ok::<_, Infallible>(
            Event::default().event("consent-updated").data(json),
        ))
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// List prompts waiting for an answer.
pub async fn prompts_handler(State(center): State<NotificationCenter>) -> Json<Vec<PromptRequest>> {
    Json(center.open_prompts())
}

/// Answer a prompt with one of its actions.
pub async fn action_handler(
    State(center): State<NotificationCenter>,
    Json(request): Json<ActionRequest>,
) -> ServerResult<Json<serde_json::Value>> {
    center.click(&request.id, request.index)?;
    Ok(ok())
}

/// Close a prompt without choosing an action.
pub async fn dismiss_handler(
    State(center): State<NotificationCenter>,
    Json(request): Json<DismissRequest>,
) -> ServerResult<Json<serde_json::Value>> {
    center.dismiss(&request.id, request.by_user)?;
    Ok(ok())
}
