//! Consent messages exchanged with requesting pages.
//!
//! Every message is a JSON object tagged by `type`:
//!
//! | Direction | `type` | Fields |
//! |-----------|--------|--------|
//! | in | `request-consent` | `origin`, `url`, `messageId`, `sessionId?` |
//! | in | `remove-consent` | `origin` |
//! | in | `clear-all-consent` | |
//! | out | `consent-response` | `messageId`, `granted` |
//! | out | `consent-updated` | `origin?`, `granted?`, `isNewDecision?` |
//!
//! [`handle_message`] is the boundary between pages and the coordinator. A
//! consent request always gets an answer there, even when the coordinator
//! fails.

use hubgate_core::{ConsentCoordinator, ConsentEvent};
use serde::{Deserialize, Serialize};

/// A message sent by a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ConsentMessage {
    /// Ask whether `origin` may connect, prompting if needed.
    #[serde(rename_all = "camelCase")]
    RequestConsent {
        origin: String,
        url: String,
        message_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session_id: Option<String>,
    },
    /// Forget the decision for `origin` and close its sessions.
    RemoveConsent { origin: String },
    /// Forget every decision.
    ClearAllConsent,
}

/// A message sent to pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ConsentReply {
    /// Answer to a `request-consent` with the same `messageId`.
    #[serde(rename_all = "camelCase")]
    ConsentResponse { message_id: String, granted: bool },
    /// Broadcast after any change to the stored decisions.
    ConsentUpdated(ConsentEvent),
}

impl From<ConsentEvent> for ConsentReply {
    fn from(event: ConsentEvent) -> Self {
        ConsentReply::ConsentUpdated(event)
    }
}

/// Dispatch `message` to `coordinator`.
///
/// Returns the reply for `request-consent` and `None` for the fire-and-forget
/// messages. Errors never escape: a failed consent request is answered with
/// `granted: false`, and failed removals are only logged.
pub async fn handle_message(
    coordinator: &ConsentCoordinator,
    message: ConsentMessage,
) -> Option<ConsentReply> {
    match message {
        ConsentMessage::RequestConsent {
            origin,
            url,
            message_id,
            session_id,
        } => {
            let session_id = session_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
            let granted = match coordinator.request_consent(&origin, &session_id, &url).await {
                Ok(granted) => granted,
                Err(e) => {
                    log::error!("consent request for {} failed: {}", origin, e);
                    false
                }
            };
            Some(ConsentReply::ConsentResponse {
                message_id,
                granted,
            })
        }
        ConsentMessage::RemoveConsent { origin } => {
            if let Err(e) = coordinator.remove_consent(&origin).await {
                log::error!("removing consent for {} failed: {}", origin, e);
            }
            None
        }
        ConsentMessage::ClearAllConsent => {
            if let Err(e) = coordinator.clear_all().await {
                log::error!("clearing consent failed: {}", e);
            }
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hubgate_core::test_utils::{RecordingRegistry, ScriptedPromptSink};
    use hubgate_core::{ConsentDecision, MemoryDecisionStore};
    use serde_json::json;

    #[test]
    fn test_inbound_wire_format() {
        let message: ConsentMessage = serde_json::from_value(json!({
            "type": "request-consent",
            "origin": "https://a.com",
            "url": "https://a.com/app",
            "messageId": "m1",
        }))
        .unwrap();
        assert_eq!(
            message,
            ConsentMessage::RequestConsent {
                origin: "https://a.com".to_string(),
                url: "https://a.com/app".to_string(),
                message_id: "m1".to_string(),
                session_id: None,
            }
        );

        let message: ConsentMessage =
            serde_json::from_value(json!({"type": "clear-all-consent"})).unwrap();
        assert_eq!(message, ConsentMessage::ClearAllConsent);

        let message: ConsentMessage =
            serde_json::from_value(json!({"type": "remove-consent", "origin": "a.com"})).unwrap();
        assert_eq!(
            message,
            ConsentMessage::RemoveConsent {
                origin: "a.com".to_string()
            }
        );
    }

    #[test]
    fn test_outbound_wire_format() {
        let reply = ConsentReply::ConsentResponse {
            message_id: "m1".to_string(),
            granted: true,
        };
        assert_eq!(
            serde_json::to_value(reply).unwrap(),
            json!({"type": "consent-response", "messageId": "m1", "granted": true})
        );

        let reply = ConsentReply::from(ConsentEvent::decided("a.com", false));
        assert_eq!(
            serde_json::to_value(reply).unwrap(),
            json!({
                "type": "consent-updated",
                "origin": "a.com",
                "granted": false,
                "isNewDecision": true
            })
        );

        let reply = ConsentReply::from(ConsentEvent::cleared());
        assert_eq!(
            serde_json::to_value(reply).unwrap(),
            json!({"type": "consent-updated"})
        );
    }

    #[test]
    fn test_unknown_type_rejected() {
        let result: Result<ConsentMessage, _> =
            serde_json::from_value(json!({"type": "grant-everything"}));
        assert!(result.is_err());
    }

    async fn coordinator(sink: ScriptedPromptSink, registry: RecordingRegistry) -> ConsentCoordinator {
        ConsentCoordinator::builder()
            .with_store(MemoryDecisionStore::with_decisions([
                ConsentDecision::granted("kept.com", true),
            ]))
            .with_prompt_sink(sink)
            .with_session_registry(registry)
            .build()
            .await
            .unwrap()
    }

    fn request(origin: &str) -> ConsentMessage {
        ConsentMessage::RequestConsent {
            origin: origin.to_string(),
            url: format!("https://{}/", origin),
            message_id: "m1".to_string(),
            session_id: Some("s1".to_string()),
        }
    }

    #[tokio::test]
    async fn test_request_is_answered() {
        let sink = ScriptedPromptSink::new().then_click(1).then_click(0);
        let coordinator = coordinator(sink, RecordingRegistry::new()).await;

        let reply = handle_message(&coordinator, request("a.com")).await;
        assert_eq!(
            reply,
            Some(ConsentReply::ConsentResponse {
                message_id: "m1".to_string(),
                granted: true
            })
        );
    }

    #[tokio::test]
    async fn test_failed_request_answers_false() {
        let sink = ScriptedPromptSink::new().then_fail();
        let coordinator = coordinator(sink, RecordingRegistry::new()).await;

        let reply = handle_message(&coordinator, request("a.com")).await;
        assert_eq!(
            reply,
            Some(ConsentReply::ConsentResponse {
                message_id: "m1".to_string(),
                granted: false
            })
        );
    }

    #[tokio::test]
    async fn test_missing_session_id_is_generated() {
        let sink = ScriptedPromptSink::new().then_click(0);
        let coordinator = coordinator(sink.clone(), RecordingRegistry::new()).await;

        let message = ConsentMessage::RequestConsent {
            origin: "a.com".to_string(),
            url: "https://a.com/".to_string(),
            message_id: "m2".to_string(),
            session_id: None,
        };
        handle_message(&coordinator, message).await;

        let session = sink.shown()[0].session_id.clone().unwrap();
        assert!(!session.is_empty());
    }

    #[tokio::test]
    async fn test_fire_and_forget_messages() {
        let registry = RecordingRegistry::new();
        let coordinator = coordinator(ScriptedPromptSink::new(), registry.clone()).await;

        let reply = handle_message(
            &coordinator,
            ConsentMessage::RemoveConsent {
                origin: "kept.com".to_string(),
            },
        )
        .await;
        assert!(reply.is_none());
        assert_eq!(registry.count("kept.com"), 1);

        assert!(handle_message(&coordinator, ConsentMessage::ClearAllConsent)
            .await
            .is_none());
        // Nothing granted was left to disconnect
        assert_eq!(registry.disconnected().len(), 1);
    }
}
