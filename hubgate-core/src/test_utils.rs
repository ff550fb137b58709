//! Test utilities for hubgate-core.
//!
//! Scripted doubles for the two collaborators the coordinator talks to: the
//! prompt surface and the session registry.
//!
//! Enable with the `test-utils` feature:
//!
//! ```toml
//! [dev-dependencies]
//! hubgate-core = { version = "...", features = ["test-utils"] }
//! ```
//!
//! # Example
//!
//! ```rust
//! use hubgate_core::{ConsentCoordinator, test_utils::ScriptedPromptSink};
//!
//! # tokio_test::block_on(async {
//! // Allow, then "Always Allow"
//! let sink = ScriptedPromptSink::new().then_click(1).then_click(1);
//!
//! let coordinator = ConsentCoordinator::builder()
//!     .with_prompt_sink(sink.clone())
//!     .build()
//!     .await
//!     .unwrap();
//!
//! assert!(coordinator.request_consent("a.com", "s1", "https://a.com/").await.unwrap());
//! assert_eq!(sink.shown().len(), 2);
//! # });
//! ```

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::prompt::{PromptError, PromptEvent, PromptId, PromptRequest, PromptSink, PromptSubscription};
use crate::revocation::{RegistryError, SessionRegistry};

/// What the scripted sink does with one displayed prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptStep {
    /// Answer with the action at this index.
    Click(usize),
    /// Answer with a dismissal.
    Dismiss,
    /// Never answer.
    Silence,
    /// Drop the listener without answering.
    Close,
    /// Refuse to display the prompt.
    Fail,
}

#[derive(Default)]
struct ScriptState {
    steps: VecDeque<ScriptStep>,
    shown: Vec<PromptRequest>,
    cleared: Vec<PromptId>,
    // Senders of silenced prompts, kept alive so they never resolve.
    held: Vec<oneshot::Sender<PromptEvent>>,
}

/// A [`PromptSink`] that answers prompts from a script, in display order.
///
/// Once the script runs out every further prompt is closed unanswered.
/// Clones share the script and the recorded history.
#[derive(Clone, Default)]
pub struct ScriptedPromptSink {
    state: Arc<Mutex<ScriptState>>,
    delay: Option<Duration>,
}

impl ScriptedPromptSink {
    /// Create a sink with an empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait this long before answering each prompt.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Append a step to the script.
    pub fn then(self, step: ScriptStep) -> Self {
        self.state.lock().steps.push_back(step);
        self
    }

    /// Append a click on the action at `index`.
    pub fn then_click(self, index: usize) -> Self {
        self.then(ScriptStep::Click(index))
    }

    /// Append a dismissal.
    pub fn then_dismiss(self) -> Self {
        self.then(ScriptStep::Dismiss)
    }

    /// Append a prompt that is never answered.
    pub fn then_silence(self) -> Self {
        self.then(ScriptStep::Silence)
    }

    /// Append a prompt whose listener is dropped.
    pub fn then_close(self) -> Self {
        self.then(ScriptStep::Close)
    }

    /// Append a display failure.
    pub fn then_fail(self) -> Self {
        self.then(ScriptStep::Fail)
    }

    /// Every prompt displayed so far.
    pub fn shown(&self) -> Vec<PromptRequest> {
        self.state.lock().shown.clone()
    }

    /// Every id passed to [`PromptSink::clear`] so far.
    pub fn cleared(&self) -> Vec<PromptId> {
        self.state.lock().cleared.clone()
    }

    /// Number of script steps not yet used.
    pub fn remaining(&self) -> usize {
        self.state.lock().steps.len()
    }
}

#[async_trait]
impl PromptSink for ScriptedPromptSink {
    async fn show(&self, request: PromptRequest) -> Result<PromptSubscription, PromptError> {
        let (responder, subscription) = PromptSubscription::channel(request.id.clone());

        let event = {
            let mut state = self.state.lock();
            let step = state.steps.pop_front().unwrap_or(ScriptStep::Close);
            if step == ScriptStep::Fail {
                return Err(PromptError::Unavailable("scripted failure".to_string()));
            }
            state.shown.push(request);
            match step {
                ScriptStep::Click(index) => PromptEvent::Action { index },
                ScriptStep::Dismiss => PromptEvent::Dismissed,
                ScriptStep::Silence => {
                    state.held.push(responder);
                    return Ok(subscription);
                }
                ScriptStep::Close | ScriptStep::Fail => return Ok(subscription),
            }
        };

        match self.delay {
            Some(delay) => {
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = responder.send(event);
                });
            }
            None => {
                let _ = responder.send(event);
            }
        }
        Ok(subscription)
    }

    async fn clear(&self, id: &PromptId) {
        self.state.lock().cleared.push(id.clone());
    }
}

/// A [`SessionRegistry`] that records every disconnect.
#[derive(Clone, Default)]
pub struct RecordingRegistry {
    calls: Arc<Mutex<Vec<String>>>,
    fail: bool,
}

impl RecordingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry whose disconnects are recorded and then fail.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Origins disconnected so far, in call order.
    pub fn disconnected(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    /// How many times `origin` was disconnected.
    pub fn count(&self, origin: &str) -> usize {
        self.calls.lock().iter().filter(|o| *o == origin).count()
    }
}

#[async_trait]
impl SessionRegistry for RecordingRegistry {
    async fn disconnect(&self, origin: &str) -> Result<(), RegistryError> {
        self.calls.lock().push(origin.to_string());
        if self.fail {
            return Err(RegistryError(format!("cannot disconnect {}", origin)));
        }
        Ok(())
    }
}
