//! Two-stage interactive consent prompt.
//!
//! Stage 1 asks whether to allow the origin at all. When the user allows it,
//! stage 2 asks whether to remember that for this session or always.
//!
//! ```text
//! Idle -> AwaitingAllowDeny -+-> Resolved(Denied)
//!                            +-> Resolved(Unanswered)
//!                            +-> AwaitingPermanence -> Resolved(Granted { permanent })
//! ```
//!
//! The flow talks to the user only through an injected [`PromptSink`], so any
//! surface (desktop notifications, terminal, web UI, a scripted test double)
//! can drive it.

mod center;
mod sink;

pub use center::{NotificationCenter, DEFAULT_CENTER_CAPACITY};
pub use sink::{
    PromptError, PromptEvent, PromptId, PromptKind, PromptRequest, PromptSink,
    PromptSubscription,
};

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::decision::ConsentDecision;
use crate::error::ConsentError;
use crate::store::DecisionStore;

/// Stage 1 action index for "Deny".
pub const ACTION_DENY: usize = 0;
/// Stage 1 action index for "Allow".
pub const ACTION_ALLOW: usize = 1;
/// Stage 2 action index for "This Session Only".
pub const ACTION_SESSION_ONLY: usize = 0;
/// Stage 2 action index for "Always Allow".
pub const ACTION_ALWAYS_ALLOW: usize = 1;

static LAST_DISPLAY_MS: AtomicI64 = AtomicI64::new(0);

/// Display time for a new prompt, strictly later than any earlier one in this
/// process so prompt ids never repeat.
fn display_time() -> DateTime<Utc> {
    let now = Utc::now();
    let mut last = LAST_DISPLAY_MS.load(Ordering::Relaxed);
    loop {
        let next = now.timestamp_millis().max(last + 1);
        match LAST_DISPLAY_MS.compare_exchange_weak(
            last,
            next,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => return DateTime::from_timestamp_millis(next).unwrap_or(now),
            Err(seen) => last = seen,
        }
    }
}

/// Final outcome of a prompt flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptResolution {
    /// The user denied or dismissed stage 1. The denial is already stored.
    Denied,
    /// The user allowed the origin.
    Granted {
        /// Whether the user chose "Always Allow".
        permanent: bool,
    },
    /// No decision was made (timeout, unknown action, or the sink dropped
    /// the prompt). Nothing is stored.
    Unanswered,
}

impl PromptResolution {
    /// Whether the origin may connect.
    pub fn is_granted(&self) -> bool {
        matches!(self, PromptResolution::Granted { .. })
    }
}

/// Where a flow currently is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptState {
    /// Nothing displayed yet.
    Idle,
    /// Stage 1 is displayed.
    AwaitingAllowDeny(PromptId),
    /// Stage 2 is displayed.
    AwaitingPermanence(PromptId),
    /// Terminal.
    Resolved(PromptResolution),
}

impl PromptState {
    /// Whether the flow has finished.
    pub fn is_resolved(&self) -> bool {
        matches!(self, PromptState::Resolved(_))
    }
}

/// What happened to a displayed stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StageOutcome {
    Action(usize),
    Dismissed,
    Unanswered,
}

/// Runs consent flows against a sink, saving denials as they happen.
pub struct ConsentPrompt {
    sink: Arc<dyn PromptSink>,
    store: Arc<dyn DecisionStore>,
    timeout: Option<Duration>,
}

impl ConsentPrompt {
    /// Create a prompt runner.
    ///
    /// `timeout` bounds how long each stage waits for the user; `None` waits
    /// forever.
    pub fn new(
        sink: Arc<dyn PromptSink>,
        store: Arc<dyn DecisionStore>,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            sink,
            store,
            timeout,
        }
    }

    /// Per-stage timeout, if any.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Start a new flow for `origin` without running it.
    pub fn flow<'a>(&'a self, origin: &str, session_id: &str, url: &str) -> ConsentFlow<'a> {
        ConsentFlow {
            prompt: self,
            origin: origin.to_string(),
            session_id: session_id.to_string(),
            url: url.to_string(),
            state: PromptState::Idle,
            subscription: None,
            displayed: None,
        }
    }

    /// Run a complete flow for `origin` and return its resolution.
    pub async fn run(
        &self,
        origin: &str,
        session_id: &str,
        url: &str,
    ) -> Result<PromptResolution, ConsentError> {
        self.flow(origin, session_id, url).run().await
    }
}

/// One consent flow for one origin.
///
/// The flow owns the subscription of whichever stage is displayed and drops
/// it on every transition, so answers to an earlier stage (or to another
/// flow) can never reach it. Dropping a flow mid-stage clears the prompt it
/// left on screen.
pub struct ConsentFlow<'a> {
    prompt: &'a ConsentPrompt,
    origin: String,
    session_id: String,
    url: String,
    state: PromptState,
    subscription: Option<PromptSubscription>,
    // Shown and not yet finished.
    displayed: Option<PromptId>,
}

impl ConsentFlow<'_> {
    /// Current state.
    pub fn state(&self) -> &PromptState {
        &self.state
    }

    /// Drive the flow to a terminal state.
    pub async fn run(mut self) -> Result<PromptResolution, ConsentError> {
        loop {
            if let PromptState::Resolved(resolution) = self.step().await? {
                return Ok(*resolution);
            }
        }
    }

    /// Perform one transition and return the new state.
    ///
    /// Stepping a resolved flow is a no-op.
    pub async fn step(&mut self) -> Result<&PromptState, ConsentError> {
        let next = match self.state {
            PromptState::Idle => {
                let request = PromptRequest::allow_deny(&self.origin, display_time());
                PromptState::AwaitingAllowDeny(self.display(request).await?)
            }
            PromptState::AwaitingAllowDeny(_) => match self.await_outcome().await {
                StageOutcome::Action(ACTION_ALLOW) => {
                    log::debug!("{} allowed, asking about permanence", self.origin);
                    let request = PromptRequest::permanence(&self.origin, display_time());
                    PromptState::AwaitingPermanence(self.display(request).await?)
                }
                StageOutcome::Action(ACTION_DENY) | StageOutcome::Dismissed => {
                    self.prompt
                        .store
                        .set(&self.origin, ConsentDecision::denied(&self.origin))
                        .await?;
                    PromptState::Resolved(PromptResolution::Denied)
                }
                StageOutcome::Action(_) | StageOutcome::Unanswered => {
                    PromptState::Resolved(PromptResolution::Unanswered)
                }
            },
            PromptState::AwaitingPermanence(_) => {
                let permanent = self.await_outcome().await
                    == StageOutcome::Action(ACTION_ALWAYS_ALLOW);
                PromptState::Resolved(PromptResolution::Granted { permanent })
            }
            PromptState::Resolved(_) => return Ok(&self.state),
        };
        self.state = next;
        Ok(&self.state)
    }

    async fn display(&mut self, request: PromptRequest) -> Result<PromptId, ConsentError> {
        let request = request.with_context(&self.session_id, &self.url);
        let subscription = self.prompt.sink.show(request).await?;
        let id = subscription.id().clone();
        self.subscription = Some(subscription);
        self.displayed = Some(id.clone());
        Ok(id)
    }

    /// Wait for the displayed stage to finish, consuming its subscription.
    async fn await_outcome(&mut self) -> StageOutcome {
        let outcome = self.wait_for_answer().await;
        self.displayed = None;
        outcome
    }

    async fn wait_for_answer(&mut self) -> StageOutcome {
        let Some(subscription) = self.subscription.take() else {
            return StageOutcome::Unanswered;
        };
        let id = subscription.id().clone();

        let event = match self.prompt.timeout {
            Some(limit) => match tokio::time::timeout(limit, subscription.recv()).await {
                Ok(event) => event,
                Err(_) => {
                    log::warn!("prompt {} timed out after {:?}", id, limit);
                    self.prompt.sink.clear(&id).await;
                    return StageOutcome::Unanswered;
                }
            },
            None => subscription.recv().await,
        };

        match event {
            Some(PromptEvent::Action { index }) => {
                self.prompt.sink.clear(&id).await;
                StageOutcome::Action(index)
            }
            Some(PromptEvent::Dismissed) => StageOutcome::Dismissed,
            None => {
                log::warn!("prompt {} closed without an answer", id);
                StageOutcome::Unanswered
            }
        }
    }
}

impl Drop for ConsentFlow<'_> {
    fn drop(&mut self) {
        let Some(id) = self.displayed.take() else {
            return;
        };
        let sink = Arc::clone(&self.prompt.sink);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                log::debug!("flow for {} abandoned, clearing prompt {}", self.origin, id);
                handle.spawn(async move { sink.clear(&id).await });
            }
            Err(_) => log::warn!("prompt {} left displayed", id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryDecisionStore;
    use crate::test_utils::ScriptedPromptSink;

    fn prompt_with(
        sink: &ScriptedPromptSink,
        timeout: Option<Duration>,
    ) -> (ConsentPrompt, Arc<MemoryDecisionStore>) {
        let store = Arc::new(MemoryDecisionStore::new());
        let prompt = ConsentPrompt::new(Arc::new(sink.clone()), store.clone(), timeout);
        (prompt, store)
    }

    async fn run(sink: ScriptedPromptSink) -> (PromptResolution, Arc<MemoryDecisionStore>) {
        let (prompt, store) = prompt_with(&sink, None);
        let resolution = prompt.run("a.com", "s1", "https://a.com/").await.unwrap();
        (resolution, store)
    }

    #[tokio::test]
    async fn test_allow_then_always() {
        let sink = ScriptedPromptSink::new()
            .then_click(ACTION_ALLOW)
            .then_click(ACTION_ALWAYS_ALLOW);
        let (resolution, store) = run(sink.clone()).await;

        assert_eq!(resolution, PromptResolution::Granted { permanent: true });
        // Grants are persisted by the caller, not the flow
        assert!(store.get("a.com").await.unwrap().is_none());

        let shown = sink.shown();
        assert_eq!(shown.len(), 2);
        assert_eq!(shown[0].kind, PromptKind::AllowDeny);
        assert_eq!(shown[1].kind, PromptKind::Permanence);
        assert_eq!(sink.cleared().len(), 2);
    }

    #[tokio::test]
    async fn test_allow_then_session_only() {
        let sink = ScriptedPromptSink::new()
            .then_click(ACTION_ALLOW)
            .then_click(ACTION_SESSION_ONLY);
        let (resolution, _) = run(sink).await;
        assert_eq!(resolution, PromptResolution::Granted { permanent: false });
    }

    #[tokio::test]
    async fn test_deny_saves_denial() {
        let sink = ScriptedPromptSink::new().then_click(ACTION_DENY);
        let (resolution, store) = run(sink.clone()).await;

        assert_eq!(resolution, PromptResolution::Denied);
        let saved = store.get("a.com").await.unwrap().unwrap();
        assert!(!saved.granted);
        assert!(!saved.permanent);
        assert_eq!(sink.shown().len(), 1);
    }

    #[tokio::test]
    async fn test_dismiss_stage_one_is_denial() {
        let sink = ScriptedPromptSink::new().then_dismiss();
        let (resolution, store) = run(sink).await;

        assert_eq!(resolution, PromptResolution::Denied);
        assert!(!store.get("a.com").await.unwrap().unwrap().granted);
    }

    #[tokio::test]
    async fn test_dismiss_stage_two_is_session_grant() {
        let sink = ScriptedPromptSink::new()
            .then_click(ACTION_ALLOW)
            .then_dismiss();
        let (resolution, _) = run(sink).await;
        assert_eq!(resolution, PromptResolution::Granted { permanent: false });
    }

    #[tokio::test]
    async fn test_unknown_action_is_unanswered() {
        let sink = ScriptedPromptSink::new().then_click(7);
        let (resolution, store) = run(sink).await;

        assert_eq!(resolution, PromptResolution::Unanswered);
        assert!(store.get("a.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_closed_listener_is_unanswered() {
        let sink = ScriptedPromptSink::new().then_close();
        let (resolution, store) = run(sink).await;

        assert_eq!(resolution, PromptResolution::Unanswered);
        assert!(store.get("a.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_stage_one_timeout() {
        let sink = ScriptedPromptSink::new().then_silence();
        let (prompt, store) = prompt_with(&sink, Some(Duration::from_millis(20)));

        let resolution = prompt.run("a.com", "s1", "https://a.com/").await.unwrap();

        assert_eq!(resolution, PromptResolution::Unanswered);
        assert!(store.get("a.com").await.unwrap().is_none());
        // The stale prompt is taken down
        assert_eq!(sink.cleared(), vec![sink.shown()[0].id.clone()]);
    }

    #[tokio::test]
    async fn test_stage_two_timeout_is_session_grant() {
        let sink = ScriptedPromptSink::new()
            .then_click(ACTION_ALLOW)
            .then_silence();
        let (prompt, _) = prompt_with(&sink, Some(Duration::from_millis(20)));

        let resolution = prompt.run("a.com", "s1", "https://a.com/").await.unwrap();
        assert_eq!(resolution, PromptResolution::Granted { permanent: false });
    }

    #[tokio::test]
    async fn test_display_failure_propagates() {
        let sink = ScriptedPromptSink::new().then_fail();
        let (prompt, store) = prompt_with(&sink, None);

        let err = prompt.run("a.com", "s1", "https://a.com/").await.unwrap_err();
        assert!(err.is_prompt());
        assert!(store.get("a.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_step_through_states() {
        let sink = ScriptedPromptSink::new()
            .then_click(ACTION_ALLOW)
            .then_click(ACTION_ALWAYS_ALLOW);
        let (prompt, _) = prompt_with(&sink, None);
        let mut flow = prompt.flow("a.com", "s1", "https://a.com/page");
        assert_eq!(flow.state(), &PromptState::Idle);

        let state = flow.step().await.unwrap().clone();
        assert!(matches!(state, PromptState::AwaitingAllowDeny(_)));

        let state = flow.step().await.unwrap().clone();
        assert!(matches!(state, PromptState::AwaitingPermanence(_)));

        let state = flow.step().await.unwrap().clone();
        assert_eq!(
            state,
            PromptState::Resolved(PromptResolution::Granted { permanent: true })
        );
        assert!(state.is_resolved());

        // Resolved is terminal
        assert_eq!(flow.step().await.unwrap(), &state);
        assert_eq!(sink.shown().len(), 2);
    }

    #[tokio::test]
    async fn test_dropped_flow_clears_its_prompt() {
        let sink = ScriptedPromptSink::new().then_silence();
        let (prompt, _) = prompt_with(&sink, None);

        let mut flow = prompt.flow("a.com", "s1", "https://a.com/");
        flow.step().await.unwrap();
        let id = sink.shown()[0].id.clone();
        drop(flow);

        for _ in 0..50 {
            if !sink.cleared().is_empty() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(sink.cleared(), vec![id]);
    }

    #[tokio::test]
    async fn test_finished_flow_clears_nothing_more() {
        let sink = ScriptedPromptSink::new().then_dismiss();
        let (prompt, _) = prompt_with(&sink, None);

        let mut flow = prompt.flow("a.com", "s1", "https://a.com/");
        flow.step().await.unwrap();
        flow.step().await.unwrap();
        drop(flow);
        tokio::task::yield_now().await;

        // A dismissed prompt is already gone from the surface
        assert!(sink.cleared().is_empty());
    }

    #[tokio::test]
    async fn test_back_to_back_flows_get_distinct_ids() {
        let sink = ScriptedPromptSink::new()
            .then_click(ACTION_DENY)
            .then_click(ACTION_DENY)
            .then_click(ACTION_DENY);
        let (prompt, _) = prompt_with(&sink, None);

        for _ in 0..3 {
            prompt.run("a.com", "s1", "https://a.com/").await.unwrap();
        }

        let ids: std::collections::HashSet<_> =
            sink.shown().into_iter().map(|r| r.id).collect();
        assert_eq!(ids.len(), 3);
    }

    #[tokio::test]
    async fn test_requests_carry_context() {
        let sink = ScriptedPromptSink::new().then_click(ACTION_DENY);
        run(sink.clone()).await;

        let shown = &sink.shown()[0];
        assert_eq!(shown.origin, "a.com");
        assert_eq!(shown.session_id.as_deref(), Some("s1"));
        assert_eq!(shown.url.as_deref(), Some("https://a.com/"));
    }
}
