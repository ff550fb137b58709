//! In-process notification center.

use super::sink::{
    PromptError, PromptEvent, PromptId, PromptRequest, PromptSink, PromptSubscription,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, oneshot};

/// Default capacity of the displayed-prompt broadcast channel.
pub const DEFAULT_CENTER_CAPACITY: usize = 64;

struct OpenPrompt {
    request: PromptRequest,
    responder: oneshot::Sender<PromptEvent>,
}

struct CenterInner {
    open: Mutex<HashMap<PromptId, OpenPrompt>>,
    displayed: broadcast::Sender<PromptRequest>,
}

/// A [`PromptSink`] that keeps prompts in memory and lets a front end answer them.
///
/// Front ends learn about new prompts through [`subscribe`](Self::subscribe)
/// or [`open_prompts`](Self::open_prompts) and answer with
/// [`click`](Self::click) or [`dismiss`](Self::dismiss). Each answer is routed
/// to the one flow that showed that prompt id. Clones share state.
///
/// # Example
///
/// ```rust
/// use hubgate_core::prompt::{NotificationCenter, PromptEvent, PromptRequest, PromptSink};
///
/// # tokio_test::block_on(async {
/// let center = NotificationCenter::new();
/// let request = PromptRequest::allow_deny("a.com", chrono::Utc::now());
/// let id = request.id.clone();
///
/// let subscription = center.show(request).await.unwrap();
/// center.click(&id, 1).unwrap();
///
/// assert_eq!(subscription.recv().await, Some(PromptEvent::Action { index: 1 }));
/// # });
/// ```
#[derive(Clone)]
pub struct NotificationCenter {
    inner: Arc<CenterInner>,
}

impl NotificationCenter {
    /// Create an empty center.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CENTER_CAPACITY)
    }

    /// Create an empty center whose displayed-prompt channel buffers `capacity` prompts.
    pub fn with_capacity(capacity: usize) -> Self {
        let (displayed, _) = broadcast::channel(capacity);
        Self {
            inner: Arc::new(CenterInner {
                open: Mutex::new(HashMap::new()),
                displayed,
            }),
        }
    }

    /// Receive every prompt displayed from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<PromptRequest> {
        self.inner.displayed.subscribe()
    }

    /// Prompts awaiting an answer.
    ///
    /// Prompts whose flow has gone away are dropped here.
    pub fn open_prompts(&self) -> Vec<PromptRequest> {
        let mut open = self.inner.open.lock();
        open.retain(|_, p| !p.responder.is_closed());
        let mut prompts: Vec<_> = open.values().map(|p| p.request.clone()).collect();
        prompts.sort_by(|a, b| a.id.as_str().cmp(b.id.as_str()));
        prompts
    }

    /// Answer prompt `id` with the action at `index`.
    pub fn click(&self, id: &PromptId, index: usize) -> Result<(), PromptError> {
        self.deliver(id, PromptEvent::Action { index })
    }

    /// Report that prompt `id` was closed without a choice.
    ///
    /// Only a close made by the user ends the prompt. A close the surface made
    /// on its own is ignored and the prompt stays open.
    pub fn dismiss(&self, id: &PromptId, by_user: bool) -> Result<(), PromptError> {
        if !by_user {
            let open = self.inner.open.lock();
            if !open.get(id).is_some_and(|p| !p.responder.is_closed()) {
                return Err(PromptError::NotFound(id.clone()));
            }
            log::debug!("prompt {} closed by the surface, still waiting", id);
            return Ok(());
        }
        self.deliver(id, PromptEvent::Dismissed)
    }

    fn deliver(&self, id: &PromptId, event: PromptEvent) -> Result<(), PromptError> {
        let prompt = self
            .inner
            .open
            .lock()
            .remove(id)
            .ok_or_else(|| PromptError::NotFound(id.clone()))?;

        if prompt.responder.send(event).is_err() {
            log::debug!("prompt {} answered after its flow ended", id);
            return Err(PromptError::NotFound(id.clone()));
        }
        Ok(())
    }
}

impl Default for NotificationCenter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PromptSink for NotificationCenter {
    async fn show(&self, request: PromptRequest) -> Result<PromptSubscription, PromptError> {
        let (responder, subscription) = PromptSubscription::channel(request.id.clone());
        {
            let mut open = self.inner.open.lock();
            if open
                .get(&request.id)
                .is_some_and(|p| !p.responder.is_closed())
            {
                return Err(PromptError::DuplicateId(request.id));
            }
            open.insert(
                request.id.clone(),
                OpenPrompt {
                    request: request.clone(),
                    responder,
                },
            );
        }

        // No front end listening is fine; the prompt stays open.
        let _ = self.inner.displayed.send(request);
        Ok(subscription)
    }

    async fn clear(&self, id: &PromptId) {
        self.inner.open.lock().remove(id);
    }
}
