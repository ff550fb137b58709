//! Common test utilities shared across test files.
//!
//! This module provides test doubles for the coordinator's collaborators and
//! helpers for driving the notification center.
//! Items here may not be used by all test files, hence the module-level allow.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use hubgate_core::{
    ConsentCoordinator, ConsentDecision, DecisionStore, MemoryDecisionStore, NotificationCenter,
    PromptError, PromptId, PromptKind, PromptRequest, PromptSink, PromptSubscription, StoreError,
};
use tokio::task::JoinHandle;

// ===== Session Registry =====

pub use hubgate_core::test_utils::RecordingRegistry;

// ===== Stores =====

/// A memory store whose decision writes can be switched to fail.
#[derive(Default)]
pub struct FlakyStore {
    inner: MemoryDecisionStore,
    fail_set: AtomicBool,
}

impl FlakyStore {
    pub fn fail_writes(&self, fail: bool) {
        self.fail_set.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl DecisionStore for FlakyStore {
    async fn get_all(&self) -> Result<HashMap<String, ConsentDecision>, StoreError> {
        self.inner.get_all().await
    }

    async fn set(&self, origin: &str, decision: ConsentDecision) -> Result<(), StoreError> {
        if self.fail_set.load(Ordering::SeqCst) {
            return Err(StoreError::Write("disk full".to_string()));
        }
        self.inner.set(origin, decision).await
    }

    async fn remove(&self, origin: &str) -> Result<bool, StoreError> {
        self.inner.remove(origin).await
    }

    async fn remove_all(&self) -> Result<(), StoreError> {
        self.inner.remove_all().await
    }

    async fn get_pending(&self) -> Result<HashSet<String>, StoreError> {
        self.inner.get_pending().await
    }

    async fn set_pending(&self, origin: &str, pending: bool) -> Result<(), StoreError> {
        self.inner.set_pending(origin, pending).await
    }

    async fn clear_pending(&self) -> Result<(), StoreError> {
        self.inner.clear_pending().await
    }
}

// ===== Prompt Sinks =====

/// A sink that refuses to display anything.
pub struct BrokenSink;

#[async_trait]
impl PromptSink for BrokenSink {
    async fn show(&self, _request: PromptRequest) -> Result<PromptSubscription, PromptError> {
        Err(PromptError::Unavailable("no display".to_string()))
    }

    async fn clear(&self, _id: &PromptId) {}
}

/// One scripted answer given by [`spawn_user`].
#[derive(Debug, Clone, Copy)]
pub enum Answer {
    Click(usize),
    Dismiss,
}

/// Simulate a user answering prompts on `center` in display order.
///
/// Only prompts for origins accepted by `filter` are answered. The task ends
/// once `answers` is exhausted and returns every prompt it saw.
pub fn spawn_user_for(
    center: &NotificationCenter,
    filter: impl Fn(&str) -> bool + Send + 'static,
    answers: Vec<Answer>,
) -> JoinHandle<Vec<PromptRequest>> {
    let mut displayed = center.subscribe();
    let center = center.clone();
    tokio::spawn(async move {
        let mut seen = Vec::new();
        let mut answers = answers.into_iter();
        while let Ok(prompt) = displayed.recv().await {
            seen.push(prompt.clone());
            if !filter(&prompt.origin) {
                continue;
            }
            let Some(answer) = answers.next() else {
                break;
            };
            match answer {
                Answer::Click(index) => center.click(&prompt.id, index).unwrap(),
                Answer::Dismiss => center.dismiss(&prompt.id, true).unwrap(),
            }
            if answers.len() == 0 {
                break;
            }
        }
        seen
    })
}

/// Simulate a user answering every prompt on `center`.
pub fn spawn_user(center: &NotificationCenter, answers: Vec<Answer>) -> JoinHandle<Vec<PromptRequest>> {
    spawn_user_for(center, |_| true, answers)
}

/// Kinds of the prompts buffered on `displayed`, in display order.
pub fn drain_kinds(
    displayed: &mut tokio::sync::broadcast::Receiver<PromptRequest>,
) -> Vec<PromptKind> {
    let mut kinds = Vec::new();
    while let Ok(prompt) = displayed.try_recv() {
        kinds.push(prompt.kind);
    }
    kinds
}

// ===== Builders =====

/// A decision recorded `hours` ago.
pub fn aged(origin: &str, granted: bool, permanent: bool, hours: i64) -> ConsentDecision {
    let decision = if granted {
        ConsentDecision::granted(origin, permanent)
    } else {
        ConsentDecision::denied(origin)
    };
    decision.with_timestamp(Utc::now() - Duration::hours(hours))
}

/// Assert the stored choice for an origin, ignoring when it was made.
pub fn assert_choice(decision: Option<ConsentDecision>, granted: bool, permanent: bool) {
    let decision = decision.expect("no decision stored");
    assert_eq!(
        (decision.granted, decision.permanent),
        (granted, permanent),
        "unexpected decision for {}",
        decision.origin
    );
}

/// A coordinator over `store` prompting through `center`.
pub async fn coordinator(
    store: Arc<dyn DecisionStore>,
    center: &NotificationCenter,
    registry: &RecordingRegistry,
) -> ConsentCoordinator {
    ConsentCoordinator::builder()
        .with_shared_store(store)
        .with_prompt_sink(center.clone())
        .with_session_registry(registry.clone())
        .build()
        .await
        .unwrap()
}
