//! # Hubgate
//!
//! Per-origin consent for a tool hub embedded in a user agent.
//!
//! Web pages (origins) that want to talk to the hub must first be approved by
//! the user. Hubgate decides whether an origin is allowed, asks the user when
//! it is not yet known, remembers the answer, and revokes live sessions when
//! the user changes their mind.
//!
//! ## Quick Start
//!
//! ```rust
//! use hubgate_core::{ConsentCoordinator, NotificationCenter};
//!
//! # tokio_test::block_on(async {
//! let center = NotificationCenter::new();
//! let coordinator = ConsentCoordinator::builder()
//!     .with_prompt_sink(center.clone())
//!     .build()
//!     .await
//!     .unwrap();
//!
//! // Answer prompts as they appear: "Allow", then "Always Allow"
//! let mut displayed = center.subscribe();
//! let ui = center.clone();
//! tokio::spawn(async move {
//!     while let Ok(prompt) = displayed.recv().await {
//!         ui.click(&prompt.id, 1).unwrap();
//!     }
//! });
//!
//! let granted = coordinator
//!     .request_consent("https://example.com", "session-1", "https://example.com/app")
//!     .await
//!     .unwrap();
//! assert!(granted);
//! # });
//! ```
//!
//! ## Components
//!
//! - [`DecisionStore`]: persistence for decisions and pending markers
//!   ([`MemoryDecisionStore`], [`FileDecisionStore`])
//! - [`ConsentPrompt`]: the two-stage Allow/Deny then Session/Always flow,
//!   shown through a [`PromptSink`] such as [`NotificationCenter`]
//! - [`ConsentCoordinator`]: expiry, de-duplication of concurrent prompts,
//!   removal and clearing
//! - [`RevocationHook`]: disconnects revoked origins through a
//!   [`SessionRegistry`] and broadcasts [`ConsentEvent`]s
//!
//! ## Feature Flags
//!
//! - `test-utils` - scripted prompt sink and recording session registry

pub mod coordinator;
pub mod decision;
pub mod error;
pub mod events;
pub mod prompt;
pub mod revocation;
pub mod store;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use coordinator::{
    ConsentCoordinator, ConsentCoordinatorBuilder, DEFAULT_DECISION_TTL, DEFAULT_PROMPT_TIMEOUT,
};
pub use decision::{ConsentDecision, ConsentStatus};
pub use error::{ConsentError, Result};
pub use events::{ConsentEvent, ConsentEvents, DEFAULT_EVENT_CAPACITY};

// Prompt flow
pub use prompt::{
    ConsentFlow, ConsentPrompt, NotificationCenter, PromptError, PromptEvent, PromptId,
    PromptKind, PromptRequest, PromptResolution, PromptSink, PromptState, PromptSubscription,
};

pub use revocation::{NoSessionRegistry, RegistryError, RevocationHook, SessionRegistry};
pub use store::{DecisionStore, FileDecisionStore, MemoryDecisionStore, StoreError};
