//! Consent message boundary and HTTP endpoints for hubgate.
//!
//! Pages talk to the hub with small JSON messages (`request-consent`,
//! `remove-consent`, `clear-all-consent`). This crate decodes them, hands
//! them to a [`ConsentCoordinator`](hubgate_core::ConsentCoordinator) and
//! encodes the replies, either in-process through
//! [`messages::handle_message`] or over HTTP with [`ConsentRouter`].
//!
//! # Example
//!
//! ```rust,no_run
//! use hubgate_core::{ConsentCoordinator, NotificationCenter};
//! use hubgate_server::ConsentRouter;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let center = NotificationCenter::new();
//! let coordinator = ConsentCoordinator::builder()
//!     .with_prompt_sink(center.clone())
//!     .build()
//!     .await?;
//!
//! let app = ConsentRouter::new(coordinator)
//!     .with_consent("/api/consent")
//!     .with_prompts(center)
//!     .build()?;
//!
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod handler;
pub mod messages;
pub mod router;
pub(crate) mod state;

// Re-exports
pub use error::{BuildError, ServerError, ServerResult};
pub use handler::DecisionView;
pub use messages::{handle_message, ConsentMessage, ConsentReply};
pub use router::ConsentRouter;
