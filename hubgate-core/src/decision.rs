//! Consent decision types.
//!
//! A decision records whether an origin may connect to the hub, when the
//! user made that choice, and whether it is exempt from expiry.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A stored consent decision for a single origin.
///
/// Decisions are only ever replaced wholesale. The `timestamp` is persisted as
/// epoch milliseconds so stores written by other hub implementations stay
/// readable.
///
/// # Example
///
/// ```rust
/// use hubgate_core::ConsentDecision;
///
/// // Allowed for this session only (expires after the decision TTL)
/// let decision = ConsentDecision::granted("https://example.com", false);
/// assert!(decision.granted);
/// assert!(!decision.permanent);
///
/// // Denied
/// let decision = ConsentDecision::denied("https://evil.example");
/// assert!(!decision.granted);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentDecision {
    /// Origin this decision applies to. Opaque key, normalized by the caller.
    pub origin: String,

    /// Whether the origin may connect.
    pub granted: bool,

    /// When the decision was recorded.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,

    /// Permanent decisions never expire.
    #[serde(default)]
    pub permanent: bool,
}

impl ConsentDecision {
    /// Create a decision allowing the origin, timestamped now.
    pub fn granted(origin: impl Into<String>, permanent: bool) -> Self {
        Self {
            origin: origin.into(),
            granted: true,
            timestamp: Utc::now(),
            permanent,
        }
    }

    /// Create a non-permanent denial, timestamped now.
    pub fn denied(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            granted: false,
            timestamp: Utc::now(),
            permanent: false,
        }
    }

    /// Override the timestamp.
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Check whether this decision has outlived `ttl` at instant `now`.
    ///
    /// Permanent decisions never expire. The comparison is strict: a decision
    /// exactly `ttl` old is still valid.
    pub fn is_expired(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        !self.permanent && now.signed_duration_since(self.timestamp) > ttl
    }

    /// Status label for this decision.
    pub fn status(&self) -> ConsentStatus {
        match (self.granted, self.permanent) {
            (true, true) => ConsentStatus::AlwaysAllowed,
            (true, false) => ConsentStatus::Session,
            (false, _) => ConsentStatus::Denied,
        }
    }
}

/// Summary of where an origin stands, as shown in settings views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsentStatus {
    /// Granted and exempt from expiry.
    AlwaysAllowed,
    /// Granted until the decision expires.
    Session,
    /// Denied.
    Denied,
    /// No stored decision.
    NoDecision,
}

impl ConsentStatus {
    /// Human-readable badge label.
    pub fn label(&self) -> &'static str {
        match self {
            ConsentStatus::AlwaysAllowed => "Always Allowed",
            ConsentStatus::Session => "Session",
            ConsentStatus::Denied => "Denied",
            ConsentStatus::NoDecision => "No Decision",
        }
    }

    /// Status for an optional decision.
    pub fn of(decision: Option<&ConsentDecision>) -> Self {
        decision
            .map(ConsentDecision::status)
            .unwrap_or(ConsentStatus::NoDecision)
    }
}

impl std::fmt::Display for ConsentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
