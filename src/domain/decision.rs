//! Append-only audit records for send decisions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::types::RecipientId;

/// Outcome category recorded for each send-gate evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionKind {
    Allowed,
    Blocked,
    Throttled,
    Suppressed,
}

impl DecisionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Allowed => "allowed",
            Self::Blocked => "blocked",
            Self::Throttled => "throttled",
            Self::Suppressed => "suppressed",
        }
    }

    /// Parses the database representation, defaulting to `Blocked`.
    pub fn parse(s: &str) -> Self {
        match s {
            "allowed" => Self::Allowed,
            "throttled" => Self::Throttled,
            "suppressed" => Self::Suppressed,
            _ => Self::Blocked,
        }
    }
}

/// Audit record answering "why wasn't X sent".
///
/// The proposed body is persisted only on blocked decisions, for manual
/// review; allowed decisions never store bodies so the log stays bounded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendDecisionRecord {
    pub recipient_id: Option<RecipientId>,
    pub email: String,
    pub decision: DecisionKind,
    pub reason: Option<String>,
    pub body: Option<String>,
    pub checked_at: DateTime<Utc>,
}

impl SendDecisionRecord {
    /// Record for a permitted send.
    pub fn allowed(recipient_id: Option<RecipientId>, email: impl Into<String>) -> Self {
        Self {
            recipient_id,
            email: email.into(),
            decision: DecisionKind::Allowed,
            reason: None,
            body: None,
            checked_at: Utc::now(),
        }
    }

    /// Record for a denied send, retaining the body for review.
    pub fn denied(
        kind: DecisionKind,
        recipient_id: Option<RecipientId>,
        email: impl Into<String>,
        reason: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            recipient_id,
            email: email.into(),
            decision: kind,
            reason: Some(reason.into()),
            body: Some(body.into()),
            checked_at: Utc::now(),
        }
    }

    /// Shorthand for a quality/policy denial.
    pub fn blocked(
        recipient_id: Option<RecipientId>,
        email: impl Into<String>,
        reason: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self::denied(DecisionKind::Blocked, recipient_id, email, reason, body)
    }
}
