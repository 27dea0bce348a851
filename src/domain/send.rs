//! Send and bounce records: the persisted event log that all send-volume
//! counters derive from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::types::{RecipientId, SendId, TransportId};

/// One attempted delivery.
///
/// Immutable after creation; bounce records reference it by id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendRecord {
    pub id: SendId,
    pub recipient_id: RecipientId,
    /// Transport used, if delivery went through the rotation pool.
    pub transport_id: Option<TransportId>,
    /// Transport-assigned id used to correlate later bounces.
    pub delivery_id: Option<String>,
    pub subject: String,
    pub body: String,
    /// Whether delivery was handed off successfully.
    pub sent: bool,
    pub sent_at: DateTime<Utc>,
}

impl SendRecord {
    /// Creates a record for a successful handoff.
    pub fn delivered(
        recipient_id: RecipientId,
        transport_id: Option<TransportId>,
        delivery_id: impl Into<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            id: SendId::generate(),
            recipient_id,
            transport_id,
            delivery_id: Some(delivery_id.into()),
            subject: subject.into(),
            body: body.into(),
            sent: true,
            sent_at: Utc::now(),
        }
    }

    /// Creates a record for a failed delivery attempt.
    pub fn failed(
        recipient_id: RecipientId,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            id: SendId::generate(),
            recipient_id,
            transport_id: None,
            delivery_id: None,
            subject: subject.into(),
            body: body.into(),
            sent: false,
            sent_at: Utc::now(),
        }
    }
}

/// Severity of a detected delivery failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BounceSeverity {
    /// Permanent failure: invalid or nonexistent address.
    Hard,
    /// Temporary failure: full mailbox, transient server issue.
    Soft,
}

impl BounceSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hard => "hard",
            Self::Soft => "soft",
        }
    }

    /// Parses the database representation, defaulting to `Hard`.
    pub fn parse(s: &str) -> Self {
        match s {
            "soft" => Self::Soft,
            _ => Self::Hard,
        }
    }
}

/// One detected delivery failure, linked to exactly one [`SendRecord`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BounceRecord {
    pub id: String,
    pub send_id: SendId,
    pub severity: BounceSeverity,
    pub detected_at: DateTime<Utc>,
}

impl BounceRecord {
    pub fn new(send_id: SendId, severity: BounceSeverity) -> Self {
        Self {
            id: format!("bnc-{}", uuid::Uuid::new_v4()),
            send_id,
            severity,
            detected_at: Utc::now(),
        }
    }
}
