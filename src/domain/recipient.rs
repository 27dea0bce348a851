//! Recipient entity: a validated person+email pairing eligible for outreach.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::types::RecipientId;

/// Validation status assigned when a candidate address is promoted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationStatus {
    /// Verified deliverable.
    Valid,
    /// Could not be conclusively verified.
    Unknown,
    /// Verified undeliverable.
    Invalid,
}

impl ValidationStatus {
    /// Database/text representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Valid => "valid",
            Self::Unknown => "unknown",
            Self::Invalid => "invalid",
        }
    }

    /// Parses the database representation, defaulting to `Unknown`.
    pub fn parse(s: &str) -> Self {
        match s {
            "valid" => Self::Valid,
            "invalid" => Self::Invalid,
            _ => Self::Unknown,
        }
    }
}

/// A unique (person, email) pairing.
///
/// Recipients are created when the acceptance pipeline promotes a candidate
/// address, mutated by the bounce processor (blocking) and operator action,
/// and never deleted, only flagged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipient {
    /// Unique identifier.
    pub id: RecipientId,
    /// Person's display name.
    pub name: String,
    /// Company the person belongs to.
    pub company: String,
    /// Role/title, if known.
    pub role: String,
    /// Normalized lowercase email address.
    pub email: String,
    /// Domain portion of the address (lowercase).
    pub domain: String,
    /// Confidence in the address, 0.0 to 1.0.
    pub confidence: f64,
    /// Verification outcome at promotion time.
    pub validation_status: ValidationStatus,
    /// Whether the recipient is excluded from future sends.
    pub blocked: bool,
    /// Why the recipient was blocked, if it was.
    pub blocked_reason: Option<String>,
    /// When the recipient was created.
    pub created_at: DateTime<Utc>,
}

impl Recipient {
    /// Creates a new unblocked recipient, normalizing the email to lowercase.
    pub fn new(
        name: impl Into<String>,
        company: impl Into<String>,
        email: impl Into<String>,
        confidence: f64,
        validation_status: ValidationStatus,
    ) -> Self {
        let email = email.into().trim().to_lowercase();
        let domain = email.split('@').nth(1).unwrap_or_default().to_string();

        Self {
            id: RecipientId::generate(),
            name: name.into(),
            company: company.into(),
            role: String::new(),
            email,
            domain,
            confidence,
            validation_status,
            blocked: false,
            blocked_reason: None,
            created_at: Utc::now(),
        }
    }

    /// Sets the role/title.
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = role.into();
        self
    }
}
