//! Verification outcome types for candidate addresses.
//!
//! Two independent verifiers run against each candidate: a live SMTP-style
//! deliverability probe and a third-party scoring verifier. The acceptance
//! pipeline combines their results with a deterministic precedence rule.

use serde::{Deserialize, Serialize};

/// Outcome of the live deliverability probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeStatus {
    /// The mail server accepted the recipient.
    Valid,
    /// The mail server rejected the recipient permanently.
    Invalid,
    /// The probe was inconclusive (timeout, greylisting, catch-all, ...).
    Unknown,
}

/// Result of one probe run against one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProbeResult {
    pub status: ProbeStatus,
    /// Confidence in the status, 0.0 to 1.0.
    pub confidence: f64,
}

impl ProbeResult {
    pub fn valid() -> Self {
        Self {
            status: ProbeStatus::Valid,
            confidence: 0.9,
        }
    }

    pub fn invalid() -> Self {
        Self {
            status: ProbeStatus::Invalid,
            confidence: 0.0,
        }
    }

    pub fn unknown() -> Self {
        Self {
            status: ProbeStatus::Unknown,
            confidence: 0.5,
        }
    }
}

/// Classification reported by the scoring verifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreResult {
    Deliverable,
    Undeliverable,
    Risky,
    Unknown,
    /// The verifier was unavailable or returned a malformed payload.
    Error,
}

/// Result of one scoring-verifier run against one candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreOutcome {
    /// Whether the verifier produced a usable answer at all.
    pub usable: bool,
    pub result: ScoreResult,
    /// Reputation score, 0 to 100, when reported.
    pub score: Option<u8>,
}

impl ScoreOutcome {
    /// An outcome representing an unusable verifier (no credentials, network
    /// failure, malformed payload). Degrades the pipeline, never blocks it.
    pub fn not_usable() -> Self {
        Self {
            usable: false,
            result: ScoreResult::Error,
            score: None,
        }
    }

    /// Whether the verifier confirms the address as deliverable: an outright
    /// "deliverable" verdict, or "risky" with a score of at least 70.
    pub fn accepts(&self) -> bool {
        self.usable
            && match self.result {
                ScoreResult::Deliverable => true,
                ScoreResult::Risky => self.score.unwrap_or(0) >= 70,
                _ => false,
            }
    }

    /// Score normalized to 0.0..=1.0.
    pub fn normalized_score(&self) -> f64 {
        f64::from(self.score.unwrap_or(0)) / 100.0
    }
}
