//! Verifier traits and their shared error type.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{ProbeResult, ScoreOutcome};

/// Errors that can occur while verifying an address.
#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("DNS lookup failed: {0}")]
    Dns(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed address: {0}")]
    MalformedAddress(String),
}

/// Result type for verifier operations.
pub type VerifyResult<T> = Result<T, VerifyError>;

/// Live deliverability probe against the candidate's mail server.
#[async_trait]
pub trait DeliverabilityProbe: Send + Sync {
    /// Probes one address. Inconclusive outcomes (greylisting, timeouts,
    /// catch-all servers) are reported as unknown, not as errors.
    async fn probe(&self, email: &str) -> VerifyResult<ProbeResult>;
}

/// Third-party reputation scoring verifier.
#[async_trait]
pub trait ScoringVerifier: Send + Sync {
    /// Scores one address. Implementations report provider unavailability
    /// as a not-usable outcome rather than an error where possible.
    async fn score(&self, email: &str) -> VerifyResult<ScoreOutcome>;
}
