//! Text generator trait and supporting types.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::Strictness;
use crate::domain::DraftContext;

/// Errors that can occur during text generation.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    #[error("Rate limited, retry after {retry_after_secs:?} seconds")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("Authentication failed: {0}")]
    Authentication(String),
}

/// Result type for generator operations.
pub type LlmResult<T> = Result<T, LlmError>;

/// A generated message: subject and plain-text body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Draft {
    pub subject: String,
    pub body: String,
}

/// The critic's verdict on a draft.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Critique {
    /// Whether the draft is acceptable as-is.
    pub passed: bool,
    /// Quality score, 0.0 to 1.0.
    pub score: f64,
    /// Actionable feedback for the rewrite pass.
    pub feedback: String,
}

/// Drafts, critiques, and rewrites outreach messages.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Produces an initial draft from the recipient context and evidence.
    async fn draft(&self, context: &DraftContext) -> LlmResult<Draft>;

    /// Scores a draft against the given strictness level.
    async fn critique(
        &self,
        context: &DraftContext,
        draft: &Draft,
        strictness: Strictness,
    ) -> LlmResult<Critique>;

    /// Rewrites a draft incorporating critic feedback.
    async fn rewrite(
        &self,
        context: &DraftContext,
        draft: &Draft,
        feedback: &str,
    ) -> LlmResult<Draft>;
}
