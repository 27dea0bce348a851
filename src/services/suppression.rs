//! Suppression registry: permanent and semi-permanent recipient exclusions.

use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};

use crate::domain::{Recipient, RecipientId};

use super::CheckOutcome;

/// Errors that can occur during suppression operations.
#[derive(Debug, Error)]
pub enum SuppressionError {
    /// Storage error.
    #[error("storage error: {0}")]
    Storage(String),
}

/// Result type for suppression operations.
pub type SuppressionResult<T> = Result<T, SuppressionError>;

/// Storage trait for suppression lookups.
#[async_trait]
pub trait SuppressionStorage: Send + Sync {
    /// Gets a recipient by id.
    async fn recipient_by_id(&self, id: &RecipientId) -> SuppressionResult<Option<Recipient>>;

    /// Gets the most recent recipient matching an email.
    async fn recipient_by_email(&self, email: &str) -> SuppressionResult<Option<Recipient>>;

    /// Total and hard bounce counts across all of a recipient's sends.
    async fn bounce_counts(&self, id: &RecipientId) -> SuppressionResult<(u64, u64)>;
}

/// Answers "may we contact this recipient at all".
pub struct SuppressionRegistry<S: SuppressionStorage> {
    storage: S,
    fail_open: bool,
}

impl<S: SuppressionStorage> SuppressionRegistry<S> {
    pub fn new(storage: S, fail_open: bool) -> Self {
        Self { storage, fail_open }
    }

    /// Checks a recipient by id, falling back to email lookup. Unknown
    /// recipients are treated as new, not suppressed.
    pub async fn check_recipient(
        &self,
        id: Option<&RecipientId>,
        email: &str,
    ) -> SuppressionResult<CheckOutcome> {
        match self.evaluate(id, email).await {
            Ok(outcome) => {
                if let Some(reason) = &outcome.reason {
                    info!(email, reason, "suppression denied send");
                }
                Ok(outcome)
            }
            Err(err) if self.fail_open => {
                warn!(email, error = %err, "suppression state unreadable, failing open");
                Ok(CheckOutcome::allowed())
            }
            Err(err) => Err(err),
        }
    }

    async fn evaluate(
        &self,
        id: Option<&RecipientId>,
        email: &str,
    ) -> SuppressionResult<CheckOutcome> {
        let recipient = match id {
            Some(id) => match self.storage.recipient_by_id(id).await? {
                Some(recipient) => Some(recipient),
                None => self.storage.recipient_by_email(email).await?,
            },
            None => self.storage.recipient_by_email(email).await?,
        };

        let Some(recipient) = recipient else {
            return Ok(CheckOutcome::allowed());
        };

        if recipient.blocked {
            let reason = recipient
                .blocked_reason
                .unwrap_or_else(|| "blocked".to_string());
            return Ok(CheckOutcome::denied(reason));
        }

        let (total, hard) = self.storage.bounce_counts(&recipient.id).await?;
        if total >= 2 {
            return Ok(CheckOutcome::denied(format!(
                "{total} bounces - suppressed"
            )));
        }
        if hard >= 1 {
            return Ok(CheckOutcome::denied("hard bounce - suppressed"));
        }

        Ok(CheckOutcome::allowed())
    }
}
