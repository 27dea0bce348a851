//! Send gate: the single allow/deny decision in front of every dispatch.
//!
//! Composes the throttle ledger, suppression registry, and rate controller.
//! All three checks always run so the audit log carries the full diagnostic
//! set; the final verdict is their logical AND.

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

use crate::config::{DeliverySettings, SendingSettings};
use crate::domain::{DecisionKind, Recipient, SendDecisionRecord};

use super::rate::{RateController, RateError, RateStorage};
use super::suppression::{SuppressionError, SuppressionRegistry, SuppressionStorage};
use super::throttle::{ThrottleError, ThrottleLedger, ThrottleStorage};
use super::CheckOutcome;

/// Errors that can occur during gate evaluation.
#[derive(Debug, Error)]
pub enum GateError {
    #[error("throttle check failed: {0}")]
    Throttle(#[from] ThrottleError),

    #[error("suppression check failed: {0}")]
    Suppression(#[from] SuppressionError),

    #[error("rate check failed: {0}")]
    Rate(#[from] RateError),

    /// Storage error (decision log).
    #[error("storage error: {0}")]
    Storage(String),
}

/// Result type for gate operations.
pub type GateResult<T> = Result<T, GateError>;

/// Storage trait for the decision audit log.
#[async_trait]
pub trait DecisionStorage: Send + Sync {
    /// Appends one decision record.
    async fn record_decision(&self, record: &SendDecisionRecord) -> GateResult<()>;
}

/// The gate's full verdict, including every individual check result.
#[derive(Debug, Clone)]
pub struct GateDecision {
    pub allowed: bool,
    /// Semicolon-joined denial reasons; absent when allowed.
    pub reason: Option<String>,
    pub throttle: CheckOutcome,
    pub suppression: CheckOutcome,
    pub rate: CheckOutcome,
}

/// Combines the three safety checks into one audited decision.
pub struct SendGate<S>
where
    S: ThrottleStorage + SuppressionStorage + RateStorage + DecisionStorage + Clone,
{
    throttle: ThrottleLedger<S>,
    suppression: SuppressionRegistry<S>,
    rate: RateController<S>,
    storage: S,
    fail_open: bool,
}

impl<S> SendGate<S>
where
    S: ThrottleStorage + SuppressionStorage + RateStorage + DecisionStorage + Clone,
{
    pub fn new(storage: S, sending: SendingSettings, delivery: &DeliverySettings) -> Self {
        let fail_open = delivery.fail_open_on_infra_error;
        Self {
            throttle: ThrottleLedger::new(
                storage.clone(),
                sending.domain_max_per_day,
                fail_open,
            ),
            suppression: SuppressionRegistry::new(storage.clone(), fail_open),
            rate: RateController::new(storage.clone(), sending, fail_open),
            storage,
            fail_open,
        }
    }

    /// Evaluates every check for one proposed send and appends the audit
    /// record. The proposed body is persisted only on denial, so the log
    /// stays bounded.
    ///
    /// A decision applies to one transport path only; callers switching to a
    /// fallback path must call `decide` again.
    pub async fn decide(&self, recipient: &Recipient, body: &str) -> GateResult<GateDecision> {
        let (throttle, suppression, rate) = futures::join!(
            self.throttle.check_domain(&recipient.email),
            self.suppression
                .check_recipient(Some(&recipient.id), &recipient.email),
            self.rate.can_send(),
        );
        let (throttle, suppression, rate) = (throttle?, suppression?, rate?);

        let allowed = throttle.allowed && suppression.allowed && rate.allowed;
        let reasons: Vec<&str> = [&throttle, &suppression, &rate]
            .into_iter()
            .filter_map(|check| check.reason.as_deref())
            .collect();
        let reason = if reasons.is_empty() {
            None
        } else {
            Some(reasons.join("; "))
        };

        let record = if allowed {
            SendDecisionRecord::allowed(Some(recipient.id.clone()), &recipient.email)
        } else {
            let kind = if !suppression.allowed {
                DecisionKind::Suppressed
            } else {
                DecisionKind::Throttled
            };
            SendDecisionRecord::denied(
                kind,
                Some(recipient.id.clone()),
                &recipient.email,
                reason.clone().unwrap_or_default(),
                body,
            )
        };

        if let Err(err) = self.storage.record_decision(&record).await {
            if !self.fail_open {
                return Err(err);
            }
            warn!(email = %recipient.email, error = %err, "decision log write failed");
        }

        Ok(GateDecision {
            allowed,
            reason,
            throttle,
            suppression,
            rate,
        })
    }
}
