//! Throttle ledger: per-domain cooldowns and daily send caps.
//!
//! Deliverability checks are defense-in-depth, not a hard gate. When the
//! underlying store is unreachable and `fail_open` is set, checks allow the
//! send and log at warn; this is an explicit, configured policy.

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveTime, Utc};
use thiserror::Error;
use tracing::{info, warn};

use crate::domain::DomainThrottleState;

use super::{domain_of, CheckOutcome};

/// Errors that can occur during throttle operations.
#[derive(Debug, Error)]
pub enum ThrottleError {
    /// Storage error.
    #[error("storage error: {0}")]
    Storage(String),
}

/// Result type for throttle operations.
pub type ThrottleResult<T> = Result<T, ThrottleError>;

/// Storage trait for throttle persistence.
#[async_trait]
pub trait ThrottleStorage: Send + Sync {
    /// Gets the throttle state for a domain, if any.
    async fn domain_state(&self, domain: &str) -> ThrottleResult<Option<DomainThrottleState>>;

    /// Sets or overwrites a domain's cooldown window.
    async fn set_domain_cooldown(
        &self,
        domain: &str,
        until: DateTime<Utc>,
    ) -> ThrottleResult<()>;

    /// Counts successful sends to a domain since the given instant.
    async fn count_sent_to_domain_since(
        &self,
        domain: &str,
        since: DateTime<Utc>,
    ) -> ThrottleResult<u64>;
}

/// Tracks per-domain send volume and cooldowns.
pub struct ThrottleLedger<S: ThrottleStorage> {
    storage: S,
    /// Maximum successful sends per domain per UTC day.
    domain_max_per_day: u32,
    fail_open: bool,
}

impl<S: ThrottleStorage> ThrottleLedger<S> {
    pub fn new(storage: S, domain_max_per_day: u32, fail_open: bool) -> Self {
        Self {
            storage,
            domain_max_per_day,
            fail_open,
        }
    }

    /// Checks whether a send to the address's domain is permitted.
    ///
    /// Cooldown takes precedence over the daily count: a domain in cooldown
    /// is denied no matter how few sends it has seen today.
    pub async fn check_domain(&self, address: &str) -> ThrottleResult<CheckOutcome> {
        let domain = domain_of(address);
        match self.evaluate(&domain).await {
            Ok(outcome) => {
                if let Some(reason) = &outcome.reason {
                    info!(domain, reason, "throttle denied send");
                }
                Ok(outcome)
            }
            Err(err) if self.fail_open => {
                warn!(domain, error = %err, "throttle state unreadable, failing open");
                Ok(CheckOutcome::allowed())
            }
            Err(err) => Err(err),
        }
    }

    async fn evaluate(&self, domain: &str) -> ThrottleResult<CheckOutcome> {
        let now = Utc::now();

        if let Some(state) = self.storage.domain_state(domain).await? {
            if state.in_cooldown(now) {
                let until = state.cooldown_until.unwrap_or(now);
                return Ok(CheckOutcome::denied(format!(
                    "{domain} in cooldown until {}",
                    until.to_rfc3339()
                )));
            }
        }

        let midnight = now
            .date_naive()
            .and_time(NaiveTime::MIN)
            .and_utc();
        let sent_today = self
            .storage
            .count_sent_to_domain_since(domain, midnight)
            .await?;
        if sent_today >= u64::from(self.domain_max_per_day) {
            return Ok(CheckOutcome::denied(format!(
                "{domain} reached daily limit ({} emails/day)",
                self.domain_max_per_day
            )));
        }

        Ok(CheckOutcome::allowed())
    }

    /// Starts a cooldown of the given duration for the address's domain,
    /// overwriting any existing window. Writes are never fail-open.
    pub async fn record_cooldown(
        &self,
        address: &str,
        duration: Duration,
    ) -> ThrottleResult<()> {
        let domain = domain_of(address);
        let until = Utc::now() + duration;
        info!(domain, until = %until.to_rfc3339(), "domain cooldown recorded");
        self.storage.set_domain_cooldown(&domain, until).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct MockStorage {
        states: Mutex<HashMap<String, DomainThrottleState>>,
        sent_today: Mutex<HashMap<String, u64>>,
        fail_reads: bool,
    }

    impl MockStorage {
        fn new() -> Self {
            Self {
                states: Mutex::new(HashMap::new()),
                sent_today: Mutex::new(HashMap::new()),
                fail_reads: false,
            }
        }

        fn failing() -> Self {
            Self {
                fail_reads: true,
                ..Self::new()
            }
        }
    }

    #[async_trait]
    impl ThrottleStorage for MockStorage {
        async fn domain_state(
            &self,
            domain: &str,
        ) -> ThrottleResult<Option<DomainThrottleState>> {
            if self.fail_reads {
                return Err(ThrottleError::Storage("connection lost".into()));
            }
            Ok(self.states.lock().unwrap().get(domain).cloned())
        }

        async fn set_domain_cooldown(
            &self,
            domain: &str,
            until: DateTime<Utc>,
        ) -> ThrottleResult<()> {
            self.states.lock().unwrap().insert(
                domain.to_string(),
                DomainThrottleState {
                    domain: domain.to_string(),
                    cooldown_until: Some(until),
                    recorded_at: Utc::now(),
                },
            );
            Ok(())
        }

        async fn count_sent_to_domain_since(
            &self,
            domain: &str,
            _since: DateTime<Utc>,
        ) -> ThrottleResult<u64> {
            if self.fail_reads {
                return Err(ThrottleError::Storage("connection lost".into()));
            }
            Ok(*self.sent_today.lock().unwrap().get(domain).unwrap_or(&0))
        }
    }

    #[tokio::test]
    async fn fresh_domain_is_allowed() {
        let ledger = ThrottleLedger::new(MockStorage::new(), 3, true);
        let outcome = ledger.check_domain("bob@acme.com").await.unwrap();
        assert!(outcome.allowed);
    }

    #[tokio::test]
    async fn daily_cap_denies_at_limit() {
        let storage = MockStorage::new();
        storage
            .sent_today
            .lock()
            .unwrap()
            .insert("acme.com".to_string(), 3);

        let ledger = ThrottleLedger::new(storage, 3, true);
        let outcome = ledger.check_domain("bob@acme.com").await.unwrap();
        assert!(!outcome.allowed);
        assert!(outcome
            .reason
            .unwrap()
            .contains("reached daily limit (3 emails/day)"));
    }

    #[tokio::test]
    async fn cooldown_takes_precedence_over_low_count() {
        let ledger = ThrottleLedger::new(MockStorage::new(), 3, true);
        ledger
            .record_cooldown("acme.com", Duration::hours(1))
            .await
            .unwrap();

        let outcome = ledger.check_domain("bob@acme.com").await.unwrap();
        assert!(!outcome.allowed);
        assert!(outcome.reason.unwrap().contains("in cooldown until"));
    }

    #[tokio::test]
    async fn expired_cooldown_allows() {
        let storage = MockStorage::new();
        storage.states.lock().unwrap().insert(
            "acme.com".to_string(),
            DomainThrottleState {
                domain: "acme.com".to_string(),
                cooldown_until: Some(Utc::now() - Duration::minutes(5)),
                recorded_at: Utc::now(),
            },
        );

        let ledger = ThrottleLedger::new(storage, 3, true);
        assert!(ledger.check_domain("bob@acme.com").await.unwrap().allowed);
    }

    #[tokio::test]
    async fn storage_failure_fails_open_when_configured() {
        let ledger = ThrottleLedger::new(MockStorage::failing(), 3, true);
        assert!(ledger.check_domain("bob@acme.com").await.unwrap().allowed);
    }

    #[tokio::test]
    async fn storage_failure_propagates_when_fail_open_disabled() {
        let ledger = ThrottleLedger::new(MockStorage::failing(), 3, false);
        assert!(ledger.check_domain("bob@acme.com").await.is_err());
    }
}
