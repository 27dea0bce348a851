//! Adaptive rate controller: global hourly/daily caps with warm-up and
//! bounce-driven back-off.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::SendingSettings;
use crate::domain::RateState;

use super::CheckOutcome;

/// Errors that can occur during rate operations.
#[derive(Debug, Error)]
pub enum RateError {
    /// Storage error.
    #[error("storage error: {0}")]
    Storage(String),
}

/// Result type for rate operations.
pub type RateResult<T> = Result<T, RateError>;

/// Storage trait for rate state and send counts.
#[async_trait]
pub trait RateStorage: Send + Sync {
    /// Most recent rate state, if any.
    async fn latest_rate_state(&self) -> RateResult<Option<RateState>>;

    /// Appends a new rate state to the series.
    async fn append_rate_state(&self, state: &RateState) -> RateResult<()>;

    /// Counts successful sends since the given instant.
    async fn count_sent_since(&self, since: DateTime<Utc>) -> RateResult<u64>;
}

/// Holds the current send caps and adapts them from bounce feedback.
pub struct RateController<S: RateStorage> {
    storage: S,
    settings: SendingSettings,
    fail_open: bool,
}

impl<S: RateStorage> RateController<S> {
    pub fn new(storage: S, settings: SendingSettings, fail_open: bool) -> Self {
        Self {
            storage,
            settings,
            fail_open,
        }
    }

    /// Effective (per-hour, per-day) limits. Operator overrides win over the
    /// adaptive state; with neither present, the warm-up seed applies.
    pub async fn current_limits(&self) -> RateResult<(u32, u32)> {
        let state = self
            .storage
            .latest_rate_state()
            .await?
            .unwrap_or_else(RateState::seed);
        let per_hour = self.settings.emails_per_hour.unwrap_or(state.emails_per_hour);
        let per_day = self.settings.emails_per_day.unwrap_or(state.emails_per_day);
        Ok((per_hour, per_day))
    }

    /// Whether both the trailing-hour and trailing-day send counts are below
    /// their limits. Windows are wall-clock trailing, not calendar-aligned.
    pub async fn check_within_limits(&self) -> RateResult<bool> {
        let (per_hour, per_day) = self.current_limits().await?;
        let now = Utc::now();

        let hourly = self
            .storage
            .count_sent_since(now - Duration::hours(1))
            .await?;
        let daily = self
            .storage
            .count_sent_since(now - Duration::days(1))
            .await?;

        Ok(hourly < u64::from(per_hour) && daily < u64::from(per_day))
    }

    /// The gate-facing check. Short-circuits to allowed when rate limiting is
    /// administratively disabled; fails open on storage errors per policy.
    pub async fn can_send(&self) -> RateResult<CheckOutcome> {
        if !self.settings.enable_rate_limiting {
            return Ok(CheckOutcome::allowed());
        }

        let evaluation = async {
            if self.check_within_limits().await? {
                Ok(CheckOutcome::allowed())
            } else {
                let (per_hour, per_day) = self.current_limits().await?;
                Ok(CheckOutcome::denied(format!(
                    "Rate limit exceeded: {per_hour}/hour, {per_day}/day"
                )))
            }
        };

        match evaluation.await {
            Ok(outcome) => {
                if let Some(reason) = &outcome.reason {
                    info!(reason, "rate controller denied send");
                }
                Ok(outcome)
            }
            Err(err) if self.fail_open => {
                warn!(error = %err, "rate state unreadable, failing open");
                Ok(CheckOutcome::allowed())
            }
            Err(err) => Err(err),
        }
    }

    /// Adapts the caps from the observed bounce rate and appends the new
    /// state. Above 5% bounce rate both caps halve (daily floored at 5);
    /// otherwise the daily cap warms up by 5 toward 100 and the hourly cap is
    /// derived as min(12, daily / 8).
    pub async fn adapt(&self, bounce_rate: f64) -> RateResult<RateState> {
        let previous = self.storage.latest_rate_state().await?;

        let state = match previous {
            None => RateState::seed(),
            Some(prev) => {
                let (per_hour, per_day) = if bounce_rate > 0.05 {
                    (
                        (prev.emails_per_hour / 2).max(1),
                        (prev.emails_per_day / 2).max(5),
                    )
                } else {
                    let per_day = (prev.emails_per_day + 5).min(100);
                    // Hourly is derived from daily assuming an 8-hour
                    // sending window, never incremented independently.
                    ((per_day / 8).clamp(1, 12), per_day)
                };
                RateState {
                    recorded_at: Utc::now(),
                    emails_per_hour: per_hour,
                    emails_per_day: per_day,
                    bounce_rate,
                }
            }
        };

        info!(
            per_hour = state.emails_per_hour,
            per_day = state.emails_per_day,
            bounce_rate,
            "rate limits adapted"
        );
        self.storage.append_rate_state(&state).await?;
        Ok(state)
    }
}
