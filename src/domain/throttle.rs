//! Per-domain throttle state and global adaptive rate state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-domain cooldown marker.
///
/// A domain with `cooldown_until` in the future denies all sends to that
/// domain regardless of the day's count. Daily counts themselves are derived
/// from the send-record event log, never stored here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainThrottleState {
    pub domain: String,
    pub cooldown_until: Option<DateTime<Utc>>,
    pub recorded_at: DateTime<Utc>,
}

impl DomainThrottleState {
    /// Whether the domain is currently cooling down.
    pub fn in_cooldown(&self, now: DateTime<Utc>) -> bool {
        self.cooldown_until.is_some_and(|until| until > now)
    }
}

/// Global adaptive send caps, one row per adaptation (append-only series).
///
/// The rate controller always reads the most recent row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateState {
    pub recorded_at: DateTime<Utc>,
    pub emails_per_hour: u32,
    pub emails_per_day: u32,
    /// Observed trailing bounce rate that produced this state.
    pub bounce_rate: f64,
}

impl RateState {
    /// Initial warm-up seed used when no prior state exists.
    pub fn seed() -> Self {
        Self {
            recorded_at: Utc::now(),
            emails_per_hour: 10,
            emails_per_day: 10,
            bounce_rate: 0.0,
        }
    }
}
