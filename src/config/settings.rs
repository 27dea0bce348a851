//! Application settings types and persistence.
//!
//! Settings are stored in the user's config directory as JSON and loaded at
//! startup. Every safety component receives its knobs from here at
//! construction time.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::domain::RotationStrategy;

/// Top-level settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Send-volume and rotation policy.
    pub sending: SendingSettings,
    /// Dispatch retry/timeout/fallback behavior.
    pub delivery: DeliverySettings,
    /// Quality critic loop configuration.
    pub critic: CriticSettings,
    /// Candidate verification configuration.
    pub verification: VerificationSettings,
}

impl Settings {
    /// Default settings file location under the user's config directory.
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "panbanda", "outbound")
            .map(|dirs| dirs.config_dir().join("settings.json"))
    }

    /// Loads settings from a JSON file, falling back to defaults when the
    /// file is missing or unreadable.
    pub fn load_or_default(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), error = %e, "Malformed settings file, using defaults");
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Persists settings as pretty-printed JSON, creating parent directories.
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }
}

/// Send-volume policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendingSettings {
    /// Master switch for rate limiting.
    pub enable_rate_limiting: bool,
    /// Operator override for the hourly cap. Wins over adaptive state.
    pub emails_per_hour: Option<u32>,
    /// Operator override for the daily cap. Wins over adaptive state.
    pub emails_per_day: Option<u32>,
    /// Per-domain daily send cap.
    pub domain_max_per_day: u32,
    /// How the router rotates between transports.
    pub rotation_strategy: RotationStrategy,
    /// Pause between consecutive sends in a batch, in milliseconds.
    pub send_delay_ms: u64,
}

impl Default for SendingSettings {
    fn default() -> Self {
        Self {
            enable_rate_limiting: true,
            emails_per_hour: None,
            emails_per_day: None,
            domain_max_per_day: 3,
            rotation_strategy: RotationStrategy::RoundRobin,
            send_delay_ms: 500,
        }
    }
}

/// Dispatch behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliverySettings {
    /// When storage or a collaborator is unreachable, read-based safety
    /// checks allow the send instead of blocking everything. Deliberate
    /// availability-over-strictness trade-off; set to false to fail closed.
    pub fail_open_on_infra_error: bool,
    /// Total delivery attempts per transport (first try included).
    pub send_attempts: u32,
    /// Fixed backoff between delivery attempts, in milliseconds.
    pub retry_backoff_ms: u64,
    /// Per-dispatch timeout in seconds.
    pub dispatch_timeout_secs: u64,
    /// Always-available direct channel used when no transport is active.
    pub fallback: Option<FallbackTransport>,
}

impl Default for DeliverySettings {
    fn default() -> Self {
        Self {
            fail_open_on_infra_error: true,
            send_attempts: 2,
            retry_backoff_ms: 1000,
            dispatch_timeout_secs: 30,
            fallback: None,
        }
    }
}

/// The distinguished "direct" channel: not a member of the rotation pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackTransport {
    pub host: String,
    pub port: u16,
    pub starttls: bool,
    pub username: String,
    pub password: String,
    pub from_email: String,
    pub from_name: String,
}

/// How strictly the critic evaluates drafts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strictness {
    Low,
    #[default]
    Medium,
    High,
}

/// Quality critic loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CriticSettings {
    /// Whether the critic loop runs at all.
    pub enabled: bool,
    /// Minimum score (0 to 1) to pass.
    pub min_score: f32,
    /// Maximum rewrite attempts before giving up on improvement.
    pub max_rewrites: u32,
    pub strictness: Strictness,
}

impl Default for CriticSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            min_score: 0.7,
            max_rewrites: 2,
            strictness: Strictness::Medium,
        }
    }
}

/// Candidate verification configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationSettings {
    /// MAIL FROM address used by the deliverability probe.
    pub probe_from: String,
    /// Probe timeout in seconds.
    pub probe_timeout_secs: u64,
    /// Scoring verifier API key. Absent means the verifier is not usable.
    pub scoring_api_key: Option<String>,
    /// Confidence floor for evidence surfaced to the generator.
    pub min_signal_confidence: f64,
    /// Only promote candidates with a conclusive "valid" status.
    pub require_valid: bool,
}

impl Default for VerificationSettings {
    fn default() -> Self {
        Self {
            probe_from: "verify@outbound.dev".to_string(),
            probe_timeout_secs: 10,
            scoring_api_key: None,
            min_signal_confidence: 0.7,
            require_valid: true,
        }
    }
}
