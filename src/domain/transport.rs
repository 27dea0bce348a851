//! Configured outbound transports and the rotation strategies that pick
//! between them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::types::TransportId;

/// How the router picks the next transport from the active pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationStrategy {
    /// The transport with the oldest last-used timestamp (never-used first).
    #[default]
    RoundRobin,
    /// Uniform choice among eligible transports.
    Random,
    /// Minimum by cumulative send count, ties broken toward less recent use.
    LeastUsed,
}

/// A configured outbound delivery channel.
///
/// Mutated on every successful send (count increment, timestamp update);
/// never deleted, only deactivated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transport {
    pub id: TransportId,
    /// Display name, e.g. "Primary SMTP".
    pub name: String,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Whether to negotiate STARTTLS (false means implicit TLS relay).
    pub starttls: bool,
    pub from_email: String,
    pub from_name: String,
    pub active: bool,
    /// Higher is preferred when rotating.
    pub priority: i32,
    /// Cumulative successful sends, for least-used rotation.
    pub emails_sent: u64,
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Transport {
    /// Creates an active transport with default priority.
    pub fn new(
        name: impl Into<String>,
        host: impl Into<String>,
        port: u16,
        username: impl Into<String>,
        password: impl Into<String>,
        from_email: impl Into<String>,
    ) -> Self {
        Self {
            id: TransportId::generate(),
            name: name.into(),
            host: host.into(),
            port,
            username: username.into(),
            password: password.into(),
            starttls: true,
            from_email: from_email.into(),
            from_name: String::new(),
            active: true,
            priority: 0,
            emails_sent: 0,
            last_used_at: None,
            created_at: Utc::now(),
        }
    }

    /// Sets the rotation priority.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// RFC 5322 From header value.
    pub fn from_header(&self) -> String {
        if self.from_name.is_empty() {
            self.from_email.clone()
        } else {
            format!("{} <{}>", self.from_name, self.from_email)
        }
    }
}
