//! Mail dispatch backend trait.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::Transport;

/// Errors raised while handing a message to an SMTP server.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("SMTP connection failed: {0}")]
    Connection(String),

    #[error("message rejected: {0}")]
    Rejected(String),

    #[error("invalid message: {0}")]
    InvalidMessage(String),
}

impl DispatchError {
    /// Whether this failure indicates the transport hit a provider quota or
    /// rate limit, which should take it out of rotation briefly.
    pub fn is_quota(&self) -> bool {
        let text = self.to_string().to_lowercase();
        text.contains("quota") || text.contains("rate limit") || text.contains("too many")
    }
}

/// Result type for dispatch operations.
pub type DispatchResult<T> = Result<T, DispatchError>;

/// Hands a composed message to an SMTP server via a configured transport.
#[async_trait]
pub trait MailBackend: Send + Sync {
    /// Dispatches one message, returning the server-assigned delivery id
    /// (or the first response line when the server assigns none).
    async fn dispatch(
        &self,
        transport: &Transport,
        to: &str,
        subject: &str,
        body: &str,
    ) -> DispatchResult<String>;
}
