//! Transport router: rotation over configured outbound channels, bounded
//! retries, and the fallback direct channel.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::DeliverySettings;
use crate::domain::{RotationStrategy, Transport, TransportId};
use crate::providers::transport::{DispatchError, MailBackend};

use super::domain_of;

/// Errors that can occur while routing a send.
#[derive(Debug, Error)]
pub enum TransportError {
    /// No active transport and no fallback channel configured. Fatal.
    #[error("no transport available")]
    NoTransport,

    /// All delivery attempts exhausted.
    #[error("delivery failed after {attempts} attempts: {source}")]
    DeliveryFailed {
        attempts: u32,
        #[source]
        source: DispatchError,
    },

    /// Storage error.
    #[error("storage error: {0}")]
    Storage(String),
}

/// Result type for router operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Storage trait for transport state.
#[async_trait]
pub trait TransportStorage: Send + Sync {
    /// Active transports ordered by priority descending, then id.
    async fn active_transports(&self) -> TransportResult<Vec<Transport>>;

    /// Increments a transport's usage counter and last-used timestamp.
    async fn record_transport_use(
        &self,
        id: &TransportId,
        at: DateTime<Utc>,
    ) -> TransportResult<()>;

    /// Applies a domain cooldown (quota-exhaustion escalation).
    async fn set_domain_cooldown(
        &self,
        domain: &str,
        until: DateTime<Utc>,
    ) -> TransportResult<()>;
}

/// Which path a selected transport came from.
#[derive(Debug, Clone)]
pub enum SelectedTransport {
    /// Member of the rotation pool; usage is recorded on success.
    Pool(Transport),
    /// The distinguished direct channel; outside the rotation pool.
    Fallback(Transport),
}

impl SelectedTransport {
    pub fn transport(&self) -> &Transport {
        match self {
            Self::Pool(t) | Self::Fallback(t) => t,
        }
    }
}

/// Picks a transport per send and performs the dispatch with retries.
pub struct TransportRouter<S: TransportStorage, B: MailBackend> {
    storage: S,
    backend: B,
    strategy: RotationStrategy,
    settings: DeliverySettings,
}

impl<S: TransportStorage, B: MailBackend> TransportRouter<S, B> {
    pub fn new(
        storage: S,
        backend: B,
        strategy: RotationStrategy,
        settings: DeliverySettings,
    ) -> Self {
        Self {
            storage,
            backend,
            strategy,
            settings,
        }
    }

    /// Selects the next transport: a pool member by the configured rotation
    /// strategy, the fallback channel when the pool is empty, or
    /// `NoTransport` when neither exists.
    pub async fn select_transport(&self) -> TransportResult<SelectedTransport> {
        let pool = self.storage.active_transports().await?;

        if let Some(transport) = pick(&pool, self.strategy) {
            return Ok(SelectedTransport::Pool(transport.clone()));
        }

        self.fallback_path().ok_or(TransportError::NoTransport)
    }

    /// The distinguished direct channel, if one is configured.
    pub fn fallback_path(&self) -> Option<SelectedTransport> {
        self.settings.fallback.as_ref().map(|fallback| {
            let mut transport = Transport::new(
                "fallback",
                &fallback.host,
                fallback.port,
                &fallback.username,
                &fallback.password,
                &fallback.from_email,
            );
            transport.id = TransportId::from("trn-fallback");
            transport.starttls = fallback.starttls;
            transport.from_name = fallback.from_name.clone();
            SelectedTransport::Fallback(transport)
        })
    }

    /// Attempts delivery, retrying transient failures up to the configured
    /// attempt count with a fixed backoff. On success records usage (pool
    /// transports only) and returns the delivery correlation id. On
    /// exhaustion the failure is surfaced, and a quota-style error applies a
    /// one-hour cooldown to the recipient's domain.
    pub async fn send(
        &self,
        selected: &SelectedTransport,
        to: &str,
        subject: &str,
        body: &str,
    ) -> TransportResult<String> {
        let transport = selected.transport();
        let attempts = self.settings.send_attempts.max(1);
        let mut last_error: Option<DispatchError> = None;

        for attempt in 1..=attempts {
            let dispatch = tokio::time::timeout(
                std::time::Duration::from_secs(self.settings.dispatch_timeout_secs),
                self.backend.dispatch(transport, to, subject, body),
            )
            .await;

            let error = match dispatch {
                Ok(Ok(delivery_id)) => {
                    if let SelectedTransport::Pool(t) = selected {
                        self.storage
                            .record_transport_use(&t.id, Utc::now())
                            .await?;
                    }
                    info!(to, transport = %transport.name, delivery_id, "message dispatched");
                    return Ok(delivery_id);
                }
                Ok(Err(err)) => err,
                Err(_) => DispatchError::Connection(format!(
                    "dispatch timed out after {}s",
                    self.settings.dispatch_timeout_secs
                )),
            };

            warn!(
                to,
                transport = %transport.name,
                attempt,
                attempts,
                error = %error,
                "dispatch attempt failed"
            );
            last_error = Some(error);

            if attempt < attempts {
                tokio::time::sleep(std::time::Duration::from_millis(
                    self.settings.retry_backoff_ms,
                ))
                .await;
            }
        }

        let source = last_error.unwrap_or_else(|| {
            DispatchError::Connection("no dispatch attempt executed".to_string())
        });

        if source.is_quota() {
            let domain = domain_of(to);
            warn!(domain, "quota-style failure, applying 1h domain cooldown");
            if let Err(err) = self
                .storage
                .set_domain_cooldown(&domain, Utc::now() + Duration::hours(1))
                .await
            {
                warn!(domain, error = %err, "failed to record quota cooldown");
            }
        }

        Err(TransportError::DeliveryFailed { attempts, source })
    }
}

/// Applies a rotation strategy to the (already priority-ordered) pool.
fn pick(pool: &[Transport], strategy: RotationStrategy) -> Option<&Transport> {
    if pool.is_empty() {
        return None;
    }
    match strategy {
        RotationStrategy::Random => {
            let idx = rand::rng().random_range(0..pool.len());
            pool.get(idx)
        }
        RotationStrategy::LeastUsed => pool.iter().min_by_key(|t| {
            (
                t.emails_sent,
                t.last_used_at.unwrap_or(DateTime::<Utc>::MIN_UTC),
            )
        }),
        RotationStrategy::RoundRobin => pool
            .iter()
            .min_by_key(|t| t.last_used_at.unwrap_or(DateTime::<Utc>::MIN_UTC)),
    }
}
