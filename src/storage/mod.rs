//! SQLite persistence: connection handling, schema, table queries, and the
//! store handle that backs every service's storage trait.

pub mod database;
pub mod queries;
pub mod schema;

pub use database::{Database, DatabaseError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{
    BounceRecord, DomainThrottleState, EnrichmentSignal, RateState, Recipient, RecipientId,
    SendDecisionRecord, SendRecord, Transport, TransportId,
};
use crate::services::acceptance::{AcceptanceStorage, PipelineError, PipelineResult};
use crate::services::bounce::{BounceError, BounceResult, BounceStorage};
use crate::services::gate::{DecisionStorage, GateError, GateResult};
use crate::services::rate::{RateError, RateResult, RateStorage};
use crate::services::suppression::{SuppressionError, SuppressionResult, SuppressionStorage};
use crate::services::throttle::{ThrottleError, ThrottleResult, ThrottleStorage};
use crate::services::transport::{TransportError, TransportResult, TransportStorage};

/// Cloneable store handle passed to every service.
///
/// One handle per process; clones share the underlying connection.
#[derive(Clone)]
pub struct SqliteStore {
    db: Database,
}

impl SqliteStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Opens (and migrates) a store at the given path.
    pub async fn open(path: impl AsRef<std::path::Path>) -> database::Result<Self> {
        Ok(Self::new(Database::open(path).await?))
    }

    /// In-memory store, for tests.
    pub async fn open_in_memory() -> database::Result<Self> {
        Ok(Self::new(Database::open_in_memory().await?))
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Registers a transport in the rotation pool.
    pub async fn add_transport(&self, transport: &Transport) -> database::Result<()> {
        let transport = transport.clone();
        self.db
            .with_conn(move |conn| Ok(queries::transports::insert(conn, &transport)?))
            .await
    }

    /// Recent gate decisions, newest first.
    pub async fn recent_decisions(
        &self,
        limit: u32,
    ) -> database::Result<Vec<SendDecisionRecord>> {
        self.db
            .with_conn(move |conn| Ok(queries::decisions::list_recent(conn, limit)?))
            .await
    }
}

#[async_trait]
impl ThrottleStorage for SqliteStore {
    async fn domain_state(&self, domain: &str) -> ThrottleResult<Option<DomainThrottleState>> {
        let domain = domain.to_string();
        self.db
            .with_conn(move |conn| Ok(queries::throttle::find(conn, &domain)?))
            .await
            .map_err(|e| ThrottleError::Storage(e.to_string()))
    }

    async fn set_domain_cooldown(
        &self,
        domain: &str,
        until: DateTime<Utc>,
    ) -> ThrottleResult<()> {
        let domain = domain.to_string();
        self.db
            .with_conn(move |conn| Ok(queries::throttle::set_cooldown(conn, &domain, until)?))
            .await
            .map_err(|e| ThrottleError::Storage(e.to_string()))
    }

    async fn count_sent_to_domain_since(
        &self,
        domain: &str,
        since: DateTime<Utc>,
    ) -> ThrottleResult<u64> {
        let domain = domain.to_string();
        self.db
            .with_conn(move |conn| {
                Ok(queries::sends::count_sent_to_domain_since(conn, &domain, since)?)
            })
            .await
            .map_err(|e| ThrottleError::Storage(e.to_string()))
    }
}

#[async_trait]
impl SuppressionStorage for SqliteStore {
    async fn recipient_by_id(&self, id: &RecipientId) -> SuppressionResult<Option<Recipient>> {
        let id = id.clone();
        self.db
            .with_conn(move |conn| Ok(queries::recipients::find_by_id(conn, &id)?))
            .await
            .map_err(|e| SuppressionError::Storage(e.to_string()))
    }

    async fn recipient_by_email(&self, email: &str) -> SuppressionResult<Option<Recipient>> {
        let email = email.to_string();
        self.db
            .with_conn(move |conn| Ok(queries::recipients::find_by_email(conn, &email)?))
            .await
            .map_err(|e| SuppressionError::Storage(e.to_string()))
    }

    async fn bounce_counts(&self, id: &RecipientId) -> SuppressionResult<(u64, u64)> {
        let id = id.clone();
        self.db
            .with_conn(move |conn| Ok(queries::bounces::counts_for_recipient(conn, &id)?))
            .await
            .map_err(|e| SuppressionError::Storage(e.to_string()))
    }
}

#[async_trait]
impl RateStorage for SqliteStore {
    async fn latest_rate_state(&self) -> RateResult<Option<RateState>> {
        self.db
            .with_conn(|conn| Ok(queries::rate_states::latest(conn)?))
            .await
            .map_err(|e| RateError::Storage(e.to_string()))
    }

    async fn append_rate_state(&self, state: &RateState) -> RateResult<()> {
        let state = state.clone();
        self.db
            .with_conn(move |conn| Ok(queries::rate_states::insert(conn, &state)?))
            .await
            .map_err(|e| RateError::Storage(e.to_string()))
    }

    async fn count_sent_since(&self, since: DateTime<Utc>) -> RateResult<u64> {
        self.db
            .with_conn(move |conn| Ok(queries::sends::count_sent_since(conn, since)?))
            .await
            .map_err(|e| RateError::Storage(e.to_string()))
    }
}

#[async_trait]
impl DecisionStorage for SqliteStore {
    async fn record_decision(&self, record: &SendDecisionRecord) -> GateResult<()> {
        let record = record.clone();
        self.db
            .with_conn(move |conn| Ok(queries::decisions::insert(conn, &record)?))
            .await
            .map_err(|e| GateError::Storage(e.to_string()))
    }
}

#[async_trait]
impl TransportStorage for SqliteStore {
    async fn active_transports(&self) -> TransportResult<Vec<Transport>> {
        self.db
            .with_conn(|conn| Ok(queries::transports::active_pool(conn)?))
            .await
            .map_err(|e| TransportError::Storage(e.to_string()))
    }

    async fn record_transport_use(
        &self,
        id: &TransportId,
        at: DateTime<Utc>,
    ) -> TransportResult<()> {
        let id = id.clone();
        self.db
            .with_conn(move |conn| Ok(queries::transports::record_use(conn, &id, at)?))
            .await
            .map_err(|e| TransportError::Storage(e.to_string()))
    }

    async fn set_domain_cooldown(
        &self,
        domain: &str,
        until: DateTime<Utc>,
    ) -> TransportResult<()> {
        let domain = domain.to_string();
        self.db
            .with_conn(move |conn| Ok(queries::throttle::set_cooldown(conn, &domain, until)?))
            .await
            .map_err(|e| TransportError::Storage(e.to_string()))
    }
}

#[async_trait]
impl BounceStorage for SqliteStore {
    async fn latest_sent_to_email(&self, email: &str) -> BounceResult<Option<SendRecord>> {
        let email = email.to_string();
        self.db
            .with_conn(move |conn| Ok(queries::sends::latest_sent_to_email(conn, &email)?))
            .await
            .map_err(|e| BounceError::Storage(e.to_string()))
    }

    async fn insert_bounce_if_new(&self, record: &BounceRecord) -> BounceResult<bool> {
        let record = record.clone();
        self.db
            .with_conn(move |conn| Ok(queries::bounces::insert_if_new(conn, &record)?))
            .await
            .map_err(|e| BounceError::Storage(e.to_string()))
    }

    async fn bounce_counts(&self, id: &RecipientId) -> BounceResult<(u64, u64)> {
        let id = id.clone();
        self.db
            .with_conn(move |conn| Ok(queries::bounces::counts_for_recipient(conn, &id)?))
            .await
            .map_err(|e| BounceError::Storage(e.to_string()))
    }

    async fn set_recipient_blocked(&self, id: &RecipientId, reason: &str) -> BounceResult<()> {
        let id = id.clone();
        let reason = reason.to_string();
        self.db
            .with_conn(move |conn| Ok(queries::recipients::set_blocked(conn, &id, &reason)?))
            .await
            .map_err(|e| BounceError::Storage(e.to_string()))
    }

    async fn set_domain_cooldown(
        &self,
        domain: &str,
        until: DateTime<Utc>,
    ) -> BounceResult<()> {
        let domain = domain.to_string();
        self.db
            .with_conn(move |conn| Ok(queries::throttle::set_cooldown(conn, &domain, until)?))
            .await
            .map_err(|e| BounceError::Storage(e.to_string()))
    }

    async fn count_sent_since(&self, since: DateTime<Utc>) -> BounceResult<u64> {
        self.db
            .with_conn(move |conn| Ok(queries::sends::count_sent_since(conn, since)?))
            .await
            .map_err(|e| BounceError::Storage(e.to_string()))
    }

    async fn count_bounces_since(&self, since: DateTime<Utc>) -> BounceResult<u64> {
        self.db
            .with_conn(move |conn| Ok(queries::bounces::count_since(conn, since)?))
            .await
            .map_err(|e| BounceError::Storage(e.to_string()))
    }
}

#[async_trait]
impl AcceptanceStorage for SqliteStore {
    async fn find_recipient_by_email(&self, email: &str) -> PipelineResult<Option<Recipient>> {
        let email = email.to_string();
        self.db
            .with_conn(move |conn| Ok(queries::recipients::find_by_email(conn, &email)?))
            .await
            .map_err(|e| PipelineError::Storage(e.to_string()))
    }

    async fn insert_recipient(&self, recipient: &Recipient) -> PipelineResult<()> {
        let recipient = recipient.clone();
        self.db
            .with_conn(move |conn| Ok(queries::recipients::insert(conn, &recipient)?))
            .await
            .map_err(|e| PipelineError::Storage(e.to_string()))
    }

    async fn insert_signals(
        &self,
        id: &RecipientId,
        signals: &[EnrichmentSignal],
    ) -> PipelineResult<()> {
        let id = id.clone();
        let signals = signals.to_vec();
        self.db
            .with_conn(move |conn| {
                for signal in &signals {
                    queries::signals::insert(conn, &id, signal)?;
                }
                Ok(())
            })
            .await
            .map_err(|e| PipelineError::Storage(e.to_string()))
    }

    async fn insert_send_record(&self, record: &SendRecord) -> PipelineResult<()> {
        let record = record.clone();
        self.db
            .with_conn(move |conn| Ok(queries::sends::insert(conn, &record)?))
            .await
            .map_err(|e| PipelineError::Storage(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BounceSeverity, ValidationStatus};
    use chrono::Duration;

    async fn store() -> SqliteStore {
        SqliteStore::open_in_memory().await.unwrap()
    }

    fn recipient(email: &str) -> Recipient {
        Recipient::new("John Smith", "Acme", email, 0.9, ValidationStatus::Valid)
    }

    #[tokio::test]
    async fn throttle_storage_roundtrip() {
        let store = store().await;
        assert!(ThrottleStorage::domain_state(&store, "acme.com")
            .await
            .unwrap()
            .is_none());

        let until = Utc::now() + Duration::hours(1);
        ThrottleStorage::set_domain_cooldown(&store, "acme.com", until)
            .await
            .unwrap();

        let state = ThrottleStorage::domain_state(&store, "acme.com")
            .await
            .unwrap()
            .unwrap();
        assert!(state.in_cooldown(Utc::now()));
    }

    #[tokio::test]
    async fn suppression_storage_reads_recipients_and_bounces() {
        let store = store().await;
        let r = recipient("bob@acme.com");
        store.insert_recipient(&r).await.unwrap();

        let found = store
            .recipient_by_email("bob@acme.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, r.id);

        let send = SendRecord::delivered(r.id.clone(), None, "msg-1", "Hi", "Body");
        store.insert_send_record(&send).await.unwrap();
        store
            .insert_bounce_if_new(&BounceRecord::new(send.id.clone(), BounceSeverity::Hard))
            .await
            .unwrap();

        let (total, hard) = SuppressionStorage::bounce_counts(&store, &r.id).await.unwrap();
        assert_eq!((total, hard), (1, 1));
    }

    #[tokio::test]
    async fn bounce_dedup_is_enforced_by_the_store() {
        let store = store().await;
        let r = recipient("bob@acme.com");
        store.insert_recipient(&r).await.unwrap();
        let send = SendRecord::delivered(r.id.clone(), None, "msg-1", "Hi", "Body");
        store.insert_send_record(&send).await.unwrap();

        let first = BounceRecord::new(send.id.clone(), BounceSeverity::Soft);
        let second = BounceRecord::new(send.id.clone(), BounceSeverity::Hard);
        assert!(store.insert_bounce_if_new(&first).await.unwrap());
        assert!(!store.insert_bounce_if_new(&second).await.unwrap());
    }

    #[tokio::test]
    async fn rate_storage_appends_and_reads_latest() {
        let store = store().await;
        assert!(store.latest_rate_state().await.unwrap().is_none());

        store
            .append_rate_state(&RateState::seed())
            .await
            .unwrap();
        let mut next = RateState::seed();
        next.emails_per_day = 15;
        store.append_rate_state(&next).await.unwrap();

        let latest = store.latest_rate_state().await.unwrap().unwrap();
        assert_eq!(latest.emails_per_day, 15);
    }

    #[tokio::test]
    async fn transport_pool_and_usage() {
        let store = store().await;
        let t = Transport::new("primary", "smtp.acme.com", 587, "u", "p", "out@me.com");
        store.add_transport(&t).await.unwrap();

        let pool = store.active_transports().await.unwrap();
        assert_eq!(pool.len(), 1);
        assert_eq!(pool[0].emails_sent, 0);

        store
            .record_transport_use(&t.id, Utc::now())
            .await
            .unwrap();
        let pool = store.active_transports().await.unwrap();
        assert_eq!(pool[0].emails_sent, 1);
        assert!(pool[0].last_used_at.is_some());
    }

    #[tokio::test]
    async fn decisions_are_listed_newest_first() {
        let store = store().await;
        let r = recipient("bob@acme.com");
        store
            .record_decision(&SendDecisionRecord::allowed(
                Some(r.id.clone()),
                "bob@acme.com",
            ))
            .await
            .unwrap();

        let decisions = store.recent_decisions(10).await.unwrap();
        assert_eq!(decisions.len(), 1);
        assert_eq!(decisions[0].email, "bob@acme.com");
    }
}
