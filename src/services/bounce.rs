//! Bounce processor: parses inbound failure notifications, records them
//! idempotently, and escalates repeat offenders into suppression.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use mailparse::MailHeaderMap;
use thiserror::Error;
use tracing::{info, warn};

use crate::domain::{BounceRecord, BounceSeverity, RecipientId, SendRecord};

use super::domain_of;
use super::rate::{RateController, RateStorage};

/// Errors that can occur while processing a bounce notification.
#[derive(Debug, Error)]
pub enum BounceError {
    /// The raw message could not be parsed at all.
    #[error("malformed bounce message: {0}")]
    Malformed(String),

    /// Storage error.
    #[error("storage error: {0}")]
    Storage(String),
}

/// Result type for bounce operations.
pub type BounceResult<T> = Result<T, BounceError>;

/// Storage trait for bounce ingestion.
#[async_trait]
pub trait BounceStorage: Send + Sync {
    /// Most recent successful send to the given address.
    async fn latest_sent_to_email(&self, email: &str) -> BounceResult<Option<SendRecord>>;

    /// Records a bounce; returns false when one already exists for the send.
    async fn insert_bounce_if_new(&self, record: &BounceRecord) -> BounceResult<bool>;

    /// (total, hard) bounce counts for the recipient.
    async fn bounce_counts(&self, id: &RecipientId) -> BounceResult<(u64, u64)>;

    /// Marks a recipient as blocked with the given reason.
    async fn set_recipient_blocked(&self, id: &RecipientId, reason: &str) -> BounceResult<()>;

    /// Applies a domain cooldown.
    async fn set_domain_cooldown(&self, domain: &str, until: DateTime<Utc>) -> BounceResult<()>;

    /// Successful sends in the trailing window, over all recipients.
    async fn count_sent_since(&self, since: DateTime<Utc>) -> BounceResult<u64>;

    /// Bounces detected in the trailing window, over all recipients.
    async fn count_bounces_since(&self, since: DateTime<Utc>) -> BounceResult<u64>;
}

/// What happened to one ingested notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// A new bounce was recorded against the matched send.
    Recorded {
        severity: BounceSeverity,
        recipient_blocked: bool,
    },
    /// A bounce already existed for the matched send.
    Duplicate,
    /// No bounced address could be extracted from the notification.
    NoRecipient,
    /// The bounced address has no prior successful send on record.
    NoMatchingSend,
}

const HARD_MARKERS: &[&str] = &[
    "user unknown",
    "mailbox not found",
    "no such user",
    "address rejected",
    "invalid recipient",
    "permanent failure",
    "550",
    "551",
];

const SOFT_MARKERS: &[&str] = &[
    "mailbox full",
    "quota exceeded",
    "temporary failure",
    "try again later",
    "451",
    "452",
];

/// Parses delivery-status notifications and maintains bounce-derived state.
pub struct BounceProcessor<S: BounceStorage> {
    storage: S,
}

impl<S: BounceStorage> BounceProcessor<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Ingests one raw bounce notification.
    ///
    /// Idempotent per originating send: a second notification for the same
    /// send is ignored. A recipient is blocked on any hard bounce or on the
    /// second bounce of any kind, and a third bounce puts the whole domain
    /// in a seven-day cooldown.
    pub async fn ingest(&self, raw: &[u8]) -> BounceResult<IngestOutcome> {
        let parsed =
            mailparse::parse_mail(raw).map_err(|e| BounceError::Malformed(e.to_string()))?;
        let text = flatten_text(&parsed);

        let Some(email) = extract_bounced_address(&parsed, &text) else {
            warn!("bounce notification carries no recoverable recipient");
            return Ok(IngestOutcome::NoRecipient);
        };

        let Some(send) = self.storage.latest_sent_to_email(&email).await? else {
            warn!(email, "bounce for an address with no prior send");
            return Ok(IngestOutcome::NoMatchingSend);
        };

        let severity = classify(&text);
        let record = BounceRecord::new(send.id.clone(), severity);
        if !self.storage.insert_bounce_if_new(&record).await? {
            return Ok(IngestOutcome::Duplicate);
        }
        info!(email, severity = severity.as_str(), "bounce recorded");

        let (total, hard) = self.storage.bounce_counts(&send.recipient_id).await?;
        let mut recipient_blocked = false;
        if hard >= 1 || total >= 2 {
            let reason = if hard >= 1 {
                "hard bounce".to_string()
            } else {
                format!("{total} bounces")
            };
            self.storage
                .set_recipient_blocked(&send.recipient_id, &reason)
                .await?;
            recipient_blocked = true;
            info!(email, reason, "recipient blocked");
        }

        if total >= 3 {
            let domain = domain_of(&email);
            self.storage
                .set_domain_cooldown(&domain, Utc::now() + Duration::days(7))
                .await?;
            warn!(domain, "repeated bounces, domain cooled down for 7 days");
        }

        Ok(IngestOutcome::Recorded {
            severity,
            recipient_blocked,
        })
    }

    /// Ingests a notification, then re-derives the adaptive send limits from
    /// the trailing seven-day bounce rate.
    pub async fn ingest_and_adapt<R: RateStorage>(
        &self,
        raw: &[u8],
        rate: &RateController<R>,
    ) -> BounceResult<IngestOutcome> {
        let outcome = self.ingest(raw).await?;

        if matches!(outcome, IngestOutcome::Recorded { .. }) {
            let bounce_rate = self.trailing_bounce_rate().await?;
            rate.adapt(bounce_rate)
                .await
                .map_err(|e| BounceError::Storage(e.to_string()))?;
        }

        Ok(outcome)
    }

    /// Bounces divided by successful sends over the trailing seven days.
    pub async fn trailing_bounce_rate(&self) -> BounceResult<f64> {
        let since = Utc::now() - Duration::days(7);
        let sent = self.storage.count_sent_since(since).await?;
        if sent == 0 {
            return Ok(0.0);
        }
        let bounced = self.storage.count_bounces_since(since).await?;
        Ok(bounced as f64 / sent as f64)
    }
}

/// Classifies a notification's text, defaulting to hard for anything
/// unrecognized.
fn classify(text: &str) -> BounceSeverity {
    let text = text.to_lowercase();
    if HARD_MARKERS.iter().any(|m| text.contains(m)) {
        BounceSeverity::Hard
    } else if SOFT_MARKERS.iter().any(|m| text.contains(m)) {
        BounceSeverity::Soft
    } else {
        BounceSeverity::Hard
    }
}

/// Concatenates decoded bodies across all MIME parts.
fn flatten_text(mail: &mailparse::ParsedMail<'_>) -> String {
    let mut out = String::new();
    collect_bodies(mail, &mut out);
    out
}

fn collect_bodies(part: &mailparse::ParsedMail<'_>, out: &mut String) {
    if let Ok(body) = part.get_body() {
        out.push_str(&body);
        out.push('\n');
    }
    for sub in &part.subparts {
        collect_bodies(sub, out);
    }
}

/// Pulls the bounced address out of a notification, preferring the DSN
/// `Final-Recipient` field, then `Original-Recipient`, then the first
/// address-shaped token in the body.
fn extract_bounced_address(mail: &mailparse::ParsedMail<'_>, text: &str) -> Option<String> {
    for field in ["Final-Recipient", "Original-Recipient"] {
        if let Some(value) = find_dsn_field(mail, text, field) {
            return Some(value);
        }
    }
    first_address_token(text)
}

fn find_dsn_field(mail: &mailparse::ParsedMail<'_>, text: &str, field: &str) -> Option<String> {
    // message/delivery-status parts expose the per-recipient fields as
    // headers of the nested part.
    fn scan_parts(part: &mailparse::ParsedMail<'_>, field: &str) -> Option<String> {
        if let Some(value) = part.get_headers().get_first_value(field) {
            return parse_dsn_address(&value);
        }
        part.subparts.iter().find_map(|p| scan_parts(p, field))
    }
    if let Some(value) = scan_parts(mail, field) {
        return Some(value);
    }

    // Some relays inline the status block into a plain-text body.
    let needle = format!("{}:", field.to_lowercase());
    text.lines().find_map(|line| {
        let lower = line.to_lowercase();
        lower
            .starts_with(&needle)
            .then(|| parse_dsn_address(&line[needle.len()..]))
            .flatten()
    })
}

/// `Final-Recipient: rfc822; bob@acme.com` -> `bob@acme.com`
fn parse_dsn_address(value: &str) -> Option<String> {
    let addr = value.rsplit(';').next()?.trim();
    let addr = addr.trim_start_matches('<').trim_end_matches('>');
    addr.contains('@').then(|| addr.to_lowercase())
}

fn first_address_token(text: &str) -> Option<String> {
    text.split_whitespace()
        .map(|token| {
            token
                .trim_matches(|c: char| !c.is_alphanumeric() && c != '@' && c != '.' && c != '-')
        })
        .find(|token| {
            token
                .split_once('@')
                .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'))
        })
        .map(str::to_lowercase)
}
