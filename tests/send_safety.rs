//! End-to-end send-safety flow against a real (in-memory) SQLite store:
//! pipeline delivery, per-domain throttling, and bounce-driven suppression.

use async_trait::async_trait;
use pretty_assertions::assert_eq;

use outbound::config::{Settings, Strictness};
use outbound::domain::{DraftContext, ProbeResult, ScoreOutcome, Transport};
use outbound::providers::llm::{Critique, Draft, LlmResult, TextGenerator};
use outbound::providers::transport::{DispatchResult, MailBackend};
use outbound::providers::verify::{DeliverabilityProbe, ScoringVerifier, VerifyResult};
use outbound::services::{
    AcceptancePipeline, BounceProcessor, IngestOutcome, PipelineOutcome, Prospect, RateController,
};
use outbound::storage::SqliteStore;

struct StubGenerator;

#[async_trait]
impl TextGenerator for StubGenerator {
    async fn draft(&self, _context: &DraftContext) -> LlmResult<Draft> {
        Ok(Draft {
            subject: "Quick question".to_string(),
            body: "I noticed your team at Acme recently expanded its platform engineering \
                group. Many teams at that stage struggle to keep deployment pipelines stable. \
                We help companies cut release friction without adding headcount. Would you be \
                open to a short call next week?"
                .to_string(),
        })
    }

    async fn critique(
        &self,
        _context: &DraftContext,
        _draft: &Draft,
        _strictness: Strictness,
    ) -> LlmResult<Critique> {
        Ok(Critique {
            passed: true,
            score: 0.9,
            feedback: String::new(),
        })
    }

    async fn rewrite(
        &self,
        _context: &DraftContext,
        draft: &Draft,
        _feedback: &str,
    ) -> LlmResult<Draft> {
        Ok(draft.clone())
    }
}

struct AlwaysValidProbe;

#[async_trait]
impl DeliverabilityProbe for AlwaysValidProbe {
    async fn probe(&self, _email: &str) -> VerifyResult<ProbeResult> {
        Ok(ProbeResult::valid())
    }
}

struct SilentVerifier;

#[async_trait]
impl ScoringVerifier for SilentVerifier {
    async fn score(&self, _email: &str) -> VerifyResult<ScoreOutcome> {
        Ok(ScoreOutcome::not_usable())
    }
}

struct StubBackend;

#[async_trait]
impl MailBackend for StubBackend {
    async fn dispatch(
        &self,
        transport: &Transport,
        to: &str,
        _subject: &str,
        _body: &str,
    ) -> DispatchResult<String> {
        Ok(format!("msg-{}-{to}", transport.name))
    }
}

fn settings() -> Settings {
    let mut settings = Settings::default();
    settings.delivery.retry_backoff_ms = 0;
    settings
}

fn prospect(name: &str) -> Prospect {
    Prospect {
        name: name.to_string(),
        company: "Acme".to_string(),
        role: "VP Engineering".to_string(),
        domain: "acme.com".to_string(),
        ..Prospect::default()
    }
}

async fn store_with_transport() -> SqliteStore {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let transport = Transport::new("primary", "smtp.relay.test", 587, "u", "p", "out@me.com");
    store.add_transport(&transport).await.unwrap();
    store
}

fn pipeline(
    store: SqliteStore,
) -> AcceptancePipeline<SqliteStore, StubBackend, StubGenerator, AlwaysValidProbe, SilentVerifier> {
    AcceptancePipeline::new(
        store,
        StubBackend,
        StubGenerator,
        AlwaysValidProbe,
        SilentVerifier,
        settings(),
    )
}

fn bounce_dsn(email: &str, diagnostic: &str) -> Vec<u8> {
    format!(
        "From: MAILER-DAEMON@relay.test\r\n\
         To: out@me.com\r\n\
         Subject: Undelivered Mail Returned to Sender\r\n\
         \r\n\
         Final-Recipient: rfc822; {email}\r\n\
         Action: failed\r\n\
         Diagnostic-Code: smtp; {diagnostic}\r\n"
    )
    .into_bytes()
}

#[tokio::test]
async fn pipeline_delivers_and_persists_the_full_trail() {
    let store = store_with_transport().await;
    let pipeline = pipeline(store.clone());

    let outcome = pipeline.run(&prospect("John Smith")).await.unwrap();
    let PipelineOutcome::Delivered { delivery_id, .. } = outcome else {
        panic!("expected delivery, got {outcome:?}");
    };
    assert!(delivery_id.starts_with("msg-primary-"));

    // Audit trail: one allowed decision, no stored body.
    let decisions = store.recent_decisions(10).await.unwrap();
    assert_eq!(decisions.len(), 1);
    assert_eq!(decisions[0].decision.as_str(), "allowed");
    assert!(decisions[0].body.is_none());
}

#[tokio::test]
async fn domain_daily_cap_denies_the_fourth_send() {
    let store = store_with_transport().await;
    let pipeline = pipeline(store.clone());

    for name in ["John Smith", "Jane Doe", "Ada Lovelace"] {
        let outcome = pipeline.run(&prospect(name)).await.unwrap();
        assert!(
            matches!(outcome, PipelineOutcome::Delivered { .. }),
            "{name} should deliver"
        );
    }

    let outcome = pipeline.run(&prospect("Grace Hopper")).await.unwrap();
    let PipelineOutcome::Denied { reason } = outcome else {
        panic!("expected throttle denial, got {outcome:?}");
    };
    assert!(reason.contains("reached daily limit (3 emails/day)"), "{reason}");

    // Denied decisions persist the proposed body for review.
    let decisions = store.recent_decisions(10).await.unwrap();
    assert!(decisions[0].body.is_some());
}

#[tokio::test]
async fn hard_bounce_suppresses_the_recipient() {
    let store = store_with_transport().await;
    let pipeline = pipeline(store.clone());

    let outcome = pipeline.run(&prospect("John Smith")).await.unwrap();
    assert!(matches!(outcome, PipelineOutcome::Delivered { .. }));

    let processor = BounceProcessor::new(store.clone());
    let raw = bounce_dsn("john@acme.com", "550 5.1.1 user unknown");
    let outcome = processor.ingest(&raw).await.unwrap();
    assert!(matches!(
        outcome,
        IngestOutcome::Recorded {
            recipient_blocked: true,
            ..
        }
    ));

    // Re-ingestion is idempotent.
    assert_eq!(processor.ingest(&raw).await.unwrap(), IngestOutcome::Duplicate);

    // The next run for the same person is suppressed at the gate.
    let outcome = pipeline.run(&prospect("John Smith")).await.unwrap();
    let PipelineOutcome::Denied { reason } = outcome else {
        panic!("expected suppression, got {outcome:?}");
    };
    assert!(reason.contains("hard bounce"), "{reason}");
}

#[tokio::test]
async fn bounce_ingestion_feeds_the_rate_controller() {
    let store = store_with_transport().await;
    let pipeline = pipeline(store.clone());
    pipeline.run(&prospect("John Smith")).await.unwrap();

    let settings = settings();
    let rate = RateController::new(
        store.clone(),
        settings.sending.clone(),
        settings.delivery.fail_open_on_infra_error,
    );
    let processor = BounceProcessor::new(store.clone());

    let raw = bounce_dsn("john@acme.com", "550 5.1.1 user unknown");
    processor.ingest_and_adapt(&raw, &rate).await.unwrap();

    // First adaptation seeds the series; the observed rate is 1/1.
    let (per_hour, per_day) = rate.current_limits().await.unwrap();
    assert_eq!((per_hour, per_day), (10, 10));
    assert!(processor.trailing_bounce_rate().await.unwrap() > 0.9);

    // A second adaptation under the same bounce rate backs off.
    rate.adapt(processor.trailing_bounce_rate().await.unwrap())
        .await
        .unwrap();
    let (per_hour, per_day) = rate.current_limits().await.unwrap();
    assert_eq!((per_hour, per_day), (5, 5));
}
