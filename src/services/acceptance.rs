//! Acceptance pipeline: candidate generation, two-verifier deliverability
//! checks, drafting with a critic loop, a pre-send quality gate, and finally
//! the authorized handoff to a transport.

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::domain::{
    generate_candidates, select_evidence, DraftContext, EnrichmentSignal, ProbeStatus, Recipient,
    RecipientId, SendRecord, ValidationStatus,
};
use crate::providers::llm::{Draft, TextGenerator};
use crate::providers::transport::MailBackend;
use crate::providers::verify::{DeliverabilityProbe, ScoringVerifier};

use super::gate::{DecisionStorage, GateError, SendGate};
use super::rate::RateStorage;
use super::suppression::SuppressionStorage;
use super::throttle::ThrottleStorage;
use super::transport::{SelectedTransport, TransportError, TransportRouter, TransportStorage};

/// Errors that can occur while running the pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Gate(#[from] GateError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Storage error.
    #[error("storage error: {0}")]
    Storage(String),
}

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Storage trait for the pipeline's own reads and writes.
#[async_trait]
pub trait AcceptanceStorage: Send + Sync {
    /// Existing recipient for an address, if one was promoted before.
    async fn find_recipient_by_email(&self, email: &str) -> PipelineResult<Option<Recipient>>;

    /// Persists a newly promoted recipient.
    async fn insert_recipient(&self, recipient: &Recipient) -> PipelineResult<()>;

    /// Attaches enrichment signals to a recipient.
    async fn insert_signals(
        &self,
        id: &RecipientId,
        signals: &[EnrichmentSignal],
    ) -> PipelineResult<()>;

    /// Persists one delivery attempt.
    async fn insert_send_record(&self, record: &SendRecord) -> PipelineResult<()>;
}

/// One person to run the pipeline for, with whatever enrichment exists.
#[derive(Debug, Clone, Default)]
pub struct Prospect {
    pub name: String,
    pub company: String,
    pub role: String,
    /// Company web domain; candidates are generated against it.
    pub domain: String,
    pub signals: Vec<EnrichmentSignal>,
    pub campaign_name: Option<String>,
    pub campaign_offer: Option<String>,
}

/// Where a pipeline run is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    CandidatesGenerated,
    Verifying,
    Chosen,
    Rejected,
    Drafted,
    Critiqued,
    Accepted,
    Discarded,
}

/// Terminal result of one pipeline run.
#[derive(Debug, Clone)]
pub enum PipelineOutcome {
    /// The message was handed off to a transport.
    Delivered {
        recipient_id: RecipientId,
        delivery_id: String,
    },
    /// No candidate address survived verification.
    NoCandidate,
    /// The send gate denied the send; the decision is in the audit log.
    Denied { reason: String },
    /// The draft failed the pre-send quality gate or could not be produced.
    Discarded { reason: String },
    /// Dispatch failed after retries; a failed send record exists.
    Failed { reason: String },
}

/// A verified candidate ready for promotion to a recipient.
#[derive(Debug, Clone, PartialEq)]
pub struct ChosenCandidate {
    pub email: String,
    pub pattern: String,
    pub status: ValidationStatus,
    pub confidence: f64,
}

const HYPE_WORDS: &[&str] = &[
    "amazing",
    "incredible",
    "guaranteed",
    "best",
    "top",
    "perfect",
    "revolutionary",
];

const LINK_MARKERS: &[&str] = &["http://", "https://", "www."];

const MIN_WORDS: usize = 30;
const MAX_WORDS: usize = 100;
const MIN_SENTENCES: usize = 3;
const MAX_SENTENCES: usize = 5;

/// Drives one person from candidate addresses to a delivered (or discarded)
/// message.
pub struct AcceptancePipeline<S, B, G, P, V>
where
    S: AcceptanceStorage
        + ThrottleStorage
        + SuppressionStorage
        + RateStorage
        + DecisionStorage
        + TransportStorage
        + Clone,
    B: MailBackend,
    G: TextGenerator,
    P: DeliverabilityProbe,
    V: ScoringVerifier,
{
    storage: S,
    gate: SendGate<S>,
    router: TransportRouter<S, B>,
    generator: G,
    probe: P,
    verifier: V,
    settings: Settings,
}

impl<S, B, G, P, V> AcceptancePipeline<S, B, G, P, V>
where
    S: AcceptanceStorage
        + ThrottleStorage
        + SuppressionStorage
        + RateStorage
        + DecisionStorage
        + TransportStorage
        + Clone,
    B: MailBackend,
    G: TextGenerator,
    P: DeliverabilityProbe,
    V: ScoringVerifier,
{
    pub fn new(storage: S, backend: B, generator: G, probe: P, verifier: V, settings: Settings) -> Self {
        let gate = SendGate::new(storage.clone(), settings.sending.clone(), &settings.delivery);
        let router = TransportRouter::new(
            storage.clone(),
            backend,
            settings.sending.rotation_strategy,
            settings.delivery.clone(),
        );
        Self {
            storage,
            gate,
            router,
            generator,
            probe,
            verifier,
            settings,
        }
    }

    /// Runs the full state machine for one prospect.
    pub async fn run(&self, prospect: &Prospect) -> PipelineResult<PipelineOutcome> {
        let mut state = PipelineState::CandidatesGenerated;
        debug!(name = %prospect.name, domain = %prospect.domain, ?state, "pipeline started");

        state = PipelineState::Verifying;
        let Some(chosen) = self.verify_candidates(&prospect.name, &prospect.domain).await else {
            state = PipelineState::Rejected;
            info!(name = %prospect.name, ?state, "no candidate survived verification");
            return Ok(PipelineOutcome::NoCandidate);
        };
        state = PipelineState::Chosen;
        debug!(email = %chosen.email, pattern = %chosen.pattern, ?state, "candidate chosen");

        let recipient = self.promote(prospect, &chosen).await?;

        let evidence = select_evidence(
            &prospect.signals,
            self.settings.verification.min_signal_confidence,
        );
        let context = DraftContext {
            recipient_id: Some(recipient.id.clone()),
            name: prospect.name.clone(),
            company: prospect.company.clone(),
            role: prospect.role.clone(),
            campaign_name: prospect.campaign_name.clone(),
            campaign_offer: prospect.campaign_offer.clone(),
            signals: evidence,
        };

        let draft = match self.generator.draft(&context).await {
            Ok(draft) => draft,
            Err(err) => {
                state = PipelineState::Discarded;
                warn!(error = %err, ?state, "draft generation failed");
                return Ok(PipelineOutcome::Discarded {
                    reason: format!("draft generation failed: {err}"),
                });
            }
        };
        state = PipelineState::Drafted;
        debug!(subject = %draft.subject, ?state, "draft produced");

        let draft = self.critique_loop(&context, draft).await;
        state = PipelineState::Critiqued;

        if let Err(reason) = quality_check(&draft.body) {
            state = PipelineState::Discarded;
            info!(email = %recipient.email, reason, ?state, "draft failed quality gate");
            return Ok(PipelineOutcome::Discarded { reason });
        }

        let outcome = self.deliver(&recipient, &draft).await?;
        state = match outcome {
            PipelineOutcome::Delivered { .. } => PipelineState::Accepted,
            _ => PipelineState::Discarded,
        };
        debug!(email = %recipient.email, ?state, "pipeline finished");
        Ok(outcome)
    }

    /// Walks generated candidates in order, applying the verifier precedence
    /// policy: probe-invalid discards, a scoring confirmation accepts
    /// immediately, a probe-valid stops the scan, and a probe-unknown is held
    /// tentatively while better candidates are still possible.
    pub async fn verify_candidates(&self, name: &str, domain: &str) -> Option<ChosenCandidate> {
        let candidates = generate_candidates(name, domain);
        let mut tentative: Option<ChosenCandidate> = None;

        for candidate in candidates {
            let probe = match self.probe.probe(&candidate.email).await {
                Ok(result) => result,
                Err(err) => {
                    warn!(email = %candidate.email, error = %err, "probe failed, treating as unknown");
                    crate::domain::ProbeResult::unknown()
                }
            };

            if probe.status == ProbeStatus::Invalid {
                debug!(email = %candidate.email, "probe rejected candidate");
                continue;
            }

            let score = match self.verifier.score(&candidate.email).await {
                Ok(outcome) => outcome,
                Err(err) => {
                    warn!(email = %candidate.email, error = %err, "scoring verifier failed");
                    crate::domain::ScoreOutcome::not_usable()
                }
            };

            if score.accepts() {
                return Some(ChosenCandidate {
                    email: candidate.email,
                    pattern: candidate.pattern,
                    status: ValidationStatus::Valid,
                    confidence: probe.confidence.max(score.normalized_score()),
                });
            }

            if probe.status == ProbeStatus::Valid {
                return Some(ChosenCandidate {
                    email: candidate.email,
                    pattern: candidate.pattern,
                    status: ValidationStatus::Valid,
                    confidence: probe.confidence,
                });
            }
            if tentative.is_none() {
                tentative = Some(ChosenCandidate {
                    email: candidate.email,
                    pattern: candidate.pattern,
                    status: ValidationStatus::Unknown,
                    confidence: probe.confidence,
                });
            }
        }

        if self.settings.verification.require_valid {
            if let Some(t) = &tentative {
                debug!(email = %t.email, "discarding tentative unknown, valid required");
            }
            return None;
        }
        tentative
    }

    /// Finds or creates the recipient for a chosen candidate and attaches the
    /// prospect's signals.
    async fn promote(
        &self,
        prospect: &Prospect,
        chosen: &ChosenCandidate,
    ) -> PipelineResult<Recipient> {
        if let Some(existing) = self.storage.find_recipient_by_email(&chosen.email).await? {
            return Ok(existing);
        }

        let recipient = Recipient::new(
            &prospect.name,
            &prospect.company,
            &chosen.email,
            chosen.confidence,
            chosen.status,
        )
        .with_role(&prospect.role);
        self.storage.insert_recipient(&recipient).await?;
        if !prospect.signals.is_empty() {
            self.storage
                .insert_signals(&recipient.id, &prospect.signals)
                .await?;
        }
        info!(email = %recipient.email, confidence = recipient.confidence, "recipient promoted");
        Ok(recipient)
    }

    /// Critic loop: at most `max_rewrites` rewrite calls, terminating early
    /// on the first passing critique. Critic unavailability passes the
    /// current draft through unchanged.
    async fn critique_loop(&self, context: &DraftContext, mut draft: Draft) -> Draft {
        let critic = &self.settings.critic;
        if !critic.enabled {
            return draft;
        }

        for attempt in 0..=critic.max_rewrites {
            let critique = match self
                .generator
                .critique(context, &draft, critic.strictness)
                .await
            {
                Ok(critique) => critique,
                Err(err) => {
                    warn!(error = %err, "critic unavailable, passing draft through");
                    return draft;
                }
            };

            if critique.passed || critique.score >= f64::from(critic.min_score) {
                debug!(score = critique.score, attempt, "critic passed draft");
                return draft;
            }
            if attempt == critic.max_rewrites {
                debug!(score = critique.score, "rewrite budget exhausted, keeping last draft");
                return draft;
            }

            debug!(score = critique.score, feedback = %critique.feedback, "requesting rewrite");
            match self
                .generator
                .rewrite(context, &draft, &critique.feedback)
                .await
            {
                Ok(rewritten) => draft = rewritten,
                Err(err) => {
                    warn!(error = %err, "rewrite failed, keeping current draft");
                    return draft;
                }
            }
        }
        draft
    }

    /// Authorizes and dispatches one draft: select a transport, run the send
    /// gate for that path, dispatch, and record the attempt. A failed pool
    /// dispatch falls back to the direct channel, which gets its own gate
    /// evaluation.
    async fn deliver(&self, recipient: &Recipient, draft: &Draft) -> PipelineResult<PipelineOutcome> {
        let selected = self.router.select_transport().await?;
        match self.try_path(recipient, draft, &selected).await? {
            PathResult::Delivered(outcome) => Ok(outcome),
            PathResult::Denied(reason) => Ok(PipelineOutcome::Denied { reason }),
            PathResult::DispatchFailed(primary_reason) => {
                // A failed pool dispatch can still go out via the direct
                // channel, under a fresh gate decision for that path.
                let fallback = match &selected {
                    SelectedTransport::Pool(_) => self.router.fallback_path(),
                    SelectedTransport::Fallback(_) => None,
                };
                let Some(fallback) = fallback else {
                    self.record_failure(recipient, draft).await?;
                    return Ok(PipelineOutcome::Failed {
                        reason: primary_reason,
                    });
                };

                warn!(email = %recipient.email, "retrying via direct channel");
                match self.try_path(recipient, draft, &fallback).await? {
                    PathResult::Delivered(outcome) => Ok(outcome),
                    PathResult::Denied(reason) => Ok(PipelineOutcome::Denied { reason }),
                    PathResult::DispatchFailed(reason) => {
                        self.record_failure(recipient, draft).await?;
                        Ok(PipelineOutcome::Failed { reason })
                    }
                }
            }
        }
    }

    async fn try_path(
        &self,
        recipient: &Recipient,
        draft: &Draft,
        selected: &SelectedTransport,
    ) -> PipelineResult<PathResult> {
        let decision = self.gate.decide(recipient, &draft.body).await?;
        if !decision.allowed {
            let reason = decision.reason.unwrap_or_else(|| "denied".to_string());
            return Ok(PathResult::Denied(reason));
        }

        match self
            .router
            .send(selected, &recipient.email, &draft.subject, &draft.body)
            .await
        {
            Ok(delivery_id) => {
                let transport_id = match selected {
                    SelectedTransport::Pool(t) => Some(t.id.clone()),
                    SelectedTransport::Fallback(_) => None,
                };
                let record = SendRecord::delivered(
                    recipient.id.clone(),
                    transport_id,
                    delivery_id.clone(),
                    &draft.subject,
                    &draft.body,
                );
                self.storage.insert_send_record(&record).await?;
                Ok(PathResult::Delivered(PipelineOutcome::Delivered {
                    recipient_id: recipient.id.clone(),
                    delivery_id,
                }))
            }
            Err(TransportError::DeliveryFailed { source, .. }) => {
                Ok(PathResult::DispatchFailed(source.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn record_failure(&self, recipient: &Recipient, draft: &Draft) -> PipelineResult<()> {
        let record = SendRecord::failed(recipient.id.clone(), &draft.subject, &draft.body);
        self.storage.insert_send_record(&record).await
    }
}

enum PathResult {
    Delivered(PipelineOutcome),
    Denied(String),
    DispatchFailed(String),
}

/// Pre-send quality gate. Violations are terminal for the draft.
pub fn quality_check(body: &str) -> Result<(), String> {
    let words = body.split_whitespace().count();
    if words < MIN_WORDS {
        return Err(format!("too short ({words} words, minimum {MIN_WORDS})"));
    }
    if words > MAX_WORDS {
        return Err(format!("too long ({words} words, maximum {MAX_WORDS})"));
    }

    let sentences = body
        .split(['.', '!', '?'])
        .filter(|s| !s.trim().is_empty())
        .count();
    if !(MIN_SENTENCES..=MAX_SENTENCES).contains(&sentences) {
        return Err(format!(
            "sentence count {sentences} outside {MIN_SENTENCES}-{MAX_SENTENCES}"
        ));
    }

    let lower = body.to_lowercase();
    for word in lower
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
    {
        if HYPE_WORDS.contains(&word) {
            return Err(format!("contains hype word \"{word}\""));
        }
    }

    for marker in LINK_MARKERS {
        if lower.contains(marker) {
            return Err("links are not allowed".to_string());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        DomainThrottleState, ProbeResult, RateState, ScoreOutcome, ScoreResult,
        SendDecisionRecord, Transport, TransportId,
    };
    use crate::providers::llm::{Critique, LlmError, LlmResult};
    use crate::providers::transport::{DispatchError, DispatchResult};
    use crate::providers::verify::VerifyResult;
    use crate::services::gate::GateResult;
    use crate::services::rate::RateResult;
    use crate::services::suppression::SuppressionResult;
    use crate::services::throttle::ThrottleResult;
    use crate::services::transport::TransportResult;
    use chrono::{DateTime, Utc};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct MockStorage {
        recipients: Arc<Mutex<Vec<Recipient>>>,
        sends: Arc<Mutex<Vec<SendRecord>>>,
        signals: Arc<Mutex<HashMap<String, Vec<EnrichmentSignal>>>>,
        decisions: Arc<Mutex<Vec<SendDecisionRecord>>>,
        transports: Arc<Mutex<Vec<Transport>>>,
        sent_count: Arc<Mutex<u64>>,
    }

    #[async_trait]
    impl AcceptanceStorage for MockStorage {
        async fn find_recipient_by_email(
            &self,
            email: &str,
        ) -> PipelineResult<Option<Recipient>> {
            Ok(self
                .recipients
                .lock()
                .unwrap()
                .iter()
                .find(|r| r.email == email)
                .cloned())
        }

        async fn insert_recipient(&self, recipient: &Recipient) -> PipelineResult<()> {
            self.recipients.lock().unwrap().push(recipient.clone());
            Ok(())
        }

        async fn insert_signals(
            &self,
            id: &RecipientId,
            signals: &[EnrichmentSignal],
        ) -> PipelineResult<()> {
            self.signals
                .lock()
                .unwrap()
                .insert(id.to_string(), signals.to_vec());
            Ok(())
        }

        async fn insert_send_record(&self, record: &SendRecord) -> PipelineResult<()> {
            self.sends.lock().unwrap().push(record.clone());
            Ok(())
        }
    }

    #[async_trait]
    impl ThrottleStorage for MockStorage {
        async fn domain_state(
            &self,
            _domain: &str,
        ) -> ThrottleResult<Option<DomainThrottleState>> {
            Ok(None)
        }

        async fn set_domain_cooldown(
            &self,
            _domain: &str,
            _until: DateTime<Utc>,
        ) -> ThrottleResult<()> {
            Ok(())
        }

        async fn count_sent_to_domain_since(
            &self,
            _domain: &str,
            _since: DateTime<Utc>,
        ) -> ThrottleResult<u64> {
            Ok(0)
        }
    }

    #[async_trait]
    impl SuppressionStorage for MockStorage {
        async fn recipient_by_id(&self, id: &RecipientId) -> SuppressionResult<Option<Recipient>> {
            Ok(self
                .recipients
                .lock()
                .unwrap()
                .iter()
                .find(|r| &r.id == id)
                .cloned())
        }

        async fn recipient_by_email(&self, email: &str) -> SuppressionResult<Option<Recipient>> {
            Ok(self
                .recipients
                .lock()
                .unwrap()
                .iter()
                .find(|r| r.email == email)
                .cloned())
        }

        async fn bounce_counts(&self, _id: &RecipientId) -> SuppressionResult<(u64, u64)> {
            Ok((0, 0))
        }
    }

    #[async_trait]
    impl RateStorage for MockStorage {
        async fn latest_rate_state(&self) -> RateResult<Option<RateState>> {
            Ok(None)
        }

        async fn append_rate_state(&self, _state: &RateState) -> RateResult<()> {
            Ok(())
        }

        async fn count_sent_since(&self, _since: DateTime<Utc>) -> RateResult<u64> {
            Ok(*self.sent_count.lock().unwrap())
        }
    }

    #[async_trait]
    impl DecisionStorage for MockStorage {
        async fn record_decision(&self, record: &SendDecisionRecord) -> GateResult<()> {
            self.decisions.lock().unwrap().push(record.clone());
            Ok(())
        }
    }

    #[async_trait]
    impl TransportStorage for MockStorage {
        async fn active_transports(&self) -> TransportResult<Vec<Transport>> {
            Ok(self.transports.lock().unwrap().clone())
        }

        async fn record_transport_use(
            &self,
            _id: &TransportId,
            _at: DateTime<Utc>,
        ) -> TransportResult<()> {
            Ok(())
        }

        async fn set_domain_cooldown(
            &self,
            _domain: &str,
            _until: DateTime<Utc>,
        ) -> TransportResult<()> {
            Ok(())
        }
    }

    struct MockGenerator {
        body: String,
        fail_draft: bool,
        fail_critic: bool,
        passes_after: u32,
        critiques: AtomicU32,
        rewrites: AtomicU32,
    }

    impl MockGenerator {
        fn passing(body: &str) -> Self {
            Self {
                body: body.to_string(),
                fail_draft: false,
                fail_critic: false,
                passes_after: 0,
                critiques: AtomicU32::new(0),
                rewrites: AtomicU32::new(0),
            }
        }

        fn never_passing(body: &str) -> Self {
            Self {
                passes_after: u32::MAX,
                ..Self::passing(body)
            }
        }
    }

    #[async_trait]
    impl TextGenerator for MockGenerator {
        async fn draft(&self, _context: &DraftContext) -> LlmResult<Draft> {
            if self.fail_draft {
                return Err(LlmError::InvalidResponse("no draft".into()));
            }
            Ok(Draft {
                subject: "Quick question".to_string(),
                body: self.body.clone(),
            })
        }

        async fn critique(
            &self,
            _context: &DraftContext,
            _draft: &Draft,
            _strictness: crate::config::Strictness,
        ) -> LlmResult<Critique> {
            if self.fail_critic {
                return Err(LlmError::InvalidResponse("no critique".into()));
            }
            let n = self.critiques.fetch_add(1, Ordering::SeqCst);
            let passed = n >= self.passes_after;
            Ok(Critique {
                passed,
                score: if passed { 0.9 } else { 0.2 },
                feedback: "tighten the opening".to_string(),
            })
        }

        async fn rewrite(
            &self,
            _context: &DraftContext,
            draft: &Draft,
            _feedback: &str,
        ) -> LlmResult<Draft> {
            self.rewrites.fetch_add(1, Ordering::SeqCst);
            Ok(draft.clone())
        }
    }

    struct MockProbe {
        results: HashMap<String, ProbeResult>,
    }

    impl MockProbe {
        fn all_unknown() -> Self {
            Self {
                results: HashMap::new(),
            }
        }

        fn with(mut self, email: &str, result: ProbeResult) -> Self {
            self.results.insert(email.to_string(), result);
            self
        }
    }

    #[async_trait]
    impl DeliverabilityProbe for MockProbe {
        async fn probe(&self, email: &str) -> VerifyResult<ProbeResult> {
            Ok(self
                .results
                .get(email)
                .copied()
                .unwrap_or_else(ProbeResult::unknown))
        }
    }

    struct MockVerifier {
        confirms: Option<String>,
    }

    impl MockVerifier {
        fn silent() -> Self {
            Self { confirms: None }
        }

        fn confirming(email: &str) -> Self {
            Self {
                confirms: Some(email.to_string()),
            }
        }
    }

    #[async_trait]
    impl ScoringVerifier for MockVerifier {
        async fn score(&self, email: &str) -> VerifyResult<ScoreOutcome> {
            if self.confirms.as_deref() == Some(email) {
                return Ok(ScoreOutcome {
                    usable: true,
                    result: ScoreResult::Deliverable,
                    score: Some(97),
                });
            }
            Ok(ScoreOutcome::not_usable())
        }
    }

    struct MockBackend {
        fail: bool,
    }

    #[async_trait]
    impl MailBackend for MockBackend {
        async fn dispatch(
            &self,
            transport: &Transport,
            _to: &str,
            _subject: &str,
            _body: &str,
        ) -> DispatchResult<String> {
            if self.fail {
                return Err(DispatchError::Connection("refused".into()));
            }
            Ok(format!("msg-via-{}", transport.name))
        }
    }

    const GOOD_BODY: &str = "I noticed your team at Acme recently expanded its platform \
        engineering group. Many teams at that stage struggle to keep deployment pipelines \
        stable. We help companies cut release friction without adding headcount. Would you \
        be open to a short call next week?";

    fn settings() -> Settings {
        let mut settings = Settings::default();
        settings.delivery.retry_backoff_ms = 0;
        settings.verification.require_valid = true;
        settings
    }

    fn prospect() -> Prospect {
        Prospect {
            name: "John Smith".to_string(),
            company: "Acme".to_string(),
            role: "VP Engineering".to_string(),
            domain: "acme.com".to_string(),
            ..Prospect::default()
        }
    }

    fn pipeline(
        storage: MockStorage,
        backend: MockBackend,
        generator: MockGenerator,
        probe: MockProbe,
        verifier: MockVerifier,
        settings: Settings,
    ) -> AcceptancePipeline<MockStorage, MockBackend, MockGenerator, MockProbe, MockVerifier> {
        AcceptancePipeline::new(storage, backend, generator, probe, verifier, settings)
    }

    fn with_transport(storage: &MockStorage) {
        storage
            .transports
            .lock()
            .unwrap()
            .push(Transport::new("primary", "smtp.acme.com", 587, "u", "p", "out@me.com"));
    }

    #[test]
    fn quality_gate_enforces_word_band() {
        assert!(quality_check(GOOD_BODY).is_ok());

        let err = quality_check("Quick note. Call me. Thanks a lot.").unwrap_err();
        assert!(err.starts_with("too short"), "{err}");

        let long = "word ".repeat(120) + ". second. third.";
        assert!(quality_check(&long).unwrap_err().starts_with("too long"));
    }

    #[test]
    fn quality_gate_rejects_hype_and_links() {
        let hyped = GOOD_BODY.replace("short call", "amazing call");
        assert!(quality_check(&hyped).unwrap_err().contains("amazing"));

        let linked = GOOD_BODY.replace("next week", "at www.example.com");
        assert_eq!(quality_check(&linked).unwrap_err(), "links are not allowed");
    }

    #[test]
    fn quality_gate_enforces_sentence_band() {
        let two = "This is the first of two sentences and it runs long enough to clear \
            the thirty word floor for the check. This second sentence also carries \
            plenty of words to keep the total well above that same floor.";
        assert!(quality_check(two).unwrap_err().contains("sentence count 2"));
    }

    #[tokio::test]
    async fn probe_invalid_is_skipped_and_scan_stops_on_valid() {
        let probe = MockProbe::all_unknown()
            .with("john@acme.com", ProbeResult::invalid())
            .with("johnsmith@acme.com", ProbeResult::invalid())
            .with("john.smith@acme.com", ProbeResult::valid());
        let p = pipeline(
            MockStorage::default(),
            MockBackend { fail: false },
            MockGenerator::passing(GOOD_BODY),
            probe,
            MockVerifier::silent(),
            settings(),
        );

        let chosen = p.verify_candidates("John Smith", "acme.com").await.unwrap();
        assert_eq!(chosen.email, "john.smith@acme.com");
        assert_eq!(chosen.status, ValidationStatus::Valid);
        assert!((chosen.confidence - 0.9).abs() < 1e-9);
    }

    #[tokio::test]
    async fn scoring_confirmation_accepts_with_max_confidence() {
        let p = pipeline(
            MockStorage::default(),
            MockBackend { fail: false },
            MockGenerator::passing(GOOD_BODY),
            MockProbe::all_unknown(),
            MockVerifier::confirming("john@acme.com"),
            settings(),
        );

        let chosen = p.verify_candidates("John Smith", "acme.com").await.unwrap();
        assert_eq!(chosen.email, "john@acme.com");
        assert_eq!(chosen.status, ValidationStatus::Valid);
        // max(probe unknown 0.5, score 97/100)
        assert!((chosen.confidence - 0.97).abs() < 1e-9);
    }

    #[tokio::test]
    async fn tentative_unknown_is_discarded_when_valid_required() {
        let p = pipeline(
            MockStorage::default(),
            MockBackend { fail: false },
            MockGenerator::passing(GOOD_BODY),
            MockProbe::all_unknown(),
            MockVerifier::silent(),
            settings(),
        );
        assert!(p.verify_candidates("John Smith", "acme.com").await.is_none());
    }

    #[tokio::test]
    async fn tentative_unknown_survives_when_valid_not_required() {
        let mut s = settings();
        s.verification.require_valid = false;
        let p = pipeline(
            MockStorage::default(),
            MockBackend { fail: false },
            MockGenerator::passing(GOOD_BODY),
            MockProbe::all_unknown(),
            MockVerifier::silent(),
            s,
        );

        let chosen = p.verify_candidates("John Smith", "acme.com").await.unwrap();
        assert_eq!(chosen.email, "john@acme.com");
        assert_eq!(chosen.status, ValidationStatus::Unknown);
    }

    #[tokio::test]
    async fn happy_path_delivers_and_records_send() {
        let storage = MockStorage::default();
        with_transport(&storage);
        let p = pipeline(
            storage.clone(),
            MockBackend { fail: false },
            MockGenerator::passing(GOOD_BODY),
            MockProbe::all_unknown().with("john@acme.com", ProbeResult::valid()),
            MockVerifier::silent(),
            settings(),
        );

        let outcome = p.run(&prospect()).await.unwrap();
        assert!(matches!(outcome, PipelineOutcome::Delivered { .. }));

        let sends = storage.sends.lock().unwrap();
        assert_eq!(sends.len(), 1);
        assert!(sends[0].sent);
        assert_eq!(sends[0].body, GOOD_BODY);

        let decisions = storage.decisions.lock().unwrap();
        assert_eq!(decisions.len(), 1);
    }

    #[tokio::test]
    async fn critic_loop_stops_at_rewrite_budget() {
        let storage = MockStorage::default();
        with_transport(&storage);
        let generator = MockGenerator::never_passing(GOOD_BODY);
        let p = pipeline(
            storage.clone(),
            MockBackend { fail: false },
            generator,
            MockProbe::all_unknown().with("john@acme.com", ProbeResult::valid()),
            MockVerifier::silent(),
            settings(),
        );

        // Exhaustion is not an error: the last draft still goes out.
        let outcome = p.run(&prospect()).await.unwrap();
        assert!(matches!(outcome, PipelineOutcome::Delivered { .. }));
        assert_eq!(p.generator.rewrites.load(Ordering::SeqCst), 2);
        assert_eq!(p.generator.critiques.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn critic_failure_passes_draft_through() {
        let storage = MockStorage::default();
        with_transport(&storage);
        let mut generator = MockGenerator::passing(GOOD_BODY);
        generator.fail_critic = true;
        let p = pipeline(
            storage.clone(),
            MockBackend { fail: false },
            generator,
            MockProbe::all_unknown().with("john@acme.com", ProbeResult::valid()),
            MockVerifier::silent(),
            settings(),
        );

        let outcome = p.run(&prospect()).await.unwrap();
        assert!(matches!(outcome, PipelineOutcome::Delivered { .. }));
    }

    #[tokio::test]
    async fn draft_failure_discards_run() {
        let storage = MockStorage::default();
        with_transport(&storage);
        let mut generator = MockGenerator::passing(GOOD_BODY);
        generator.fail_draft = true;
        let p = pipeline(
            storage.clone(),
            MockBackend { fail: false },
            generator,
            MockProbe::all_unknown().with("john@acme.com", ProbeResult::valid()),
            MockVerifier::silent(),
            settings(),
        );

        let outcome = p.run(&prospect()).await.unwrap();
        assert!(matches!(outcome, PipelineOutcome::Discarded { .. }));
        assert!(storage.sends.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn short_draft_is_discarded_before_the_gate() {
        let storage = MockStorage::default();
        with_transport(&storage);
        let p = pipeline(
            storage.clone(),
            MockBackend { fail: false },
            MockGenerator::passing("Too short. Really short. Very very short."),
            MockProbe::all_unknown().with("john@acme.com", ProbeResult::valid()),
            MockVerifier::silent(),
            settings(),
        );

        let outcome = p.run(&prospect()).await.unwrap();
        match outcome {
            PipelineOutcome::Discarded { reason } => assert!(reason.starts_with("too short")),
            other => panic!("expected discard, got {other:?}"),
        }
        assert!(storage.decisions.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn rate_denial_surfaces_as_denied() {
        let storage = MockStorage::default();
        with_transport(&storage);
        *storage.sent_count.lock().unwrap() = 100;
        let p = pipeline(
            storage.clone(),
            MockBackend { fail: false },
            MockGenerator::passing(GOOD_BODY),
            MockProbe::all_unknown().with("john@acme.com", ProbeResult::valid()),
            MockVerifier::silent(),
            settings(),
        );

        let outcome = p.run(&prospect()).await.unwrap();
        match outcome {
            PipelineOutcome::Denied { reason } => {
                assert!(reason.contains("Rate limit exceeded"), "{reason}")
            }
            other => panic!("expected denial, got {other:?}"),
        }
        assert!(storage.sends.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn dispatch_failure_records_failed_send() {
        let storage = MockStorage::default();
        with_transport(&storage);
        let p = pipeline(
            storage.clone(),
            MockBackend { fail: true },
            MockGenerator::passing(GOOD_BODY),
            MockProbe::all_unknown().with("john@acme.com", ProbeResult::valid()),
            MockVerifier::silent(),
            settings(),
        );

        let outcome = p.run(&prospect()).await.unwrap();
        assert!(matches!(outcome, PipelineOutcome::Failed { .. }));

        let sends = storage.sends.lock().unwrap();
        assert_eq!(sends.len(), 1);
        assert!(!sends[0].sent);
    }

    #[tokio::test]
    async fn reruns_reuse_the_promoted_recipient() {
        let storage = MockStorage::default();
        with_transport(&storage);
        let p = pipeline(
            storage.clone(),
            MockBackend { fail: false },
            MockGenerator::passing(GOOD_BODY),
            MockProbe::all_unknown().with("john@acme.com", ProbeResult::valid()),
            MockVerifier::silent(),
            settings(),
        );

        p.run(&prospect()).await.unwrap();
        p.run(&prospect()).await.unwrap();
        assert_eq!(storage.recipients.lock().unwrap().len(), 1);
    }
}
