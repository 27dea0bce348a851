//! Enrichment signals and the evidence assembly contract for drafting.
//!
//! Signals come from the external enrichment collaborator. Only signals
//! meeting a confidence floor are surfaced to the text generator, deduplicated
//! by (source URL, kind).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::types::RecipientId;

/// An extracted fact about a company or person, with provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentSignal {
    /// Signal category, e.g. "funding", "hiring", "pain_point".
    pub kind: String,
    /// The extracted signal text.
    pub text: String,
    /// URL where the signal was found.
    pub source_url: String,
    /// Extraction confidence, 0.0 to 1.0.
    pub confidence: f64,
    pub extracted_at: DateTime<Utc>,
}

/// Selects the evidence surfaced to the generator: signals at or above the
/// confidence floor, higher-confidence first, deduplicated by
/// (source URL, kind).
pub fn select_evidence(signals: &[EnrichmentSignal], floor: f64) -> Vec<EnrichmentSignal> {
    let mut eligible: Vec<&EnrichmentSignal> =
        signals.iter().filter(|s| s.confidence >= floor).collect();
    eligible.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut seen = std::collections::HashSet::new();
    eligible
        .into_iter()
        .filter(|s| seen.insert((s.source_url.clone(), s.kind.clone())))
        .cloned()
        .collect()
}

/// Everything the text generator needs to draft and critique one message.
#[derive(Debug, Clone, Default)]
pub struct DraftContext {
    pub recipient_id: Option<RecipientId>,
    pub name: String,
    pub company: String,
    pub role: String,
    /// Campaign display name, for pitch context.
    pub campaign_name: Option<String>,
    /// What this campaign is pitching.
    pub campaign_offer: Option<String>,
    /// Pre-filtered evidence (see [`select_evidence`]).
    pub signals: Vec<EnrichmentSignal>,
}

impl DraftContext {
    pub fn new(name: impl Into<String>, company: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            company: company.into(),
            ..Default::default()
        }
    }
}
