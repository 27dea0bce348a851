//! Domain layer types for the outbound sending engine.
//!
//! This module contains the core domain types used throughout the crate:
//! recipients, email candidates, verification outcomes, send and bounce
//! records, throttle and rate state, transports, and audit records.

mod candidate;
mod decision;
mod recipient;
mod send;
mod signal;
mod throttle;
mod transport;
mod types;
mod verification;

pub use candidate::{generate_candidates, normalize_domain, split_name, EmailCandidate};
pub use decision::{DecisionKind, SendDecisionRecord};
pub use recipient::{Recipient, ValidationStatus};
pub use send::{BounceRecord, BounceSeverity, SendRecord};
pub use signal::{select_evidence, DraftContext, EnrichmentSignal};
pub use throttle::{DomainThrottleState, RateState};
pub use transport::{RotationStrategy, Transport};
pub use types::{RecipientId, SendId, TransportId};
pub use verification::{ProbeResult, ProbeStatus, ScoreOutcome, ScoreResult};
