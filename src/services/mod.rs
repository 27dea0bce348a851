//! Send-safety services: the gating, routing, and feedback chain that every
//! outbound message passes through.

pub mod acceptance;
pub mod bounce;
pub mod gate;
pub mod rate;
pub mod suppression;
pub mod throttle;
pub mod transport;

pub use acceptance::{
    AcceptancePipeline, AcceptanceStorage, PipelineError, PipelineOutcome, PipelineState, Prospect,
};
pub use bounce::{BounceError, BounceProcessor, BounceStorage, IngestOutcome};
pub use gate::{DecisionStorage, GateDecision, GateError, SendGate};
pub use rate::{RateController, RateError, RateStorage};
pub use suppression::{SuppressionError, SuppressionRegistry, SuppressionStorage};
pub use throttle::{ThrottleError, ThrottleLedger, ThrottleStorage};
pub use transport::{SelectedTransport, TransportError, TransportRouter, TransportStorage};

/// Outcome of one safety check: allowed, or denied with a reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckOutcome {
    pub allowed: bool,
    pub reason: Option<String>,
}

impl CheckOutcome {
    pub fn allowed() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    pub fn denied(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
        }
    }
}

/// Lowercased domain portion of an address, or the whole input when it is
/// already a bare domain.
pub(crate) fn domain_of(address: &str) -> String {
    address
        .rsplit_once('@')
        .map(|(_, domain)| domain)
        .unwrap_or(address)
        .trim()
        .to_lowercase()
}
