//! Address verification providers.

pub mod hunter;
pub mod smtp_probe;
pub mod traits;

pub use hunter::HunterVerifier;
pub use smtp_probe::SmtpProber;
pub use traits::{DeliverabilityProbe, ScoringVerifier, VerifyError, VerifyResult};
