//! Configuration and settings management.
//!
//! Settings are loaded once at startup and passed into each component at
//! construction; no component reads configuration mid-operation.

mod settings;

pub use settings::{
    CriticSettings, DeliverySettings, FallbackTransport, SendingSettings, Settings, Strictness,
    VerificationSettings,
};
