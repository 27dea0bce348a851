//! Core identifier types for domain entities.
//!
//! These newtype wrappers provide type safety for entity identifiers,
//! preventing accidental mixing of different ID types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a recipient (a validated person+email pairing).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecipientId(pub String);

impl RecipientId {
    /// Generates a fresh identifier.
    pub fn generate() -> Self {
        Self(format!("rcp-{}", uuid::Uuid::new_v4()))
    }
}

impl fmt::Display for RecipientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for RecipientId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RecipientId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Unique identifier for one delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SendId(pub String);

impl SendId {
    /// Generates a fresh identifier.
    pub fn generate() -> Self {
        Self(format!("snd-{}", uuid::Uuid::new_v4()))
    }
}

impl fmt::Display for SendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for SendId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SendId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Unique identifier for a configured outbound transport.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransportId(pub String);

impl TransportId {
    /// Generates a fresh identifier.
    pub fn generate() -> Self {
        Self(format!("trn-{}", uuid::Uuid::new_v4()))
    }
}

impl fmt::Display for TransportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for TransportId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for TransportId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}
