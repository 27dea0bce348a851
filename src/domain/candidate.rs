//! Candidate address generation: deterministic pattern expansion from a
//! person's name and a company domain.
//!
//! Generation only proposes addresses; verification happens later in the
//! acceptance pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One generated address pattern for a person, pre-verification.
///
/// Ephemeral: many candidates exist per person, at most one is promoted to a
/// [`super::Recipient`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailCandidate {
    /// The candidate address.
    pub email: String,
    /// Pattern tag, e.g. "first.last".
    pub pattern: String,
    /// When the candidate was generated.
    pub generated_at: DateTime<Utc>,
}

/// Normalizes a domain string: strips protocol, path and query, lowercases.
pub fn normalize_domain(domain: &str) -> String {
    let trimmed = domain.trim();
    if let Ok(parsed) = url::Url::parse(trimmed) {
        if let Some(host) = parsed.host_str() {
            return host.to_lowercase();
        }
    }

    // Bare domains carry no scheme and fail Url::parse; trim by hand.
    let mut d = trimmed.to_lowercase();
    if let Some(idx) = d.find('/') {
        d.truncate(idx);
    }
    if let Some(idx) = d.find('?') {
        d.truncate(idx);
    }

    d
}

/// Splits a full name into cleaned (first, last) tokens.
///
/// Keeps only alphabetic characters and lowercases. A single-token name
/// yields an empty last name.
pub fn split_name(name: &str) -> (String, String) {
    let clean = |part: &str| -> String {
        part.chars()
            .filter(|c| c.is_alphabetic())
            .collect::<String>()
            .to_lowercase()
    };

    let parts: Vec<&str> = name.split_whitespace().collect();
    match parts.as_slice() {
        [] => (String::new(), String::new()),
        [only] => (clean(only), String::new()),
        [first, .., last] => (clean(first), clean(last)),
    }
}

/// Generates a de-duplicated, ordered list of plausible addresses for a
/// person at a domain.
///
/// Returns an empty list when the first name or the domain cannot be
/// determined.
pub fn generate_candidates(name: &str, domain: &str) -> Vec<EmailCandidate> {
    let domain = normalize_domain(domain);
    let (first, last) = split_name(name);

    if domain.is_empty() || first.is_empty() {
        return Vec::new();
    }

    let mut patterns: Vec<(String, String)> =
        vec![(format!("{first}@{domain}"), "first".to_string())];

    if !last.is_empty() {
        let f = &first[..first.char_indices().nth(1).map_or(first.len(), |(i, _)| i)];
        let l = &last[..last.char_indices().nth(1).map_or(last.len(), |(i, _)| i)];

        patterns.push((format!("{first}{last}@{domain}"), "firstlast".to_string()));
        patterns.push((format!("{first}.{last}@{domain}"), "first.last".to_string()));
        patterns.push((format!("{first}_{last}@{domain}"), "first_last".to_string()));
        patterns.push((format!("{f}{last}@{domain}"), "flast".to_string()));
        patterns.push((format!("{f}.{last}@{domain}"), "f.last".to_string()));
        patterns.push((format!("{first}{l}@{domain}"), "firstl".to_string()));
        patterns.push((format!("{f}_{last}@{domain}"), "f_last".to_string()));
    }

    let now = Utc::now();
    let mut seen = std::collections::HashSet::new();
    patterns
        .into_iter()
        .filter(|(email, _)| email.matches('@').count() == 1 && seen.insert(email.clone()))
        .map(|(email, pattern)| EmailCandidate {
            email,
            pattern,
            generated_at: now,
        })
        .collect()
}
