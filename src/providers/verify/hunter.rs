//! Hunter email-verifier scoring client.
//!
//! A missing API key or a failed request produces a not-usable outcome
//! rather than an error, so verification can degrade to probe-only.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

use crate::domain::{ScoreOutcome, ScoreResult};

use super::traits::{ScoringVerifier, VerifyResult};

const HUNTER_VERIFIER_URL: &str = "https://api.hunter.io/v2/email-verifier";

#[derive(Debug, Deserialize)]
struct HunterResponse {
    data: Option<HunterData>,
}

#[derive(Debug, Deserialize)]
struct HunterData {
    result: Option<String>,
    score: Option<u8>,
}

/// Scoring verifier backed by Hunter's email-verifier endpoint.
pub struct HunterVerifier {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
}

impl HunterVerifier {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: HUNTER_VERIFIER_URL.to_string(),
        }
    }

    /// Points the client at a different endpoint, for testing.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn parse_result(raw: Option<&str>) -> ScoreResult {
        match raw {
            Some("deliverable") => ScoreResult::Deliverable,
            Some("undeliverable") => ScoreResult::Undeliverable,
            Some("risky") => ScoreResult::Risky,
            Some("unknown") => ScoreResult::Unknown,
            _ => ScoreResult::Error,
        }
    }
}

#[async_trait]
impl ScoringVerifier for HunterVerifier {
    async fn score(&self, email: &str) -> VerifyResult<ScoreOutcome> {
        let Some(api_key) = &self.api_key else {
            return Ok(ScoreOutcome::not_usable());
        };

        let response = self
            .client
            .get(&self.base_url)
            .query(&[("email", email), ("api_key", api_key)])
            .send()
            .await;

        let response = match response {
            Ok(resp) => resp,
            Err(err) => {
                warn!(email, error = %err, "scoring verifier unreachable");
                return Ok(ScoreOutcome::not_usable());
            }
        };

        if !response.status().is_success() {
            warn!(email, status = %response.status(), "scoring verifier returned an error");
            return Ok(ScoreOutcome::not_usable());
        }

        let body: HunterResponse = match response.json().await {
            Ok(body) => body,
            Err(err) => {
                warn!(email, error = %err, "malformed scoring payload");
                return Ok(ScoreOutcome::not_usable());
            }
        };

        let Some(data) = body.data else {
            return Ok(ScoreOutcome::not_usable());
        };

        let result = Self::parse_result(data.result.as_deref());
        Ok(ScoreOutcome {
            usable: result != ScoreResult::Error,
            result,
            score: data.score,
        })
    }
}
