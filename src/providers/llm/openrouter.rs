//! OpenRouter-backed text generator.
//!
//! Talks to any OpenAI-compatible chat completion endpoint; OpenRouter is
//! the default. Drafts and critiques are exchanged as JSON payloads in the
//! completion text.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

use crate::config::Strictness;
use crate::domain::DraftContext;

use super::traits::{Critique, Draft, LlmError, LlmResult, TextGenerator};

/// Default base URL for OpenRouter's API.
const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Default model when none is configured.
const DEFAULT_MODEL: &str = "meta-llama/llama-3.1-8b-instruct";

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Generator backed by an OpenAI-compatible chat endpoint.
pub struct OpenRouterGenerator {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenRouterGenerator {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: OPENROUTER_BASE_URL.to_string(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    /// Overrides the model identifier.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Points the generator at a different compatible endpoint.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn build_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", self.api_key)) {
            headers.insert(AUTHORIZATION, value);
        }
        headers
    }

    async fn complete(&self, system: &str, user: &str, temperature: f32) -> LlmResult<String> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user.to_string(),
                },
            ],
            temperature,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .headers(self.build_headers())
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            if status.as_u16() == 429 {
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse().ok());
                return Err(LlmError::RateLimited {
                    retry_after_secs: retry_after,
                });
            }
            let message = match response.json::<ApiError>().await {
                Ok(err) => err.error.message,
                Err(_) => "unknown error".to_string(),
            };
            if status.as_u16() == 401 {
                return Err(LlmError::Authentication(message));
            }
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: ChatResponse = response.json().await?;
        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| LlmError::InvalidResponse("empty completion".to_string()))
    }

    fn evidence_block(context: &DraftContext) -> String {
        if context.signals.is_empty() {
            return "No specific signals available.".to_string();
        }
        context
            .signals
            .iter()
            .map(|s| format!("- [{}] {} (source: {})", s.kind, s.text, s.source_url))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn draft_prompt(context: &DraftContext) -> String {
        let mut prompt = format!(
            "Write a short cold outreach email to {name}, {role} at {company}.\n",
            name = context.name,
            role = if context.role.is_empty() {
                "a decision maker"
            } else {
                &context.role
            },
            company = context.company,
        );
        if let Some(offer) = &context.campaign_offer {
            prompt.push_str(&format!("We are pitching: {offer}\n"));
        }
        prompt.push_str(&format!(
            "\nEvidence about the company:\n{}\n\n\
             Requirements: 30-100 words, 3-5 sentences, no links, no hype words.\n\
             Reference the evidence naturally. Respond with JSON only:\n\
             {{\"subject\": \"...\", \"body\": \"...\"}}",
            Self::evidence_block(context)
        ));
        prompt
    }

    fn critique_prompt(context: &DraftContext, draft: &Draft, strictness: Strictness) -> String {
        let bar = match strictness {
            Strictness::Low => "Flag only clear problems.",
            Strictness::Medium => "Hold the draft to a solid professional standard.",
            Strictness::High => "Be demanding; pass only genuinely strong drafts.",
        };
        format!(
            "You are reviewing a cold outreach email to {name} at {company}. {bar}\n\n\
             Subject: {subject}\n\nBody:\n{body}\n\n\
             Score it from 0.0 to 1.0 on relevance, specificity, and tone.\n\
             Respond with JSON only:\n\
             {{\"passed\": true|false, \"score\": 0.0, \"feedback\": \"...\"}}",
            name = context.name,
            company = context.company,
            subject = draft.subject,
            body = draft.body,
        )
    }

    fn rewrite_prompt(context: &DraftContext, draft: &Draft, feedback: &str) -> String {
        format!(
            "Rewrite this cold outreach email to {name} at {company} using the feedback.\n\n\
             Subject: {subject}\n\nBody:\n{body}\n\nFeedback: {feedback}\n\n\
             Keep it 30-100 words, 3-5 sentences, no links. Respond with JSON only:\n\
             {{\"subject\": \"...\", \"body\": \"...\"}}",
            name = context.name,
            company = context.company,
            subject = draft.subject,
            body = draft.body,
        )
    }
}

/// Strips a markdown code fence wrapper if the model added one.
pub(crate) fn strip_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop an optional language tag on the opening fence line.
    let rest = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

fn parse_json<T: serde::de::DeserializeOwned>(raw: &str) -> LlmResult<T> {
    let cleaned = strip_fences(raw);
    serde_json::from_str(cleaned)
        .map_err(|e| LlmError::InvalidResponse(format!("{e}: {cleaned}")))
}

const DRAFT_SYSTEM: &str =
    "You write concise, specific B2B outreach emails. You respond only with JSON.";
const CRITIC_SYSTEM: &str =
    "You are a strict reviewer of outreach emails. You respond only with JSON.";

#[async_trait]
impl TextGenerator for OpenRouterGenerator {
    async fn draft(&self, context: &DraftContext) -> LlmResult<Draft> {
        let raw = self
            .complete(DRAFT_SYSTEM, &Self::draft_prompt(context), 0.7)
            .await?;
        parse_json(&raw)
    }

    async fn critique(
        &self,
        context: &DraftContext,
        draft: &Draft,
        strictness: Strictness,
    ) -> LlmResult<Critique> {
        let raw = self
            .complete(
                CRITIC_SYSTEM,
                &Self::critique_prompt(context, draft, strictness),
                0.2,
            )
            .await?;
        parse_json(&raw)
    }

    async fn rewrite(
        &self,
        context: &DraftContext,
        draft: &Draft,
        feedback: &str,
    ) -> LlmResult<Draft> {
        let raw = self
            .complete(
                DRAFT_SYSTEM,
                &Self::rewrite_prompt(context, draft, feedback),
                0.7,
            )
            .await?;
        parse_json(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_fences_handles_plain_and_fenced() {
        assert_eq!(strip_fences("{\"a\":1}"), "{\"a\":1}");
        assert_eq!(strip_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_fences("```\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_fences("  {\"a\":1}  "), "{\"a\":1}");
    }

    #[test]
    fn parse_json_surfaces_malformed_payloads() {
        let result: LlmResult<Critique> = parse_json("not json at all");
        assert!(matches!(result, Err(LlmError::InvalidResponse(_))));

        let critique: Critique =
            parse_json("```json\n{\"passed\": true, \"score\": 0.8, \"feedback\": \"ok\"}\n```")
                .unwrap();
        assert!(critique.passed);
        assert!((critique.score - 0.8).abs() < f64::EPSILON);
    }

    #[test]
    fn draft_prompt_includes_evidence_and_offer() {
        let mut context = DraftContext::new("Ada", "Acme");
        context.campaign_offer = Some("observability tooling".to_string());
        context.signals.push(crate::domain::EnrichmentSignal {
            kind: "hiring".to_string(),
            text: "Hiring 5 SREs".to_string(),
            source_url: "https://acme.com/jobs".to_string(),
            confidence: 0.9,
            extracted_at: chrono::Utc::now(),
        });

        let prompt = OpenRouterGenerator::draft_prompt(&context);
        assert!(prompt.contains("Hiring 5 SREs"));
        assert!(prompt.contains("observability tooling"));
        assert!(prompt.contains("\"subject\""));
    }
}
