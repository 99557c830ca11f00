//! Gemini `generateContent` transport over reqwest.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;

use crate::config::ClassifierConfig;
use crate::error::LlmError;

use super::CompletionTransport;

const PROVIDER: &str = "gemini";

/// Longest error body kept in a `LlmError::Service`.
const MAX_ERROR_BODY_CHARS: usize = 500;

/// Gemini REST client. Cheap to share: the inner `reqwest::Client` is a
/// connection pool behind an `Arc`.
pub struct GeminiTransport {
    client: reqwest::Client,
    endpoint: String,
    api_key: SecretString,
    model: String,
}

impl GeminiTransport {
    /// Build a transport with its own client, applying the per-request timeout.
    pub fn new(config: &ClassifierConfig) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| LlmError::Transport {
                provider: PROVIDER.to_string(),
                reason: format!("Failed to create HTTP client: {e}"),
            })?;
        Ok(Self::with_client(client, config))
    }

    /// Build a transport around an existing client.
    pub fn with_client(client: reqwest::Client, config: &ClassifierConfig) -> Self {
        Self {
            client,
            endpoint: generate_content_url(&config.base_url, &config.model),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        }
    }

    /// Endpoint URL, without the credential.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl CompletionTransport for GeminiTransport {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let payload = json!({
            "contents": [{ "parts": [{ "text": prompt }] }]
        });

        let resp = self
            .client
            .post(&self.endpoint)
            .query(&[("key", self.api_key.expose_secret())])
            .json(&payload)
            .send()
            .await
            .map_err(transport_error)?;

        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = resp
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            return Err(LlmError::RateLimited {
                provider: PROVIDER.to_string(),
                retry_after,
            });
        }

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(LlmError::Service {
                provider: PROVIDER.to_string(),
                status: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
            });
        }

        let body = resp.text().await.map_err(transport_error)?;
        extract_candidate_text(&body)
    }
}

/// `{base}/v1beta/models/{model}:generateContent`
pub fn generate_content_url(base_url: &str, model: &str) -> String {
    format!(
        "{}/v1beta/models/{}:generateContent",
        base_url.trim_end_matches('/'),
        model
    )
}

/// Pull `candidates[0].content.parts[0].text` out of a success body.
pub fn extract_candidate_text(body: &str) -> Result<String, LlmError> {
    let parsed: GenerateContentResponse =
        serde_json::from_str(body).map_err(|e| LlmError::InvalidResponse {
            provider: PROVIDER.to_string(),
            reason: format!("response is not valid JSON: {e}"),
        })?;

    parsed
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .and_then(|c| c.parts.into_iter().next())
        .and_then(|p| p.text)
        .ok_or_else(|| LlmError::InvalidResponse {
            provider: PROVIDER.to_string(),
            reason: "no text in candidates[0].content.parts[0]".to_string(),
        })
}

/// Strip the URL from reqwest errors; it carries the API key as a query
/// parameter.
fn transport_error(e: reqwest::Error) -> LlmError {
    let reason = if e.is_timeout() {
        "request timed out".to_string()
    } else {
        e.without_url().to_string()
    };
    LlmError::Transport {
        provider: PROVIDER.to_string(),
        reason,
    }
}

// ── Wire types ──────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}
