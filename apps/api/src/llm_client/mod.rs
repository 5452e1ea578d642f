//! LLM Client — the single point of entry for all Gemini API calls.
//!
//! ARCHITECTURAL RULE: No other module may call the Gemini API directly.
//! All model interactions MUST go through `ModelClient`.
//!
//! The evaluation pipeline and the conversation orchestrator both walk an
//! ordered model fallback chain; the chain itself lives in their configs,
//! not here. This module knows how to call exactly one model once.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub mod extract;

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Model call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Model returned empty content")]
    EmptyContent,
}

/// Sampling parameters for a single model call. The scoring pass runs cold,
/// the conversation runs warmer.
#[derive(Debug, Clone)]
pub struct GenerationParams {
    pub temperature: f32,
    pub top_p: f32,
    pub max_output_tokens: u32,
}

impl GenerationParams {
    /// Low temperature for reproducible rubric scoring.
    pub fn evaluation() -> Self {
        Self {
            temperature: 0.1,
            top_p: 0.95,
            max_output_tokens: 8192,
        }
    }

    /// Warmer sampling for natural conversation turns.
    pub fn conversation() -> Self {
        Self {
            temperature: 0.7,
            top_p: 0.9,
            max_output_tokens: 1024,
        }
    }
}

/// The model-call boundary. Implemented by `GeminiClient` in production and
/// by scripted mocks in pipeline/orchestrator tests.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn generate(
        &self,
        model: &str,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<String, LlmError>;
}

// ────────────────────────────────────────────────────────────────────────────
// Gemini wire types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct GeminiRequest<'a> {
    contents: Vec<GeminiContent<'a>>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent<'a> {
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Debug, Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "topP")]
    top_p: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiResponseContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    error: GeminiErrorBody,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorBody {
    message: String,
}

impl GeminiResponse {
    /// Concatenates the text parts of the first candidate.
    fn text(&self) -> Option<String> {
        let parts = &self.candidates.first()?.content.as_ref()?.parts;
        let joined: String = parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect::<Vec<_>>()
            .join("");
        if joined.trim().is_empty() {
            None
        } else {
            Some(joined)
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// GeminiClient
// ────────────────────────────────────────────────────────────────────────────

/// Production `ModelClient` over the Gemini `generateContent` REST endpoint.
/// Every call is bounded by `call_timeout`; a timeout surfaces as
/// `LlmError::Timeout` so the caller can count it as an attempt failure.
#[derive(Clone)]
pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
    call_timeout: Duration,
}

impl GeminiClient {
    pub fn new(api_key: String, call_timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(call_timeout)
                .build()
                .expect("Failed to build HTTP client"),
            api_key,
            call_timeout,
        }
    }

    async fn call_once(
        &self,
        model: &str,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<String, LlmError> {
        let url = format!("{GEMINI_API_BASE}/{model}:generateContent?key={}", self.api_key);
        let request_body = GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: params.temperature,
                top_p: params.top_p,
                max_output_tokens: params.max_output_tokens,
            },
        };

        let response = self.client.post(&url).json(&request_body).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<GeminiError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let gemini_response: GeminiResponse = response.json().await?;
        let text = gemini_response.text().ok_or(LlmError::EmptyContent)?;

        debug!(
            model,
            response_len = text.len(),
            "Gemini call succeeded"
        );
        Ok(text)
    }
}

#[async_trait]
impl ModelClient for GeminiClient {
    async fn generate(
        &self,
        model: &str,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<String, LlmError> {
        // reqwest carries its own timeout, but wrap the whole call anyway so
        // DNS stalls and body reads are bounded too.
        match tokio::time::timeout(self.call_timeout, self.call_once(model, prompt, params)).await {
            Ok(result) => result,
            Err(_) => Err(LlmError::Timeout(self.call_timeout)),
        }
    }
}
