//! Text-generation transport
//!
//! Provides the [`GenerationTransport`] seam and two implementations:
//! - [`GeminiTransport`] for the Gemini REST API
//! - [`ScriptedTransport`], a canned-reply double for tests

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;

use crate::errors::{AppError, Result};

/// Sampling options forwarded to the model
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationOptions {
    pub max_output_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

/// One outgoing generation call
#[derive(Debug, Clone, Copy)]
pub struct GenerationRequest<'a> {
    pub api_key: &'a str,
    pub model: &'a str,
    pub prompt: &'a str,
    pub options: &'a GenerationOptions,
}

/// Failure reported by a transport
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("{0}")]
    Request(String),

    #[error("model `{model}` cannot be used: {reason}")]
    InvalidModel { model: String, reason: String },
}

impl TransportError {
    /// HTTP status reported by the service, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Trait for external text generation
#[async_trait]
pub trait GenerationTransport: Send + Sync {
    /// Prepare `model` for use. Succeeding here does not prove the model
    /// will serve requests.
    fn load_model(&self, model: &str) -> std::result::Result<(), TransportError>;

    /// Issue one generation call and return the raw text
    async fn generate(
        &self,
        request: GenerationRequest<'_>,
    ) -> std::result::Result<String, TransportError>;

    /// List model identifiers visible to `api_key`
    async fn list_models(&self, api_key: &str) -> std::result::Result<Vec<String>, TransportError>;
}

/// Gemini REST client
pub struct GeminiTransport {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
struct GeminiRequest<'a> {
    contents: Vec<GeminiRequestContent<'a>>,
    #[serde(rename = "generationConfig")]
    generation_config: GeminiGenerationConfig,
}

#[derive(Serialize)]
struct GeminiRequestContent<'a> {
    role: &'static str,
    parts: Vec<GeminiRequestPart<'a>>,
}

#[derive(Serialize)]
struct GeminiRequestPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct GeminiGenerationConfig {
    #[serde(rename = "maxOutputTokens", skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiContent>,
    #[serde(rename = "finishReason", default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum GeminiPart {
    Text { text: String },
    Other(serde_json::Value),
}

#[derive(Debug, Deserialize)]
struct GeminiModelList {
    #[serde(default)]
    models: Vec<GeminiModel>,
}

#[derive(Debug, Deserialize)]
struct GeminiModel {
    name: String,
}

impl GeminiTransport {
    /// Create a new Gemini transport
    pub fn new(api_base: &str, timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs.max(1)))
            .build()
            .map_err(|e| AppError::Internal {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url: api_base.trim().trim_end_matches('/').to_string(),
        })
    }

    fn generate_url(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.base_url, model)
    }

    async fn read_error(response: reqwest::Response) -> TransportError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        TransportError::Status { status, body }
    }
}

#[async_trait]
impl GenerationTransport for GeminiTransport {
    fn load_model(&self, model: &str) -> std::result::Result<(), TransportError> {
        if model.trim().is_empty() {
            return Err(TransportError::InvalidModel {
                model: model.to_string(),
                reason: "identifier is empty".to_string(),
            });
        }

        if let Some(bad) = model
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_')))
        {
            return Err(TransportError::InvalidModel {
                model: model.to_string(),
                reason: format!("unexpected character {:?} in identifier", bad),
            });
        }

        reqwest::Url::parse(&self.generate_url(model))
            .map(|_| ())
            .map_err(|e| TransportError::InvalidModel {
                model: model.to_string(),
                reason: e.to_string(),
            })
    }

    async fn generate(
        &self,
        request: GenerationRequest<'_>,
    ) -> std::result::Result<String, TransportError> {
        let body = GeminiRequest {
            contents: vec![GeminiRequestContent {
                role: "user",
                parts: vec![GeminiRequestPart {
                    text: request.prompt,
                }],
            }],
            generation_config: GeminiGenerationConfig {
                max_output_tokens: request.options.max_output_tokens,
                temperature: request.options.temperature,
            },
        };

        let response = self
            .client
            .post(self.generate_url(request.model))
            .header("x-goog-api-key", request.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| TransportError::Request(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Self::read_error(response).await);
        }

        let parsed: GeminiResponse = response
            .json()
            .await
            .map_err(|e| TransportError::Request(format!("Failed to parse response: {}", e)))?;

        parse_gemini_response(parsed)
    }

    async fn list_models(&self, api_key: &str) -> std::result::Result<Vec<String>, TransportError> {
        let response = self
            .client
            .get(format!("{}/models", self.base_url))
            .header("x-goog-api-key", api_key)
            .send()
            .await
            .map_err(|e| TransportError::Request(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Self::read_error(response).await);
        }

        let parsed: GeminiModelList = response
            .json()
            .await
            .map_err(|e| TransportError::Request(format!("Failed to parse response: {}", e)))?;

        Ok(parsed
            .models
            .into_iter()
            .map(|m| m.name.trim_start_matches("models/").to_string())
            .collect())
    }
}

fn parse_gemini_response(response: GeminiResponse) -> std::result::Result<String, TransportError> {
    for candidate in response.candidates {
        if let Some(reason) = candidate.finish_reason.as_deref() {
            match reason {
                "MAX_TOKENS" => tracing::warn!("Gemini response truncated due to max_tokens limit"),
                "SAFETY" => tracing::warn!("Gemini response blocked by safety filters"),
                "RECITATION" => tracing::warn!("Gemini response blocked due to recitation concerns"),
                _ => {}
            }
        }

        if let Some(content) = candidate.content {
            let text: String = content
                .parts
                .into_iter()
                .filter_map(|part| match part {
                    GeminiPart::Text { text } => Some(text),
                    GeminiPart::Other(_) => None,
                })
                .collect();
            if !text.trim().is_empty() {
                return Ok(text);
            }
        }
    }

    Err(TransportError::Request(
        "Generation API returned an empty response".to_string(),
    ))
}

/// A call observed by [`ScriptedTransport`]
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub api_key: String,
    pub model: String,
    pub prompt: String,
}

/// Transport double that replays queued replies in order
pub struct ScriptedTransport {
    replies: Mutex<VecDeque<std::result::Result<String, TransportError>>>,
    unavailable_models: Vec<String>,
    models: Vec<String>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            unavailable_models: Vec::new(),
            models: vec!["gemini-2.0-flash-exp".to_string(), "gemini-pro".to_string()],
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Queue a successful raw reply
    pub fn with_reply(self, raw: impl Into<String>) -> Self {
        self.push(Ok(raw.into()));
        self
    }

    /// Queue a failed call
    pub fn with_failure(self, error: TransportError) -> Self {
        self.push(Err(error));
        self
    }

    /// Make `load_model` reject `model`
    pub fn with_unavailable_model(mut self, model: impl Into<String>) -> Self {
        self.unavailable_models.push(model.into());
        self
    }

    /// Replace the identifiers returned by `list_models`
    pub fn with_models(mut self, models: Vec<String>) -> Self {
        self.models = models;
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or_default()
    }

    fn push(&self, reply: std::result::Result<String, TransportError>) {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push_back(reply);
        }
    }
}

impl Default for ScriptedTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GenerationTransport for ScriptedTransport {
    fn load_model(&self, model: &str) -> std::result::Result<(), TransportError> {
        if self.unavailable_models.iter().any(|m| m == model) {
            return Err(TransportError::InvalidModel {
                model: model.to_string(),
                reason: "not available".to_string(),
            });
        }
        Ok(())
    }

    async fn generate(
        &self,
        request: GenerationRequest<'_>,
    ) -> std::result::Result<String, TransportError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(RecordedCall {
                api_key: request.api_key.to_string(),
                model: request.model.to_string(),
                prompt: request.prompt.to_string(),
            });
        }

        self.replies
            .lock()
            .ok()
            .and_then(|mut replies| replies.pop_front())
            .unwrap_or_else(|| Err(TransportError::Request("no scripted reply left".to_string())))
    }

    async fn list_models(&self, _api_key: &str) -> std::result::Result<Vec<String>, TransportError> {
        Ok(self.models.clone())
    }
}
