//! Generation client
//!
//! Wraps the transport with credential checks, model selection and
//! failure classification. One transport call per article; failures are
//! classified and returned, never retried.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use super::extractor::{extract_article, GeneratedArticle};
use super::transport::{GenerationOptions, GenerationRequest, GenerationTransport, TransportError};
use super::{truncate_diagnostic, GenerationError};
use crate::config::{mask_secret, GenerationConfig};
use crate::metrics;

/// Value shipped in sample configuration files
pub const PLACEHOLDER_API_KEY: &str = "your-gemini-api-key-here";

/// Instruction block prepended to every user prompt
pub const ARTICLE_INSTRUCTIONS: &str = r#"You are an expert blog writer. Write a complete blog article based on the prompt provided.

The article must include:
1. An engaging, descriptive title
2. A well-structured body with paragraphs, subheadings where useful, and quality content
3. Relevant SEO keywords separated by commas

Respond ONLY with valid JSON in the following format:
{
    "title": "Article title",
    "body": "Full article body with well-formatted paragraphs...",
    "seo_keywords": "keyword1, keyword2, keyword3, keyword4, keyword5"
}

Do not include any text outside the JSON."#;

/// Client for article generation
pub struct GenerationClient {
    api_key: Option<String>,
    models: Vec<String>,
    options: GenerationOptions,
    transport: Arc<dyn GenerationTransport>,
}

impl fmt::Debug for GenerationClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationClient")
            .field("api_key", &self.api_key.as_deref().map(mask_secret))
            .field("models", &self.models)
            .field("options", &self.options)
            .finish()
    }
}

impl GenerationClient {
    /// Create a client from configuration and a transport
    pub fn new(config: &GenerationConfig, transport: Arc<dyn GenerationTransport>) -> Self {
        Self {
            api_key: config.api_key.clone(),
            models: config.models.clone(),
            options: GenerationOptions {
                max_output_tokens: Some(config.max_output_tokens),
                temperature: Some(config.temperature),
            },
            transport,
        }
    }

    /// The configured credential, if it looks usable
    pub fn credential(&self) -> Result<&str, GenerationError> {
        let key = self
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                GenerationError::configuration("The generation API key is not configured")
            })?;

        if key == PLACEHOLDER_API_KEY {
            return Err(GenerationError::configuration(
                "The generation API key is still the placeholder value. Configure a real key",
            ));
        }

        Ok(key)
    }

    /// First candidate model the transport can load
    pub fn select_model(&self) -> Result<&str, GenerationError> {
        let mut last_error: Option<TransportError> = None;

        for model in &self.models {
            match self.transport.load_model(model) {
                Ok(()) => return Ok(model.as_str()),
                Err(e) => {
                    tracing::warn!(model = %model, error = %e, "Model unavailable, trying next candidate");
                    last_error = Some(e);
                }
            }
        }

        let last = last_error
            .map(|e| truncate_diagnostic(&e.to_string()))
            .unwrap_or_else(|| "no candidates configured".to_string());

        Err(GenerationError::configuration(format!(
            "No usable generation model. Tried: [{}]. Last error: {}",
            self.models.join(", "),
            last
        )))
    }

    /// Instruction block followed by the caller's prompt
    pub fn build_prompt(prompt: &str) -> String {
        format!("{}\n\nUser prompt: {}", ARTICLE_INSTRUCTIONS, prompt)
    }

    /// Generate and normalize one article
    pub async fn generate_article(&self, prompt: &str) -> Result<GeneratedArticle, GenerationError> {
        let start = Instant::now();
        let result = self.generate_inner(prompt).await;

        let outcome = match &result {
            Ok(_) => "success",
            Err(e) => e.kind(),
        };
        metrics::record_generation(start.elapsed().as_secs_f64(), outcome);

        result
    }

    async fn generate_inner(&self, prompt: &str) -> Result<GeneratedArticle, GenerationError> {
        let api_key = self.credential()?;
        let model = self.select_model()?;
        let full_prompt = Self::build_prompt(prompt);

        let request = GenerationRequest {
            api_key,
            model,
            prompt: &full_prompt,
            options: &self.options,
        };

        let raw = self.transport.generate(request).await.map_err(|e| {
            let classified = classify_failure(&e);
            tracing::warn!(
                model = %model,
                kind = classified.kind(),
                retryable = classified.is_retryable(),
                error = %truncate_diagnostic(&e.to_string()),
                "Generation call failed"
            );
            classified
        })?;

        tracing::debug!(model = %model, chars = raw.len(), "Generation call returned");

        extract_article(&raw).map_err(|e| {
            tracing::warn!(model = %model, error = %e, "Generated response rejected");
            e
        })
    }

    /// Check that the credential is accepted by listing models.
    /// Never spends a generation call.
    pub async fn check_connection(&self) -> Result<String, GenerationError> {
        let api_key = self.credential()?;

        let models = self.transport.list_models(api_key).await.map_err(|e| {
            let text = e.to_string().to_lowercase();
            let rejected = matches!(e.status(), Some(401) | Some(403))
                || text.contains("api key")
                || text.contains("unauthorized")
                || text.contains("invalid");
            if rejected {
                GenerationError::configuration(
                    "The generation API key is invalid or unauthorized",
                )
            } else {
                classify_failure(&e)
            }
        })?;

        if models.is_empty() {
            return Err(GenerationError::Transport {
                message: "The generation API returned no models".to_string(),
            });
        }

        let preferred: Vec<&str> = models
            .iter()
            .filter(|m| self.models.iter().any(|c| c == *m))
            .map(String::as_str)
            .collect();
        let shown: Vec<&str> = if preferred.is_empty() {
            models.iter().take(3).map(String::as_str).collect()
        } else {
            preferred.into_iter().take(3).collect()
        };

        Ok(format!(
            "Generation API reachable. Models available: {}",
            shown.join(", ")
        ))
    }
}

/// Map a transport failure to quota exhaustion or a generic transport error
pub fn classify_failure(error: &TransportError) -> GenerationError {
    let text = error.to_string();
    let lower = text.to_lowercase();
    let diagnostic = truncate_diagnostic(&text);

    let quota = error.status() == Some(429)
        || text.contains("429")
        || lower.contains("quota")
        || lower.contains("limit")
        || lower.contains("too many requests");

    if quota {
        GenerationError::QuotaExceeded {
            message: format!(
                "The generation API quota has been exceeded. Please wait a minute before trying again. Error: {}",
                diagnostic
            ),
        }
    } else {
        GenerationError::Transport {
            message: format!("Failed to generate the article: {}", diagnostic),
        }
    }
}
