//! Article generation
//!
//! Turns a user prompt into a structured [`GeneratedArticle`]:
//! - [`transport`]: the external text-generation call (Gemini REST API)
//! - [`client`]: credential checks, model selection, failure classification
//! - [`extractor`]: coerces free-form model output into the article record

pub mod client;
pub mod extractor;
pub mod transport;

pub use client::{classify_failure, GenerationClient, ARTICLE_INSTRUCTIONS};
pub use extractor::{extract_article, GeneratedArticle};
pub use transport::{
    GeminiTransport, GenerationOptions, GenerationRequest, GenerationTransport,
    ScriptedTransport, TransportError,
};

use thiserror::Error;

/// Maximum number of characters of upstream detail carried in a failure
pub const DIAGNOSTIC_LIMIT: usize = 200;

/// Why an article could not be produced
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GenerationError {
    /// Missing or invalid credential, or no usable model. Not retryable.
    #[error("{message}")]
    Configuration { message: String },

    /// The model answered but the answer has no usable article in it.
    #[error("{message}")]
    MalformedResponse { message: String },

    /// Usage limit reached upstream. Retry after a delay.
    #[error("{message}")]
    QuotaExceeded { message: String },

    /// Network or service failure. Transient.
    #[error("{message}")]
    Transport { message: String },
}

impl GenerationError {
    pub fn configuration(message: impl Into<String>) -> Self {
        GenerationError::Configuration {
            message: message.into(),
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        GenerationError::MalformedResponse {
            message: message.into(),
        }
    }

    /// Short label used for metrics and logs
    pub fn kind(&self) -> &'static str {
        match self {
            GenerationError::Configuration { .. } => "configuration_error",
            GenerationError::MalformedResponse { .. } => "malformed_response",
            GenerationError::QuotaExceeded { .. } => "quota_exceeded",
            GenerationError::Transport { .. } => "transport_error",
        }
    }

    /// Whether resubmitting the same request may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GenerationError::QuotaExceeded { .. } | GenerationError::Transport { .. }
        )
    }
}

/// Cut `text` down to [`DIAGNOSTIC_LIMIT`] characters
pub fn truncate_diagnostic(text: &str) -> String {
    text.chars().take(DIAGNOSTIC_LIMIT).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_diagnostic_respects_char_boundaries() {
        let long = "é".repeat(500);
        let cut = truncate_diagnostic(&long);
        assert_eq!(cut.chars().count(), DIAGNOSTIC_LIMIT);

        assert_eq!(truncate_diagnostic("short"), "short");
    }

    #[test]
    fn test_retryable_kinds() {
        assert!(!GenerationError::configuration("x").is_retryable());
        assert!(!GenerationError::malformed("x").is_retryable());
        assert!(GenerationError::QuotaExceeded { message: "x".into() }.is_retryable());
        assert!(GenerationError::Transport { message: "x".into() }.is_retryable());
    }
}
