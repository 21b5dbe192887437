//! Error types for QuillForge services
//!
//! Provides a comprehensive error handling system with:
//! - Distinct error types for different failure modes
//! - HTTP status code mapping
//! - Structured error responses
//! - Error codes for client handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::generation::GenerationError;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors (1xxx)
    ValidationError,

    // Authentication errors (2xxx)
    Unauthorized,
    InvalidCredentials,
    ExpiredToken,

    // Resource errors (4xxx)
    PostNotFound,

    // Conflict errors (5xxx)
    Conflict,

    // Generation errors (6xxx)
    GenerationNotConfigured,
    MalformedResponse,
    QuotaExceeded,
    GenerationUnavailable,

    // Database errors (7xxx)
    DatabaseError,
    ConnectionError,

    // Internal errors (9xxx)
    InternalError,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            ErrorCode::ValidationError => 1001,

            ErrorCode::Unauthorized => 2001,
            ErrorCode::InvalidCredentials => 2002,
            ErrorCode::ExpiredToken => 2003,

            ErrorCode::PostNotFound => 4002,

            ErrorCode::Conflict => 5001,

            ErrorCode::GenerationNotConfigured => 6001,
            ErrorCode::MalformedResponse => 6002,
            ErrorCode::QuotaExceeded => 6003,
            ErrorCode::GenerationUnavailable => 6004,

            ErrorCode::DatabaseError => 7001,
            ErrorCode::ConnectionError => 7002,

            ErrorCode::InternalError => 9001,
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    // Authentication errors
    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    #[error("Incorrect email or password")]
    InvalidCredentials,

    #[error("Token expired")]
    ExpiredToken,

    // Resource errors
    #[error("Post not found: {id}")]
    PostNotFound { id: String },

    // Conflict errors
    #[error("Duplicate resource: {message}")]
    Duplicate { message: String },

    // Article generation failures, classified by the generation client
    #[error(transparent)]
    Generation(#[from] GenerationError),

    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Database connection error: {message}")]
    DatabaseConnection { message: String },

    // Internal errors
    #[error("Internal server error: {message}")]
    Internal { message: String },
}

impl AppError {
    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation { .. } => ErrorCode::ValidationError,
            AppError::Unauthorized { .. } => ErrorCode::Unauthorized,
            AppError::InvalidCredentials => ErrorCode::InvalidCredentials,
            AppError::ExpiredToken => ErrorCode::ExpiredToken,
            AppError::PostNotFound { .. } => ErrorCode::PostNotFound,
            AppError::Duplicate { .. } => ErrorCode::Conflict,
            AppError::Generation(err) => match err {
                GenerationError::Configuration { .. } => ErrorCode::GenerationNotConfigured,
                GenerationError::MalformedResponse { .. } => ErrorCode::MalformedResponse,
                GenerationError::QuotaExceeded { .. } => ErrorCode::QuotaExceeded,
                GenerationError::Transport { .. } => ErrorCode::GenerationUnavailable,
            },
            AppError::Database(_) => ErrorCode::DatabaseError,
            AppError::DatabaseConnection { .. } => ErrorCode::ConnectionError,
            AppError::Internal { .. } => ErrorCode::InternalError,
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,

            // 401 Unauthorized
            AppError::Unauthorized { .. }
            | AppError::InvalidCredentials
            | AppError::ExpiredToken => StatusCode::UNAUTHORIZED,

            // 404 Not Found
            AppError::PostNotFound { .. } => StatusCode::NOT_FOUND,

            // 409 Conflict
            AppError::Duplicate { .. } => StatusCode::CONFLICT,

            AppError::Generation(err) => match err {
                GenerationError::QuotaExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
                GenerationError::Configuration { .. }
                | GenerationError::MalformedResponse { .. } => StatusCode::BAD_REQUEST,
                GenerationError::Transport { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            },

            // 500 Internal Server Error
            AppError::Database(_)
            | AppError::DatabaseConnection { .. }
            | AppError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Check if this error should be logged at error level
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Check if this error is a client error
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }

    /// Whether the caller may retry the same request after a delay
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::Generation(err) => err.is_retryable(),
            _ => false,
        }
    }
}

/// Structured error response for API
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// Set when resubmitting the same request later may succeed
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub retryable: bool,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();
        let message = self.to_string();
        let retryable = self.is_retryable();

        if self.is_server_error() {
            tracing::error!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                retryable,
                "Server error"
            );
        } else if self.is_client_error() {
            tracing::warn!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                retryable,
                "Client error"
            );
        }

        let field = match &self {
            AppError::Validation { field, .. } => field.clone(),
            _ => None,
        };
        let challenge = matches!(
            self,
            AppError::Unauthorized { .. } | AppError::InvalidCredentials | AppError::ExpiredToken
        );

        let body = ErrorResponse {
            error: ErrorDetails {
                code,
                message,
                field,
                retryable,
            },
        };

        if challenge {
            (status, [("WWW-Authenticate", "Bearer")], Json(body)).into_response()
        } else {
            (status, Json(body)).into_response()
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let field = errors.field_errors().keys().next().map(|f| f.to_string());
        AppError::Validation {
            message: errors.to_string(),
            field,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_mapping() {
        let err = AppError::PostNotFound { id: "test".into() };
        assert_eq!(err.code(), ErrorCode::PostNotFound);
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_generation_status_mapping() {
        let quota: AppError = GenerationError::QuotaExceeded {
            message: "slow down".into(),
        }
        .into();
        assert_eq!(quota.status_code(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(quota.code(), ErrorCode::QuotaExceeded);

        let config: AppError = GenerationError::Configuration {
            message: "no key".into(),
        }
        .into();
        assert_eq!(config.status_code(), StatusCode::BAD_REQUEST);

        let malformed: AppError = GenerationError::MalformedResponse {
            message: "no json".into(),
        }
        .into();
        assert_eq!(malformed.status_code(), StatusCode::BAD_REQUEST);

        let transport: AppError = GenerationError::Transport {
            message: "connection reset".into(),
        }
        .into();
        assert_eq!(transport.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(transport.is_server_error());
    }

    #[test]
    fn test_generation_message_is_passed_through() {
        let err: AppError = GenerationError::MalformedResponse {
            message: "no JSON object could be located".into(),
        }
        .into();
        assert!(err.to_string().contains("no JSON object could be located"));
    }

    #[test]
    fn test_validation_error() {
        let err = AppError::Validation {
            message: "Invalid prompt".into(),
            field: Some("prompt".into()),
        };
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(!err.is_server_error());
        assert!(err.is_client_error());
    }

    #[test]
    fn test_duplicate_is_conflict() {
        let err = AppError::Duplicate {
            message: "email already registered".into(),
        };
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert_eq!(err.code().as_code(), 5001);
    }

    #[test]
    fn test_server_side_variants_map_to_500() {
        let internal = AppError::Internal {
            message: "boom".into(),
        };
        assert_eq!(internal.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(internal.code().as_code(), 9001);

        let db: AppError = sea_orm::DbErr::Custom("gone".into()).into();
        assert_eq!(db.code(), ErrorCode::DatabaseError);
        assert!(db.is_server_error());

        let conn = AppError::DatabaseConnection {
            message: "refused".into(),
        };
        assert_eq!(conn.code().as_code(), 7002);
    }

    #[test]
    fn test_retryable_follows_generation_class() {
        let quota: AppError = GenerationError::QuotaExceeded {
            message: "slow down".into(),
        }
        .into();
        assert!(quota.is_retryable());

        let malformed: AppError = GenerationError::malformed("no json").into();
        assert!(!malformed.is_retryable());
        assert!(!AppError::InvalidCredentials.is_retryable());
    }

    #[tokio::test]
    async fn test_retryable_flag_in_error_body() {
        let response = AppError::from(GenerationError::Transport {
            message: "connection reset".into(),
        })
        .into_response();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"]["code"], "GENERATION_UNAVAILABLE");
        assert_eq!(body["error"]["retryable"], true);

        let response = AppError::PostNotFound { id: "x".into() }.into_response();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert!(body["error"].get("retryable").is_none());
    }

    #[test]
    fn test_unauthorized_sets_challenge_header() {
        let response = AppError::InvalidCredentials.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get("WWW-Authenticate").unwrap(),
            "Bearer"
        );
    }
}
