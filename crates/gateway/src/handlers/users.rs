//! Account handlers: registration, token issue, current user

use axum::{extract::State, http::StatusCode, Form, Json};
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::AppState;
use quillforge_common::{
    auth::{hash_password, verify_password, AuthUser},
    db::models::User,
    errors::{AppError, Result},
    metrics,
};

/// Request to register an account
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email)]
    pub email: String,

    #[validate(length(min = 8, max = 128))]
    pub password: String,
}

/// OAuth2 password-flow form
#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub created_at: DateTime<FixedOffset>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
}

/// Lower-cased, trimmed e-mail used as the account key
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Register a new account
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<UserResponse>)> {
    let request = RegisterRequest {
        email: normalize_email(&request.email),
        password: request.password,
    };
    request.validate()?;

    let password_hash = hash_password(&request.password)?;
    let user = state.repo.create_user(&request.email, password_hash).await?;

    metrics::record_user_registered();
    tracing::info!(user_id = %user.id, "User registered");

    Ok((StatusCode::CREATED, Json(user.into())))
}

/// Exchange e-mail and password for a bearer token
pub async fn token(
    State(state): State<AppState>,
    Form(form): Form<TokenRequest>,
) -> Result<Json<TokenResponse>> {
    let email = normalize_email(&form.username);

    let user = state
        .repo
        .find_user_by_email(&email)
        .await?
        .filter(|user| verify_password(&form.password, &user.password_hash))
        .ok_or(AppError::InvalidCredentials)?;

    let access_token = state.jwt.generate_token(user.id, &user.email)?;
    tracing::debug!(user_id = %user.id, "Access token issued");

    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer".to_string(),
    }))
}

/// The account behind the presented token
pub async fn me(State(state): State<AppState>, auth: AuthUser) -> Result<Json<UserResponse>> {
    let user = state
        .repo
        .find_user_by_id(auth.user_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized {
            message: "Account no longer exists".to_string(),
        })?;

    Ok(Json(user.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Writer@Example.COM "), "writer@example.com");
    }

    #[test]
    fn test_register_validation() {
        let ok = RegisterRequest {
            email: "writer@example.com".into(),
            password: "long-enough".into(),
        };
        assert!(ok.validate().is_ok());

        let short = RegisterRequest {
            email: "writer@example.com".into(),
            password: "short".into(),
        };
        assert!(short.validate().is_err());

        let bad_email = RegisterRequest {
            email: "not-an-email".into(),
            password: "long-enough".into(),
        };
        let err: AppError = bad_email.validate().unwrap_err().into();
        assert!(matches!(err, AppError::Validation { field: Some(ref f), .. } if f == "email"));
    }
}
