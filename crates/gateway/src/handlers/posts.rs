//! Post handlers: generation (protected) and public reads

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::AppState;
use quillforge_common::{
    auth::AuthUser,
    db::models::Post,
    errors::{AppError, Result},
    posts::MAX_PAGE_SIZE,
};

/// Request to generate a post
#[derive(Debug, Deserialize, Validate)]
pub struct GeneratePostRequest {
    #[validate(length(min = 1, max = 10000))]
    pub prompt: String,
}

/// Pagination parameters for listing posts
#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default)]
    pub skip: u64,

    #[serde(default = "default_limit")]
    pub limit: u64,
}

fn default_limit() -> u64 {
    MAX_PAGE_SIZE
}

#[derive(Debug, Serialize)]
pub struct PostResponse {
    pub id: Uuid,
    pub title: String,
    pub body: String,
    pub seo_keywords: String,
    pub author_id: Uuid,
    pub created_at: DateTime<FixedOffset>,
    pub updated_at: DateTime<FixedOffset>,
}

impl From<Post> for PostResponse {
    fn from(post: Post) -> Self {
        Self {
            id: post.id,
            title: post.title,
            body: post.body,
            seo_keywords: post.seo_keywords,
            author_id: post.author_id,
            created_at: post.created_at,
            updated_at: post.updated_at,
        }
    }
}

impl GeneratePostRequest {
    /// Length limits plus a blank check
    pub fn check(&self) -> Result<()> {
        self.validate()?;
        if self.prompt.trim().is_empty() {
            return Err(AppError::Validation {
                message: "prompt must not be blank".to_string(),
                field: Some("prompt".to_string()),
            });
        }
        Ok(())
    }
}

/// Generate an article from the prompt and store it as a post
pub async fn generate_post(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<GeneratePostRequest>,
) -> Result<(StatusCode, Json<PostResponse>)> {
    request.check()?;

    let post = state
        .posts
        .create_generated_post(&request.prompt, auth.user_id)
        .await?;

    Ok((StatusCode::CREATED, Json(post.into())))
}

/// Public listing, newest first
pub async fn list_posts(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<PostResponse>>> {
    let posts = state.posts.list_posts(params.skip, params.limit).await?;
    Ok(Json(posts.into_iter().map(PostResponse::from).collect()))
}

pub async fn get_post(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<PostResponse>> {
    let post = state.posts.get_post(id).await?;
    Ok(Json(post.into()))
}
