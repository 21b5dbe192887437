//! Post creation service
//!
//! Orchestrates one generation call per request and persists the result.
//! A post row is written only after generation fully succeeds.

mod store;

pub use store::{MemoryPostStore, NewPost, PostStore};

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::db::models::Post;
use crate::errors::{AppError, Result};
use crate::generation::GenerationClient;
use crate::metrics;

/// Upper bound on a page of posts
pub const MAX_PAGE_SIZE: u64 = 100;

#[derive(Clone)]
pub struct PostService {
    generator: Arc<GenerationClient>,
    store: Arc<dyn PostStore>,
}

impl PostService {
    pub fn new(generator: Arc<GenerationClient>, store: Arc<dyn PostStore>) -> Self {
        Self { generator, store }
    }

    pub fn generator(&self) -> &GenerationClient {
        &self.generator
    }

    /// Generate an article from `prompt` and store it under `author_id`.
    /// Generation failures pass through with their classification.
    #[instrument(skip(self, prompt), fields(prompt_chars = prompt.chars().count()))]
    pub async fn create_generated_post(&self, prompt: &str, author_id: Uuid) -> Result<Post> {
        let article = self.generator.generate_article(prompt).await?;

        let post = self
            .store
            .insert(NewPost {
                title: article.title,
                body: article.body,
                seo_keywords: article.seo_keywords,
                author_id,
                created_at: Utc::now(),
            })
            .await?;

        metrics::record_post_created();
        info!(post_id = %post.id, author_id = %author_id, "Post created");

        Ok(post)
    }

    /// Posts newest first; `limit` is capped at [`MAX_PAGE_SIZE`]
    pub async fn list_posts(&self, offset: u64, limit: u64) -> Result<Vec<Post>> {
        self.store
            .list_posts(offset, limit.min(MAX_PAGE_SIZE))
            .await
    }

    pub async fn get_post(&self, id: Uuid) -> Result<Post> {
        self.store
            .get_post(id)
            .await?
            .ok_or_else(|| AppError::PostNotFound { id: id.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GenerationConfig;
    use crate::generation::{GenerationError, ScriptedTransport};

    fn service(reply: &str) -> (PostService, Arc<MemoryPostStore>) {
        let transport = Arc::new(ScriptedTransport::new().with_reply(reply));
        let config = GenerationConfig {
            api_key: Some("unit-test-key".to_string()),
            ..GenerationConfig::default()
        };
        let client = Arc::new(GenerationClient::new(&config, transport));
        let store = Arc::new(MemoryPostStore::new());
        (PostService::new(client, store.clone()), store)
    }

    #[tokio::test]
    async fn test_create_stores_article_for_author() {
        let (service, store) =
            service(r#"{"title":"Tides","body":"The moon pulls.","seo_keywords":["moon","sea"]}"#);
        let author = Uuid::now_v7();

        let post = service.create_generated_post("tides", author).await.unwrap();
        assert_eq!(post.title, "Tides");
        assert_eq!(post.seo_keywords, "moon, sea");
        assert_eq!(post.author_id, author);
        assert_eq!(store.len(), 1);
        assert_eq!(service.get_post(post.id).await.unwrap(), post);
    }

    #[tokio::test]
    async fn test_malformed_generation_writes_nothing() {
        let (service, store) = service("no json here");

        let err = service
            .create_generated_post("tides", Uuid::now_v7())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::Generation(GenerationError::MalformedResponse { .. })
        ));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_get_missing_post_is_not_found() {
        let (service, _) = service("{}");
        let err = service.get_post(Uuid::now_v7()).await.unwrap_err();
        assert!(matches!(err, AppError::PostNotFound { .. }));
    }
}
