//! Storage seam for generated posts

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Mutex;
use uuid::Uuid;

use crate::db::models::Post;
use crate::errors::{AppError, Result};

/// A post ready to be persisted; the store assigns `id` and `updated_at`
#[derive(Debug, Clone, PartialEq)]
pub struct NewPost {
    pub title: String,
    pub body: String,
    pub seo_keywords: String,
    pub author_id: Uuid,
    /// Generation time
    pub created_at: DateTime<Utc>,
}

/// Persistence for posts
#[async_trait]
pub trait PostStore: Send + Sync {
    /// Persist a post, returning it with server-assigned fields
    async fn insert(&self, post: NewPost) -> Result<Post>;

    /// Posts newest first
    async fn list_posts(&self, offset: u64, limit: u64) -> Result<Vec<Post>>;

    async fn get_post(&self, id: Uuid) -> Result<Option<Post>>;
}

/// In-memory store for tests and local runs
#[derive(Default)]
pub struct MemoryPostStore {
    posts: Mutex<Vec<Post>>,
}

impl MemoryPostStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored posts
    pub fn len(&self) -> usize {
        self.posts.lock().map(|p| p.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<Post>>> {
        self.posts.lock().map_err(|_| AppError::Internal {
            message: "post store lock poisoned".to_string(),
        })
    }
}

#[async_trait]
impl PostStore for MemoryPostStore {
    async fn insert(&self, post: NewPost) -> Result<Post> {
        let created_at = post.created_at.fixed_offset();
        let stored = Post {
            id: Uuid::now_v7(),
            title: post.title,
            body: post.body,
            seo_keywords: post.seo_keywords,
            author_id: post.author_id,
            created_at,
            updated_at: created_at,
        };

        self.lock()?.push(stored.clone());
        Ok(stored)
    }

    async fn list_posts(&self, offset: u64, limit: u64) -> Result<Vec<Post>> {
        let mut posts: Vec<Post> = self.lock()?.iter().rev().cloned().collect();
        // Stable sort keeps later inserts first among equal timestamps
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(posts
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn get_post(&self, id: Uuid) -> Result<Option<Post>> {
        Ok(self.lock()?.iter().find(|p| p.id == id).cloned())
    }
}
