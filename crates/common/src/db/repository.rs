//! Repository pattern for database operations

use crate::db::models::*;
use crate::db::DbPool;
use crate::errors::{AppError, Result};
use crate::posts::{NewPost, PostStore};
use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, SqlErr,
};
use uuid::Uuid;

/// Repository for data access operations
#[derive(Clone)]
pub struct Repository {
    pool: DbPool,
}

impl Repository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> &DatabaseConnection {
        self.pool.connection()
    }

    // ========================================================================
    // Health Check
    // ========================================================================

    /// Ping the database
    pub async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }

    // ========================================================================
    // User Operations
    // ========================================================================

    /// Create a user. Fails with `Duplicate` when the e-mail is taken.
    pub async fn create_user(&self, email: &str, password_hash: String) -> Result<User> {
        if self.find_user_by_email(email).await?.is_some() {
            return Err(duplicate_email());
        }

        let user = UserActiveModel {
            id: Set(Uuid::now_v7()),
            email: Set(email.to_string()),
            password_hash: Set(password_hash),
            created_at: Set(chrono::Utc::now().into()),
        };

        // A concurrent registration can still win the race
        user.insert(self.conn()).await.map_err(|e| match e.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => duplicate_email(),
            _ => AppError::Database(e),
        })
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        UserEntity::find()
            .filter(UserColumn::Email.eq(email))
            .one(self.conn())
            .await
            .map_err(Into::into)
    }

    pub async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>> {
        UserEntity::find_by_id(id)
            .one(self.conn())
            .await
            .map_err(Into::into)
    }
}

fn duplicate_email() -> AppError {
    AppError::Duplicate {
        message: "Email already registered".to_string(),
    }
}

// ============================================================================
// Post Operations
// ============================================================================

#[async_trait]
impl PostStore for Repository {
    async fn insert(&self, post: NewPost) -> Result<Post> {
        let created_at = post.created_at.fixed_offset();

        let model = PostActiveModel {
            id: Set(Uuid::now_v7()),
            title: Set(post.title),
            body: Set(post.body),
            seo_keywords: Set(post.seo_keywords),
            author_id: Set(post.author_id),
            created_at: Set(created_at),
            updated_at: Set(created_at),
        };

        model.insert(self.conn()).await.map_err(Into::into)
    }

    async fn list_posts(&self, offset: u64, limit: u64) -> Result<Vec<Post>> {
        PostEntity::find()
            .order_by_desc(PostColumn::CreatedAt)
            .order_by_desc(PostColumn::Id)
            .offset(offset)
            .limit(limit)
            .all(self.conn())
            .await
            .map_err(Into::into)
    }

    async fn get_post(&self, id: Uuid) -> Result<Option<Post>> {
        PostEntity::find_by_id(id)
            .one(self.conn())
            .await
            .map_err(Into::into)
    }
}
