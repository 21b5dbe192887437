//! Database layer for QuillForge
//!
//! Provides:
//! - SeaORM entity models
//! - Repository pattern for data access
//! - Connection pool management and schema bootstrap

pub mod models;
mod repository;

pub use repository::Repository;

use crate::config::DatabaseConfig;
use crate::errors::{AppError, Result};
use crate::generation::truncate_diagnostic;
use models::{PostEntity, UserEntity};
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, EntityTrait, Schema,
};
use std::time::Duration;
use tracing::info;

/// Database connection pool wrapper
#[derive(Clone)]
pub struct DbPool {
    conn: DatabaseConnection,
}

impl DbPool {
    /// Create a new database pool from configuration.
    /// Connections open on first use, so an unreachable server only
    /// surfaces through [`DbPool::ping`] and queries.
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        info!("Configuring database pool...");

        let mut opts = ConnectOptions::new(&config.url);
        opts.max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .connect_lazy(true)
            .sqlx_logging(false);

        let conn = Database::connect(opts)
            .await
            .map_err(|e| AppError::DatabaseConnection {
                message: describe_connection_error(&e.to_string()),
            })?;

        info!("Database pool ready");

        Ok(Self { conn })
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.conn
    }

    /// Ping the database to check connectivity
    pub async fn ping(&self) -> Result<()> {
        self.conn
            .execute_unprepared("SELECT 1")
            .await
            .map(|_| ())
            .map_err(|e| AppError::DatabaseConnection {
                message: describe_connection_error(&e.to_string()),
            })
    }

    /// Create the `users` and `posts` tables when they do not exist yet
    pub async fn ensure_schema(&self) -> Result<()> {
        create_table(&self.conn, UserEntity).await?;
        create_table(&self.conn, PostEntity).await?;
        info!("Database schema ready");
        Ok(())
    }
}

async fn create_table<E>(conn: &DatabaseConnection, entity: E) -> Result<()>
where
    E: EntityTrait,
{
    let backend = conn.get_database_backend();
    let schema = Schema::new(backend);

    let mut stmt = schema.create_table_from_entity(entity);
    stmt.if_not_exists();

    conn.execute(backend.build(&stmt)).await?;
    Ok(())
}

/// Turn a raw driver error into an operator-facing hint
pub fn describe_connection_error(raw: &str) -> String {
    let lower = raw.to_lowercase();

    if lower.contains("password") || lower.contains("authentication") {
        "Database authentication failed. Check the credentials in the database URL".to_string()
    } else if lower.contains("could not translate host name")
        || lower.contains("could not resolve")
        || lower.contains("failed to lookup address")
        || lower.contains("name or service not known")
    {
        "Could not resolve the database hostname. Check the database URL".to_string()
    } else if lower.contains("connection") && (lower.contains("refused") || lower.contains("timeout"))
    {
        "Could not reach the database server. Check that it is running and accepts connections from this host".to_string()
    } else if lower.contains("ssl") || lower.contains("sslmode") || lower.contains("tls") {
        "SSL negotiation with the database failed. Hosted databases usually need ?sslmode=require on the URL".to_string()
    } else if lower.contains("timeout") || lower.contains("timed out") {
        "Timed out connecting to the database. The server may be unreachable or slow".to_string()
    } else {
        truncate_diagnostic(raw)
    }
}
