//! QuillForge Common Library
//!
//! Shared code for the QuillForge blog generator including:
//! - Article generation (Gemini transport, client, response extraction)
//! - Post creation service and storage seam
//! - Database models and repository
//! - Error types and handling
//! - Configuration management
//! - Authentication utilities
//! - Metrics

pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod generation;
pub mod metrics;
pub mod posts;

// Re-export commonly used types
pub use config::AppConfig;
pub use db::{DbPool, Repository};
pub use errors::{AppError, Result};
pub use generation::{GeneratedArticle, GenerationClient, GenerationError};
pub use posts::{PostService, PostStore};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
