//! Configuration management for QuillForge services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config/default, config/{APP_ENV}, config/local)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Conventional variable holding the Gemini credential
pub const GEMINI_API_KEY_VAR: &str = "GEMINI_API_KEY";

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Article generation configuration
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Authentication configuration
    pub auth: AuthConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Origins allowed by CORS
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Database URL
    pub url: String,

    /// Maximum number of connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Idle timeout in seconds
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

#[derive(Clone, Deserialize, Serialize)]
pub struct GenerationConfig {
    /// API key for the text-generation service
    pub api_key: Option<String>,

    /// API base URL
    #[serde(default = "default_generation_api_base")]
    pub api_base: String,

    /// Candidate models, most preferred first
    #[serde(default = "default_generation_models")]
    pub models: Vec<String>,

    /// Request timeout in seconds
    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,

    /// Output token ceiling passed to the model
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

#[derive(Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    /// JWT secret for token signing
    pub jwt_secret: String,

    /// JWT expiration in seconds
    #[serde(default = "default_jwt_expiration")]
    pub jwt_expiration_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error) or a full filter directive
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8000 }
fn default_cors_origins() -> Vec<String> {
    vec![
        "http://localhost:3000".to_string(),
        "http://localhost:8080".to_string(),
        "http://127.0.0.1:3000".to_string(),
        "http://127.0.0.1:8080".to_string(),
    ]
}
fn default_max_connections() -> u32 { 20 }
fn default_min_connections() -> u32 { 2 }
fn default_connect_timeout() -> u64 { 10 }
fn default_idle_timeout() -> u64 { 300 }
fn default_generation_api_base() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}
fn default_generation_models() -> Vec<String> {
    vec![
        "gemini-2.0-flash-exp".to_string(),
        "gemini-1.5-flash".to_string(),
        "gemini-pro".to_string(),
    ]
}
fn default_generation_timeout() -> u64 { 120 }
fn default_max_output_tokens() -> u32 { 4096 }
fn default_temperature() -> f32 { 0.7 }
fn default_jwt_expiration() -> u64 { 1800 }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { false }
fn default_metrics_port() -> u16 { 0 }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: default_cors_origins(),
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: default_generation_api_base(),
            models: default_generation_models(),
            timeout_secs: default_generation_timeout(),
            max_output_tokens: default_max_output_tokens(),
            temperature: default_temperature(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_port: default_metrics_port(),
        }
    }
}

impl fmt::Debug for GenerationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationConfig")
            .field("api_key", &self.api_key.as_deref().map(mask_secret))
            .field("api_base", &self.api_base)
            .field("models", &self.models)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_output_tokens", &self.max_output_tokens)
            .field("temperature", &self.temperature)
            .finish()
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"<redacted>")
            .field("jwt_expiration_secs", &self.jwt_expiration_secs)
            .finish()
    }
}

/// Render a secret for logs: first and last four characters of long
/// values, `***` otherwise.
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() > 10 {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}...{}", head, tail)
    } else {
        "***".to_string()
    }
}

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))

            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))

            // Load local overrides
            .add_source(File::with_name("config/local").required(false))

            // Load from environment variables with APP__ prefix
            // e.g., APP__SERVER__PORT=8081
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("server.cors_origins")
                    .with_list_parse_key("generation.models")
                    .try_parsing(true)
            )

            .build()?;

        let mut config: AppConfig = config.try_deserialize()?;
        config.generation.apply_env_fallback(std::env::var(GEMINI_API_KEY_VAR).ok());
        Ok(config)
    }

    /// Load from a specific TOML file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )
            .build()?;

        let mut config: AppConfig = config.try_deserialize()?;
        config.generation.apply_env_fallback(std::env::var(GEMINI_API_KEY_VAR).ok());
        Ok(config)
    }

    /// Socket address string the server binds to
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl GenerationConfig {
    /// Use `fallback` as the credential when none was configured explicitly
    pub fn apply_env_fallback(&mut self, fallback: Option<String>) {
        let missing = self
            .api_key
            .as_deref()
            .map(|key| key.trim().is_empty())
            .unwrap_or(true);
        if missing {
            if let Some(key) = fallback.filter(|k| !k.trim().is_empty()) {
                self.api_key = Some(key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_defaults() {
        let config = GenerationConfig::default();
        assert!(config.api_key.is_none());
        assert_eq!(config.models[0], "gemini-2.0-flash-exp");
        assert_eq!(config.models.len(), 3);
    }

    #[test]
    fn test_env_fallback_only_fills_missing_key() {
        let mut config = GenerationConfig::default();
        config.apply_env_fallback(Some("from-env".to_string()));
        assert_eq!(config.api_key.as_deref(), Some("from-env"));

        let mut config = GenerationConfig {
            api_key: Some("explicit".to_string()),
            ..GenerationConfig::default()
        };
        config.apply_env_fallback(Some("from-env".to_string()));
        assert_eq!(config.api_key.as_deref(), Some("explicit"));

        let mut config = GenerationConfig {
            api_key: Some("  ".to_string()),
            ..GenerationConfig::default()
        };
        config.apply_env_fallback(Some("".to_string()));
        assert_eq!(config.api_key.as_deref(), Some("  "));
    }

    #[test]
    fn test_mask_secret() {
        assert_eq!(mask_secret("AIzaSyA1234567890wxyz"), "AIza...wxyz");
        assert_eq!(mask_secret("short"), "***");
    }

    #[test]
    fn test_debug_never_prints_secrets() {
        let config = GenerationConfig {
            api_key: Some("AIzaSyA1234567890wxyz".to_string()),
            ..GenerationConfig::default()
        };
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("1234567890"));

        let auth = AuthConfig {
            jwt_secret: "super-secret-value".to_string(),
            jwt_expiration_secs: 60,
        };
        assert!(!format!("{:?}", auth).contains("super-secret-value"));
    }

    #[test]
    fn test_server_defaults() {
        let server = ServerConfig::default();
        assert_eq!(server.port, 8000);
        assert!(server
            .cors_origins
            .contains(&"http://localhost:3000".to_string()));
    }
}
