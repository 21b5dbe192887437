//! Banner and health check handlers

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::AppState;

#[derive(Serialize)]
pub struct IndexResponse {
    pub message: String,
    pub version: String,
    pub endpoints: Endpoints,
}

#[derive(Serialize)]
pub struct Endpoints {
    pub register: &'static str,
    pub login: &'static str,
    pub me: &'static str,
    pub generate_post: &'static str,
    pub get_posts: &'static str,
    pub get_post: &'static str,
    pub health: &'static str,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub database: CheckResult,
    pub generation_api: CheckResult,
}

#[derive(Serialize)]
pub struct CheckResult {
    pub connected: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
}

impl CheckResult {
    fn up(message: String, started: std::time::Instant) -> Self {
        Self {
            connected: true,
            message,
            latency_ms: Some(started.elapsed().as_millis() as u64),
        }
    }

    fn down(message: String) -> Self {
        Self {
            connected: false,
            message,
            latency_ms: None,
        }
    }
}

/// Service banner listing the available endpoints
pub async fn index() -> Json<IndexResponse> {
    Json(IndexResponse {
        message: "QuillForge API".to_string(),
        version: quillforge_common::VERSION.to_string(),
        endpoints: Endpoints {
            register: "POST /register",
            login: "POST /token",
            me: "GET /me (protected)",
            generate_post: "POST /generate-post (protected)",
            get_posts: "GET /posts (public)",
            get_post: "GET /posts/{id} (public)",
            health: "GET /health",
        },
    })
}

/// Database and generation API status; 503 when either is down
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let started = std::time::Instant::now();
    let database = match state.repo.ping().await {
        Ok(()) => CheckResult::up("Database connection OK".to_string(), started),
        Err(e) => CheckResult::down(e.to_string()),
    };

    let started = std::time::Instant::now();
    let generation_api = match state.posts.generator().check_connection().await {
        Ok(message) => CheckResult::up(message, started),
        Err(e) => CheckResult::down(e.to_string()),
    };

    let healthy = database.connected && generation_api.connected;
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(HealthResponse {
            status: if healthy { "healthy" } else { "unhealthy" }.to_string(),
            database,
            generation_api,
        }),
    )
}
