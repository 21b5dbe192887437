//! QuillForge API Gateway
//!
//! HTTP surface for the blog generator.
//! Handles:
//! - Account registration and bearer-token login
//! - Article generation (protected) and public post reads
//! - Health reporting for the database and the generation API
//! - Observability (logging, metrics, request ids)

mod handlers;

use anyhow::Context;
use axum::{
    extract::FromRef,
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use quillforge_common::{
    auth::JwtManager,
    config::AppConfig,
    db::{DbPool, Repository},
    generation::{GeminiTransport, GenerationClient},
    metrics,
    posts::PostService,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub repo: Repository,
    pub posts: PostService,
    pub jwt: Arc<JwtManager>,
}

impl FromRef<AppState> for Arc<JwtManager> {
    fn from_ref(state: &AppState) -> Self {
        state.jwt.clone()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Arc::new(AppConfig::load().context("Failed to load configuration")?);

    init_tracing(&config);

    info!("Starting QuillForge API Gateway v{}", quillforge_common::VERSION);
    info!(generation = ?config.generation, auth = ?config.auth, "Configuration loaded");

    // Initialize metrics
    if config.observability.metrics_port != 0 {
        let addr = SocketAddr::from(([0, 0, 0, 0], config.observability.metrics_port));
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .set_buckets_for_metric(
                Matcher::Full(metrics::generation_duration_metric()),
                metrics::GENERATION_BUCKETS,
            )?
            .install()
            .context("Failed to install Prometheus exporter")?;
        info!("Metrics exporter listening on {}", addr);
    }
    metrics::register_metrics();

    // Initialize database pool; an unreachable server is reported, not fatal
    let db = DbPool::new(&config.database).await?;
    match db.ping().await {
        Ok(()) => {
            if let Err(e) = db.ensure_schema().await {
                warn!(error = %e, "Could not create database tables");
            }
        }
        Err(e) => warn!(error = %e, "Database is not reachable, requests touching it will fail"),
    }
    let repo = Repository::new(db);

    // Generation pipeline
    let transport = Arc::new(GeminiTransport::new(
        &config.generation.api_base,
        config.generation.timeout_secs,
    )?);
    let generator = Arc::new(GenerationClient::new(&config.generation, transport));
    match generator.check_connection().await {
        Ok(message) => info!("{}", message),
        Err(e) => warn!(error = %e, "Article generation will not work until the generation API is reachable"),
    }
    let posts = PostService::new(generator, Arc::new(repo.clone()));

    let jwt = Arc::new(JwtManager::new(
        &config.auth.jwt_secret,
        config.auth.jwt_expiration_secs,
    ));

    // Create app state
    let state = AppState {
        config: config.clone(),
        repo,
        posts,
        jwt,
    };

    // Build the router
    let app = create_router(state);

    // Start the server
    let addr = config.bind_address();
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.observability.log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if config.observability.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.server.cors_origins);

    Router::new()
        .route("/", get(handlers::health::index))
        .route("/health", get(handlers::health::health))

        // Account endpoints
        .route("/register", post(handlers::users::register))
        .route("/token", post(handlers::users::token))
        .route("/me", get(handlers::users::me))

        // Post endpoints
        .route("/generate-post", post(handlers::posts::generate_post))
        .route("/posts", get(handlers::posts::list_posts))
        .route("/posts/{id}", get(handlers::posts::get_post))

        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(cors)
                .layer(CompressionLayer::new()),
        )
        .with_state(state)
}

/// CORS for the configured browser origins; unparseable entries are skipped
fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}
