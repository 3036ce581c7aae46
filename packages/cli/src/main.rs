// ABOUTME: Botdock server entry point
// ABOUTME: Wires storage, artifact store, sandbox driver, and lifecycle into the router

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::Method;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use tracing_subscriber::EnvFilter;

use botdock_api::{create_router, AppState};
use botdock_artifacts::ArtifactStore;
use botdock_auth::AuthConfig;
use botdock_lifecycle::LifecycleManager;
use botdock_sandbox::SandboxDriver;
use botdock_storage::DbState;

mod config;
mod middleware;

use config::Config;
use middleware::rate_limit::{RateLimitConfig, RateLimitLayer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();

    info!("Starting Botdock server...");

    let db = DbState::connect(&config.database_url).await?;
    db.plans.seed_defaults().await?;

    let artifacts = ArtifactStore::new(&config.bot_storage_path);
    let driver = Arc::new(SandboxDriver::new());
    let lifecycle = Arc::new(LifecycleManager::new(db.clone(), artifacts, driver));
    let auth = Arc::new(AuthConfig::from_env());

    let state = AppState::new(db, lifecycle, auth);

    // Create CORS layer
    let cors = if config.cors_origin == "*" {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
            .allow_headers(Any)
    } else {
        CorsLayer::new()
            .allow_origin(config.cors_origin.parse::<axum::http::HeaderValue>()?)
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
            .allow_headers(Any)
    };

    let rate_limiter = RateLimitLayer::new(RateLimitConfig::default());

    let app = create_router(state)
        .layer(axum::middleware::from_fn_with_state(
            rate_limiter,
            middleware::rate_limit::enforce,
        ))
        .layer(cors);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
