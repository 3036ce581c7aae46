// ABOUTME: HTTP API layer for Botdock providing REST endpoints and routing
// ABOUTME: Integration layer that wires handlers to the lifecycle core

use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde_json::json;

pub mod admin_handlers;
pub mod auth;
pub mod auth_handlers;
pub mod bots_handlers;
pub mod error;
pub mod logs;
pub mod state;

pub use error::ApiError;
pub use state::AppState;

/// Upper bound on uploaded source payloads
const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Health check endpoint for monitoring
async fn health() -> Json<serde_json::Value> {
    Json(json!({"status": "healthy", "service": "botdock"}))
}

/// Build the full application router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        // Auth
        .route("/auth/register", post(auth_handlers::register))
        .route("/auth/login", post(auth_handlers::login))
        .route("/auth/me", get(auth_handlers::me))
        // Admin tenant management
        .route("/admin/users", get(admin_handlers::list_users))
        .route(
            "/admin/users/{user_id}/suspend",
            post(admin_handlers::suspend_user),
        )
        .route(
            "/admin/users/{user_id}/activate",
            post(admin_handlers::activate_user),
        )
        // Bot lifecycle
        .route(
            "/bots",
            post(bots_handlers::create_bot).get(bots_handlers::list_bots),
        )
        .route("/bots/{bot_id}/upload", post(bots_handlers::upload_bot_files))
        .route("/bots/{bot_id}/start", post(bots_handlers::start_bot))
        .route("/bots/{bot_id}/stop", post(bots_handlers::stop_bot))
        .route("/bots/{bot_id}/restart", post(bots_handlers::restart_bot))
        .route("/bots/{bot_id}", delete(bots_handlers::delete_bot))
        // Live console stream
        .route("/bots/{bot_id}/logs", get(logs::bot_logs))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}
