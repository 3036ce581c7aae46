// ABOUTME: HTTP handlers for registration, login, and the current-user view

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use botdock_auth::{hash_password, verify_password};
use botdock_models::UserStatus;
use botdock_models::UserView;
use botdock_security::validate_email;
use botdock_storage::audit::AuditEntry;

use crate::auth::{ClientIp, CurrentUser};
use crate::error::ApiError;
use crate::state::AppState;

const MIN_PASSWORD_LENGTH: usize = 8;

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
}

impl TokenResponse {
    fn new(access_token: String) -> Self {
        Self {
            access_token,
            token_type: "bearer",
        }
    }
}

async fn audit(state: &AppState, user_id: i64, action: &str, ip: &str, details: Option<&str>) {
    let target = user_id.to_string();
    let entry = AuditEntry {
        user_id: Some(user_id),
        action,
        target_id: Some(&target),
        ip_address: Some(ip),
        details,
    };
    if let Err(e) = state.db.audit.record(entry).await {
        warn!("Failed to write audit log for {}: {}", action, e);
    }
}

/// Register a new account; new users get USER role and ACTIVE status
pub async fn register(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    Json(request): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if !validate_email(&request.email) {
        return Err(ApiError::bad_request("Invalid email format"));
    }

    if request.password.len() < MIN_PASSWORD_LENGTH {
        return Err(ApiError::bad_request(
            "Password must be at least 8 characters",
        ));
    }

    if state
        .db
        .users
        .find_by_email(&request.email)
        .await?
        .is_some()
    {
        return Err(ApiError::conflict("Email already registered"));
    }

    // Argon2 is deliberately slow; keep it off the async workers
    let password = request.password;
    let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(ApiError::internal)?
        .map_err(ApiError::internal)?;

    let user = state.db.users.create(&request.email, &password_hash).await?;

    audit(&state, user.id, "user_register", &ip, None).await;
    info!("New user registered: {} (ID: {})", user.email, user.id);

    let token = state
        .auth
        .create_access_token(user.id)
        .map_err(ApiError::internal)?;

    Ok((StatusCode::CREATED, Json(TokenResponse::new(token))))
}

/// Login with email and password, returning a fresh access token
pub async fn login(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    Json(request): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .db
        .users
        .find_by_email(&request.email)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid email or password"))?;

    let password = request.password;
    let hash = user.password_hash.clone();
    let verified = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(ApiError::internal)?;
    if !verified {
        return Err(ApiError::unauthorized("Invalid email or password"));
    }

    if user.status == UserStatus::Suspended {
        return Err(ApiError::forbidden(
            "Account suspended. Contact administrator.",
        ));
    }

    audit(&state, user.id, "user_login", &ip, None).await;
    info!("User logged in: {} (ID: {})", user.email, user.id);

    let token = state
        .auth
        .create_access_token(user.id)
        .map_err(ApiError::internal)?;

    Ok(Json(TokenResponse::new(token)))
}

/// Current authenticated user information
pub async fn me(CurrentUser(user): CurrentUser) -> Json<UserView> {
    Json(UserView::from(&user))
}
