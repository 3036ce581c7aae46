// ABOUTME: Authentication context for API requests
// ABOUTME: Bearer-token extractors resolving the acting user, plus client IP

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use std::net::SocketAddr;

use botdock_models::{User, UserStatus};

use crate::error::ApiError;
use crate::state::AppState;

/// The authenticated, non-suspended user behind a request
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

/// The authenticated user, additionally holding ADMIN or OWNER role
#[derive(Debug, Clone)]
pub struct AdminUser(pub User);

/// Best-effort client address for audit trails: first hop of
/// X-Forwarded-For when present, else the socket peer
#[derive(Debug, Clone)]
pub struct ClientIp(pub String);

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

/// Resolve a raw token to a live user account. Shared by the HTTP
/// extractor and the WebSocket log broker.
pub async fn resolve_user(state: &AppState, token: &str) -> Result<User, ApiError> {
    let claims = state
        .auth
        .decode_token(token)
        .map_err(|_| ApiError::unauthorized("Invalid or expired token"))?;

    let user_id = claims
        .user_id()
        .ok_or_else(|| ApiError::unauthorized("Invalid token payload"))?;

    let user = state
        .db
        .users
        .get(user_id)
        .await?
        .ok_or_else(|| ApiError::unauthorized("User not found"))?;

    if user.status == UserStatus::Suspended {
        return Err(ApiError::forbidden(
            "Account suspended. Contact administrator.",
        ));
    }

    Ok(user)
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token =
            bearer_token(parts).ok_or_else(|| ApiError::unauthorized("Not authenticated"))?;
        let token = token.to_string();
        let user = resolve_user(state, &token).await?;
        Ok(CurrentUser(user))
    }
}

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        if !user.role.is_admin() {
            return Err(ApiError::forbidden(
                "Insufficient permissions. Required roles: ADMIN, OWNER",
            ));
        }
        Ok(AdminUser(user))
    }
}

impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(forwarded) = parts
            .headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
        {
            if let Some(first) = forwarded.split(',').next() {
                return Ok(ClientIp(first.trim().to_string()));
            }
        }

        let ip = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|info| info.0.ip().to_string())
            .unwrap_or_else(|| "unknown".to_string());

        Ok(ClientIp(ip))
    }
}
