// ABOUTME: Operator endpoints for tenant management: listing, suspend, activate

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use botdock_models::{UserRole, UserStatus, UserView};
use botdock_storage::audit::AuditEntry;

use crate::auth::{AdminUser, ClientIp};
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Serialize)]
pub struct UserListResponse {
    pub users: Vec<UserView>,
    pub total: usize,
}

async fn audit(
    state: &AppState,
    actor_id: i64,
    action: &str,
    target_id: i64,
    ip: &str,
    details: &str,
) {
    let target = target_id.to_string();
    let entry = AuditEntry {
        user_id: Some(actor_id),
        action,
        target_id: Some(&target),
        ip_address: Some(ip),
        details: Some(details),
    };
    if let Err(e) = state.db.audit.record(entry).await {
        warn!("Failed to write audit log for {}: {}", action, e);
    }
}

/// List all user accounts
pub async fn list_users(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
) -> Result<impl IntoResponse, ApiError> {
    let users = state.db.users.list().await?;
    let views: Vec<UserView> = users.iter().map(UserView::from).collect();
    let total = views.len();

    Ok(Json(UserListResponse {
        users: views,
        total,
    }))
}

/// Suspend a user account. Suspended users cannot login or use the
/// platform. Only OWNER may suspend ADMIN or OWNER accounts.
pub async fn suspend_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ClientIp(ip): ClientIp,
    Path(user_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let target = state
        .db
        .users
        .get(user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    if target.role.is_admin() && admin.role != UserRole::Owner {
        return Err(ApiError::forbidden(
            "Only OWNER can suspend ADMIN or OWNER accounts",
        ));
    }

    state
        .db
        .users
        .set_status(user_id, UserStatus::Suspended)
        .await?;

    audit(
        &state,
        admin.id,
        "user_suspend",
        user_id,
        &ip,
        &format!("Suspended by {}", admin.email),
    )
    .await;
    info!("User {} suspended by {}", user_id, admin.email);

    Ok(Json(json!({
        "message": format!("User {} has been suspended", target.email)
    })))
}

/// Reactivate a suspended user account
pub async fn activate_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ClientIp(ip): ClientIp,
    Path(user_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let target = state
        .db
        .users
        .get(user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    state
        .db
        .users
        .set_status(user_id, UserStatus::Active)
        .await?;

    audit(
        &state,
        admin.id,
        "user_activate",
        user_id,
        &ip,
        &format!("Activated by {}", admin.email),
    )
    .await;
    info!("User {} activated by {}", user_id, admin.email);

    Ok(Json(json!({
        "message": format!("User {} has been activated", target.email)
    })))
}
