// ABOUTME: HTTP request handlers for bot CRUD, uploads, and lifecycle operations
// ABOUTME: Thin wrappers over the lifecycle manager; ownership checks live there

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use botdock_lifecycle::CreateBotInput;
use botdock_models::BotView;
use botdock_runtimes::lookup;

use crate::auth::{ClientIp, CurrentUser};
use crate::error::ApiError;
use crate::state::AppState;

fn default_plan_id() -> i64 {
    1
}

#[derive(Deserialize)]
pub struct CreateBotRequest {
    pub name: String,
    /// Runtime tag, resolved through the registry so unknown tags answer
    /// with the registry's own error
    pub runtime: String,
    pub start_cmd: Option<String>,
    #[serde(default = "default_plan_id")]
    pub plan_id: i64,
}

#[derive(Serialize)]
pub struct BotListResponse {
    pub bots: Vec<BotView>,
    pub total: usize,
}

/// Create a new bot instance
pub async fn create_bot(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ClientIp(ip): ClientIp,
    Json(request): Json<CreateBotRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (runtime, _) = lookup(&request.runtime).map_err(|e| ApiError::bad_request(e.to_string()))?;

    let bot = state
        .lifecycle
        .create_bot(
            &user,
            &ip,
            CreateBotInput {
                name: request.name,
                runtime,
                start_cmd: request.start_cmd,
                plan_id: request.plan_id,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(BotView::from(&bot))))
}

/// List all bots owned by the current user
pub async fn list_bots(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<impl IntoResponse, ApiError> {
    let bots = state.lifecycle.list_bots(&user).await?;
    let views: Vec<BotView> = bots.iter().map(BotView::from).collect();
    let total = views.len();

    Ok(Json(BotListResponse { bots: views, total }))
}

/// Upload bot source code (zip or single file) as multipart field `file`
pub async fn upload_bot_files(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ClientIp(ip): ClientIp,
    Path(bot_id): Path<i64>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let mut upload: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| ApiError::bad_request("Invalid upload"))?
    {
        if field.name() == Some("file") {
            let filename = field
                .file_name()
                .map(str::to_string)
                .unwrap_or_else(|| "upload".to_string());
            let data = field
                .bytes()
                .await
                .map_err(|_| ApiError::bad_request("Invalid upload"))?;
            upload = Some((filename, data.to_vec()));
            break;
        }
    }

    let (filename, payload) = upload.ok_or_else(|| ApiError::bad_request("No file provided"))?;

    let stored = state
        .lifecycle
        .upload(&user, &ip, bot_id, filename, payload)
        .await?;

    Ok(Json(json!({
        "message": "Files uploaded successfully",
        "filename": stored
    })))
}

/// Start a bot's container, creating it on first start
pub async fn start_bot(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ClientIp(ip): ClientIp,
    Path(bot_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let bot = state.lifecycle.start(&user, &ip, bot_id).await?;
    Ok(Json(BotView::from(&bot)))
}

/// Stop a bot's container
pub async fn stop_bot(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ClientIp(ip): ClientIp,
    Path(bot_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let bot = state.lifecycle.stop(&user, &ip, bot_id).await?;
    Ok(Json(BotView::from(&bot)))
}

/// Restart a bot's container
pub async fn restart_bot(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ClientIp(ip): ClientIp,
    Path(bot_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let bot = state.lifecycle.restart(&user, &ip, bot_id).await?;
    Ok(Json(BotView::from(&bot)))
}

/// Delete a bot, its container, and its artifact directory
pub async fn delete_bot(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ClientIp(ip): ClientIp,
    Path(bot_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    state.lifecycle.delete(&user, &ip, bot_id).await?;
    info!("Bot {} deleted via API", bot_id);
    Ok(StatusCode::NO_CONTENT)
}
