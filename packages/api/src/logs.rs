// ABOUTME: WebSocket log broker streaming bot console output to its owner
// ABOUTME: Read-only: replays a bounded tail, then pumps the live follow stream

use std::time::Duration;

use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tracing::{error, info};

use botdock_models::User;

use crate::auth::resolve_user;
use crate::state::AppState;

/// Lines of history replayed before the live stream
const RECENT_TAIL_LINES: usize = 50;

/// Pacing between emitted lines so one busy sandbox cannot starve the
/// event loop
const PACING: Duration = Duration::from_millis(10);

#[derive(Deserialize)]
pub struct LogsQuery {
    pub token: Option<String>,
}

/// WebSocket endpoint for streaming bot logs in real time.
///
/// The bearer credential arrives as a `token` query parameter or an
/// Authorization header; authentication and ownership failures close the
/// socket with a policy-violation code.
pub async fn bot_logs(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(bot_id): Path<i64>,
    Query(query): Query<LogsQuery>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let token = query.token.or_else(|| {
        headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::to_string)
    });

    ws.on_upgrade(move |socket| logs_session(socket, state, bot_id, token))
}

async fn authenticate(state: &AppState, token: Option<&str>) -> Option<User> {
    resolve_user(state, token?).await.ok()
}

fn close_frame(code: u16) -> Message {
    Message::Close(Some(CloseFrame {
        code,
        reason: "".into(),
    }))
}

async fn logs_session(socket: WebSocket, state: AppState, bot_id: i64, token: Option<String>) {
    let (mut sender, mut receiver) = socket.split();

    let Some(user) = authenticate(&state, token.as_deref()).await else {
        let _ = sender.send(Message::Text("Authentication failed".into())).await;
        let _ = sender.send(close_frame(close_code::POLICY)).await;
        return;
    };

    let bot = match state.lifecycle.owned_bot(&user, bot_id).await {
        Ok(bot) => bot,
        Err(e) => {
            let _ = sender
                .send(Message::Text(format!("Authorization failed: {}", e).into()))
                .await;
            let _ = sender.send(close_frame(close_code::POLICY)).await;
            return;
        }
    };

    let Some(handle) = bot.container_id else {
        let _ = sender
            .send(Message::Text(
                "Bot has no container. Please start the bot first.".into(),
            ))
            .await;
        let _ = sender.send(close_frame(close_code::NORMAL)).await;
        return;
    };

    info!("User {} connected to logs for bot {}", user.id, bot_id);

    let driver = state.lifecycle.driver();

    let recent = match driver.tail_logs(&handle, Some(RECENT_TAIL_LINES)).await {
        Ok(recent) => recent,
        Err(e) => {
            error!("Error fetching recent logs for bot {}: {}", bot_id, e);
            let _ = sender
                .send(Message::Text(format!("Error: {}", e).into()))
                .await;
            let _ = sender.send(close_frame(close_code::ERROR)).await;
            return;
        }
    };

    let preamble = format!("=== Recent Logs ===\n{}\n=== Live Stream ===\n", recent);
    if sender.send(Message::Text(preamble.into())).await.is_err() {
        return;
    }

    let mut stream = match driver.follow_logs(&handle).await {
        Ok(stream) => stream,
        Err(e) => {
            error!("Error opening log stream for bot {}: {}", bot_id, e);
            let _ = sender
                .send(Message::Text(format!("Error: {}", e).into()))
                .await;
            let _ = sender.send(close_frame(close_code::ERROR)).await;
            return;
        }
    };

    loop {
        tokio::select! {
            item = stream.receiver.recv() => match item {
                Some(Ok(line)) => {
                    if sender.send(Message::Text(line.into())).await.is_err() {
                        return;
                    }
                    tokio::time::sleep(PACING).await;
                }
                Some(Err(e)) => {
                    error!("Error streaming logs for bot {}: {}", bot_id, e);
                    let _ = sender
                        .send(Message::Text(format!("Error: {}", e).into()))
                        .await;
                    let _ = sender.send(close_frame(close_code::ERROR)).await;
                    return;
                }
                // Container exited; end the session cleanly
                None => break,
            },
            incoming = receiver.next() => match incoming {
                // The broker never accepts data; anything readable is
                // dropped, a close or error ends the session
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => {
                    info!("Log subscriber for bot {} disconnected", bot_id);
                    return;
                }
                Some(Ok(_)) => {}
            },
        }
    }

    let _ = sender.send(close_frame(close_code::NORMAL)).await;
}
