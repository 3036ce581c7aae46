// ABOUTME: API-facing views of domain rows
// ABOUTME: Views are the only shapes serialized to clients; internal handles never leak

use serde::Serialize;

use crate::types::{Bot, BotRuntime, BotStatus, SourceType, User, UserRole, UserStatus};

/// Client-visible projection of a bot. Deliberately omits `container_id`.
#[derive(Debug, Clone, Serialize)]
pub struct BotView {
    pub id: i64,
    pub name: String,
    pub runtime: BotRuntime,
    pub status: BotStatus,
    pub start_cmd: Option<String>,
    pub source_type: Option<SourceType>,
    pub created_at: String,
}

impl From<&Bot> for BotView {
    fn from(bot: &Bot) -> Self {
        Self {
            id: bot.id,
            name: bot.name.clone(),
            runtime: bot.runtime,
            status: bot.status,
            start_cmd: bot.start_cmd.clone(),
            source_type: bot.source_type,
            created_at: bot.created_at.to_rfc3339(),
        }
    }
}

/// Client-visible projection of a user account. Omits the password hash.
#[derive(Debug, Clone, Serialize)]
pub struct UserView {
    pub id: i64,
    pub email: String,
    pub role: UserRole,
    pub status: UserStatus,
    pub created_at: String,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            role: user.role,
            status: user.status,
            created_at: user.created_at.to_rfc3339(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn bot_view_never_carries_the_container_handle() {
        let bot = Bot {
            id: 7,
            user_id: 1,
            plan_id: 1,
            runtime: BotRuntime::Python,
            name: "echo".to_string(),
            container_id: Some("deadbeef".to_string()),
            status: BotStatus::Running,
            start_cmd: None,
            source_type: Some(SourceType::Zip),
            created_at: Utc::now(),
        };

        let json = serde_json::to_value(BotView::from(&bot)).unwrap();
        assert!(json.get("container_id").is_none());
        assert_eq!(json["id"], 7);
        assert_eq!(json["status"], "RUNNING");
        assert_eq!(json["runtime"], "python");
        assert_eq!(json["source_type"], "zip");
    }
}
