// ABOUTME: Append-only audit trail of state-changing operations

use chrono::Utc;
use sqlx::SqlitePool;

use crate::Result;

pub struct AuditLogStorage {
    pool: SqlitePool,
}

/// One audit entry. `details` is free-form context, e.g. an uploaded
/// filename or the admin who performed a suspension.
#[derive(Debug, Clone)]
pub struct AuditEntry<'a> {
    pub user_id: Option<i64>,
    pub action: &'a str,
    pub target_id: Option<&'a str>,
    pub ip_address: Option<&'a str>,
    pub details: Option<&'a str>,
}

impl AuditLogStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn record(&self, entry: AuditEntry<'_>) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO audit_logs (user_id, action, target_id, ip_address, details, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(entry.user_id)
        .bind(entry.action)
        .bind(entry.target_id)
        .bind(entry.ip_address)
        .bind(entry.details)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DbState;

    #[tokio::test]
    async fn entries_are_appended() {
        let db = DbState::connect("sqlite::memory:").await.unwrap();

        db.audit
            .record(AuditEntry {
                user_id: None,
                action: "bot_start",
                target_id: Some("7"),
                ip_address: Some("10.0.0.1"),
                details: None,
            })
            .await
            .unwrap();

        let (action, target): (String, String) =
            sqlx::query_as("SELECT action, target_id FROM audit_logs")
                .fetch_one(&db.pool)
                .await
                .unwrap();
        assert_eq!(action, "bot_start");
        assert_eq!(target, "7");
    }
}
