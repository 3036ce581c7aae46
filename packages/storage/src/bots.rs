// ABOUTME: CRUD storage for bot rows
// ABOUTME: Enum columns are stored as their contract strings and validated on read

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use botdock_models::{Bot, BotRuntime, BotStatus, SourceType};

use crate::Result;

pub struct BotStorage {
    pool: SqlitePool,
}

/// Fields for a new bot row; state starts at CREATED with no container
#[derive(Debug, Clone)]
pub struct BotCreateInput {
    pub user_id: i64,
    pub plan_id: i64,
    pub runtime: BotRuntime,
    pub name: String,
    pub start_cmd: Option<String>,
}

impl BotStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn bot_from_row(row: &SqliteRow) -> Result<Bot> {
        let runtime: String = row.try_get("runtime")?;
        let status: String = row.try_get("status")?;
        let source_type: Option<String> = row.try_get("source_type")?;

        Ok(Bot {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            plan_id: row.try_get("plan_id")?,
            runtime: BotRuntime::from_str(&runtime)?,
            name: row.try_get("name")?,
            container_id: row.try_get("container_id")?,
            status: BotStatus::from_str(&status)?,
            start_cmd: row.try_get("start_cmd")?,
            source_type: source_type
                .as_deref()
                .map(SourceType::from_str)
                .transpose()?,
            created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        })
    }

    pub async fn create(&self, input: BotCreateInput) -> Result<Bot> {
        let result = sqlx::query(
            r#"
            INSERT INTO bots (user_id, plan_id, runtime, name, status, start_cmd, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(input.user_id)
        .bind(input.plan_id)
        .bind(input.runtime.as_str())
        .bind(&input.name)
        .bind(BotStatus::Created.as_str())
        .bind(&input.start_cmd)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        self.get(id)
            .await?
            .ok_or_else(|| crate::StorageError::NotFound(format!("bot {}", id)))
    }

    pub async fn get(&self, id: i64) -> Result<Option<Bot>> {
        let row = sqlx::query("SELECT * FROM bots WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::bot_from_row).transpose()
    }

    pub async fn find_by_owner_and_name(&self, user_id: i64, name: &str) -> Result<Option<Bot>> {
        let row = sqlx::query("SELECT * FROM bots WHERE user_id = ? AND name = ?")
            .bind(user_id)
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::bot_from_row).transpose()
    }

    pub async fn list_for_user(&self, user_id: i64) -> Result<Vec<Bot>> {
        let rows = sqlx::query("SELECT * FROM bots WHERE user_id = ? ORDER BY id")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(Self::bot_from_row).collect()
    }

    pub async fn count_for_user(&self, user_id: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM bots WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn set_status(&self, id: i64, status: BotStatus) -> Result<()> {
        sqlx::query("UPDATE bots SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn set_container_id(&self, id: i64, container_id: Option<&str>) -> Result<()> {
        sqlx::query("UPDATE bots SET container_id = ? WHERE id = ?")
            .bind(container_id)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn set_source_type(&self, id: i64, source_type: SourceType) -> Result<()> {
        sqlx::query("UPDATE bots SET source_type = ? WHERE id = ?")
            .bind(source_type.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM bots WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DbState;

    async fn setup() -> DbState {
        let db = DbState::connect("sqlite::memory:").await.unwrap();
        sqlx::query(
            "INSERT INTO users (email, password_hash, created_at) VALUES ('a@x.io', 'h', ?)",
        )
        .bind(Utc::now())
        .execute(&db.pool)
        .await
        .unwrap();
        sqlx::query("INSERT INTO plans (name, max_bots) VALUES ('Free', 1)")
            .execute(&db.pool)
            .await
            .unwrap();
        db
    }

    fn input(name: &str) -> BotCreateInput {
        BotCreateInput {
            user_id: 1,
            plan_id: 1,
            runtime: BotRuntime::Python,
            name: name.to_string(),
            start_cmd: None,
        }
    }

    #[tokio::test]
    async fn create_and_fetch_round_trip() {
        let db = setup().await;
        let bot = db.bots.create(input("echo")).await.unwrap();

        assert_eq!(bot.status, BotStatus::Created);
        assert_eq!(bot.container_id, None);
        assert_eq!(bot.source_type, None);

        let fetched = db.bots.get(bot.id).await.unwrap().unwrap();
        assert_eq!(fetched.name, "echo");
        assert_eq!(fetched.runtime, BotRuntime::Python);
    }

    #[tokio::test]
    async fn duplicate_name_per_owner_is_a_constraint_violation() {
        let db = setup().await;
        db.bots.create(input("echo")).await.unwrap();
        assert!(db.bots.create(input("echo")).await.is_err());
    }

    #[tokio::test]
    async fn state_and_handle_updates_persist() {
        let db = setup().await;
        let bot = db.bots.create(input("echo")).await.unwrap();

        db.bots
            .set_container_id(bot.id, Some("cafebabe"))
            .await
            .unwrap();
        db.bots.set_status(bot.id, BotStatus::Running).await.unwrap();
        db.bots
            .set_source_type(bot.id, SourceType::Zip)
            .await
            .unwrap();

        let fetched = db.bots.get(bot.id).await.unwrap().unwrap();
        assert_eq!(fetched.container_id.as_deref(), Some("cafebabe"));
        assert_eq!(fetched.status, BotStatus::Running);
        assert_eq!(fetched.source_type, Some(SourceType::Zip));
    }

    #[tokio::test]
    async fn list_and_count_scope_to_owner() {
        let db = setup().await;
        sqlx::query(
            "INSERT INTO users (email, password_hash, created_at) VALUES ('b@x.io', 'h', ?)",
        )
        .bind(Utc::now())
        .execute(&db.pool)
        .await
        .unwrap();

        db.bots.create(input("one")).await.unwrap();
        db.bots.create(input("two")).await.unwrap();
        db.bots
            .create(BotCreateInput {
                user_id: 2,
                ..input("other")
            })
            .await
            .unwrap();

        assert_eq!(db.bots.count_for_user(1).await.unwrap(), 2);
        assert_eq!(db.bots.list_for_user(1).await.unwrap().len(), 2);
        assert_eq!(db.bots.count_for_user(2).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn delete_removes_the_row() {
        let db = setup().await;
        let bot = db.bots.create(input("gone")).await.unwrap();
        db.bots.delete(bot.id).await.unwrap();
        assert!(db.bots.get(bot.id).await.unwrap().is_none());
    }
}
