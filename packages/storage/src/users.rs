// ABOUTME: Storage for tenant accounts
// ABOUTME: Password hashes live here; role and status gate what the account may do

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use botdock_models::{User, UserRole, UserStatus};

use crate::Result;

pub struct UserStorage {
    pool: SqlitePool,
}

impl UserStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn user_from_row(row: &SqliteRow) -> Result<User> {
        let role: String = row.try_get("role")?;
        let status: String = row.try_get("status")?;

        Ok(User {
            id: row.try_get("id")?,
            email: row.try_get("email")?,
            password_hash: row.try_get("password_hash")?,
            role: UserRole::from_str(&role)?,
            status: UserStatus::from_str(&status)?,
            created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        })
    }

    pub async fn create(&self, email: &str, password_hash: &str) -> Result<User> {
        let result = sqlx::query(
            r#"
            INSERT INTO users (email, password_hash, role, status, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(email)
        .bind(password_hash)
        .bind(UserRole::User.as_str())
        .bind(UserStatus::Active.as_str())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        self.get(id)
            .await?
            .ok_or_else(|| crate::StorageError::NotFound(format!("user {}", id)))
    }

    pub async fn get(&self, id: i64) -> Result<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::user_from_row).transpose()
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::user_from_row).transpose()
    }

    pub async fn list(&self) -> Result<Vec<User>> {
        let rows = sqlx::query("SELECT * FROM users ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(Self::user_from_row).collect()
    }

    pub async fn set_status(&self, id: i64, status: UserStatus) -> Result<()> {
        sqlx::query("UPDATE users SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
