// ABOUTME: Database connection management and storage initialization
// ABOUTME: Provides shared access to the SQLite pool and per-entity storage layers

use sqlx::migrate::MigrateDatabase;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Sqlite, SqlitePool};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::audit::AuditLogStorage;
use crate::bots::BotStorage;
use crate::plans::PlanStorage;
use crate::users::UserStorage;
use crate::Result;

/// Shared database state handed to the lifecycle manager and API handlers
#[derive(Clone)]
pub struct DbState {
    pub pool: SqlitePool,
    pub bots: Arc<BotStorage>,
    pub plans: Arc<PlanStorage>,
    pub users: Arc<UserStorage>,
    pub audit: Arc<AuditLogStorage>,
}

impl DbState {
    /// Create database state from an existing pool
    pub fn new(pool: SqlitePool) -> Self {
        let bots = Arc::new(BotStorage::new(pool.clone()));
        let plans = Arc::new(PlanStorage::new(pool.clone()));
        let users = Arc::new(UserStorage::new(pool.clone()));
        let audit = Arc::new(AuditLogStorage::new(pool.clone()));

        Self {
            pool,
            bots,
            plans,
            users,
            audit,
        }
    }

    /// Connect to `database_url`, creating the database file and schema on
    /// first run, and configure SQLite for concurrent serving.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let in_memory = database_url.contains(":memory:");

        if !in_memory && !Sqlite::database_exists(database_url).await? {
            debug!("Creating database at: {}", database_url);
            Sqlite::create_database(database_url).await?;
        }

        // An in-memory SQLite database exists per connection; cap the pool
        // at one so every query sees the same schema
        let max_connections = if in_memory { 1 } else { 10 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(30))
            .connect(database_url)
            .await?;

        sqlx::query("PRAGMA journal_mode = WAL")
            .execute(&pool)
            .await?;

        sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;

        sqlx::query("PRAGMA synchronous = NORMAL")
            .execute(&pool)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        info!("Database connection established");

        Ok(Self::new(pool))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connect_runs_migrations_on_a_fresh_database() {
        let db = DbState::connect("sqlite::memory:").await.unwrap();

        // All four tables answer a count
        for table in ["users", "plans", "bots", "audit_logs"] {
            let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
                .fetch_one(&db.pool)
                .await
                .unwrap();
            assert_eq!(count, 0);
        }
    }
}
