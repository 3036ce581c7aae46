// ABOUTME: Storage for subscription plans and first-run seeding of the defaults

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::info;

use botdock_models::Plan;

use crate::Result;

/// Plans shipped out of the box on an empty database
const DEFAULT_PLANS: &[(&str, i64, &str, &str)] = &[
    ("Free", 1, "0.5", "256m"),
    ("Basic", 3, "1.0", "512m"),
    ("Pro", 10, "2.0", "1g"),
];

pub struct PlanStorage {
    pool: SqlitePool,
}

impl PlanStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn plan_from_row(row: &SqliteRow) -> Result<Plan> {
        Ok(Plan {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            max_bots: row.try_get("max_bots")?,
            cpu_limit: row.try_get("cpu_limit")?,
            ram_limit: row.try_get("ram_limit")?,
        })
    }

    pub async fn get(&self, id: i64) -> Result<Option<Plan>> {
        let row = sqlx::query("SELECT * FROM plans WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::plan_from_row).transpose()
    }

    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM plans")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Insert the default plans when the table is empty. Safe to call on
    /// every startup.
    pub async fn seed_defaults(&self) -> Result<()> {
        if self.count().await? > 0 {
            return Ok(());
        }

        for (name, max_bots, cpu_limit, ram_limit) in DEFAULT_PLANS {
            sqlx::query(
                "INSERT INTO plans (name, max_bots, cpu_limit, ram_limit) VALUES (?, ?, ?, ?)",
            )
            .bind(name)
            .bind(max_bots)
            .bind(cpu_limit)
            .bind(ram_limit)
            .execute(&self.pool)
            .await?;
        }

        info!("Default plans created");
        Ok(())
    }
}
