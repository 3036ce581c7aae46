// ABOUTME: SQLite persistence for the Botdock control plane
// ABOUTME: Connection management plus CRUD storage layers per entity

pub mod audit;
pub mod bots;
pub mod db;
pub mod plans;
pub mod users;

pub use audit::AuditLogStorage;
pub use bots::BotStorage;
pub use db::DbState;
pub use plans::PlanStorage;
pub use users::UserStorage;

use botdock_models::InvalidEnumValue;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid stored value: {0}")]
    InvalidValue(String),

    #[error("{0} not found")]
    NotFound(String),
}

impl From<InvalidEnumValue> for StorageError {
    fn from(err: InvalidEnumValue) -> Self {
        StorageError::InvalidValue(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StorageError>;
