// ABOUTME: Domain types for the Botdock bot hosting platform
// ABOUTME: Enums, database row structs, and API views shared across packages

pub mod types;
pub mod views;

pub use types::{
    AuditLog, Bot, BotRuntime, BotStatus, InvalidEnumValue, Plan, SourceType, User, UserRole,
    UserStatus,
};
pub use views::{BotView, UserView};
