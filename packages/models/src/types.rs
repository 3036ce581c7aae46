// ABOUTME: Core enums and database row structs for users, plans, bots, and audit logs
// ABOUTME: String serializations of the enums are part of the public API contract

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Raised when a persisted enum column holds a value this build doesn't know
#[derive(Error, Debug)]
#[error("invalid {kind} value: {value}")]
pub struct InvalidEnumValue {
    pub kind: &'static str,
    pub value: String,
}

impl InvalidEnumValue {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// User role for RBAC
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum UserRole {
    User,
    Admin,
    Owner,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "USER",
            Self::Admin => "ADMIN",
            Self::Owner => "OWNER",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self, InvalidEnumValue> {
        match s {
            "USER" => Ok(Self::User),
            "ADMIN" => Ok(Self::Admin),
            "OWNER" => Ok(Self::Owner),
            other => Err(InvalidEnumValue::new("role", other)),
        }
    }

    /// ADMIN and OWNER both clear the operator bar
    pub fn is_admin(&self) -> bool {
        matches!(self, Self::Admin | Self::Owner)
    }
}

/// User account status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum UserStatus {
    Active,
    Suspended,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Suspended => "SUSPENDED",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self, InvalidEnumValue> {
        match s {
            "ACTIVE" => Ok(Self::Active),
            "SUSPENDED" => Ok(Self::Suspended),
            other => Err(InvalidEnumValue::new("user status", other)),
        }
    }
}

/// Bot lifecycle state as observed by users
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum BotStatus {
    Created,
    Running,
    Stopped,
    Crashed,
}

impl BotStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "CREATED",
            Self::Running => "RUNNING",
            Self::Stopped => "STOPPED",
            Self::Crashed => "CRASHED",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self, InvalidEnumValue> {
        match s {
            "CREATED" => Ok(Self::Created),
            "RUNNING" => Ok(Self::Running),
            "STOPPED" => Ok(Self::Stopped),
            "CRASHED" => Ok(Self::Crashed),
            other => Err(InvalidEnumValue::new("bot status", other)),
        }
    }
}

/// Preregistered execution profile a bot runs under
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum BotRuntime {
    Python,
    Node,
}

impl BotRuntime {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::Node => "node",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self, InvalidEnumValue> {
        match s {
            "python" => Ok(Self::Python),
            "node" => Ok(Self::Node),
            other => Err(InvalidEnumValue::new("runtime", other)),
        }
    }
}

/// How the bot's source tree was supplied
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Zip,
    File,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Zip => "zip",
            Self::File => "file",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self, InvalidEnumValue> {
        match s {
            "zip" => Ok(Self::Zip),
            "file" => Ok(Self::File),
            other => Err(InvalidEnumValue::new("source type", other)),
        }
    }
}

/// Tenant account row
#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub password_hash: String,
    pub role: UserRole,
    pub status: UserStatus,
    pub created_at: DateTime<Utc>,
}

/// Quota and resource-limit bundle assigned to a bot
#[derive(Debug, Clone)]
pub struct Plan {
    pub id: i64,
    pub name: String,
    pub max_bots: i64,
    /// Decimal fraction of one core, e.g. "0.5"
    pub cpu_limit: String,
    /// Human-readable size, e.g. "256m"
    pub ram_limit: String,
}

/// A user-owned bot instance.
///
/// `container_id` is internal to the platform and must never appear in any
/// API view.
#[derive(Debug, Clone)]
pub struct Bot {
    pub id: i64,
    pub user_id: i64,
    pub plan_id: i64,
    pub runtime: BotRuntime,
    pub name: String,
    pub container_id: Option<String>,
    pub status: BotStatus,
    pub start_cmd: Option<String>,
    pub source_type: Option<SourceType>,
    pub created_at: DateTime<Utc>,
}

/// Record of a state-changing operation, kept for compliance review
#[derive(Debug, Clone)]
pub struct AuditLog {
    pub id: i64,
    pub user_id: Option<i64>,
    pub action: String,
    pub target_id: Option<String>,
    pub ip_address: Option<String>,
    pub details: Option<String>,
    pub created_at: DateTime<Utc>,
}
