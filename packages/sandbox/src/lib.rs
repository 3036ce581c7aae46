// ABOUTME: Sandbox driver package: the only component allowed to speak to Docker
// ABOUTME: Callers get opaque handles and mapped statuses, never raw runtime objects

pub mod driver;

pub use driver::{CreateSpec, LogStream, SandboxDriver};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SandboxError {
    /// Failure while building or creating a sandbox for a bot
    #[error("Failed to create container: {0}")]
    Create(String),

    /// The referenced sandbox no longer exists in the runtime
    #[error("Container {0} not found")]
    Missing(String),

    /// A start/stop/restart/status/log operation failed
    #[error("Container operation failed: {0}")]
    Op(String),

    /// The Docker service itself is unreachable
    #[error("Docker service unavailable: {0}")]
    Connection(String),
}

pub type Result<T> = std::result::Result<T, SandboxError>;
