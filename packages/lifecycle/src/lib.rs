// ABOUTME: Lifecycle manager owning the bot state machine
// ABOUTME: Enforces ownership and quota preconditions against observed sandbox state

pub mod manager;

pub use manager::{CreateBotInput, LifecycleManager};

use botdock_artifacts::ArtifactError;
use botdock_runtimes::RuntimeError;
use botdock_sandbox::SandboxError;
use botdock_storage::StorageError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LifecycleError {
    /// Input failed a static check; message is returned verbatim
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    /// Uniqueness or quota violation
    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error(transparent)]
    Sandbox(#[from] SandboxError),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, LifecycleError>;
