//! Error types shared by every crate in the workspace.

use thiserror::Error;

/// Result type for `dendron-core` operations.
pub type Result<T> = std::result::Result<T, DendronError>;

/// Error kinds surfaced by the domain layer and by components built on top
/// of it (the query layer, state machine, and dispatcher all bottom out in
/// these variants).
#[derive(Error, Debug)]
pub enum DendronError {
    /// Dispatch could not satisfy the request (maps to HTTP 503 one layer up).
    #[error("no task of the requested type is currently available")]
    TaskRequestedTypeNotAvailable,

    /// An interaction submission did not match any known kind.
    #[error("invalid interaction response type")]
    TaskInvalidResponseType,

    /// The acting user is not enabled.
    #[error("user is not enabled")]
    UserNotEnabled,

    /// A referenced entity (message, tree state, task, ...) was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// An external HF-style scoring service call failed.
    #[error("external service error: {0}")]
    ExternalService(String),

    /// Persistence failure from the underlying store.
    #[error("store error: {0}")]
    Store(String),
}
