//! Error types for tree manager operations.

use thiserror::Error;

/// Result type for `dendron-manager` operations.
pub type Result<T> = std::result::Result<T, ManagerError>;

/// Error types that can occur while dispatching tasks, handling
/// interactions, or running maintenance.
#[derive(Error, Debug)]
pub enum ManagerError {
    /// No task of the requested type/language combination is available.
    #[error("no task of the requested type is currently available")]
    TaskRequestedTypeNotAvailable,

    /// An interaction submission did not match any known kind.
    #[error("invalid interaction response type")]
    TaskInvalidResponseType,

    /// The acting user is not enabled.
    #[error("user is not enabled")]
    UserNotEnabled,

    /// A referenced entity was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// A call to an external HF-style scoring service failed.
    #[error("external service error: {0}")]
    ExternalService(String),

    /// Underlying persistence failure.
    #[error("store error: {0}")]
    Store(#[from] sqlx::Error),

    /// Core error propagated from the domain layer.
    #[error("core error: {0}")]
    Core(String),
}

impl From<dendron_core::DendronError> for ManagerError {
    fn from(err: dendron_core::DendronError) -> Self {
        match err {
            dendron_core::DendronError::TaskRequestedTypeNotAvailable => {
                ManagerError::TaskRequestedTypeNotAvailable
            }
            dendron_core::DendronError::TaskInvalidResponseType => {
                ManagerError::TaskInvalidResponseType
            }
            dendron_core::DendronError::UserNotEnabled => ManagerError::UserNotEnabled,
            dendron_core::DendronError::NotFound(s) => ManagerError::NotFound(s),
            other => ManagerError::Core(other.to_string()),
        }
    }
}
