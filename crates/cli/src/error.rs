//! Error types for the CLI

use thiserror::Error;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("tracing initialization error: {0}")]
    TracingInit(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("tree manager error: {0}")]
    Manager(#[from] dendron_manager::ManagerError),

    #[error("{0}")]
    Core(#[from] dendron_core::DendronError),
}

impl From<tracing_subscriber::filter::ParseError> for CliError {
    fn from(err: tracing_subscriber::filter::ParseError) -> Self {
        CliError::TracingInit(err.to_string())
    }
}
