//! Runtime error types.

use crate::config::ConfigError;
use sdlfsm_core::{CoreError, ProcessId};
use thiserror::Error;

/// Runtime errors.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("core error: {0}")]
    Core(#[from] CoreError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("no tokio runtime available")]
    NoRuntime,

    #[error("process not found: {process_id}")]
    ProcessNotFound { process_id: ProcessId },

    #[error("process limit of {limit} reached")]
    ProcessLimit { limit: usize },

    #[error("runtime shutting down")]
    ShuttingDown,
}

impl RuntimeError {
    /// Returns an error code string.
    pub fn error_code(&self) -> &'static str {
        match self {
            RuntimeError::Core(e) => e.error_code(),
            RuntimeError::Config(_) => "CONFIG_ERROR",
            RuntimeError::Io(_) => "IO_ERROR",
            RuntimeError::Json(_) => "JSON_ERROR",
            RuntimeError::Metrics(_) => "METRICS_ERROR",
            RuntimeError::NoRuntime => "NO_RUNTIME",
            RuntimeError::ProcessNotFound { .. } => "PROCESS_NOT_FOUND",
            RuntimeError::ProcessLimit { .. } => "PROCESS_LIMIT",
            RuntimeError::ShuttingDown => "SHUTTING_DOWN",
        }
    }
}
