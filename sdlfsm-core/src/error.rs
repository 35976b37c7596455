//! Core error types.

use crate::names_db::{ElementId, ElementKind, ProcessId};
use crate::process::Lifecycle;
use crate::value::DataType;
use thiserror::Error;

/// Errors from the process engine.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("duplicate name: '{name}'")]
    DuplicateName { name: String },

    #[error("unknown {kind} id: {id}")]
    UnknownElement { kind: ElementKind, id: ElementId },

    #[error("unknown name: '{name}'")]
    UnknownName { name: String },

    #[error("invalid graph: {reason}")]
    InvalidGraph { reason: String },

    #[error("process {process_id} has no start connector")]
    MissingStartConnector { process_id: ProcessId },

    #[error("connector {connector} has no {branch} successor")]
    DanglingLink { connector: ElementId, branch: String },

    #[error("process {process_id} has no current state")]
    NoCurrentState { process_id: ProcessId },

    #[error("timer '{timer}' is already pending")]
    TimerPending { timer: String },

    #[error("invalid lifecycle: expected {expected}, actual {actual}")]
    InvalidLifecycle {
        expected: Lifecycle,
        actual: Lifecycle,
    },

    #[error("type mismatch in {context}: {lhs} vs {rhs}")]
    TypeMismatch {
        context: String,
        lhs: DataType,
        rhs: DataType,
    },

    #[error("illegal operation: {reason}")]
    IllegalOperation { reason: String },

    #[error("arithmetic error: {reason}")]
    Arithmetic { reason: String },

    #[error("expression is not assignable: {expr}")]
    NotAssignable { expr: String },

    #[error("invalid timer delay: {reason}")]
    InvalidDelay { reason: String },

    #[error("invalid value: {reason}")]
    InvalidValue { reason: String },

    #[error("event for process {target} delivered to process {process_id}")]
    MisroutedEvent {
        process_id: ProcessId,
        target: ProcessId,
    },

    #[error("process {process_id} is unusable after an earlier error")]
    Poisoned { process_id: ProcessId },

    #[error("invalid process definition: {reason}")]
    InvalidDefinition { reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CoreError {
    /// Returns whether this error denotes a malformed process graph.
    ///
    /// A process that raised a syntax error is poisoned and must not be
    /// driven any further.
    pub fn is_syntax_error(&self) -> bool {
        matches!(
            self,
            CoreError::DuplicateName { .. }
                | CoreError::UnknownElement { .. }
                | CoreError::UnknownName { .. }
                | CoreError::InvalidGraph { .. }
                | CoreError::MissingStartConnector { .. }
                | CoreError::DanglingLink { .. }
                | CoreError::NoCurrentState { .. }
                | CoreError::TypeMismatch { .. }
                | CoreError::IllegalOperation { .. }
                | CoreError::Arithmetic { .. }
                | CoreError::NotAssignable { .. }
                | CoreError::InvalidDelay { .. }
        )
    }

    /// Returns an error code suitable for host-facing reports.
    pub fn error_code(&self) -> &'static str {
        match self {
            CoreError::DuplicateName { .. } => "DUPLICATE_NAME",
            CoreError::UnknownElement { .. } => "UNKNOWN_ELEMENT",
            CoreError::UnknownName { .. } => "UNKNOWN_ELEMENT",
            CoreError::InvalidGraph { .. } => "INVALID_GRAPH",
            CoreError::MissingStartConnector { .. } => "INVALID_GRAPH",
            CoreError::DanglingLink { .. } => "INVALID_GRAPH",
            CoreError::NoCurrentState { .. } => "INVALID_GRAPH",
            CoreError::TimerPending { .. } => "TIMER_PENDING",
            CoreError::InvalidLifecycle { .. } => "INVALID_LIFECYCLE",
            CoreError::TypeMismatch { .. } => "TYPE_MISMATCH",
            CoreError::IllegalOperation { .. } => "ILLEGAL_OPERATION",
            CoreError::Arithmetic { .. } => "ARITHMETIC",
            CoreError::NotAssignable { .. } => "ILLEGAL_OPERATION",
            CoreError::InvalidDelay { .. } => "INVALID_DELAY",
            CoreError::InvalidValue { .. } => "BAD_REQUEST",
            CoreError::MisroutedEvent { .. } => "BAD_REQUEST",
            CoreError::Poisoned { .. } => "POISONED",
            CoreError::InvalidDefinition { .. } => "BAD_REQUEST",
            CoreError::Io(_) => "IO_ERROR",
            CoreError::Json(_) => "BAD_REQUEST",
        }
    }
}
