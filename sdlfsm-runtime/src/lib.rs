//! # sdlfsm-runtime
//!
//! Tokio host for sdlfsm processes.
//!
//! This crate provides:
//! - Timer scheduling on a tokio runtime
//! - A manager hosting many processes behind one event queue
//! - A tracing-backed host callback
//! - Prometheus metrics for signals, calls, events and errors
//! - Layered YAML/environment configuration

pub mod callback;
pub mod config;
pub mod error;
pub mod manager;
pub mod metrics;
pub mod scheduler;

pub use callback::LoggingCallback;
pub use config::{ConfigError, LoggingConfig, ManagerConfig, RuntimeConfig, SchedulerConfig};
pub use error::RuntimeError;
pub use manager::{ChannelSink, FsmManager, ProcessOutcome, ProcessSnapshot};
pub use metrics::Metrics;
pub use scheduler::TokioScheduler;
