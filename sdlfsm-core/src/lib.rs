//! # sdlfsm-core
//!
//! SDL-style process engine.
//!
//! This crate provides:
//! - Typed values and the operators over them
//! - Process memory: variables, constants and per-signal temp variables
//! - The action-connector graph and its execution engine
//! - Signal and timer dispatch through host collaborators
//! - JSON process definitions and graphviz export

pub mod action;
pub mod connector;
pub mod definition;
pub mod error;
pub mod event;
pub mod export;
pub mod expression;
pub mod host;
pub mod memory;
pub mod names_db;
pub mod process;
pub mod state;
pub mod value;
pub mod value_ops;
pub mod variable;

pub use action::Action;
pub use connector::{ActionConnector, LinkSlot, Links, SwitchBranch};
pub use definition::{ProcessDefinition, ProcessDefinitionRaw};
pub use error::CoreError;
pub use event::{Event, Signal, TimerEvent};
pub use expression::{Argument, Expression};
pub use host::{Callback, EventSink, Host, Job, Scheduler, SchedulerError};
pub use memory::Memory;
pub use names_db::{ElementId, ElementKind, JobId, NamesDb, ProcessId};
pub use process::{Lifecycle, Process};
pub use state::{SignalHandler, State};
pub use value::{DataType, Value};
pub use value_ops::{BinaryOp, ComparisonOp, UnaryOp};
pub use variable::{Constant, Timer, Variable};
