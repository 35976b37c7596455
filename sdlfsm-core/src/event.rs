//! Events delivered to processes.

use crate::names_db::{ElementId, JobId, ProcessId};
use crate::value::Value;

/// A named signal with positional arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    pub process_id: ProcessId,
    pub name: String,
    pub arguments: Vec<Value>,
}

impl Signal {
    pub fn new(process_id: ProcessId, name: impl Into<String>) -> Self {
        Self {
            process_id,
            name: name.into(),
            arguments: Vec::new(),
        }
    }

    pub fn with_args(process_id: ProcessId, name: impl Into<String>, arguments: Vec<Value>) -> Self {
        Self {
            process_id,
            name: name.into(),
            arguments,
        }
    }
}

/// Expiration of a scheduler job armed by a `SetTimer` action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerEvent {
    pub process_id: ProcessId,
    pub timer_id: ElementId,
    /// Job that fired. A firing for any other job than the pending one is stale.
    pub job: JobId,
}

/// Anything a process can be driven with.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Start { process_id: ProcessId },
    Signal(Signal),
    Timer(TimerEvent),
}

impl Event {
    pub fn process_id(&self) -> ProcessId {
        match self {
            Event::Start { process_id } => *process_id,
            Event::Signal(signal) => signal.process_id,
            Event::Timer(timer) => timer.process_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Event::Start { .. } => "start",
            Event::Signal(_) => "signal",
            Event::Timer(_) => "timer",
        }
    }
}

impl From<Signal> for Event {
    fn from(signal: Signal) -> Self {
        Event::Signal(signal)
    }
}

impl From<TimerEvent> for Event {
    fn from(timer: TimerEvent) -> Self {
        Event::Timer(timer)
    }
}
