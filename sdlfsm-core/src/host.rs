//! Collaborators a process talks to.
//!
//! - [`Callback`] receives emitted signals and external function calls.
//! - [`Scheduler`] arms and cancels one-shot timer jobs.
//! - [`EventSink`] receives timer expirations as [`Event::Timer`].
//!
//! The in-process implementations below ([`ManualScheduler`], [`QueueSink`],
//! [`RecordingCallback`]) drive processes deterministically without a runtime.

use crate::event::Event;
use crate::names_db::{JobId, ProcessId};
use crate::value::Value;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Host side of signal emission and function calls.
pub trait Callback: Send + Sync {
    fn handle_send_signal(&self, process_id: ProcessId, name: &str, args: &[Value]);

    /// Called with the evaluated arguments. Mutations are written back into
    /// the process variables bound to output arguments.
    fn handle_function_call(&self, process_id: ProcessId, name: &str, args: &mut [Value]);
}

/// One-shot job run by a scheduler with its own job id.
pub type Job = Box<dyn FnOnce(JobId) + Send + 'static>;

/// Errors from a scheduler.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("delay {delay:?} exceeds the maximum of {max:?}")]
    DelayTooLong { delay: Duration, max: Duration },

    #[error("scheduler is shut down")]
    ShutDown,

    #[error("scheduler failure: {0}")]
    Other(String),
}

/// Timer facility.
pub trait Scheduler: Send + Sync {
    /// Runs `job` once after `delay`, returning its handle.
    fn schedule(&self, delay: Duration, job: Job) -> Result<JobId, SchedulerError>;

    /// Cancels a pending job. Cancelling a job that already ran is a no-op.
    fn cancel(&self, job: JobId) -> Result<(), SchedulerError>;
}

/// Destination of events produced outside a connector walk.
pub trait EventSink: Send + Sync {
    fn consume(&self, event: Event);
}

/// Bundle of collaborators handed to a process.
#[derive(Clone)]
pub struct Host {
    pub callback: Arc<dyn Callback>,
    pub scheduler: Arc<dyn Scheduler>,
    pub sink: Arc<dyn EventSink>,
}

impl Host {
    pub fn new(
        callback: Arc<dyn Callback>,
        scheduler: Arc<dyn Scheduler>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            callback,
            scheduler,
            sink,
        }
    }
}

impl std::fmt::Debug for Host {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Host").finish_non_exhaustive()
    }
}

// ============================================================================
// In-process collaborators
// ============================================================================

struct PendingJob {
    delay: Duration,
    job: Job,
}

/// Scheduler whose jobs only run when fired explicitly.
#[derive(Default)]
pub struct ManualScheduler {
    last_job: Mutex<JobId>,
    jobs: Mutex<BTreeMap<JobId, PendingJob>>,
    refuse: Mutex<bool>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent `schedule` call fail.
    pub fn refuse_jobs(&self, refuse: bool) {
        *self.refuse.lock() = refuse;
    }

    /// Returns the pending jobs with their delays, oldest first.
    pub fn pending(&self) -> Vec<(JobId, Duration)> {
        self.jobs
            .lock()
            .iter()
            .map(|(id, pending)| (*id, pending.delay))
            .collect()
    }

    /// Runs a pending job. Returns false if it was cancelled or already ran.
    pub fn fire(&self, job: JobId) -> bool {
        let pending = self.jobs.lock().remove(&job);
        match pending {
            Some(pending) => {
                (pending.job)(job);
                true
            }
            None => false,
        }
    }

    /// Runs every pending job in scheduling order. Returns how many ran.
    pub fn fire_all(&self) -> usize {
        let drained: Vec<(JobId, PendingJob)> = std::mem::take(&mut *self.jobs.lock()).into_iter().collect();
        let count = drained.len();
        for (id, pending) in drained {
            (pending.job)(id);
        }
        count
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, delay: Duration, job: Job) -> Result<JobId, SchedulerError> {
        if *self.refuse.lock() {
            return Err(SchedulerError::Other("jobs are refused".to_string()));
        }
        let id = {
            let mut last = self.last_job.lock();
            *last += 1;
            *last
        };
        self.jobs.lock().insert(id, PendingJob { delay, job });
        Ok(id)
    }

    fn cancel(&self, job: JobId) -> Result<(), SchedulerError> {
        self.jobs.lock().remove(&job);
        Ok(())
    }
}

/// Sink buffering events in arrival order.
#[derive(Default)]
pub struct QueueSink {
    events: Mutex<VecDeque<Event>>,
}

impl QueueSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pop(&self) -> Option<Event> {
        self.events.lock().pop_front()
    }

    pub fn drain(&self) -> Vec<Event> {
        self.events.lock().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl EventSink for QueueSink {
    fn consume(&self, event: Event) {
        self.events.lock().push_back(event);
    }
}

type HostFunction = Box<dyn Fn(&mut [Value]) + Send + Sync>;

/// A signal emitted by a process, as seen by [`RecordingCallback`].
#[derive(Debug, Clone, PartialEq)]
pub struct SentSignal {
    pub process_id: ProcessId,
    pub name: String,
    pub args: Vec<Value>,
}

/// Callback that records emitted signals and dispatches function calls to
/// registered closures.
#[derive(Default)]
pub struct RecordingCallback {
    sent: Mutex<Vec<SentSignal>>,
    calls: Mutex<Vec<(String, Vec<Value>)>>,
    functions: Mutex<HashMap<String, HostFunction>>,
}

impl RecordingCallback {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the implementation of an external function.
    pub fn register_function<F>(&self, name: impl Into<String>, function: F)
    where
        F: Fn(&mut [Value]) + Send + Sync + 'static,
    {
        self.functions.lock().insert(name.into(), Box::new(function));
    }

    pub fn sent(&self) -> Vec<SentSignal> {
        self.sent.lock().clone()
    }

    /// Function calls with their arguments as received, before mutation.
    pub fn calls(&self) -> Vec<(String, Vec<Value>)> {
        self.calls.lock().clone()
    }

    pub fn clear(&self) {
        self.sent.lock().clear();
        self.calls.lock().clear();
    }
}

impl Callback for RecordingCallback {
    fn handle_send_signal(&self, process_id: ProcessId, name: &str, args: &[Value]) {
        self.sent.lock().push(SentSignal {
            process_id,
            name: name.to_string(),
            args: args.to_vec(),
        });
    }

    fn handle_function_call(&self, _process_id: ProcessId, name: &str, args: &mut [Value]) {
        self.calls.lock().push((name.to_string(), args.to_vec()));
        if let Some(function) = self.functions.lock().get(name) {
            function(args);
        }
    }
}
