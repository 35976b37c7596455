//! Process manager.
//!
//! Hosts many processes and feeds them from one ordered event queue:
//!
//! ```text
//! send_signal / start_process ──┐
//!                               ├──► queue ──► run() ──► lock process ──► handle(event)
//! timer job (ChannelSink) ──────┘
//! ```
//!
//! Each event is handled with its process locked, so a process never sees
//! two events at once while distinct processes share the loop.

use crate::config::{ManagerConfig, RuntimeConfig};
use crate::error::RuntimeError;
use crate::metrics::Metrics;
use crate::scheduler::TokioScheduler;
use dashmap::DashMap;
use parking_lot::Mutex;
use sdlfsm_core::{
    Callback, CoreError, Event, EventSink, Host, Lifecycle, Process, ProcessDefinition, ProcessId,
    Scheduler, Signal,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Notify};

/// Event sink feeding the manager queue.
#[derive(Clone)]
pub struct ChannelSink {
    sender: mpsc::UnboundedSender<Event>,
}

impl EventSink for ChannelSink {
    fn consume(&self, event: Event) {
        if self.sender.send(event).is_err() {
            tracing::warn!("Event queue closed, event dropped");
        }
    }
}

/// How a process left the manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ProcessOutcome {
    /// Executed `Exit`.
    Finished { state: Option<String> },
    /// Removed after an error, or on request.
    Destroyed { reason: String },
}

/// Point-in-time view of a process.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessSnapshot {
    pub id: ProcessId,
    pub lifecycle: String,
    pub state: Option<String>,
    pub poisoned: bool,
    pub variables: BTreeMap<String, serde_json::Value>,
    pub pending_timers: Vec<String>,
}

impl ProcessSnapshot {
    pub fn from_process(process: &Process) -> Self {
        Self {
            id: process.id(),
            lifecycle: process.lifecycle().to_string(),
            state: process.current_state_name().map(str::to_string),
            poisoned: process.is_poisoned(),
            variables: process
                .memory()
                .variables()
                .map(|v| (v.name().to_string(), v.value().to_json()))
                .collect(),
            pending_timers: process
                .timers()
                .filter(|t| t.is_pending())
                .map(|t| t.name().to_string())
                .collect(),
        }
    }
}

/// Hosts processes and drives them from an event queue.
pub struct FsmManager {
    config: ManagerConfig,
    processes: DashMap<ProcessId, Arc<Mutex<Process>>>,
    outcomes: DashMap<ProcessId, ProcessOutcome>,
    next_id: AtomicU32,
    callback: Arc<dyn Callback>,
    scheduler: Arc<TokioScheduler>,
    metrics: Arc<Metrics>,
    sink: ChannelSink,
    receiver: Mutex<Option<mpsc::UnboundedReceiver<Event>>>,
    shutdown: AtomicBool,
    notify: Notify,
    progress: Notify,
}

impl FsmManager {
    /// Creates a manager on the runtime of the calling context, with its own metrics.
    pub fn new(config: &RuntimeConfig, callback: Arc<dyn Callback>) -> Result<Self, RuntimeError> {
        Self::with_metrics(config, callback, Arc::new(Metrics::new()?))
    }

    /// Creates a manager recording into shared `metrics`.
    pub fn with_metrics(
        config: &RuntimeConfig,
        callback: Arc<dyn Callback>,
        metrics: Arc<Metrics>,
    ) -> Result<Self, RuntimeError> {
        let scheduler = Arc::new(TokioScheduler::try_current(&config.scheduler)?);
        let (sender, receiver) = mpsc::unbounded_channel();
        Ok(Self {
            config: config.manager.clone(),
            processes: DashMap::new(),
            outcomes: DashMap::new(),
            next_id: AtomicU32::new(0),
            callback,
            scheduler,
            metrics,
            sink: ChannelSink { sender },
            receiver: Mutex::new(Some(receiver)),
            shutdown: AtomicBool::new(false),
            notify: Notify::new(),
            progress: Notify::new(),
        })
    }

    fn ensure_running(&self) -> Result<(), RuntimeError> {
        if self.shutdown.load(Ordering::Relaxed) {
            return Err(RuntimeError::ShuttingDown);
        }
        Ok(())
    }

    // =========================================================================
    // Process lifecycle
    // =========================================================================

    /// Builds an idle process from a definition and returns its id.
    pub fn create_process(&self, definition: &ProcessDefinition) -> Result<ProcessId, RuntimeError> {
        self.ensure_running()?;
        if !self.config.is_unlimited() && self.processes.len() >= self.config.max_processes {
            return Err(RuntimeError::ProcessLimit {
                limit: self.config.max_processes,
            });
        }

        let process_id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let scheduler: Arc<dyn Scheduler> = self.scheduler.clone();
        let host = Host::new(
            Arc::clone(&self.callback),
            scheduler,
            Arc::new(self.sink.clone()),
        );
        let process = definition.instantiate(process_id, host)?;
        self.processes
            .insert(process_id, Arc::new(Mutex::new(process)));
        self.metrics.processes_active.set(self.processes.len() as i64);

        tracing::info!(
            process_id,
            "Created process from definition '{}' ({})",
            definition.name,
            definition.checksum
        );
        Ok(process_id)
    }

    /// Queues the start of a process.
    pub fn start_process(&self, process_id: ProcessId) -> Result<(), RuntimeError> {
        self.submit(Event::Start { process_id })
    }

    /// Queues a signal for its target process.
    pub fn send_signal(&self, signal: Signal) -> Result<(), RuntimeError> {
        self.submit(Event::Signal(signal))
    }

    /// Queues any event for a hosted process.
    pub fn submit(&self, event: Event) -> Result<(), RuntimeError> {
        self.ensure_running()?;
        let process_id = event.process_id();
        if !self.processes.contains_key(&process_id) {
            return Err(RuntimeError::ProcessNotFound { process_id });
        }
        self.sink
            .sender
            .send(event)
            .map_err(|_| RuntimeError::ShuttingDown)
    }

    /// Removes a process and cancels its pending timers.
    pub fn destroy_process(&self, process_id: ProcessId) -> Result<(), RuntimeError> {
        self.remove(process_id, "destroyed on request".to_string())
            .then_some(())
            .ok_or(RuntimeError::ProcessNotFound { process_id })
    }

    fn remove(&self, process_id: ProcessId, reason: String) -> bool {
        let process = match self.processes.remove(&process_id) {
            Some((_, process)) => process,
            None => return false,
        };
        process.lock().cancel_timers();
        self.metrics.processes_active.set(self.processes.len() as i64);
        self.metrics
            .outcomes_total
            .with_label_values(&["destroyed"])
            .inc();
        tracing::info!(process_id, "Process destroyed: {}", reason);
        self.outcomes
            .insert(process_id, ProcessOutcome::Destroyed { reason });
        true
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn process(&self, process_id: ProcessId) -> Option<Arc<Mutex<Process>>> {
        self.processes
            .get(&process_id)
            .map(|entry| Arc::clone(entry.value()))
    }

    pub fn process_count(&self) -> usize {
        self.processes.len()
    }

    pub fn snapshot(&self, process_id: ProcessId) -> Option<ProcessSnapshot> {
        self.process(process_id)
            .map(|process| ProcessSnapshot::from_process(&process.lock()))
    }

    /// Outcome of a process that left the manager.
    pub fn outcome(&self, process_id: ProcessId) -> Option<ProcessOutcome> {
        self.outcomes
            .get(&process_id)
            .map(|entry| entry.value().clone())
    }

    /// Waits until a process finished or was destroyed.
    pub async fn wait_finished(
        &self,
        process_id: ProcessId,
        timeout: Duration,
    ) -> Option<ProcessOutcome> {
        let wait = async {
            loop {
                let notified = self.progress.notified();
                tokio::pin!(notified);
                notified.as_mut().enable();
                if let Some(outcome) = self.outcome(process_id) {
                    return outcome;
                }
                notified.await;
            }
        };
        tokio::time::timeout(timeout, wait).await.ok()
    }

    // =========================================================================
    // Event loop
    // =========================================================================

    /// Drains the event queue until shutdown (call from a background task).
    pub async fn run(&self) -> Result<(), RuntimeError> {
        let mut receiver = self
            .receiver
            .lock()
            .take()
            .ok_or(RuntimeError::ShuttingDown)?;

        tracing::info!("Process manager started");

        loop {
            tokio::select! {
                event = receiver.recv() => match event {
                    Some(event) => self.dispatch(event),
                    None => break,
                },
                _ = self.notify.notified() => {}
            }

            if self.shutdown.load(Ordering::Relaxed) {
                break;
            }
        }

        tracing::info!("Process manager stopped");
        Ok(())
    }

    fn dispatch(&self, event: Event) {
        let process_id = event.process_id();
        let process = match self.process(process_id) {
            Some(process) => process,
            None => {
                tracing::warn!(process_id, "{} event for unknown process dropped", event.kind());
                return;
            }
        };

        self.metrics
            .events_total
            .with_label_values(&[event.kind()])
            .inc();
        let (result, finished) = {
            let mut process = process.lock();
            let result = process.handle(&event);
            let finished = (process.lifecycle() == Lifecycle::Finished)
                .then(|| process.current_state_name().map(str::to_string));
            (result, finished)
        };

        if let Err(e) = result {
            self.handle_error(process_id, e);
        }

        if let Some(state) = finished {
            if !self.outcomes.contains_key(&process_id) {
                tracing::info!(process_id, "Process finished in state {:?}", state);
                self.outcomes
                    .insert(process_id, ProcessOutcome::Finished { state });
                self.metrics
                    .outcomes_total
                    .with_label_values(&["finished"])
                    .inc();
            }
            if self.config.remove_finished {
                self.processes.remove(&process_id);
                self.metrics.processes_active.set(self.processes.len() as i64);
            }
        }

        self.progress.notify_waiters();
    }

    fn handle_error(&self, process_id: ProcessId, error: CoreError) {
        self.metrics
            .errors_total
            .with_label_values(&[error.error_code()])
            .inc();
        let broken = error.is_syntax_error() || matches!(error, CoreError::Poisoned { .. });
        if broken && self.config.destroy_on_error {
            tracing::error!(process_id, error = %error, "Process graph is broken");
            self.remove(process_id, error.to_string());
        } else {
            tracing::warn!(
                process_id,
                error = %error,
                code = error.error_code(),
                "Event failed"
            );
        }
    }

    /// Stops the event loop and aborts pending timers.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
        self.notify.notify_one();
        self.scheduler.shutdown();
        self.progress.notify_waiters();
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Returns the scheduler shared by all processes.
    pub fn scheduler(&self) -> &TokioScheduler {
        &self.scheduler
    }
}

impl EventSink for FsmManager {
    fn consume(&self, event: Event) {
        if let Err(e) = self.submit(event) {
            tracing::warn!(error = %e, "Event rejected");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdlfsm_core::host::RecordingCallback;
    use sdlfsm_core::Value;
    use serde_json::json;
    use tokio_test::assert_ok;

    const WAIT: Duration = Duration::from_secs(5);

    fn announcement() -> ProcessDefinition {
        let json = json!({
            "variables": [{"name": "plays", "type": "INT", "value": 0}],
            "timers": ["T"],
            "states": ["IDLE", "PLAYING"],
            "start": [
                {"action": "set_timer", "timer": "T", "delay": 0.01},
                {"action": "next_state", "state": "IDLE"}
            ],
            "handlers": [
                {"state": "IDLE", "signal": "T", "actions": [
                    {"action": "task", "var": "plays",
                     "value": {"op": "+", "lhs": {"var": "plays"}, "rhs": 1}},
                    {"action": "send_signal", "signal": "ScenPlayMessage", "args": [1]},
                    {"action": "next_state", "state": "PLAYING"}
                ]},
                {"state": "PLAYING", "signal": "PlayFinished", "actions": [
                    {"action": "send_signal", "signal": "ScenExit", "args": ["done"]},
                    {"action": "exit"}
                ]},
                {"state": "PLAYING", "signal": "Echo", "actions": [
                    {"action": "send_signal", "signal": "Echoed", "args": [{"var": "$1"}]},
                    {"action": "next_state", "state": "PLAYING"}
                ]}
            ]
        });
        ProcessDefinition::from_json("announcement", &json).unwrap()
    }

    fn manager(callback: Arc<RecordingCallback>) -> Arc<FsmManager> {
        Arc::new(FsmManager::new(&RuntimeConfig::default(), callback).unwrap())
    }

    fn spawn_run(manager: &Arc<FsmManager>) -> tokio::task::JoinHandle<Result<(), RuntimeError>> {
        let manager = Arc::clone(manager);
        tokio::spawn(async move { manager.run().await })
    }

    async fn wait_for_state(manager: &FsmManager, process_id: ProcessId, state: &str) {
        tokio::time::timeout(WAIT, async {
            while manager
                .snapshot(process_id)
                .and_then(|s| s.state)
                .as_deref()
                != Some(state)
            {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_timer_and_signals_drive_process() {
        let callback = Arc::new(RecordingCallback::new());
        let manager = manager(callback.clone());
        let runner = spawn_run(&manager);

        let pid = manager.create_process(&announcement()).unwrap();
        assert_ok!(manager.start_process(pid));
        wait_for_state(&manager, pid, "PLAYING").await;

        let snapshot = manager.snapshot(pid).unwrap();
        assert_eq!(snapshot.lifecycle, "active");
        assert_eq!(snapshot.variables["plays"], json!(1));
        assert!(snapshot.pending_timers.is_empty());

        assert_ok!(manager.send_signal(Signal::with_args(pid, "Echo", vec![Value::int(5)])));
        assert_ok!(manager.send_signal(Signal::new(pid, "PlayFinished")));

        let outcome = manager.wait_finished(pid, WAIT).await;
        assert_eq!(
            outcome,
            Some(ProcessOutcome::Finished {
                state: Some("PLAYING".to_string())
            })
        );
        assert_eq!(manager.process_count(), 0);

        let names: Vec<String> = callback.sent().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["ScenPlayMessage", "Echoed", "ScenExit"]);
        assert_eq!(callback.sent()[1].args, vec![Value::int(5)]);

        let metrics = manager.metrics();
        assert_eq!(metrics.events_total.with_label_values(&["start"]).get(), 1);
        assert_eq!(metrics.events_total.with_label_values(&["timer"]).get(), 1);
        assert_eq!(metrics.events_total.with_label_values(&["signal"]).get(), 2);
        assert_eq!(metrics.outcomes_total.with_label_values(&["finished"]).get(), 1);
        assert_eq!(metrics.processes_active.get(), 0);

        manager.shutdown();
        assert_ok!(runner.await.unwrap());
    }

    #[tokio::test]
    async fn test_broken_process_is_destroyed() {
        let callback = Arc::new(RecordingCallback::new());
        let manager = manager(callback);
        let runner = spawn_run(&manager);

        let pid = manager.create_process(&announcement()).unwrap();
        manager.start_process(pid).unwrap();
        wait_for_state(&manager, pid, "PLAYING").await;

        // `$1` is unbound without an argument.
        manager.send_signal(Signal::new(pid, "Echo")).unwrap();
        match manager.wait_finished(pid, WAIT).await {
            Some(ProcessOutcome::Destroyed { reason }) => assert!(reason.contains("$1")),
            other => panic!("unexpected outcome {:?}", other),
        }
        let metrics = manager.metrics();
        assert_eq!(
            metrics.errors_total.with_label_values(&["UNKNOWN_ELEMENT"]).get(),
            1
        );
        assert_eq!(metrics.outcomes_total.with_label_values(&["destroyed"]).get(), 1);
        assert!(manager.process(pid).is_none());
        assert!(matches!(
            manager.send_signal(Signal::new(pid, "PlayFinished")),
            Err(RuntimeError::ProcessNotFound { .. })
        ));

        manager.shutdown();
        runner.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_destroy_cancels_timers() {
        let manager = manager(Arc::new(RecordingCallback::new()));
        let mut config = RuntimeConfig::default();
        config.manager.max_processes = 1;
        let limited = FsmManager::new(&config, Arc::new(RecordingCallback::new())).unwrap();

        let def = announcement();
        let pid = limited.create_process(&def).unwrap();
        assert!(matches!(
            limited.create_process(&def),
            Err(RuntimeError::ProcessLimit { limit: 1 })
        ));

        // Start synchronously so the timer is armed.
        limited.process(pid).unwrap().lock().start().unwrap();
        assert_eq!(limited.scheduler().pending(), 1);
        assert_ok!(limited.destroy_process(pid));
        assert_eq!(limited.scheduler().pending(), 0);
        assert!(matches!(
            limited.outcome(pid),
            Some(ProcessOutcome::Destroyed { .. })
        ));
        assert!(limited.destroy_process(pid).is_err());

        assert!(manager.start_process(42).is_err());
    }

    #[tokio::test]
    async fn test_shutdown_rejects_work() {
        let manager = manager(Arc::new(RecordingCallback::new()));
        let runner = spawn_run(&manager);
        manager.shutdown();
        runner.await.unwrap().unwrap();

        assert!(matches!(
            manager.create_process(&announcement()),
            Err(RuntimeError::ShuttingDown)
        ));
        // The queue can only be drained once.
        assert!(manager.run().await.is_err());
        assert_eq!(manager.wait_finished(1, Duration::from_millis(10)).await, None);
    }
}
