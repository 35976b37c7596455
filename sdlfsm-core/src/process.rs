//! Process: the connector graph, its tables and the execution engine.
//!
//! A process is built through the `create_*` / `set_*` construction calls,
//! started once, then driven by signals and timer expirations:
//!
//! ```text
//! start() ──► start connector ──► ... ──► NextState / Exit
//! handle(Signal) ──► state ──► signal handler ──► first connector ──► ... ──► STOP
//! handle(Timer)  ──► signal named after the timer ──► handle(Signal)
//! ```
//!
//! Each event runs its connector chain to completion. A process is not
//! reentrant: callers must deliver events one at a time.

use crate::action::Action;
use crate::connector::{ActionConnector, Flow, LinkSlot, SwitchBranch};
use crate::error::CoreError;
use crate::event::{Event, Signal, TimerEvent};
use crate::expression::{Argument, Expression};
use crate::host::{Host, Job};
use crate::memory::Memory;
use crate::names_db::{ElementId, ElementKind, NamesDb, ProcessId};
use crate::state::{SignalHandler, State};
use crate::value::{DataType, Value};
use crate::value_ops::{compare_values, ComparisonOp};
use crate::variable::Timer;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Process lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Lifecycle {
    /// Built but not started.
    #[default]
    Idle,
    /// Started and accepting events.
    Active,
    /// Exited. Further events are ignored.
    Finished,
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Lifecycle::Idle => "idle",
            Lifecycle::Active => "active",
            Lifecycle::Finished => "finished",
        };
        f.write_str(s)
    }
}

/// A running instance of a connector graph.
#[derive(Debug)]
pub struct Process {
    id: ProcessId,
    lifecycle: Lifecycle,
    current_state: Option<ElementId>,
    initial_state: Option<ElementId>,
    start_connector: Option<ElementId>,
    names: NamesDb,
    memory: Memory,
    states: BTreeMap<ElementId, State>,
    signal_handlers: BTreeMap<ElementId, SignalHandler>,
    connectors: BTreeMap<ElementId, ActionConnector>,
    timers: BTreeMap<ElementId, Timer>,
    host: Host,
    poisoned: bool,
}

impl Process {
    /// Creates an empty, idle process.
    pub fn new(id: ProcessId, host: Host) -> Self {
        Self {
            id,
            lifecycle: Lifecycle::Idle,
            current_state: None,
            initial_state: None,
            start_connector: None,
            names: NamesDb::new(),
            memory: Memory::new(id),
            states: BTreeMap::new(),
            signal_handlers: BTreeMap::new(),
            connectors: BTreeMap::new(),
            timers: BTreeMap::new(),
            host,
            poisoned: false,
        }
    }

    fn ensure_usable(&self) -> Result<(), CoreError> {
        if self.poisoned {
            return Err(CoreError::Poisoned {
                process_id: self.id,
            });
        }
        Ok(())
    }

    /// Poisons the process when `result` carries a syntax error.
    fn check<T>(&mut self, result: Result<T, CoreError>) -> Result<T, CoreError> {
        if let Err(e) = &result {
            if e.is_syntax_error() && !self.poisoned {
                self.poisoned = true;
                tracing::error!(process_id = self.id, error = %e, "process poisoned");
            }
        }
        result
    }

    // =========================================================================
    // Construction
    // =========================================================================

    pub fn create_state(&mut self, name: &str) -> Result<ElementId, CoreError> {
        self.ensure_usable()?;
        let result = self.names.register(name).map(|id| {
            self.states.insert(id, State::new(id, name));
            tracing::debug!(process_id = self.id, "created state {} ({})", name, id);
            id
        });
        self.check(result)
    }

    /// Creates the handler of `signal` in a state. Signal names themselves
    /// are not registered, so a signal may share its name with a timer.
    pub fn create_add_signal_handler(
        &mut self,
        state_id: ElementId,
        signal: &str,
    ) -> Result<ElementId, CoreError> {
        self.ensure_usable()?;
        let result = self.add_signal_handler(state_id, signal);
        self.check(result)
    }

    fn add_signal_handler(&mut self, state_id: ElementId, signal: &str) -> Result<ElementId, CoreError> {
        let state = self.states.get(&state_id).ok_or(CoreError::UnknownElement {
            kind: ElementKind::State,
            id: state_id,
        })?;
        if state.handler_for(signal).is_some() {
            return Err(CoreError::InvalidGraph {
                reason: format!("state '{}' already handles '{}'", state.name(), signal),
            });
        }
        let name = SignalHandler::handler_name(signal, state.name());
        let id = self.names.register(name)?;
        let handler = SignalHandler::new(id, state, signal);
        tracing::debug!(process_id = self.id, "created signal handler {} ({})", handler.name(), id);
        self.signal_handlers.insert(id, handler);
        if let Some(state) = self.states.get_mut(&state_id) {
            state.add_handler(signal, id)?;
        }
        Ok(id)
    }

    fn create_connector(&mut self, action: Action) -> ElementId {
        let id = self.names.allocate_id();
        tracing::trace!(
            process_id = self.id,
            "created connector {} [{}]",
            id,
            action.label(&self.names)
        );
        self.connectors.insert(id, ActionConnector::new(id, action));
        id
    }

    fn connector_ref(&self, id: ElementId) -> Result<&ActionConnector, CoreError> {
        self.connectors.get(&id).ok_or(CoreError::UnknownElement {
            kind: ElementKind::Connector,
            id,
        })
    }

    /// Creates the connector run by `start()`. Only one may exist.
    pub fn create_add_start_action_connector(&mut self, action: Action) -> Result<ElementId, CoreError> {
        self.ensure_usable()?;
        let result = match self.start_connector {
            Some(existing) => Err(CoreError::InvalidGraph {
                reason: format!("start connector already defined ({})", existing),
            }),
            None => {
                let id = self.create_connector(action);
                self.start_connector = Some(id);
                Ok(id)
            }
        };
        self.check(result)
    }

    fn bind_handler(&mut self, handler_id: ElementId, connector_id: ElementId) -> Result<(), CoreError> {
        self.connector_ref(connector_id)?;
        let handler = self
            .signal_handlers
            .get_mut(&handler_id)
            .ok_or(CoreError::UnknownElement {
                kind: ElementKind::SignalHandler,
                id: handler_id,
            })?;
        handler.bind(connector_id)
    }

    fn check_handler_unbound(&self, handler_id: ElementId) -> Result<(), CoreError> {
        let handler = self
            .signal_handlers
            .get(&handler_id)
            .ok_or(CoreError::UnknownElement {
                kind: ElementKind::SignalHandler,
                id: handler_id,
            })?;
        match handler.first_action() {
            Some(existing) => Err(CoreError::InvalidGraph {
                reason: format!(
                    "handler '{}' is already bound to connector {}",
                    handler.name(),
                    existing
                ),
            }),
            None => Ok(()),
        }
    }

    /// Creates a connector and binds it as the first action of a handler.
    pub fn create_set_first_action_connector(
        &mut self,
        handler_id: ElementId,
        action: Action,
    ) -> Result<ElementId, CoreError> {
        self.ensure_usable()?;
        let result = self.check_handler_unbound(handler_id).and_then(|_| {
            let id = self.create_connector(action);
            self.bind_handler(handler_id, id).map(|_| id)
        });
        self.check(result)
    }

    /// Binds an existing connector as the first action of a handler.
    pub fn set_first_action_connector(
        &mut self,
        handler_id: ElementId,
        connector_id: ElementId,
    ) -> Result<(), CoreError> {
        self.ensure_usable()?;
        let result = self.bind_handler(handler_id, connector_id);
        self.check(result)
    }

    fn link(&mut self, from: ElementId, slot: LinkSlot, to: ElementId) -> Result<(), CoreError> {
        self.connector_ref(to)?;
        let connector = self.connectors.get_mut(&from).ok_or(CoreError::UnknownElement {
            kind: ElementKind::Connector,
            id: from,
        })?;
        connector.link(slot, to)
    }

    fn create_linked(&mut self, from: ElementId, slot: LinkSlot, action: Action) -> Result<ElementId, CoreError> {
        self.ensure_usable()?;
        let result = self.connector_ref(from).and_then(|c| c.check_slot(slot)).and_then(|_| {
            let id = self.create_connector(action);
            self.link(from, slot, id).map(|_| id)
        });
        self.check(result)
    }

    fn set_linked(&mut self, from: ElementId, slot: LinkSlot, to: ElementId) -> Result<(), CoreError> {
        self.ensure_usable()?;
        let result = self.link(from, slot, to);
        self.check(result)
    }

    /// Creates a connector following `from` when its action yields NEXT.
    pub fn create_set_next_action_connector(
        &mut self,
        from: ElementId,
        action: Action,
    ) -> Result<ElementId, CoreError> {
        self.create_linked(from, LinkSlot::Next, action)
    }

    pub fn set_next_action_connector(&mut self, from: ElementId, to: ElementId) -> Result<(), CoreError> {
        self.set_linked(from, LinkSlot::Next, to)
    }

    /// Creates a connector following `from` when its condition is false.
    pub fn create_set_alt_next_action_connector(
        &mut self,
        from: ElementId,
        action: Action,
    ) -> Result<ElementId, CoreError> {
        self.create_linked(from, LinkSlot::AltNext, action)
    }

    pub fn set_alt_next_action_connector(&mut self, from: ElementId, to: ElementId) -> Result<(), CoreError> {
        self.set_linked(from, LinkSlot::AltNext, to)
    }

    /// Creates the connector a switch routes to when no case matches.
    pub fn create_set_default_switch_action_connector(
        &mut self,
        from: ElementId,
        action: Action,
    ) -> Result<ElementId, CoreError> {
        self.create_linked(from, LinkSlot::DefaultSwitch, action)
    }

    pub fn set_default_switch_action_connector(
        &mut self,
        from: ElementId,
        to: ElementId,
    ) -> Result<(), CoreError> {
        self.set_linked(from, LinkSlot::DefaultSwitch, to)
    }

    /// Appends a switch case connector. Cases match in registration order.
    pub fn create_add_switch_action_connector(
        &mut self,
        from: ElementId,
        action: Action,
    ) -> Result<ElementId, CoreError> {
        self.create_linked(from, LinkSlot::SwitchCase, action)
    }

    pub fn add_switch_action_connector(&mut self, from: ElementId, to: ElementId) -> Result<(), CoreError> {
        self.set_linked(from, LinkSlot::SwitchCase, to)
    }

    pub fn create_add_timer(&mut self, name: &str) -> Result<ElementId, CoreError> {
        self.ensure_usable()?;
        let result = self.names.register(name).map(|id| {
            self.timers.insert(id, Timer::new(id, name));
            tracing::debug!(process_id = self.id, "created timer {} ({})", name, id);
            id
        });
        self.check(result)
    }

    pub fn create_add_variable(
        &mut self,
        name: &str,
        data_type: DataType,
        initial: Option<Value>,
    ) -> Result<ElementId, CoreError> {
        self.ensure_usable()?;
        let result = self
            .memory
            .create_add_variable(&mut self.names, name, data_type, initial.as_ref());
        self.check(result)
    }

    pub fn create_add_constant(
        &mut self,
        name: &str,
        data_type: DataType,
        value: Value,
    ) -> Result<ElementId, CoreError> {
        self.ensure_usable()?;
        let result = self
            .memory
            .create_add_constant(&mut self.names, name, data_type, &value);
        self.check(result)
    }

    /// Sets the state the process is in before its start chain runs.
    pub fn set_initial_state(&mut self, state_id: ElementId) -> Result<(), CoreError> {
        self.ensure_usable()?;
        let result = if !self.states.contains_key(&state_id) {
            Err(CoreError::UnknownElement {
                kind: ElementKind::State,
                id: state_id,
            })
        } else if let Some(existing) = self.initial_state {
            Err(CoreError::InvalidGraph {
                reason: format!("initial state already set to '{}'", self.names.get_name(existing)),
            })
        } else {
            self.initial_state = Some(state_id);
            self.current_state = Some(state_id);
            Ok(())
        };
        self.check(result)
    }

    // =========================================================================
    // Driving
    // =========================================================================

    /// Activates the process and runs its start connector chain.
    pub fn start(&mut self) -> Result<(), CoreError> {
        self.ensure_usable()?;
        if self.lifecycle != Lifecycle::Idle {
            return Err(CoreError::InvalidLifecycle {
                expected: Lifecycle::Idle,
                actual: self.lifecycle,
            });
        }
        let start = match self.start_connector {
            Some(id) => id,
            None => {
                let err = Err(CoreError::MissingStartConnector {
                    process_id: self.id,
                });
                return self.check(err);
            }
        };

        self.lifecycle = Lifecycle::Active;
        tracing::info!(process_id = self.id, "process started");
        let result = self.walk(start);
        self.check(result)
    }

    /// Dispatches any event addressed to this process.
    pub fn handle(&mut self, event: &Event) -> Result<(), CoreError> {
        if event.process_id() != self.id {
            return Err(CoreError::MisroutedEvent {
                process_id: self.id,
                target: event.process_id(),
            });
        }
        match event {
            Event::Start { .. } => self.start(),
            Event::Signal(signal) => self.handle_signal(signal),
            Event::Timer(timer) => self.handle_timer(timer),
        }
    }

    /// Runs the handler of the current state for `signal`, if any.
    pub fn handle_signal(&mut self, signal: &Signal) -> Result<(), CoreError> {
        self.ensure_usable()?;
        match self.lifecycle {
            Lifecycle::Finished => {
                tracing::info!(
                    process_id = self.id,
                    "process finished, signal {} ignored",
                    signal.name
                );
                return Ok(());
            }
            Lifecycle::Idle => {
                return Err(CoreError::InvalidLifecycle {
                    expected: Lifecycle::Active,
                    actual: Lifecycle::Idle,
                })
            }
            Lifecycle::Active => {}
        }

        let result = self.dispatch_signal(signal);
        self.memory.clear_temp_variables(&mut self.names);
        self.check(result)
    }

    fn dispatch_signal(&mut self, signal: &Signal) -> Result<(), CoreError> {
        self.memory
            .init_temp_variables_from_signal(&mut self.names, signal)?;

        let state_id = self.current_state.ok_or(CoreError::NoCurrentState {
            process_id: self.id,
        })?;
        let state = self.states.get(&state_id).ok_or(CoreError::UnknownElement {
            kind: ElementKind::State,
            id: state_id,
        })?;
        let handler_id = match state.handler_for(&signal.name) {
            Some(id) => id,
            None => {
                tracing::info!(
                    process_id = self.id,
                    "signal {} not handled in state {}",
                    signal.name,
                    state.name()
                );
                return Ok(());
            }
        };
        let handler = self
            .signal_handlers
            .get(&handler_id)
            .ok_or(CoreError::UnknownElement {
                kind: ElementKind::SignalHandler,
                id: handler_id,
            })?;
        let first = match handler.first_action() {
            Some(id) => id,
            None => {
                tracing::info!(
                    process_id = self.id,
                    "handler {} has no actions, signal dropped",
                    handler.name()
                );
                return Ok(());
            }
        };

        tracing::debug!(
            process_id = self.id,
            "handling {} ({} args)",
            handler.name(),
            signal.arguments.len()
        );
        self.walk(first)
    }

    /// Turns a timer expiration into a signal named after the timer.
    ///
    /// Firings of timers that were reset or re-armed since are stale and ignored.
    pub fn handle_timer(&mut self, event: &TimerEvent) -> Result<(), CoreError> {
        self.ensure_usable()?;
        if self.lifecycle == Lifecycle::Finished {
            tracing::info!(process_id = self.id, "process finished, timer ignored");
            return Ok(());
        }

        let timer = match self.timers.get_mut(&event.timer_id) {
            Some(timer) => timer,
            None => {
                let err = Err(CoreError::UnknownElement {
                    kind: ElementKind::Timer,
                    id: event.timer_id,
                });
                return self.check(err);
            }
        };
        if timer.job() != Some(event.job) {
            tracing::debug!(
                process_id = self.id,
                "stale firing of timer {} (job {}) ignored",
                timer.name(),
                event.job
            );
            return Ok(());
        }
        timer.disarm();

        let signal = Signal::new(self.id, timer.name());
        self.handle_signal(&signal)
    }

    /// Runs the connector chain starting at `id` until an action stops it.
    pub fn execute_action_connector(&mut self, id: ElementId) -> Result<(), CoreError> {
        self.ensure_usable()?;
        let result = self.walk(id);
        self.check(result)
    }

    fn walk(&mut self, id: ElementId) -> Result<(), CoreError> {
        let mut next = Some(id);
        while let Some(connector_id) = next {
            let action = self.connector_ref(connector_id)?.shared_action();
            tracing::trace!(
                process_id = self.id,
                "connector {} [{}]",
                connector_id,
                action.kind()
            );
            let flow = self.execute_action(&action)?;
            next = self.connector_ref(connector_id)?.successor(flow)?;
        }
        Ok(())
    }

    fn execute_action(&mut self, action: &Action) -> Result<Flow, CoreError> {
        match action {
            Action::SendSignal { name, args } => self.handle_send_signal(name, args),
            Action::SetTimer { timer_id, delay } => self.handle_set_timer(*timer_id, delay),
            Action::ResetTimer { timer_id } => self.handle_reset_timer(*timer_id),
            Action::FunctionCall { name, args } => self.handle_function_call(name, args),
            Action::Task { variable_id, expr } => self.handle_task(*variable_id, expr),
            Action::Condition { op, lhs, rhs } => self.handle_condition(*op, lhs, rhs.as_ref()),
            Action::SwitchCondition { selector, cases } => self.handle_switch(selector, cases),
            Action::NextState { state_id } => self.handle_next_state(*state_id),
            Action::Exit => self.handle_exit(),
        }
    }

    // =========================================================================
    // Action handlers
    // =========================================================================

    fn handle_send_signal(&mut self, name: &str, args: &[Expression]) -> Result<Flow, CoreError> {
        let values = self.memory.evaluate_expressions(&self.names, args)?;
        tracing::debug!(process_id = self.id, "send {} {:?}", name, values);
        self.host
            .callback
            .handle_send_signal(self.id, name, &values);
        Ok(Flow::Next)
    }

    fn handle_set_timer(&mut self, timer_id: ElementId, delay: &Expression) -> Result<Flow, CoreError> {
        let timer = self.timers.get(&timer_id).ok_or(CoreError::UnknownElement {
            kind: ElementKind::Timer,
            id: timer_id,
        })?;
        if timer.is_pending() {
            return Err(CoreError::TimerPending {
                timer: timer.name().to_string(),
            });
        }

        let delay = delay_from_value(&self.memory.evaluate_expression(&self.names, delay)?)?;
        let process_id = self.id;
        let sink = Arc::clone(&self.host.sink);
        let job: Job = Box::new(move |job| {
            sink.consume(Event::Timer(TimerEvent {
                process_id,
                timer_id,
                job,
            }))
        });

        let scheduled = self.host.scheduler.schedule(delay, job);
        if let Some(timer) = self.timers.get_mut(&timer_id) {
            match scheduled {
                Ok(job) => {
                    timer.arm(job);
                    tracing::debug!(
                        process_id = self.id,
                        "timer {} set for {:?} (job {})",
                        timer.name(),
                        delay,
                        job
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        process_id = self.id,
                        error = %e,
                        "failed to schedule timer {}",
                        timer.name()
                    );
                }
            }
        }
        Ok(Flow::Next)
    }

    fn handle_reset_timer(&mut self, timer_id: ElementId) -> Result<Flow, CoreError> {
        let timer = self
            .timers
            .get_mut(&timer_id)
            .ok_or(CoreError::UnknownElement {
                kind: ElementKind::Timer,
                id: timer_id,
            })?;
        if let Some(job) = timer.disarm() {
            if let Err(e) = self.host.scheduler.cancel(job) {
                tracing::warn!(
                    process_id = self.id,
                    error = %e,
                    "failed to cancel job {} of timer {}",
                    job,
                    timer.name()
                );
            }
            tracing::debug!(process_id = self.id, "timer {} reset", timer.name());
        }
        Ok(Flow::Next)
    }

    fn handle_function_call(&mut self, name: &str, args: &[Argument]) -> Result<Flow, CoreError> {
        let mut values = self.memory.evaluate_arguments(&self.names, args)?;
        tracing::debug!(process_id = self.id, "call {} {:?}", name, values);
        self.host
            .callback
            .handle_function_call(self.id, name, &mut values);
        self.memory
            .import_values_into_variables(&self.names, args, &values)?;
        Ok(Flow::Next)
    }

    fn handle_task(&mut self, variable_id: ElementId, expr: &Expression) -> Result<Flow, CoreError> {
        self.memory.ensure_assignable(variable_id)?;
        let value = self.memory.evaluate_expression(&self.names, expr)?;
        self.memory.assign_variable(variable_id, &value)?;
        Ok(Flow::Next)
    }

    fn handle_condition(
        &mut self,
        op: ComparisonOp,
        lhs: &Expression,
        rhs: Option<&Expression>,
    ) -> Result<Flow, CoreError> {
        let lhs = self.memory.evaluate_expression(&self.names, lhs)?;
        let holds = match (op, rhs) {
            (ComparisonOp::Not, _) => !lhs.as_bool(),
            (_, Some(rhs)) => {
                let rhs = self.memory.evaluate_expression(&self.names, rhs)?;
                compare_values(op, &lhs, &rhs)?
            }
            (_, None) => {
                return Err(CoreError::IllegalOperation {
                    reason: format!("condition '{}' has no right operand", op),
                })
            }
        };
        Ok(if holds { Flow::Next } else { Flow::AltNext })
    }

    fn handle_switch(&mut self, selector: &Expression, cases: &[Expression]) -> Result<Flow, CoreError> {
        let selector = self.memory.evaluate_expression(&self.names, selector)?;
        for (index, case) in cases.iter().enumerate() {
            let value = self.memory.evaluate_expression(&self.names, case)?;
            if compare_values(ComparisonOp::Eq, &selector, &value)? {
                return Ok(Flow::Switch(SwitchBranch::Case(index + 1)));
            }
        }
        Ok(Flow::Switch(SwitchBranch::Default))
    }

    fn handle_next_state(&mut self, state_id: ElementId) -> Result<Flow, CoreError> {
        let target = self.states.get(&state_id).ok_or(CoreError::UnknownElement {
            kind: ElementKind::State,
            id: state_id,
        })?;
        match self.current_state {
            Some(current) if current == state_id => {
                tracing::debug!(
                    process_id = self.id,
                    "remained in state {} ({})",
                    target.name(),
                    state_id
                );
            }
            current => {
                tracing::info!(
                    process_id = self.id,
                    "switched state {} ({}) --> {} ({})",
                    current.map(|id| self.names.get_name(id)).unwrap_or("?"),
                    current.unwrap_or(0),
                    target.name(),
                    state_id
                );
            }
        }
        self.current_state = Some(state_id);
        Ok(Flow::Stop)
    }

    fn handle_exit(&mut self) -> Result<Flow, CoreError> {
        if self.lifecycle != Lifecycle::Active {
            return Err(CoreError::InvalidLifecycle {
                expected: Lifecycle::Active,
                actual: self.lifecycle,
            });
        }
        self.lifecycle = Lifecycle::Finished;
        self.cancel_timers();
        tracing::info!(process_id = self.id, "process finished");
        Ok(Flow::Stop)
    }

    /// Cancels every pending timer.
    pub fn cancel_timers(&mut self) {
        for timer in self.timers.values_mut() {
            if let Some(job) = timer.disarm() {
                if let Err(e) = self.host.scheduler.cancel(job) {
                    tracing::warn!(process_id = self.id, error = %e, "failed to cancel job {}", job);
                }
            }
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn id(&self) -> ProcessId {
        self.id
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    pub fn current_state(&self) -> Option<ElementId> {
        self.current_state
    }

    pub fn current_state_name(&self) -> Option<&str> {
        self.current_state
            .and_then(|id| self.states.get(&id))
            .map(State::name)
    }

    pub fn initial_state(&self) -> Option<ElementId> {
        self.initial_state
    }

    pub fn start_connector(&self) -> Option<ElementId> {
        self.start_connector
    }

    pub fn names(&self) -> &NamesDb {
        &self.names
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn state(&self, id: ElementId) -> Option<&State> {
        self.states.get(&id)
    }

    pub fn states(&self) -> impl Iterator<Item = &State> {
        self.states.values()
    }

    pub fn signal_handler(&self, id: ElementId) -> Option<&SignalHandler> {
        self.signal_handlers.get(&id)
    }

    pub fn signal_handlers(&self) -> impl Iterator<Item = &SignalHandler> {
        self.signal_handlers.values()
    }

    pub fn connector(&self, id: ElementId) -> Option<&ActionConnector> {
        self.connectors.get(&id)
    }

    pub fn connectors(&self) -> impl Iterator<Item = &ActionConnector> {
        self.connectors.values()
    }

    pub fn timer(&self, id: ElementId) -> Option<&Timer> {
        self.timers.get(&id)
    }

    pub fn timers(&self) -> impl Iterator<Item = &Timer> {
        self.timers.values()
    }

    /// Looks up any named element.
    pub fn find_element(&self, name: &str) -> Option<ElementId> {
        self.names.find_element(name)
    }

    /// Reads a variable or constant by name.
    pub fn value_of(&self, name: &str) -> Option<&Value> {
        self.names
            .find_element(name)
            .and_then(|id| self.memory.lookup(id))
    }
}

/// Converts an evaluated delay in seconds into a duration.
fn delay_from_value(value: &Value) -> Result<Duration, CoreError> {
    match value.data_type() {
        DataType::Int if value.as_int() >= 0 => Ok(Duration::from_secs(value.as_int() as u64)),
        DataType::Double => Duration::try_from_secs_f64(value.as_double()).map_err(|e| {
            CoreError::InvalidDelay {
                reason: format!("{}: {}", value, e),
            }
        }),
        _ => Err(CoreError::InvalidDelay {
            reason: format!("expected a non-negative number of seconds, got {}", value),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{ManualScheduler, QueueSink, RecordingCallback};
    use crate::value_ops::BinaryOp;

    struct Harness {
        callback: Arc<RecordingCallback>,
        scheduler: Arc<ManualScheduler>,
        sink: Arc<QueueSink>,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                callback: Arc::new(RecordingCallback::new()),
                scheduler: Arc::new(ManualScheduler::new()),
                sink: Arc::new(QueueSink::new()),
            }
        }

        fn process(&self) -> Process {
            let host = Host::new(self.callback.clone(), self.scheduler.clone(), self.sink.clone());
            Process::new(1, host)
        }

        /// Fires every pending job and feeds the resulting events back.
        fn fire_timers(&self, process: &mut Process) {
            self.scheduler.fire_all();
            for event in self.sink.drain() {
                process.handle(&event).unwrap();
            }
        }
    }

    fn signal(name: &str) -> Signal {
        Signal::new(1, name)
    }

    /// IDLE --T--> PLAYING with `SetTimer(T, 1); NextState(IDLE)` at start.
    fn playing_scenario(process: &mut Process) -> (ElementId, ElementId, ElementId) {
        let timer = process.create_add_timer("T").unwrap();
        let idle = process.create_state("IDLE").unwrap();
        let playing = process.create_state("PLAYING").unwrap();

        let start = process
            .create_add_start_action_connector(Action::SetTimer {
                timer_id: timer,
                delay: Expression::value(1),
            })
            .unwrap();
        process
            .create_set_next_action_connector(start, Action::NextState { state_id: idle })
            .unwrap();

        let handler = process.create_add_signal_handler(idle, "T").unwrap();
        let send = process
            .create_set_first_action_connector(
                handler,
                Action::send_signal("ScenPlayMessage", vec![Expression::value(1)]),
            )
            .unwrap();
        process
            .create_set_next_action_connector(send, Action::NextState { state_id: playing })
            .unwrap();

        (timer, idle, playing)
    }

    #[test]
    fn test_timer_drives_state_change() {
        let harness = Harness::new();
        let mut process = harness.process();
        let (timer, idle, playing) = playing_scenario(&mut process);

        process.start().unwrap();
        assert_eq!(process.lifecycle(), Lifecycle::Active);
        assert_eq!(process.current_state(), Some(idle));
        assert!(process.timer(timer).unwrap().is_pending());
        assert_eq!(harness.scheduler.pending()[0].1, Duration::from_secs(1));

        harness.fire_timers(&mut process);

        assert_eq!(process.current_state(), Some(playing));
        assert_eq!(process.current_state_name(), Some("PLAYING"));
        assert!(!process.timer(timer).unwrap().is_pending());
        let sent = harness.callback.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].name, "ScenPlayMessage");
        assert_eq!(sent[0].args, vec![Value::int(1)]);
    }

    #[test]
    fn test_explicit_signal_matches_timer_name() {
        let harness = Harness::new();
        let mut process = harness.process();
        let (_, _, playing) = playing_scenario(&mut process);

        process.start().unwrap();
        process.handle_signal(&signal("T")).unwrap();
        assert_eq!(process.current_state(), Some(playing));
    }

    #[test]
    fn test_condition_routes_on_comparison() {
        let harness = Harness::new();
        let mut process = harness.process();
        let x = process
            .create_add_variable("X", DataType::Int, Some(Value::int(3)))
            .unwrap();
        let yes = process.create_state("YES").unwrap();
        let no = process.create_state("NO").unwrap();

        let cond = process
            .create_add_start_action_connector(Action::condition(
                ComparisonOp::Eq,
                Expression::variable(x),
                Expression::value(3),
            ))
            .unwrap();
        process
            .create_set_next_action_connector(cond, Action::NextState { state_id: yes })
            .unwrap();
        process
            .create_set_alt_next_action_connector(cond, Action::NextState { state_id: no })
            .unwrap();

        process.execute_action_connector(cond).unwrap();
        assert_eq!(process.current_state(), Some(yes));

        process.memory.assign_variable(x, &Value::int(4)).unwrap();
        process.execute_action_connector(cond).unwrap();
        assert_eq!(process.current_state(), Some(no));
    }

    #[test]
    fn test_negation_condition() {
        let harness = Harness::new();
        let mut process = harness.process();
        let flag = process
            .create_add_variable("flag", DataType::Bool, Some(Value::bool(false)))
            .unwrap();
        let next = process.create_state("NEXT").unwrap();
        let alt = process.create_state("ALT").unwrap();
        let cond = process
            .create_add_start_action_connector(Action::negation(Expression::variable(flag)))
            .unwrap();
        process
            .create_set_next_action_connector(cond, Action::NextState { state_id: next })
            .unwrap();
        process
            .create_set_alt_next_action_connector(cond, Action::NextState { state_id: alt })
            .unwrap();

        process.start().unwrap();
        assert_eq!(process.current_state(), Some(next));

        process.memory.assign_variable(flag, &Value::bool(true)).unwrap();
        process.execute_action_connector(cond).unwrap();
        assert_eq!(process.current_state(), Some(alt));
    }

    fn switch_process(harness: &Harness, cases: usize) -> (Process, ElementId, Vec<ElementId>, ElementId) {
        let mut process = harness.process();
        let selector = process
            .create_add_variable("sel", DataType::Int, Some(Value::int(0)))
            .unwrap();
        let case_values = (1..=cases).map(|i| Expression::value(i as i64 * 10)).collect();
        let switch = process
            .create_add_start_action_connector(Action::SwitchCondition {
                selector: Expression::variable(selector),
                cases: case_values,
            })
            .unwrap();

        let mut states = Vec::new();
        for i in 1..=cases {
            let state = process.create_state(&format!("CASE_{}", i)).unwrap();
            process
                .create_add_switch_action_connector(switch, Action::NextState { state_id: state })
                .unwrap();
            states.push(state);
        }
        let default = process.create_state("DEFAULT").unwrap();
        process
            .create_set_default_switch_action_connector(switch, Action::NextState { state_id: default })
            .unwrap();
        (process, selector, states, default)
    }

    #[test]
    fn test_switch_routes_to_matching_case() {
        let harness = Harness::new();
        let (mut process, selector, states, default) = switch_process(&harness, 3);
        let switch = process.start_connector().unwrap();

        for (i, state) in states.iter().enumerate() {
            process
                .memory
                .assign_variable(selector, &Value::int((i as i64 + 1) * 10))
                .unwrap();
            process.execute_action_connector(switch).unwrap();
            assert_eq!(process.current_state(), Some(*state));
        }

        process.memory.assign_variable(selector, &Value::int(99)).unwrap();
        process.execute_action_connector(switch).unwrap();
        assert_eq!(process.current_state(), Some(default));
    }

    #[test]
    fn test_switch_first_match_wins() {
        let harness = Harness::new();
        let mut process = harness.process();
        let a = process.create_state("A").unwrap();
        let b = process.create_state("B").unwrap();
        let d = process.create_state("D").unwrap();
        let switch = process
            .create_add_start_action_connector(Action::SwitchCondition {
                selector: Expression::value(5),
                cases: vec![Expression::value(5), Expression::value(5)],
            })
            .unwrap();
        process
            .create_add_switch_action_connector(switch, Action::NextState { state_id: a })
            .unwrap();
        process
            .create_add_switch_action_connector(switch, Action::NextState { state_id: b })
            .unwrap();
        process
            .create_set_default_switch_action_connector(switch, Action::NextState { state_id: d })
            .unwrap();

        process.start().unwrap();
        assert_eq!(process.current_state(), Some(a));
    }

    #[test]
    fn test_set_timer_on_pending_timer_fails() {
        let harness = Harness::new();
        let mut process = harness.process();
        let timer = process.create_add_timer("T").unwrap();
        let idle = process.create_state("IDLE").unwrap();
        let start = process
            .create_add_start_action_connector(Action::NextState { state_id: idle })
            .unwrap();
        let handler = process.create_add_signal_handler(idle, "arm").unwrap();
        let set = process
            .create_set_first_action_connector(
                handler,
                Action::SetTimer {
                    timer_id: timer,
                    delay: Expression::value(2.5),
                },
            )
            .unwrap();
        process.set_next_action_connector(set, start).unwrap();

        process.start().unwrap();
        process.handle_signal(&signal("arm")).unwrap();
        assert_eq!(harness.scheduler.pending()[0].1, Duration::from_millis(2500));

        let err = process.handle_signal(&signal("arm")).unwrap_err();
        assert!(matches!(err, CoreError::TimerPending { .. }));
        assert!(!process.is_poisoned());
        assert_eq!(harness.scheduler.pending().len(), 1);
    }

    #[test]
    fn test_reset_timer_makes_firing_stale() {
        let harness = Harness::new();
        let mut process = harness.process();
        let timer = process.create_add_timer("T").unwrap();
        let idle = process.create_state("IDLE").unwrap();
        let fired = process.create_state("FIRED").unwrap();

        let start = process
            .create_add_start_action_connector(Action::SetTimer {
                timer_id: timer,
                delay: Expression::value(1),
            })
            .unwrap();
        process
            .create_set_next_action_connector(start, Action::NextState { state_id: idle })
            .unwrap();

        let cancel = process.create_add_signal_handler(idle, "cancel").unwrap();
        let reset = process
            .create_set_first_action_connector(cancel, Action::ResetTimer { timer_id: timer })
            .unwrap();
        process
            .create_set_next_action_connector(reset, Action::NextState { state_id: idle })
            .unwrap();
        let on_timer = process.create_add_signal_handler(idle, "T").unwrap();
        process
            .create_set_first_action_connector(on_timer, Action::NextState { state_id: fired })
            .unwrap();

        process.start().unwrap();
        let (job, _) = harness.scheduler.pending()[0];

        process.handle_signal(&signal("cancel")).unwrap();
        assert!(!process.timer(timer).unwrap().is_pending());
        assert!(harness.scheduler.pending().is_empty());

        // A firing that raced with the reset is ignored.
        let stale = Event::Timer(TimerEvent {
            process_id: 1,
            timer_id: timer,
            job,
        });
        process.handle(&stale).unwrap();
        assert_eq!(process.current_state(), Some(idle));
        assert!(harness.callback.sent().is_empty());

        // Resetting an inactive timer is a no-op.
        process.handle_signal(&signal("cancel")).unwrap();
        assert_eq!(process.current_state(), Some(idle));
    }

    #[test]
    fn test_scheduling_failure_leaves_timer_inactive() {
        let harness = Harness::new();
        harness.scheduler.refuse_jobs(true);
        let mut process = harness.process();
        let (timer, idle, _) = playing_scenario(&mut process);

        process.start().unwrap();
        assert_eq!(process.current_state(), Some(idle));
        assert!(!process.timer(timer).unwrap().is_pending());
    }

    #[test]
    fn test_exit_finishes_process() {
        let harness = Harness::new();
        let mut process = harness.process();
        let (timer, idle, _) = playing_scenario(&mut process);
        let quit = process.create_add_signal_handler(idle, "quit").unwrap();
        process
            .create_set_first_action_connector(quit, Action::Exit)
            .unwrap();

        process.start().unwrap();
        process.handle_signal(&signal("quit")).unwrap();
        assert_eq!(process.lifecycle(), Lifecycle::Finished);
        assert!(!process.timer(timer).unwrap().is_pending());
        assert!(harness.scheduler.pending().is_empty());

        process.handle_signal(&signal("T")).unwrap();
        assert_eq!(process.current_state(), Some(idle));
        assert!(harness.callback.sent().is_empty());
    }

    #[test]
    fn test_temp_variables_scoped_to_signal() {
        let harness = Harness::new();
        let mut process = harness.process();
        let total = process
            .create_add_variable("total", DataType::Int, Some(Value::int(0)))
            .unwrap();
        let idle = process.create_state("IDLE").unwrap();
        process
            .create_add_start_action_connector(Action::NextState { state_id: idle })
            .unwrap();
        let add = process.create_add_signal_handler(idle, "add").unwrap();
        let task = process
            .create_set_first_action_connector(
                add,
                Action::Task {
                    variable_id: total,
                    expr: Expression::binary(
                        BinaryOp::Plus,
                        Expression::variable(total),
                        Expression::variable_name("$1"),
                    ),
                },
            )
            .unwrap();
        process
            .create_set_next_action_connector(task, Action::NextState { state_id: idle })
            .unwrap();

        process.start().unwrap();
        process
            .handle_signal(&Signal::with_args(1, "add", vec![Value::int(5)]))
            .unwrap();
        process
            .handle_signal(&Signal::with_args(1, "add", vec![Value::int(7)]))
            .unwrap();

        assert_eq!(process.value_of("total"), Some(&Value::int(12)));
        assert_eq!(process.find_element("$1"), None);
        assert_eq!(process.memory().temp_variables().count(), 0);

        // Without an argument `$1` is unknown and the graph is broken.
        let err = process.handle_signal(&signal("add")).unwrap_err();
        assert!(matches!(err, CoreError::UnknownName { .. }));
        assert!(process.is_poisoned());
        assert!(matches!(
            process.handle_signal(&signal("add")),
            Err(CoreError::Poisoned { .. })
        ));
    }

    #[test]
    fn test_function_call_writes_back_outputs() {
        let harness = Harness::new();
        harness
            .callback
            .register_function("convert_tone_to_action", |args: &mut [Value]| {
                let tone = args[0].as_int();
                args[1] = Value::int(tone * 2);
                args[2] = Value::string("ignored");
            });

        let mut process = harness.process();
        let response = process
            .create_add_variable("response", DataType::Int, Some(Value::int(21)))
            .unwrap();
        let action = process.create_add_variable("action", DataType::Int, None).unwrap();
        let message = process
            .create_add_variable("action_message", DataType::Int, None)
            .unwrap();
        let done = process.create_state("DONE").unwrap();
        let call = process
            .create_add_start_action_connector(Action::function_call(
                "convert_tone_to_action",
                vec![
                    Argument::input(Expression::variable(response)),
                    Argument::output(Expression::variable(action)),
                    Argument::output(Expression::variable(message)),
                ],
            ))
            .unwrap();
        process
            .create_set_next_action_connector(call, Action::NextState { state_id: done })
            .unwrap();

        process.start().unwrap();
        assert_eq!(process.memory().lookup(action), Some(&Value::int(42)));
        // A string written into an INT variable is coerced to zero.
        assert_eq!(process.memory().lookup(message), Some(&Value::int(0)));
        assert_eq!(harness.callback.calls()[0].1[0], Value::int(21));
    }

    #[test]
    fn test_unhandled_signal_is_dropped() {
        let harness = Harness::new();
        let mut process = harness.process();
        let (_, idle, _) = playing_scenario(&mut process);
        process.start().unwrap();
        process.handle_signal(&signal("Unknown")).unwrap();
        assert_eq!(process.current_state(), Some(idle));
        assert!(!process.is_poisoned());
    }

    #[test]
    fn test_lifecycle_errors() {
        let harness = Harness::new();
        let mut process = harness.process();
        assert!(matches!(
            process.handle_signal(&signal("x")),
            Err(CoreError::InvalidLifecycle { .. })
        ));
        let err = process.start().unwrap_err();
        assert!(matches!(err, CoreError::MissingStartConnector { .. }));
        assert!(process.is_poisoned());
    }

    #[test]
    fn test_start_twice_fails() {
        let harness = Harness::new();
        let mut process = harness.process();
        playing_scenario(&mut process);
        process.start().unwrap();
        assert!(matches!(
            process.start(),
            Err(CoreError::InvalidLifecycle { .. })
        ));
    }

    #[test]
    fn test_construction_errors() {
        let harness = Harness::new();
        let mut process = harness.process();
        let idle = process.create_state("IDLE").unwrap();
        process
            .create_add_start_action_connector(Action::NextState { state_id: idle })
            .unwrap();
        let second = process.create_add_start_action_connector(Action::Exit);
        assert!(matches!(second, Err(CoreError::InvalidGraph { .. })));
        assert!(process.is_poisoned());

        let mut process = harness.process();
        let idle = process.create_state("IDLE").unwrap();
        process.create_add_signal_handler(idle, "T").unwrap();
        assert!(process.create_add_signal_handler(idle, "T").is_err());

        let mut process = harness.process();
        process.create_add_timer("T").unwrap();
        assert!(matches!(
            process.create_state("T"),
            Err(CoreError::DuplicateName { .. })
        ));
    }

    #[test]
    fn test_exit_requires_active() {
        let harness = Harness::new();
        let mut process = harness.process();
        let exit = process.create_add_start_action_connector(Action::Exit).unwrap();

        let err = process.execute_action_connector(exit).unwrap_err();
        assert!(matches!(
            err,
            CoreError::InvalidLifecycle {
                expected: Lifecycle::Active,
                actual: Lifecycle::Idle
            }
        ));
        assert_eq!(process.lifecycle(), Lifecycle::Idle);
        assert!(!process.is_poisoned());

        process.start().unwrap();
        assert_eq!(process.lifecycle(), Lifecycle::Finished);
        let err = process.execute_action_connector(exit).unwrap_err();
        assert!(matches!(
            err,
            CoreError::InvalidLifecycle {
                actual: Lifecycle::Finished,
                ..
            }
        ));
    }

    #[test]
    fn test_unbound_handler_drops_signal() {
        let harness = Harness::new();
        let mut process = harness.process();
        let idle = process.create_state("IDLE").unwrap();
        process.create_add_signal_handler(idle, "Ping").unwrap();
        process
            .create_add_start_action_connector(Action::NextState { state_id: idle })
            .unwrap();
        process.start().unwrap();

        process
            .handle_signal(&Signal::with_args(1, "Ping", vec![Value::int(1)]))
            .unwrap();
        assert_eq!(process.current_state(), Some(idle));
        assert_eq!(process.lifecycle(), Lifecycle::Active);
        assert!(!process.is_poisoned());
        assert_eq!(process.memory().temp_variables().count(), 0);
        assert!(harness.callback.sent().is_empty());
    }

    #[test]
    fn test_switch_type_mismatch_poisons() {
        let harness = Harness::new();
        let mut process = harness.process();
        let idle = process.create_state("IDLE").unwrap();
        let hit = process.create_state("HIT").unwrap();
        process
            .create_add_start_action_connector(Action::NextState { state_id: idle })
            .unwrap();
        let handler = process.create_add_signal_handler(idle, "Route").unwrap();
        let switch = process
            .create_set_first_action_connector(
                handler,
                Action::SwitchCondition {
                    selector: Expression::variable_name("$1"),
                    cases: vec![Expression::value(1)],
                },
            )
            .unwrap();
        process
            .create_add_switch_action_connector(switch, Action::NextState { state_id: hit })
            .unwrap();
        process
            .create_set_default_switch_action_connector(switch, Action::NextState { state_id: idle })
            .unwrap();
        process.start().unwrap();

        let err = process
            .handle_signal(&Signal::with_args(1, "Route", vec![Value::string("1")]))
            .unwrap_err();
        assert!(matches!(err, CoreError::TypeMismatch { .. }));
        assert!(process.is_poisoned());
        assert_eq!(process.current_state(), Some(idle));
        assert!(matches!(
            process.handle_signal(&Signal::with_args(1, "Route", vec![Value::int(1)])),
            Err(CoreError::Poisoned { .. })
        ));
    }

    #[test]
    fn test_condition_type_mismatch_poisons() {
        let harness = Harness::new();
        let mut process = harness.process();
        let x = process
            .create_add_variable("x", DataType::Int, Some(Value::int(3)))
            .unwrap();
        let condition = process
            .create_add_start_action_connector(Action::Condition {
                op: ComparisonOp::Eq,
                lhs: Expression::variable(x),
                rhs: Some(Expression::value(3.0)),
            })
            .unwrap();
        process.create_set_next_action_connector(condition, Action::Exit).unwrap();
        process.create_set_alt_next_action_connector(condition, Action::Exit).unwrap();

        let err = process.start().unwrap_err();
        assert!(matches!(err, CoreError::TypeMismatch { .. }));
        assert!(process.is_poisoned());
        assert_eq!(process.lifecycle(), Lifecycle::Active);
    }

    #[test]
    fn test_link_kind_mismatch() {
        let harness = Harness::new();
        let mut process = harness.process();
        let switch = process
            .create_add_start_action_connector(Action::SwitchCondition {
                selector: Expression::value(1),
                cases: vec![],
            })
            .unwrap();
        let err = process
            .create_set_next_action_connector(switch, Action::Exit)
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidGraph { .. }));
        // Nothing was created for the rejected link.
        assert_eq!(process.connectors().count(), 1);
    }

    #[test]
    fn test_remain_in_state_loop() {
        let harness = Harness::new();
        let mut process = harness.process();
        let count = process
            .create_add_variable("count", DataType::Int, Some(Value::int(0)))
            .unwrap();
        let idle = process.create_state("IDLE").unwrap();
        let start = process
            .create_add_start_action_connector(Action::NextState { state_id: idle })
            .unwrap();
        let tick = process.create_add_signal_handler(idle, "tick").unwrap();
        let task = process
            .create_set_first_action_connector(
                tick,
                Action::Task {
                    variable_id: count,
                    expr: Expression::binary(
                        BinaryOp::Plus,
                        Expression::variable(count),
                        Expression::value(1),
                    ),
                },
            )
            .unwrap();
        process.set_next_action_connector(task, start).unwrap();

        process.start().unwrap();
        for _ in 0..3 {
            process.handle_signal(&signal("tick")).unwrap();
        }
        assert_eq!(process.value_of("count"), Some(&Value::int(3)));
        assert_eq!(process.current_state(), Some(idle));
    }

    #[test]
    fn test_invalid_delay() {
        let harness = Harness::new();
        let mut process = harness.process();
        let timer = process.create_add_timer("T").unwrap();
        process
            .create_add_start_action_connector(Action::SetTimer {
                timer_id: timer,
                delay: Expression::value(-1),
            })
            .unwrap();
        assert!(matches!(process.start(), Err(CoreError::InvalidDelay { .. })));

        assert!(delay_from_value(&Value::double(f64::NAN)).is_err());
        assert!(delay_from_value(&Value::string("1")).is_err());
        assert_eq!(delay_from_value(&Value::int(0)).unwrap(), Duration::ZERO);
    }

    #[test]
    fn test_misrouted_event() {
        let harness = Harness::new();
        let mut process = harness.process();
        let err = process
            .handle(&Event::Start { process_id: 2 })
            .unwrap_err();
        assert!(matches!(err, CoreError::MisroutedEvent { .. }));
    }

    mod routing {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_switch_routes_to_case_or_default(cases in 1usize..12, selector in 0i64..150) {
                let harness = Harness::new();
                let (mut process, sel, states, default) = switch_process(&harness, cases);
                let switch = process.start_connector().unwrap();

                process.memory.assign_variable(sel, &Value::int(selector)).unwrap();
                process.execute_action_connector(switch).unwrap();

                let expected = if selector % 10 == 0 && selector >= 10 && (selector / 10) as usize <= cases {
                    states[(selector / 10) as usize - 1]
                } else {
                    default
                };
                prop_assert_eq!(process.current_state(), Some(expected));
            }
        }
    }
}
