//! States and signal handlers.

use crate::error::CoreError;
use crate::names_db::ElementId;
use std::collections::BTreeMap;

/// A process state mapping signal names to handlers.
#[derive(Debug, Clone)]
pub struct State {
    id: ElementId,
    name: String,
    handlers: BTreeMap<String, ElementId>,
}

impl State {
    pub fn new(id: ElementId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            handlers: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> ElementId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Registers the handler for `signal`. One handler per signal.
    pub fn add_handler(&mut self, signal: &str, handler_id: ElementId) -> Result<(), CoreError> {
        if self.handlers.contains_key(signal) {
            return Err(CoreError::InvalidGraph {
                reason: format!("state '{}' already handles '{}'", self.name, signal),
            });
        }
        self.handlers.insert(signal.to_string(), handler_id);
        Ok(())
    }

    pub fn handler_for(&self, signal: &str) -> Option<ElementId> {
        self.handlers.get(signal).copied()
    }

    /// Iterates over `(signal, handler id)` in signal name order.
    pub fn handlers(&self) -> impl Iterator<Item = (&str, ElementId)> {
        self.handlers.iter().map(|(s, id)| (s.as_str(), *id))
    }
}

/// Entry point of the connector chain run when a state receives a signal.
#[derive(Debug, Clone)]
pub struct SignalHandler {
    id: ElementId,
    name: String,
    state_id: ElementId,
    signal: String,
    first_action: Option<ElementId>,
}

impl SignalHandler {
    pub fn new(id: ElementId, state: &State, signal: impl Into<String>) -> Self {
        let signal = signal.into();
        Self {
            id,
            name: Self::handler_name(&signal, state.name()),
            state_id: state.id(),
            signal,
            first_action: None,
        }
    }

    /// Registry name of the handler for `signal` in `state`.
    pub fn handler_name(signal: &str, state: &str) -> String {
        format!("{} in {}", signal, state)
    }

    pub fn id(&self) -> ElementId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state_id(&self) -> ElementId {
        self.state_id
    }

    pub fn signal(&self) -> &str {
        &self.signal
    }

    pub fn first_action(&self) -> Option<ElementId> {
        self.first_action
    }

    pub(crate) fn bind(&mut self, connector_id: ElementId) -> Result<(), CoreError> {
        if let Some(existing) = self.first_action {
            return Err(CoreError::InvalidGraph {
                reason: format!(
                    "handler '{}' is already bound to connector {}",
                    self.name, existing
                ),
            });
        }
        self.first_action = Some(connector_id);
        Ok(())
    }
}
