//! Per-process registry of element ids and names.

use crate::error::CoreError;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Id of a graph element (state, handler, connector, timer, variable, constant).
pub type ElementId = u32;

/// Id of a process.
pub type ProcessId = u32;

/// Handle of a job accepted by a scheduler.
pub type JobId = u64;

/// Name rendered for an id with no registered name.
pub const UNKNOWN_NAME: &str = "?";

/// Kind of element an id refers to, used in error reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    State,
    SignalHandler,
    Connector,
    Timer,
    Variable,
    Constant,
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ElementKind::State => "state",
            ElementKind::SignalHandler => "signal handler",
            ElementKind::Connector => "action connector",
            ElementKind::Timer => "timer",
            ElementKind::Variable => "variable",
            ElementKind::Constant => "constant",
        };
        f.write_str(s)
    }
}

/// Bidirectional id/name registry.
///
/// Ids are allocated sequentially starting at 1 and shared by every element
/// kind of the owning process. Names are unique.
#[derive(Debug, Default)]
pub struct NamesDb {
    last_id: ElementId,
    names: BTreeMap<ElementId, String>,
    ids: HashMap<String, ElementId>,
}

impl NamesDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a fresh element id without naming it.
    pub fn allocate_id(&mut self) -> ElementId {
        self.last_id += 1;
        self.last_id
    }

    /// Binds a name to an existing id.
    pub fn add_name(&mut self, id: ElementId, name: impl Into<String>) -> Result<(), CoreError> {
        let name = name.into();
        if self.ids.contains_key(&name) {
            return Err(CoreError::DuplicateName { name });
        }
        if let Some(existing) = self.names.get(&id) {
            return Err(CoreError::InvalidGraph {
                reason: format!("id {} is already named '{}'", id, existing),
            });
        }
        self.ids.insert(name.clone(), id);
        self.names.insert(id, name);
        Ok(())
    }

    /// Allocates an id and binds the name to it.
    ///
    /// Nothing is allocated when the name is taken.
    pub fn register(&mut self, name: impl Into<String>) -> Result<ElementId, CoreError> {
        let name = name.into();
        if self.ids.contains_key(&name) {
            return Err(CoreError::DuplicateName { name });
        }
        let id = self.allocate_id();
        self.add_name(id, name)?;
        Ok(id)
    }

    /// Returns the name bound to `id`, or `"?"`.
    pub fn get_name(&self, id: ElementId) -> &str {
        self.names.get(&id).map(String::as_str).unwrap_or(UNKNOWN_NAME)
    }

    pub fn find_element(&self, name: &str) -> Option<ElementId> {
        self.ids.get(name).copied()
    }

    /// Removes the name bound to `id`. Returns false if there was none.
    pub fn delete_name(&mut self, id: ElementId) -> bool {
        match self.names.remove(&id) {
            Some(name) => {
                self.ids.remove(&name);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Iterates over named ids in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = (ElementId, &str)> {
        self.names.iter().map(|(id, name)| (*id, name.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_lookup() {
        let mut names = NamesDb::new();
        let idle = names.register("IDLE").unwrap();
        let timer = names.register("T").unwrap();

        assert_eq!(idle, 1);
        assert_eq!(timer, 2);
        assert_eq!(names.get_name(idle), "IDLE");
        assert_eq!(names.find_element("T"), Some(timer));
        assert_eq!(names.len(), 2);
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut names = NamesDb::new();
        names.register("x").unwrap();
        let result = names.register("x");
        assert!(matches!(result, Err(CoreError::DuplicateName { .. })));
        // The failed registration must not consume an id.
        assert_eq!(names.allocate_id(), 2);
    }

    #[test]
    fn test_unknown_id_renders_placeholder() {
        let names = NamesDb::new();
        assert_eq!(names.get_name(42), "?");
        assert_eq!(names.find_element("nope"), None);
    }

    #[test]
    fn test_delete_name() {
        let mut names = NamesDb::new();
        let id = names.register("$1").unwrap();
        assert!(names.delete_name(id));
        assert!(!names.delete_name(id));
        assert_eq!(names.find_element("$1"), None);

        // The name can be reused, but the id is never handed out again.
        let again = names.register("$1").unwrap();
        assert_ne!(again, id);
    }

    #[test]
    fn test_unnamed_ids() {
        let mut names = NamesDb::new();
        let connector = names.allocate_id();
        let state = names.register("S").unwrap();
        assert_eq!(names.get_name(connector), "?");
        assert!(state > connector);
        assert!(names.add_name(state, "other").is_err());
    }
}
