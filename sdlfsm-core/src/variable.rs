//! Named storage cells: variables, constants and timers.

use crate::names_db::{ElementId, JobId};
use crate::value::{DataType, Value};

/// A mutable, typed cell owned by a process memory.
#[derive(Debug, Clone)]
pub struct Variable {
    id: ElementId,
    name: String,
    value: Value,
    is_inited: bool,
}

impl Variable {
    /// Creates an uninitialized variable holding the zero value of its type.
    pub fn new(id: ElementId, name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            id,
            name: name.into(),
            value: Value::with_type(data_type),
            is_inited: false,
        }
    }

    /// Creates a variable initialized by assigning `initial` into its type.
    pub fn with_value(
        id: ElementId,
        name: impl Into<String>,
        data_type: DataType,
        initial: &Value,
    ) -> Self {
        let mut variable = Self::new(id, name, data_type);
        variable.assign(initial);
        variable
    }

    pub fn id(&self) -> ElementId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Type of the held value. An `Undef` variable takes the type of its first assignment.
    pub fn data_type(&self) -> DataType {
        self.value.data_type()
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn is_inited(&self) -> bool {
        self.is_inited
    }

    /// Assigns into the declared type of the variable.
    pub fn assign(&mut self, value: &Value) {
        self.value.assign(value);
        self.is_inited = true;
    }

    /// Replaces the value wholesale, type included.
    pub fn set(&mut self, value: Value) {
        self.value = value;
        self.is_inited = true;
    }
}

/// A write-once named value.
#[derive(Debug, Clone)]
pub struct Constant {
    id: ElementId,
    name: String,
    value: Value,
}

impl Constant {
    pub fn new(id: ElementId, name: impl Into<String>, data_type: DataType, value: &Value) -> Self {
        let mut typed = Value::with_type(data_type);
        typed.assign(value);
        Self {
            id,
            name: name.into(),
            value: typed,
        }
    }

    pub fn id(&self) -> ElementId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data_type(&self) -> DataType {
        self.value.data_type()
    }

    pub fn value(&self) -> &Value {
        &self.value
    }
}

/// A named one-shot timer. At most one scheduler job is pending at a time.
#[derive(Debug, Clone)]
pub struct Timer {
    id: ElementId,
    name: String,
    job: Option<JobId>,
}

impl Timer {
    pub fn new(id: ElementId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            job: None,
        }
    }

    pub fn id(&self) -> ElementId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn job(&self) -> Option<JobId> {
        self.job
    }

    pub fn is_pending(&self) -> bool {
        self.job.is_some()
    }

    pub(crate) fn arm(&mut self, job: JobId) {
        self.job = Some(job);
    }

    /// Clears the pending job, returning it.
    pub(crate) fn disarm(&mut self) -> Option<JobId> {
        self.job.take()
    }
}
