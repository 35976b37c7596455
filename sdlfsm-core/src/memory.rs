//! Process memory: variables, constants, temp variables and expression
//! evaluation.
//!
//! Identifiers are resolved in a fixed order: regular variables, then the
//! temp variables bound to the current signal, then constants. Temp
//! variables are named `$1`, `$2`, ... after the signal's positional
//! arguments and live only while that signal is processed.

use crate::error::CoreError;
use crate::event::Signal;
use crate::expression::{Argument, Expression};
use crate::names_db::{ElementId, ElementKind, NamesDb, ProcessId};
use crate::value::{DataType, Value};
use crate::value_ops::{apply_binary, apply_unary};
use crate::variable::{Constant, Variable};
use std::collections::BTreeMap;

/// Returns the registry name of the temp variable bound to argument `index` (0-based).
pub fn temp_variable_name(index: usize) -> String {
    format!("${}", index + 1)
}

/// Typed storage and evaluator of one process.
#[derive(Debug)]
pub struct Memory {
    process_id: ProcessId,
    variables: BTreeMap<ElementId, Variable>,
    temp_variables: BTreeMap<ElementId, Variable>,
    constants: BTreeMap<ElementId, Constant>,
}

impl Memory {
    pub fn new(process_id: ProcessId) -> Self {
        Self {
            process_id,
            variables: BTreeMap::new(),
            temp_variables: BTreeMap::new(),
            constants: BTreeMap::new(),
        }
    }

    // =========================================================================
    // Construction
    // =========================================================================

    /// Declares a variable, optionally initialized from `initial`.
    pub fn create_add_variable(
        &mut self,
        names: &mut NamesDb,
        name: &str,
        data_type: DataType,
        initial: Option<&Value>,
    ) -> Result<ElementId, CoreError> {
        let id = names.register(name)?;
        let variable = match initial {
            Some(value) => Variable::with_value(id, name, data_type, value),
            None => Variable::new(id, name, data_type),
        };
        tracing::debug!(
            process_id = self.process_id,
            "created variable {} ({}) : {} = {}",
            name,
            id,
            data_type,
            variable.value()
        );
        self.variables.insert(id, variable);
        Ok(id)
    }

    /// Declares a constant.
    pub fn create_add_constant(
        &mut self,
        names: &mut NamesDb,
        name: &str,
        data_type: DataType,
        value: &Value,
    ) -> Result<ElementId, CoreError> {
        let id = names.register(name)?;
        let constant = Constant::new(id, name, data_type, value);
        tracing::debug!(
            process_id = self.process_id,
            "created constant {} ({}) = {}",
            name,
            id,
            constant.value()
        );
        self.constants.insert(id, constant);
        Ok(id)
    }

    // =========================================================================
    // Temp variables
    // =========================================================================

    /// Replaces the temp variables with the arguments of `signal`.
    ///
    /// Returns the ids of the new temp variables in argument order.
    pub fn init_temp_variables_from_signal(
        &mut self,
        names: &mut NamesDb,
        signal: &Signal,
    ) -> Result<Vec<ElementId>, CoreError> {
        self.clear_temp_variables(names);

        let mut ids = Vec::with_capacity(signal.arguments.len());
        for (index, argument) in signal.arguments.iter().enumerate() {
            let name = temp_variable_name(index);
            let id = names.register(name.as_str())?;
            let mut variable = Variable::new(id, name, argument.data_type());
            variable.set(argument.clone());
            self.temp_variables.insert(id, variable);
            ids.push(id);
        }
        Ok(ids)
    }

    /// Removes every temp variable and its registry name.
    pub fn clear_temp_variables(&mut self, names: &mut NamesDb) {
        for id in std::mem::take(&mut self.temp_variables).into_keys() {
            names.delete_name(id);
        }
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    pub fn variable(&self, id: ElementId) -> Option<&Variable> {
        self.variables.get(&id)
    }

    pub fn temp_variable(&self, id: ElementId) -> Option<&Variable> {
        self.temp_variables.get(&id)
    }

    pub fn constant(&self, id: ElementId) -> Option<&Constant> {
        self.constants.get(&id)
    }

    pub fn variables(&self) -> impl Iterator<Item = &Variable> {
        self.variables.values()
    }

    pub fn temp_variables(&self) -> impl Iterator<Item = &Variable> {
        self.temp_variables.values()
    }

    pub fn constants(&self) -> impl Iterator<Item = &Constant> {
        self.constants.values()
    }

    /// Reads a cell by id: variables, then temp variables, then constants.
    pub fn lookup(&self, id: ElementId) -> Option<&Value> {
        self.variables
            .get(&id)
            .or_else(|| self.temp_variables.get(&id))
            .map(Variable::value)
            .or_else(|| self.constants.get(&id).map(Constant::value))
    }

    fn resolve_name(names: &NamesDb, name: &str) -> Result<ElementId, CoreError> {
        names.find_element(name).ok_or_else(|| CoreError::UnknownName {
            name: name.to_string(),
        })
    }

    // =========================================================================
    // Evaluation
    // =========================================================================

    /// Evaluates an expression to a value.
    pub fn evaluate_expression(&self, names: &NamesDb, expr: &Expression) -> Result<Value, CoreError> {
        match expr {
            Expression::Value(value) => Ok(value.clone()),
            Expression::Variable(id) => self.read(*id),
            Expression::VariableName(name) => self.read(Self::resolve_name(names, name)?),
            Expression::Unary { op, operand } => {
                let operand = self.evaluate_expression(names, operand)?;
                apply_unary(*op, &operand)
            }
            Expression::Binary { op, lhs, rhs } => {
                let lhs = self.evaluate_expression(names, lhs)?;
                let rhs = self.evaluate_expression(names, rhs)?;
                apply_binary(*op, &lhs, &rhs)
            }
        }
    }

    fn read(&self, id: ElementId) -> Result<Value, CoreError> {
        self.lookup(id).cloned().ok_or(CoreError::UnknownElement {
            kind: ElementKind::Variable,
            id,
        })
    }

    /// Evaluates expressions strictly left to right.
    pub fn evaluate_expressions(
        &self,
        names: &NamesDb,
        exprs: &[Expression],
    ) -> Result<Vec<Value>, CoreError> {
        exprs
            .iter()
            .map(|expr| self.evaluate_expression(names, expr))
            .collect()
    }

    /// Evaluates function call arguments strictly left to right.
    pub fn evaluate_arguments(
        &self,
        names: &NamesDb,
        args: &[Argument],
    ) -> Result<Vec<Value>, CoreError> {
        args.iter()
            .map(|arg| self.evaluate_expression(names, &arg.expr))
            .collect()
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Fails unless `id` names a writable variable or temp variable.
    pub fn ensure_assignable(&self, id: ElementId) -> Result<(), CoreError> {
        if self.variables.contains_key(&id) || self.temp_variables.contains_key(&id) {
            return Ok(());
        }
        if let Some(constant) = self.constants.get(&id) {
            return Err(CoreError::NotAssignable {
                expr: format!("constant '{}'", constant.name()),
            });
        }
        Err(CoreError::UnknownElement {
            kind: ElementKind::Variable,
            id,
        })
    }

    /// Assigns `value` into the declared type of a variable or temp variable.
    pub fn assign_variable(&mut self, id: ElementId, value: &Value) -> Result<(), CoreError> {
        self.ensure_assignable(id)?;
        let variable = match self.variables.get_mut(&id) {
            Some(variable) => variable,
            None => self
                .temp_variables
                .get_mut(&id)
                .ok_or(CoreError::UnknownElement {
                    kind: ElementKind::Variable,
                    id,
                })?,
        };
        variable.assign(value);
        tracing::trace!(
            process_id = self.process_id,
            "{} := {}",
            variable.name(),
            variable.value()
        );
        Ok(())
    }

    /// Writes function call results back into the output arguments.
    ///
    /// `values` matches `args` positionally; input arguments are skipped.
    pub fn import_values_into_variables(
        &mut self,
        names: &NamesDb,
        args: &[Argument],
        values: &[Value],
    ) -> Result<(), CoreError> {
        if args.len() != values.len() {
            return Err(CoreError::IllegalOperation {
                reason: format!(
                    "{} arguments but {} returned values",
                    args.len(),
                    values.len()
                ),
            });
        }

        for (arg, value) in args.iter().zip(values) {
            if !arg.is_out {
                continue;
            }
            let id = match &arg.expr {
                Expression::Variable(id) => *id,
                Expression::VariableName(name) => Self::resolve_name(names, name)?,
                other => {
                    return Err(CoreError::NotAssignable {
                        expr: other.display(names).to_string(),
                    })
                }
            };
            self.assign_variable(id, value)?;
        }
        Ok(())
    }
}
