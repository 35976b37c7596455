//! Process definitions.
//!
//! Processes are described with a JSON DSL and instantiated through the
//! construction API of [`Process`]:
//!
//! ```json
//! {
//!   "constants": [{"name": "DONE", "type": "INT", "value": 0}],
//!   "timers": ["T"],
//!   "states": ["IDLE", "PLAYING"],
//!   "start": [
//!     {"action": "set_timer", "timer": "T", "delay": 1},
//!     {"action": "next_state", "state": "IDLE"}
//!   ],
//!   "handlers": [
//!     {"state": "IDLE", "signal": "T", "actions": [
//!       {"action": "send_signal", "signal": "Play", "args": [{"var": "DONE"}, "hello"]},
//!       {"action": "next_state", "state": "PLAYING"}
//!     ]}
//!   ]
//! }
//! ```
//!
//! Every chain ends in `next_state`, `exit`, a branch (`condition`, `switch`)
//! or a `goto` back to a labelled action built earlier. Every path through a
//! `goto` has to reach `next_state` or `exit` before it comes back to the
//! same `goto`, so a single walk always terminates.

use crate::action::Action;
use crate::connector::LinkSlot;
use crate::error::CoreError;
use crate::expression::{Argument, Expression};
use crate::host::Host;
use crate::memory::temp_variable_name;
use crate::names_db::{ElementId, ProcessId};
use crate::process::Process;
use crate::value::{DataType, Value};
use crate::value_ops::{BinaryOp, ComparisonOp, UnaryOp};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// A constant declaration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstantDef {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    pub value: serde_json::Value,
}

/// A variable declaration. Without a value the variable starts at zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariableDef {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
}

/// Handler of one signal in one state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandlerDef {
    pub state: String,
    pub signal: String,
    pub actions: Vec<ActionDef>,
}

/// Expression tree. Plain JSON scalars are literals.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExpressionDef {
    /// Variable, constant or `$n` signal argument.
    Var { var: String },
    Not { not: Box<ExpressionDef> },
    Binary {
        op: BinaryOp,
        lhs: Box<ExpressionDef>,
        rhs: Box<ExpressionDef>,
    },
    Literal(serde_json::Value),
}

/// Function call argument: `{"out": "var"}` or any input expression.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArgumentDef {
    Out { out: String },
    In(ExpressionDef),
}

/// One case of a switch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseDef {
    pub value: ExpressionDef,
    pub actions: Vec<ActionDef>,
}

/// An action in a chain, optionally labelled as a `goto` target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionDef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(flatten)]
    pub kind: ActionKindDef,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ActionKindDef {
    SendSignal {
        signal: String,
        #[serde(default)]
        args: Vec<ExpressionDef>,
    },
    SetTimer {
        timer: String,
        delay: ExpressionDef,
    },
    ResetTimer {
        timer: String,
    },
    Call {
        function: String,
        #[serde(default)]
        args: Vec<ArgumentDef>,
    },
    Task {
        var: String,
        value: ExpressionDef,
    },
    Condition {
        op: ComparisonOp,
        lhs: ExpressionDef,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        rhs: Option<ExpressionDef>,
        #[serde(rename = "then")]
        then_actions: Vec<ActionDef>,
        #[serde(rename = "else")]
        else_actions: Vec<ActionDef>,
    },
    Switch {
        selector: ExpressionDef,
        cases: Vec<CaseDef>,
        default: Vec<ActionDef>,
    },
    NextState {
        state: String,
    },
    Exit,
    /// Continues at a labelled action defined earlier.
    Goto {
        target: String,
    },
}

impl ActionKindDef {
    fn name(&self) -> &'static str {
        match self {
            ActionKindDef::SendSignal { .. } => "send_signal",
            ActionKindDef::SetTimer { .. } => "set_timer",
            ActionKindDef::ResetTimer { .. } => "reset_timer",
            ActionKindDef::Call { .. } => "call",
            ActionKindDef::Task { .. } => "task",
            ActionKindDef::Condition { .. } => "condition",
            ActionKindDef::Switch { .. } => "switch",
            ActionKindDef::NextState { .. } => "next_state",
            ActionKindDef::Exit => "exit",
            ActionKindDef::Goto { .. } => "goto",
        }
    }

    /// True if nothing may follow this action in its chain.
    fn ends_chain(&self) -> bool {
        matches!(
            self,
            ActionKindDef::Condition { .. }
                | ActionKindDef::Switch { .. }
                | ActionKindDef::NextState { .. }
                | ActionKindDef::Exit
                | ActionKindDef::Goto { .. }
        )
    }
}

/// Raw process definition as stored/transmitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessDefinitionRaw {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constants: Vec<ConstantDef>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variables: Vec<VariableDef>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub timers: Vec<String>,

    pub states: Vec<String>,

    /// State the process is in while its start chain runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial: Option<String>,

    /// Chain run by `start()`.
    pub start: Vec<ActionDef>,

    #[serde(default)]
    pub handlers: Vec<HandlerDef>,

    /// Optional metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Value>,
}

/// Validated process definition.
#[derive(Debug, Clone)]
pub struct ProcessDefinition {
    /// Definition name.
    pub name: String,

    /// Original raw definition.
    pub raw: ProcessDefinitionRaw,

    /// Hash of the definition for integrity checks.
    pub checksum: String,
}

impl ProcessDefinition {
    /// Parses and validates a process definition from JSON.
    pub fn from_json(name: impl Into<String>, json: &serde_json::Value) -> Result<Self, CoreError> {
        let raw: ProcessDefinitionRaw = serde_json::from_value(json.clone())?;
        Self::from_raw(name, raw)
    }

    /// Reads a definition file. The name is the file stem.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let raw: ProcessDefinitionRaw = serde_json::from_str(&content)?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "process".to_string());
        Self::from_raw(name, raw)
    }

    /// Validates raw parts.
    pub fn from_raw(name: impl Into<String>, raw: ProcessDefinitionRaw) -> Result<Self, CoreError> {
        Validator::new(&raw)?.validate(&raw)?;

        let json_bytes = serde_json::to_vec(&raw)?;
        let checksum = format!("{:08x}", crc32c::crc32c(&json_bytes));

        Ok(Self {
            name: name.into(),
            raw,
            checksum,
        })
    }

    pub fn to_json(&self) -> Result<serde_json::Value, CoreError> {
        Ok(serde_json::to_value(&self.raw)?)
    }

    /// Builds an idle process from this definition.
    pub fn instantiate(&self, process_id: ProcessId, host: Host) -> Result<Process, CoreError> {
        let mut process = Process::new(process_id, host);
        Builder::new(&mut process).build(&self.raw)?;
        tracing::debug!(
            process_id,
            definition = %self.name,
            checksum = %self.checksum,
            "process instantiated"
        );
        Ok(process)
    }
}

fn invalid(reason: impl Into<String>) -> CoreError {
    CoreError::InvalidDefinition {
        reason: reason.into(),
    }
}

/// Returns true for `$1`, `$2`, ...
fn is_temp_name(name: &str) -> bool {
    name.strip_prefix('$')
        .and_then(|n| n.parse::<usize>().ok())
        .is_some_and(|n| n >= 1 && temp_variable_name(n - 1) == name)
}

// ============================================================================
// Validation
// ============================================================================

struct Validator {
    states: HashSet<String>,
    timers: HashSet<String>,
    variables: HashSet<String>,
    constants: HashSet<String>,
    labels: HashSet<String>,
}

impl Validator {
    fn new(raw: &ProcessDefinitionRaw) -> Result<Self, CoreError> {
        let mut all = HashSet::new();
        let mut declare = |kind: &str, name: &str| -> Result<String, CoreError> {
            if name.is_empty() || name.starts_with('$') {
                return Err(invalid(format!("invalid {} name '{}'", kind, name)));
            }
            if !all.insert(name.to_string()) {
                return Err(invalid(format!("duplicate name '{}'", name)));
            }
            Ok(name.to_string())
        };

        let mut constants = HashSet::new();
        for c in &raw.constants {
            constants.insert(declare("constant", &c.name)?);
            DataType::parse(&c.data_type)?;
            Value::from_json(&c.value)?;
        }
        let mut variables = HashSet::new();
        for v in &raw.variables {
            variables.insert(declare("variable", &v.name)?);
            DataType::parse(&v.data_type)?;
            if let Some(value) = &v.value {
                Value::from_json(value)?;
            }
        }
        let mut timers = HashSet::new();
        for t in &raw.timers {
            timers.insert(declare("timer", t)?);
        }
        let mut states = HashSet::new();
        for s in &raw.states {
            states.insert(declare("state", s)?);
        }

        Ok(Self {
            states,
            timers,
            variables,
            constants,
            labels: HashSet::new(),
        })
    }

    fn validate(mut self, raw: &ProcessDefinitionRaw) -> Result<(), CoreError> {
        if let Some(initial) = &raw.initial {
            self.state(initial)?;
        }

        self.chain(&raw.start, "start chain", true)?;

        let mut handled = HashSet::new();
        for h in &raw.handlers {
            self.state(&h.state)?;
            if h.signal.is_empty() {
                return Err(invalid(format!("empty signal name in state '{}'", h.state)));
            }
            if !handled.insert((h.state.as_str(), h.signal.as_str())) {
                return Err(invalid(format!(
                    "duplicate handler for '{}' in state '{}'",
                    h.signal, h.state
                )));
            }
            let context = format!("handler '{} in {}'", h.signal, h.state);
            self.chain(&h.actions, &context, false)?;
        }

        FlowGraph::build(raw).check_loops()
    }

    fn state(&self, name: &str) -> Result<(), CoreError> {
        if !self.states.contains(name) {
            return Err(invalid(format!("unknown state '{}'", name)));
        }
        Ok(())
    }

    fn timer(&self, name: &str) -> Result<(), CoreError> {
        if !self.timers.contains(name) {
            return Err(invalid(format!("unknown timer '{}'", name)));
        }
        Ok(())
    }

    fn chain(&mut self, actions: &[ActionDef], context: &str, is_start: bool) -> Result<(), CoreError> {
        let last = match actions.last() {
            Some(last) => last,
            None => return Err(invalid(format!("{} is empty", context))),
        };
        if !last.kind.ends_chain() {
            return Err(invalid(format!(
                "{} ends with '{}' instead of next_state, exit, a branch or goto",
                context,
                last.kind.name()
            )));
        }
        if is_start && matches!(actions[0].kind, ActionKindDef::Goto { .. }) {
            return Err(invalid("start chain cannot begin with goto"));
        }

        for (index, action) in actions.iter().enumerate() {
            if index + 1 < actions.len() && action.kind.ends_chain() {
                return Err(invalid(format!(
                    "'{}' must be the last action of {}",
                    action.kind.name(),
                    context
                )));
            }
            self.action(action, context)?;
        }
        Ok(())
    }

    fn action(&mut self, action: &ActionDef, context: &str) -> Result<(), CoreError> {
        if let Some(label) = &action.label {
            if matches!(action.kind, ActionKindDef::Goto { .. }) {
                return Err(invalid(format!("goto in {} cannot carry a label", context)));
            }
            if !self.labels.insert(label.clone()) {
                return Err(invalid(format!("duplicate label '{}'", label)));
            }
        }

        match &action.kind {
            ActionKindDef::SendSignal { signal, args } => {
                if signal.is_empty() {
                    return Err(invalid(format!("empty signal name in {}", context)));
                }
                args.iter().try_for_each(|a| self.expression(a))
            }
            ActionKindDef::SetTimer { timer, delay } => {
                self.timer(timer)?;
                self.expression(delay)
            }
            ActionKindDef::ResetTimer { timer } => self.timer(timer),
            ActionKindDef::Call { function, args } => {
                if function.is_empty() {
                    return Err(invalid(format!("empty function name in {}", context)));
                }
                for arg in args {
                    match arg {
                        ArgumentDef::Out { out } => {
                            if !self.variables.contains(out) && !is_temp_name(out) {
                                return Err(invalid(format!(
                                    "output argument '{}' of '{}' is not a variable",
                                    out, function
                                )));
                            }
                        }
                        ArgumentDef::In(expr) => self.expression(expr)?,
                    }
                }
                Ok(())
            }
            ActionKindDef::Task { var, value } => {
                if !self.variables.contains(var) {
                    return Err(invalid(format!("task target '{}' is not a variable", var)));
                }
                self.expression(value)
            }
            ActionKindDef::Condition {
                op,
                lhs,
                rhs,
                then_actions,
                else_actions,
            } => {
                self.expression(lhs)?;
                match (op, rhs) {
                    (ComparisonOp::Not, Some(_)) => {
                        return Err(invalid(format!("negation in {} takes no rhs", context)))
                    }
                    (ComparisonOp::Not, None) => {}
                    (_, Some(rhs)) => self.expression(rhs)?,
                    (op, None) => {
                        return Err(invalid(format!(
                            "condition '{}' in {} needs an rhs",
                            op, context
                        )))
                    }
                }
                self.chain(then_actions, &format!("then branch in {}", context), false)?;
                self.chain(else_actions, &format!("else branch in {}", context), false)
            }
            ActionKindDef::Switch {
                selector,
                cases,
                default,
            } => {
                self.expression(selector)?;
                for (index, case) in cases.iter().enumerate() {
                    self.expression(&case.value)?;
                    let case_context = format!("case {} in {}", index + 1, context);
                    self.chain(&case.actions, &case_context, false)?;
                }
                self.chain(default, &format!("default branch in {}", context), false)
            }
            ActionKindDef::NextState { state } => self.state(state),
            ActionKindDef::Exit => Ok(()),
            ActionKindDef::Goto { target } => {
                if !self.labels.contains(target) {
                    return Err(invalid(format!(
                        "goto target '{}' in {} is not a label defined earlier",
                        target, context
                    )));
                }
                Ok(())
            }
        }
    }

    fn expression(&self, expr: &ExpressionDef) -> Result<(), CoreError> {
        match expr {
            ExpressionDef::Var { var } => {
                if self.variables.contains(var) || self.constants.contains(var) || is_temp_name(var) {
                    Ok(())
                } else {
                    Err(invalid(format!("unknown variable '{}'", var)))
                }
            }
            ExpressionDef::Not { not } => self.expression(not),
            ExpressionDef::Binary { lhs, rhs, .. } => {
                self.expression(lhs)?;
                self.expression(rhs)
            }
            ExpressionDef::Literal(json) => Value::from_json(json).map(|_| ()),
        }
    }
}

/// Action graph flattened across all chains, used to find `goto` loops.
///
/// Sequential and branch edges always point at a higher node index, so any
/// cycle passes through at least one `goto` edge. `next_state` and `exit`
/// have no successors.
#[derive(Default)]
struct FlowGraph<'a> {
    successors: Vec<Vec<usize>>,
    labels: HashMap<&'a str, usize>,
    gotos: Vec<(usize, &'a str)>,
}

impl<'a> FlowGraph<'a> {
    fn build(raw: &'a ProcessDefinitionRaw) -> Self {
        let mut graph = Self::default();
        graph.add_chain(&raw.start);
        for h in &raw.handlers {
            graph.add_chain(&h.actions);
        }
        for &(node, target) in &graph.gotos {
            if let Some(&label) = graph.labels.get(target) {
                graph.successors[node].push(label);
            }
        }
        graph
    }

    /// Adds a chain and returns the node of its first action.
    fn add_chain(&mut self, actions: &'a [ActionDef]) -> Option<usize> {
        let first = self.successors.len();
        self.successors.extend(actions.iter().map(|_| Vec::new()));

        for (offset, action) in actions.iter().enumerate() {
            let node = first + offset;
            if let Some(label) = &action.label {
                self.labels.insert(label.as_str(), node);
            }
            match &action.kind {
                ActionKindDef::Condition {
                    then_actions,
                    else_actions,
                    ..
                } => {
                    for branch in [then_actions, else_actions] {
                        if let Some(head) = self.add_chain(branch) {
                            self.successors[node].push(head);
                        }
                    }
                }
                ActionKindDef::Switch { cases, default, .. } => {
                    for branch in cases.iter().map(|c| &c.actions).chain([default]) {
                        if let Some(head) = self.add_chain(branch) {
                            self.successors[node].push(head);
                        }
                    }
                }
                ActionKindDef::Goto { target } => self.gotos.push((node, target.as_str())),
                ActionKindDef::NextState { .. } | ActionKindDef::Exit => {}
                _ => {
                    if offset + 1 < actions.len() {
                        self.successors[node].push(node + 1);
                    }
                }
            }
        }

        (!actions.is_empty()).then_some(first)
    }

    fn check_loops(&self) -> Result<(), CoreError> {
        for &(node, target) in &self.gotos {
            if self.reaches(node, node) {
                return Err(invalid(format!(
                    "goto '{}' loops without reaching next_state or exit",
                    target
                )));
            }
        }
        Ok(())
    }

    /// True when `to` is reachable from the successors of `from`.
    fn reaches(&self, from: usize, to: usize) -> bool {
        let mut seen = vec![false; self.successors.len()];
        let mut stack = self.successors[from].clone();
        while let Some(node) = stack.pop() {
            if node == to {
                return true;
            }
            if !std::mem::replace(&mut seen[node], true) {
                stack.extend(self.successors[node].iter().copied());
            }
        }
        false
    }
}

// ============================================================================
// Building
// ============================================================================

/// Where the next connector of a chain is attached.
#[derive(Debug, Clone, Copy)]
enum Anchor {
    Start,
    Handler(ElementId),
    After(ElementId, LinkSlot),
}

struct Builder<'a> {
    process: &'a mut Process,
    cells: HashMap<String, ElementId>,
    states: HashMap<String, ElementId>,
    timers: HashMap<String, ElementId>,
    labels: HashMap<String, ElementId>,
}

impl<'a> Builder<'a> {
    fn new(process: &'a mut Process) -> Self {
        Self {
            process,
            cells: HashMap::new(),
            states: HashMap::new(),
            timers: HashMap::new(),
            labels: HashMap::new(),
        }
    }

    fn build(mut self, raw: &ProcessDefinitionRaw) -> Result<(), CoreError> {
        for c in &raw.constants {
            let value = Value::from_json(&c.value)?;
            let id = self
                .process
                .create_add_constant(&c.name, DataType::parse(&c.data_type)?, value)?;
            self.cells.insert(c.name.clone(), id);
        }
        for v in &raw.variables {
            let initial = v.value.as_ref().map(Value::from_json).transpose()?;
            let id = self
                .process
                .create_add_variable(&v.name, DataType::parse(&v.data_type)?, initial)?;
            self.cells.insert(v.name.clone(), id);
        }
        for t in &raw.timers {
            let id = self.process.create_add_timer(t)?;
            self.timers.insert(t.clone(), id);
        }
        for s in &raw.states {
            let id = self.process.create_state(s)?;
            self.states.insert(s.clone(), id);
        }
        if let Some(initial) = &raw.initial {
            let id = lookup(&self.states, initial, "state")?;
            self.process.set_initial_state(id)?;
        }

        self.chain(Anchor::Start, &raw.start)?;
        for h in &raw.handlers {
            let state = lookup(&self.states, &h.state, "state")?;
            let handler = self.process.create_add_signal_handler(state, &h.signal)?;
            self.chain(Anchor::Handler(handler), &h.actions)?;
        }
        Ok(())
    }

    fn chain(&mut self, anchor: Anchor, actions: &[ActionDef]) -> Result<(), CoreError> {
        let mut anchor = anchor;
        for def in actions {
            if let ActionKindDef::Goto { target } = &def.kind {
                let target = lookup(&self.labels, target, "label")?;
                self.attach_existing(anchor, target)?;
                return Ok(());
            }

            let action = self.action(&def.kind)?;
            let id = self.attach(anchor, action)?;
            if let Some(label) = &def.label {
                self.labels.insert(label.clone(), id);
            }

            match &def.kind {
                ActionKindDef::Condition {
                    then_actions,
                    else_actions,
                    ..
                } => {
                    self.chain(Anchor::After(id, LinkSlot::Next), then_actions)?;
                    self.chain(Anchor::After(id, LinkSlot::AltNext), else_actions)?;
                }
                ActionKindDef::Switch { cases, default, .. } => {
                    for case in cases {
                        self.chain(Anchor::After(id, LinkSlot::SwitchCase), &case.actions)?;
                    }
                    self.chain(Anchor::After(id, LinkSlot::DefaultSwitch), default)?;
                }
                _ => {}
            }
            anchor = Anchor::After(id, LinkSlot::Next);
        }
        Ok(())
    }

    fn attach(&mut self, anchor: Anchor, action: Action) -> Result<ElementId, CoreError> {
        match anchor {
            Anchor::Start => self.process.create_add_start_action_connector(action),
            Anchor::Handler(h) => self.process.create_set_first_action_connector(h, action),
            Anchor::After(from, LinkSlot::Next) => {
                self.process.create_set_next_action_connector(from, action)
            }
            Anchor::After(from, LinkSlot::AltNext) => {
                self.process.create_set_alt_next_action_connector(from, action)
            }
            Anchor::After(from, LinkSlot::DefaultSwitch) => self
                .process
                .create_set_default_switch_action_connector(from, action),
            Anchor::After(from, LinkSlot::SwitchCase) => {
                self.process.create_add_switch_action_connector(from, action)
            }
        }
    }

    fn attach_existing(&mut self, anchor: Anchor, target: ElementId) -> Result<(), CoreError> {
        match anchor {
            Anchor::Start => Err(invalid("start chain cannot begin with goto")),
            Anchor::Handler(h) => self.process.set_first_action_connector(h, target),
            Anchor::After(from, LinkSlot::Next) => self.process.set_next_action_connector(from, target),
            Anchor::After(from, LinkSlot::AltNext) => {
                self.process.set_alt_next_action_connector(from, target)
            }
            Anchor::After(from, LinkSlot::DefaultSwitch) => self
                .process
                .set_default_switch_action_connector(from, target),
            Anchor::After(from, LinkSlot::SwitchCase) => {
                self.process.add_switch_action_connector(from, target)
            }
        }
    }

    fn action(&self, kind: &ActionKindDef) -> Result<Action, CoreError> {
        let action = match kind {
            ActionKindDef::SendSignal { signal, args } => Action::SendSignal {
                name: signal.clone(),
                args: self.expressions(args)?,
            },
            ActionKindDef::SetTimer { timer, delay } => Action::SetTimer {
                timer_id: lookup(&self.timers, timer, "timer")?,
                delay: self.expression(delay)?,
            },
            ActionKindDef::ResetTimer { timer } => Action::ResetTimer {
                timer_id: lookup(&self.timers, timer, "timer")?,
            },
            ActionKindDef::Call { function, args } => {
                let args = args
                    .iter()
                    .map(|arg| match arg {
                        ArgumentDef::Out { out } => Ok(Argument::output(self.reference(out)?)),
                        ArgumentDef::In(expr) => Ok(Argument::input(self.expression(expr)?)),
                    })
                    .collect::<Result<Vec<_>, CoreError>>()?;
                Action::FunctionCall {
                    name: function.clone(),
                    args,
                }
            }
            ActionKindDef::Task { var, value } => Action::Task {
                variable_id: lookup(&self.cells, var, "variable")?,
                expr: self.expression(value)?,
            },
            ActionKindDef::Condition { op, lhs, rhs, .. } => Action::Condition {
                op: *op,
                lhs: self.expression(lhs)?,
                rhs: rhs.as_ref().map(|r| self.expression(r)).transpose()?,
            },
            ActionKindDef::Switch { selector, cases, .. } => Action::SwitchCondition {
                selector: self.expression(selector)?,
                cases: cases
                    .iter()
                    .map(|c| self.expression(&c.value))
                    .collect::<Result<_, _>>()?,
            },
            ActionKindDef::NextState { state } => Action::NextState {
                state_id: lookup(&self.states, state, "state")?,
            },
            ActionKindDef::Exit => Action::Exit,
            ActionKindDef::Goto { target } => {
                return Err(invalid(format!("goto '{}' is not an action", target)))
            }
        };
        Ok(action)
    }

    /// Declared cells resolve to ids now; `$n` stays late-bound.
    fn reference(&self, name: &str) -> Result<Expression, CoreError> {
        if is_temp_name(name) {
            return Ok(Expression::variable_name(name));
        }
        lookup(&self.cells, name, "variable").map(Expression::variable)
    }

    fn expression(&self, def: &ExpressionDef) -> Result<Expression, CoreError> {
        match def {
            ExpressionDef::Var { var } => self.reference(var),
            ExpressionDef::Not { not } => Ok(Expression::unary(UnaryOp::Not, self.expression(not)?)),
            ExpressionDef::Binary { op, lhs, rhs } => Ok(Expression::binary(
                *op,
                self.expression(lhs)?,
                self.expression(rhs)?,
            )),
            ExpressionDef::Literal(json) => Ok(Expression::Value(Value::from_json(json)?)),
        }
    }

    fn expressions(&self, defs: &[ExpressionDef]) -> Result<Vec<Expression>, CoreError> {
        defs.iter().map(|d| self.expression(d)).collect()
    }
}

fn lookup(map: &HashMap<String, ElementId>, name: &str, kind: &str) -> Result<ElementId, CoreError> {
    map.get(name)
        .copied()
        .ok_or_else(|| invalid(format!("unknown {} '{}'", kind, name)))
}
