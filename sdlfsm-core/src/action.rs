//! Actions held by action connectors.

use crate::expression::{Argument, Expression};
use crate::names_db::{ElementId, NamesDb};
use crate::value_ops::ComparisonOp;
use std::fmt::Write;

/// One step of a connector chain. Immutable once constructed.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Emits a signal to the host callback.
    SendSignal { name: String, args: Vec<Expression> },
    /// Arms a timer; the delay evaluates to seconds.
    SetTimer {
        timer_id: ElementId,
        delay: Expression,
    },
    ResetTimer { timer_id: ElementId },
    /// Invokes a host function; output arguments receive its results.
    FunctionCall { name: String, args: Vec<Argument> },
    /// Assigns an expression into a variable.
    Task {
        variable_id: ElementId,
        expr: Expression,
    },
    /// Branches on a comparison, or on the negation of `lhs` for [`ComparisonOp::Not`].
    Condition {
        op: ComparisonOp,
        lhs: Expression,
        rhs: Option<Expression>,
    },
    /// Multi-way branch on the first case equal to the selector.
    SwitchCondition {
        selector: Expression,
        cases: Vec<Expression>,
    },
    NextState { state_id: ElementId },
    Exit,
}

impl Action {
    pub fn send_signal(name: impl Into<String>, args: Vec<Expression>) -> Self {
        Action::SendSignal {
            name: name.into(),
            args,
        }
    }

    pub fn function_call(name: impl Into<String>, args: Vec<Argument>) -> Self {
        Action::FunctionCall {
            name: name.into(),
            args,
        }
    }

    /// Binary comparison condition.
    pub fn condition(op: ComparisonOp, lhs: Expression, rhs: Expression) -> Self {
        Action::Condition {
            op,
            lhs,
            rhs: Some(rhs),
        }
    }

    /// Negation condition: false routes to the next connector.
    pub fn negation(lhs: Expression) -> Self {
        Action::Condition {
            op: ComparisonOp::Not,
            lhs,
            rhs: None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Action::SendSignal { .. } => "SendSignal",
            Action::SetTimer { .. } => "SetTimer",
            Action::ResetTimer { .. } => "ResetTimer",
            Action::FunctionCall { .. } => "FunctionCall",
            Action::Task { .. } => "Task",
            Action::Condition { .. } => "Condition",
            Action::SwitchCondition { .. } => "SwitchCondition",
            Action::NextState { .. } => "NextState",
            Action::Exit => "Exit",
        }
    }

    /// Returns true if connectors holding this action use switch links.
    pub fn is_switch(&self) -> bool {
        matches!(self, Action::SwitchCondition { .. })
    }

    /// Returns true if the action ends a connector chain.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Action::NextState { .. } | Action::Exit)
    }

    /// Short human-readable description using element names.
    pub fn label(&self, names: &NamesDb) -> String {
        let mut out = String::new();
        let _ = match self {
            Action::SendSignal { name, args } => {
                let args: Vec<String> = args.iter().map(|a| a.display(names).to_string()).collect();
                write!(out, "send {}({})", name, args.join(", "))
            }
            Action::SetTimer { timer_id, delay } => write!(
                out,
                "set {}({})",
                names.get_name(*timer_id),
                delay.display(names)
            ),
            Action::ResetTimer { timer_id } => write!(out, "reset {}", names.get_name(*timer_id)),
            Action::FunctionCall { name, args } => {
                let args: Vec<String> = args
                    .iter()
                    .map(|a| {
                        let prefix = if a.is_out { "out " } else { "" };
                        format!("{}{}", prefix, a.expr.display(names))
                    })
                    .collect();
                write!(out, "call {}({})", name, args.join(", "))
            }
            Action::Task { variable_id, expr } => write!(
                out,
                "{} := {}",
                names.get_name(*variable_id),
                expr.display(names)
            ),
            Action::Condition { op, lhs, rhs } => match rhs {
                Some(rhs) => write!(out, "{} {} {} ?", lhs.display(names), op, rhs.display(names)),
                None => write!(out, "{}{} ?", op, lhs.display(names)),
            },
            Action::SwitchCondition { selector, .. } => {
                write!(out, "switch {}", selector.display(names))
            }
            Action::NextState { state_id } => write!(out, "-> {}", names.get_name(*state_id)),
            Action::Exit => write!(out, "exit"),
        };
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value_ops::BinaryOp;

    #[test]
    fn test_kinds() {
        let exit = Action::Exit;
        assert!(exit.is_terminal());
        assert!(!exit.is_switch());

        let switch = Action::SwitchCondition {
            selector: Expression::value(1),
            cases: vec![Expression::value(1)],
        };
        assert!(switch.is_switch());
        assert_eq!(switch.kind(), "SwitchCondition");
    }

    #[test]
    fn test_labels() {
        let mut names = NamesDb::new();
        let x = names.register("x").unwrap();
        let idle = names.register("IDLE").unwrap();

        let task = Action::Task {
            variable_id: x,
            expr: Expression::binary(BinaryOp::Plus, Expression::variable(x), Expression::value(1)),
        };
        assert_eq!(task.label(&names), "x := (x + 1)");

        let cond = Action::negation(Expression::variable(x));
        assert_eq!(cond.label(&names), "!x ?");

        let send = Action::send_signal("Play", vec![Expression::value(1), Expression::value("a")]);
        assert_eq!(send.label(&names), "send Play(1, 'a')");

        assert_eq!(Action::NextState { state_id: idle }.label(&names), "-> IDLE");
    }
}
