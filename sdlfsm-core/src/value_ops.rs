//! Operators over [`Value`]s.
//!
//! Every operator dispatches on the left operand's type. Operands of
//! different dynamic types are rejected instead of being coerced.

use crate::error::CoreError;
use crate::value::{DataType, Value};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Comparison used by condition and switch actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComparisonOp {
    #[serde(alias = "==")]
    Eq,
    #[serde(alias = "!=")]
    Neq,
    #[serde(alias = "<")]
    Lt,
    #[serde(alias = "<=")]
    Le,
    #[serde(alias = ">")]
    Gt,
    #[serde(alias = ">=")]
    Ge,
    /// Unary negation, only meaningful inside a condition.
    #[serde(alias = "!")]
    Not,
}

impl ComparisonOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            ComparisonOp::Eq => "==",
            ComparisonOp::Neq => "!=",
            ComparisonOp::Lt => "<",
            ComparisonOp::Le => "<=",
            ComparisonOp::Gt => ">",
            ComparisonOp::Ge => ">=",
            ComparisonOp::Not => "!",
        }
    }

    fn holds(&self, ordering: Option<Ordering>) -> bool {
        match (self, ordering) {
            (ComparisonOp::Neq, None) => true,
            (_, None) => false,
            (ComparisonOp::Eq, Some(o)) => o == Ordering::Equal,
            (ComparisonOp::Neq, Some(o)) => o != Ordering::Equal,
            (ComparisonOp::Lt, Some(o)) => o == Ordering::Less,
            (ComparisonOp::Le, Some(o)) => o != Ordering::Greater,
            (ComparisonOp::Gt, Some(o)) => o == Ordering::Greater,
            (ComparisonOp::Ge, Some(o)) => o != Ordering::Less,
            (ComparisonOp::Not, Some(_)) => false,
        }
    }
}

impl fmt::Display for ComparisonOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Unary expression operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnaryOp {
    #[serde(alias = "!")]
    Not,
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnaryOp::Not => f.write_str("!"),
        }
    }
}

/// Binary expression operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    #[serde(rename = "+", alias = "plus")]
    Plus,
    #[serde(rename = "-", alias = "minus")]
    Minus,
    #[serde(rename = "*", alias = "mul")]
    Mul,
    #[serde(rename = "/", alias = "div")]
    Div,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Plus => "+",
            BinaryOp::Minus => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

fn ensure_same_type(context: &str, lhs: &Value, rhs: &Value) -> Result<(), CoreError> {
    if lhs.data_type() != rhs.data_type() {
        return Err(CoreError::TypeMismatch {
            context: context.to_string(),
            lhs: lhs.data_type(),
            rhs: rhs.data_type(),
        });
    }
    Ok(())
}

/// Compares two values of the same type.
pub fn compare_values(op: ComparisonOp, lhs: &Value, rhs: &Value) -> Result<bool, CoreError> {
    if op == ComparisonOp::Not {
        return Err(CoreError::IllegalOperation {
            reason: "'!' is not a binary comparison".to_string(),
        });
    }
    ensure_same_type(op.symbol(), lhs, rhs)?;

    let ordering = match lhs.data_type() {
        DataType::Undef => {
            return Err(CoreError::IllegalOperation {
                reason: format!("cannot compare undefined values with '{}'", op),
            })
        }
        DataType::Bool => Some(lhs.as_bool().cmp(&rhs.as_bool())),
        DataType::Int => Some(lhs.as_int().cmp(&rhs.as_int())),
        DataType::Double => lhs.as_double().partial_cmp(&rhs.as_double()),
        DataType::String => Some(lhs.as_str().cmp(rhs.as_str())),
    };

    Ok(op.holds(ordering))
}

/// Applies a unary operator.
pub fn apply_unary(op: UnaryOp, operand: &Value) -> Result<Value, CoreError> {
    match (op, operand.data_type()) {
        (UnaryOp::Not, DataType::Bool | DataType::Int | DataType::Double) => {
            Ok(Value::bool(!operand.as_bool()))
        }
        (UnaryOp::Not, other) => Err(CoreError::IllegalOperation {
            reason: format!("'!' is not defined for {}", other),
        }),
    }
}

/// Applies a binary operator to two values of the same type.
pub fn apply_binary(op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<Value, CoreError> {
    ensure_same_type(op.symbol(), lhs, rhs)?;

    match lhs.data_type() {
        DataType::Int => {
            let (a, b) = (lhs.as_int(), rhs.as_int());
            let result = match op {
                BinaryOp::Plus => a.checked_add(b),
                BinaryOp::Minus => a.checked_sub(b),
                BinaryOp::Mul => a.checked_mul(b),
                BinaryOp::Div => {
                    if b == 0 {
                        return Err(CoreError::Arithmetic {
                            reason: "integer division by zero".to_string(),
                        });
                    }
                    a.checked_div(b)
                }
            };
            result.map(Value::int).ok_or_else(|| CoreError::Arithmetic {
                reason: format!("integer overflow in {} {} {}", a, op, b),
            })
        }
        DataType::Double => {
            let (a, b) = (lhs.as_double(), rhs.as_double());
            Ok(Value::double(match op {
                BinaryOp::Plus => a + b,
                BinaryOp::Minus => a - b,
                BinaryOp::Mul => a * b,
                BinaryOp::Div => a / b,
            }))
        }
        DataType::String if op == BinaryOp::Plus => {
            Ok(Value::string(format!("{}{}", lhs.as_str(), rhs.as_str())))
        }
        other => Err(CoreError::IllegalOperation {
            reason: format!("'{}' is not defined for {}", op, other),
        }),
    }
}
