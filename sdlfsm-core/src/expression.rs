//! Expression trees evaluated by process memory.

use crate::names_db::{ElementId, NamesDb};
use crate::value::{DataType, Value};
use crate::value_ops::{BinaryOp, UnaryOp};
use std::fmt;

/// An expression over literals, variables and constants.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// Literal value.
    Value(Value),
    /// Reference to a variable, temp variable or constant by id.
    Variable(ElementId),
    /// Reference resolved through the names registry when evaluated.
    VariableName(String),
    Unary {
        op: UnaryOp,
        operand: Box<Expression>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expression>,
        rhs: Box<Expression>,
    },
}

impl Expression {
    pub fn value(value: impl Into<Value>) -> Self {
        Expression::Value(value.into())
    }

    pub fn variable(id: ElementId) -> Self {
        Expression::Variable(id)
    }

    pub fn variable_name(name: impl Into<String>) -> Self {
        Expression::VariableName(name.into())
    }

    pub fn unary(op: UnaryOp, operand: Expression) -> Self {
        Expression::Unary {
            op,
            operand: Box::new(operand),
        }
    }

    pub fn binary(op: BinaryOp, lhs: Expression, rhs: Expression) -> Self {
        Expression::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    /// Returns true for expressions that name a storage cell.
    pub fn is_reference(&self) -> bool {
        matches!(self, Expression::Variable(_) | Expression::VariableName(_))
    }

    /// Renders the expression with element names looked up in `names`.
    pub fn display<'a>(&'a self, names: &'a NamesDb) -> ExpressionDisplay<'a> {
        ExpressionDisplay { expr: self, names }
    }
}

impl From<Value> for Expression {
    fn from(value: Value) -> Self {
        Expression::Value(value)
    }
}

/// A function call argument. Output arguments receive the callee's result.
#[derive(Debug, Clone, PartialEq)]
pub struct Argument {
    pub is_out: bool,
    pub expr: Expression,
}

impl Argument {
    pub fn input(expr: Expression) -> Self {
        Self {
            is_out: false,
            expr,
        }
    }

    pub fn output(expr: Expression) -> Self {
        Self { is_out: true, expr }
    }
}

/// Display adapter returned by [`Expression::display`].
pub struct ExpressionDisplay<'a> {
    expr: &'a Expression,
    names: &'a NamesDb,
}

impl fmt::Display for ExpressionDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.expr {
            Expression::Value(v) => match v.data_type() {
                DataType::Undef => f.write_str("?"),
                DataType::Bool => write!(f, "{}", v.as_bool()),
                DataType::Int => write!(f, "{}", v.as_int()),
                DataType::Double => write!(f, "{:?}", v.as_double()),
                DataType::String => write!(f, "'{}'", v.as_str()),
            },
            Expression::Variable(id) => f.write_str(self.names.get_name(*id)),
            Expression::VariableName(name) => f.write_str(name),
            Expression::Unary { op, operand } => {
                write!(f, "{}{}", op, operand.display(self.names))
            }
            Expression::Binary { op, lhs, rhs } => write!(
                f,
                "({} {} {})",
                lhs.display(self.names),
                op,
                rhs.display(self.names)
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_with_names() {
        let mut names = NamesDb::new();
        let x = names.register("x").unwrap();

        let expr = Expression::binary(
            BinaryOp::Plus,
            Expression::variable(x),
            Expression::value(1.5),
        );
        assert_eq!(expr.display(&names).to_string(), "(x + 1.5)");

        let expr = Expression::unary(UnaryOp::Not, Expression::variable(99));
        assert_eq!(expr.display(&names).to_string(), "!?");

        let expr = Expression::value("hi");
        assert_eq!(expr.display(&names).to_string(), "'hi'");
    }

    #[test]
    fn test_reference_detection() {
        assert!(Expression::variable(1).is_reference());
        assert!(Expression::variable_name("$1").is_reference());
        assert!(!Expression::value(1).is_reference());
        assert!(Argument::output(Expression::variable(1)).is_out);
    }
}
