//! Opaque predicate and row expressions
//!
//! The planner hands filter predicates to the plugin layer as a list of
//! [`Expr`]; insert statements hand over one `Vec<Expr>` per row. The core
//! never evaluates these. It only exposes the function name and argument
//! list so each engine can interpret what it understands.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::value::Value;

/// An expression tree: a column reference, a literal, or a function call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    /// Reference to a column by name
    Column(String),
    /// Constant value
    Literal(Value),
    /// Scalar function call, e.g. `eq(city, 2)`
    Function {
        /// Function name as produced by the planner
        name: String,
        /// Ordered arguments
        args: Vec<Expr>,
    },
}

impl Expr {
    /// Column reference
    pub fn column(name: impl Into<String>) -> Self {
        Expr::Column(name.into())
    }

    /// Literal value
    pub fn literal(value: impl Into<Value>) -> Self {
        Expr::Literal(value.into())
    }

    /// Function call
    pub fn call(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::Function {
            name: name.into(),
            args,
        }
    }

    /// `eq(column, literal)`, the most common pushed-down predicate
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Expr::call("eq", vec![Expr::column(column), Expr::literal(value)])
    }

    /// Function name, or `None` for columns and literals
    pub fn func_name(&self) -> Option<&str> {
        match self {
            Expr::Function { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Function arguments; empty for columns and literals
    pub fn args(&self) -> &[Expr] {
        match self {
            Expr::Function { args, .. } => args,
            _ => &[],
        }
    }

    /// Case-insensitive check of the function name
    pub fn is_call_to(&self, name: &str) -> bool {
        self.func_name()
            .map(|n| n.eq_ignore_ascii_case(name))
            .unwrap_or(false)
    }

    /// Literal value, if this is a literal
    pub fn as_literal(&self) -> Option<&Value> {
        match self {
            Expr::Literal(v) => Some(v),
            _ => None,
        }
    }

    /// Column name, if this is a column reference
    pub fn as_column(&self) -> Option<&str> {
        match self {
            Expr::Column(c) => Some(c),
            _ => None,
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Column(c) => write!(f, "{}", c),
            Expr::Literal(v) => write!(f, "{}", v),
            Expr::Function { name, args } => {
                write!(f, "{}(", name)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
        }
    }
}
