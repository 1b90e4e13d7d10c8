//! Operator kinds for FHIRPath expressions

use serde::{Deserialize, Serialize};
use std::fmt;

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    /// Addition (`+`), also string concatenation
    Add,
    /// Subtraction (`-`)
    Sub,
    /// Multiplication (`*`)
    Mul,
    /// Decimal division (`/`)
    Div,
    /// Truncated integer division (`div`)
    IntDiv,
    /// Modulo (`mod`)
    Mod,
    /// String concatenation treating empty as `''` (`&`)
    Concat,
    /// Equality (`=`)
    Eq,
    /// Inequality (`!=`)
    Ne,
    /// Equivalence (`~`)
    Equivalent,
    /// Non-equivalence (`!~`)
    NotEquivalent,
    /// Less than (`<`)
    Lt,
    /// Less than or equal (`<=`)
    Le,
    /// Greater than (`>`)
    Gt,
    /// Greater than or equal (`>=`)
    Ge,
    /// Logical and, three-valued
    And,
    /// Logical or, three-valued
    Or,
    /// Exclusive or, three-valued
    Xor,
    /// Logical implication, three-valued
    Implies,
    /// Membership (`in`)
    In,
    /// Containership (`contains`)
    Contains,
}

impl BinaryOp {
    /// The operator's surface syntax
    pub const fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::IntDiv => "div",
            BinaryOp::Mod => "mod",
            BinaryOp::Concat => "&",
            BinaryOp::Eq => "=",
            BinaryOp::Ne => "!=",
            BinaryOp::Equivalent => "~",
            BinaryOp::NotEquivalent => "!~",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
            BinaryOp::Xor => "xor",
            BinaryOp::Implies => "implies",
            BinaryOp::In => "in",
            BinaryOp::Contains => "contains",
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Unary polarity operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PolarityOp {
    /// Unary plus
    Plus,
    /// Unary minus
    Minus,
}

impl fmt::Display for PolarityOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolarityOp::Plus => f.write_str("+"),
            PolarityOp::Minus => f.write_str("-"),
        }
    }
}

/// Type operators (`is` / `as`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeOp {
    /// Runtime type test, returns a boolean
    Is,
    /// Runtime type cast, returns the input or empty
    As,
}

impl fmt::Display for TypeOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeOp::Is => f.write_str("is"),
            TypeOp::As => f.write_str("as"),
        }
    }
}
