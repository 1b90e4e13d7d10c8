//! Abstract syntax tree for FHIRPath expressions
//!
//! This crate defines the immutable expression tree produced by the parser
//! and walked by the evaluator. Nodes are plain data; all evaluation
//! semantics live in the evaluator crate.

mod expression;
mod literal;
mod operator;

pub use expression::*;
pub use literal::*;
pub use operator::*;

/// Boxed expression, used for operands
pub type BoxExpr = Box<ExpressionNode>;
