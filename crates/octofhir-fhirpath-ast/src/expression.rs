//! Expression AST nodes for FHIRPath
//!
//! One variant per expression form in the grammar: literal terms,
//! invocations (member access and function calls), indexers, polarity,
//! binary operators, type operators, and unions.

use crate::{BinaryOp, BoxExpr, Literal, PolarityOp, TypeOp};
use serde::{Deserialize, Serialize};
use std::fmt;

/// All FHIRPath expression forms
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExpressionNode {
    /// Literal term
    Literal(Literal),
    /// Bare identifier (member access against the current focus, or a type
    /// name inside `is`/`as`/`ofType` arguments)
    Identifier(Identifier),
    /// External constant (`%name`, `%'quoted name'`)
    ExternalConstant(Identifier),
    /// The current item inside a lambda (`$this`)
    This,
    /// The current item's position inside a lambda (`$index`)
    Index,
    /// The running aggregate total (`$total`)
    Total,
    /// Member access or function call on a target (`a.b`, `a.f(x)`)
    Invocation(InvocationExpr),
    /// Bare function call against the current focus (`f(x)`)
    Function(FunctionCall),
    /// Indexer (`a[i]`)
    Indexer(IndexerExpr),
    /// Unary polarity (`-a`, `+a`)
    Polarity(PolarityExpr),
    /// Binary operator
    BinaryOp(BinaryOpExpr),
    /// Type test or cast (`a is X`, `a as X`)
    TypeOp(TypeOpExpr),
    /// Collection union (`a | b`)
    Union(UnionExpr),
}

/// An identifier, with delimiters already stripped
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identifier {
    /// The identifier text
    pub name: String,
}

impl Identifier {
    /// Create an identifier
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// A possibly namespace-qualified type name (`FHIR.Patient`, `System.String`,
/// or unqualified `Quantity`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QualifiedName {
    /// Optional namespace qualifier
    pub namespace: Option<String>,
    /// Type name
    pub name: String,
}

impl QualifiedName {
    /// Create an unqualified name
    pub fn unqualified(name: impl Into<String>) -> Self {
        Self {
            namespace: None,
            name: name.into(),
        }
    }

    /// Create a qualified name
    pub fn qualified(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            name: name.into(),
        }
    }
}

/// Member access or function call on an evaluated target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvocationExpr {
    /// The expression producing the input collection
    pub target: BoxExpr,
    /// What is invoked on each result
    pub invocation: Invocation,
}

/// The member or function applied by an invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Invocation {
    /// Child-element access by name
    Member(Identifier),
    /// Function application
    Function(FunctionCall),
}

/// A function call: name plus unevaluated argument expressions
///
/// Arguments stay unevaluated in the AST because lambda-style functions
/// re-evaluate them once per input item with `$this` rebound.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Function name
    pub name: Identifier,
    /// Argument expressions
    pub args: Vec<ExpressionNode>,
}

/// Indexer expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexerExpr {
    /// The collection expression
    pub target: BoxExpr,
    /// The index expression; must evaluate to a single integer
    pub index: BoxExpr,
}

/// Unary polarity expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolarityExpr {
    /// `+` or `-`
    pub op: PolarityOp,
    /// Operand
    pub operand: BoxExpr,
}

/// Binary operator expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinaryOpExpr {
    /// Operator kind
    pub op: BinaryOp,
    /// Left operand
    pub left: BoxExpr,
    /// Right operand
    pub right: BoxExpr,
}

/// Type test or cast expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeOpExpr {
    /// `is` or `as`
    pub op: TypeOp,
    /// Operand expression
    pub target: BoxExpr,
    /// Type specifier
    pub type_name: QualifiedName,
}

/// Union expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnionExpr {
    /// Left operand
    pub left: BoxExpr,
    /// Right operand
    pub right: BoxExpr,
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{ns}.{}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

impl fmt::Display for FunctionCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{arg}")?;
        }
        f.write_str(")")
    }
}

impl fmt::Display for ExpressionNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpressionNode::Literal(lit) => write!(f, "{lit}"),
            ExpressionNode::Identifier(id) => write!(f, "{id}"),
            ExpressionNode::ExternalConstant(id) => write!(f, "%{id}"),
            ExpressionNode::This => f.write_str("$this"),
            ExpressionNode::Index => f.write_str("$index"),
            ExpressionNode::Total => f.write_str("$total"),
            ExpressionNode::Invocation(inv) => match &inv.invocation {
                Invocation::Member(id) => write!(f, "{}.{id}", inv.target),
                Invocation::Function(call) => write!(f, "{}.{call}", inv.target),
            },
            ExpressionNode::Function(call) => write!(f, "{call}"),
            ExpressionNode::Indexer(ix) => write!(f, "{}[{}]", ix.target, ix.index),
            ExpressionNode::Polarity(p) => write!(f, "{}{}", p.op, p.operand),
            ExpressionNode::BinaryOp(b) => write!(f, "({} {} {})", b.left, b.op, b.right),
            ExpressionNode::TypeOp(t) => write!(f, "({} {} {})", t.target, t.op, t.type_name),
            ExpressionNode::Union(u) => write!(f, "({} | {})", u.left, u.right),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn display_renders_invocation_chains() {
        let expr = ExpressionNode::Invocation(InvocationExpr {
            target: Box::new(ExpressionNode::Identifier(Identifier::new("Patient"))),
            invocation: Invocation::Member(Identifier::new("name")),
        });
        assert_eq!(expr.to_string(), "Patient.name");
    }

    #[test]
    fn display_parenthesizes_operators() {
        let expr = ExpressionNode::BinaryOp(BinaryOpExpr {
            op: BinaryOp::Add,
            left: Box::new(ExpressionNode::Literal(Literal::Integer(1))),
            right: Box::new(ExpressionNode::Literal(Literal::Integer(2))),
        });
        assert_eq!(expr.to_string(), "(1 + 2)");
    }
}
