//! Three-valued logic operators
//!
//! Operands are coerced by singleton-collection rules: empty is the third
//! value, a singleton boolean is itself, any other singleton coerces to
//! `true`, and multiple items are an error. Both operands are evaluated
//! before the truth table is consulted; these tables are the contract, not
//! host-language short-circuiting.
//!
//! Truth table for `and`:
//!
//! | A     | B     | A and B |
//! |-------|-------|---------|
//! | true  | true  | true    |
//! | true  | false | false   |
//! | true  | empty | empty   |
//! | false | *     | false   |
//! | empty | true  | empty   |
//! | empty | false | false   |
//! | empty | empty | empty   |

use crate::{Collection, Evaluator, Scope};
use octofhir_fhirpath_ast::{BinaryOp, BinaryOpExpr};
use octofhir_fhirpath_diagnostics::Result;

impl Evaluator<'_> {
    pub(crate) fn eval_logical(
        &mut self,
        binary: &BinaryOpExpr,
        focus: &Collection,
        scope: &Scope,
    ) -> Result<Collection> {
        let left = self.evaluate(&binary.left, focus, scope)?;
        let right = self.evaluate(&binary.right, focus, scope)?;
        let l = left.bool_operand()?;
        let r = right.bool_operand()?;

        let result = match binary.op {
            BinaryOp::And => match (l, r) {
                (Some(false), _) | (_, Some(false)) => Some(false),
                (Some(true), Some(true)) => Some(true),
                _ => None,
            },
            BinaryOp::Or => match (l, r) {
                (Some(true), _) | (_, Some(true)) => Some(true),
                (Some(false), Some(false)) => Some(false),
                _ => None,
            },
            BinaryOp::Xor => match (l, r) {
                (Some(a), Some(b)) => Some(a != b),
                _ => None,
            },
            BinaryOp::Implies => match (l, r) {
                (Some(false), _) => Some(true),
                (Some(true), b) => b,
                (None, Some(true)) => Some(true),
                (None, _) => None,
            },
            _ => None,
        };
        Ok(result.map_or_else(Collection::empty, Collection::boolean))
    }
}
