//! Binary and unary operator evaluation
//!
//! Split by category: arithmetic (additive, multiplicative, polarity),
//! comparison (equality, ordering, membership) and logic (three-valued
//! `and`/`or`/`xor`/`implies`).

mod arithmetic;
mod comparison;
mod logical;

use crate::{Collection, Evaluator, Scope};
use octofhir_fhirpath_ast::{BinaryOp, BinaryOpExpr};
use octofhir_fhirpath_diagnostics::Result;

impl Evaluator<'_> {
    pub(crate) fn eval_binary(
        &mut self,
        binary: &BinaryOpExpr,
        focus: &Collection,
        scope: &Scope,
    ) -> Result<Collection> {
        match binary.op {
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Concat => {
                self.eval_additive(binary, focus, scope)
            }
            BinaryOp::Mul | BinaryOp::Div | BinaryOp::IntDiv | BinaryOp::Mod => {
                self.eval_multiplicative(binary, focus, scope)
            }
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Equivalent | BinaryOp::NotEquivalent => {
                self.eval_equality(binary, focus, scope)
            }
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
                self.eval_comparison(binary, focus, scope)
            }
            BinaryOp::In | BinaryOp::Contains => self.eval_membership(binary, focus, scope),
            BinaryOp::And | BinaryOp::Or | BinaryOp::Xor | BinaryOp::Implies => {
                self.eval_logical(binary, focus, scope)
            }
        }
    }
}
