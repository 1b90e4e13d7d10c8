//! Equality, ordering and membership operators
//!
//! `=`/`!=` propagate empty operands and incomparable pairs as empty;
//! `~`/`!~` are total. Ordering requires singleton, type-compatible
//! operands and yields empty when the values are incomparable (partial
//! temporal precision, mismatched quantity units).

use crate::{Collection, Evaluator, Scope};
use octofhir_fhirpath_ast::{BinaryOp, BinaryOpExpr};
use octofhir_fhirpath_diagnostics::{FhirPathError, Result};
use octofhir_fhirpath_model::FhirPathNode;
use std::cmp::Ordering;

impl Evaluator<'_> {
    pub(crate) fn eval_equality(
        &mut self,
        binary: &BinaryOpExpr,
        focus: &Collection,
        scope: &Scope,
    ) -> Result<Collection> {
        let left = self.evaluate(&binary.left, focus, scope)?;
        let right = self.evaluate(&binary.right, focus, scope)?;
        match binary.op {
            BinaryOp::Eq | BinaryOp::Ne => {
                if left.is_empty() || right.is_empty() {
                    return Ok(Collection::empty());
                }
                let Some(equal) = collections_equal(&left, &right) else {
                    return Ok(Collection::empty());
                };
                let negate = binary.op == BinaryOp::Ne;
                Ok(Collection::boolean(equal != negate))
            }
            _ => {
                // equivalence is total: empty ~ empty is true, never empty
                let equivalent = collections_equivalent(&left, &right);
                let negate = binary.op == BinaryOp::NotEquivalent;
                Ok(Collection::boolean(equivalent != negate))
            }
        }
    }

    pub(crate) fn eval_comparison(
        &mut self,
        binary: &BinaryOpExpr,
        focus: &Collection,
        scope: &Scope,
    ) -> Result<Collection> {
        let left = self.evaluate(&binary.left, focus, scope)?;
        let right = self.evaluate(&binary.right, focus, scope)?;
        if left.is_empty() || right.is_empty() {
            return Ok(Collection::empty());
        }
        let left_node = left.exactly_one()?;
        let right_node = right.exactly_one()?;
        let (Some(lv), Some(rv)) = (
            Collection::node_value(left_node),
            Collection::node_value(right_node),
        ) else {
            return Ok(Collection::empty());
        };
        if !lv.is_type_compatible(&rv) {
            return Err(FhirPathError::type_not_compatible(
                lv.type_name(),
                rv.type_name(),
            ));
        }
        let Some(ordering) = lv.compare(&rv) else {
            return Ok(Collection::empty());
        };
        let result = match binary.op {
            BinaryOp::Lt => ordering == Ordering::Less,
            BinaryOp::Le => ordering != Ordering::Greater,
            BinaryOp::Gt => ordering == Ordering::Greater,
            BinaryOp::Ge => ordering != Ordering::Less,
            _ => false,
        };
        Ok(Collection::boolean(result))
    }

    pub(crate) fn eval_membership(
        &mut self,
        binary: &BinaryOpExpr,
        focus: &Collection,
        scope: &Scope,
    ) -> Result<Collection> {
        let left = self.evaluate(&binary.left, focus, scope)?;
        let right = self.evaluate(&binary.right, focus, scope)?;
        // `a contains b` mirrors `b in a`
        let (needles, haystack) = match binary.op {
            BinaryOp::In => (left, right),
            _ => (right, left),
        };
        if needles.is_empty() {
            return Ok(Collection::empty());
        }
        Ok(Collection::boolean(haystack.contains_all(&needles)))
    }
}

/// Pairwise equality in order; `None` when any pair is incomparable
fn collections_equal(left: &Collection, right: &Collection) -> Option<bool> {
    if left.len() != right.len() {
        return Some(false);
    }
    let mut all_equal = true;
    for (l, r) in left.iter().zip(right.iter()) {
        match node_equals(l, r) {
            None => return None,
            Some(false) => all_equal = false,
            Some(true) => {}
        }
    }
    Some(all_equal)
}

fn collections_equivalent(left: &Collection, right: &Collection) -> bool {
    if left.len() != right.len() {
        return false;
    }
    left.iter()
        .zip(right.iter())
        .all(|(l, r)| node_equivalent(l, r))
}

fn node_equals(left: &FhirPathNode, right: &FhirPathNode) -> Option<bool> {
    match (Collection::node_value(left), Collection::node_value(right)) {
        (Some(lv), Some(rv)) => lv.equals(&rv),
        _ => Some(left == right),
    }
}

fn node_equivalent(left: &FhirPathNode, right: &FhirPathNode) -> bool {
    match (Collection::node_value(left), Collection::node_value(right)) {
        (Some(lv), Some(rv)) => lv.equivalent(&rv),
        _ => left == right,
    }
}
