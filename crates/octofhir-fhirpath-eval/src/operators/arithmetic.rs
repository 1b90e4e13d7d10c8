//! Arithmetic operators
//!
//! Singleton numeric or quantity operands; temporal plus calendar quantity
//! shifts the temporal. Division by zero and non-numeric operands yield
//! empty; mismatched operand kinds with both sides present are an error.

use crate::{Collection, Evaluator, Scope};
use octofhir_fhirpath_ast::{BinaryOp, BinaryOpExpr, PolarityExpr, PolarityOp};
use octofhir_fhirpath_diagnostics::{FhirPathError, Result};
use octofhir_fhirpath_model::FhirPathNode;
use octofhir_fhirpath_types::{DurationUnit, Quantity, SystemValue};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

impl Evaluator<'_> {
    pub(crate) fn eval_polarity(
        &mut self,
        polarity: &PolarityExpr,
        focus: &Collection,
        scope: &Scope,
    ) -> Result<Collection> {
        let nodes = self.evaluate(&polarity.operand, focus, scope)?;
        if !nodes.is_singleton() {
            return Ok(Collection::empty());
        }
        let result = match (polarity.op, nodes.single_operand()) {
            (PolarityOp::Minus, Some(SystemValue::Integer(i))) => {
                Some(SystemValue::Integer(-i))
            }
            (PolarityOp::Minus, Some(SystemValue::Decimal(d))) => {
                Some(SystemValue::Decimal(-d))
            }
            (PolarityOp::Plus, Some(value @ (SystemValue::Integer(_) | SystemValue::Decimal(_)))) => {
                Some(value)
            }
            _ => None,
        };
        Ok(result.map_or_else(Collection::empty, |value| {
            Collection::singleton(FhirPathNode::from_value(value))
        }))
    }

    pub(crate) fn eval_additive(
        &mut self,
        binary: &BinaryOpExpr,
        focus: &Collection,
        scope: &Scope,
    ) -> Result<Collection> {
        let left = self.evaluate(&binary.left, focus, scope)?;
        let right = self.evaluate(&binary.right, focus, scope)?;
        let op = binary.op;
        let lv = left.single_operand();
        let rv = right.single_operand();

        let result = match (&lv, &rv) {
            (Some(l), Some(r)) if l.is_number() && r.is_number() => match op {
                BinaryOp::Add => Some(number_add(l, r)?),
                BinaryOp::Sub => Some(number_sub(l, r)?),
                _ => None,
            },
            (Some(SystemValue::String(l)), Some(SystemValue::String(r))) => match op {
                BinaryOp::Add | BinaryOp::Concat => {
                    Some(SystemValue::String(format!("{l}{r}")))
                }
                _ => {
                    return Err(FhirPathError::invalid_operator_arguments(op.symbol()));
                }
            },
            // concatenation treats an absent operand as the empty string
            (Some(SystemValue::String(l)), None) if op == BinaryOp::Concat && right.is_empty() => {
                Some(SystemValue::String(l.clone()))
            }
            (None, Some(SystemValue::String(r))) if op == BinaryOp::Concat && left.is_empty() => {
                Some(SystemValue::String(r.clone()))
            }
            (None, None) if op == BinaryOp::Concat && left.is_empty() && right.is_empty() => {
                Some(SystemValue::String(String::new()))
            }
            (Some(SystemValue::Quantity(l)), Some(SystemValue::Quantity(r))) => match op {
                BinaryOp::Add => Some(SystemValue::Quantity(l.add(r)?)),
                BinaryOp::Sub => Some(SystemValue::Quantity(l.subtract(r)?)),
                _ => None,
            },
            (Some(l), Some(r)) if is_temporal(l) && matches!(r, SystemValue::Quantity(_))
                || matches!(l, SystemValue::Quantity(_)) && is_temporal(r) =>
            {
                let (temporal, quantity) = if is_temporal(l) {
                    (l, r)
                } else {
                    (r, l)
                };
                let SystemValue::Quantity(quantity) = quantity else {
                    return Ok(Collection::empty());
                };
                let negate = match op {
                    BinaryOp::Add => false,
                    BinaryOp::Sub => true,
                    _ => {
                        return Err(FhirPathError::invalid_operator_arguments(op.symbol()));
                    }
                };
                Some(temporal_shift(temporal, quantity, negate)?)
            }
            _ if !left.is_empty() && !right.is_empty() => {
                return Err(FhirPathError::invalid_operator_arguments(op.symbol()));
            }
            _ => None,
        };
        Ok(result.map_or_else(Collection::empty, |value| {
            Collection::singleton(FhirPathNode::from_value(value))
        }))
    }

    pub(crate) fn eval_multiplicative(
        &mut self,
        binary: &BinaryOpExpr,
        focus: &Collection,
        scope: &Scope,
    ) -> Result<Collection> {
        let left = self.evaluate(&binary.left, focus, scope)?;
        let right = self.evaluate(&binary.right, focus, scope)?;
        let (Some(l), Some(r)) = (left.single_operand(), right.single_operand()) else {
            return Ok(Collection::empty());
        };
        if !l.is_number() || !r.is_number() {
            return Ok(Collection::empty());
        }
        let (Some(ld), Some(rd)) = (l.as_decimal(), r.as_decimal()) else {
            return Ok(Collection::empty());
        };
        let both_integers =
            matches!(l, SystemValue::Integer(_)) && matches!(r, SystemValue::Integer(_));

        let result = match binary.op {
            BinaryOp::Mul => {
                let product = ld.checked_mul(rd).ok_or_else(overflow)?;
                Some(if both_integers {
                    SystemValue::Integer(product.to_i32().ok_or_else(overflow)?)
                } else {
                    SystemValue::Decimal(product)
                })
            }
            // division by zero yields empty, never an error
            BinaryOp::Div => ld.checked_div(rd).map(SystemValue::Decimal),
            BinaryOp::IntDiv => match ld.checked_div(rd) {
                Some(quotient) => Some(SystemValue::Integer(
                    quotient.trunc().to_i32().ok_or_else(overflow)?,
                )),
                None => None,
            },
            BinaryOp::Mod => match ld.checked_rem(rd) {
                Some(remainder) => Some(if both_integers {
                    SystemValue::Integer(remainder.to_i32().ok_or_else(overflow)?)
                } else {
                    SystemValue::Decimal(remainder)
                }),
                None => None,
            },
            _ => None,
        };
        Ok(result.map_or_else(Collection::empty, |value| {
            Collection::singleton(FhirPathNode::from_value(value))
        }))
    }
}

fn overflow() -> FhirPathError {
    FhirPathError::invalid_literal("Arithmetic operation overflowed")
}

fn is_temporal(value: &SystemValue) -> bool {
    matches!(
        value,
        SystemValue::Date(_) | SystemValue::DateTime(_) | SystemValue::Time(_)
    )
}

fn number_add(l: &SystemValue, r: &SystemValue) -> Result<SystemValue> {
    number_op(l, r, Decimal::checked_add)
}

fn number_sub(l: &SystemValue, r: &SystemValue) -> Result<SystemValue> {
    number_op(l, r, Decimal::checked_sub)
}

fn number_op(
    l: &SystemValue,
    r: &SystemValue,
    op: fn(Decimal, Decimal) -> Option<Decimal>,
) -> Result<SystemValue> {
    let (Some(ld), Some(rd)) = (l.as_decimal(), r.as_decimal()) else {
        return Err(FhirPathError::invalid_operator_arguments("+"));
    };
    let value = op(ld, rd).ok_or_else(overflow)?;
    let both_integers =
        matches!(l, SystemValue::Integer(_)) && matches!(r, SystemValue::Integer(_));
    if both_integers {
        Ok(SystemValue::Integer(value.to_i32().ok_or_else(overflow)?))
    } else {
        Ok(SystemValue::Decimal(value))
    }
}

/// Shift a temporal value by a (possibly negated) calendar quantity
fn temporal_shift(
    temporal: &SystemValue,
    quantity: &Quantity,
    negate: bool,
) -> Result<SystemValue> {
    let unit = duration_unit(&quantity.unit).ok_or_else(|| {
        FhirPathError::invalid_literal(format!(
            "Unit '{}' is not a calendar duration",
            quantity.unit
        ))
    })?;
    let mut amount = quantity.value.trunc().to_i64().ok_or_else(overflow)?;
    if negate {
        amount = -amount;
    }
    match temporal {
        SystemValue::Date(d) => Ok(SystemValue::Date(d.add(amount, unit)?)),
        SystemValue::DateTime(dt) => Ok(SystemValue::DateTime(dt.add(amount, unit)?)),
        SystemValue::Time(t) => Ok(SystemValue::Time(t.add(amount, unit)?)),
        _ => Err(FhirPathError::invalid_operator_arguments("+")),
    }
}

/// Calendar keywords plus the UCUM time-valued codes
fn duration_unit(unit: &str) -> Option<DurationUnit> {
    DurationUnit::parse(unit).or(match unit {
        "a" => Some(DurationUnit::Years),
        "mo" => Some(DurationUnit::Months),
        "wk" => Some(DurationUnit::Weeks),
        "d" => Some(DurationUnit::Days),
        "h" => Some(DurationUnit::Hours),
        "min" => Some(DurationUnit::Minutes),
        "s" => Some(DurationUnit::Seconds),
        "ms" => Some(DurationUnit::Milliseconds),
        _ => None,
    })
}
