//! Math functions on singleton numeric inputs
//!
//! Undefined results (square root of a negative, log of zero) yield the
//! empty collection rather than an error.

use crate::{Collection, FunctionRegistry};
use octofhir_fhirpath_diagnostics::{FhirPathError, Result};
use octofhir_fhirpath_model::FhirPathNode;
use octofhir_fhirpath_types::{Quantity, SystemValue};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};

use super::integer_argument;

/// The singleton numeric input of a math function
fn number_input(input: &Collection) -> Result<Option<SystemValue>> {
    if input.is_empty() {
        return Ok(None);
    }
    if input.len() > 1 {
        return Err(FhirPathError::singleton_required());
    }
    match input.single_operand() {
        Some(value) if value.is_number() || matches!(value, SystemValue::Quantity(_)) => {
            Ok(Some(value))
        }
        Some(other) => Err(FhirPathError::input_not_of_type("Number", other.type_name())),
        None => {
            let found = input.first().map_or_else(String::new, |n| n.ty().name.clone());
            Err(FhirPathError::input_not_of_type("Number", &found))
        }
    }
}

fn decimal_result(value: Decimal) -> Collection {
    Collection::singleton(FhirPathNode::decimal(value))
}

fn float_result(value: f64) -> Collection {
    if !value.is_finite() {
        return Collection::empty();
    }
    Decimal::from_f64(value).map_or_else(Collection::empty, decimal_result)
}

fn as_float(value: &SystemValue) -> Option<f64> {
    value.as_decimal().and_then(|d| d.to_f64())
}

pub(super) fn register(registry: &mut FunctionRegistry) {
    registry.register_fn("abs", 0, 0, |_, input, _| {
        let Some(value) = number_input(input)? else {
            return Ok(Collection::empty());
        };
        let result = match value {
            SystemValue::Integer(i) => FhirPathNode::integer(i.abs()),
            SystemValue::Decimal(d) => FhirPathNode::decimal(d.abs()),
            SystemValue::Quantity(q) => {
                FhirPathNode::quantity(Quantity::new(q.value.abs(), q.unit))
            }
            _ => return Ok(Collection::empty()),
        };
        Ok(Collection::singleton(result))
    });
    registry.register_fn("ceiling", 0, 0, |_, input, _| {
        rounded(input, Decimal::ceil)
    });
    registry.register_fn("floor", 0, 0, |_, input, _| rounded(input, Decimal::floor));
    registry.register_fn("truncate", 0, 0, |_, input, _| {
        rounded(input, Decimal::trunc)
    });
    registry.register_fn("round", 0, 1, |_, input, args| {
        let Some(value) = number_input(input)? else {
            return Ok(Collection::empty());
        };
        let Some(decimal) = value.as_decimal() else {
            return Ok(Collection::empty());
        };
        let precision = match args.first() {
            Some(_) => integer_argument(args, 0)?.unwrap_or(0),
            None => 0,
        };
        let precision = u32::try_from(precision).unwrap_or(0);
        Ok(decimal_result(decimal.round_dp_with_strategy(
            precision,
            RoundingStrategy::MidpointAwayFromZero,
        )))
    });
    registry.register_fn("sqrt", 0, 0, |_, input, _| float_fn(input, f64::sqrt));
    registry.register_fn("exp", 0, 0, |_, input, _| float_fn(input, f64::exp));
    registry.register_fn("ln", 0, 0, |_, input, _| float_fn(input, f64::ln));
    registry.register_fn("log", 1, 1, |_, input, args| {
        let Some(value) = number_input(input)? else {
            return Ok(Collection::empty());
        };
        let base = match args[0].single_operand() {
            Some(base) => base,
            None => return Ok(Collection::empty()),
        };
        let (Some(v), Some(b)) = (as_float(&value), as_float(&base)) else {
            return Ok(Collection::empty());
        };
        Ok(float_result(v.log(b)))
    });
    registry.register_fn("power", 1, 1, |_, input, args| {
        let Some(value) = number_input(input)? else {
            return Ok(Collection::empty());
        };
        let exponent = match args[0].single_operand() {
            Some(exponent) => exponent,
            None => return Ok(Collection::empty()),
        };
        let (Some(v), Some(e)) = (as_float(&value), as_float(&exponent)) else {
            return Ok(Collection::empty());
        };
        let result = v.powf(e);
        if !result.is_finite() {
            return Ok(Collection::empty());
        }
        let both_integers = matches!(value, SystemValue::Integer(_))
            && matches!(exponent, SystemValue::Integer(_));
        if both_integers && result.fract() == 0.0 && result.abs() <= f64::from(i32::MAX) {
            return Ok(Collection::singleton(FhirPathNode::integer(result as i32)));
        }
        Ok(float_result(result))
    });
}

fn rounded(input: &Collection, op: fn(&Decimal) -> Decimal) -> Result<Collection> {
    let Some(value) = number_input(input)? else {
        return Ok(Collection::empty());
    };
    let Some(decimal) = value.as_decimal() else {
        return Ok(Collection::empty());
    };
    let result = op(&decimal)
        .to_i32()
        .map(FhirPathNode::integer)
        .map_or_else(Collection::empty, Collection::singleton);
    Ok(result)
}

fn float_fn(input: &Collection, op: fn(f64) -> f64) -> Result<Collection> {
    let Some(value) = number_input(input)? else {
        return Ok(Collection::empty());
    };
    let Some(v) = as_float(&value) else {
        return Ok(Collection::empty());
    };
    Ok(float_result(op(v)))
}
