//! Built-in function implementations
//!
//! Functions receive the (already evaluated) input collection and argument
//! collections. Lambda-style functions are not here; the evaluator
//! implements them inline because their arguments re-evaluate per item.

mod collection;
mod conversion;
mod datetime;
mod fhir;
mod math;
mod string;
mod terminology;

use crate::{Collection, FunctionRegistry};
use octofhir_fhirpath_diagnostics::{FhirPathError, Result};
use octofhir_fhirpath_types::SystemValue;

pub(crate) fn register_all(registry: &mut FunctionRegistry) {
    collection::register(registry);
    conversion::register(registry);
    datetime::register(registry);
    fhir::register(registry);
    math::register(registry);
    string::register(registry);
    terminology::register(registry);
}

/// The singleton string input of a string function
///
/// Empty input is `None` (the function result is empty); multiple items and
/// non-string items are contract violations with stable messages.
pub(crate) fn string_input(input: &Collection) -> Result<Option<String>> {
    if input.is_empty() {
        return Ok(None);
    }
    if input.len() > 1 {
        return Err(FhirPathError::singleton_required());
    }
    let node = input.first().ok_or_else(FhirPathError::singleton_required)?;
    match node.value() {
        Some(SystemValue::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(FhirPathError::input_not_of_type("String", other.type_name())),
        None => Err(FhirPathError::input_not_of_type("String", &node.ty().name)),
    }
}

/// The singleton string argument at a position
///
/// An empty argument collection makes the function result empty (`None`).
pub(crate) fn string_argument(args: &[Collection], position: usize) -> Result<Option<String>> {
    let arg = &args[position];
    if arg.is_empty() {
        return Ok(None);
    }
    let node = arg.exactly_one()?;
    match node.value() {
        Some(SystemValue::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(FhirPathError::argument_not_of_type("String", other.type_name())),
        None => Err(FhirPathError::argument_not_of_type("String", &node.ty().name)),
    }
}

/// The singleton integer argument at a position
pub(crate) fn integer_argument(args: &[Collection], position: usize) -> Result<Option<i32>> {
    let arg = &args[position];
    if arg.is_empty() {
        return Ok(None);
    }
    let node = arg.exactly_one()?;
    match node.value() {
        Some(SystemValue::Integer(i)) => Ok(Some(*i)),
        Some(other) => Err(FhirPathError::argument_not_of_type(
            "Integer",
            other.type_name(),
        )),
        None => Err(FhirPathError::argument_not_of_type("Integer", &node.ty().name)),
    }
}
