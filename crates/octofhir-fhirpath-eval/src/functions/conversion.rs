//! The to*/convertsTo* conversion family
//!
//! Conversions follow the FHIRPath conversion tables on the value model; a
//! value that does not convert yields empty, and `convertsTo*` reports
//! whether it would.

use crate::{Collection, EvaluationContext, FunctionRegistry};
use octofhir_fhirpath_diagnostics::{FhirPathError, Result};
use octofhir_fhirpath_model::FhirPathNode;
use octofhir_fhirpath_types::SystemValue;

fn conversion_input(input: &Collection) -> Result<Option<SystemValue>> {
    if input.is_empty() {
        return Ok(None);
    }
    if input.len() > 1 {
        return Err(FhirPathError::singleton_required());
    }
    Ok(input.single_operand())
}

fn convert(
    input: &Collection,
    conversion: impl Fn(&SystemValue) -> Option<SystemValue>,
) -> Result<Collection> {
    let Some(value) = conversion_input(input)? else {
        return Ok(Collection::empty());
    };
    Ok(conversion(&value).map_or_else(Collection::empty, |converted| {
        Collection::singleton(FhirPathNode::from_value(converted))
    }))
}

fn converts(
    input: &Collection,
    conversion: impl Fn(&SystemValue) -> Option<SystemValue>,
) -> Result<Collection> {
    let Some(value) = conversion_input(input)? else {
        return Ok(Collection::empty());
    };
    Ok(Collection::boolean(conversion(&value).is_some()))
}

fn register_pair(
    registry: &mut FunctionRegistry,
    to_name: &'static str,
    converts_name: &'static str,
    conversion: fn(&SystemValue) -> Option<SystemValue>,
) {
    registry.register_fn(
        to_name,
        0,
        0,
        move |_: &mut EvaluationContext, input: &Collection, _: &[Collection]| {
            convert(input, conversion)
        },
    );
    registry.register_fn(
        converts_name,
        0,
        0,
        move |_: &mut EvaluationContext, input: &Collection, _: &[Collection]| {
            converts(input, conversion)
        },
    );
}

pub(super) fn register(registry: &mut FunctionRegistry) {
    register_pair(registry, "toBoolean", "convertsToBoolean", |v| {
        v.to_boolean().map(SystemValue::Boolean)
    });
    register_pair(registry, "toInteger", "convertsToInteger", |v| {
        v.to_integer().map(SystemValue::Integer)
    });
    register_pair(registry, "toDecimal", "convertsToDecimal", |v| {
        v.to_decimal().map(SystemValue::Decimal)
    });
    register_pair(registry, "toString", "convertsToString", |v| {
        Some(SystemValue::String(v.to_string()))
    });
    register_pair(registry, "toDate", "convertsToDate", |v| {
        v.to_date().map(SystemValue::Date)
    });
    register_pair(registry, "toDateTime", "convertsToDateTime", |v| {
        v.to_datetime().map(SystemValue::DateTime)
    });
    register_pair(registry, "toTime", "convertsToTime", |v| {
        v.to_time().map(SystemValue::Time)
    });
    register_pair(registry, "toQuantity", "convertsToQuantity", |v| {
        v.to_quantity().map(SystemValue::Quantity)
    });
}
