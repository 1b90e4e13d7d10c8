//! Temporal arithmetic functions

use crate::{Collection, FunctionRegistry};
use octofhir_fhirpath_diagnostics::{FP0102, FhirPathError, Result};
use octofhir_fhirpath_model::FhirPathNode;
use octofhir_fhirpath_types::{
    DurationUnit, SystemValue, date_duration_between, datetime_duration_between,
    time_duration_between,
};

use super::string_argument;

pub(super) fn register(registry: &mut FunctionRegistry) {
    registry.register_fn("between", 3, 3, |_, _, args| between(args));
}

/// Signed, whole-unit duration from the first operand to the second;
/// reversing the operands negates the sign
fn between(args: &[Collection]) -> Result<Collection> {
    let start = temporal_operand(&args[0], "between")?;
    let end = temporal_operand(&args[1], "between")?;
    let Some(unit) = string_argument(args, 2)? else {
        return Ok(Collection::empty());
    };
    let unit = DurationUnit::parse(&unit).ok_or_else(|| {
        FhirPathError::evaluation(FP0102, format!("Unsupported unit for 'between': '{unit}'"))
    })?;

    let amount = match (&start, &end) {
        (SystemValue::Date(a), SystemValue::Date(b)) => date_duration_between(a, b, unit)?,
        (SystemValue::Time(a), SystemValue::Time(b)) => time_duration_between(a, b, unit)?,
        _ => {
            // date/datetime mixes normalize through the datetime view
            let (Some(a), Some(b)) = (start.to_datetime(), end.to_datetime()) else {
                return Err(FhirPathError::invalid_operator_arguments("between"));
            };
            datetime_duration_between(&a, &b, unit)?
        }
    };
    let amount = i32::try_from(amount).map_err(|_| {
        FhirPathError::evaluation(FP0102, "Duration does not fit in an integer")
    })?;
    Ok(Collection::singleton(FhirPathNode::integer(amount)))
}

fn temporal_operand(arg: &Collection, function: &str) -> Result<SystemValue> {
    let node = arg.exactly_one().map_err(|_| {
        FhirPathError::unexpected_argument_count(arg.len(), function)
    })?;
    match node.value() {
        Some(
            value @ (SystemValue::Date(_) | SystemValue::DateTime(_) | SystemValue::Time(_)),
        ) => Ok(value.clone()),
        Some(other) => Err(FhirPathError::argument_not_of_type(
            "Date, DateTime or Time",
            other.type_name(),
        )),
        None => Err(FhirPathError::argument_not_of_type(
            "Date, DateTime or Time",
            &node.ty().name,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use octofhir_fhirpath_types::Date;
    use pretty_assertions::assert_eq;

    fn date_arg(year: i32, month: u8, day: u8) -> Collection {
        Collection::singleton(FhirPathNode::date(Date::new(year, month, day)))
    }

    fn unit_arg(unit: &str) -> Collection {
        Collection::singleton(FhirPathNode::string(unit))
    }

    #[test]
    fn fifty_years_between_epoch_and_2020() {
        let result = between(&[
            date_arg(1970, 1, 1),
            date_arg(2020, 1, 1),
            unit_arg("years"),
        ])
        .unwrap();
        assert_eq!(result.single_value(), Some(&SystemValue::Integer(50)));
    }

    #[test]
    fn reversed_endpoints_negate_the_sign() {
        let result = between(&[
            date_arg(2020, 1, 1),
            date_arg(1970, 1, 1),
            unit_arg("years"),
        ])
        .unwrap();
        assert_eq!(result.single_value(), Some(&SystemValue::Integer(-50)));
    }

    #[test]
    fn unknown_unit_is_an_error() {
        let err = between(&[
            date_arg(1970, 1, 1),
            date_arg(2020, 1, 1),
            unit_arg("fortnights"),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("Unsupported unit"));
    }
}
