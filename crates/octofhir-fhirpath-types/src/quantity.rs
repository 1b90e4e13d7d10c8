//! Quantity values
//!
//! A quantity pairs an exact decimal value with a unit: either a UCUM code
//! or a calendar duration keyword. Arithmetic requires matching units; the
//! engine does not convert between units.

use crate::DurationUnit;
use octofhir_fhirpath_diagnostics::{FhirPathError, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// An exact decimal value with a unit
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Quantity {
    /// The numeric value
    pub value: Decimal,
    /// UCUM code or calendar duration keyword; `1` for dimensionless
    pub unit: String,
}

impl Quantity {
    /// Create a quantity
    pub fn new(value: Decimal, unit: impl Into<String>) -> Self {
        Self {
            value,
            unit: unit.into(),
        }
    }

    /// Whether the unit is a calendar duration keyword
    pub fn calendar_unit(&self) -> Option<DurationUnit> {
        DurationUnit::parse(&self.unit)
    }

    /// Whether two quantities can be combined arithmetically
    ///
    /// Units match when the strings are equal, or when both are the singular
    /// and plural spelling of the same calendar duration.
    pub fn unit_compatible(&self, other: &Self) -> bool {
        if self.unit == other.unit {
            return true;
        }
        match (self.calendar_unit(), other.calendar_unit()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    /// Add another quantity with a compatible unit
    pub fn add(&self, other: &Self) -> Result<Self> {
        self.combine(other, Decimal::checked_add)
    }

    /// Subtract another quantity with a compatible unit
    pub fn subtract(&self, other: &Self) -> Result<Self> {
        self.combine(other, Decimal::checked_sub)
    }

    fn combine(
        &self,
        other: &Self,
        op: fn(Decimal, Decimal) -> Option<Decimal>,
    ) -> Result<Self> {
        if !self.unit_compatible(other) {
            return Err(FhirPathError::incompatible_units(&self.unit, &other.unit));
        }
        let value = op(self.value, other.value).ok_or_else(|| {
            FhirPathError::invalid_literal("Quantity arithmetic overflowed")
        })?;
        Ok(Self::new(value, self.unit.clone()))
    }

    /// Compare against another quantity; incompatible units are incomparable
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        self.unit_compatible(other)
            .then(|| self.value.cmp(&other.value))
    }

    /// Precision-insensitive equality; incompatible units yield `None`
    pub fn equals(&self, other: &Self) -> Option<bool> {
        self.compare(other).map(|ordering| ordering == Ordering::Equal)
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}'", self.value, self.unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn mg(value: i64) -> Quantity {
        Quantity::new(Decimal::from(value), "mg")
    }

    #[test]
    fn same_unit_arithmetic_works() {
        assert_eq!(mg(2).add(&mg(3)).unwrap(), mg(5));
        assert_eq!(mg(5).subtract(&mg(3)).unwrap(), mg(2));
    }

    #[test]
    fn mismatched_units_are_an_error() {
        let err = mg(2).add(&Quantity::new(Decimal::ONE, "mL")).unwrap_err();
        assert!(err.to_string().contains("Incompatible units"));
    }

    #[test]
    fn singular_and_plural_calendar_units_match() {
        let one_day = Quantity::new(Decimal::ONE, "day");
        let two_days = Quantity::new(Decimal::from(2), "days");
        assert_eq!(one_day.add(&two_days).unwrap().value, Decimal::from(3));
    }

    #[test]
    fn incompatible_units_are_incomparable() {
        assert_eq!(mg(1).compare(&Quantity::new(Decimal::ONE, "mL")), None);
        assert_eq!(mg(1).equals(&Quantity::new(Decimal::ONE, "mL")), None);
    }
}
