//! Runtime system values produced by evaluation
//!
//! Every value is immutable. Equality and ordering follow FHIRPath rules:
//! `equals`/`compare` return `Option` where `None` means the operands are
//! incomparable and the expression result is the empty collection, not
//! `false`.

use crate::{Date, DateTime, FhirPathType, Quantity, Time};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// A FHIRPath system value
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum SystemValue {
    /// Boolean value
    Boolean(bool),
    /// Unicode string
    String(String),
    /// 32-bit signed integer
    Integer(i32),
    /// Exact decimal
    Decimal(Decimal),
    /// Date with partial precision
    Date(Date),
    /// DateTime with partial precision and optional offset
    DateTime(DateTime),
    /// Time of day with partial precision
    Time(Time),
    /// Decimal with a unit
    Quantity(Quantity),
}

impl SystemValue {
    /// The system type of this value
    pub fn type_of(&self) -> FhirPathType {
        FhirPathType::system(self.type_name())
    }

    /// The unqualified system type name
    pub fn type_name(&self) -> &'static str {
        match self {
            SystemValue::Boolean(_) => "Boolean",
            SystemValue::String(_) => "String",
            SystemValue::Integer(_) => "Integer",
            SystemValue::Decimal(_) => "Decimal",
            SystemValue::Date(_) => "Date",
            SystemValue::DateTime(_) => "DateTime",
            SystemValue::Time(_) => "Time",
            SystemValue::Quantity(_) => "Quantity",
        }
    }

    /// Whether this is an Integer or Decimal
    pub fn is_number(&self) -> bool {
        matches!(self, SystemValue::Integer(_) | SystemValue::Decimal(_))
    }

    /// Numeric view of Integer and Decimal values
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            SystemValue::Integer(i) => Some(Decimal::from(*i)),
            SystemValue::Decimal(d) => Some(*d),
            _ => None,
        }
    }

    /// Boolean view
    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            SystemValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// String view
    pub fn as_string(&self) -> Option<&str> {
        match self {
            SystemValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Integer view
    pub fn as_integer(&self) -> Option<i32> {
        match self {
            SystemValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Whether two values may be compared or equated at all
    ///
    /// Incompatible types in an equality or comparison are a type error, not
    /// an empty result.
    pub fn is_type_compatible(&self, other: &Self) -> bool {
        use SystemValue::{Boolean, Date, DateTime, Decimal, Integer, Quantity, String, Time};
        matches!(
            (self, other),
            (Boolean(_), Boolean(_))
                | (String(_), String(_))
                | (Integer(_) | Decimal(_), Integer(_) | Decimal(_))
                | (Quantity(_), Quantity(_))
                | (Date(_) | DateTime(_), Date(_) | DateTime(_))
                | (Time(_), Time(_))
        )
    }

    /// FHIRPath equality (`=`); `None` propagates as empty
    pub fn equals(&self, other: &Self) -> Option<bool> {
        match (self, other) {
            (SystemValue::Boolean(a), SystemValue::Boolean(b)) => Some(a == b),
            (SystemValue::String(a), SystemValue::String(b)) => Some(a == b),
            (SystemValue::Quantity(a), SystemValue::Quantity(b)) => a.equals(b),
            _ if self.is_number() && other.is_number() => {
                Some(self.as_decimal() == other.as_decimal())
            }
            _ => self
                .compare_temporal(other)
                .map(|ordering| ordering.map(|o| o == Ordering::Equal))?,
        }
    }

    /// FHIRPath ordering; `None` means incomparable
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (SystemValue::String(a), SystemValue::String(b)) => Some(a.cmp(b)),
            (SystemValue::Quantity(a), SystemValue::Quantity(b)) => a.compare(b),
            _ if self.is_number() && other.is_number() => {
                Some(self.as_decimal()?.cmp(&other.as_decimal()?))
            }
            _ => self.compare_temporal(other)?,
        }
    }

    /// Temporal comparison across Date/DateTime/Time; outer `None` means the
    /// operands were not temporal at all
    fn compare_temporal(&self, other: &Self) -> Option<Option<Ordering>> {
        match (self, other) {
            (SystemValue::Date(a), SystemValue::Date(b)) => Some(a.compare(b)),
            (SystemValue::Time(a), SystemValue::Time(b)) => Some(a.compare(b)),
            (SystemValue::DateTime(a), SystemValue::DateTime(b)) => Some(a.compare(b)),
            (SystemValue::Date(a), SystemValue::DateTime(b)) => {
                Some(DateTime::new(*a, None, None).compare(b))
            }
            (SystemValue::DateTime(a), SystemValue::Date(b)) => {
                Some(a.compare(&DateTime::new(*b, None, None)))
            }
            _ => None,
        }
    }

    /// FHIRPath equivalence (`~`): total, case- and whitespace-insensitive
    /// for strings, incomparable pairs are simply not equivalent
    pub fn equivalent(&self, other: &Self) -> bool {
        match (self, other) {
            (SystemValue::String(a), SystemValue::String(b)) => {
                normalize_for_equivalence(a) == normalize_for_equivalence(b)
            }
            _ => self.equals(other).unwrap_or(false),
        }
    }

    // === Conversions (the to*/convertsTo* function family) ===

    /// Convert to Boolean per the FHIRPath conversion table
    pub fn to_boolean(&self) -> Option<bool> {
        match self {
            SystemValue::Boolean(b) => Some(*b),
            SystemValue::Integer(1) => Some(true),
            SystemValue::Integer(0) => Some(false),
            SystemValue::Decimal(d) if *d == Decimal::ONE => Some(true),
            SystemValue::Decimal(d) if *d == Decimal::ZERO => Some(false),
            SystemValue::String(s) => match s.to_ascii_lowercase().as_str() {
                "true" | "t" | "yes" | "y" | "1" | "1.0" => Some(true),
                "false" | "f" | "no" | "n" | "0" | "0.0" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// Convert to Integer
    pub fn to_integer(&self) -> Option<i32> {
        match self {
            SystemValue::Integer(i) => Some(*i),
            SystemValue::Boolean(b) => Some(i32::from(*b)),
            SystemValue::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Convert to Decimal
    pub fn to_decimal(&self) -> Option<Decimal> {
        match self {
            SystemValue::Integer(i) => Some(Decimal::from(*i)),
            SystemValue::Decimal(d) => Some(*d),
            SystemValue::Boolean(b) => Some(Decimal::from(u8::from(*b))),
            SystemValue::String(s) => Decimal::from_str(s).ok(),
            _ => None,
        }
    }

    /// Convert to Date
    pub fn to_date(&self) -> Option<Date> {
        match self {
            SystemValue::Date(d) => Some(*d),
            SystemValue::DateTime(dt) => Some(dt.date),
            SystemValue::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Convert to DateTime
    pub fn to_datetime(&self) -> Option<DateTime> {
        match self {
            SystemValue::DateTime(dt) => Some(*dt),
            SystemValue::Date(d) => Some(DateTime::new(*d, None, None)),
            SystemValue::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Convert to Time
    pub fn to_time(&self) -> Option<Time> {
        match self {
            SystemValue::Time(t) => Some(*t),
            SystemValue::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Convert to Quantity; bare numbers become dimensionless
    pub fn to_quantity(&self) -> Option<Quantity> {
        match self {
            SystemValue::Quantity(q) => Some(q.clone()),
            SystemValue::Integer(i) => Some(Quantity::new(Decimal::from(*i), "1")),
            SystemValue::Decimal(d) => Some(Quantity::new(*d, "1")),
            SystemValue::Boolean(b) => {
                Some(Quantity::new(Decimal::from(u8::from(*b)), "1"))
            }
            SystemValue::String(s) => parse_quantity_text(s),
            _ => None,
        }
    }
}

fn normalize_for_equivalence(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn parse_quantity_text(text: &str) -> Option<Quantity> {
    let text = text.trim();
    let split = text.find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-'))?;
    let value = Decimal::from_str(text[..split].trim()).ok()?;
    let unit = text[split..].trim();
    let unit = unit
        .strip_prefix('\'')
        .and_then(|u| u.strip_suffix('\''))
        .unwrap_or(unit);
    if unit.is_empty() {
        return None;
    }
    Some(Quantity::new(value, unit))
}

impl fmt::Display for SystemValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SystemValue::Boolean(b) => write!(f, "{b}"),
            SystemValue::String(s) => f.write_str(s),
            SystemValue::Integer(i) => write!(f, "{i}"),
            SystemValue::Decimal(d) => write!(f, "{d}"),
            SystemValue::Date(d) => write!(f, "{d}"),
            SystemValue::DateTime(dt) => write!(f, "{dt}"),
            SystemValue::Time(t) => write!(f, "{t}"),
            SystemValue::Quantity(q) => write!(f, "{q}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn integer_and_decimal_compare_numerically() {
        let two = SystemValue::Integer(2);
        let two_decimal = SystemValue::Decimal(Decimal::from(2));
        assert_eq!(two.equals(&two_decimal), Some(true));
        assert_eq!(
            SystemValue::Integer(1).compare(&two_decimal),
            Some(Ordering::Less)
        );
    }

    #[test]
    fn incompatible_types_are_flagged() {
        let one = SystemValue::Integer(1);
        let text = SystemValue::String("1".to_string());
        assert!(!one.is_type_compatible(&text));
        assert!(one.is_type_compatible(&SystemValue::Decimal(Decimal::ONE)));
    }

    #[test]
    fn date_compares_against_datetime() {
        let date = SystemValue::Date(Date::new(2020, 1, 1));
        let later = SystemValue::DateTime("2021-06-01T00:00:00".parse().unwrap());
        assert_eq!(date.compare(&later), Some(Ordering::Less));
    }

    #[test]
    fn string_equivalence_ignores_case_and_whitespace_runs() {
        let a = SystemValue::String("Hello   World".to_string());
        let b = SystemValue::String("hello world".to_string());
        assert!(a.equivalent(&b));
        assert_eq!(a.equals(&b), Some(false));
    }

    #[test]
    fn boolean_ordering_is_incomparable() {
        let t = SystemValue::Boolean(true);
        assert_eq!(t.compare(&SystemValue::Boolean(false)), None);
    }

    #[test]
    fn string_conversions_follow_the_table() {
        assert_eq!(SystemValue::String("T".into()).to_boolean(), Some(true));
        assert_eq!(SystemValue::String("nope".into()).to_boolean(), None);
        assert_eq!(SystemValue::String("42".into()).to_integer(), Some(42));
        assert_eq!(
            SystemValue::String("5.5 'mg'".into()).to_quantity(),
            Some(Quantity::new("5.5".parse().unwrap(), "mg"))
        );
        assert_eq!(
            SystemValue::String("3 days".into()).to_quantity(),
            Some(Quantity::new(Decimal::from(3), "days"))
        );
    }

    #[test]
    fn display_round_trips_scalars() {
        assert_eq!(SystemValue::Integer(42).to_string(), "42");
        assert_eq!(SystemValue::Boolean(true).to_string(), "true");
        assert_eq!(
            SystemValue::Date(Date::new(2020, 3, 4)).to_string(),
            "2020-03-04"
        );
    }
}
