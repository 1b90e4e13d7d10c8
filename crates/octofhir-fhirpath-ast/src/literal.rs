//! Literal AST nodes for FHIRPath

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A literal value in a FHIRPath expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    /// Empty collection literal (`{}`)
    Null,
    /// Boolean literal (true/false)
    Boolean(bool),
    /// Integer literal (32-bit signed)
    Integer(i32),
    /// Decimal literal (exact precision)
    Decimal(Decimal),
    /// String literal with escapes resolved
    String(String),
    /// Date literal (`@YYYY[-MM[-DD]]`)
    Date(DateLiteral),
    /// DateTime literal (`@YYYY-MM-DDThh:mm:ss.fff±hh:mm`, partial precision)
    DateTime(DateTimeLiteral),
    /// Time literal (`@Thh[:mm[:ss[.fff]]]`)
    Time(TimeLiteral),
    /// Quantity literal (`4.5 'mg'` or `2 weeks`)
    Quantity(QuantityLiteral),
}

/// Date literal components; absent components were not specified
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateLiteral {
    /// Year (required)
    pub year: i32,
    /// Month 1-12 (optional)
    pub month: Option<u8>,
    /// Day 1-31 (optional)
    pub day: Option<u8>,
}

/// Fractional seconds with the number of digits that were written,
/// so `.123` and `.123000` remain distinguishable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FractionLiteral {
    /// Nanoseconds (fraction scaled to 9 digits)
    pub nanos: u32,
    /// Number of digits written in the source (1-9)
    pub digits: u8,
}

/// Time literal components
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeLiteral {
    /// Hour 0-23 (required)
    pub hour: u8,
    /// Minute 0-59 (optional)
    pub minute: Option<u8>,
    /// Second 0-59 (optional)
    pub second: Option<u8>,
    /// Fractional seconds (optional)
    pub fraction: Option<FractionLiteral>,
}

/// DateTime literal: a date, an optional time, and an optional UTC offset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateTimeLiteral {
    /// Date components
    pub date: DateLiteral,
    /// Time components (absent for `@2020-01-01T`)
    pub time: Option<TimeLiteral>,
    /// UTC offset in minutes; `Z` is 0; absent means unzoned
    pub offset_minutes: Option<i16>,
}

/// Quantity literal: a number and a unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuantityLiteral {
    /// Numeric value
    pub value: Decimal,
    /// Unit, either a UCUM code (`'mg'`) or a calendar duration keyword (`weeks`)
    pub unit: String,
}

impl fmt::Display for DateLiteral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}", self.year)?;
        if let Some(month) = self.month {
            write!(f, "-{month:02}")?;
        }
        if let Some(day) = self.day {
            write!(f, "-{day:02}")?;
        }
        Ok(())
    }
}

impl fmt::Display for TimeLiteral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}", self.hour)?;
        if let Some(minute) = self.minute {
            write!(f, ":{minute:02}")?;
        }
        if let Some(second) = self.second {
            write!(f, ":{second:02}")?;
        }
        if let Some(fraction) = self.fraction {
            let digits = fraction.digits as usize;
            let scaled = fraction.nanos / 10u32.pow(9 - u32::from(fraction.digits));
            write!(f, ".{scaled:0digits$}")?;
        }
        Ok(())
    }
}

impl fmt::Display for DateTimeLiteral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}T", self.date)?;
        if let Some(time) = &self.time {
            write!(f, "{time}")?;
        }
        match self.offset_minutes {
            Some(0) => write!(f, "Z"),
            Some(offset) => {
                let sign = if offset < 0 { '-' } else { '+' };
                let abs = offset.unsigned_abs();
                write!(f, "{sign}{:02}:{:02}", abs / 60, abs % 60)
            }
            None => Ok(()),
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Null => f.write_str("{}"),
            Literal::Boolean(b) => write!(f, "{b}"),
            Literal::Integer(i) => write!(f, "{i}"),
            Literal::Decimal(d) => write!(f, "{d}"),
            Literal::String(s) => write!(f, "'{s}'"),
            Literal::Date(d) => write!(f, "@{d}"),
            Literal::DateTime(dt) => write!(f, "@{dt}"),
            Literal::Time(t) => write!(f, "@T{t}"),
            Literal::Quantity(q) => write!(f, "{} '{}'", q.value, q.unit),
        }
    }
}
