//! Partial-precision temporal values
//!
//! FHIRPath dates, times and datetimes record which components were
//! explicitly specified. Comparison walks components in precision order and
//! yields `None` (incomparable, propagated as an empty collection) when one
//! side runs out of specified components before an ordering is established,
//! or when exactly one side carries a UTC offset.

use chrono::{Datelike, Timelike};
use octofhir_fhirpath_diagnostics::{FhirPathError, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Which temporal components were explicitly specified
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TemporalPrecision {
    Year,
    Month,
    Day,
    Hour,
    Minute,
    Second,
}

/// Duration units accepted by `between` and temporal arithmetic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DurationUnit {
    Years,
    Months,
    Weeks,
    Days,
    Hours,
    Minutes,
    Seconds,
    Milliseconds,
}

impl DurationUnit {
    /// Parse a unit name, singular or plural
    pub fn parse(text: &str) -> Option<Self> {
        match text {
            "year" | "years" => Some(Self::Years),
            "month" | "months" => Some(Self::Months),
            "week" | "weeks" => Some(Self::Weeks),
            "day" | "days" => Some(Self::Days),
            "hour" | "hours" => Some(Self::Hours),
            "minute" | "minutes" => Some(Self::Minutes),
            "second" | "seconds" => Some(Self::Seconds),
            "millisecond" | "milliseconds" => Some(Self::Milliseconds),
            _ => None,
        }
    }
}

/// Fractional seconds, tracking how many digits were written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fraction {
    /// Nanoseconds, the fraction scaled to 9 digits
    pub nanos: u32,
    /// Digits written in the source (1-9)
    pub digits: u8,
}

/// A date with partial precision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Date {
    pub year: i32,
    pub month: Option<u8>,
    pub day: Option<u8>,
}

/// A time of day with partial precision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Time {
    pub hour: u8,
    pub minute: Option<u8>,
    pub second: Option<u8>,
    pub fraction: Option<Fraction>,
}

/// A datetime: date, optional time, optional UTC offset in minutes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateTime {
    pub date: Date,
    pub time: Option<Time>,
    pub offset_minutes: Option<i16>,
}

impl Date {
    /// A year-precision date
    pub fn year(year: i32) -> Self {
        Self {
            year,
            month: None,
            day: None,
        }
    }

    /// A month-precision date
    pub fn year_month(year: i32, month: u8) -> Self {
        Self {
            year,
            month: Some(month),
            day: None,
        }
    }

    /// A full date
    pub fn new(year: i32, month: u8, day: u8) -> Self {
        Self {
            year,
            month: Some(month),
            day: Some(day),
        }
    }

    /// Today's date in the local timezone
    pub fn today() -> Self {
        let now = chrono::Local::now();
        Self::new(now.year(), now.month() as u8, now.day() as u8)
    }

    /// The precision of the specified components
    pub fn precision(&self) -> TemporalPrecision {
        if self.day.is_some() {
            TemporalPrecision::Day
        } else if self.month.is_some() {
            TemporalPrecision::Month
        } else {
            TemporalPrecision::Year
        }
    }

    /// Compare per FHIRPath precision rules
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        compare_components(&[
            (Some(i64::from(self.year)), Some(i64::from(other.year))),
            (opt(self.month), opt(other.month)),
            (opt(self.day), opt(other.day)),
        ])
    }

    fn validate(&self) -> bool {
        match (self.month, self.day) {
            (None, None) => true,
            (Some(m), None) => (1..=12).contains(&m),
            (Some(m), Some(d)) => {
                (1..=12).contains(&m) && d >= 1 && d <= days_in_month(self.year, m)
            }
            (None, Some(_)) => false,
        }
    }

    /// Add a signed calendar quantity, clamping day-of-month overflow
    pub fn add(&self, amount: i64, unit: DurationUnit) -> Result<Self> {
        match unit {
            DurationUnit::Years => Ok(self.plus_months(amount * 12)),
            DurationUnit::Months => Ok(self.plus_months(amount)),
            DurationUnit::Weeks => self.plus_days(amount * 7),
            DurationUnit::Days => self.plus_days(amount),
            _ => Err(FhirPathError::invalid_literal(format!(
                "Cannot add a '{unit:?}' duration to a date value"
            ))),
        }
    }

    fn plus_months(&self, amount: i64) -> Self {
        let month = i64::from(self.month.unwrap_or(1));
        let total = i64::from(self.year) * 12 + (month - 1) + amount;
        let year = total.div_euclid(12) as i32;
        let new_month = (total.rem_euclid(12) + 1) as u8;
        let day = self
            .day
            .map(|d| d.min(days_in_month(year, new_month)));
        Self {
            year,
            month: self.month.map(|_| new_month),
            day,
        }
    }

    fn plus_days(&self, amount: i64) -> Result<Self> {
        let (Some(month), Some(day)) = (self.month, self.day) else {
            return Err(FhirPathError::invalid_literal(
                "Cannot add a day-level duration to a partial date",
            ));
        };
        let days = days_from_civil(i64::from(self.year), i64::from(month), i64::from(day));
        let (year, month, day) = civil_from_days(days + amount);
        Ok(Self::new(year as i32, month, day))
    }

    fn epoch_days(&self) -> i64 {
        days_from_civil(
            i64::from(self.year),
            i64::from(self.month.unwrap_or(1)),
            i64::from(self.day.unwrap_or(1)),
        )
    }
}

impl Time {
    /// A full time without fractional seconds
    pub fn new(hour: u8, minute: u8, second: u8) -> Self {
        Self {
            hour,
            minute: Some(minute),
            second: Some(second),
            fraction: None,
        }
    }

    /// The current local time of day
    pub fn time_of_day() -> Self {
        let now = chrono::Local::now();
        Self::new(now.hour() as u8, now.minute() as u8, now.second() as u8)
    }

    /// The precision of the specified components
    pub fn precision(&self) -> TemporalPrecision {
        if self.second.is_some() {
            TemporalPrecision::Second
        } else if self.minute.is_some() {
            TemporalPrecision::Minute
        } else {
            TemporalPrecision::Hour
        }
    }

    /// Compare per FHIRPath precision rules, truncating excess fraction digits
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        let components = compare_components(&[
            (Some(i64::from(self.hour)), Some(i64::from(other.hour))),
            (opt(self.minute), opt(other.minute)),
            (opt(self.second), opt(other.second)),
        ])?;
        if components != Ordering::Equal {
            return Some(components);
        }
        // both specified seconds if we got here with fractions present
        if self.second.is_some() && other.second.is_some() {
            return Some(compare_fractions(self.fraction, other.fraction));
        }
        Some(Ordering::Equal)
    }

    fn validate(&self) -> bool {
        if self.hour > 23 {
            return false;
        }
        if self.minute.is_none() && self.second.is_some() {
            return false;
        }
        self.minute.is_none_or(|m| m <= 59)
            && self.second.is_none_or(|s| s <= 59)
            && self.fraction.is_none_or(|f| f.digits >= 1 && f.digits <= 9)
    }

    fn seconds_of_day(&self) -> i64 {
        i64::from(self.hour) * 3600
            + i64::from(self.minute.unwrap_or(0)) * 60
            + i64::from(self.second.unwrap_or(0))
    }

    fn nanos(&self) -> i64 {
        i64::from(self.fraction.map_or(0, |f| f.nanos))
    }

    /// Add a signed time-valued quantity, wrapping around midnight
    pub fn add(&self, amount: i64, unit: DurationUnit) -> Result<Self> {
        let millis = match unit {
            DurationUnit::Hours => amount * 3_600_000,
            DurationUnit::Minutes => amount * 60_000,
            DurationUnit::Seconds => amount * 1000,
            DurationUnit::Milliseconds => amount,
            _ => {
                return Err(FhirPathError::invalid_literal(format!(
                    "Cannot add a '{unit:?}' duration to a time value"
                )));
            }
        };
        let total = (self.seconds_of_day() * 1000 + self.nanos() / 1_000_000 + millis)
            .rem_euclid(86_400_000);
        let nanos = ((total % 1000) * 1_000_000) as u32;
        let seconds = total / 1000;
        Ok(Self {
            hour: (seconds / 3600) as u8,
            minute: self.minute.map(|_| ((seconds / 60) % 60) as u8),
            second: self.second.map(|_| (seconds % 60) as u8),
            fraction: if nanos > 0 || self.fraction.is_some() {
                Some(Fraction { nanos, digits: 3 })
            } else {
                None
            },
        })
    }
}

impl DateTime {
    /// A datetime from parts
    pub fn new(date: Date, time: Option<Time>, offset_minutes: Option<i16>) -> Self {
        Self {
            date,
            time,
            offset_minutes,
        }
    }

    /// The current instant in the local timezone
    pub fn now() -> Self {
        let now = chrono::Local::now();
        let offset = now.offset().local_minus_utc() / 60;
        let fraction = Fraction {
            nanos: now.nanosecond().min(999_999_999),
            digits: 3,
        };
        Self {
            date: Date::new(now.year(), now.month() as u8, now.day() as u8),
            time: Some(Time {
                hour: now.hour() as u8,
                minute: Some(now.minute() as u8),
                second: Some(now.second() as u8),
                fraction: Some(fraction),
            }),
            offset_minutes: Some(offset as i16),
        }
    }

    /// Whether this value carries a UTC offset
    pub fn is_zoned(&self) -> bool {
        self.offset_minutes.is_some()
    }

    /// The precision of the specified components
    pub fn precision(&self) -> TemporalPrecision {
        match &self.time {
            Some(time) => time.precision(),
            None => self.date.precision(),
        }
    }

    /// Normalize a zoned value to UTC, keeping specified-component shape
    fn to_utc(&self) -> Self {
        let Some(offset) = self.offset_minutes else {
            return *self;
        };
        if offset == 0 {
            return *self;
        }
        let time = self.time.unwrap_or(Time {
            hour: 0,
            minute: None,
            second: None,
            fraction: None,
        });
        let total_minutes = self.date.epoch_days() * 1440
            + i64::from(time.hour) * 60
            + i64::from(time.minute.unwrap_or(0))
            - i64::from(offset);
        let (year, month, day) = civil_from_days(total_minutes.div_euclid(1440));
        let minutes = total_minutes.rem_euclid(1440);
        Self {
            date: Date {
                year: year as i32,
                month: self.date.month.map(|_| month),
                day: self.date.day.map(|_| day),
            },
            time: self.time.map(|t| Time {
                hour: (minutes / 60) as u8,
                minute: t.minute.map(|_| (minutes % 60) as u8),
                second: t.second,
                fraction: t.fraction,
            }),
            offset_minutes: Some(0),
        }
    }

    /// Compare per FHIRPath precision and timezone rules
    ///
    /// Mixing a zoned and an unzoned value is incomparable; two zoned values
    /// compare in UTC.
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        match (self.is_zoned(), other.is_zoned()) {
            (true, true) => self.to_utc().compare_components(&other.to_utc()),
            (false, false) => self.compare_components(other),
            _ => None,
        }
    }

    fn compare_components(&self, other: &Self) -> Option<Ordering> {
        let (st, ot) = (self.time, other.time);
        let components = compare_components(&[
            (
                Some(i64::from(self.date.year)),
                Some(i64::from(other.date.year)),
            ),
            (opt(self.date.month), opt(other.date.month)),
            (opt(self.date.day), opt(other.date.day)),
            (st.map(|t| i64::from(t.hour)), ot.map(|t| i64::from(t.hour))),
            (st.and_then(|t| opt(t.minute)), ot.and_then(|t| opt(t.minute))),
            (st.and_then(|t| opt(t.second)), ot.and_then(|t| opt(t.second))),
        ])?;
        if components != Ordering::Equal {
            return Some(components);
        }
        if let (Some(a), Some(b)) = (st, ot)
            && a.second.is_some()
            && b.second.is_some()
        {
            return Some(compare_fractions(a.fraction, b.fraction));
        }
        Some(Ordering::Equal)
    }

    fn validate(&self) -> bool {
        self.date.validate()
            && self.time.is_none_or(|t| t.validate())
            && self
                .offset_minutes
                .is_none_or(|o| (-14 * 60..=14 * 60).contains(&o))
            && (self.time.is_some() || self.offset_minutes.is_none())
    }

    /// Total seconds on the UTC timeline, padding unspecified components
    fn timeline_seconds(&self) -> i64 {
        let utc = self.to_utc();
        let time_seconds = utc.time.map_or(0, |t| t.seconds_of_day());
        utc.date.epoch_days() * 86_400 + time_seconds
    }

    fn timeline_nanos(&self) -> i64 {
        self.time.map_or(0, |t| t.nanos())
    }

    /// Add a signed calendar or time quantity
    pub fn add(&self, amount: i64, unit: DurationUnit) -> Result<Self> {
        match unit {
            DurationUnit::Years | DurationUnit::Months | DurationUnit::Weeks
            | DurationUnit::Days => {
                let date = self.date.add(amount, unit)?;
                Ok(Self { date, ..*self })
            }
            _ => {
                let time = self.time.ok_or_else(|| {
                    FhirPathError::invalid_literal(
                        "Cannot add a time-valued duration to a date-precision value",
                    )
                })?;
                let millis = match unit {
                    DurationUnit::Hours => amount * 3_600_000,
                    DurationUnit::Minutes => amount * 60_000,
                    DurationUnit::Seconds => amount * 1000,
                    _ => amount,
                };
                let base = self.date.epoch_days() * 86_400_000
                    + time.seconds_of_day() * 1000
                    + time.nanos() / 1_000_000;
                let total = base + millis;
                let (year, month, day) = civil_from_days(total.div_euclid(86_400_000));
                let of_day = total.rem_euclid(86_400_000);
                let seconds = of_day / 1000;
                let nanos = ((of_day % 1000) * 1_000_000) as u32;
                Ok(Self {
                    date: Date::new(year as i32, month, day),
                    time: Some(Time {
                        hour: (seconds / 3600) as u8,
                        minute: Some(((seconds / 60) % 60) as u8),
                        second: Some((seconds % 60) as u8),
                        fraction: if nanos > 0 || time.fraction.is_some() {
                            Some(Fraction { nanos, digits: 3 })
                        } else {
                            None
                        },
                    }),
                    offset_minutes: self.offset_minutes,
                })
            }
        }
    }
}

fn opt(value: Option<u8>) -> Option<i64> {
    value.map(i64::from)
}

/// Walk components in precision order
///
/// First unequal pair decides; a pair with exactly one side specified is
/// incomparable; both unspecified ends the walk as equal.
fn compare_components(pairs: &[(Option<i64>, Option<i64>)]) -> Option<Ordering> {
    for (left, right) in pairs {
        match (left, right) {
            (Some(l), Some(r)) => match l.cmp(r) {
                Ordering::Equal => {}
                ordering => return Some(ordering),
            },
            (None, None) => return Some(Ordering::Equal),
            _ => return None,
        }
    }
    Some(Ordering::Equal)
}

/// Compare fractional seconds truncated to the shorter written precision
fn compare_fractions(left: Option<Fraction>, right: Option<Fraction>) -> Ordering {
    let shared = left
        .map_or(0, |f| f.digits)
        .min(right.map_or(0, |f| f.digits));
    if shared == 0 {
        return Ordering::Equal;
    }
    let divisor = 10u32.pow(9 - u32::from(shared));
    let l = left.map_or(0, |f| f.nanos) / divisor;
    let r = right.map_or(0, |f| f.nanos) / divisor;
    l.cmp(&r)
}

/// Signed whole-unit duration from `start` to `end` for two dates
pub fn date_duration_between(start: &Date, end: &Date, unit: DurationUnit) -> Result<i64> {
    match unit {
        DurationUnit::Years => Ok(months_between(start, end, 0, 0) / 12),
        DurationUnit::Months => Ok(months_between(start, end, 0, 0)),
        DurationUnit::Weeks => Ok((end.epoch_days() - start.epoch_days()) / 7),
        DurationUnit::Days => Ok(end.epoch_days() - start.epoch_days()),
        _ => Err(FhirPathError::invalid_literal(format!(
            "Cannot compute a '{unit:?}' duration between date values"
        ))),
    }
}

/// Signed whole-unit duration from `start` to `end` for two datetimes
///
/// Both endpoints must agree on zonedness; mixing is an error because the
/// duration would be ambiguous.
pub fn datetime_duration_between(
    start: &DateTime,
    end: &DateTime,
    unit: DurationUnit,
) -> Result<i64> {
    if start.is_zoned() != end.is_zoned() {
        return Err(FhirPathError::mixed_zone_endpoints());
    }
    let (start, end) = (start.to_utc(), end.to_utc());
    match unit {
        DurationUnit::Years | DurationUnit::Months => {
            let months = months_between(
                &start.date,
                &end.date,
                start.time.map_or(0, |t| t.seconds_of_day()),
                end.time.map_or(0, |t| t.seconds_of_day()),
            );
            Ok(if unit == DurationUnit::Years {
                months / 12
            } else {
                months
            })
        }
        DurationUnit::Weeks => Ok(seconds_between(&start, &end) / (7 * 86_400)),
        DurationUnit::Days => Ok(seconds_between(&start, &end) / 86_400),
        DurationUnit::Hours => Ok(seconds_between(&start, &end) / 3600),
        DurationUnit::Minutes => Ok(seconds_between(&start, &end) / 60),
        DurationUnit::Seconds => Ok(seconds_between(&start, &end)),
        DurationUnit::Milliseconds => Ok(millis_between(&start, &end)),
    }
}

/// Signed whole-unit duration from `start` to `end` for two times
pub fn time_duration_between(start: &Time, end: &Time, unit: DurationUnit) -> Result<i64> {
    let millis = (end.seconds_of_day() * 1000 + end.nanos() / 1_000_000)
        - (start.seconds_of_day() * 1000 + start.nanos() / 1_000_000);
    match unit {
        DurationUnit::Hours => Ok(millis / 3_600_000),
        DurationUnit::Minutes => Ok(millis / 60_000),
        DurationUnit::Seconds => Ok(millis / 1000),
        DurationUnit::Milliseconds => Ok(millis),
        _ => Err(FhirPathError::invalid_literal(format!(
            "Cannot compute a '{unit:?}' duration between time values"
        ))),
    }
}

fn seconds_between(start: &DateTime, end: &DateTime) -> i64 {
    end.timeline_seconds() - start.timeline_seconds()
}

fn millis_between(start: &DateTime, end: &DateTime) -> i64 {
    seconds_between(start, end) * 1000 + (end.timeline_nanos() - start.timeline_nanos()) / 1_000_000
}

/// Whole months from `start` to `end`, adjusting for day-of-month and time
fn months_between(start: &Date, end: &Date, start_time: i64, end_time: i64) -> i64 {
    let base = (i64::from(end.year) - i64::from(start.year)) * 12
        + (i64::from(end.month.unwrap_or(1)) - i64::from(start.month.unwrap_or(1)));
    let start_key = (start.day.unwrap_or(1), start_time);
    let end_key = (end.day.unwrap_or(1), end_time);
    if base > 0 && end_key < start_key {
        base - 1
    } else if base < 0 && end_key > start_key {
        base + 1
    } else {
        base
    }
}

// Howard Hinnant's civil-days algorithms
fn days_from_civil(y: i64, m: i64, d: i64) -> i64 {
    let y = if m <= 2 { y - 1 } else { y };
    let era = if y >= 0 { y } else { y - 399 } / 400;
    let yoe = y - era * 400;
    let mp = (m + 9) % 12;
    let doy = (153 * mp + 2) / 5 + d - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146_097 + doe - 719_468
}

fn civil_from_days(z: i64) -> (i64, u8, u8) {
    let z = z + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    (if m <= 2 { y + 1 } else { y }, m as u8, d as u8)
}

pub(crate) fn days_in_month(year: i32, month: u8) -> u8 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if is_leap_year(year) => 29,
        2 => 28,
        _ => 31,
    }
}

fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

// === Text construction (FHIR wire format and FHIRPath conversions) ===

fn parse_error(text: &str) -> FhirPathError {
    FhirPathError::invalid_literal(format!("Invalid temporal value: '{text}'"))
}

impl FromStr for Date {
    type Err = FhirPathError;

    fn from_str(text: &str) -> Result<Self> {
        let mut parts = text.splitn(3, '-');
        // a leading '-' (negative year) produces an empty first part
        let year = parts
            .next()
            .filter(|p| p.len() == 4)
            .and_then(|p| p.parse::<i32>().ok())
            .ok_or_else(|| parse_error(text))?;
        let month = parts
            .next()
            .map(|p| parse_two_digits(p).ok_or_else(|| parse_error(text)))
            .transpose()?;
        let day = parts
            .next()
            .map(|p| parse_two_digits(p).ok_or_else(|| parse_error(text)))
            .transpose()?;
        let date = Date { year, month, day };
        if !date.validate() {
            return Err(parse_error(text));
        }
        Ok(date)
    }
}

impl FromStr for Time {
    type Err = FhirPathError;

    fn from_str(text: &str) -> Result<Self> {
        let (clock, fraction_text) = match text.split_once('.') {
            Some((clock, frac)) => (clock, Some(frac)),
            None => (text, None),
        };
        let mut parts = clock.splitn(3, ':');
        let hour = parts
            .next()
            .and_then(parse_two_digits)
            .ok_or_else(|| parse_error(text))?;
        let minute = parts
            .next()
            .map(|p| parse_two_digits(p).ok_or_else(|| parse_error(text)))
            .transpose()?;
        let second = parts
            .next()
            .map(|p| parse_two_digits(p).ok_or_else(|| parse_error(text)))
            .transpose()?;
        let fraction = fraction_text
            .map(|digits| parse_fraction(digits).ok_or_else(|| parse_error(text)))
            .transpose()?;
        if fraction.is_some() && second.is_none() {
            return Err(parse_error(text));
        }
        let time = Time {
            hour,
            minute,
            second,
            fraction,
        };
        if !time.validate() {
            return Err(parse_error(text));
        }
        Ok(time)
    }
}

impl FromStr for DateTime {
    type Err = FhirPathError;

    fn from_str(text: &str) -> Result<Self> {
        let (date_text, rest) = match text.split_once('T') {
            Some((date, rest)) => (date, Some(rest)),
            None => (text, None),
        };
        let date: Date = date_text.parse().map_err(|_| parse_error(text))?;
        let Some(rest) = rest else {
            return Ok(DateTime::new(date, None, None));
        };
        let (time_text, offset_minutes) = split_offset(rest).ok_or_else(|| parse_error(text))?;
        let time = if time_text.is_empty() {
            if offset_minutes.is_some() {
                return Err(parse_error(text));
            }
            None
        } else {
            Some(time_text.parse::<Time>().map_err(|_| parse_error(text))?)
        };
        let value = DateTime::new(date, time, offset_minutes);
        if !value.validate() {
            return Err(parse_error(text));
        }
        Ok(value)
    }
}

fn split_offset(text: &str) -> Option<(&str, Option<i16>)> {
    if let Some(stripped) = text.strip_suffix('Z') {
        return Some((stripped, Some(0)));
    }
    // find a '+' or a '-' after the time portion; '-' cannot appear inside a time
    if let Some(pos) = text.rfind(['+', '-']) {
        let (time_text, offset_text) = text.split_at(pos);
        let sign: i16 = if offset_text.starts_with('-') { -1 } else { 1 };
        let body = &offset_text[1..];
        let (hours, minutes) = body.split_once(':')?;
        let hours: i16 = i16::from(parse_two_digits(hours)?);
        let minutes: i16 = i16::from(parse_two_digits(minutes)?);
        if hours > 14 || minutes > 59 {
            return None;
        }
        return Some((time_text, Some(sign * (hours * 60 + minutes))));
    }
    Some((text, None))
}

fn parse_two_digits(text: &str) -> Option<u8> {
    if text.len() != 2 || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

fn parse_fraction(digits: &str) -> Option<Fraction> {
    if digits.is_empty() || digits.len() > 9 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let nanos: u32 = digits.parse::<u32>().ok()? * 10u32.pow(9 - digits.len() as u32);
    Some(Fraction {
        nanos,
        digits: digits.len() as u8,
    })
}

impl fmt::Display for Date {
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

impl fmt::Display for Time {
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

impl fmt::Display for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.date)?;
        if let Some(time) = &self.time {
            write!(f, "T{time}")?;
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

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[test]
    fn date_ordering_at_shared_precision() {
        let a = Date::new(1970, 1, 1);
        let b = Date::new(2020, 1, 1);
        assert_eq!(a.compare(&b), Some(Ordering::Less));
        assert_eq!(b.compare(&a), Some(Ordering::Greater));
    }

    #[test]
    fn precision_mismatch_is_incomparable() {
        let year_only = Date::year(2020);
        let full = Date::new(2020, 5, 1);
        assert_eq!(year_only.compare(&full), None);
        // but an earlier component still decides
        assert_eq!(Date::year(2019).compare(&full), Some(Ordering::Less));
    }

    #[test]
    fn zoned_vs_unzoned_is_incomparable() {
        let zoned: DateTime = "2012-04-15T15:00:00Z".parse().unwrap();
        let unzoned: DateTime = "2012-04-15T10:00:00".parse().unwrap();
        assert_eq!(zoned.compare(&unzoned), None);
    }

    #[test]
    fn zoned_values_compare_in_utc() {
        let a: DateTime = "2020-01-01T10:00:00+02:00".parse().unwrap();
        let b: DateTime = "2020-01-01T08:00:00Z".parse().unwrap();
        assert_eq!(a.compare(&b), Some(Ordering::Equal));
        let c: DateTime = "2020-01-01T00:30:00+01:00".parse().unwrap();
        let d: DateTime = "2019-12-31T23:00:00Z".parse().unwrap();
        assert_eq!(c.compare(&d), Some(Ordering::Greater));
    }

    #[test]
    fn excess_fraction_digits_are_truncated() {
        let a: DateTime = "2012-04-15T15:00:00.123456789".parse().unwrap();
        let b: DateTime = "2012-04-15T15:00:00.123456".parse().unwrap();
        assert_eq!(a.compare(&b), Some(Ordering::Equal));
        let c: DateTime = "2012-04-15T15:00:00.123457".parse().unwrap();
        assert_eq!(b.compare(&c), Some(Ordering::Less));
    }

    #[rstest]
    #[case("years", 50)]
    #[case("months", 600)]
    #[case("days", 18262)]
    fn between_full_dates(#[case] unit: &str, #[case] expected: i64) {
        let start = Date::new(1970, 1, 1);
        let end = Date::new(2020, 1, 1);
        let unit = DurationUnit::parse(unit).unwrap();
        assert_eq!(date_duration_between(&start, &end, unit).unwrap(), expected);
        assert_eq!(date_duration_between(&end, &start, unit).unwrap(), -expected);
    }

    #[test]
    fn months_between_adjusts_for_day_of_month() {
        let start = Date::new(2020, 1, 31);
        let end = Date::new(2020, 2, 28);
        assert_eq!(
            date_duration_between(&start, &end, DurationUnit::Months).unwrap(),
            0
        );
    }

    #[test]
    fn mixed_zone_duration_is_an_error() {
        let zoned: DateTime = "2020-01-01T00:00:00Z".parse().unwrap();
        let unzoned: DateTime = "2020-06-01T00:00:00".parse().unwrap();
        let err = datetime_duration_between(&zoned, &unzoned, DurationUnit::Days).unwrap_err();
        assert!(err.is_evaluation());
    }

    #[rstest]
    #[case("2020-13-01")]
    #[case("2020-05-32")]
    #[case("-1010")]
    #[case("20")]
    fn invalid_date_text_is_rejected(#[case] text: &str) {
        assert!(text.parse::<Date>().is_err(), "expected error for {text:?}");
    }

    #[rstest]
    #[case("29:00:00")]
    #[case("01:78:00")]
    #[case("10:00:00.1234567890")]
    fn invalid_time_text_is_rejected(#[case] text: &str) {
        assert!(text.parse::<Time>().is_err(), "expected error for {text:?}");
    }

    #[rstest]
    #[case("2020-01-01")]
    #[case("2020-01")]
    #[case("2020")]
    fn date_display_round_trips(#[case] text: &str) {
        let date: Date = text.parse().unwrap();
        assert_eq!(date.to_string(), text);
    }

    #[rstest]
    #[case("2012-04-15T15:00:00Z")]
    #[case("2012-04-15T15:00:00.123-05:00")]
    #[case("2012-04-15T15:30")]
    #[case("2012-04-15")]
    fn datetime_display_round_trips(#[case] text: &str) {
        let value: DateTime = text.parse().unwrap();
        assert_eq!(value.to_string(), text);
    }

    #[test]
    fn calendar_addition_clamps_day() {
        let jan31 = Date::new(2020, 1, 31);
        assert_eq!(
            jan31.add(1, DurationUnit::Months).unwrap(),
            Date::new(2020, 2, 29)
        );
        let feb29 = Date::new(2020, 2, 29);
        assert_eq!(
            feb29.add(1, DurationUnit::Years).unwrap(),
            Date::new(2021, 2, 28)
        );
    }

    #[test]
    fn time_addition_wraps_midnight() {
        let late = Time::new(23, 30, 0);
        assert_eq!(late.add(1, DurationUnit::Hours).unwrap(), Time::new(0, 30, 0));
    }
}
