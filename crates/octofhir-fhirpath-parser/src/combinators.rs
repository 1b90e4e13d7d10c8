//! Lexical-level parsers for FHIRPath
//!
//! Whitespace/comment handling, identifiers, string escapes, numbers and the
//! temporal literal grammar. Range violations inside a committed literal
//! (month 13, hour 29, a truncated UTC offset) are cut errors: they abort the
//! parse instead of backtracking into a silently different reading.

use octofhir_fhirpath_ast::{
    DateLiteral, DateTimeLiteral, FractionLiteral, Literal, QualifiedName, TimeLiteral,
};
use rust_decimal::Decimal;
use std::str::FromStr;
use winnow::error::{ContextError, ErrMode, StrContext};

/// Parser input: a plain string slice, consumed left to right
pub(crate) type Input<'a> = &'a str;

/// Parser result with backtrack/cut error modes
pub(crate) type PResult<T> = winnow::error::ModalResult<T>;

/// Words that cannot be used as bare identifiers
const RESERVED: &[&str] = &[
    "and", "as", "contains", "div", "false", "implies", "in", "is", "mod", "or", "true", "xor",
];

/// Calendar duration keywords usable as quantity units
const CALENDAR_UNITS: &[&str] = &[
    "year",
    "years",
    "month",
    "months",
    "week",
    "weeks",
    "day",
    "days",
    "hour",
    "hours",
    "minute",
    "minutes",
    "second",
    "seconds",
    "millisecond",
    "milliseconds",
];

/// A recoverable failure: the caller may try another alternative
pub(crate) fn backtrack<T>() -> PResult<T> {
    Err(ErrMode::Backtrack(ContextError::new()))
}

/// An unrecoverable failure inside a committed construct
pub(crate) fn cut_with<T>(label: &'static str) -> PResult<T> {
    let mut err = ContextError::new();
    err.push(StrContext::Label(label));
    Err(ErrMode::Cut(err))
}

/// Skip whitespace and comments; unterminated block comments are an error
pub(crate) fn ws(input: &mut Input<'_>) -> PResult<()> {
    loop {
        *input = input.trim_start();
        if let Some(rest) = input.strip_prefix("//") {
            *input = rest.find('\n').map_or("", |pos| &rest[pos + 1..]);
        } else if let Some(rest) = input.strip_prefix("/*") {
            match rest.find("*/") {
                Some(pos) => *input = &rest[pos + 2..],
                None => {
                    *input = "";
                    return cut_with("unterminated comment");
                }
            }
        } else {
            return Ok(());
        }
    }
}

fn raw_identifier<'a>(input: &mut Input<'a>) -> PResult<&'a str> {
    let mut chars = input.char_indices();
    match chars.next() {
        Some((_, c)) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return backtrack(),
    }
    let end = chars
        .find(|(_, c)| !c.is_ascii_alphanumeric() && *c != '_')
        .map_or(input.len(), |(pos, _)| pos);
    let (name, rest) = input.split_at(end);
    *input = rest;
    Ok(name)
}

/// A regular identifier; reserved operator keywords are rejected
pub(crate) fn identifier(input: &mut Input<'_>) -> PResult<String> {
    let checkpoint = *input;
    let name = raw_identifier(input)?;
    if RESERVED.contains(&name) {
        *input = checkpoint;
        return backtrack();
    }
    Ok(name.to_string())
}

/// An identifier in a position where keywords are allowed (after `.`,
/// in type specifiers, as function names)
pub(crate) fn identifier_or_keyword(input: &mut Input<'_>) -> PResult<String> {
    raw_identifier(input).map(str::to_string)
}

/// A backtick-delimited identifier with escape sequences
pub(crate) fn delimited_identifier(input: &mut Input<'_>) -> PResult<String> {
    if !input.starts_with('`') {
        return backtrack();
    }
    *input = &input[1..];
    take_escaped_until(input, '`', "delimited identifier")
}

/// An identifier in any surface form
pub(crate) fn any_identifier(input: &mut Input<'_>) -> PResult<String> {
    if input.starts_with('`') {
        delimited_identifier(input)
    } else {
        identifier(input)
    }
}

/// Match a specific keyword with a word boundary
pub(crate) fn keyword<'a>(kw: &'static str) -> impl FnMut(&mut Input<'a>) -> PResult<&'a str> {
    move |input: &mut Input<'a>| {
        let checkpoint = *input;
        match raw_identifier(input) {
            Ok(word) if word == kw => Ok(word),
            _ => {
                *input = checkpoint;
                backtrack()
            }
        }
    }
}

/// A single-quoted string literal with escapes resolved
pub(crate) fn string_literal(input: &mut Input<'_>) -> PResult<String> {
    if !input.starts_with('\'') {
        return backtrack();
    }
    *input = &input[1..];
    take_escaped_until(input, '\'', "string literal")
}

fn take_escaped_until(input: &mut Input<'_>, delim: char, label: &'static str) -> PResult<String> {
    let mut out = String::new();
    let mut chars = input.chars();
    loop {
        match chars.next() {
            None => {
                *input = "";
                return cut_with(label);
            }
            Some(c) if c == delim => {
                *input = chars.as_str();
                return Ok(out);
            }
            Some('\\') => {
                let escaped = match chars.next() {
                    Some('n') => '\n',
                    Some('r') => '\r',
                    Some('t') => '\t',
                    Some('f') => '\u{000C}',
                    Some('\'') => '\'',
                    Some('"') => '"',
                    Some('`') => '`',
                    Some('\\') => '\\',
                    Some('/') => '/',
                    Some('u') => {
                        let rest = chars.as_str();
                        if rest.len() < 4 || !rest.is_char_boundary(4) {
                            *input = rest;
                            return cut_with("unicode escape");
                        }
                        let (hex, _) = rest.split_at(4);
                        let Some(ch) = u32::from_str_radix(hex, 16)
                            .ok()
                            .and_then(char::from_u32)
                        else {
                            *input = rest;
                            return cut_with("unicode escape");
                        };
                        chars = rest[4..].chars();
                        ch
                    }
                    _ => {
                        *input = chars.as_str();
                        return cut_with("escape sequence");
                    }
                };
                out.push(escaped);
            }
            Some(c) => out.push(c),
        }
    }
}

fn digit_run<'a>(input: &mut Input<'a>) -> &'a str {
    let end = input
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(input.len());
    let (digits, rest) = input.split_at(end);
    *input = rest;
    digits
}

fn take_exact_digits<'a>(input: &mut Input<'a>, count: usize) -> Option<&'a str> {
    let bytes = input.as_bytes();
    if bytes.len() < count || !bytes[..count].iter().all(u8::is_ascii_digit) {
        return None;
    }
    let (taken, rest) = input.split_at(count);
    *input = rest;
    Some(taken)
}

/// An integer or decimal literal
pub(crate) fn number_literal(input: &mut Input<'_>) -> PResult<Literal> {
    let start = *input;
    let int_part = digit_run(input);
    if int_part.is_empty() {
        return backtrack();
    }
    let has_fraction =
        input.starts_with('.') && input[1..].starts_with(|c: char| c.is_ascii_digit());
    if has_fraction {
        *input = &input[1..];
        let frac_part = digit_run(input);
        let text = &start[..int_part.len() + 1 + frac_part.len()];
        match Decimal::from_str(text) {
            Ok(value) => Ok(Literal::Decimal(value)),
            Err(_) => cut_with("decimal literal"),
        }
    } else {
        match int_part.parse::<i32>() {
            Ok(value) => Ok(Literal::Integer(value)),
            Err(_) => cut_with("integer literal"),
        }
    }
}

/// A quantity unit: a quoted UCUM code or a calendar duration keyword
pub(crate) fn quantity_unit(input: &mut Input<'_>) -> PResult<String> {
    if input.starts_with('\'') {
        return string_literal(input);
    }
    let checkpoint = *input;
    match raw_identifier(input) {
        Ok(word) if CALENDAR_UNITS.contains(&word) => Ok(word.to_string()),
        _ => {
            *input = checkpoint;
            backtrack()
        }
    }
}

/// A date, datetime, or time literal introduced by `@`
pub(crate) fn temporal_literal(input: &mut Input<'_>) -> PResult<Literal> {
    if !input.starts_with('@') {
        return backtrack();
    }
    *input = &input[1..];
    if let Some(rest) = input.strip_prefix('T') {
        *input = rest;
        let time = parse_time(input)?;
        return Ok(Literal::Time(time));
    }
    let date = parse_date(input)?;
    if let Some(rest) = input.strip_prefix('T') {
        *input = rest;
        let time = if input.starts_with(|c: char| c.is_ascii_digit()) {
            Some(parse_time(input)?)
        } else {
            None
        };
        let offset_minutes = if time.is_some() {
            parse_offset(input)?
        } else {
            None
        };
        return Ok(Literal::DateTime(DateTimeLiteral {
            date,
            time,
            offset_minutes,
        }));
    }
    Ok(Literal::Date(date))
}

fn parse_date(input: &mut Input<'_>) -> PResult<DateLiteral> {
    let Some(year_digits) = take_exact_digits(input, 4) else {
        return cut_with("date literal");
    };
    let year: i32 = year_digits.parse().expect("four digits fit in i32");
    let mut date = DateLiteral {
        year,
        month: None,
        day: None,
    };

    let checkpoint = *input;
    if input.starts_with('-') {
        *input = &input[1..];
        match take_exact_digits(input, 2) {
            Some(digits) => {
                let month: u8 = digits.parse().expect("two digits fit in u8");
                if !(1..=12).contains(&month) {
                    return cut_with("month component");
                }
                date.month = Some(month);
            }
            None => {
                // not a month; the '-' belongs to the surrounding expression
                *input = checkpoint;
                return Ok(date);
            }
        }
    } else {
        return Ok(date);
    }

    let checkpoint = *input;
    if input.starts_with('-') {
        *input = &input[1..];
        match take_exact_digits(input, 2) {
            Some(digits) => {
                let day: u8 = digits.parse().expect("two digits fit in u8");
                if day < 1 || day > days_in_month(date.year, date.month.unwrap_or(1)) {
                    return cut_with("day component");
                }
                date.day = Some(day);
            }
            None => *input = checkpoint,
        }
    }
    Ok(date)
}

fn parse_time(input: &mut Input<'_>) -> PResult<TimeLiteral> {
    let Some(digits) = take_exact_digits(input, 2) else {
        return cut_with("time literal");
    };
    let hour: u8 = digits.parse().expect("two digits fit in u8");
    if hour > 23 {
        return cut_with("hour component");
    }
    let mut time = TimeLiteral {
        hour,
        minute: None,
        second: None,
        fraction: None,
    };

    if !input.starts_with(':') {
        return Ok(time);
    }
    *input = &input[1..];
    let Some(digits) = take_exact_digits(input, 2) else {
        return cut_with("minute component");
    };
    let minute: u8 = digits.parse().expect("two digits fit in u8");
    if minute > 59 {
        return cut_with("minute component");
    }
    time.minute = Some(minute);

    if !input.starts_with(':') {
        return Ok(time);
    }
    *input = &input[1..];
    let Some(digits) = take_exact_digits(input, 2) else {
        return cut_with("second component");
    };
    let second: u8 = digits.parse().expect("two digits fit in u8");
    if second > 59 {
        return cut_with("second component");
    }
    time.second = Some(second);

    // a dot only starts a fraction when digits follow; `.toString()` stays
    if input.starts_with('.') && input[1..].starts_with(|c: char| c.is_ascii_digit()) {
        *input = &input[1..];
        let digits = digit_run(input);
        if digits.is_empty() || digits.len() > 9 {
            return cut_with("fractional seconds");
        }
        let mut nanos: u32 = digits.parse().expect("at most nine digits fit in u32");
        nanos *= 10u32.pow(9 - digits.len() as u32);
        time.fraction = Some(FractionLiteral {
            nanos,
            digits: digits.len() as u8,
        });
    }
    Ok(time)
}

fn parse_offset(input: &mut Input<'_>) -> PResult<Option<i16>> {
    if let Some(rest) = input.strip_prefix('Z') {
        *input = rest;
        return Ok(Some(0));
    }
    let sign = match input.chars().next() {
        Some('+') => 1i16,
        Some('-') => -1i16,
        _ => return Ok(None),
    };
    *input = &input[1..];
    let Some(digits) = take_exact_digits(input, 2) else {
        return cut_with("offset hours");
    };
    let hours: i16 = digits.parse().expect("two digits fit in i16");
    if hours > 14 {
        return cut_with("offset hours");
    }
    if !input.starts_with(':') {
        return cut_with("offset separator");
    }
    *input = &input[1..];
    let Some(digits) = take_exact_digits(input, 2) else {
        return cut_with("offset minutes");
    };
    let minutes: i16 = digits.parse().expect("two digits fit in i16");
    if minutes > 59 {
        return cut_with("offset minutes");
    }
    Ok(Some(sign * (hours * 60 + minutes)))
}

fn days_in_month(year: i32, month: u8) -> u8 {
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

/// A possibly qualified type name (`Patient`, `FHIR.Patient`, `System.String`)
pub(crate) fn qualified_name(input: &mut Input<'_>) -> PResult<QualifiedName> {
    let first = if input.starts_with('`') {
        delimited_identifier(input)?
    } else {
        identifier_or_keyword(input)?
    };
    let checkpoint = *input;
    ws(input)?;
    if input.starts_with('.') {
        *input = &input[1..];
        ws(input)?;
        let second = if input.starts_with('`') {
            delimited_identifier(input)?
        } else {
            identifier_or_keyword(input)?
        };
        return Ok(QualifiedName::qualified(first, second));
    }
    *input = checkpoint;
    Ok(QualifiedName::unqualified(first))
}

/// The name of an external constant, after the `%` sigil
pub(crate) fn external_constant_name(input: &mut Input<'_>) -> PResult<String> {
    if input.starts_with('`') {
        delimited_identifier(input)
    } else if input.starts_with('\'') {
        string_literal(input)
    } else {
        identifier_or_keyword(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn run<T>(
        parser: impl FnOnce(&mut Input<'_>) -> PResult<T>,
        text: &str,
    ) -> (PResult<T>, String) {
        let mut input = text;
        let result = parser(&mut input);
        (result, input.to_string())
    }

    #[test]
    fn ws_skips_comments() {
        let (result, rest) = run(ws, "  // line\n /* block */ x");
        assert!(result.is_ok());
        assert_eq!(rest, "x");
    }

    #[test]
    fn identifier_rejects_reserved_words() {
        let (result, rest) = run(identifier, "div");
        assert!(result.is_err());
        assert_eq!(rest, "div");
        let (result, _) = run(identifier_or_keyword, "div");
        assert_eq!(result.unwrap(), "div");
    }

    #[test]
    fn string_escapes_are_resolved() {
        let (result, _) = run(string_literal, r"'a\nbA'");
        assert_eq!(result.unwrap(), "a\nbA");
    }

    #[test]
    fn partial_date_leaves_operator_behind() {
        let (result, rest) = run(temporal_literal, "@2010-3");
        assert_eq!(
            result.unwrap(),
            Literal::Date(DateLiteral {
                year: 2010,
                month: None,
                day: None
            })
        );
        assert_eq!(rest, "-3");
    }

    #[test]
    fn fraction_keeps_digit_count() {
        let (result, _) = run(temporal_literal, "@T12:00:00.250");
        let Literal::Time(time) = result.unwrap() else {
            panic!("expected time literal");
        };
        let fraction = time.fraction.unwrap();
        assert_eq!(fraction.digits, 3);
        assert_eq!(fraction.nanos, 250_000_000);
    }

    #[test]
    fn out_of_range_components_are_cut_errors() {
        for text in ["@2010-13-01", "@2010-05-32", "@T24:00", "@T10:78"] {
            let (result, _) = run(temporal_literal, text);
            assert!(
                matches!(result, Err(ErrMode::Cut(_))),
                "expected cut for {text:?}"
            );
        }
    }

    #[test]
    fn offset_requires_separator() {
        let (result, _) = run(temporal_literal, "@2020-01-01T10:00:00+0500");
        assert!(matches!(result, Err(ErrMode::Cut(_))));
    }
}
