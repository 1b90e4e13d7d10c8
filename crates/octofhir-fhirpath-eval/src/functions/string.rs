//! String functions
//!
//! All operate on a singleton string input: empty input gives an empty
//! result; multiple items or a non-string item are contract violations.

use crate::{Collection, FunctionRegistry};
use octofhir_fhirpath_diagnostics::{FP0102, FhirPathError};
use octofhir_fhirpath_model::FhirPathNode;
use regex::Regex;

use super::{integer_argument, string_argument, string_input};

fn string_result(value: String) -> Collection {
    Collection::singleton(FhirPathNode::string(value))
}

pub(super) fn register(registry: &mut FunctionRegistry) {
    registry.register_fn("length", 0, 0, |_, input, _| {
        let Some(text) = string_input(input)? else {
            return Ok(Collection::empty());
        };
        let length = i32::try_from(text.chars().count()).unwrap_or(i32::MAX);
        Ok(Collection::singleton(FhirPathNode::integer(length)))
    });
    registry.register_fn("indexOf", 1, 1, |_, input, args| {
        let (Some(text), Some(pattern)) = (string_input(input)?, string_argument(args, 0)?)
        else {
            return Ok(Collection::empty());
        };
        let index = text
            .find(&pattern)
            .map_or(-1, |byte| {
                i32::try_from(text[..byte].chars().count()).unwrap_or(-1)
            });
        Ok(Collection::singleton(FhirPathNode::integer(index)))
    });
    registry.register_fn("substring", 1, 2, |_, input, args| {
        let (Some(text), Some(start)) = (string_input(input)?, integer_argument(args, 0)?)
        else {
            return Ok(Collection::empty());
        };
        let chars: Vec<char> = text.chars().collect();
        let Ok(start) = usize::try_from(start) else {
            return Ok(Collection::empty());
        };
        if start >= chars.len() {
            return Ok(Collection::empty());
        }
        let length = match args.get(1) {
            Some(_) => match integer_argument(args, 1)? {
                Some(length) => usize::try_from(length).unwrap_or(0),
                None => return Ok(Collection::empty()),
            },
            None => chars.len() - start,
        };
        let result: String = chars[start..].iter().take(length).collect();
        Ok(string_result(result))
    });
    registry.register_fn("startsWith", 1, 1, |_, input, args| {
        let (Some(text), Some(prefix)) = (string_input(input)?, string_argument(args, 0)?)
        else {
            return Ok(Collection::empty());
        };
        Ok(Collection::boolean(text.starts_with(&prefix)))
    });
    registry.register_fn("endsWith", 1, 1, |_, input, args| {
        let (Some(text), Some(suffix)) = (string_input(input)?, string_argument(args, 0)?)
        else {
            return Ok(Collection::empty());
        };
        Ok(Collection::boolean(text.ends_with(&suffix)))
    });
    registry.register_fn("contains", 1, 1, |_, input, args| {
        let (Some(text), Some(substring)) = (string_input(input)?, string_argument(args, 0)?)
        else {
            return Ok(Collection::empty());
        };
        Ok(Collection::boolean(text.contains(&substring)))
    });
    registry.register_fn("upper", 0, 0, |_, input, _| {
        let Some(text) = string_input(input)? else {
            return Ok(Collection::empty());
        };
        Ok(string_result(text.to_uppercase()))
    });
    registry.register_fn("lower", 0, 0, |_, input, _| {
        let Some(text) = string_input(input)? else {
            return Ok(Collection::empty());
        };
        Ok(string_result(text.to_lowercase()))
    });
    registry.register_fn("replace", 2, 2, |_, input, args| {
        let (Some(text), Some(pattern), Some(substitution)) = (
            string_input(input)?,
            string_argument(args, 0)?,
            string_argument(args, 1)?,
        ) else {
            return Ok(Collection::empty());
        };
        Ok(string_result(text.replace(&pattern, &substitution)))
    });
    registry.register_fn("matches", 1, 1, |_, input, args| {
        let (Some(text), Some(pattern)) = (string_input(input)?, string_argument(args, 0)?)
        else {
            return Ok(Collection::empty());
        };
        let regex = compile(&pattern)?;
        Ok(Collection::boolean(regex.is_match(&text)))
    });
    registry.register_fn("replaceMatches", 2, 2, |_, input, args| {
        let (Some(text), Some(pattern), Some(substitution)) = (
            string_input(input)?,
            string_argument(args, 0)?,
            string_argument(args, 1)?,
        ) else {
            return Ok(Collection::empty());
        };
        let regex = compile(&pattern)?;
        Ok(string_result(
            regex.replace_all(&text, substitution.as_str()).into_owned(),
        ))
    });
    registry.register_fn("toChars", 0, 0, |_, input, _| {
        let Some(text) = string_input(input)? else {
            return Ok(Collection::empty());
        };
        Ok(text
            .chars()
            .map(|c| FhirPathNode::string(c.to_string()))
            .collect())
    });
}

fn compile(pattern: &str) -> Result<Regex, FhirPathError> {
    Regex::new(pattern)
        .map_err(|_| FhirPathError::evaluation(FP0102, format!("Invalid regex pattern: {pattern}")))
}
