//! FHIRPath error types

use crate::{ErrorCode, Span};
use crate::{FP0001, FP0100, FP0101, FP0102, FP0103, FP0104, FP0105, FP0200, FP0300};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main FHIRPath error type
///
/// A discriminated error so that callers can distinguish syntax errors from
/// runtime contract violations, and genuine failures from operations the
/// engine intentionally does not support (a conformance harness skips the
/// latter instead of failing).
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
pub enum FhirPathError {
    /// The expression text does not conform to the grammar
    #[error("{code}: {message} at position {}", span.start)]
    Parse {
        code: ErrorCode,
        message: String,
        span: Span,
    },

    /// A structural or type contract was violated during evaluation
    #[error("{message}")]
    Evaluation { code: ErrorCode, message: String },

    /// The operation is recognized but intentionally not supported
    #[error("Operation not supported: {message}")]
    Unsupported { message: String },
}

impl FhirPathError {
    /// Create a parse error at the given span
    pub fn parse(code: ErrorCode, message: impl Into<String>, span: Span) -> Self {
        Self::Parse {
            code,
            message: message.into(),
            span,
        }
    }

    /// Parse error for an unexpected token at a byte offset
    pub fn unexpected_token(offset: usize) -> Self {
        Self::parse(FP0001, "Unexpected token", Span::point(offset))
    }

    /// Create an evaluation error with an explicit code
    pub fn evaluation(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Evaluation {
            code,
            message: message.into(),
        }
    }

    /// Create an unsupported-operation error
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported {
            message: message.into(),
        }
    }

    /// Input collection had more than one item where a singleton was required
    pub fn singleton_required() -> Self {
        Self::evaluation(FP0100, "Input collection must not contain more than one item")
    }

    /// Input collection had `count` items where exactly one was allowed
    pub fn too_many_items(count: usize) -> Self {
        Self::evaluation(
            FP0100,
            format!("Input collection has {count} items, but only 1 is allowed"),
        )
    }

    /// Input collection item had the wrong type for a function
    pub fn input_not_of_type(expected: &str, found: &str) -> Self {
        Self::evaluation(
            FP0102,
            format!("Input collection item must be of type {expected}, but found '{found}'"),
        )
    }

    /// Argument collection item had the wrong type for a function
    pub fn argument_not_of_type(expected: &str, found: &str) -> Self {
        Self::evaluation(
            FP0102,
            format!("Argument must be of type {expected}, but found '{found}'"),
        )
    }

    /// A function was called with the wrong number of arguments
    pub fn unexpected_argument_count(arity: usize, function_name: &str) -> Self {
        Self::evaluation(
            FP0101,
            format!("Unexpected number of arguments: {arity} for function: '{function_name}'"),
        )
    }

    /// A function name was not found in the registry
    pub fn function_not_found(function_name: &str) -> Self {
        Self::evaluation(FP0103, format!("Function: '{function_name}' not found"))
    }

    /// Operands of a binary operator had invalid types
    pub fn invalid_operator_arguments(operator: &str) -> Self {
        Self::evaluation(FP0102, format!("Invalid argument(s) for '{operator}' operator"))
    }

    /// Two system values are not comparable at all (equality would be an error)
    pub fn type_not_compatible(left: &str, right: &str) -> Self {
        Self::evaluation(
            FP0102,
            format!("Type: '{left}' is not compatible with type: '{right}'"),
        )
    }

    /// A type identifier did not resolve
    pub fn unknown_type(identifier: &str) -> Self {
        Self::evaluation(
            FP0200,
            format!("Argument '{identifier}' cannot be resolved to a valid type identifier"),
        )
    }

    /// Quantity arithmetic on incompatible units
    pub fn incompatible_units(left: &str, right: &str) -> Self {
        Self::evaluation(
            FP0104,
            format!("Incompatible units: '{left}' and '{right}'"),
        )
    }

    /// Duration computation across zoned and unzoned endpoints
    pub fn mixed_zone_endpoints() -> Self {
        Self::evaluation(
            FP0105,
            "Cannot compute a duration between a zoned and an unzoned temporal value",
        )
    }

    /// An invalid date/time/quantity literal component
    pub fn invalid_literal(message: impl Into<String>) -> Self {
        Self::evaluation(FP0102, message)
    }

    /// Wrap a terminology-service failure
    pub fn terminology(message: impl Into<String>) -> Self {
        Self::evaluation(FP0300, message)
    }

    /// Get the error code, if the variant carries one
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Self::Parse { code, .. } | Self::Evaluation { code, .. } => Some(*code),
            Self::Unsupported { .. } => None,
        }
    }

    /// Check whether this is a parse error
    pub fn is_parse(&self) -> bool {
        matches!(self, Self::Parse { .. })
    }

    /// Check whether this is an evaluation error
    pub fn is_evaluation(&self) -> bool {
        matches!(self, Self::Evaluation { .. })
    }

    /// Check whether this is an unsupported-operation signal
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn singleton_message_is_stable() {
        assert_eq!(
            FhirPathError::singleton_required().to_string(),
            "Input collection must not contain more than one item"
        );
    }

    #[test]
    fn input_type_message_is_stable() {
        assert_eq!(
            FhirPathError::input_not_of_type("String", "Integer").to_string(),
            "Input collection item must be of type String, but found 'Integer'"
        );
    }

    #[test]
    fn argument_count_message_is_stable() {
        assert_eq!(
            FhirPathError::unexpected_argument_count(3, "substring").to_string(),
            "Unexpected number of arguments: 3 for function: 'substring'"
        );
    }

    #[test]
    fn unsupported_is_distinguishable() {
        let err = FhirPathError::unsupported("total() outside aggregate");
        assert!(err.is_unsupported());
        assert!(err.code().is_none());
    }
}
