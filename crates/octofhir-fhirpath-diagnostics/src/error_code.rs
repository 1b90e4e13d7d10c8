//! FHIRPath error codes following a structured numbering system
//!
//! Error code ranges:
//! - FP0001-FP0099: Parse errors (syntax)
//! - FP0100-FP0199: Evaluation errors (runtime)
//! - FP0200-FP0299: Type system and model errors
//! - FP0300-FP0399: Collaborator errors (terminology, resolution)

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

/// Error code identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ErrorCode(u16);

impl ErrorCode {
    /// Create a new error code
    pub const fn new(code: u16) -> Self {
        Self(code)
    }

    /// Get the numeric code
    pub const fn code(&self) -> u16 {
        self.0
    }

    /// Get error information for this code
    pub fn info(&self) -> &'static ErrorInfo {
        ERROR_INFO.get(&self.0).unwrap_or(&UNKNOWN_ERROR)
    }

    /// Check if this is a parse error (0001-0099)
    pub const fn is_parse_error(&self) -> bool {
        self.0 >= 1 && self.0 < 100
    }

    /// Check if this is an evaluation error (0100-0199)
    pub const fn is_evaluation_error(&self) -> bool {
        self.0 >= 100 && self.0 < 200
    }

    /// Check if this is a type/model error (0200-0299)
    pub const fn is_model_error(&self) -> bool {
        self.0 >= 200 && self.0 < 300
    }

    /// Check if this is a collaborator error (0300-0399)
    pub const fn is_collaborator_error(&self) -> bool {
        self.0 >= 300 && self.0 < 400
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FP{:04}", self.0)
    }
}

// Parse errors
/// Unexpected token
pub const FP0001: ErrorCode = ErrorCode::new(1);
/// Unexpected end of input
pub const FP0002: ErrorCode = ErrorCode::new(2);
/// Invalid string escape sequence
pub const FP0003: ErrorCode = ErrorCode::new(3);
/// Unterminated string literal
pub const FP0004: ErrorCode = ErrorCode::new(4);
/// Invalid date/time literal
pub const FP0005: ErrorCode = ErrorCode::new(5);
/// Unterminated comment
pub const FP0006: ErrorCode = ErrorCode::new(6);
/// Invalid number literal
pub const FP0007: ErrorCode = ErrorCode::new(7);

// Evaluation errors
/// Singleton input required
pub const FP0100: ErrorCode = ErrorCode::new(100);
/// Wrong argument count
pub const FP0101: ErrorCode = ErrorCode::new(101);
/// Wrong operand or input type
pub const FP0102: ErrorCode = ErrorCode::new(102);
/// Unknown function
pub const FP0103: ErrorCode = ErrorCode::new(103);
/// Incompatible quantity units
pub const FP0104: ErrorCode = ErrorCode::new(104);
/// Mixed zoned and unzoned temporal operands
pub const FP0105: ErrorCode = ErrorCode::new(105);

// Type system and model errors
/// Unknown type identifier
pub const FP0200: ErrorCode = ErrorCode::new(200);

// Collaborator errors
/// Terminology service failure
pub const FP0300: ErrorCode = ErrorCode::new(300);

/// Information about an error code
#[derive(Debug, Clone)]
pub struct ErrorInfo {
    /// Short description of the error
    pub description: &'static str,
    /// Detailed help text
    pub help: Option<&'static str>,
}

impl ErrorInfo {
    const fn new(description: &'static str) -> Self {
        Self {
            description,
            help: None,
        }
    }

    const fn with_help(mut self, help: &'static str) -> Self {
        self.help = Some(help);
        self
    }
}

static UNKNOWN_ERROR: ErrorInfo = ErrorInfo::new("Unknown error");

static ERROR_INFO: LazyLock<HashMap<u16, ErrorInfo>> = LazyLock::new(|| {
    let mut map = HashMap::new();

    // Parse errors (0001-0099)
    map.insert(1, ErrorInfo::new("Unexpected token"));
    map.insert(2, ErrorInfo::new("Unexpected end of input"));
    map.insert(3, ErrorInfo::new("Invalid string escape sequence"));
    map.insert(4, ErrorInfo::new("Unterminated string literal"));
    map.insert(
        5,
        ErrorInfo::new("Invalid date/time literal")
            .with_help("Date literals are @YYYY[-MM[-DD]], times are @Thh[:mm[:ss[.fff]]]"),
    );
    map.insert(6, ErrorInfo::new("Unterminated comment"));
    map.insert(7, ErrorInfo::new("Invalid number literal"));

    // Evaluation errors (0100-0199)
    map.insert(100, ErrorInfo::new("Singleton input required"));
    map.insert(101, ErrorInfo::new("Wrong number of arguments"));
    map.insert(102, ErrorInfo::new("Wrong operand or input type"));
    map.insert(
        103,
        ErrorInfo::new("Unknown function")
            .with_help("Check the function name against the registry"),
    );
    map.insert(104, ErrorInfo::new("Incompatible quantity units"));
    map.insert(105, ErrorInfo::new("Mixed zoned and unzoned temporal operands"));

    // Type system and model errors (0200-0299)
    map.insert(200, ErrorInfo::new("Unknown type identifier"));

    // Collaborator errors (0300-0399)
    map.insert(300, ErrorInfo::new("Terminology service failure"));

    map
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_zero_padded() {
        assert_eq!(FP0001.to_string(), "FP0001");
        assert_eq!(FP0100.to_string(), "FP0100");
    }

    #[test]
    fn range_predicates() {
        assert!(FP0005.is_parse_error());
        assert!(FP0100.is_evaluation_error());
        assert!(FP0200.is_model_error());
        assert!(FP0300.is_collaborator_error());
    }

    #[test]
    fn info_lookup_falls_back_for_unknown_codes() {
        assert_eq!(ErrorCode::new(999).info().description, "Unknown error");
        assert_eq!(FP0103.info().description, "Unknown function");
    }
}
