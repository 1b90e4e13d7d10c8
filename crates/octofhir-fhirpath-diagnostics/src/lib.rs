//! FHIRPath diagnostics and error handling
//!
//! This crate provides the error handling infrastructure for the FHIRPath
//! engine, including error codes, source spans, evaluation issues, and the
//! discriminated error type shared by the parser and the evaluator.

mod error;
mod error_code;
mod issue;
mod span;

pub use error::*;
pub use error_code::*;
pub use issue::*;
pub use span::*;

/// Result type for FHIRPath operations
pub type Result<T> = std::result::Result<T, FhirPathError>;
