//! FHIRPath expression engine for FHIR resources
//!
//! A complete FHIRPath implementation: a Winnow-based parser, a typed node
//! tree over `serde_json` resources, a synchronous tree-walking evaluator
//! with the standard function set, partial-precision temporal semantics,
//! and terminology/resolution collaborator boundaries.
//!
//! # Example
//!
//! ```
//! use octofhir_fhirpath::FhirPathEngine;
//! use serde_json::json;
//!
//! let engine = FhirPathEngine::new();
//! let patient = json!({
//!     "resourceType": "Patient",
//!     "name": [{"family": "Chalmers", "given": ["Peter"]}]
//! });
//! let result = engine.evaluate("Patient.name.given.first()", &patient)?;
//! assert_eq!(result.len(), 1);
//! # Ok::<(), octofhir_fhirpath::FhirPathError>(())
//! ```

// Re-export all public APIs from internal crates
pub use octofhir_fhirpath_ast as ast;
pub use octofhir_fhirpath_diagnostics as diagnostics;
pub use octofhir_fhirpath_eval as eval;
pub use octofhir_fhirpath_model as model;
pub use octofhir_fhirpath_parser as parser;
pub use octofhir_fhirpath_types as types;

// Convenience re-exports
pub use octofhir_fhirpath_ast::ExpressionNode;
pub use octofhir_fhirpath_diagnostics::{FhirPathError, Issue, Result, Severity};
pub use octofhir_fhirpath_eval::{
    Collection, EvaluationContext, EvaluationListener, EvaluationTraceListener, FhirPathEngine,
    FunctionRegistry, TerminologyService,
};
pub use octofhir_fhirpath_model::{FhirPathNode, Tree};
pub use octofhir_fhirpath_parser::parse;
pub use octofhir_fhirpath_types::{FhirPathType, SystemValue, TypeRegistry};
