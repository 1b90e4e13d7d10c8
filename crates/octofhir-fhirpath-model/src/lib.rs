//! Node abstraction and tree model for the FHIRPath engine
//!
//! Wraps a FHIR resource (as `serde_json::Value`) into a uniform node tree
//! guided by the static type-descriptor table: resource nodes, element
//! nodes, primitive-value nodes, plus the synthetic type-info and
//! terminology-service nodes the evaluator produces. Trees are immutable
//! after construction and safe to share across evaluations.

mod node;
mod tree;

pub use node::*;
pub use tree::*;
