//! Tree-walking evaluator and function registry for the FHIRPath engine
//!
//! The evaluator is synchronous and re-entrant: it walks the parsed AST
//! against an ordered focus collection, producing a new collection.
//! Lambda-style functions re-evaluate their argument once per input item
//! with `$this`/`$index` rebound through explicit scopes, never through
//! shared mutable state. Terminology calls block on the provider boundary.

mod collection;
mod context;
mod engine;
mod evaluator;
mod functions;
mod listener;
mod operators;
mod registry;
mod terminology;

pub use collection::*;
pub use context::*;
pub use engine::*;
pub use evaluator::*;
pub use listener::*;
pub use registry::*;
pub use terminology::*;
