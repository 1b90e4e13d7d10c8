//! The function registry
//!
//! Maps function names to implementations with declared arity bounds.
//! Lambda-style functions (`where`, `select`, `exists`, `all`, `repeat`,
//! `aggregate`, `iif`, `trace`, `ofType`, `is`, `as`) are implemented in the
//! evaluator because their arguments are re-evaluated per input item; every
//! other function lives here and receives eagerly evaluated arguments.
//!
//! The registry is an explicitly constructed object owned by the engine,
//! not a process-wide singleton.

use crate::{Collection, EvaluationContext};
use octofhir_fhirpath_diagnostics::{FhirPathError, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// Implementation of a registered function
pub type FunctionImpl =
    Arc<dyn Fn(&mut EvaluationContext, &Collection, &[Collection]) -> Result<Collection> + Send + Sync>;

/// A registered function with its arity contract
#[derive(Clone)]
pub struct FunctionDef {
    name: &'static str,
    min_arity: usize,
    max_arity: usize,
    implementation: FunctionImpl,
}

impl FunctionDef {
    /// Define a function
    pub fn new(
        name: &'static str,
        min_arity: usize,
        max_arity: usize,
        implementation: FunctionImpl,
    ) -> Self {
        Self {
            name,
            min_arity,
            max_arity,
            implementation,
        }
    }

    /// The function name
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Minimum number of arguments
    pub fn min_arity(&self) -> usize {
        self.min_arity
    }

    /// Maximum number of arguments
    pub fn max_arity(&self) -> usize {
        self.max_arity
    }

    /// Invoke the function after arity checking
    pub fn apply(
        &self,
        ctx: &mut EvaluationContext,
        input: &Collection,
        args: &[Collection],
    ) -> Result<Collection> {
        if args.len() < self.min_arity || args.len() > self.max_arity {
            return Err(FhirPathError::unexpected_argument_count(args.len(), self.name));
        }
        (self.implementation)(ctx, input, args)
    }
}

/// Name-to-implementation map of built-in functions
#[derive(Clone, Default)]
pub struct FunctionRegistry {
    functions: HashMap<&'static str, FunctionDef>,
}

impl FunctionRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard FHIRPath function set
    pub fn standard() -> Self {
        let mut registry = Self::new();
        crate::functions::register_all(&mut registry);
        registry
    }

    /// Register a function, replacing any previous definition of the name
    pub fn register(&mut self, def: FunctionDef) {
        self.functions.insert(def.name, def);
    }

    /// Register from parts
    pub fn register_fn(
        &mut self,
        name: &'static str,
        min_arity: usize,
        max_arity: usize,
        implementation: impl Fn(&mut EvaluationContext, &Collection, &[Collection]) -> Result<Collection>
        + Send
        + Sync
        + 'static,
    ) {
        self.register(FunctionDef::new(
            name,
            min_arity,
            max_arity,
            Arc::new(implementation),
        ));
    }

    /// Look up a function by name
    pub fn lookup(&self, name: &str) -> Option<&FunctionDef> {
        self.functions.get(name)
    }

    /// Names of all registered functions
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.functions.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_registry_contains_the_core_set() {
        let registry = FunctionRegistry::standard();
        for name in [
            "count", "distinct", "substring", "replace", "matches", "abs", "between", "resolve",
            "memberOf", "toString", "extension",
        ] {
            assert!(registry.lookup(name).is_some(), "missing function {name}");
        }
    }

    #[test]
    fn arity_violations_use_the_stable_message() {
        let registry = FunctionRegistry::standard();
        let def = registry.lookup("substring").unwrap();
        let mut ctx = EvaluationContext::new(std::sync::Arc::new(
            octofhir_fhirpath_types::TypeRegistry::fhir_r4(),
        ));
        let err = def.apply(&mut ctx, &Collection::empty(), &[]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Unexpected number of arguments: 0 for function: 'substring'"
        );
    }
}
