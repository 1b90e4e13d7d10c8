//! Evaluation context
//!
//! Per-evaluation mutable state: the tree under evaluation, external
//! constants, accumulated issues, listeners and the terminology service
//! handle. One context serves one evaluator on one thread; the immutable
//! tree itself may be shared across contexts.

use crate::{Collection, EvaluationListener};
use indexmap::IndexMap;
use octofhir_fhirpath_diagnostics::{Issue, Result};
use octofhir_fhirpath_model::{FhirPathNode, Tree};
use octofhir_fhirpath_types::TypeRegistry;
use parking_lot::Mutex;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::Arc;

const UCUM_SYSTEM: &str = "http://unitsofmeasure.org";
const LOINC_SYSTEM: &str = "http://loinc.org";
const SCT_SYSTEM: &str = "http://snomed.info/sct";

/// A code plus its system, as exchanged with the terminology service
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Coding {
    /// Code system URI
    pub system: Option<String>,
    /// Code system version
    pub version: Option<String>,
    /// The code itself
    pub code: Option<String>,
    /// Display text
    pub display: Option<String>,
}

/// Outcome of a code validation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationOutcome {
    /// Whether the code is valid
    pub result: bool,
    /// Service-supplied explanation
    pub message: Option<String>,
}

/// Outcome of a subsumption test between two codings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConceptSubsumptionOutcome {
    Equivalent,
    Subsumes,
    SubsumedBy,
    NotSubsumed,
}

impl ConceptSubsumptionOutcome {
    /// The FHIR code for this outcome
    pub fn code(&self) -> &'static str {
        match self {
            Self::Equivalent => "equivalent",
            Self::Subsumes => "subsumes",
            Self::SubsumedBy => "subsumed-by",
            Self::NotSubsumed => "not-subsumed",
        }
    }
}

/// Synchronous terminology collaborator used by the term functions
///
/// Implementations are black boxes; errors surface as evaluation errors
/// with the collaborator's message wrapped.
pub trait TerminologyService: Send + Sync {
    /// Expand a value set to a ValueSet-shaped resource
    fn expand(&self, value_set_url: &str) -> Result<JsonValue>;

    /// Look up a coding, returning a Parameters-shaped resource
    fn lookup(&self, coding: &Coding) -> Result<JsonValue>;

    /// Validate a coding against a value set
    fn validate_vs(&self, value_set_url: &str, coding: &Coding) -> Result<ValidationOutcome>;

    /// Validate a coding against a code system
    fn validate_cs(&self, code_system_url: &str, coding: &Coding) -> Result<ValidationOutcome>;

    /// Translate a coding through a concept map, returning a
    /// Parameters-shaped resource
    fn translate(&self, concept_map_url: &str, coding: &Coding) -> Result<JsonValue>;

    /// Test the subsumption relationship between two codings
    fn subsumes(&self, a: &Coding, b: &Coding) -> Result<ConceptSubsumptionOutcome>;
}

/// The constraint whose expression is being evaluated, when the caller is a
/// validator; gives term functions access to id/severity/location context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constraint {
    /// Constraint key (e.g. `ele-1`)
    pub id: String,
    /// Severity (`error`, `warning`)
    pub severity: String,
    /// The element the constraint applies to
    pub location: String,
    /// Human description
    pub description: String,
}

/// Mutable per-evaluation state
pub struct EvaluationContext {
    tree: Option<Arc<Tree>>,
    registry: Arc<TypeRegistry>,
    external_constants: IndexMap<String, Collection>,
    issues: Vec<Issue>,
    listeners: Vec<Arc<Mutex<dyn EvaluationListener + Send>>>,
    terminology: Option<Arc<dyn TerminologyService>>,
    constraint: Option<Constraint>,
    resolve_relative_references: bool,
    function_result_cache: HashMap<String, Collection>,
}

impl EvaluationContext {
    /// A context with no tree, for stand-alone expressions
    pub fn new(registry: Arc<TypeRegistry>) -> Self {
        Self {
            tree: None,
            registry,
            external_constants: IndexMap::new(),
            issues: Vec::new(),
            listeners: Vec::new(),
            terminology: None,
            constraint: None,
            resolve_relative_references: false,
            function_result_cache: HashMap::new(),
        }
    }

    /// A context rooted in a resource; sets `%resource` and `%rootResource`
    /// to the tree root (overridable by the caller)
    pub fn for_resource(registry: Arc<TypeRegistry>, resource: &JsonValue) -> Result<Self> {
        let tree = Arc::new(Tree::build(registry.clone(), resource)?);
        Ok(Self::for_tree(registry, tree))
    }

    /// A context over a pre-built tree
    pub fn for_tree(registry: Arc<TypeRegistry>, tree: Arc<Tree>) -> Self {
        let mut ctx = Self::new(registry);
        let root = Collection::singleton(tree.root().clone());
        ctx.external_constants.insert("resource".to_string(), root.clone());
        ctx.external_constants.insert("rootResource".to_string(), root);
        ctx.tree = Some(tree);
        ctx
    }

    /// The tree under evaluation
    pub fn tree(&self) -> Option<&Arc<Tree>> {
        self.tree.as_ref()
    }

    /// The type registry
    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    /// Set an external constant
    pub fn set_external_constant(&mut self, name: impl Into<String>, nodes: Collection) {
        self.external_constants.insert(name.into(), nodes);
    }

    /// Remove an external constant
    pub fn unset_external_constant(&mut self, name: &str) {
        self.external_constants.shift_remove(name);
    }

    /// Whether an external constant is explicitly set
    pub fn has_external_constant(&self, name: &str) -> bool {
        self.external_constants.contains_key(name)
    }

    /// Resolve an external constant
    ///
    /// `%ucum`/`%loinc`/`%sct` are built-in system URIs, `%terminologies`
    /// the terminology handle, and `%ext-*`/`%vs-*` expand to HL7 canonical
    /// URL prefixes. Everything else reads the constant map; an unknown name
    /// is the empty collection.
    pub fn external_constant(&self, name: &str) -> Collection {
        match name {
            "ucum" => Collection::singleton(FhirPathNode::string(UCUM_SYSTEM)),
            "loinc" => Collection::singleton(FhirPathNode::string(LOINC_SYSTEM)),
            "sct" => Collection::singleton(FhirPathNode::string(SCT_SYSTEM)),
            "terminologies" => Collection::singleton(FhirPathNode::TermService),
            _ => {
                if let Some(rest) = name.strip_prefix("ext-") {
                    return Collection::singleton(FhirPathNode::string(format!(
                        "http://hl7.org/fhir/StructureDefinition/{rest}"
                    )));
                }
                if let Some(rest) = name.strip_prefix("vs-") {
                    return Collection::singleton(FhirPathNode::string(format!(
                        "http://hl7.org/fhir/ValueSet/{rest}"
                    )));
                }
                self.external_constants
                    .get(name)
                    .cloned()
                    .unwrap_or_else(Collection::empty)
            }
        }
    }

    /// Attach a terminology service
    pub fn set_terminology(&mut self, service: Arc<dyn TerminologyService>) {
        self.terminology = Some(service);
    }

    /// The terminology service, if configured
    pub fn terminology(&self) -> Option<&Arc<dyn TerminologyService>> {
        self.terminology.as_ref()
    }

    /// Record a supplemental issue
    pub fn add_issue(&mut self, issue: Issue) {
        self.issues.push(issue);
    }

    /// Issues accumulated so far
    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    /// Whether any issues were recorded
    pub fn has_issues(&self) -> bool {
        !self.issues.is_empty()
    }

    /// Drop all recorded issues
    pub fn clear_issues(&mut self) {
        self.issues.clear();
    }

    /// Associate the constraint under evaluation
    pub fn set_constraint(&mut self, constraint: Constraint) {
        self.constraint = Some(constraint);
    }

    /// Clear the associated constraint
    pub fn unset_constraint(&mut self) {
        self.constraint = None;
    }

    /// The constraint under evaluation, if any
    pub fn constraint(&self) -> Option<&Constraint> {
        self.constraint.as_ref()
    }

    /// Control whether `resolve()` follows relative references against
    /// bundle entries (off by default)
    pub fn set_resolve_relative_references(&mut self, enabled: bool) {
        self.resolve_relative_references = enabled;
    }

    /// Whether relative-reference resolution is enabled
    pub fn resolve_relative_references(&self) -> bool {
        self.resolve_relative_references
    }

    /// Register an evaluation listener
    pub fn add_listener(&mut self, listener: Arc<Mutex<dyn EvaluationListener + Send>>) {
        self.listeners.push(listener);
    }

    /// The registered listeners
    pub(crate) fn listeners(&self) -> &[Arc<Mutex<dyn EvaluationListener + Send>>] {
        &self.listeners
    }

    /// Cached result of an earlier identical function invocation
    pub fn cached_function_result(&self, key: &str) -> Option<Collection> {
        self.function_result_cache.get(key).cloned()
    }

    /// Cache a function result
    pub fn cache_function_result(&mut self, key: String, result: Collection) {
        self.function_result_cache.insert(key, result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ctx() -> EvaluationContext {
        EvaluationContext::new(Arc::new(TypeRegistry::fhir_r4()))
    }

    #[test]
    fn builtin_constants_resolve() {
        let ctx = ctx();
        let ucum = ctx.external_constant("ucum");
        assert_eq!(
            ucum.single_value().and_then(|v| v.as_string().map(str::to_string)),
            Some(UCUM_SYSTEM.to_string())
        );
        assert!(matches!(
            ctx.external_constant("terminologies").first(),
            Some(FhirPathNode::TermService)
        ));
    }

    #[test]
    fn prefixed_constants_expand() {
        let ctx = ctx();
        let vs = ctx.external_constant("vs-administrative-gender");
        assert_eq!(
            vs.single_value().and_then(|v| v.as_string().map(str::to_string)),
            Some("http://hl7.org/fhir/ValueSet/administrative-gender".to_string())
        );
    }

    #[test]
    fn unknown_constants_are_empty() {
        assert!(ctx().external_constant("nope").is_empty());
    }

    #[test]
    fn user_constants_override_nothing_else(){
        let mut ctx = ctx();
        ctx.set_external_constant("weight", Collection::singleton(FhirPathNode::integer(70)));
        assert_eq!(ctx.external_constant("weight").len(), 1);
        ctx.unset_external_constant("weight");
        assert!(ctx.external_constant("weight").is_empty());
    }
}
