//! The FHIRPath engine: parse-cache plus evaluation entry points
//!
//! Constraint checking evaluates the same small set of expressions against
//! many resource instances, so parsed ASTs are cached by source text. The
//! cache is an owned, locked object with a bounded size, not a process-wide
//! static; engines are cheap to share behind an `Arc`.

use crate::{Collection, EvaluationContext, Evaluator, FunctionRegistry, Scope};
use octofhir_fhirpath_ast::ExpressionNode;
use octofhir_fhirpath_diagnostics::Result;
use octofhir_fhirpath_model::FhirPathNode;
use octofhir_fhirpath_parser::parse;
use octofhir_fhirpath_types::{Date, DateTime, Time, TypeRegistry};
use parking_lot::Mutex;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::Arc;

const EXPRESSION_CACHE_MAX_ENTRIES: usize = 512;

/// Bounded cache of parsed expressions keyed by source text
pub struct ExpressionCache {
    max_entries: usize,
    entries: Mutex<HashMap<String, Arc<ExpressionNode>>>,
}

impl ExpressionCache {
    /// Create a cache bounded to `max_entries`
    pub fn new(max_entries: usize) -> Self {
        Self {
            max_entries,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// The cached AST for an expression, parsing on a miss
    pub fn get_or_parse(&self, expression: &str) -> Result<Arc<ExpressionNode>> {
        if let Some(ast) = self.entries.lock().get(expression) {
            return Ok(ast.clone());
        }
        let ast = Arc::new(parse(expression)?);
        let mut entries = self.entries.lock();
        if entries.len() >= self.max_entries {
            entries.clear();
        }
        entries.insert(expression.to_string(), ast.clone());
        Ok(ast)
    }

    /// Number of cached expressions
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

/// The FHIRPath evaluation engine
///
/// Owns the function registry, the type table and the expression cache.
/// Evaluation itself is synchronous; a shared engine may serve many threads
/// as long as each evaluation uses its own [`EvaluationContext`].
pub struct FhirPathEngine {
    functions: Arc<FunctionRegistry>,
    types: Arc<TypeRegistry>,
    cache: ExpressionCache,
}

impl Default for FhirPathEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl FhirPathEngine {
    /// An engine with the standard function set and the FHIR R4 type table
    pub fn new() -> Self {
        Self::with_registries(
            Arc::new(FunctionRegistry::standard()),
            Arc::new(TypeRegistry::fhir_r4()),
        )
    }

    /// An engine with custom registries
    pub fn with_registries(functions: Arc<FunctionRegistry>, types: Arc<TypeRegistry>) -> Self {
        Self {
            functions,
            types,
            cache: ExpressionCache::new(EXPRESSION_CACHE_MAX_ENTRIES),
        }
    }

    /// The function registry
    pub fn functions(&self) -> &Arc<FunctionRegistry> {
        &self.functions
    }

    /// The type registry
    pub fn types(&self) -> &Arc<TypeRegistry> {
        &self.types
    }

    /// Build an evaluation context for a resource
    pub fn context_for(&self, resource: &JsonValue) -> Result<EvaluationContext> {
        EvaluationContext::for_resource(self.types.clone(), resource)
    }

    /// Parse and evaluate an expression against a resource
    pub fn evaluate(&self, expression: &str, resource: &JsonValue) -> Result<Collection> {
        let mut ctx = self.context_for(resource)?;
        self.evaluate_with_context(&mut ctx, expression)
    }

    /// Evaluate using an existing context, starting at the tree root
    pub fn evaluate_with_context(
        &self,
        ctx: &mut EvaluationContext,
        expression: &str,
    ) -> Result<Collection> {
        let focus = ctx
            .tree()
            .map(|tree| Collection::singleton(tree.root().clone()))
            .unwrap_or_default();
        self.evaluate_against(ctx, expression, focus)
    }

    /// Evaluate using an existing context against an explicit initial focus
    pub fn evaluate_against(
        &self,
        ctx: &mut EvaluationContext,
        expression: &str,
        initial: Collection,
    ) -> Result<Collection> {
        let ast = self.cache.get_or_parse(expression)?;
        ctx.set_external_constant("context", initial.clone());
        ctx.set_external_constant(
            "now",
            Collection::singleton(FhirPathNode::datetime(DateTime::now())),
        );
        ctx.set_external_constant(
            "today",
            Collection::singleton(FhirPathNode::date(Date::today())),
        );
        ctx.set_external_constant(
            "timeOfDay",
            Collection::singleton(FhirPathNode::time(Time::time_of_day())),
        );
        Evaluator::new(&self.functions, ctx).evaluate(&ast, &initial, &Scope::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Coding, ConceptSubsumptionOutcome, TerminologyService, ValidationOutcome};
    use octofhir_fhirpath_diagnostics::Severity;
    use octofhir_fhirpath_types::SystemValue;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;

    fn patient() -> JsonValue {
        json!({
            "resourceType": "Patient",
            "id": "example",
            "active": true,
            "name": [
                {"use": "official", "family": "Chalmers", "given": ["Peter", "James"]},
                {"use": "usual", "given": ["Jim"]}
            ],
            "birthDate": "1974-12-25",
            "maritalStatus": {
                "coding": [{"system": "http://terminology.hl7.org/CodeSystem/v3-MaritalStatus", "code": "M"}]
            },
            "contained": [
                {"resourceType": "Organization", "id": "parentOrg", "name": "Acme",
                 "partOf": {"reference": "#"}}
            ],
            "managingOrganization": {"reference": "#parentOrg"},
            "generalPractitioner": [{"reference": "http://example.org/nowhere/Practitioner/p1"}]
        })
    }

    fn engine() -> FhirPathEngine {
        FhirPathEngine::new()
    }

    fn eval(expression: &str) -> Collection {
        engine().evaluate(expression, &patient()).unwrap()
    }

    fn eval_err(expression: &str) -> String {
        engine()
            .evaluate(expression, &patient())
            .unwrap_err()
            .to_string()
    }

    fn strings(collection: &Collection) -> Vec<String> {
        collection
            .iter()
            .filter_map(|node| node.value().and_then(|v| v.as_string().map(str::to_string)))
            .collect()
    }

    #[test]
    fn member_chains_flatten_in_order() {
        let result = eval("Patient.name.given");
        assert_eq!(strings(&result), ["Peter", "James", "Jim"]);
        // leading type name is optional
        assert_eq!(eval("name.given").len(), 3);
    }

    #[test]
    fn where_rebinds_the_focus_per_item() {
        let result = eval("name.where(use = 'official').family");
        assert_eq!(strings(&result), ["Chalmers"]);
        // nested lambdas must not cross-talk
        let nested = eval("name.where(given.where($this = 'Jim').exists()).use");
        assert_eq!(strings(&nested), ["usual"]);
    }

    #[test]
    fn select_projects_and_flattens() {
        assert_eq!(eval("name.select(given)").len(), 3);
    }

    #[test]
    fn index_variable_reflects_input_position() {
        let result = eval("name.given.where($index > 0)");
        assert_eq!(strings(&result), ["James", "Jim"]);
    }

    #[test]
    fn indexer_out_of_range_is_empty_not_an_error() {
        assert_eq!(eval("name.given[1]").len(), 1);
        assert!(eval("name.given[10]").is_empty());
        assert!(eval("name.given[-1]").is_empty());
    }

    #[rstest]
    #[case("true and 'foo'", Some(true))]
    #[case("true and {}", None)]
    #[case("false and {}", Some(false))]
    #[case("{} or true", Some(true))]
    #[case("{} or false", None)]
    #[case("true xor true", Some(false))]
    #[case("true xor {}", None)]
    #[case("false implies {}", Some(true))]
    #[case("{} implies true", Some(true))]
    #[case("true implies {}", None)]
    fn three_valued_logic_tables(#[case] expression: &str, #[case] expected: Option<bool>) {
        let result = eval(expression);
        match expected {
            Some(value) => assert_eq!(result.single_boolean(), Some(value), "{expression}"),
            None => assert!(result.is_empty(), "{expression} should be empty"),
        }
    }

    #[rstest]
    #[case("@1970-01-01 < @2020-01-01", Some(true))]
    #[case("@2012-04-15T15:00:00Z = @2012-04-15T10:00:00", None)]
    #[case("@2012-04-15T15:00:00.123456789 = @2012-04-15T15:00:00.123456", Some(true))]
    #[case("@2020 = @2020-05", None)]
    #[case("@2019 < @2020-05", Some(true))]
    fn temporal_comparison_follows_precision_rules(
        #[case] expression: &str,
        #[case] expected: Option<bool>,
    ) {
        let result = eval(expression);
        match expected {
            Some(value) => assert_eq!(result.single_boolean(), Some(value), "{expression}"),
            None => assert!(result.is_empty(), "{expression} should be empty"),
        }
    }

    #[test]
    fn between_computes_signed_whole_years() {
        let result = eval("between(@1970-01-01, @2020-01-01, 'years')");
        assert_eq!(result.single_value(), Some(&SystemValue::Integer(50)));
        let reversed = eval("between(@2020-01-01, @1970-01-01, 'years')");
        assert_eq!(reversed.single_value(), Some(&SystemValue::Integer(-50)));
    }

    #[test]
    fn string_function_contract_messages_are_stable() {
        assert_eq!(
            eval_err("name.given.substring(1)"),
            "Input collection must not contain more than one item"
        );
        assert_eq!(
            eval_err("birthDate.substring(1)"),
            "Input collection item must be of type String, but found 'Date'"
        );
    }

    #[test]
    fn arity_violations_are_reported() {
        assert_eq!(
            eval_err("name.where(a, b)"),
            "Unexpected number of arguments: 2 for function: 'where'"
        );
    }

    #[test]
    fn unknown_functions_are_reported() {
        assert_eq!(eval_err("name.frobnicate()"), "Function: 'frobnicate' not found");
    }

    #[test]
    fn unsupported_operations_signal_distinctly() {
        let err = engine()
            .evaluate("conformsTo('http://example.org/profile')", &patient())
            .unwrap_err();
        assert!(err.is_unsupported(), "harness must be able to skip: {err}");
    }

    #[test]
    fn repeat_collects_all_nesting_levels() {
        let code_system = json!({
            "resourceType": "CodeSystem",
            "status": "active",
            "content": "complete",
            "concept": [
                {"code": "a", "concept": [{"code": "a1", "concept": [{"code": "a2"}]}]},
                {"code": "b", "concept": [{"code": "b1", "concept": [{"code": "b2"}]}]}
            ]
        });
        let result = engine().evaluate("repeat(concept)", &code_system).unwrap();
        assert_eq!(result.len(), 6);
        // single-level select only reaches the top level
        let shallow = engine().evaluate("select(concept)", &code_system).unwrap();
        assert_eq!(shallow.len(), 2);
    }

    #[test]
    fn union_deduplicates_by_value() {
        assert_eq!(eval("name.given | name.given").len(), 3);
        assert_eq!(eval("1 | 2 | 1").len(), 2);
    }

    #[test]
    fn type_test_and_cast() {
        assert!(eval("birthDate is Date").is_true());
        assert!(eval("name[0] is HumanName").is_true());
        assert!(eval("name[0] is FHIR.HumanName").is_true());
        assert!(eval("active is System.Boolean").is_true());
        // a failed cast is empty, not false and not an error
        assert!(eval("birthDate as Quantity").is_empty());
        assert_eq!(eval("name[0].family as String").len(), 1);
        // is on the empty collection is false
        assert_eq!(eval("{} is Quantity").single_boolean(), Some(false));
    }

    #[test]
    fn is_requires_a_singleton() {
        assert_eq!(
            eval_err("name.given is String"),
            "Input collection has 3 items, but only 1 is allowed"
        );
    }

    #[test]
    fn of_type_filters_by_runtime_type() {
        assert_eq!(eval("name.given.ofType(String)").len(), 3);
        assert!(eval("name.given.ofType(Integer)").is_empty());
    }

    #[test]
    fn type_descriptors_compare_structurally() {
        assert!(eval("name[0].type() = name[1].type()").is_true());
        assert_eq!(
            eval("name[0].type() = birthDate.type()").single_boolean(),
            Some(false)
        );
    }

    #[test]
    fn external_constants_resolve() {
        assert_eq!(strings(&eval("%resource.id")), ["example"]);
        assert_eq!(
            strings(&eval("%ucum")),
            ["http://unitsofmeasure.org"]
        );
        assert_eq!(
            strings(&eval("%vs-administrative-gender")),
            ["http://hl7.org/fhir/ValueSet/administrative-gender"]
        );
        assert!(eval("%undefinedConstant").is_empty());
    }

    #[test]
    fn aggregate_threads_the_total() {
        let result = eval("(1 | 2 | 3).aggregate($total + $this, 0)");
        assert_eq!(result.single_value(), Some(&SystemValue::Integer(6)));
    }

    #[test]
    fn iif_branches_on_the_criterion() {
        assert_eq!(strings(&eval("iif(active, 'yes', 'no')")), ["yes"]);
        assert!(eval("iif({}, 'yes')").is_empty());
        assert!(eval_err("iif(5, 'yes', 'no')").contains("criterion"));
    }

    #[test]
    fn fragment_resolution_is_bidirectional() {
        // container -> contained
        let result = eval("managingOrganization.resolve()");
        assert_eq!(result.len(), 1);
        assert!(eval("managingOrganization.resolve() is Organization").is_true());
        assert_eq!(strings(&eval("managingOrganization.resolve().name")), ["Acme"]);
        // contained -> container via a bare '#'
        let container = eval("contained[0].partOf.resolve()");
        assert_eq!(container.len(), 1);
        assert!(eval("contained[0].partOf.resolve() is Patient").is_true());
    }

    #[test]
    fn unresolvable_references_yield_a_marker_node() {
        let result = eval("generalPractitioner.resolve()");
        assert_eq!(result.len(), 1, "marker node expected, not empty");
        // type checks against the marker fail gracefully
        assert!(!eval("generalPractitioner.resolve() is Practitioner").is_true());
    }

    #[test]
    fn bundle_entries_resolve_by_full_url() {
        let bundle = json!({
            "resourceType": "Bundle",
            "type": "collection",
            "entry": [
                {"fullUrl": "http://example.org/fhir/Organization/org1",
                 "resource": {"resourceType": "Organization", "id": "org1", "name": "Acme"}},
                {"fullUrl": "http://example.org/fhir/Patient/p1",
                 "resource": {"resourceType": "Patient", "id": "p1",
                              "managingOrganization": {"reference": "http://example.org/fhir/Organization/org1"}}}
            ]
        });
        let engine = engine();
        let absolute = engine
            .evaluate("entry[1].resource.managingOrganization.resolve().name", &bundle)
            .unwrap();
        assert_eq!(strings(&absolute), ["Acme"]);

        // relative references only resolve when the context allows it
        let bundle_with_relative = json!({
            "resourceType": "Bundle",
            "type": "collection",
            "entry": [
                {"fullUrl": "http://example.org/fhir/Organization/org1",
                 "resource": {"resourceType": "Organization", "id": "org1", "name": "Acme"}},
                {"fullUrl": "http://example.org/fhir/Patient/p1",
                 "resource": {"resourceType": "Patient", "id": "p1",
                              "managingOrganization": {"reference": "Organization/org1"}}}
            ]
        });
        let mut ctx = engine.context_for(&bundle_with_relative).unwrap();
        ctx.set_resolve_relative_references(true);
        let relative = engine
            .evaluate_with_context(
                &mut ctx,
                "entry[1].resource.managingOrganization.resolve().name",
            )
            .unwrap();
        assert_eq!(strings(&relative), ["Acme"]);
    }

    #[test]
    fn quantity_arithmetic_and_comparison() {
        assert!(eval("4 'mg' + 3 'mg' = 7 'mg'").is_true());
        assert!(eval("4 'mg' < 5 'mg'").is_true());
        assert!(eval("4 'mg' = 4 'mL'").is_empty());
        assert!(eval_err("4 'mg' + 3 'mL'").contains("Incompatible units"));
    }

    #[test]
    fn arithmetic_follows_fhirpath_rules() {
        assert_eq!(eval("1 + 2 * 3").single_value(), Some(&SystemValue::Integer(7)));
        assert_eq!(eval("7 div 2").single_value(), Some(&SystemValue::Integer(3)));
        assert_eq!(eval("7 mod 2").single_value(), Some(&SystemValue::Integer(1)));
        assert!(eval("1 / 0").is_empty());
        assert_eq!(strings(&eval("'a' + 'b'")), ["ab"]);
        assert_eq!(strings(&eval("'a' & {}")), ["a"]);
        assert!(eval("'a' + {}").is_empty());
        assert!(eval_err("'a' - 'b'").contains("Invalid argument(s)"));
    }

    #[test]
    fn temporal_plus_quantity_shifts_the_value() {
        assert!(eval("@2020-01-31 + 1 month = @2020-02-29").is_true());
        assert!(eval("@2020-01-01 - 1 day = @2019-12-31").is_true());
    }

    #[test]
    fn existence_functions() {
        assert!(eval("name.exists()").is_true());
        assert!(eval("name.exists(use = 'official')").is_true());
        assert!(!eval("name.exists(use = 'nickname')").is_true());
        assert!(eval("name.all(given.exists())").is_true());
        assert!(eval("telecom.empty()").is_true());
        assert_eq!(eval("name.count()").single_value(), Some(&SystemValue::Integer(2)));
    }

    #[test]
    fn distinct_and_subsetting() {
        assert_eq!(eval("name.given.distinct()").len(), 3);
        assert!(eval("name.given.isDistinct()").is_true());
        assert_eq!(strings(&eval("name.given.first()")), ["Peter"]);
        assert_eq!(strings(&eval("name.given.last()")), ["Jim"]);
        assert_eq!(eval("name.given.tail()").len(), 2);
        assert_eq!(eval("name.given.skip(1).take(1)").len(), 1);
        assert_eq!(eval("name.given.intersect('Jim' | 'Peter')").len(), 2);
        assert_eq!(strings(&eval("name.given.exclude('Jim' | 'Peter')")), ["James"]);
    }

    #[test]
    fn membership_operators() {
        assert!(eval("'Jim' in name.given").is_true());
        assert!(!eval("'Bob' in name.given").is_true());
        assert!(eval("name.given contains 'James'").is_true());
        assert!(eval("{} in name.given").is_empty());
    }

    struct FakeTerminology;

    impl TerminologyService for FakeTerminology {
        fn expand(&self, value_set_url: &str) -> octofhir_fhirpath_diagnostics::Result<JsonValue> {
            Ok(json!({
                "resourceType": "ValueSet",
                "url": value_set_url,
                "status": "active",
                "expansion": {"total": 1, "contains": [
                    {"system": "http://example.org/cs", "code": "a", "display": "Alpha"}
                ]}
            }))
        }

        fn lookup(&self, coding: &Coding) -> octofhir_fhirpath_diagnostics::Result<JsonValue> {
            Ok(json!({
                "resourceType": "Parameters",
                "parameter": [
                    {"name": "display", "valueString": format!("Display of {}", coding.code.as_deref().unwrap_or(""))}
                ]
            }))
        }

        fn validate_vs(
            &self,
            _value_set_url: &str,
            coding: &Coding,
        ) -> octofhir_fhirpath_diagnostics::Result<ValidationOutcome> {
            Ok(ValidationOutcome {
                result: coding.code.as_deref() == Some("M"),
                message: None,
            })
        }

        fn validate_cs(
            &self,
            _code_system_url: &str,
            coding: &Coding,
        ) -> octofhir_fhirpath_diagnostics::Result<ValidationOutcome> {
            Ok(ValidationOutcome {
                result: coding.code.as_deref() == Some("M"),
                message: None,
            })
        }

        fn translate(
            &self,
            _concept_map_url: &str,
            _coding: &Coding,
        ) -> octofhir_fhirpath_diagnostics::Result<JsonValue> {
            Ok(json!({
                "resourceType": "Parameters",
                "parameter": [{"name": "result", "valueBoolean": true}]
            }))
        }

        fn subsumes(
            &self,
            a: &Coding,
            b: &Coding,
        ) -> octofhir_fhirpath_diagnostics::Result<ConceptSubsumptionOutcome> {
            Ok(if a.code == b.code {
                ConceptSubsumptionOutcome::Equivalent
            } else {
                ConceptSubsumptionOutcome::NotSubsumed
            })
        }
    }

    fn terminology_ctx(engine: &FhirPathEngine) -> EvaluationContext {
        let mut ctx = engine.context_for(&patient()).unwrap();
        ctx.set_terminology(Arc::new(FakeTerminology));
        ctx
    }

    #[test]
    fn member_of_validates_against_the_value_set() {
        let engine = engine();
        let mut ctx = terminology_ctx(&engine);
        let result = engine
            .evaluate_with_context(
                &mut ctx,
                "maritalStatus.memberOf('http://example.org/vs')",
            )
            .unwrap();
        assert!(result.is_true());
        assert!(!ctx.has_issues());
    }

    #[test]
    fn member_of_accepts_non_required_bindings_with_an_issue() {
        let engine = engine();
        let mut ctx = terminology_ctx(&engine);
        let result = engine
            .evaluate_with_context(
                &mut ctx,
                "gender.memberOf('http://example.org/vs', 'extensible')",
            )
            .unwrap();
        // no gender in the fixture: empty input stays empty, no issue
        assert!(result.is_empty());

        let result = engine
            .evaluate_with_context(
                &mut ctx,
                "name[0].use.memberOf('http://example.org/vs', 'extensible')",
            )
            .unwrap();
        assert!(result.is_true());
        assert!(ctx.has_issues());
        assert_eq!(ctx.issues()[0].severity, Severity::Warning);
    }

    #[test]
    fn terminology_handle_functions() {
        let engine = engine();
        let mut ctx = terminology_ctx(&engine);
        let expansion = engine
            .evaluate_with_context(
                &mut ctx,
                "%terminologies.expand('http://example.org/vs').expansion.contains.code",
            )
            .unwrap();
        assert_eq!(strings(&expansion), ["a"]);

        let validated = engine
            .evaluate_with_context(
                &mut ctx,
                "%terminologies.validateVS('http://example.org/vs', maritalStatus)\
                 .parameter.where(name = 'result').value",
            )
            .unwrap();
        assert!(validated.is_true());

        let subsumption = engine
            .evaluate_with_context(
                &mut ctx,
                "maritalStatus.subsumedBy(maritalStatus)",
            )
            .unwrap();
        assert!(subsumption.is_true());
    }

    #[test]
    fn literal_round_trip_through_to_string() {
        for literal in [
            "true",
            "42",
            "4.5",
            "'text'",
            "@2020-01-01",
            "@2012-04-15T15:00:00Z",
            "@T14:30:00",
        ] {
            let expression = format!("{literal}.toString().toString()");
            let engine = engine();
            let first = engine.evaluate(&expression, &patient()).unwrap();
            let second = engine
                .evaluate(&format!("{literal}.toString()"), &patient())
                .unwrap();
            assert_eq!(strings(&first), strings(&second), "{literal}");
        }
    }

    #[test]
    fn expression_cache_reuses_parsed_asts() {
        let engine = engine();
        let resource = patient();
        engine.evaluate("name.given.count()", &resource).unwrap();
        engine.evaluate("name.given.count()", &resource).unwrap();
        assert_eq!(engine.cache.len(), 1);
    }

    #[test]
    fn listener_observes_without_affecting_results() {
        use crate::EvaluationTraceListener;
        let engine = engine();
        let mut ctx = engine.context_for(&patient()).unwrap();
        let listener = Arc::new(Mutex::new(EvaluationTraceListener::new()));
        ctx.add_listener(listener.clone());
        let with_listener = engine
            .evaluate_with_context(&mut ctx, "name.where(use = 'official').exists()")
            .unwrap();
        let without = eval("name.where(use = 'official').exists()");
        assert_eq!(with_listener.is_true(), without.is_true());
        assert!(listener.lock().root().is_some());
    }
}
