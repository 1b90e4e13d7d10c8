//! End-to-end tests of the public engine surface

use octofhir_fhirpath::{EvaluationTraceListener, FhirPathEngine, FhirPathError, SystemValue};
use pretty_assertions::assert_eq;
use rstest::rstest;
use serde_json::{Value as JsonValue, json};
use std::sync::Arc;

fn observation() -> JsonValue {
    json!({
        "resourceType": "Observation",
        "id": "glucose",
        "status": "final",
        "code": {
            "coding": [{"system": "http://loinc.org", "code": "15074-8", "display": "Glucose"}]
        },
        "effectiveDateTime": "2020-04-02T10:30:10+01:00",
        "valueQuantity": {
            "value": 6.3,
            "unit": "mmol/l",
            "system": "http://unitsofmeasure.org",
            "code": "mmol/L"
        },
        "referenceRange": [{
            "low": {"value": 3.1, "system": "http://unitsofmeasure.org", "code": "mmol/L"},
            "high": {"value": 6.2, "system": "http://unitsofmeasure.org", "code": "mmol/L"}
        }]
    })
}

fn booleans(engine: &FhirPathEngine, expression: &str, resource: &JsonValue) -> Option<bool> {
    engine
        .evaluate(expression, resource)
        .unwrap()
        .single_boolean()
}

#[test]
fn choice_elements_answer_to_their_logical_name() {
    let engine = FhirPathEngine::new();
    let result = engine.evaluate("Observation.value", &observation()).unwrap();
    assert_eq!(result.len(), 1);
    assert_eq!(
        booleans(&engine, "Observation.value is Quantity", &observation()),
        Some(true)
    );
    assert_eq!(
        engine
            .evaluate("Observation.value.ofType(Quantity)", &observation())
            .unwrap()
            .len(),
        1
    );
}

#[test]
fn quantity_elements_compare_against_quantity_literals() {
    let engine = FhirPathEngine::new();
    let resource = observation();
    assert_eq!(
        booleans(&engine, "value > referenceRange.high", &resource),
        Some(true)
    );
    assert_eq!(
        booleans(&engine, "value < 10 'mmol/L'", &resource),
        Some(true)
    );
}

#[test]
fn one_context_serves_many_constraint_expressions() {
    let engine = FhirPathEngine::new();
    let mut ctx = engine.context_for(&observation()).unwrap();
    for (expression, expected) in [
        ("status.exists()", true),
        ("value.exists() or dataAbsentReason.exists()", true),
        ("code.coding.all(system.exists())", true),
        ("effective < @2021-01-01T00:00:00+01:00", true),
    ] {
        let result = engine.evaluate_with_context(&mut ctx, expression).unwrap();
        assert_eq!(result.single_boolean(), Some(expected), "{expression}");
    }
}

#[test]
fn parse_errors_are_distinguishable_from_evaluation_errors() {
    let engine = FhirPathEngine::new();
    let parse_err = engine.evaluate("1 +", &observation()).unwrap_err();
    assert!(parse_err.is_parse());

    let eval_err = engine
        .evaluate("code.coding.substring(0)", &observation())
        .unwrap_err();
    assert!(eval_err.is_evaluation());
    assert!(!eval_err.is_unsupported());
}

#[rstest]
#[case("@-1010")]
#[case("@2010:XX")]
#[case("@2010-05-32")]
#[case("@2019-10-11T29")]
#[case("@2019-10-11T01:78:00")]
fn malformed_temporal_literals_never_yield_a_value(#[case] literal: &str) {
    let engine = FhirPathEngine::new();
    let result = engine.evaluate(literal, &observation());
    assert!(result.is_err(), "{literal} must be rejected");
}

#[test]
fn mixed_zone_between_is_an_error_not_a_guess() {
    let engine = FhirPathEngine::new();
    let err = engine
        .evaluate(
            "between(@2020-01-01T00:00:00Z, @2020-06-01T00:00:00, 'days')",
            &observation(),
        )
        .unwrap_err();
    assert!(err.to_string().contains("zoned"));

    // normalizing the unzoned endpoint first is the caller's job
    let result = engine
        .evaluate(
            "between(@2020-01-01T00:00:00Z, @2020-06-01T00:00:00+00:00, 'days')",
            &observation(),
        )
        .unwrap();
    assert_eq!(result.single_value(), Some(&SystemValue::Integer(152)));
}

#[test]
fn trace_listener_explains_failing_clauses() {
    let engine = FhirPathEngine::new();
    let mut ctx = engine.context_for(&observation()).unwrap();
    let listener = Arc::new(parking_lot::Mutex::new(EvaluationTraceListener::new()));
    ctx.add_listener(listener.clone());

    let result = engine
        .evaluate_with_context(&mut ctx, "status = 'amended' and value.exists()")
        .unwrap();
    assert!(result.single_boolean() == Some(false));

    let explanation = listener.lock().explain();
    assert!(explanation.contains("'amended'"), "{explanation}");
    assert!(explanation.contains("✗"), "{explanation}");
}

#[test]
fn evaluation_is_reentrant_across_resources() {
    let engine = FhirPathEngine::new();
    let patient = json!({"resourceType": "Patient", "id": "a", "active": true});
    let other = json!({"resourceType": "Patient", "id": "b", "active": false});
    assert_eq!(booleans(&engine, "active", &patient), Some(true));
    assert_eq!(booleans(&engine, "active", &other), Some(false));
    assert_eq!(booleans(&engine, "active", &patient), Some(true));
}

#[test]
fn collections_preserve_document_order() {
    let engine = FhirPathEngine::new();
    let resource = json!({
        "resourceType": "Patient",
        "name": [
            {"given": ["one", "two"]},
            {"given": ["three"]}
        ]
    });
    let result = engine.evaluate("name.given", &resource).unwrap();
    let rendered: Vec<String> = result
        .iter()
        .filter_map(|node| node.value().map(ToString::to_string))
        .collect();
    assert_eq!(rendered, ["one", "two", "three"]);
    assert_eq!(
        result.iter().filter_map(|n| n.path()).collect::<Vec<_>>(),
        [
            "Patient.name[0].given[0]",
            "Patient.name[0].given[1]",
            "Patient.name[1].given[0]"
        ]
    );
}

#[test]
fn empty_propagates_through_operators() {
    let engine = FhirPathEngine::new();
    let resource = observation();
    let checks: [(&str, bool); 3] = [
        ("subject.display + ' suffix'", true),
        ("1 + {}", true),
        ("{} < 5", true),
    ];
    for (expression, expect_empty) in checks {
        let result = engine.evaluate(expression, &resource).unwrap();
        assert_eq!(result.is_empty(), expect_empty, "{expression}");
    }
}

#[test]
fn direct_parse_api_round_trips() {
    let ast = octofhir_fhirpath::parse("name.where(use = 'official').given").unwrap();
    let rendered = ast.to_string();
    let reparsed = octofhir_fhirpath::parse(&rendered).unwrap();
    assert_eq!(rendered, reparsed.to_string());
}

#[test]
fn errors_serialize_for_diagnostic_transport() {
    let err = FhirPathError::singleton_required();
    let json = serde_json::to_string(&err).unwrap();
    assert!(json.contains("Evaluation"));
}
