//! Terminology functions
//!
//! `memberOf`/`subsumes`/`subsumedBy` operate on coded input nodes; the
//! remaining functions are invoked on the `%terminologies` handle. All
//! forward structured requests to the terminology collaborator and convert
//! its responses into FHIRPath values or resource nodes.

use crate::{Coding, Collection, ConceptSubsumptionOutcome, EvaluationContext, FunctionRegistry};
use octofhir_fhirpath_diagnostics::{FP0102, FhirPathError, Issue, Result};
use octofhir_fhirpath_model::{FhirPathNode, Tree};
use octofhir_fhirpath_types::SystemValue;
use serde_json::{Value as JsonValue, json};

use super::string_argument;

const UCUM_SYSTEM: &str = "http://unitsofmeasure.org";

pub(super) fn register(registry: &mut FunctionRegistry) {
    registry.register_fn("memberOf", 1, 2, member_of);
    registry.register_fn("subsumes", 1, 2, subsumes);
    registry.register_fn("subsumedBy", 1, 1, subsumed_by);
    registry.register_fn("expand", 1, 1, |ctx, input, args| {
        require_term_service(input, "expand")?;
        let Some(url) = string_argument(args, 0)? else {
            return Ok(Collection::empty());
        };
        let expansion = service(ctx)?.expand(&url)?;
        resource_node(ctx, &expansion)
    });
    registry.register_fn("lookup", 1, 1, |ctx, input, args| {
        require_term_service(input, "lookup")?;
        let Some(coding) = coding_argument(args, 0) else {
            return Ok(Collection::empty());
        };
        let parameters = service(ctx)?.lookup(&coding)?;
        resource_node(ctx, &parameters)
    });
    registry.register_fn("validateVS", 2, 2, |ctx, input, args| {
        require_term_service(input, "validateVS")?;
        let Some(url) = string_argument(args, 0)? else {
            return Ok(Collection::empty());
        };
        let Some(coding) = coding_argument(args, 1) else {
            return Ok(Collection::empty());
        };
        let outcome = service(ctx)?.validate_vs(&url, &coding)?;
        resource_node(ctx, &validation_parameters(outcome.result, outcome.message))
    });
    registry.register_fn("validateCS", 2, 2, |ctx, input, args| {
        require_term_service(input, "validateCS")?;
        let Some(url) = string_argument(args, 0)? else {
            return Ok(Collection::empty());
        };
        let Some(coding) = coding_argument(args, 1) else {
            return Ok(Collection::empty());
        };
        let outcome = service(ctx)?.validate_cs(&url, &coding)?;
        resource_node(ctx, &validation_parameters(outcome.result, outcome.message))
    });
    registry.register_fn("translate", 2, 2, |ctx, input, args| {
        require_term_service(input, "translate")?;
        let Some(url) = string_argument(args, 0)? else {
            return Ok(Collection::empty());
        };
        let Some(coding) = coding_argument(args, 1) else {
            return Ok(Collection::empty());
        };
        let parameters = service(ctx)?.translate(&url, &coding)?;
        resource_node(ctx, &parameters)
    });
}

fn member_of(
    ctx: &mut EvaluationContext,
    input: &Collection,
    args: &[Collection],
) -> Result<Collection> {
    if input.is_empty() {
        return Ok(Collection::empty());
    }
    let node = input.exactly_one()?.clone();
    let Some(url) = string_argument(args, 0)? else {
        return Ok(Collection::empty());
    };
    let strength = match args.get(1) {
        Some(_) => string_argument(args, 1)?.unwrap_or_else(|| "required".to_string()),
        None => "required".to_string(),
    };

    let cache_key = format!("memberOf|{url}|{strength}|{node}");
    if let Some(cached) = ctx.cached_function_result(&cache_key) {
        return Ok(cached);
    }

    let codings = codings_from_node(&node);
    if codings.is_empty() {
        return Ok(Collection::boolean(false));
    }
    let service = service(ctx)?;
    let mut member = false;
    for coding in &codings {
        if service.validate_vs(&url, coding)?.result {
            member = true;
            break;
        }
    }
    // a non-conforming code under a non-required binding is accepted with a
    // supplemental issue instead of failing the expression
    let result = if member {
        true
    } else {
        match strength.as_str() {
            "required" => false,
            "example" => {
                ctx.add_issue(membership_issue(&node, &url, false));
                true
            }
            _ => {
                ctx.add_issue(membership_issue(&node, &url, true));
                true
            }
        }
    };
    let result = Collection::boolean(result);
    ctx.cache_function_result(cache_key, result.clone());
    Ok(result)
}

fn membership_issue(node: &FhirPathNode, url: &str, warning: bool) -> Issue {
    let description = format!("Code '{node}' is not a member of value set '{url}'");
    let issue = if warning {
        Issue::warning("code-invalid", description)
    } else {
        Issue::information("code-invalid", description)
    };
    match node.path() {
        Some(path) => issue.with_expression(path),
        None => issue,
    }
}

fn subsumes(
    ctx: &mut EvaluationContext,
    input: &Collection,
    args: &[Collection],
) -> Result<Collection> {
    // invoked on %terminologies with two codings, or on a coded node with one
    if input.is_singleton() && matches!(input.first(), Some(FhirPathNode::TermService)) {
        if args.len() != 2 {
            return Err(FhirPathError::unexpected_argument_count(args.len(), "subsumes"));
        }
        let (Some(a), Some(b)) = (coding_argument(args, 0), coding_argument(args, 1)) else {
            return Ok(Collection::empty());
        };
        let outcome = service(ctx)?.subsumes(&a, &b)?;
        return Ok(Collection::singleton(FhirPathNode::string(outcome.code())));
    }
    let outcome = pairwise_subsumption(ctx, input, args, "subsumes")?;
    Ok(outcome.map_or_else(Collection::empty, |o| {
        Collection::boolean(matches!(
            o,
            ConceptSubsumptionOutcome::Equivalent | ConceptSubsumptionOutcome::Subsumes
        ))
    }))
}

fn subsumed_by(
    ctx: &mut EvaluationContext,
    input: &Collection,
    args: &[Collection],
) -> Result<Collection> {
    let outcome = pairwise_subsumption(ctx, input, args, "subsumedBy")?;
    Ok(outcome.map_or_else(Collection::empty, |o| {
        Collection::boolean(matches!(
            o,
            ConceptSubsumptionOutcome::Equivalent | ConceptSubsumptionOutcome::SubsumedBy
        ))
    }))
}

fn pairwise_subsumption(
    ctx: &mut EvaluationContext,
    input: &Collection,
    args: &[Collection],
    function: &str,
) -> Result<Option<ConceptSubsumptionOutcome>> {
    if args.len() != 1 {
        return Err(FhirPathError::unexpected_argument_count(args.len(), function));
    }
    if input.is_empty() {
        return Ok(None);
    }
    let left = codings_from_node(input.exactly_one()?).into_iter().next();
    let right = coding_argument(args, 0);
    let (Some(left), Some(right)) = (left, right) else {
        return Ok(None);
    };
    Ok(Some(service(ctx)?.subsumes(&left, &right)?))
}

fn require_term_service(input: &Collection, function: &str) -> Result<()> {
    if input.is_singleton() && matches!(input.first(), Some(FhirPathNode::TermService)) {
        return Ok(());
    }
    Err(FhirPathError::evaluation(
        FP0102,
        format!("Function '{function}' must be invoked on %terminologies"),
    ))
}

fn service(
    ctx: &EvaluationContext,
) -> Result<std::sync::Arc<dyn crate::TerminologyService>> {
    ctx.terminology().cloned().ok_or_else(|| {
        FhirPathError::terminology("Terminology service is not configured")
    })
}

/// Wrap a collaborator response resource into a detached node tree
fn resource_node(ctx: &EvaluationContext, resource: &JsonValue) -> Result<Collection> {
    let tree = Tree::build(ctx.registry().clone(), resource)
        .map_err(|err| FhirPathError::terminology(err.to_string()))?;
    Ok(Collection::singleton(tree.root().clone()))
}

fn validation_parameters(result: bool, message: Option<String>) -> JsonValue {
    let mut parameters = vec![json!({"name": "result", "valueBoolean": result})];
    if let Some(message) = message {
        parameters.push(json!({"name": "message", "valueString": message}));
    }
    json!({"resourceType": "Parameters", "parameter": parameters})
}

fn coding_argument(args: &[Collection], position: usize) -> Option<Coding> {
    args.get(position)
        .and_then(|arg| arg.first())
        .and_then(|node| codings_from_node(node).into_iter().next())
}

/// View a coded node as codings: a bare code/string, a Coding, every coding
/// of a CodeableConcept, or a Quantity's unit code
fn codings_from_node(node: &FhirPathNode) -> Vec<Coding> {
    match node.value() {
        Some(SystemValue::String(text)) => {
            return vec![Coding {
                code: Some(text.clone()),
                ..Coding::default()
            }];
        }
        Some(SystemValue::Quantity(quantity)) => {
            return vec![Coding {
                system: Some(UCUM_SYSTEM.to_string()),
                code: Some(quantity.unit.clone()),
                ..Coding::default()
            }];
        }
        _ => {}
    }
    let Some(object) = node.json().and_then(JsonValue::as_object) else {
        return Vec::new();
    };
    if let Some(codings) = object.get("coding").and_then(JsonValue::as_array) {
        return codings
            .iter()
            .filter_map(JsonValue::as_object)
            .map(coding_from_object)
            .collect();
    }
    if object.contains_key("code") || object.contains_key("system") {
        return vec![coding_from_object(object)];
    }
    Vec::new()
}

fn coding_from_object(object: &serde_json::Map<String, JsonValue>) -> Coding {
    let text = |key: &str| {
        object
            .get(key)
            .and_then(JsonValue::as_str)
            .map(str::to_string)
    };
    Coding {
        system: text("system"),
        version: text("version"),
        code: text("code"),
        display: text("display"),
    }
}
