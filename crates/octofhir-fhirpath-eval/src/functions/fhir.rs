//! FHIR-specific functions: extensions, primitive values, reflection and
//! reference resolution

use crate::{Collection, EvaluationContext, FunctionRegistry};
use octofhir_fhirpath_diagnostics::Result;
use octofhir_fhirpath_model::{FhirPathNode, Tree};
use octofhir_fhirpath_types::{FhirPathType, SystemValue};
use std::sync::Arc;

use super::string_argument;

pub(super) fn register(registry: &mut FunctionRegistry) {
    registry.register_fn("extension", 1, 1, |_, input, args| {
        let Some(url) = string_argument(args, 0)? else {
            return Ok(Collection::empty());
        };
        let mut result = Collection::empty();
        for node in input {
            for child in node.children() {
                if child.name() == "extension" && extension_url(child) == Some(url.as_str()) {
                    result.push(child.clone());
                }
            }
        }
        Ok(result)
    });
    registry.register_fn("hasValue", 0, 0, |_, input, _| {
        let has_value = input.is_singleton()
            && input.first().is_some_and(|node| node.value().is_some());
        Ok(Collection::boolean(has_value))
    });
    registry.register_fn("getValue", 0, 0, |_, input, _| {
        if !input.is_singleton() {
            return Ok(Collection::empty());
        }
        Ok(input
            .first()
            .and_then(FhirPathNode::value)
            .cloned()
            .map_or_else(Collection::empty, |value| {
                Collection::singleton(FhirPathNode::from_value(value))
            }))
    });
    registry.register_fn("type", 0, 0, |ctx, input, _| {
        let mut result = Collection::empty();
        for node in input {
            let ty = node.value().map_or_else(|| node.ty(), SystemValue::type_of);
            if let Some(info) = ctx.registry().type_info(&ty) {
                result.push(FhirPathNode::TypeInfo(Arc::new(info)));
            }
        }
        Ok(result)
    });
    registry.register_fn("resolve", 0, 0, |ctx, input, _| resolve(ctx, input));
    // recognized but intentionally unsupported: profile validation belongs to
    // the validator, and a conformance harness skips rather than fails here
    registry.register_fn("conformsTo", 1, 1, |_, _, _| {
        Err(octofhir_fhirpath_diagnostics::FhirPathError::unsupported(
            "conformsTo() requires profile validation",
        ))
    });
}

fn extension_url(node: &FhirPathNode) -> Option<&str> {
    node.children().iter().find_map(|child| {
        if child.name() != "url" {
            return None;
        }
        match child.value() {
            Some(SystemValue::String(url)) => Some(url.as_str()),
            _ => None,
        }
    })
}

/// Follow Reference-shaped nodes: contained fragments (both directions),
/// then bundle entries by `fullUrl`, otherwise an unresolved marker node so
/// that downstream type checks fail gracefully instead of erroring
fn resolve(ctx: &mut EvaluationContext, input: &Collection) -> Result<Collection> {
    let mut result = Collection::empty();
    for node in input {
        let Some(reference) = reference_string(node) else {
            continue;
        };
        let resolved = ctx
            .tree()
            .cloned()
            .and_then(|tree| resolve_reference(ctx, &tree, node, &reference));
        result.push(resolved.unwrap_or_else(|| FhirPathNode::unresolved(&reference)));
    }
    Ok(result)
}

fn reference_string(node: &FhirPathNode) -> Option<String> {
    if let Some(SystemValue::String(text)) = node.value() {
        return Some(text.clone());
    }
    node.json()?
        .get("reference")?
        .as_str()
        .map(str::to_string)
}

fn resolve_reference(
    ctx: &EvaluationContext,
    tree: &Arc<Tree>,
    node: &FhirPathNode,
    reference: &str,
) -> Option<FhirPathNode> {
    if let Some(fragment) = reference.strip_prefix('#') {
        return resolve_fragment(tree, node, fragment);
    }
    resolve_in_bundle(ctx, tree, reference)
}

/// Fragment references resolve within the current resource's container:
/// `#` names the container itself, `#id` a contained resource or the
/// container, in either direction
fn resolve_fragment(tree: &Arc<Tree>, node: &FhirPathNode, fragment: &str) -> Option<FhirPathNode> {
    let anchor = tree.enclosing_resource(node)?;
    let container = match tree.parent(anchor) {
        Some(parent) => tree.enclosing_resource(parent)?,
        None => anchor,
    };
    if fragment.is_empty() || resource_id(container) == Some(fragment) {
        return Some(container.clone());
    }
    container
        .children()
        .iter()
        .find(|child| {
            child.is_resource()
                && child.name() == "contained"
                && resource_id(child) == Some(fragment)
        })
        .cloned()
}

fn resolve_in_bundle(
    ctx: &EvaluationContext,
    tree: &Arc<Tree>,
    reference: &str,
) -> Option<FhirPathNode> {
    let root = tree.root();
    if root.ty() != FhirPathType::fhir("Bundle") {
        return None;
    }
    for entry in root.children().iter().filter(|c| c.name() == "entry") {
        let resource = entry
            .children()
            .iter()
            .find(|child| child.name() == "resource");
        let full_url = entry.children().iter().find_map(|child| {
            if child.name() != "fullUrl" {
                return None;
            }
            match child.value() {
                Some(SystemValue::String(url)) => Some(url.clone()),
                _ => None,
            }
        });
        let Some(resource) = resource else { continue };
        if full_url.as_deref() == Some(reference) {
            return Some(resource.clone());
        }
        // relative references resolve against the entry base when enabled
        if ctx.resolve_relative_references()
            && let Some((type_name, id)) = reference.split_once('/')
        {
            let tail_match = full_url
                .as_deref()
                .is_some_and(|url| url.ends_with(&format!("/{reference}")));
            let identity_match = resource.ty() == FhirPathType::fhir(type_name)
                && resource_id(resource) == Some(id);
            if tail_match || identity_match {
                return Some(resource.clone());
            }
        }
    }
    None
}

fn resource_id(node: &FhirPathNode) -> Option<&str> {
    node.json()?.get("id")?.as_str()
}
