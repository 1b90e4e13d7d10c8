//! Collection functions: existence, subsetting, set operations, navigation

use crate::{Collection, FunctionRegistry};
use octofhir_fhirpath_diagnostics::Result;
use octofhir_fhirpath_model::FhirPathNode;
use octofhir_fhirpath_types::SystemValue;

use super::integer_argument;

pub(super) fn register(registry: &mut FunctionRegistry) {
    registry.register_fn("empty", 0, 0, |_, input, _| {
        Ok(Collection::boolean(input.is_empty()))
    });
    registry.register_fn("count", 0, 0, |_, input, _| {
        let count = i32::try_from(input.len()).unwrap_or(i32::MAX);
        Ok(Collection::singleton(FhirPathNode::integer(count)))
    });
    registry.register_fn("distinct", 0, 0, |_, input, _| Ok(distinct(input)));
    registry.register_fn("isDistinct", 0, 0, |_, input, _| {
        Ok(Collection::boolean(distinct(input).len() == input.len()))
    });
    registry.register_fn("first", 0, 0, |_, input, _| {
        Ok(input
            .first()
            .cloned()
            .map_or_else(Collection::empty, Collection::singleton))
    });
    registry.register_fn("last", 0, 0, |_, input, _| {
        Ok(input
            .iter()
            .last()
            .cloned()
            .map_or_else(Collection::empty, Collection::singleton))
    });
    registry.register_fn("tail", 0, 0, |_, input, _| {
        Ok(input.iter().skip(1).cloned().collect())
    });
    registry.register_fn("skip", 1, 1, |_, input, args| {
        let Some(count) = integer_argument(args, 0)? else {
            return Ok(Collection::empty());
        };
        let count = usize::try_from(count).unwrap_or(0);
        Ok(input.iter().skip(count).cloned().collect())
    });
    registry.register_fn("take", 1, 1, |_, input, args| {
        let Some(count) = integer_argument(args, 0)? else {
            return Ok(Collection::empty());
        };
        let count = usize::try_from(count).unwrap_or(0);
        Ok(input.iter().take(count).cloned().collect())
    });
    registry.register_fn("single", 0, 0, |_, input, _| {
        if input.is_empty() {
            return Ok(Collection::empty());
        }
        Ok(Collection::singleton(input.exactly_one()?.clone()))
    });
    registry.register_fn("combine", 1, 1, |_, input, args| {
        let mut result: Collection = input.iter().cloned().collect();
        result.extend(args[0].clone());
        Ok(result)
    });
    registry.register_fn("union", 1, 1, |_, input, args| {
        let mut result = Collection::empty();
        for node in input.iter().chain(args[0].iter()) {
            result.push_distinct(node.clone());
        }
        Ok(result)
    });
    registry.register_fn("intersect", 1, 1, |_, input, args| {
        let mut result = Collection::empty();
        for node in input {
            if args[0].contains(node) {
                result.push_distinct(node.clone());
            }
        }
        Ok(result)
    });
    registry.register_fn("exclude", 1, 1, |_, input, args| {
        Ok(input
            .iter()
            .filter(|node| !args[0].contains(node))
            .cloned()
            .collect())
    });
    registry.register_fn("subsetOf", 1, 1, |_, input, args| {
        Ok(Collection::boolean(args[0].contains_all(input)))
    });
    registry.register_fn("supersetOf", 1, 1, |_, input, args| {
        Ok(Collection::boolean(input.contains_all(&args[0])))
    });
    registry.register_fn("allTrue", 0, 0, |_, input, _| {
        Ok(Collection::boolean(booleans(input).all(|b| b)))
    });
    registry.register_fn("anyTrue", 0, 0, |_, input, _| {
        Ok(Collection::boolean(booleans(input).any(|b| b)))
    });
    registry.register_fn("allFalse", 0, 0, |_, input, _| {
        Ok(Collection::boolean(booleans(input).all(|b| !b)))
    });
    registry.register_fn("anyFalse", 0, 0, |_, input, _| {
        Ok(Collection::boolean(booleans(input).any(|b| !b)))
    });
    registry.register_fn("not", 0, 0, not);
    registry.register_fn("children", 0, 0, |_, input, _| {
        let mut result = Collection::empty();
        for node in input {
            for child in node.children() {
                result.push(child.clone());
            }
        }
        Ok(result)
    });
    registry.register_fn("descendants", 0, 0, |_, input, _| {
        let mut result = Collection::empty();
        let mut frontier: Vec<FhirPathNode> = input.iter().cloned().collect();
        while let Some(node) = frontier.pop() {
            for child in node.children() {
                result.push(child.clone());
                frontier.push(child.clone());
            }
        }
        Ok(result)
    });
}

fn distinct(input: &Collection) -> Collection {
    let mut result = Collection::empty();
    for node in input {
        result.push_distinct(node.clone());
    }
    result
}

fn booleans(input: &Collection) -> impl Iterator<Item = bool> + '_ {
    input
        .iter()
        .filter_map(|node| node.value().and_then(SystemValue::as_boolean))
}

fn not(
    _: &mut crate::EvaluationContext,
    input: &Collection,
    _: &[Collection],
) -> Result<Collection> {
    if input.is_empty() {
        return Ok(Collection::empty());
    }
    let node = input.exactly_one()?;
    Ok(node
        .value()
        .and_then(SystemValue::as_boolean)
        .map_or_else(Collection::empty, |b| Collection::boolean(!b)))
}
