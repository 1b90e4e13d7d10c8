//! Tree construction over a raw FHIR resource
//!
//! The builder walks a `serde_json::Value` resource guided by the type
//! registry's element tables: each resource produces a resource node, each
//! structured field an element node, each scalar a primitive-value node
//! absorbing its `_name` extension sibling. Paths are computed during the
//! walk and are unique and deterministic; every repeating field is indexed
//! positionally even when the JSON elides the array.

use crate::{ElementNode, FhirPathNode, ResourceNode, ValueNode};
use octofhir_fhirpath_diagnostics::{FhirPathError, Result};
use octofhir_fhirpath_types::{FhirPathType, SystemValue, TypeRegistry};
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

/// An immutable node tree for one root resource
///
/// Built once per resource instance; the index gives exact-path lookup for
/// re-entering evaluation at a specific subtree.
#[derive(Debug)]
pub struct Tree {
    root: FhirPathNode,
    index: HashMap<String, FhirPathNode>,
    registry: Arc<TypeRegistry>,
}

impl Tree {
    /// Build the node tree for a resource
    pub fn build(registry: Arc<TypeRegistry>, resource: &JsonValue) -> Result<Self> {
        let mut builder = TreeBuilder {
            registry: &registry,
            index: HashMap::new(),
        };
        let root = builder.build_resource(None, None, resource)?;
        Ok(Self {
            root,
            index: builder.index,
            registry,
        })
    }

    /// The root resource node
    pub fn root(&self) -> &FhirPathNode {
        &self.root
    }

    /// Exact-path lookup
    pub fn node(&self, path: &str) -> Option<&FhirPathNode> {
        self.index.get(path)
    }

    /// The parent of a tree node
    pub fn parent(&self, node: &FhirPathNode) -> Option<&FhirPathNode> {
        self.node(node.parent_path()?)
    }

    /// The nearest resource node enclosing `node`, including itself
    pub fn enclosing_resource<'a>(&'a self, node: &'a FhirPathNode) -> Option<&'a FhirPathNode> {
        let mut current = node;
        loop {
            if current.is_resource() {
                return Some(current);
            }
            current = self.parent(current)?;
        }
    }

    /// The type registry the tree was built with
    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }
}

struct TreeBuilder<'a> {
    registry: &'a TypeRegistry,
    index: HashMap<String, FhirPathNode>,
}

impl TreeBuilder<'_> {
    fn build_resource(
        &mut self,
        field: Option<(&str, &str)>, // (field name, path)
        parent_path: Option<&str>,
        json: &JsonValue,
    ) -> Result<FhirPathNode> {
        let object = json.as_object().ok_or_else(|| {
            FhirPathError::invalid_literal("Resource value must be a JSON object")
        })?;
        let type_name = object
            .get("resourceType")
            .and_then(JsonValue::as_str)
            .ok_or_else(|| {
                FhirPathError::invalid_literal("Resource object is missing 'resourceType'")
            })?;
        let ty = self
            .registry
            .resolve(Some("FHIR"), type_name)
            .ok_or_else(|| FhirPathError::unknown_type(type_name))?;
        let (name, path) = match field {
            Some((name, path)) => (name.to_string(), path.to_string()),
            None => (type_name.to_string(), type_name.to_string()),
        };
        let children = self.build_children(&ty, object, &path)?;
        let node = FhirPathNode::Resource(Arc::new(ResourceNode {
            name,
            ty,
            path: Some(path.clone()),
            parent_path: parent_path.map(str::to_string),
            resource: json.clone(),
            children,
        }));
        self.index.insert(path, node.clone());
        Ok(node)
    }

    fn build_children(
        &mut self,
        ty: &FhirPathType,
        object: &serde_json::Map<String, JsonValue>,
        path: &str,
    ) -> Result<Vec<FhirPathNode>> {
        let registry = self.registry;
        let mut children = Vec::new();
        for element in registry.elements(ty) {
            if element.is_choice() {
                for choice_type in &element.choice_types {
                    let key = format!("{}{}", element.name, capitalize(choice_type));
                    let value = object.get(&key);
                    let sibling = object.get(&format!("_{key}"));
                    if value.is_some() || sibling.is_some() {
                        self.push_element(
                            &mut children,
                            &element.name,
                            choice_type,
                            false,
                            value,
                            sibling,
                            path,
                        )?;
                        break;
                    }
                }
            } else {
                let value = object.get(&element.name);
                let sibling = object.get(&format!("_{}", element.name));
                if value.is_some() || sibling.is_some() {
                    self.push_element(
                        &mut children,
                        &element.name,
                        &element.type_name,
                        element.is_collection,
                        value,
                        sibling,
                        path,
                    )?;
                }
            }
        }
        Ok(children)
    }

    #[allow(clippy::too_many_arguments)]
    fn push_element(
        &mut self,
        out: &mut Vec<FhirPathNode>,
        name: &str,
        declared: &str,
        is_collection: bool,
        value: Option<&JsonValue>,
        sibling: Option<&JsonValue>,
        parent_path: &str,
    ) -> Result<()> {
        if is_collection {
            let values = positional(value);
            let siblings = positional(sibling);
            let count = values.len().max(siblings.len());
            for i in 0..count {
                let path = format!("{parent_path}.{name}[{i}]");
                let node = self.build_node(
                    name,
                    declared,
                    values.get(i).copied().flatten(),
                    siblings.get(i).copied().flatten(),
                    &path,
                    parent_path,
                )?;
                out.push(node);
            }
        } else {
            let path = format!("{parent_path}.{name}");
            let node = self.build_node(name, declared, value, sibling, &path, parent_path)?;
            out.push(node);
        }
        Ok(())
    }

    fn build_node(
        &mut self,
        name: &str,
        declared: &str,
        value: Option<&JsonValue>,
        sibling: Option<&JsonValue>,
        path: &str,
        parent_path: &str,
    ) -> Result<FhirPathNode> {
        // resource-valued elements carry their actual type in the payload
        if declared == "Resource"
            && let Some(json) = value
        {
            return self.build_resource(Some((name, path)), Some(parent_path), json);
        }
        let ty = self
            .registry
            .resolve(Some("FHIR"), declared)
            .ok_or_else(|| FhirPathError::unknown_type(declared))?;

        if is_primitive_type(declared) {
            let system_value = value
                .filter(|v| !v.is_null())
                .map(|v| convert_primitive(declared, v))
                .transpose()?;
            let children = match sibling.filter(|s| !s.is_null()) {
                Some(extension_object) => {
                    let object = extension_object.as_object().ok_or_else(|| {
                        FhirPathError::invalid_literal(format!(
                            "Primitive extension for '{path}' must be a JSON object"
                        ))
                    })?;
                    self.build_children(&FhirPathType::fhir("Element"), object, path)?
                }
                None => Vec::new(),
            };
            let node = FhirPathNode::Value(Arc::new(ValueNode {
                name: name.to_string(),
                ty,
                path: Some(path.to_string()),
                parent_path: Some(parent_path.to_string()),
                value: system_value,
                children,
            }));
            self.index.insert(path.to_string(), node.clone());
            return Ok(node);
        }

        let json = value.ok_or_else(|| {
            FhirPathError::invalid_literal(format!("Missing value for element '{path}'"))
        })?;
        let object = json.as_object().ok_or_else(|| {
            FhirPathError::invalid_literal(format!(
                "Element '{path}' must be a JSON object, found {json}"
            ))
        })?;
        let children = self.build_children(&ty, object, path)?;
        let node = FhirPathNode::Element(Arc::new(ElementNode {
            name: name.to_string(),
            ty,
            path: Some(path.to_string()),
            parent_path: Some(parent_path.to_string()),
            value: json.clone(),
            children,
        }));
        self.index.insert(path.to_string(), node.clone());
        Ok(node)
    }
}

/// View a possibly-elided JSON array positionally, with nulls as gaps
fn positional(value: Option<&JsonValue>) -> Vec<Option<&JsonValue>> {
    match value {
        Some(JsonValue::Array(items)) => items
            .iter()
            .map(|item| if item.is_null() { None } else { Some(item) })
            .collect(),
        Some(JsonValue::Null) | None => Vec::new(),
        Some(single) => vec![Some(single)],
    }
}

/// FHIR primitive type names are lowercase; complex types are capitalized
fn is_primitive_type(name: &str) -> bool {
    name.chars().next().is_some_and(char::is_lowercase)
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

fn convert_primitive(declared: &str, json: &JsonValue) -> Result<SystemValue> {
    let mismatch = || {
        FhirPathError::invalid_literal(format!(
            "Value {json} is not valid for primitive type '{declared}'"
        ))
    };
    match declared {
        "boolean" => json.as_bool().map(SystemValue::Boolean).ok_or_else(mismatch),
        "integer" | "positiveInt" | "unsignedInt" => json
            .as_i64()
            .and_then(|i| i32::try_from(i).ok())
            .map(SystemValue::Integer)
            .ok_or_else(mismatch),
        "decimal" => match json {
            JsonValue::Number(number) => Decimal::from_str(&number.to_string())
                .map(SystemValue::Decimal)
                .map_err(|_| mismatch()),
            _ => Err(mismatch()),
        },
        "date" => json
            .as_str()
            .ok_or_else(mismatch)?
            .parse()
            .map(SystemValue::Date),
        "dateTime" | "instant" => json
            .as_str()
            .ok_or_else(mismatch)?
            .parse()
            .map(SystemValue::DateTime),
        "time" => json
            .as_str()
            .ok_or_else(mismatch)?
            .parse()
            .map(SystemValue::Time),
        _ => json
            .as_str()
            .map(|s| SystemValue::String(s.to_string()))
            .ok_or_else(mismatch),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
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
            "_birthDate": {
                "extension": [{
                    "url": "http://hl7.org/fhir/StructureDefinition/patient-birthTime",
                    "valueDateTime": "1974-12-25T14:35:45-05:00"
                }]
            },
            "deceasedBoolean": false,
            "contained": [
                {"resourceType": "Organization", "id": "org1", "name": "Acme"}
            ]
        })
    }

    fn build(json: &JsonValue) -> Tree {
        Tree::build(Arc::new(TypeRegistry::fhir_r4()), json).unwrap()
    }

    #[test]
    fn paths_are_positional_and_unique() {
        let tree = build(&patient());
        assert!(tree.node("Patient.name[0].given[1]").is_some());
        assert!(tree.node("Patient.name[1].given[0]").is_some());
        assert!(tree.node("Patient.name[2]").is_none());
        let given = tree.node("Patient.name[0].given[1]").unwrap();
        assert_eq!(
            given.value(),
            Some(&SystemValue::String("James".to_string()))
        );
    }

    #[test]
    fn primitive_leaves_are_typed_from_the_table() {
        let tree = build(&patient());
        let birth_date = tree.node("Patient.birthDate").unwrap();
        assert_eq!(birth_date.ty(), FhirPathType::fhir("date"));
        assert!(matches!(birth_date.value(), Some(SystemValue::Date(_))));
    }

    #[test]
    fn primitives_carry_extension_children() {
        let tree = build(&patient());
        let birth_date = tree.node("Patient.birthDate").unwrap();
        assert!(birth_date.has_children());
        assert_eq!(birth_date.children().len(), 1);
        assert_eq!(birth_date.children()[0].name(), "extension");
    }

    #[test]
    fn choice_elements_use_their_logical_name() {
        let tree = build(&patient());
        let deceased = tree.node("Patient.deceased").unwrap();
        assert_eq!(deceased.name(), "deceased");
        assert_eq!(deceased.ty(), FhirPathType::fhir("boolean"));
    }

    #[test]
    fn contained_resources_get_indexed_paths() {
        let tree = build(&patient());
        let contained = tree.node("Patient.contained[0]").unwrap();
        assert!(contained.is_resource());
        assert_eq!(contained.ty(), FhirPathType::fhir("Organization"));
    }

    #[test]
    fn parent_walk_reaches_the_enclosing_resource() {
        let tree = build(&patient());
        let given = tree.node("Patient.name[0].given[0]").unwrap();
        let enclosing = tree.enclosing_resource(given).unwrap();
        assert_eq!(enclosing.path(), Some("Patient"));
        let contained_name = tree.node("Patient.contained[0].name").unwrap();
        let enclosing = tree.enclosing_resource(contained_name).unwrap();
        assert_eq!(enclosing.path(), Some("Patient.contained[0]"));
    }

    #[test]
    fn unknown_resource_type_is_an_error() {
        let json = json!({"resourceType": "NotAType"});
        let result = Tree::build(Arc::new(TypeRegistry::fhir_r4()), &json);
        assert!(result.is_err());
    }

    #[test]
    fn malformed_primitive_is_an_error() {
        let json = json!({"resourceType": "Patient", "birthDate": "1974-13-25"});
        let result = Tree::build(Arc::new(TypeRegistry::fhir_r4()), &json);
        assert!(result.is_err());
    }
}
