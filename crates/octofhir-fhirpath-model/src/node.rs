//! The FHIRPath node model
//!
//! A closed set of node kinds with `match` dispatch. Nodes are cheap to
//! clone (shared payloads) and immutable; a focus collection is an ordered
//! sequence of these.

use octofhir_fhirpath_types::{Date, DateTime, FhirPathType, Quantity, SystemValue, Time, TypeInfo};
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;
use std::fmt;
use std::sync::Arc;

/// A node produced by tree construction or evaluation
#[derive(Debug, Clone)]
pub enum FhirPathNode {
    /// A resource instance (tree root, contained resource, bundle entry)
    Resource(Arc<ResourceNode>),
    /// A structured (non-scalar) element
    Element(Arc<ElementNode>),
    /// A scalar value: a primitive tree leaf or a computed system value
    Value(Arc<ValueNode>),
    /// A reflection descriptor produced by `type()`
    TypeInfo(Arc<TypeInfo>),
    /// The callable handle bound to `%terminologies`
    TermService,
}

/// A resource node; `resource` is `Null` for the unresolved marker produced
/// by a failed `resolve()`
#[derive(Debug)]
pub struct ResourceNode {
    /// Node name: the resource type name, or the field that held it
    pub name: String,
    /// Resolved model type
    pub ty: FhirPathType,
    /// Location in the tree; `None` for detached nodes
    pub path: Option<String>,
    /// Path of the parent node, if any
    pub parent_path: Option<String>,
    /// The raw resource JSON
    pub resource: JsonValue,
    /// Child nodes in element order
    pub children: Vec<FhirPathNode>,
}

/// A structured element node
#[derive(Debug)]
pub struct ElementNode {
    /// The field name that produced this node
    pub name: String,
    /// Resolved model type
    pub ty: FhirPathType,
    /// Location in the tree
    pub path: Option<String>,
    /// Path of the parent node
    pub parent_path: Option<String>,
    /// The raw element JSON
    pub value: JsonValue,
    /// Child nodes in element order
    pub children: Vec<FhirPathNode>,
}

/// A scalar node: a primitive tree leaf (which may still carry extension
/// children) or a computed system value with no tree location
#[derive(Debug)]
pub struct ValueNode {
    /// The field name that produced this node; empty for computed values
    pub name: String,
    /// FHIR primitive type for tree leaves, `System.*` for computed values
    pub ty: FhirPathType,
    /// Location in the tree; `None` for computed values
    pub path: Option<String>,
    /// Path of the parent node
    pub parent_path: Option<String>,
    /// The typed scalar value; absent for extension-only primitives
    pub value: Option<SystemValue>,
    /// Extension children (the primitives-carry-extensions rule)
    pub children: Vec<FhirPathNode>,
}

impl FhirPathNode {
    /// The node's name; empty for computed values and synthetic nodes
    pub fn name(&self) -> &str {
        match self {
            FhirPathNode::Resource(node) => &node.name,
            FhirPathNode::Element(node) => &node.name,
            FhirPathNode::Value(node) => &node.name,
            FhirPathNode::TypeInfo(_) | FhirPathNode::TermService => "",
        }
    }

    /// The node's resolved type
    pub fn ty(&self) -> FhirPathType {
        match self {
            FhirPathNode::Resource(node) => node.ty.clone(),
            FhirPathNode::Element(node) => node.ty.clone(),
            FhirPathNode::Value(node) => node.ty.clone(),
            FhirPathNode::TypeInfo(info) => FhirPathType::system(match info.as_ref() {
                TypeInfo::Simple(_) => "SimpleTypeInfo",
                TypeInfo::Class(_) => "ClassInfo",
                TypeInfo::Tuple(_) => "TupleTypeInfo",
            }),
            FhirPathNode::TermService => FhirPathType::system("Any"),
        }
    }

    /// The node's tree location, if it belongs to a tree
    pub fn path(&self) -> Option<&str> {
        match self {
            FhirPathNode::Resource(node) => node.path.as_deref(),
            FhirPathNode::Element(node) => node.path.as_deref(),
            FhirPathNode::Value(node) => node.path.as_deref(),
            FhirPathNode::TypeInfo(_) | FhirPathNode::TermService => None,
        }
    }

    /// The parent node's tree location
    pub fn parent_path(&self) -> Option<&str> {
        match self {
            FhirPathNode::Resource(node) => node.parent_path.as_deref(),
            FhirPathNode::Element(node) => node.parent_path.as_deref(),
            FhirPathNode::Value(node) => node.parent_path.as_deref(),
            FhirPathNode::TypeInfo(_) | FhirPathNode::TermService => None,
        }
    }

    /// The node's ordered children
    pub fn children(&self) -> &[FhirPathNode] {
        match self {
            FhirPathNode::Resource(node) => &node.children,
            FhirPathNode::Element(node) => &node.children,
            FhirPathNode::Value(node) => &node.children,
            FhirPathNode::TypeInfo(_) | FhirPathNode::TermService => &[],
        }
    }

    /// Whether the node has enumerable children
    ///
    /// Kept consistent with [`children`](Self::children) so collection
    /// functions never over- or under-count.
    pub fn has_children(&self) -> bool {
        !self.children().is_empty()
    }

    /// The scalar system value, if this node carries one
    pub fn value(&self) -> Option<&SystemValue> {
        match self {
            FhirPathNode::Value(node) => node.value.as_ref(),
            _ => None,
        }
    }

    /// Whether this is a resource node
    pub fn is_resource(&self) -> bool {
        matches!(self, FhirPathNode::Resource(_))
    }

    /// The underlying JSON of a resource or element node
    pub fn json(&self) -> Option<&JsonValue> {
        match self {
            FhirPathNode::Resource(node) => Some(&node.resource),
            FhirPathNode::Element(node) => Some(&node.value),
            _ => None,
        }
    }

    // === Computed value constructors ===

    /// Wrap a system value as a detached node
    pub fn from_value(value: SystemValue) -> Self {
        let ty = value.type_of();
        FhirPathNode::Value(Arc::new(ValueNode {
            name: String::new(),
            ty,
            path: None,
            parent_path: None,
            value: Some(value),
            children: Vec::new(),
        }))
    }

    /// A detached boolean node
    pub fn boolean(value: bool) -> Self {
        Self::from_value(SystemValue::Boolean(value))
    }

    /// A detached string node
    pub fn string(value: impl Into<String>) -> Self {
        Self::from_value(SystemValue::String(value.into()))
    }

    /// A detached integer node
    pub fn integer(value: i32) -> Self {
        Self::from_value(SystemValue::Integer(value))
    }

    /// A detached decimal node
    pub fn decimal(value: Decimal) -> Self {
        Self::from_value(SystemValue::Decimal(value))
    }

    /// A detached date node
    pub fn date(value: Date) -> Self {
        Self::from_value(SystemValue::Date(value))
    }

    /// A detached datetime node
    pub fn datetime(value: DateTime) -> Self {
        Self::from_value(SystemValue::DateTime(value))
    }

    /// A detached time node
    pub fn time(value: Time) -> Self {
        Self::from_value(SystemValue::Time(value))
    }

    /// A detached quantity node
    pub fn quantity(value: Quantity) -> Self {
        Self::from_value(SystemValue::Quantity(value))
    }

    /// The unresolved marker returned by `resolve()` when a reference cannot
    /// be followed: a resource node wrapping an absent resource
    pub fn unresolved(reference: impl Into<String>) -> Self {
        FhirPathNode::Resource(Arc::new(ResourceNode {
            name: reference.into(),
            ty: FhirPathType::fhir("Resource"),
            path: None,
            parent_path: None,
            resource: JsonValue::Null,
            children: Vec::new(),
        }))
    }
}

/// Value-based equality: scalar nodes compare by system value, structured
/// nodes by type and content. Tree position does not participate, so union
/// deduplication collapses structurally identical nodes.
impl PartialEq for FhirPathNode {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (FhirPathNode::Value(a), FhirPathNode::Value(b)) => a.value == b.value,
            (FhirPathNode::Resource(a), FhirPathNode::Resource(b)) => {
                a.ty == b.ty && a.resource == b.resource
            }
            (FhirPathNode::Element(a), FhirPathNode::Element(b)) => {
                a.ty == b.ty && a.value == b.value
            }
            (FhirPathNode::TypeInfo(a), FhirPathNode::TypeInfo(b)) => a == b,
            (FhirPathNode::TermService, FhirPathNode::TermService) => true,
            _ => false,
        }
    }
}

impl fmt::Display for FhirPathNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FhirPathNode::Value(node) => match &node.value {
                Some(value) => write!(f, "{value}"),
                None => f.write_str(node.path.as_deref().unwrap_or("")),
            },
            FhirPathNode::TypeInfo(info) => write!(f, "{info}"),
            FhirPathNode::TermService => f.write_str("%terminologies"),
            other => match other.path() {
                Some(path) => f.write_str(path),
                None => write!(f, "{}", other.ty()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn computed_values_have_system_types() {
        let node = FhirPathNode::integer(42);
        assert_eq!(node.ty(), FhirPathType::system("Integer"));
        assert_eq!(node.path(), None);
        assert!(!node.has_children());
    }

    #[test]
    fn value_nodes_compare_by_value() {
        assert_eq!(FhirPathNode::integer(1), FhirPathNode::integer(1));
        assert_ne!(FhirPathNode::integer(1), FhirPathNode::integer(2));
        assert_ne!(FhirPathNode::integer(1), FhirPathNode::string("1"));
    }

    #[test]
    fn unresolved_marker_is_a_resource_with_absent_payload() {
        let node = FhirPathNode::unresolved("Organization/xyz");
        assert!(node.is_resource());
        assert_eq!(node.json(), Some(&JsonValue::Null));
    }
}
