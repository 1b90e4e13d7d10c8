//! The focus collection
//!
//! Evaluation works on ordered sequences of nodes. Order matters for
//! indexing and positional functions; duplicates are permitted unless a
//! function applies set semantics explicitly.

use octofhir_fhirpath_diagnostics::{FhirPathError, Result};
use octofhir_fhirpath_model::FhirPathNode;
use octofhir_fhirpath_types::{Quantity, SystemValue};
use rust_decimal::Decimal;
use smallvec::SmallVec;
use std::fmt;
use std::str::FromStr;

/// An ordered collection of nodes; most foci are singletons
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Collection(SmallVec<[FhirPathNode; 1]>);

impl Collection {
    /// The empty collection
    pub fn empty() -> Self {
        Self(SmallVec::new())
    }

    /// A collection with exactly one node
    pub fn singleton(node: FhirPathNode) -> Self {
        let mut items = SmallVec::new();
        items.push(node);
        Self(items)
    }

    /// The singleton `true`
    pub fn boolean(value: bool) -> Self {
        Self::singleton(FhirPathNode::boolean(value))
    }

    /// Number of items
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the collection is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether the collection holds exactly one item
    pub fn is_singleton(&self) -> bool {
        self.0.len() == 1
    }

    /// The first item, if any
    pub fn first(&self) -> Option<&FhirPathNode> {
        self.0.first()
    }

    /// The item at a position
    pub fn get(&self, index: usize) -> Option<&FhirPathNode> {
        self.0.get(index)
    }

    /// Iterate the items in order
    pub fn iter(&self) -> std::slice::Iter<'_, FhirPathNode> {
        self.0.iter()
    }

    /// Append an item
    pub fn push(&mut self, node: FhirPathNode) {
        self.0.push(node);
    }

    /// Append all items of another collection
    pub fn extend(&mut self, other: Collection) {
        self.0.extend(other.0);
    }

    /// Append an item unless an equal one is already present
    pub fn push_distinct(&mut self, node: FhirPathNode) {
        if !self.contains(&node) {
            self.0.push(node);
        }
    }

    /// Whether an equal item is present
    pub fn contains(&self, node: &FhirPathNode) -> bool {
        self.0.iter().any(|item| item == node)
    }

    /// Whether every item of `other` has an equal item here
    pub fn contains_all(&self, other: &Collection) -> bool {
        other.iter().all(|node| self.contains(node))
    }

    /// The single item; more than one is a contract violation
    pub fn exactly_one(&self) -> Result<&FhirPathNode> {
        match self.0.len() {
            1 => Ok(&self.0[0]),
            n => Err(FhirPathError::too_many_items(n)),
        }
    }

    /// The single system value, if the collection is a singleton value node
    pub fn single_value(&self) -> Option<&SystemValue> {
        if self.is_singleton() {
            self.0[0].value()
        } else {
            None
        }
    }

    /// The single boolean value, if that is what the collection holds
    pub fn single_boolean(&self) -> Option<bool> {
        self.single_value().and_then(SystemValue::as_boolean)
    }

    /// Whether the collection is the singleton `true`
    pub fn is_true(&self) -> bool {
        self.single_boolean() == Some(true)
    }

    /// Singleton boolean coercion for logic operators
    ///
    /// Empty is `None`; a singleton boolean is its value; any other
    /// singleton coerces to `true`; multiple items are an error.
    pub fn bool_operand(&self) -> Result<Option<bool>> {
        match self.0.len() {
            0 => Ok(None),
            1 => Ok(Some(self.single_boolean().unwrap_or(true))),
            n => Err(FhirPathError::too_many_items(n)),
        }
    }

    /// The system value of a node, deriving a quantity from Quantity-typed
    /// elements so arithmetic and comparison work on them directly
    pub fn node_value(node: &FhirPathNode) -> Option<SystemValue> {
        if let Some(value) = node.value() {
            return Some(value.clone());
        }
        quantity_from_element(node).map(SystemValue::Quantity)
    }

    /// The single operand value, if the collection is a singleton carrying
    /// (or convertible to) a system value
    pub fn single_operand(&self) -> Option<SystemValue> {
        if self.is_singleton() {
            Self::node_value(&self.0[0])
        } else {
            None
        }
    }
}

/// Read a FHIR Quantity element (value/unit/code children) as a quantity
pub fn quantity_from_element(node: &FhirPathNode) -> Option<Quantity> {
    let json = node.json()?;
    let object = json.as_object()?;
    let value = object.get("value")?;
    let value = Decimal::from_str(&value.to_string()).ok()?;
    let unit = object
        .get("code")
        .or_else(|| object.get("unit"))
        .and_then(serde_json::Value::as_str)
        .unwrap_or("1");
    Some(Quantity::new(value, unit))
}

impl FromIterator<FhirPathNode> for Collection {
    fn from_iter<I: IntoIterator<Item = FhirPathNode>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for Collection {
    type Item = FhirPathNode;
    type IntoIter = smallvec::IntoIter<[FhirPathNode; 1]>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Collection {
    type Item = &'a FhirPathNode;
    type IntoIter = std::slice::Iter<'a, FhirPathNode>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, node) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{node}")?;
        }
        f.write_str("]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn bool_operand_coerces_non_boolean_singletons() {
        assert_eq!(Collection::empty().bool_operand().unwrap(), None);
        assert_eq!(Collection::boolean(false).bool_operand().unwrap(), Some(false));
        let text = Collection::singleton(FhirPathNode::string("foo"));
        assert_eq!(text.bool_operand().unwrap(), Some(true));
    }

    #[test]
    fn bool_operand_rejects_multiple_items() {
        let mut collection = Collection::boolean(true);
        collection.push(FhirPathNode::boolean(false));
        let err = collection.bool_operand().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Input collection has 2 items, but only 1 is allowed"
        );
    }

    #[test]
    fn push_distinct_deduplicates_by_value() {
        let mut collection = Collection::empty();
        collection.push_distinct(FhirPathNode::integer(1));
        collection.push_distinct(FhirPathNode::integer(1));
        collection.push_distinct(FhirPathNode::integer(2));
        assert_eq!(collection.len(), 2);
    }
}
