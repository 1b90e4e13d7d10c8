//! The FHIRPath type lattice
//!
//! Types form a single-rooted "is-a" lattice per namespace: every model type
//! has exactly one base-type chain terminating at `FHIR.Any`, and every
//! system type chains to `System.Any`. Subsumption is computed by chain walk.
//! The registry is an explicitly constructed object handed to the evaluator,
//! never a process-wide global.

use crate::{ClassInfo, ClassInfoElement, SimpleTypeInfo, TypeInfo};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Type namespaces recognized by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeNamespace {
    /// FHIRPath system primitives (`System.Boolean`, `System.String`, ...)
    System,
    /// Model types from the FHIR specification
    Fhir,
}

impl fmt::Display for TypeNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeNamespace::System => f.write_str("System"),
            TypeNamespace::Fhir => f.write_str("FHIR"),
        }
    }
}

impl TypeNamespace {
    /// Parse a namespace qualifier
    pub fn parse(text: &str) -> Option<Self> {
        match text {
            "System" => Some(TypeNamespace::System),
            "FHIR" => Some(TypeNamespace::Fhir),
            _ => None,
        }
    }
}

/// A resolved FHIRPath type: a namespace plus a name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FhirPathType {
    /// The namespace the type belongs to
    pub namespace: TypeNamespace,
    /// The type name within its namespace
    pub name: String,
}

impl FhirPathType {
    /// Create a system type handle
    pub fn system(name: impl Into<String>) -> Self {
        Self {
            namespace: TypeNamespace::System,
            name: name.into(),
        }
    }

    /// Create a FHIR model type handle
    pub fn fhir(name: impl Into<String>) -> Self {
        Self {
            namespace: TypeNamespace::Fhir,
            name: name.into(),
        }
    }

    /// Whether this is a system type
    pub fn is_system(&self) -> bool {
        self.namespace == TypeNamespace::System
    }

    /// The qualified name, e.g. `System.String`
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.namespace, self.name)
    }
}

impl fmt::Display for FhirPathType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.namespace, self.name)
    }
}

/// A single element (field) of a model type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementInfo {
    /// Logical element name (`value` for the `value[x]` choice)
    pub name: String,
    /// Declared type name, unqualified FHIR name (empty for choices)
    pub type_name: String,
    /// Whether the element repeats
    pub is_collection: bool,
    /// For choice elements, the allowed type names in declaration order
    pub choice_types: Vec<String>,
}

impl ElementInfo {
    /// A singleton element of a fixed type
    pub fn single(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            is_collection: false,
            choice_types: Vec::new(),
        }
    }

    /// A repeating element of a fixed type
    pub fn many(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            is_collection: true,
            choice_types: Vec::new(),
        }
    }

    /// A `name[x]` choice element
    pub fn choice(name: impl Into<String>, types: &[&str]) -> Self {
        Self {
            name: name.into(),
            type_name: String::new(),
            is_collection: false,
            choice_types: types.iter().map(|t| (*t).to_string()).collect(),
        }
    }

    /// Whether this is a choice element
    pub fn is_choice(&self) -> bool {
        !self.choice_types.is_empty()
    }
}

/// A type entry in the registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeEntry {
    /// Namespace of the type
    pub namespace: TypeNamespace,
    /// Type name
    pub name: String,
    /// Qualified base type name (`FHIR.DomainResource`), if any
    pub base: Option<String>,
    /// Element table; empty for system and primitive types
    pub elements: Vec<ElementInfo>,
}

/// The type-descriptor table for one model release
///
/// The table is produced once and consulted by value; no runtime
/// reflection is involved.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    types: HashMap<String, TypeEntry>,
}

impl TypeRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in FHIR R4 table plus the system types
    pub fn fhir_r4() -> Self {
        crate::fhir_r4::registry()
    }

    /// Register a type entry
    pub fn insert(&mut self, entry: TypeEntry) {
        let key = format!("{}.{}", entry.namespace, entry.name);
        self.types.insert(key, entry);
    }

    /// Look up an entry by resolved type
    pub fn entry(&self, ty: &FhirPathType) -> Option<&TypeEntry> {
        self.types.get(&ty.qualified_name())
    }

    /// Resolve a type name, optionally qualified
    ///
    /// Unqualified names are resolved leniently: the `FHIR` namespace is
    /// tried first and then `System`.
    pub fn resolve(&self, namespace: Option<&str>, name: &str) -> Option<FhirPathType> {
        match namespace {
            Some(ns) => {
                let ns = TypeNamespace::parse(ns)?;
                let ty = FhirPathType {
                    namespace: ns,
                    name: name.to_string(),
                };
                self.types.contains_key(&ty.qualified_name()).then_some(ty)
            }
            None => self
                .resolve(Some("FHIR"), name)
                .or_else(|| self.resolve(Some("System"), name)),
        }
    }

    /// The base type of a type, if any
    pub fn base_type(&self, ty: &FhirPathType) -> Option<FhirPathType> {
        let base = self.entry(ty)?.base.as_deref()?;
        let (ns, name) = base.split_once('.')?;
        Some(FhirPathType {
            namespace: TypeNamespace::parse(ns)?,
            name: name.to_string(),
        })
    }

    /// Whether `sub` is the same type as, or a subtype of, `sup`
    pub fn is_subtype_of(&self, sub: &FhirPathType, sup: &FhirPathType) -> bool {
        if sub == sup {
            return true;
        }
        // Any is the root of each namespace
        if sup.name == "Any" && sup.namespace == sub.namespace {
            return true;
        }
        let mut current = self.base_type(sub);
        while let Some(ty) = current {
            if &ty == sup {
                return true;
            }
            current = self.base_type(&ty);
        }
        false
    }

    /// The element table of a type, including inherited elements
    ///
    /// Own elements come last so shadowing (which FHIR does not use) would
    /// favor the base declaration order.
    pub fn elements(&self, ty: &FhirPathType) -> Vec<&ElementInfo> {
        let mut chain = Vec::new();
        let mut current = Some(ty.clone());
        while let Some(t) = current {
            if let Some(entry) = self.entry(&t) {
                chain.push(entry);
            }
            current = self.base_type(&t);
        }
        // base-most first, so Patient lists Resource.id before Patient.name
        chain
            .iter()
            .rev()
            .flat_map(|entry| entry.elements.iter())
            .collect()
    }

    /// Find one element by logical name, walking the base chain
    pub fn element(&self, ty: &FhirPathType, name: &str) -> Option<&ElementInfo> {
        let mut current = Some(ty.clone());
        while let Some(t) = current {
            if let Some(entry) = self.entry(&t)
                && let Some(element) = entry.elements.iter().find(|e| e.name == name)
            {
                return Some(element);
            }
            current = self.base_type(&t);
        }
        None
    }

    /// Build the reflection descriptor for a type (`type()` function)
    pub fn type_info(&self, ty: &FhirPathType) -> Option<TypeInfo> {
        let entry = self.entry(ty)?;
        if ty.is_system() {
            return Some(TypeInfo::Simple(SimpleTypeInfo {
                namespace: ty.namespace.to_string(),
                name: ty.name.clone(),
                base_type: entry.base.clone(),
            }));
        }
        let element = self
            .elements(ty)
            .into_iter()
            .map(|e| ClassInfoElement {
                name: e.name.clone(),
                type_name: if e.is_choice() {
                    e.choice_types.join(" | ")
                } else {
                    e.type_name.clone()
                },
                is_collection: e.is_collection,
            })
            .collect();
        Some(TypeInfo::Class(ClassInfo {
            namespace: ty.namespace.to_string(),
            name: ty.name.clone(),
            base_type: entry.base.clone(),
            element,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn unqualified_resolution_prefers_fhir() {
        let registry = TypeRegistry::fhir_r4();
        // "boolean" exists in FHIR; "Boolean" only in System
        assert_eq!(
            registry.resolve(None, "boolean").unwrap().namespace,
            TypeNamespace::Fhir
        );
        assert_eq!(
            registry.resolve(None, "Boolean").unwrap().namespace,
            TypeNamespace::System
        );
    }

    #[test]
    fn subsumption_walks_the_base_chain() {
        let registry = TypeRegistry::fhir_r4();
        let patient = FhirPathType::fhir("Patient");
        assert!(registry.is_subtype_of(&patient, &FhirPathType::fhir("DomainResource")));
        assert!(registry.is_subtype_of(&patient, &FhirPathType::fhir("Resource")));
        assert!(registry.is_subtype_of(&patient, &FhirPathType::fhir("Any")));
        assert!(!registry.is_subtype_of(&patient, &FhirPathType::fhir("Observation")));
    }

    #[test]
    fn inherited_elements_are_visible() {
        let registry = TypeRegistry::fhir_r4();
        let patient = FhirPathType::fhir("Patient");
        // id comes from Resource, contained from DomainResource
        assert!(registry.element(&patient, "id").is_some());
        assert!(registry.element(&patient, "contained").is_some());
        assert!(registry.element(&patient, "name").is_some());
        assert!(registry.element(&patient, "nonexistent").is_none());
    }

    #[test]
    fn choice_elements_are_marked() {
        let registry = TypeRegistry::fhir_r4();
        let observation = FhirPathType::fhir("Observation");
        let value = registry.element(&observation, "value").unwrap();
        assert!(value.is_choice());
        assert!(value.choice_types.contains(&"Quantity".to_string()));
    }

    #[test]
    fn quantity_specializations_subsume_to_quantity() {
        let registry = TypeRegistry::fhir_r4();
        for name in ["Age", "Distance", "Duration", "Count", "MoneyQuantity", "SimpleQuantity"] {
            let ty = FhirPathType::fhir(name);
            assert!(
                registry.is_subtype_of(&ty, &FhirPathType::fhir("Quantity")),
                "{name} should be a Quantity"
            );
        }
    }
}
