//! Reflection descriptors returned by the `type()` function
//!
//! Descriptors compare structurally: two `ClassInfo` values are equal when
//! their names, bases and element lists are equal, regardless of where they
//! were built.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The structural description of a type, as exposed to expressions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeInfo {
    /// A system primitive type
    Simple(SimpleTypeInfo),
    /// A model class type with named elements
    Class(ClassInfo),
    /// An anonymous tuple type
    Tuple(TupleTypeInfo),
}

impl TypeInfo {
    /// The descriptor's type name as written in expressions
    pub fn name(&self) -> &str {
        match self {
            TypeInfo::Simple(info) => &info.name,
            TypeInfo::Class(info) => &info.name,
            TypeInfo::Tuple(_) => "Tuple",
        }
    }

    /// The descriptor's namespace
    pub fn namespace(&self) -> &str {
        match self {
            TypeInfo::Simple(info) => &info.namespace,
            TypeInfo::Class(info) => &info.namespace,
            TypeInfo::Tuple(_) => "System",
        }
    }
}

/// Descriptor for a system primitive type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimpleTypeInfo {
    /// Namespace, `System`
    pub namespace: String,
    /// Type name
    pub name: String,
    /// Qualified base type name
    pub base_type: Option<String>,
}

/// Descriptor for a model class type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassInfo {
    /// Namespace, `FHIR`
    pub namespace: String,
    /// Class name
    pub name: String,
    /// Qualified base type name
    pub base_type: Option<String>,
    /// Elements in declaration order, inherited first
    pub element: Vec<ClassInfoElement>,
}

/// One element of a class descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassInfoElement {
    /// Element name
    pub name: String,
    /// Declared type name; choices join their alternatives with ` | `
    pub type_name: String,
    /// Whether the element repeats
    pub is_collection: bool,
}

/// Descriptor for an anonymous tuple type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TupleTypeInfo {
    /// Tuple elements in declaration order
    pub element: Vec<ClassInfoElement>,
}

impl fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeInfo::Simple(info) => write!(f, "{}.{}", info.namespace, info.name),
            TypeInfo::Class(info) => write!(f, "{}.{}", info.namespace, info.name),
            TypeInfo::Tuple(info) => {
                f.write_str("Tuple {")?;
                for (i, element) in info.element.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", element.name, element.type_name)?;
                }
                f.write_str("}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_info_equality_is_structural() {
        let build = || {
            TypeInfo::Class(ClassInfo {
                namespace: "FHIR".to_string(),
                name: "Coding".to_string(),
                base_type: Some("FHIR.Element".to_string()),
                element: vec![ClassInfoElement {
                    name: "code".to_string(),
                    type_name: "code".to_string(),
                    is_collection: false,
                }],
            })
        };
        assert_eq!(build(), build());
    }
}
