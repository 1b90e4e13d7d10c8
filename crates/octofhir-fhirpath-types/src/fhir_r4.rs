//! Hand-written FHIR R4 type-descriptor table
//!
//! Built once, consulted by value. Covers the system types, the FHIR
//! primitive and complex data types, and the resource types this engine is
//! exercised against. Backbone components use their structure-definition
//! names (`Bundle.Entry`, `Patient.Contact`).
//!
//! Quantity specializations (`Age`, `Distance`, `Duration`, `Count`,
//! `MoneyQuantity`, `SimpleQuantity`) are registered with `Quantity` as
//! their base; the evaluator additionally inspects the runtime unit system
//! when testing against them.

use crate::{ElementInfo, TypeEntry, TypeNamespace, TypeRegistry};
use once_cell::sync::Lazy;

static FHIR_R4_REGISTRY: Lazy<TypeRegistry> = Lazy::new(build);

pub(crate) fn registry() -> TypeRegistry {
    FHIR_R4_REGISTRY.clone()
}

fn system(registry: &mut TypeRegistry, name: &str, base: Option<&str>) {
    registry.insert(TypeEntry {
        namespace: TypeNamespace::System,
        name: name.to_string(),
        base: base.map(str::to_string),
        elements: Vec::new(),
    });
}

fn fhir(registry: &mut TypeRegistry, name: &str, base: &str, elements: Vec<ElementInfo>) {
    registry.insert(TypeEntry {
        namespace: TypeNamespace::Fhir,
        name: name.to_string(),
        base: Some(base.to_string()),
        elements,
    });
}

fn one(name: &str, type_name: &str) -> ElementInfo {
    ElementInfo::single(name, type_name)
}

fn many(name: &str, type_name: &str) -> ElementInfo {
    ElementInfo::many(name, type_name)
}

fn choice(name: &str, types: &[&str]) -> ElementInfo {
    ElementInfo::choice(name, types)
}

#[allow(clippy::too_many_lines)]
fn build() -> TypeRegistry {
    let mut r = TypeRegistry::new();

    // System namespace
    system(&mut r, "Any", None);
    for name in [
        "Boolean", "String", "Integer", "Decimal", "Date", "DateTime", "Time", "Quantity",
    ] {
        system(&mut r, name, Some("System.Any"));
    }
    system(&mut r, "TypeInfo", Some("System.Any"));
    for name in ["ClassInfo", "SimpleTypeInfo", "TupleTypeInfo"] {
        system(&mut r, name, Some("System.TypeInfo"));
    }

    // FHIR namespace roots
    r.insert(TypeEntry {
        namespace: TypeNamespace::Fhir,
        name: "Any".to_string(),
        base: None,
        elements: Vec::new(),
    });
    fhir(
        &mut r,
        "Resource",
        "FHIR.Any",
        vec![
            one("id", "id"),
            one("meta", "Meta"),
            one("implicitRules", "uri"),
            one("language", "code"),
        ],
    );
    fhir(
        &mut r,
        "DomainResource",
        "FHIR.Resource",
        vec![
            one("text", "Narrative"),
            many("contained", "Resource"),
            many("extension", "Extension"),
            many("modifierExtension", "Extension"),
        ],
    );
    fhir(
        &mut r,
        "Element",
        "FHIR.Any",
        vec![one("id", "string"), many("extension", "Extension")],
    );
    fhir(&mut r, "BackboneElement", "FHIR.Element", Vec::new());

    // FHIR primitive types all chain directly to Element
    for name in [
        "base64Binary",
        "boolean",
        "canonical",
        "code",
        "date",
        "dateTime",
        "decimal",
        "id",
        "instant",
        "integer",
        "markdown",
        "oid",
        "positiveInt",
        "string",
        "time",
        "unsignedInt",
        "uri",
        "url",
        "uuid",
        "xhtml",
    ] {
        fhir(&mut r, name, "FHIR.Element", Vec::new());
    }

    // Complex data types
    fhir(
        &mut r,
        "Address",
        "FHIR.Element",
        vec![
            one("use", "code"),
            one("type", "code"),
            one("text", "string"),
            many("line", "string"),
            one("city", "string"),
            one("district", "string"),
            one("state", "string"),
            one("postalCode", "string"),
            one("country", "string"),
            one("period", "Period"),
        ],
    );
    fhir(
        &mut r,
        "Annotation",
        "FHIR.Element",
        vec![
            choice("author", &["Reference", "string"]),
            one("time", "dateTime"),
            one("text", "markdown"),
        ],
    );
    fhir(
        &mut r,
        "Attachment",
        "FHIR.Element",
        vec![
            one("contentType", "code"),
            one("language", "code"),
            one("data", "base64Binary"),
            one("url", "url"),
            one("size", "unsignedInt"),
            one("hash", "base64Binary"),
            one("title", "string"),
            one("creation", "dateTime"),
        ],
    );
    fhir(
        &mut r,
        "CodeableConcept",
        "FHIR.Element",
        vec![many("coding", "Coding"), one("text", "string")],
    );
    fhir(
        &mut r,
        "Coding",
        "FHIR.Element",
        vec![
            one("system", "uri"),
            one("version", "string"),
            one("code", "code"),
            one("display", "string"),
            one("userSelected", "boolean"),
        ],
    );
    fhir(
        &mut r,
        "ContactPoint",
        "FHIR.Element",
        vec![
            one("system", "code"),
            one("value", "string"),
            one("use", "code"),
            one("rank", "positiveInt"),
            one("period", "Period"),
        ],
    );
    fhir(
        &mut r,
        "HumanName",
        "FHIR.Element",
        vec![
            one("use", "code"),
            one("text", "string"),
            one("family", "string"),
            many("given", "string"),
            many("prefix", "string"),
            many("suffix", "string"),
            one("period", "Period"),
        ],
    );
    fhir(
        &mut r,
        "Identifier",
        "FHIR.Element",
        vec![
            one("use", "code"),
            one("type", "CodeableConcept"),
            one("system", "uri"),
            one("value", "string"),
            one("period", "Period"),
            one("assigner", "Reference"),
        ],
    );
    fhir(
        &mut r,
        "Meta",
        "FHIR.Element",
        vec![
            one("versionId", "id"),
            one("lastUpdated", "instant"),
            one("source", "uri"),
            many("profile", "canonical"),
            many("security", "Coding"),
            many("tag", "Coding"),
        ],
    );
    fhir(
        &mut r,
        "Money",
        "FHIR.Element",
        vec![one("value", "decimal"), one("currency", "code")],
    );
    fhir(
        &mut r,
        "Narrative",
        "FHIR.Element",
        vec![one("status", "code"), one("div", "xhtml")],
    );
    fhir(
        &mut r,
        "Period",
        "FHIR.Element",
        vec![one("start", "dateTime"), one("end", "dateTime")],
    );
    let quantity_elements = || {
        vec![
            one("value", "decimal"),
            one("comparator", "code"),
            one("unit", "string"),
            one("system", "uri"),
            one("code", "code"),
        ]
    };
    fhir(&mut r, "Quantity", "FHIR.Element", quantity_elements());
    // specializations share Quantity's shape and chain to it
    for name in ["Age", "Count", "Distance", "Duration", "MoneyQuantity", "SimpleQuantity"] {
        fhir(&mut r, name, "FHIR.Quantity", quantity_elements());
    }
    fhir(
        &mut r,
        "Range",
        "FHIR.Element",
        vec![one("low", "SimpleQuantity"), one("high", "SimpleQuantity")],
    );
    fhir(
        &mut r,
        "Ratio",
        "FHIR.Element",
        vec![one("numerator", "Quantity"), one("denominator", "Quantity")],
    );
    fhir(
        &mut r,
        "Reference",
        "FHIR.Element",
        vec![
            one("reference", "string"),
            one("type", "uri"),
            one("identifier", "Identifier"),
            one("display", "string"),
        ],
    );
    fhir(
        &mut r,
        "SampledData",
        "FHIR.Element",
        vec![
            one("origin", "SimpleQuantity"),
            one("period", "decimal"),
            one("factor", "decimal"),
            one("lowerLimit", "decimal"),
            one("upperLimit", "decimal"),
            one("dimensions", "positiveInt"),
            one("data", "string"),
        ],
    );
    fhir(
        &mut r,
        "Signature",
        "FHIR.Element",
        vec![
            many("type", "Coding"),
            one("when", "instant"),
            one("who", "Reference"),
            one("onBehalfOf", "Reference"),
            one("data", "base64Binary"),
        ],
    );
    fhir(
        &mut r,
        "Timing",
        "FHIR.BackboneElement",
        vec![
            many("event", "dateTime"),
            one("code", "CodeableConcept"),
        ],
    );
    fhir(
        &mut r,
        "Extension",
        "FHIR.Element",
        vec![
            one("url", "uri"),
            choice(
                "value",
                &[
                    "base64Binary",
                    "boolean",
                    "canonical",
                    "code",
                    "date",
                    "dateTime",
                    "decimal",
                    "id",
                    "instant",
                    "integer",
                    "markdown",
                    "oid",
                    "positiveInt",
                    "string",
                    "time",
                    "unsignedInt",
                    "uri",
                    "url",
                    "uuid",
                    "Address",
                    "Annotation",
                    "Attachment",
                    "CodeableConcept",
                    "Coding",
                    "ContactPoint",
                    "HumanName",
                    "Identifier",
                    "Money",
                    "Period",
                    "Quantity",
                    "Range",
                    "Ratio",
                    "Reference",
                    "SampledData",
                    "Signature",
                    "Timing",
                ],
            ),
        ],
    );

    // Resource types
    fhir(
        &mut r,
        "Patient",
        "FHIR.DomainResource",
        vec![
            many("identifier", "Identifier"),
            one("active", "boolean"),
            many("name", "HumanName"),
            many("telecom", "ContactPoint"),
            one("gender", "code"),
            one("birthDate", "date"),
            choice("deceased", &["boolean", "dateTime"]),
            many("address", "Address"),
            one("maritalStatus", "CodeableConcept"),
            choice("multipleBirth", &["boolean", "integer"]),
            many("photo", "Attachment"),
            many("contact", "Patient.Contact"),
            many("communication", "Patient.Communication"),
            many("generalPractitioner", "Reference"),
            one("managingOrganization", "Reference"),
            many("link", "Patient.Link"),
        ],
    );
    fhir(
        &mut r,
        "Patient.Contact",
        "FHIR.BackboneElement",
        vec![
            many("relationship", "CodeableConcept"),
            one("name", "HumanName"),
            many("telecom", "ContactPoint"),
            one("address", "Address"),
            one("gender", "code"),
            one("organization", "Reference"),
            one("period", "Period"),
        ],
    );
    fhir(
        &mut r,
        "Patient.Communication",
        "FHIR.BackboneElement",
        vec![
            one("language", "CodeableConcept"),
            one("preferred", "boolean"),
        ],
    );
    fhir(
        &mut r,
        "Patient.Link",
        "FHIR.BackboneElement",
        vec![one("other", "Reference"), one("type", "code")],
    );
    fhir(
        &mut r,
        "Observation",
        "FHIR.DomainResource",
        vec![
            many("identifier", "Identifier"),
            many("basedOn", "Reference"),
            many("partOf", "Reference"),
            one("status", "code"),
            many("category", "CodeableConcept"),
            one("code", "CodeableConcept"),
            one("subject", "Reference"),
            one("encounter", "Reference"),
            choice(
                "effective",
                &["dateTime", "Period", "Timing", "instant"],
            ),
            one("issued", "instant"),
            many("performer", "Reference"),
            choice(
                "value",
                &[
                    "Quantity",
                    "CodeableConcept",
                    "string",
                    "boolean",
                    "integer",
                    "Range",
                    "Ratio",
                    "SampledData",
                    "time",
                    "dateTime",
                    "Period",
                ],
            ),
            one("dataAbsentReason", "CodeableConcept"),
            many("interpretation", "CodeableConcept"),
            many("note", "Annotation"),
            one("bodySite", "CodeableConcept"),
            one("method", "CodeableConcept"),
            one("specimen", "Reference"),
            one("device", "Reference"),
            many("referenceRange", "Observation.ReferenceRange"),
            many("hasMember", "Reference"),
            many("derivedFrom", "Reference"),
            many("component", "Observation.Component"),
        ],
    );
    fhir(
        &mut r,
        "Observation.ReferenceRange",
        "FHIR.BackboneElement",
        vec![
            one("low", "SimpleQuantity"),
            one("high", "SimpleQuantity"),
            one("type", "CodeableConcept"),
            many("appliesTo", "CodeableConcept"),
            one("age", "Range"),
            one("text", "string"),
        ],
    );
    fhir(
        &mut r,
        "Observation.Component",
        "FHIR.BackboneElement",
        vec![
            one("code", "CodeableConcept"),
            choice(
                "value",
                &[
                    "Quantity",
                    "CodeableConcept",
                    "string",
                    "boolean",
                    "integer",
                    "Range",
                    "Ratio",
                    "SampledData",
                    "time",
                    "dateTime",
                    "Period",
                ],
            ),
            one("dataAbsentReason", "CodeableConcept"),
            many("interpretation", "CodeableConcept"),
        ],
    );
    fhir(
        &mut r,
        "Organization",
        "FHIR.DomainResource",
        vec![
            many("identifier", "Identifier"),
            one("active", "boolean"),
            many("type", "CodeableConcept"),
            one("name", "string"),
            many("alias", "string"),
            many("telecom", "ContactPoint"),
            many("address", "Address"),
            one("partOf", "Reference"),
            many("endpoint", "Reference"),
        ],
    );
    fhir(
        &mut r,
        "Practitioner",
        "FHIR.DomainResource",
        vec![
            many("identifier", "Identifier"),
            one("active", "boolean"),
            many("name", "HumanName"),
            many("telecom", "ContactPoint"),
            many("address", "Address"),
            one("gender", "code"),
            one("birthDate", "date"),
        ],
    );
    fhir(
        &mut r,
        "Condition",
        "FHIR.DomainResource",
        vec![
            many("identifier", "Identifier"),
            one("clinicalStatus", "CodeableConcept"),
            one("verificationStatus", "CodeableConcept"),
            many("category", "CodeableConcept"),
            one("severity", "CodeableConcept"),
            one("code", "CodeableConcept"),
            many("bodySite", "CodeableConcept"),
            one("subject", "Reference"),
            one("encounter", "Reference"),
            choice("onset", &["dateTime", "Age", "Period", "Range", "string"]),
            choice("abatement", &["dateTime", "Age", "Period", "Range", "string"]),
            one("recordedDate", "dateTime"),
            many("note", "Annotation"),
        ],
    );
    fhir(
        &mut r,
        "Bundle",
        "FHIR.Resource",
        vec![
            one("identifier", "Identifier"),
            one("type", "code"),
            one("timestamp", "instant"),
            one("total", "unsignedInt"),
            many("link", "Bundle.Link"),
            many("entry", "Bundle.Entry"),
            one("signature", "Signature"),
        ],
    );
    fhir(
        &mut r,
        "Bundle.Link",
        "FHIR.BackboneElement",
        vec![one("relation", "string"), one("url", "uri")],
    );
    fhir(
        &mut r,
        "Bundle.Entry",
        "FHIR.BackboneElement",
        vec![
            many("link", "Bundle.Link"),
            one("fullUrl", "uri"),
            one("resource", "Resource"),
        ],
    );
    fhir(
        &mut r,
        "ValueSet",
        "FHIR.DomainResource",
        vec![
            one("url", "uri"),
            many("identifier", "Identifier"),
            one("version", "string"),
            one("name", "string"),
            one("title", "string"),
            one("status", "code"),
            one("expansion", "ValueSet.Expansion"),
        ],
    );
    fhir(
        &mut r,
        "ValueSet.Expansion",
        "FHIR.BackboneElement",
        vec![
            one("identifier", "uri"),
            one("timestamp", "dateTime"),
            one("total", "integer"),
            many("contains", "ValueSet.Contains"),
        ],
    );
    fhir(
        &mut r,
        "ValueSet.Contains",
        "FHIR.BackboneElement",
        vec![
            one("system", "uri"),
            one("version", "string"),
            one("code", "code"),
            one("display", "string"),
        ],
    );
    fhir(
        &mut r,
        "CodeSystem",
        "FHIR.DomainResource",
        vec![
            one("url", "uri"),
            one("version", "string"),
            one("name", "string"),
            one("status", "code"),
            one("content", "code"),
            many("concept", "CodeSystem.Concept"),
        ],
    );
    fhir(
        &mut r,
        "CodeSystem.Concept",
        "FHIR.BackboneElement",
        vec![
            one("code", "code"),
            one("display", "string"),
            one("definition", "string"),
            many("concept", "CodeSystem.Concept"),
        ],
    );
    fhir(
        &mut r,
        "ConceptMap",
        "FHIR.DomainResource",
        vec![
            one("url", "uri"),
            one("version", "string"),
            one("name", "string"),
            one("status", "code"),
        ],
    );
    fhir(
        &mut r,
        "Parameters",
        "FHIR.Resource",
        vec![many("parameter", "Parameters.Parameter")],
    );
    fhir(
        &mut r,
        "Parameters.Parameter",
        "FHIR.BackboneElement",
        vec![
            one("name", "string"),
            choice(
                "value",
                &[
                    "string",
                    "boolean",
                    "integer",
                    "decimal",
                    "code",
                    "uri",
                    "dateTime",
                    "Coding",
                    "CodeableConcept",
                ],
            ),
            one("resource", "Resource"),
            many("part", "Parameters.Parameter"),
        ],
    );

    r
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FhirPathType;

    #[test]
    fn table_contains_the_namespace_roots() {
        let registry = registry();
        assert!(registry.entry(&FhirPathType::system("Any")).is_some());
        assert!(registry.entry(&FhirPathType::fhir("Any")).is_some());
        assert!(registry.entry(&FhirPathType::fhir("Resource")).is_some());
    }

    #[test]
    fn backbone_components_use_structure_names() {
        let registry = registry();
        let entry = registry.entry(&FhirPathType::fhir("Bundle.Entry")).unwrap();
        assert_eq!(entry.base.as_deref(), Some("FHIR.BackboneElement"));
    }

    #[test]
    fn primitives_chain_to_element() {
        let registry = registry();
        let code = FhirPathType::fhir("code");
        assert!(registry.is_subtype_of(&code, &FhirPathType::fhir("Element")));
    }
}
