//! Members of the FHIR base datatypes that a profile may leave undeclared.
//!
//! Profiles usually constrain `coding.code` without redeclaring `coding`, so
//! the writer needs the base shape to create missing intermediates.

/// A member inherited from a base datatype.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BaseMember {
    pub type_code: &'static str,
    pub is_array: bool,
}

const fn member(type_code: &'static str, is_array: bool) -> BaseMember {
    BaseMember {
        type_code,
        is_array,
    }
}

/// `(owner type, member name, member)` for complex datatype members.
const BASE_MEMBERS: &[(&str, &str, BaseMember)] = &[
    ("CodeableConcept", "coding", member("Coding", true)),
    ("CodeableConcept", "text", member("string", false)),
    ("Coding", "system", member("uri", false)),
    ("Coding", "version", member("string", false)),
    ("Coding", "code", member("code", false)),
    ("Coding", "display", member("string", false)),
    ("Coding", "userSelected", member("boolean", false)),
    ("CodeableReference", "concept", member("CodeableConcept", false)),
    ("CodeableReference", "reference", member("Reference", false)),
    ("Identifier", "type", member("CodeableConcept", false)),
    ("Identifier", "period", member("Period", false)),
    ("Identifier", "assigner", member("Reference", false)),
    ("Reference", "identifier", member("Identifier", false)),
    ("HumanName", "given", member("string", true)),
    ("HumanName", "prefix", member("string", true)),
    ("HumanName", "suffix", member("string", true)),
    ("HumanName", "period", member("Period", false)),
    ("Address", "line", member("string", true)),
    ("Address", "period", member("Period", false)),
    ("ContactPoint", "period", member("Period", false)),
    ("ContactDetail", "telecom", member("ContactPoint", true)),
    ("Annotation", "authorReference", member("Reference", false)),
    ("Meta", "profile", member("canonical", true)),
    ("Meta", "security", member("Coding", true)),
    ("Meta", "tag", member("Coding", true)),
    ("Timing", "event", member("dateTime", true)),
    ("Timing", "repeat", member("Element", false)),
    ("Timing", "code", member("CodeableConcept", false)),
    ("Signature", "type", member("Coding", true)),
    ("Signature", "who", member("Reference", false)),
    ("Dosage", "additionalInstruction", member("CodeableConcept", true)),
    ("Dosage", "timing", member("Timing", false)),
    ("Dosage", "route", member("CodeableConcept", false)),
    ("Dosage", "method", member("CodeableConcept", false)),
    ("Dosage", "doseAndRate", member("Element", true)),
    ("Ratio", "numerator", member("Quantity", false)),
    ("Ratio", "denominator", member("Quantity", false)),
    ("Range", "low", member("Quantity", false)),
    ("Range", "high", member("Quantity", false)),
    ("UsageContext", "code", member("Coding", false)),
];

/// Look up `name` on the base datatype `owner`.
///
/// `extension` repeats on every complex type and `modifierExtension` on
/// every backbone element, so both resolve for any complex owner.
pub fn base_member(owner: &str, name: &str) -> Option<BaseMember> {
    if let Some((_, _, found)) = BASE_MEMBERS
        .iter()
        .find(|(type_code, member, _)| *type_code == owner && *member == name)
    {
        return Some(*found);
    }
    match name {
        "extension" | "modifierExtension" if super::is_complex_type_code(owner) => {
            Some(member("Extension", true))
        }
        _ => None,
    }
}
