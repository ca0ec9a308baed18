use octofhir_fhirschema_defaults::*;
use serde_json::{Value, json};

pub const LOINC: &str = "http://loinc.org";
pub const UCUM: &str = "http://unitsofmeasure.org";
pub const CATEGORY_SYSTEM: &str = "http://terminology.hl7.org/CodeSystem/observation-category";
pub const VITAL_SIGNS_URL: &str = "http://hl7.org/fhir/StructureDefinition/vitalsigns";
pub const BLOOD_PRESSURE_URL: &str = "http://hl7.org/fhir/StructureDefinition/bp";

#[allow(dead_code)]
pub fn coding(system: &str, code: &str) -> Value {
    json!({"coding": [{"system": system, "code": code}]})
}

#[allow(dead_code)]
pub fn category(code: &str) -> Value {
    coding(CATEGORY_SYSTEM, code)
}

#[allow(dead_code)]
pub fn category_slicing() -> SlicingRules {
    SlicingRules::new()
        .with_discriminator(Discriminator::new(DiscriminatorType::Value, "coding.code"))
        .with_slice(
            SliceDefinition::new("VSCat")
                .with_cardinality(1, Some(1))
                .with_type(ElementType::new("CodeableConcept"))
                .with_pattern(TaggedValue::new("CodeableConcept", category("vital-signs"))),
        )
}

/// Observation profile requiring a vital-signs category and fixing the
/// Quantity system.
#[allow(dead_code)]
pub fn vital_signs_schema() -> TypeSchema {
    TypeSchema::new("Observation")
        .with_url(VITAL_SIGNS_URL)
        .with_name("observation-vitalsigns")
        .with_element(
            "status",
            ElementSpec::new("code")
                .with_cardinality(1, Some(1))
                .with_fixed(TaggedValue::new("code", json!("final"))),
        )
        .with_element(
            "category",
            ElementSpec::new("CodeableConcept")
                .array()
                .with_slicing(category_slicing()),
        )
        .with_element(
            "value[x]",
            ElementSpec::new("Quantity")
                .with_type(ElementType::new("CodeableConcept"))
                .with_type(ElementType::new("string")),
        )
        .with_element(
            "value[x].system",
            ElementSpec::new("uri").with_fixed(TaggedValue::new("uri", json!(UCUM))),
        )
}

/// Observation whose vital-signs category slice fixes only `coding.code`,
/// leaving `coding` to the CodeableConcept base type.
#[allow(dead_code)]
pub fn category_code_schema() -> TypeSchema {
    let slicing = SlicingRules::new()
        .with_discriminator(Discriminator::new(DiscriminatorType::Value, "coding.code"))
        .with_slice(
            SliceDefinition::new("vital-signs")
                .with_cardinality(1, None)
                .with_element(
                    "coding.code",
                    ElementSpec::new("code")
                        .with_fixed(TaggedValue::new("code", json!("vital-signs"))),
                ),
        );

    TypeSchema::new("Observation").with_element(
        "category",
        ElementSpec::new("CodeableConcept")
            .array()
            .with_cardinality(0, None)
            .with_slicing(slicing),
    )
}

/// CodeableConcept with a required `coding` slice and no discriminators.
#[allow(dead_code)]
pub fn undiscriminated_coding_schema() -> TypeSchema {
    let slicing = SlicingRules::new().with_slice(
        SliceDefinition::new("default")
            .with_cardinality(1, None)
            .with_pattern(TaggedValue::new("Coding", json!({"system": "http://x"}))),
    );

    TypeSchema::new("CodeableConcept").with_element(
        "coding",
        ElementSpec::new("Coding").array().with_slicing(slicing),
    )
}

fn component_slice(name: &str, code: &str) -> SliceDefinition {
    SliceDefinition::new(name)
        .with_cardinality(1, Some(1))
        .with_type(ElementType::new("BackboneElement"))
        .with_element(
            "code",
            ElementSpec::new("CodeableConcept")
                .with_cardinality(1, Some(1))
                .with_pattern(TaggedValue::new("CodeableConcept", coding(LOINC, code))),
        )
        .with_element(
            "value[x]",
            ElementSpec::new("Quantity").with_cardinality(1, Some(1)),
        )
        .with_element(
            "value[x].system",
            ElementSpec::new("uri").with_fixed(TaggedValue::new("uri", json!(UCUM))),
        )
        .with_element(
            "value[x].code",
            ElementSpec::new("code").with_fixed(TaggedValue::new("code", json!("mm[Hg]"))),
        )
}

/// Blood pressure panel: a panel code plus required systolic and diastolic
/// components.
#[allow(dead_code)]
pub fn blood_pressure_schema() -> TypeSchema {
    let slicing = SlicingRules::new()
        .with_discriminator(Discriminator::new(DiscriminatorType::Pattern, "code"))
        .with_slice(component_slice("SystolicBP", "8480-6"))
        .with_slice(component_slice("DiastolicBP", "8462-4"));

    TypeSchema::new("Observation")
        .with_url(BLOOD_PRESSURE_URL)
        .with_name("observation-bp")
        .with_element(
            "code",
            ElementSpec::new("CodeableConcept")
                .with_cardinality(1, Some(1))
                .with_pattern(TaggedValue::new("CodeableConcept", coding(LOINC, "85354-9"))),
        )
        .with_element(
            "component",
            ElementSpec::new("BackboneElement")
                .array()
                .with_cardinality(2, None)
                .with_slicing(slicing),
        )
}

#[allow(dead_code)]
pub fn observation() -> Value {
    json!({"resourceType": "Observation"})
}
