mod common;

use common::*;
use octofhir_fhirschema_defaults::*;
use serde_json::json;

#[test]
fn test_vital_signs_category_added_when_missing() {
    let output = apply_default_values(&observation(), &vital_signs_schema()).unwrap();

    assert_eq!(output["status"], json!("final"));
    assert_eq!(output["category"], json!([category("vital-signs")]));
    assert_eq!(output["category"][0]["coding"][0]["code"], json!("vital-signs"));
}

#[test]
fn test_required_slice_built_from_nested_element_default() {
    let output = apply_default_values(&observation(), &category_code_schema()).unwrap();

    let categories = output["category"].as_array().unwrap();
    assert_eq!(categories.len(), 1);
    assert_eq!(categories[0]["coding"][0]["code"], json!("vital-signs"));
    assert_eq!(
        output,
        json!({
            "resourceType": "Observation",
            "category": [{"coding": [{"code": "vital-signs"}]}]
        })
    );

    let again = apply_default_values(&output, &category_code_schema()).unwrap();
    assert_eq!(again, output);
}

#[test]
fn test_existing_category_kept_and_slice_appended() {
    let record = json!({
        "resourceType": "Observation",
        "status": "preliminary",
        "category": [category("laboratory")]
    });
    let output = apply_default_values(&record, &vital_signs_schema()).unwrap();

    assert_eq!(output["status"], json!("preliminary"));
    assert_eq!(
        output["category"],
        json!([category("laboratory"), category("vital-signs")])
    );
}

#[test]
fn test_matching_category_not_duplicated() {
    let record = json!({
        "resourceType": "Observation",
        "category": [{"coding": [{"code": "vital-signs"}], "text": "Vitals"}]
    });
    let output = apply_default_values(&record, &vital_signs_schema()).unwrap();
    assert_eq!(output["category"], record["category"]);
}

#[test]
fn test_choice_element_defaults_use_present_variant() {
    let record = json!({"resourceType": "Observation", "valueQuantity": {"value": 72}});
    let output = apply_default_values(&record, &vital_signs_schema()).unwrap();
    assert_eq!(output["valueQuantity"], json!({"value": 72, "system": UCUM}));

    let record = json!({"resourceType": "Observation", "valueString": "normal"});
    let output = apply_default_values(&record, &vital_signs_schema()).unwrap();
    assert_eq!(output["valueString"], json!("normal"));
    assert!(output.get("valueQuantity").is_none());
}

#[test]
fn test_required_choice_scaffolded_under_concrete_key() {
    let schema = TypeSchema::new("Observation").with_element(
        "value[x]",
        ElementSpec::new("Quantity").with_cardinality(1, Some(1)),
    );
    let output = apply_default_values(&observation(), &schema).unwrap();
    assert_eq!(
        output,
        json!({"resourceType": "Observation", "valueQuantity": {}})
    );
}

#[test]
fn test_identifier_pattern_merge() {
    let schema = TypeSchema::new("Patient").with_element(
        "identifier",
        ElementSpec::new("Identifier")
            .with_pattern(TaggedValue::new("Identifier", json!({"system": "http://x"}))),
    );

    let output = apply_default_values(&json!({"resourceType": "Patient"}), &schema).unwrap();
    assert_eq!(output["identifier"], json!({"system": "http://x"}));

    let record = json!({
        "resourceType": "Patient",
        "identifier": {"system": "http://x", "value": "123"}
    });
    assert_eq!(apply_default_values(&record, &schema).unwrap(), record);
}

#[test]
fn test_array_pattern_conflict_keeps_existing() {
    let schema = TypeSchema::new("Observation").with_element(
        "code.coding",
        ElementSpec::new("Coding").array().with_pattern(TaggedValue::new(
            "Coding",
            json!([{"system": LOINC, "code": "85354-9"}]),
        )),
    );
    let record = json!({
        "resourceType": "Observation",
        "code": {"coding": [{"code": "a"}, {"code": "b"}]}
    });

    let output = apply_default_values(&record, &schema).unwrap();
    assert_eq!(output, record);
}

#[test]
fn test_blood_pressure_components() {
    let record = json!({
        "resourceType": "Observation",
        "status": "final",
        "component": [{
            "code": coding(LOINC, "8462-4"),
            "valueQuantity": {"value": 80}
        }]
    });

    let output = apply_default_values(&record, &blood_pressure_schema()).unwrap();

    assert_eq!(output["code"], coding(LOINC, "85354-9"));
    assert_eq!(
        output["component"],
        json!([
            {
                "code": coding(LOINC, "8462-4"),
                "valueQuantity": {"value": 80, "system": UCUM, "code": "mm[Hg]"}
            },
            {
                "code": coding(LOINC, "8480-6"),
                "valueQuantity": {"system": UCUM, "code": "mm[Hg]"}
            }
        ])
    );
}

#[test]
fn test_blood_pressure_from_empty_record() {
    let output = apply_default_values(&observation(), &blood_pressure_schema()).unwrap();
    let codes: Vec<_> = output["component"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["code"]["coding"][0]["code"].clone())
        .collect();
    assert_eq!(codes, vec![json!("8480-6"), json!("8462-4")]);
}

#[test]
fn test_output_is_stable_on_second_application() {
    let schema = blood_pressure_schema();
    let once = apply_default_values(&observation(), &schema).unwrap();
    let twice = apply_default_values(&once, &schema).unwrap();
    assert_eq!(once, twice);
}

#[test]
fn test_nested_backbone_defaults_broadcast() {
    let schema = TypeSchema::new("Patient")
        .with_element("contact", ElementSpec::new("BackboneElement").array())
        .with_element(
            "contact.relationship",
            ElementSpec::new("CodeableConcept")
                .array()
                .with_cardinality(1, None),
        )
        .with_element(
            "contact.relationship.text",
            ElementSpec::new("string").with_fixed(TaggedValue::new("string", json!("contact"))),
        );
    let record = json!({
        "resourceType": "Patient",
        "contact": [{"name": {"family": "A"}}, {"relationship": [{"text": "mother"}]}]
    });

    let output = apply_default_values(&record, &schema).unwrap();
    assert_eq!(
        output["contact"],
        json!([
            {"name": {"family": "A"}, "relationship": []},
            {"relationship": [{"text": "mother"}]}
        ])
    );

    let options = ApplyOptions::default().with_fill_required_sequences(true);
    let seeded = apply_default_values_with(&record, &schema, None, options).unwrap();
    assert_eq!(
        seeded["contact"],
        json!([
            {"name": {"family": "A"}, "relationship": [{"text": "contact"}]},
            {"relationship": [{"text": "mother"}]}
        ])
    );
}

#[test]
fn test_absent_optional_parent_left_absent() {
    let schema = TypeSchema::new("Patient")
        .with_element("contact", ElementSpec::new("BackboneElement").array())
        .with_element(
            "contact.gender",
            ElementSpec::new("code").with_fixed(TaggedValue::new("code", json!("unknown"))),
        );
    let record = json!({"resourceType": "Patient"});
    assert_eq!(apply_default_values(&record, &schema).unwrap(), record);
}
