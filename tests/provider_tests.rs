mod common;

use common::*;
use octofhir_fhirschema_defaults::*;
use serde_json::json;
use std::path::Path;
use std::sync::Arc;

async fn write_schema(dir: &Path, file: &str, schema: &TypeSchema) {
    let content = serde_json::to_string_pretty(schema).unwrap();
    tokio::fs::write(dir.join(file), content).await.unwrap();
}

#[tokio::test]
async fn test_manager_applies_profile_from_directory() {
    let dir = tempfile::tempdir().unwrap();
    write_schema(dir.path(), "vitalsigns.json", &vital_signs_schema()).await;
    write_schema(dir.path(), "bp.json", &blood_pressure_schema()).await;

    let config = DefaultsConfig::default().with_schema_dir(dir.path());
    let manager = DefaultsManager::from_config(config).await.unwrap();

    let output = manager.apply(&observation(), VITAL_SIGNS_URL).await.unwrap();
    assert_eq!(output["status"], json!("final"));
    assert_eq!(output["category"], json!([category("vital-signs")]));

    let output = manager.apply(&observation(), BLOOD_PRESSURE_URL).await.unwrap();
    assert_eq!(output["component"].as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn test_schema_round_trips_through_json() {
    let dir = tempfile::tempdir().unwrap();
    write_schema(dir.path(), "bp.json", &blood_pressure_schema()).await;

    let provider = DirectorySchemaProvider::load(dir.path()).await.unwrap();
    let loaded = provider.require_schema(BLOOD_PRESSURE_URL).await.unwrap();
    assert_eq!(*loaded, blood_pressure_schema());

    let by_name = provider.get_schema("observation-bp").await.unwrap();
    assert!(by_name.is_some());
}

#[tokio::test]
async fn test_versioned_profile_lookup() {
    let dir = tempfile::tempdir().unwrap();
    write_schema(dir.path(), "vitalsigns.json", &vital_signs_schema()).await;

    let provider = DirectorySchemaProvider::load(dir.path()).await.unwrap();
    let schema = provider.get_schema(VITAL_SIGNS_URL).await.unwrap();
    assert_eq!(schema.map(|s| s.type_name.clone()), Some("Observation".to_string()));
}

#[cfg(feature = "lru-cache")]
#[tokio::test]
async fn test_slice_profiles_preloaded_from_provider() {
    let race_url = "http://example.org/StructureDefinition/race";
    let race = TypeSchema::new("Extension").with_url(race_url).with_element(
        "url",
        ElementSpec::new("uri").with_fixed(TaggedValue::new("uri", json!(race_url))),
    );
    let slicing = SlicingRules::new()
        .with_discriminator(Discriminator::new(DiscriminatorType::Value, "url"))
        .with_slice(
            SliceDefinition::new("race")
                .with_cardinality(1, Some(1))
                .with_type(ElementType::new("Extension").with_profile(race_url)),
        );
    let patient = TypeSchema::new("Patient")
        .with_url("http://example.org/StructureDefinition/patient")
        .with_element(
            "extension",
            ElementSpec::new("Extension").array().with_slicing(slicing),
        );

    let registry = InMemorySchemaRegistry::with_schemas([patient, race]);
    let provider = CachedSchemaProvider::new(registry, &CacheConfig::minimal());
    let manager = DefaultsManager::new(Arc::new(provider), DefaultsConfig::default());

    let output = manager
        .apply(
            &json!({"resourceType": "Patient"}),
            "http://example.org/StructureDefinition/patient",
        )
        .await
        .unwrap();
    assert_eq!(output["extension"], json!([{"url": race_url}]));
}

#[tokio::test]
async fn test_missing_profile_reported() {
    let registry = InMemorySchemaRegistry::new();
    let manager = DefaultsManager::new(Arc::new(registry), DefaultsConfig::default());
    let error = manager
        .apply(&observation(), "http://example.org/none")
        .await
        .unwrap_err();
    assert!(matches!(error, FhirDefaultsError::SchemaNotFound { .. }));
}
