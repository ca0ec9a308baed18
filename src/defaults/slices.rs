//! Slice classification and partitioning.

use serde_json::Value;
use tracing::warn;

use crate::crawler::nested_schema_for;
use crate::error::FhirDefaultsError;
use crate::matching::match_discriminant;
use crate::navigation::{AccessOptions, NestedProperty, get_nested_value, infer_type_tag};
use crate::provider::SchemaResolver;
use crate::types::{SliceDefinition, SlicingRules};

/// Name of the first slice, in declaration order, whose discriminators all
/// match `value`.
///
/// Slicing without discriminators places every value in its first slice.
pub fn get_value_slice_name<'s>(
    value: &Value,
    slicing: &'s SlicingRules,
    resolver: Option<&dyn SchemaResolver>,
) -> Option<&'s str> {
    if value.is_null() {
        return None;
    }

    slicing
        .slices
        .iter()
        .find(|slice| slice_matches(value, slicing, slice, resolver))
        .map(|slice| slice.name.as_str())
}

fn slice_matches(
    value: &Value,
    slicing: &SlicingRules,
    slice: &SliceDefinition,
    resolver: Option<&dyn SchemaResolver>,
) -> bool {
    let nested = nested_schema_for(slice, resolver);
    let elements = slice.effective_elements(nested.as_deref());
    let type_tag = match (&nested, slice.first_type_code()) {
        (Some(schema), _) => schema.type_name.clone(),
        (None, Some(code)) => code.to_string(),
        (None, None) => infer_type_tag(value),
    };
    let profile_url = nested.as_ref().and_then(|schema| schema.url.as_deref());

    slicing.discriminator.iter().all(|discriminator| {
        let properties = get_nested_value(
            value,
            &type_tag,
            &discriminator.path,
            elements,
            AccessOptions::default(),
        );
        if properties.is_empty() {
            let anomaly = FhirDefaultsError::unresolved_discriminator_path(&discriminator.path);
            warn!("Slice {}: {anomaly}", slice.name);
            return false;
        }
        properties
            .into_iter()
            .flat_map(NestedProperty::into_candidates)
            .any(|candidate| {
                match_discriminant(&candidate, discriminator, slice, elements, profile_url)
            })
    })
}

/// Partition `values` into one bucket per slice plus a trailing bucket of
/// unmatched values.
///
/// Slice buckets short of the slice's minimum are padded with `None` up to
/// it, and an empty bucket gets one `None` so the slice is still visited.
/// Without slices the values come back as a single bucket.
pub fn assign_values_into_slices(
    values: &[Value],
    slicing: &SlicingRules,
    resolver: Option<&dyn SchemaResolver>,
) -> Vec<Vec<Option<Value>>> {
    if slicing.slices.is_empty() {
        return vec![values.iter().cloned().map(Some).collect()];
    }

    let unmatched = slicing.slices.len();
    let mut buckets: Vec<Vec<Option<Value>>> = vec![Vec::new(); unmatched + 1];

    for value in values {
        let index = get_value_slice_name(value, slicing, resolver)
            .and_then(|name| slicing.slice_index(name))
            .unwrap_or(unmatched);
        buckets[index].push(Some(value.clone()));
    }

    for (slice, bucket) in slicing.slices.iter().zip(buckets.iter_mut()) {
        let min = slice.min as usize;
        if bucket.len() < min {
            bucket.resize(min, None);
        } else if bucket.is_empty() {
            bucket.push(None);
        }
    }

    buckets
}
