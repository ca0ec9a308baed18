//! Discriminator matching for slice classification.

use serde_json::Value;

use crate::navigation::{
    AccessOptions, NestedProperty, ScopedElements, THIS_PATH, get_nested_property,
};
use crate::types::{
    DefaultValue, Discriminator, DiscriminatorType, ElementMap, ElementSpec, SliceDefinition,
    TaggedValue,
};

/// Check if `item` deep-contains `pattern`.
///
/// Objects: every pattern key must be present with a matching value.
/// Arrays: every pattern element must match at least one item element.
/// Primitives: equality.
pub fn deep_partial_match(item: &Value, pattern: &Value) -> bool {
    match pattern {
        // Null pattern matches anything
        Value::Null => true,

        Value::Object(pattern_map) => {
            let Some(item_map) = item.as_object() else {
                return false;
            };
            pattern_map.iter().all(|(key, pattern_value)| {
                item_map
                    .get(key)
                    .is_some_and(|item_value| deep_partial_match(item_value, pattern_value))
            })
        }

        Value::Array(pattern_array) => {
            if pattern_array.is_empty() {
                return true;
            }
            let Some(item_array) = item.as_array() else {
                return false;
            };
            pattern_array.iter().all(|pattern_element| {
                item_array
                    .iter()
                    .any(|item_element| deep_partial_match(item_element, pattern_element))
            })
        }

        _ => item == pattern,
    }
}

/// Test one candidate value (already extracted at the discriminator path)
/// against one discriminator of `slice`.
///
/// `elements` are the element definitions governing the slice's values,
/// keyed relative to the sliced element. `profile_url` is the nested profile
/// the slice's values are expected to declare, if any.
pub fn match_discriminant(
    candidate: &TaggedValue,
    discriminator: &Discriminator,
    slice: &SliceDefinition,
    elements: &ElementMap,
    profile_url: Option<&str>,
) -> bool {
    if candidate.is_sequence() {
        return false;
    }

    let path = discriminator.path.as_str();
    match discriminator.discriminator_type {
        DiscriminatorType::Value | DiscriminatorType::Pattern => {
            let Some(value) = candidate.value.as_ref().filter(|_| !candidate.is_absent()) else {
                return false;
            };
            let Some(constraint) = expected_values(path, slice, elements) else {
                return false;
            };
            match constraint {
                Expected::Fixed(expected) => expected.iter().any(|e| e == value),
                Expected::Pattern(expected) => expected.iter().any(|e| deep_partial_match(value, e)),
            }
        }

        DiscriminatorType::Exists => {
            // max 0 means the slice requires absence; anything else, presence
            let max = match element_at(path, elements) {
                Some(element) => element.max,
                None => slice.max,
            };
            if max == Some(0) {
                candidate.is_absent()
            } else {
                !candidate.is_absent()
            }
        }

        DiscriminatorType::Type => {
            if candidate.is_absent() {
                return false;
            }
            let declared = match element_at(path, elements) {
                Some(element) if !element.types.is_empty() => &element.types,
                _ => &slice.types,
            };
            declared.iter().any(|t| t.code == candidate.type_tag)
        }

        DiscriminatorType::Profile => {
            let Some(declared) = candidate
                .value
                .as_ref()
                .and_then(|v| v.pointer("/meta/profile"))
                .and_then(Value::as_array)
            else {
                return false;
            };
            let mut wanted: Vec<&str> = slice
                .types
                .iter()
                .flat_map(|t| t.profile.iter().flatten())
                .map(String::as_str)
                .collect();
            wanted.extend(profile_url);
            declared
                .iter()
                .filter_map(Value::as_str)
                .any(|url| wanted.contains(&url))
        }
    }
}

fn element_at<'a>(path: &str, elements: &'a ElementMap) -> Option<&'a ElementSpec> {
    if path == THIS_PATH {
        return None;
    }
    elements.get(path)
}

enum Expected {
    Fixed(Vec<Value>),
    Pattern(Vec<Value>),
}

/// Values a candidate at `path` must equal (fixed) or contain (pattern).
///
/// Looks at the element at `path`, then at the closest ancestor carrying a
/// fixed/pattern value, then at the slice's own fixed/pattern, descending into
/// the constraint value for whatever part of the path lies below it.
fn expected_values(path: &str, slice: &SliceDefinition, elements: &ElementMap) -> Option<Expected> {
    if path != THIS_PATH {
        let segments: Vec<&str> = path.split('.').collect();
        for end in (1..=segments.len()).rev() {
            let prefix = segments[..end].join(".");
            let Some(default) = elements.get(&prefix).and_then(ElementSpec::default_value) else {
                continue;
            };
            let rest = segments[end..].join(".");
            return Some(descend(default, &rest, elements, &prefix));
        }
    }

    let default = match (&slice.fixed, &slice.pattern) {
        (Some(fixed), _) => DefaultValue::Fixed(fixed),
        (None, Some(pattern)) => DefaultValue::Pattern(pattern),
        (None, None) => return None,
    };
    let rest = if path == THIS_PATH { "" } else { path };
    Some(descend(default, rest, elements, ""))
}

fn descend(default: DefaultValue<'_>, rest: &str, elements: &ElementMap, base: &str) -> Expected {
    let (tagged, is_pattern) = match default {
        DefaultValue::Fixed(value) => (value, false),
        DefaultValue::Pattern(value) => (value, true),
    };

    let values: Vec<Value> = if rest.is_empty() {
        tagged.value.iter().cloned().collect()
    } else {
        let scoped = ScopedElements::new(elements, base);
        get_nested_property(tagged, rest, &scoped, AccessOptions::exclude_absent())
            .into_iter()
            .flat_map(NestedProperty::into_candidates)
            .filter_map(|candidate| candidate.value)
            .collect()
    };

    if is_pattern {
        Expected::Pattern(values)
    } else {
        Expected::Fixed(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ElementType;
    use serde_json::json;

    fn code_discriminator() -> Discriminator {
        Discriminator::new(DiscriminatorType::Value, "coding.code")
    }

    #[test]
    fn test_deep_partial_match_objects_and_arrays() {
        let item = json!({"coding": [{"system": "s", "code": "a"}, {"code": "b"}], "text": "t"});
        assert!(deep_partial_match(&item, &json!({"coding": [{"code": "b"}]})));
        assert!(deep_partial_match(&item, &json!({})));
        assert!(!deep_partial_match(&item, &json!({"coding": [{"code": "c"}]})));
        assert!(!deep_partial_match(&json!("x"), &json!({"a": 1})));
        assert!(deep_partial_match(&json!(1), &json!(1)));
    }

    #[test]
    fn test_value_discriminator_with_fixed_element() {
        let slice = SliceDefinition::new("vs").with_element(
            "coding.code",
            ElementSpec::new("code").with_fixed(TaggedValue::new("code", json!("vital-signs"))),
        );
        let matches = |candidate: &TaggedValue| {
            match_discriminant(candidate, &code_discriminator(), &slice, &slice.elements, None)
        };
        assert!(matches(&TaggedValue::new("code", json!("vital-signs"))));
        assert!(!matches(&TaggedValue::new("code", json!("laboratory"))));
        assert!(!matches(&TaggedValue::undefined()));
    }

    #[test]
    fn test_value_discriminator_through_ancestor_pattern() {
        let slice = SliceDefinition::new("vs").with_element(
            "coding",
            ElementSpec::new("Coding").array().with_pattern(TaggedValue::new(
                "Coding",
                json!([{
                    "system": "http://terminology.hl7.org/CodeSystem/observation-category",
                    "code": "vital-signs"
                }]),
            )),
        );
        let hit = TaggedValue::new("code", json!("vital-signs"));
        assert!(match_discriminant(
            &hit,
            &code_discriminator(),
            &slice,
            &slice.elements,
            None
        ));
    }

    #[test]
    fn test_this_uses_slice_pattern() {
        let slice = SliceDefinition::new("vs").with_pattern(TaggedValue::new(
            "CodeableConcept",
            json!({"coding": [{"code": "vital-signs"}]}),
        ));
        let discriminator = Discriminator::new(DiscriminatorType::Pattern, THIS_PATH);
        let candidate = TaggedValue::new(
            "CodeableConcept",
            json!({"coding": [{"system": "s", "code": "vital-signs"}], "text": "Vital Signs"}),
        );
        assert!(match_discriminant(
            &candidate,
            &discriminator,
            &slice,
            &ElementMap::new(),
            None
        ));
    }

    #[test]
    fn test_exists_discriminator() {
        let discriminator = Discriminator::new(DiscriminatorType::Exists, "valueQuantity");
        let present = TaggedValue::new("Quantity", json!({"value": 1}));
        let absent = TaggedValue::undefined();

        let forbidden = SliceDefinition::new("no-value").with_element(
            "valueQuantity",
            ElementSpec::new("Quantity").with_cardinality(0, Some(0)),
        );
        assert!(match_discriminant(&absent, &discriminator, &forbidden, &forbidden.elements, None));
        assert!(!match_discriminant(&present, &discriminator, &forbidden, &forbidden.elements, None));

        let required = SliceDefinition::new("value").with_element(
            "valueQuantity",
            ElementSpec::new("Quantity").with_cardinality(1, Some(1)),
        );
        assert!(match_discriminant(&present, &discriminator, &required, &required.elements, None));
        assert!(!match_discriminant(&absent, &discriminator, &required, &required.elements, None));
    }

    #[test]
    fn test_type_discriminator() {
        let discriminator = Discriminator::new(DiscriminatorType::Type, "value[x]");
        let slice = SliceDefinition::new("quantity")
            .with_element("value[x]", ElementSpec::new("Quantity"));
        let quantity = TaggedValue::new("Quantity", json!({"value": 1}));
        let string = TaggedValue::new("string", json!("x"));
        assert!(match_discriminant(&quantity, &discriminator, &slice, &slice.elements, None));
        assert!(!match_discriminant(&string, &discriminator, &slice, &slice.elements, None));
    }

    #[test]
    fn test_profile_discriminator() {
        let discriminator = Discriminator::new(DiscriminatorType::Profile, THIS_PATH);
        let slice = SliceDefinition::new("bp")
            .with_type(ElementType::new("Observation").with_profile("http://example.org/bp"));
        let candidate = TaggedValue::new(
            "Observation",
            json!({"meta": {"profile": ["http://example.org/bp"]}}),
        );
        let none = ElementMap::new();
        assert!(match_discriminant(&candidate, &discriminator, &slice, &none, None));

        let other = TaggedValue::new("Observation", json!({"meta": {"profile": ["http://other"]}}));
        assert!(!match_discriminant(&other, &discriminator, &slice, &none, None));
        assert!(match_discriminant(&other, &discriminator, &slice, &none, Some("http://other")));
    }

    #[test]
    fn test_sequences_never_match_directly() {
        let slice = SliceDefinition::new("vs").with_pattern(TaggedValue::new("Coding", json!({})));
        let discriminator = Discriminator::new(DiscriminatorType::Pattern, THIS_PATH);
        let sequence = TaggedValue::new("Coding", json!([{"code": "a"}]));
        let none = ElementMap::new();
        assert!(!match_discriminant(&sequence, &discriminator, &slice, &none, None));
    }
}
