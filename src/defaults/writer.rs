use serde_json::{Value, json};
use tracing::{debug, trace, warn};

use crate::crawler::ElementsContext;
use crate::navigation::{choice_base, resolve_choice_key};
use crate::types::{ElementSpec, base_member};

/// Walk `key` (dotted, relative to `target`) and hand the terminal slot to
/// `write`.
///
/// Missing intermediates become `{}`, or `[{}]` when the intermediate
/// element repeats. An intermediate the context does not declare takes its
/// shape from the base datatype that owns it. Sequences met along the way, including `target` itself,
/// are broadcast over. `name[x]` segments resolve to the present member or
/// to the first declared type. `write` receives the current terminal value
/// (`None` when absent or null) and returns the replacement, or `None` to
/// leave the slot alone. Returns the number of slots written.
pub fn write_at_key<F>(
    target: &mut Value,
    parent_path: &str,
    key: &str,
    element: &ElementSpec,
    context: &ElementsContext<'_>,
    mut write: F,
) -> usize
where
    F: FnMut(Option<&Value>) -> Option<Value>,
{
    let parts: Vec<&str> = key.split('.').collect();
    let mut current: Vec<&mut Value> = match target {
        Value::Array(items) => items.iter_mut().collect(),
        other => vec![other],
    };
    let mut written = 0;
    let mut owner_type = context.type_at(parent_path).map(str::to_string);

    for (i, part) in parts.iter().enumerate() {
        let is_terminal = i + 1 == parts.len();
        let element_path = format!("{parent_path}.{}", parts[..=i].join("."));
        let part_element = if is_terminal {
            Some(element)
        } else {
            context.get_element_by_path(&element_path)
        };
        let inherited = match part_element {
            Some(_) => None,
            None => owner_type.as_deref().and_then(|owner| base_member(owner, part)),
        };
        let repeats = part_element
            .map(|e| e.is_array)
            .or(inherited.map(|member| member.is_array))
            .unwrap_or(false);
        owner_type = part_element
            .and_then(ElementSpec::first_type_code)
            .or(inherited.map(|member| member.type_code))
            .map(str::to_string);

        let mut next = Vec::new();
        for value in current {
            let Some(object) = value.as_object_mut() else {
                trace!("Not writing {element_path} beneath a primitive");
                continue;
            };

            let member = match choice_base(part) {
                Some(base) => match resolve_choice_key(Some(&*object), base, part_element) {
                    Some(choice) => choice.key,
                    None => {
                        warn!("Cannot resolve {element_path}: no declared type");
                        continue;
                    }
                },
                None => part.to_string(),
            };

            if is_terminal {
                let replacement = write(object.get(&member).filter(|v| !v.is_null()));
                if let Some(replacement) = replacement {
                    object.insert(member, replacement);
                    written += 1;
                }
                continue;
            }

            let slot = object.entry(member).or_insert(Value::Null);
            if slot.is_null() {
                debug!("Creating empty value for {element_path}");
                *slot = if repeats {
                    json!([{}])
                } else {
                    json!({})
                };
            }
            match slot {
                Value::Array(items) => next.extend(items.iter_mut()),
                other => next.push(other),
            }
        }
        current = next;
    }

    written
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ElementMap, ElementType};

    fn elements() -> ElementMap {
        let mut elements = ElementMap::new();
        elements.insert("code".into(), ElementSpec::new("CodeableConcept"));
        elements.insert("component".into(), ElementSpec::new("BackboneElement").array());
        elements.insert(
            "value[x]".into(),
            ElementSpec::new("Quantity").with_type(ElementType::new("string")),
        );
        elements
    }

    fn set(value: Value) -> impl FnMut(Option<&Value>) -> Option<Value> {
        move |existing: Option<&Value>| existing.is_none().then(|| value.clone())
    }

    #[test]
    fn test_creates_object_intermediates() {
        let elements = elements();
        let context = ElementsContext::new("Observation", &elements);
        let leaf = ElementSpec::new("string");
        let mut record = json!({});

        let written = write_at_key(
            &mut record,
            "Observation",
            "code.text",
            &leaf,
            &context,
            set(json!("x")),
        );
        assert_eq!(written, 1);
        assert_eq!(record, json!({"code": {"text": "x"}}));
    }

    #[test]
    fn test_creates_sequence_intermediate_for_repeating_element() {
        let elements = elements();
        let context = ElementsContext::new("Observation", &elements);
        let leaf = ElementSpec::new("string");
        let mut record = json!({});

        write_at_key(
            &mut record,
            "Observation",
            "component.text",
            &leaf,
            &context,
            set(json!("x")),
        );
        assert_eq!(record, json!({"component": [{"text": "x"}]}));
    }

    #[test]
    fn test_undeclared_intermediate_takes_base_shape() {
        let elements = ElementMap::new();
        let context = ElementsContext::new("Observation.category", &elements)
            .with_type_name("CodeableConcept");
        let leaf = ElementSpec::new("code");
        let mut record = json!({});

        let written = write_at_key(
            &mut record,
            "Observation.category",
            "coding.code",
            &leaf,
            &context,
            set(json!("vital-signs")),
        );
        assert_eq!(written, 1);
        assert_eq!(record, json!({"coding": [{"code": "vital-signs"}]}));
    }

    #[test]
    fn test_undeclared_intermediate_of_unknown_type_is_object() {
        let elements = ElementMap::new();
        let context = ElementsContext::new("Observation", &elements);
        let leaf = ElementSpec::new("code");
        let mut record = json!({});

        write_at_key(
            &mut record,
            "Observation",
            "coding.code",
            &leaf,
            &context,
            set(json!("x")),
        );
        assert_eq!(record, json!({"coding": {"code": "x"}}));
    }

    #[test]
    fn test_broadcasts_over_sequences() {
        let elements = elements();
        let context = ElementsContext::new("Observation", &elements);
        let leaf = ElementSpec::new("string");
        let mut record = json!({"component": [{"text": "keep"}, {}, {"text": null}]});

        let written = write_at_key(
            &mut record,
            "Observation",
            "component.text",
            &leaf,
            &context,
            set(json!("x")),
        );
        assert_eq!(written, 2);
        assert_eq!(
            record,
            json!({"component": [{"text": "keep"}, {"text": "x"}, {"text": "x"}]})
        );
    }

    #[test]
    fn test_choice_resolves_to_first_declared_type() {
        let elements = elements();
        let context = ElementsContext::new("Observation", &elements);
        let mut record = json!({});

        let element = &elements["value[x]"];
        write_at_key(&mut record, "Observation", "value[x]", element, &context, set(json!({})));
        assert_eq!(record, json!({"valueQuantity": {}}));
    }

    #[test]
    fn test_choice_prefers_present_member() {
        let elements = elements();
        let context = ElementsContext::new("Observation", &elements);
        let mut record = json!({"valueString": "high"});

        let element = &elements["value[x]"];
        let written =
            write_at_key(&mut record, "Observation", "value[x]", element, &context, set(json!({})));
        assert_eq!(written, 0);
        assert_eq!(record, json!({"valueString": "high"}));
    }

    #[test]
    fn test_skips_primitive_intermediate() {
        let elements = elements();
        let context = ElementsContext::new("Observation", &elements);
        let leaf = ElementSpec::new("string");
        let mut record = json!({"code": "not-an-object"});

        let written = write_at_key(
            &mut record,
            "Observation",
            "code.text",
            &leaf,
            &context,
            set(json!("x")),
        );
        assert_eq!(written, 0);
        assert_eq!(record, json!({"code": "not-an-object"}));
    }
}
