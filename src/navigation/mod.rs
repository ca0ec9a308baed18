//! Nested-property access over tagged values.
//!
//! Paths are dotted element paths relative to the value (`coding.code`,
//! `value[x]`). Every result carries a [`ValuePath`] relative to the input so
//! callers holding the containing document can address the same location.

pub mod pointer;

pub use pointer::{PathSegment, ValuePath};

use serde_json::{Map, Value};
use tracing::trace;

use crate::types::{
    ElementMap, ElementSpec, FHIR_PRIMITIVE_TYPES, TaggedValue, UNDEFINED_TYPE, capitalize,
};

/// Path naming the value itself.
pub const THIS_PATH: &str = "$this";

const CHOICE_SUFFIX: &str = "[x]";

/// Element definitions addressable by a path relative to some value.
pub trait ElementLookup {
    fn element_at(&self, relative_path: &str) -> Option<&ElementSpec>;
}

impl ElementLookup for ElementMap {
    fn element_at(&self, relative_path: &str) -> Option<&ElementSpec> {
        self.get(relative_path)
    }
}

impl<T: ElementLookup + ?Sized> ElementLookup for &T {
    fn element_at(&self, relative_path: &str) -> Option<&ElementSpec> {
        (**self).element_at(relative_path)
    }
}

/// Element map viewed from beneath `base` (empty `base` is the map's root).
#[derive(Debug, Clone, Copy)]
pub struct ScopedElements<'a> {
    elements: &'a ElementMap,
    base: &'a str,
}

impl<'a> ScopedElements<'a> {
    pub fn new(elements: &'a ElementMap, base: &'a str) -> Self {
        Self { elements, base }
    }
}

impl ElementLookup for ScopedElements<'_> {
    fn element_at(&self, relative_path: &str) -> Option<&ElementSpec> {
        if self.base.is_empty() {
            self.elements.get(relative_path)
        } else {
            self.elements.get(&format!("{}.{relative_path}", self.base))
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccessOptions {
    /// Drop entries for values that are not present.
    pub exclude_absent: bool,
}

impl AccessOptions {
    pub fn exclude_absent() -> Self {
        Self {
            exclude_absent: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Located {
    pub pointer: ValuePath,
    pub value: TaggedValue,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NestedProperty {
    Absent { pointer: ValuePath },
    Single(Located),
    Sequence { pointer: ValuePath, items: Vec<Located> },
}

impl NestedProperty {
    pub fn pointer(&self) -> &ValuePath {
        match self {
            Self::Absent { pointer } | Self::Sequence { pointer, .. } => pointer,
            Self::Single(located) => &located.pointer,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent { .. })
    }

    /// One tagged value per candidate: sequences are flattened and an empty
    /// sequence counts as a single absent value.
    pub fn into_candidates(self) -> Vec<TaggedValue> {
        match self {
            Self::Absent { .. } => vec![TaggedValue::undefined()],
            Self::Single(located) => vec![located.value],
            Self::Sequence { items, .. } if items.is_empty() => vec![TaggedValue::undefined()],
            Self::Sequence { items, .. } => items.into_iter().map(|item| item.value).collect(),
        }
    }
}

/// A resolved `name[x]` member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChoiceKey {
    pub key: String,
    pub type_code: String,
}

pub fn choice_base(segment: &str) -> Option<&str> {
    segment.strip_suffix(CHOICE_SUFFIX)
}

/// Resolve `base[x]` to a concrete key.
///
/// A present member named after one of the declared type codes wins, then any
/// present `base<Type>` member, then the first declared type code.
pub fn resolve_choice_key(
    object: Option<&Map<String, Value>>,
    base: &str,
    element: Option<&ElementSpec>,
) -> Option<ChoiceKey> {
    let declared = element.map(|e| e.types.as_slice()).unwrap_or_default();

    if let Some(object) = object {
        for element_type in declared {
            let key = format!("{base}{}", capitalize(&element_type.code));
            if object.get(&key).is_some_and(|v| !v.is_null()) {
                return Some(ChoiceKey {
                    key,
                    type_code: element_type.code.clone(),
                });
            }
        }

        for (key, value) in object {
            let Some(suffix) = key.strip_prefix(base) else {
                continue;
            };
            if value.is_null() || !suffix.starts_with(|c: char| c.is_ascii_uppercase()) {
                continue;
            }
            return Some(ChoiceKey {
                key: key.clone(),
                type_code: type_code_from_suffix(suffix),
            });
        }
    }

    declared.first().map(|element_type| ChoiceKey {
        key: format!("{base}{}", capitalize(&element_type.code)),
        type_code: element_type.code.clone(),
    })
}

fn type_code_from_suffix(suffix: &str) -> String {
    let mut chars = suffix.chars();
    let lowered: String = match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => return String::new(),
    };
    if FHIR_PRIMITIVE_TYPES.contains(&lowered.as_str()) {
        lowered
    } else {
        suffix.to_string()
    }
}

/// Best-effort type tag from the JSON shape alone.
pub fn infer_type_tag(value: &Value) -> String {
    match value {
        Value::Null => UNDEFINED_TYPE.to_string(),
        Value::Bool(_) => "boolean".to_string(),
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer".to_string(),
        Value::Number(_) => "decimal".to_string(),
        Value::String(_) => "string".to_string(),
        Value::Array(items) => items
            .first()
            .map(infer_type_tag)
            .unwrap_or_else(|| UNDEFINED_TYPE.to_string()),
        Value::Object(map) => map
            .get("resourceType")
            .and_then(Value::as_str)
            .unwrap_or("Element")
            .to_string(),
    }
}

enum Frontier<'v> {
    Present(ValuePath, &'v Value),
    Missing(ValuePath),
}

/// Extract the values at `path` beneath `value`.
///
/// The result has one entry per value reached before the final segment:
/// absent intermediates propagate as [`NestedProperty::Absent`] and sequences
/// fan out. Segments that hit a primitive are unresolvable and contribute
/// nothing, so an empty result means the path does not apply to the value.
pub fn get_nested_property(
    value: &TaggedValue,
    path: &str,
    lookup: &(impl ElementLookup + ?Sized),
    options: AccessOptions,
) -> Vec<NestedProperty> {
    match &value.value {
        Some(root) => get_nested_value(root, &value.type_tag, path, lookup, options),
        None => get_nested_value(&Value::Null, &value.type_tag, path, lookup, options),
    }
}

/// [`get_nested_property`] over a borrowed value and its type tag.
pub fn get_nested_value(
    root: &Value,
    type_tag: &str,
    path: &str,
    lookup: &(impl ElementLookup + ?Sized),
    options: AccessOptions,
) -> Vec<NestedProperty> {
    if root.is_null() {
        return finish(
            vec![NestedProperty::Absent {
                pointer: ValuePath::root(),
            }],
            options,
        );
    }

    if path.is_empty() || path == THIS_PATH {
        let property = match root {
            Value::Array(items) => NestedProperty::Sequence {
                pointer: ValuePath::root(),
                items: locate_items(&ValuePath::root(), items, Some(type_tag)),
            },
            other => NestedProperty::Single(Located {
                pointer: ValuePath::root(),
                value: TaggedValue::new(type_tag, other.clone()),
            }),
        };
        return finish(vec![property], options);
    }

    let mut frontier = match root {
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, item)| Frontier::Present(ValuePath::root().index(i), item))
            .collect(),
        other => vec![Frontier::Present(ValuePath::root(), other)],
    };

    let segments: Vec<&str> = path.split('.').collect();
    for (i, segment) in segments.iter().enumerate() {
        let prefix = segments[..=i].join(".");
        let element = lookup.element_at(&prefix);

        if i + 1 == segments.len() {
            let properties = frontier
                .into_iter()
                .filter_map(|entry| step_terminal(entry, segment, element))
                .collect();
            return finish(properties, options);
        }

        frontier = frontier
            .into_iter()
            .flat_map(|entry| step_intermediate(entry, segment, element))
            .collect();
    }

    Vec::new()
}

fn finish(properties: Vec<NestedProperty>, options: AccessOptions) -> Vec<NestedProperty> {
    if options.exclude_absent {
        properties.into_iter().filter(|p| !p.is_absent()).collect()
    } else {
        properties
    }
}

/// Key and type tag a segment resolves to under `object`.
fn resolve_segment(
    object: Option<&Map<String, Value>>,
    segment: &str,
    element: Option<&ElementSpec>,
) -> Option<(String, Option<String>)> {
    match choice_base(segment) {
        Some(base) => {
            resolve_choice_key(object, base, element).map(|choice| (choice.key, Some(choice.type_code)))
        }
        None => Some((
            segment.to_string(),
            element.and_then(|e| e.first_type_code()).map(str::to_string),
        )),
    }
}

fn step_intermediate<'v>(
    entry: Frontier<'v>,
    segment: &str,
    element: Option<&ElementSpec>,
) -> Vec<Frontier<'v>> {
    match entry {
        Frontier::Missing(pointer) => {
            let key = resolve_segment(None, segment, element)
                .map(|(key, _)| key)
                .unwrap_or_else(|| segment.to_string());
            vec![Frontier::Missing(pointer.child(key))]
        }
        Frontier::Present(pointer, current) => {
            let Some(object) = current.as_object() else {
                trace!("Cannot descend into primitive at {pointer} for '{segment}'");
                return Vec::new();
            };
            let Some((key, _)) = resolve_segment(Some(object), segment, element) else {
                return Vec::new();
            };
            let child_pointer = pointer.child(key.as_str());
            match object.get(&key) {
                None | Some(Value::Null) => vec![Frontier::Missing(child_pointer)],
                Some(Value::Array(items)) if items.is_empty() => {
                    vec![Frontier::Missing(child_pointer)]
                }
                Some(Value::Array(items)) => items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| Frontier::Present(child_pointer.index(i), item))
                    .collect(),
                Some(child) => vec![Frontier::Present(child_pointer, child)],
            }
        }
    }
}

fn step_terminal(
    entry: Frontier<'_>,
    segment: &str,
    element: Option<&ElementSpec>,
) -> Option<NestedProperty> {
    match entry {
        Frontier::Missing(pointer) => {
            let key = resolve_segment(None, segment, element)
                .map(|(key, _)| key)
                .unwrap_or_else(|| segment.to_string());
            Some(NestedProperty::Absent {
                pointer: pointer.child(key),
            })
        }
        Frontier::Present(pointer, current) => {
            let Some(object) = current.as_object() else {
                trace!("Cannot read '{segment}' from primitive at {pointer}");
                return None;
            };
            let (key, type_tag) = resolve_segment(Some(object), segment, element)?;
            let child_pointer = pointer.child(key.as_str());
            Some(match object.get(&key) {
                None | Some(Value::Null) => NestedProperty::Absent {
                    pointer: child_pointer,
                },
                Some(Value::Array(items)) => NestedProperty::Sequence {
                    items: locate_items(&child_pointer, items, type_tag.as_deref()),
                    pointer: child_pointer,
                },
                Some(child) => NestedProperty::Single(Located {
                    value: TaggedValue::new(
                        type_tag.unwrap_or_else(|| infer_type_tag(child)),
                        child.clone(),
                    ),
                    pointer: child_pointer,
                }),
            })
        }
    }
}

fn locate_items(pointer: &ValuePath, items: &[Value], type_tag: Option<&str>) -> Vec<Located> {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| Located {
            pointer: pointer.index(i),
            value: TaggedValue::from_option(
                type_tag
                    .map(str::to_string)
                    .unwrap_or_else(|| infer_type_tag(item)),
                Some(item.clone()),
            ),
        })
        .collect()
}
