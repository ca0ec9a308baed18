//! Fixed and pattern values merged onto possibly-absent locations.

use serde_json::{Map, Value};
use tracing::trace;

use super::writer::write_at_key;
use crate::crawler::ElementsContext;
use crate::error::{FhirDefaultsError, Result};
use crate::types::{DefaultValue, ElementSpec};

/// Fixed values only seed absence; present data is never overwritten.
pub fn apply_fixed(existing: Option<&Value>, fixed: &Value) -> Value {
    match existing.filter(|v| !v.is_null()) {
        Some(existing) => existing.clone(),
        None => {
            trace!("Seeding fixed value {fixed}");
            fixed.clone()
        }
    }
}

/// Best-effort pattern merge.
///
/// Conflicts leave `existing` as it was; a conflict below one key of an
/// object pattern only skips that key.
pub fn apply_pattern(existing: Option<&Value>, pattern: &Value) -> Value {
    let Some(existing) = existing.filter(|v| !v.is_null()) else {
        return pattern.clone();
    };
    match merge_pattern(Some(existing), pattern) {
        Ok(merged) => merged,
        Err(conflict) => {
            trace!("Keeping existing value: {conflict}");
            existing.clone()
        }
    }
}

/// Structural pattern merge. Only ever fails with
/// [`FhirDefaultsError::PatternConflict`].
///
/// A sequence pattern already is the sequence, so it fills an absent or empty
/// slot as given rather than wrapped in another sequence.
pub fn merge_pattern(existing: Option<&Value>, pattern: &Value) -> Result<Value> {
    let existing = existing.filter(|v| !v.is_null());

    match pattern {
        Value::Array(_) => match existing {
            None => Ok(pattern.clone()),
            Some(Value::Array(items)) if items.is_empty() => Ok(pattern.clone()),
            Some(Value::Array(items)) => Err(FhirDefaultsError::pattern_conflict(format!(
                "cannot merge a sequence pattern into {} existing items without slicing",
                items.len()
            ))),
            Some(other) => Err(FhirDefaultsError::pattern_conflict(format!(
                "sequence pattern against {}",
                shape(other)
            ))),
        },

        Value::Object(pattern_map) => {
            let mut result = match existing {
                None => Map::new(),
                Some(Value::Object(map)) => map.clone(),
                Some(other) => {
                    return Err(FhirDefaultsError::pattern_conflict(format!(
                        "object pattern against {}",
                        shape(other)
                    )));
                }
            };
            for (key, pattern_value) in pattern_map {
                match merge_pattern(result.get(key), pattern_value) {
                    Ok(merged) => {
                        result.insert(key.clone(), merged);
                    }
                    Err(conflict) => trace!("Skipping pattern key '{key}': {conflict}"),
                }
            }
            Ok(Value::Object(result))
        }

        scalar => Ok(existing.cloned().unwrap_or_else(|| scalar.clone())),
    }
}

fn shape(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "sequence",
        Value::Object(_) => "object",
    }
}

/// The element's fixed/pattern value, wrapped in a sequence when the element
/// repeats but the value was given for a single item.
fn element_default(element: &ElementSpec) -> Option<(DefaultValue<'_>, Value)> {
    let default = element.default_value()?;
    let value = match default {
        DefaultValue::Fixed(tagged) | DefaultValue::Pattern(tagged) => tagged.value.as_ref()?,
    };
    let value = match value {
        Value::Array(_) => value.clone(),
        single if element.is_array => Value::Array(vec![single.clone()]),
        single => single.clone(),
    };
    Some((default, value))
}

/// Write the element's fixed or pattern value at `key` beneath `target`.
/// Returns the number of locations written.
pub fn apply_fixed_or_pattern(
    target: &mut Value,
    parent_path: &str,
    key: &str,
    element: &ElementSpec,
    context: &ElementsContext<'_>,
) -> usize {
    let Some((default, value)) = element_default(element) else {
        return 0;
    };

    match default {
        DefaultValue::Fixed(_) => {
            write_at_key(target, parent_path, key, element, context, |existing| {
                existing.is_none().then(|| apply_fixed(existing, &value))
            })
        }
        DefaultValue::Pattern(_) => {
            write_at_key(target, parent_path, key, element, context, |existing| {
                Some(apply_pattern(existing, &value))
            })
        }
    }
}
