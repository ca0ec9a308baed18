//! Minimum-cardinality scaffolding for required complex elements.

use serde_json::{Value, json};

use super::writer::write_at_key;
use crate::crawler::ElementsContext;
use crate::types::ElementSpec;

/// Make sure a required complex element has a container to receive nested
/// defaults: `[]` when it repeats, `{}` otherwise. Present values are left
/// alone, and required primitives have nothing to scaffold.
pub fn apply_minimum(
    target: &mut Value,
    parent_path: &str,
    key: &str,
    element: &ElementSpec,
    context: &ElementsContext<'_>,
) -> usize {
    if !element.is_required() || !element.is_complex() {
        return 0;
    }

    write_at_key(target, parent_path, key, element, context, |existing| {
        if existing.is_some() {
            return None;
        }
        Some(if element.is_array { json!([]) } else { json!({}) })
    })
}
