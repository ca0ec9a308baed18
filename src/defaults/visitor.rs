//! The traversal visitor that applies defaults while the crawler walks a
//! schema.
//!
//! The working record is one JSON document owned by the visitor. Frames do
//! not hold copies of values: a [`Slot`] is a location in the document plus
//! the type resolved for it, so writes made through one frame are seen by
//! every other frame. Child slots are appended in the order of the parent
//! slots they came from.

use indexmap::IndexMap;
use serde_json::{Value, json};
use std::collections::HashSet;
use tracing::{debug, trace, warn};

use super::ApplyOptions;
use super::merge::{apply_fixed, apply_fixed_or_pattern, apply_pattern};
use super::scaffold::apply_minimum;
use super::slices::get_value_slice_name;
use crate::crawler::{ElementsContext, SchemaVisitor};
use crate::error::{FhirDefaultsError, Result};
use crate::navigation::{
    AccessOptions, ElementLookup, NestedProperty, PathSegment, ValuePath, get_nested_value,
};
use crate::provider::SchemaResolver;
use crate::types::{
    ElementSpec, SliceDefinition, SlicingRules, TaggedValue, TypeSchema, UNDEFINED_TYPE,
};

/// One value (or one sequence of values) addressed in the working document.
#[derive(Debug, Clone, PartialEq)]
pub struct Slot {
    pub pointer: ValuePath,
    pub type_tag: String,
    /// Item locations when the slot is a sequence. For a slice this is only
    /// the items belonging to the slice.
    pub members: Option<Vec<ValuePath>>,
}

impl Slot {
    fn single(pointer: ValuePath, type_tag: impl Into<String>) -> Self {
        Self {
            pointer,
            type_tag: type_tag.into(),
            members: None,
        }
    }

    /// The slot's current value; `undefined` when nothing is there.
    pub fn tagged(&self, document: &Value) -> TaggedValue {
        match &self.members {
            Some(members) => TaggedValue::new(
                self.type_tag.clone(),
                Value::Array(
                    members
                        .iter()
                        .filter_map(|member| member.get(document).cloned())
                        .collect(),
                ),
            ),
            None => TaggedValue::from_option(
                self.type_tag.clone(),
                self.pointer.get(document).cloned(),
            ),
        }
    }

    /// Locations of present values: the members of a sequence, or the slot
    /// itself.
    fn targets(&self, document: &Value) -> Vec<ValuePath> {
        match &self.members {
            Some(members) => members.clone(),
            None => match self.pointer.get(document) {
                None | Some(Value::Null) => Vec::new(),
                Some(_) => vec![self.pointer.clone()],
            },
        }
    }
}

#[derive(Debug)]
struct SchemaFrame {
    name: String,
    url: Option<String>,
}

#[derive(Debug)]
struct ValueFrame {
    path: String,
    slots: Vec<Slot>,
}

#[derive(Debug)]
struct SlicingFrame {
    path: String,
    /// Items placed so far, per slice name.
    accumulator: IndexMap<String, Vec<ValuePath>>,
    claimed: HashSet<ValuePath>,
    synthesized: Vec<ValuePath>,
}

#[derive(Debug)]
struct SliceFrame {
    name: String,
    pushed_schema: bool,
}

pub struct DefaultValueVisitor<'r> {
    document: Value,
    resolver: Option<&'r dyn SchemaResolver>,
    options: ApplyOptions,
    schema_stack: Vec<SchemaFrame>,
    value_stack: Vec<ValueFrame>,
    slicing_stack: Vec<SlicingFrame>,
    slice_stack: Vec<SliceFrame>,
    finished: bool,
}

fn underflow(stack: &str, hook: &str) -> FhirDefaultsError {
    FhirDefaultsError::invariant_violation(format!("{stack} stack underflow in {hook}"))
}

impl<'r> DefaultValueVisitor<'r> {
    /// Starts from a deep copy of `record`; the input is never touched.
    pub fn new(
        record: &Value,
        resolver: Option<&'r dyn SchemaResolver>,
        options: ApplyOptions,
    ) -> Self {
        Self {
            document: record.clone(),
            resolver,
            options,
            schema_stack: Vec::new(),
            value_stack: Vec::new(),
            slicing_stack: Vec::new(),
            slice_stack: Vec::new(),
            finished: false,
        }
    }

    /// The defaulted record, once the resource has been exited.
    pub fn into_record(self) -> Result<Value> {
        if !self.finished {
            return Err(FhirDefaultsError::invariant_violation(
                "traversal did not exit the resource",
            ));
        }
        Ok(self.document)
    }

    pub fn document(&self) -> &Value {
        &self.document
    }

    /// Values of the innermost frame.
    pub fn current_values(&self) -> Vec<TaggedValue> {
        self.value_stack
            .last()
            .map(|frame| frame.slots.iter().map(|slot| slot.tagged(&self.document)).collect())
            .unwrap_or_default()
    }

    fn current_frame(&self, hook: &str) -> Result<&ValueFrame> {
        self.value_stack.last().ok_or_else(|| underflow("value", hook))
    }

    fn pop_value_frame(&mut self, path: &str, hook: &str) -> Result<ValueFrame> {
        let frame = self.value_stack.pop().ok_or_else(|| underflow("value", hook))?;
        if frame.path != path {
            return Err(FhirDefaultsError::invariant_violation(format!(
                "{hook} for {path} but the current value frame is {}",
                frame.path
            )));
        }
        Ok(frame)
    }

    /// Where a child would live beneath an absent parent.
    fn absent_child(parent: &Slot, key: &str, lookup: &impl ElementLookup) -> ValuePath {
        let empty = json!({});
        get_nested_value(&empty, &parent.type_tag, key, lookup, AccessOptions::default())
            .first()
            .map(|property| parent.pointer.join(property.pointer()))
            .unwrap_or_else(|| parent.pointer.child(key))
    }

    fn slot_from_property(
        target: &ValuePath,
        property: NestedProperty,
        element: &ElementSpec,
    ) -> Slot {
        let declared = element.first_type_code().unwrap_or(UNDEFINED_TYPE);
        match property {
            NestedProperty::Absent { pointer } => Slot::single(target.join(&pointer), declared),
            NestedProperty::Single(located) => {
                Slot::single(target.join(&located.pointer), located.value.type_tag)
            }
            NestedProperty::Sequence { pointer, items } => Slot {
                pointer: target.join(&pointer),
                type_tag: declared.to_string(),
                members: Some(items.iter().map(|item| target.join(&item.pointer)).collect()),
            },
        }
    }

    /// Give an empty required sequence one empty item to carry nested
    /// defaults.
    fn seed_required_sequence(&mut self, slot: &mut Slot) {
        let Some(members) = slot.members.as_mut() else {
            return;
        };
        if !members.is_empty() {
            return;
        }
        if let Some(Value::Array(items)) = slot.pointer.get_mut(&mut self.document) {
            items.push(json!({}));
            members.push(slot.pointer.index(items.len() - 1));
            debug!("Seeded empty item into required sequence {}", slot.pointer);
        }
    }

    /// Append an empty item to the sequence at `pointer`, creating the
    /// sequence when the owning object exists.
    fn append_placeholder(&mut self, pointer: &ValuePath) -> Option<ValuePath> {
        match pointer.get_mut(&mut self.document) {
            Some(Value::Array(items)) => {
                items.push(json!({}));
                return Some(pointer.index(items.len() - 1));
            }
            Some(Value::Null) | None => {}
            Some(_) => return None,
        }

        let Some(PathSegment::Key(key)) = pointer.last() else {
            return None;
        };
        let owner = pointer.parent()?;
        let object = owner.get_mut(&mut self.document)?.as_object_mut()?;
        object.insert(key.clone(), json!([{}]));
        Some(pointer.index(0))
    }

    fn apply_slice_default(&mut self, slice: &SliceDefinition, members: &[ValuePath]) {
        let default = match (&slice.fixed, &slice.pattern) {
            (Some(fixed), _) => fixed.value.as_ref().map(|v| (v, true)),
            (None, Some(pattern)) => pattern.value.as_ref().map(|v| (v, false)),
            (None, None) => None,
        };
        let Some((default, is_fixed)) = default else {
            return;
        };

        for member in members {
            let Some(value) = member.get_mut(&mut self.document) else {
                continue;
            };
            let merged = if is_fixed {
                // placeholders are empty objects, which count as unset here
                let unset = value.as_object().is_some_and(|m| m.is_empty());
                apply_fixed(if unset { None } else { Some(&*value) }, default)
            } else {
                apply_pattern(Some(&*value), default)
            };
            *value = merged;
        }
    }
}

impl SchemaVisitor for DefaultValueVisitor<'_> {
    fn on_enter_resource(&mut self, schema: &TypeSchema) -> Result<()> {
        if !self.value_stack.is_empty() || self.finished {
            return Err(FhirDefaultsError::invariant_violation(
                "resource entered more than once",
            ));
        }

        debug!("Applying defaults from {schema}");
        self.schema_stack.push(SchemaFrame {
            name: schema.name.clone(),
            url: schema.url.clone(),
        });
        self.value_stack.push(ValueFrame {
            path: schema.type_name.clone(),
            slots: vec![Slot::single(ValuePath::root(), schema.type_name.as_str())],
        });
        Ok(())
    }

    fn on_exit_resource(&mut self, schema: &TypeSchema) -> Result<()> {
        self.pop_value_frame(&schema.type_name, "on_exit_resource")?;
        self.schema_stack
            .pop()
            .ok_or_else(|| underflow("schema", "on_exit_resource"))?;

        if !self.value_stack.is_empty()
            || !self.schema_stack.is_empty()
            || !self.slicing_stack.is_empty()
            || !self.slice_stack.is_empty()
        {
            return Err(FhirDefaultsError::invariant_violation(
                "frames left on the stacks after exiting the resource",
            ));
        }
        self.finished = true;
        Ok(())
    }

    fn on_enter_element(
        &mut self,
        path: &str,
        element: &ElementSpec,
        context: &ElementsContext<'_>,
    ) -> Result<()> {
        let parent = self.current_frame("on_enter_element")?;
        let parent_path = parent.path.clone();
        let parent_slots = parent.slots.clone();

        let key = path
            .strip_prefix(parent_path.as_str())
            .and_then(|rest| rest.strip_prefix('.'))
            .filter(|key| !key.is_empty())
            .ok_or_else(|| {
                FhirDefaultsError::invariant_violation(format!(
                    "{path} is not beneath the current value path {parent_path}"
                ))
            })?;
        let lookup = context.scoped(&parent_path).ok_or_else(|| {
            FhirDefaultsError::invariant_violation(format!(
                "no element definitions for {parent_path} in scope {}",
                context.path
            ))
        })?;

        let mut slots = Vec::new();
        for parent_slot in &parent_slots {
            let targets = parent_slot.targets(&self.document);
            if targets.is_empty() {
                let pointer = Self::absent_child(parent_slot, key, &lookup);
                let declared = element.first_type_code().unwrap_or(UNDEFINED_TYPE);
                slots.push(Slot::single(pointer, declared));
                continue;
            }

            for target in targets {
                if let Some(value) = target.get_mut(&mut self.document) {
                    let scaffolded = apply_minimum(value, &parent_path, key, element, context);
                    let defaulted =
                        apply_fixed_or_pattern(value, &parent_path, key, element, context);
                    if scaffolded + defaulted > 0 {
                        trace!("{path} at {target}: {scaffolded} scaffolded, {defaulted} set");
                    }
                }

                let Some(value) = target.get(&self.document) else {
                    continue;
                };
                for property in get_nested_value(
                    value,
                    &parent_slot.type_tag,
                    key,
                    &lookup,
                    AccessOptions::default(),
                ) {
                    slots.push(Self::slot_from_property(&target, property, element));
                }
            }
        }

        if self.options.fill_required_sequences
            && element.is_array
            && element.is_required()
            && element.is_complex()
            && element.active_slicing().is_none()
        {
            for slot in &mut slots {
                self.seed_required_sequence(slot);
            }
        }

        debug!("Entered {path} with {} value(s)", slots.len());
        self.value_stack.push(ValueFrame {
            path: path.to_string(),
            slots,
        });
        Ok(())
    }

    fn on_exit_element(
        &mut self,
        path: &str,
        _element: &ElementSpec,
        _context: &ElementsContext<'_>,
    ) -> Result<()> {
        let frame = self.pop_value_frame(path, "on_exit_element")?;
        let present = frame
            .slots
            .iter()
            .filter(|slot| !slot.tagged(&self.document).is_absent())
            .count();
        trace!("Exited {path}: {present}/{} present", frame.slots.len());
        Ok(())
    }

    fn on_enter_slicing(&mut self, path: &str, slicing: &SlicingRules) -> Result<()> {
        let current = self.current_frame("on_enter_slicing")?;
        if current.path != path {
            return Err(FhirDefaultsError::invariant_violation(format!(
                "slicing for {path} entered while at {}",
                current.path
            )));
        }

        self.slicing_stack.push(SlicingFrame {
            path: path.to_string(),
            accumulator: slicing
                .slices
                .iter()
                .map(|slice| (slice.name.clone(), Vec::new()))
                .collect(),
            claimed: HashSet::new(),
            synthesized: Vec::new(),
        });
        Ok(())
    }

    fn on_exit_slicing(&mut self, path: &str, _slicing: &SlicingRules) -> Result<()> {
        let frame = self
            .slicing_stack
            .pop()
            .ok_or_else(|| underflow("slicing", "on_exit_slicing"))?;
        if frame.path != path {
            return Err(FhirDefaultsError::invariant_violation(format!(
                "exit slicing for {path} but the current slicing is {}",
                frame.path
            )));
        }

        for (name, members) in &frame.accumulator {
            debug!("{path}:{name} holds {} item(s)", members.len());
        }
        if !frame.synthesized.is_empty() {
            debug!("{path}: {} placeholder(s) added", frame.synthesized.len());
        }
        Ok(())
    }

    fn on_enter_slice(
        &mut self,
        path: &str,
        slicing: &SlicingRules,
        slice: &SliceDefinition,
        nested: Option<&TypeSchema>,
    ) -> Result<()> {
        let parent = self.current_frame("on_enter_slice")?;
        if parent.path != path {
            return Err(FhirDefaultsError::invariant_violation(format!(
                "slice {path}:{} entered while at {}",
                slice.name, parent.path
            )));
        }
        let parent_slots = parent.slots.clone();
        let resolver = self.resolver;

        let mut slots = Vec::with_capacity(parent_slots.len());
        for parent_slot in &parent_slots {
            let members = match &parent_slot.members {
                Some(members) => members.clone(),
                None => match parent_slot.pointer.get(&self.document) {
                    None | Some(Value::Null) => Vec::new(),
                    Some(Value::Array(items)) => {
                        (0..items.len()).map(|i| parent_slot.pointer.index(i)).collect()
                    }
                    Some(other) => {
                        return Err(FhirDefaultsError::invariant_violation(format!(
                            "slicing applied to a non-sequence at {path} ({}): {other}",
                            parent_slot.pointer
                        )));
                    }
                },
            };

            let slicing_frame = self
                .slicing_stack
                .last()
                .ok_or_else(|| underflow("slicing", "on_enter_slice"))?;
            let mut matched: Vec<ValuePath> = members
                .into_iter()
                .filter(|member| !slicing_frame.claimed.contains(member))
                .filter(|member| {
                    member.get(&self.document).is_some_and(|value| {
                        get_value_slice_name(value, slicing, resolver) == Some(slice.name.as_str())
                    })
                })
                .collect();

            let mut placeholder = None;
            if matched.is_empty() && slice.min > 0 {
                placeholder = self.append_placeholder(&parent_slot.pointer);
                match &placeholder {
                    Some(pointer) => {
                        debug!("Added placeholder {pointer} for slice {path}:{}", slice.name);
                        matched.push(pointer.clone());
                    }
                    None => warn!(
                        "Cannot add placeholder for required slice {path}:{} at {}",
                        slice.name, parent_slot.pointer
                    ),
                }
            }

            self.apply_slice_default(slice, &matched);

            let slicing_frame = self
                .slicing_stack
                .last_mut()
                .ok_or_else(|| underflow("slicing", "on_enter_slice"))?;
            slicing_frame.claimed.extend(matched.iter().cloned());
            slicing_frame.synthesized.extend(placeholder);
            slicing_frame
                .accumulator
                .entry(slice.name.clone())
                .or_default()
                .extend(matched.iter().cloned());

            let type_tag = nested
                .map(|schema| schema.type_name.clone())
                .or_else(|| slice.first_type_code().map(str::to_string))
                .unwrap_or_else(|| parent_slot.type_tag.clone());
            slots.push(Slot {
                pointer: parent_slot.pointer.clone(),
                type_tag,
                members: Some(matched),
            });
        }

        if let Some(schema) = nested {
            self.schema_stack.push(SchemaFrame {
                name: schema.name.clone(),
                url: schema.url.clone(),
            });
        }
        self.slice_stack.push(SliceFrame {
            name: slice.name.clone(),
            pushed_schema: nested.is_some(),
        });
        self.value_stack.push(ValueFrame {
            path: path.to_string(),
            slots,
        });
        Ok(())
    }

    fn on_exit_slice(
        &mut self,
        path: &str,
        _slicing: &SlicingRules,
        slice: &SliceDefinition,
        _nested: Option<&TypeSchema>,
    ) -> Result<()> {
        let frame = self.pop_value_frame(path, "on_exit_slice")?;
        let slice_frame = self
            .slice_stack
            .pop()
            .ok_or_else(|| underflow("slice", "on_exit_slice"))?;
        if slice_frame.name != slice.name {
            return Err(FhirDefaultsError::invariant_violation(format!(
                "exit slice {} while inside slice {}",
                slice.name, slice_frame.name
            )));
        }
        if slice_frame.pushed_schema {
            let schema = self
                .schema_stack
                .pop()
                .ok_or_else(|| underflow("schema", "on_exit_slice"))?;
            trace!("Left nested schema {} ({:?})", schema.name, schema.url);
        }

        let parent = self
            .value_stack
            .last_mut()
            .ok_or_else(|| underflow("value", "on_exit_slice"))?;
        if parent.slots.len() != frame.slots.len() {
            return Err(FhirDefaultsError::invariant_violation(format!(
                "slice {path}:{} has {} value(s) for {} parent value(s)",
                slice.name,
                frame.slots.len(),
                parent.slots.len()
            )));
        }

        for (parent_slot, slice_slot) in parent.slots.iter_mut().zip(frame.slots) {
            let Some(slice_members) = slice_slot.members.filter(|m| !m.is_empty()) else {
                continue;
            };
            let members = parent_slot.members.get_or_insert_with(Vec::new);
            for member in slice_members {
                if !members.contains(&member) {
                    members.push(member);
                }
            }
        }
        Ok(())
    }
}
