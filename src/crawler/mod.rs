//! Depth-first walk over a type schema.
//!
//! Hook order for one element:
//!
//! ```text
//! enter element
//!   enter slicing            (only when the element declares slices)
//!     enter slice            (each slice, in declaration order)
//!       ...slice elements...
//!     exit slice
//!   exit slicing
//!   ...child elements...
//! exit element
//! ```

use std::ops::Deref;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::Result;
use crate::navigation::ScopedElements;
use crate::provider::SchemaResolver;
use crate::types::{ElementMap, ElementSpec, SliceDefinition, SlicingRules, TypeSchema};

/// Nested slice profiles deeper than this are not crawled.
pub const MAX_NESTED_DEPTH: usize = 16;

/// Callbacks driven by [`SchemaCrawler`]. Every hook defaults to a no-op.
#[allow(unused_variables)]
pub trait SchemaVisitor {
    fn on_enter_resource(&mut self, schema: &TypeSchema) -> Result<()> {
        Ok(())
    }

    fn on_exit_resource(&mut self, schema: &TypeSchema) -> Result<()> {
        Ok(())
    }

    fn on_enter_element(
        &mut self,
        path: &str,
        element: &ElementSpec,
        context: &ElementsContext<'_>,
    ) -> Result<()> {
        Ok(())
    }

    fn on_exit_element(
        &mut self,
        path: &str,
        element: &ElementSpec,
        context: &ElementsContext<'_>,
    ) -> Result<()> {
        Ok(())
    }

    fn on_enter_slicing(&mut self, path: &str, slicing: &SlicingRules) -> Result<()> {
        Ok(())
    }

    fn on_exit_slicing(&mut self, path: &str, slicing: &SlicingRules) -> Result<()> {
        Ok(())
    }

    fn on_enter_slice(
        &mut self,
        path: &str,
        slicing: &SlicingRules,
        slice: &SliceDefinition,
        nested: Option<&TypeSchema>,
    ) -> Result<()> {
        Ok(())
    }

    fn on_exit_slice(
        &mut self,
        path: &str,
        slicing: &SlicingRules,
        slice: &SliceDefinition,
        nested: Option<&TypeSchema>,
    ) -> Result<()> {
        Ok(())
    }
}

/// Element definitions visible from one crawl scope.
///
/// `elements` are keyed relative to `path`: the schema's type name at the
/// top level, the sliced element's path inside a slice.
#[derive(Debug, Clone)]
pub struct ElementsContext<'a> {
    pub path: String,
    pub elements: &'a ElementMap,
    /// Type of the value at `path`, when known.
    pub type_name: Option<String>,
}

impl<'a> ElementsContext<'a> {
    pub fn new(path: impl Into<String>, elements: &'a ElementMap) -> Self {
        Self {
            path: path.into(),
            elements,
            type_name: None,
        }
    }

    pub fn with_type_name(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = Some(type_name.into());
        self
    }

    /// Type code of the value at `path`: the scope's own type, or the first
    /// declared type of the element there.
    pub fn type_at(&self, path: &str) -> Option<&str> {
        match self.relative_path(path)? {
            "" => self.type_name.as_deref(),
            relative => self.elements.get(relative)?.first_type_code(),
        }
    }

    /// Path of `path` relative to this scope, `""` for the scope itself.
    pub fn relative_path<'p>(&self, path: &'p str) -> Option<&'p str> {
        if path == self.path {
            return Some("");
        }
        path.strip_prefix(self.path.as_str())?.strip_prefix('.')
    }

    pub fn get_element_by_path(&self, path: &str) -> Option<&'a ElementSpec> {
        let relative = self.relative_path(path)?;
        self.elements.get(relative)
    }

    /// Lookup for paths relative to the value at `path`.
    pub fn scoped<'p>(&self, path: &'p str) -> Option<ScopedElements<'p>>
    where
        'a: 'p,
    {
        Some(ScopedElements::new(self.elements, self.relative_path(path)?))
    }
}

/// A slice's nested schema, either embedded in the slice or resolved by URL.
#[derive(Debug, Clone)]
pub enum NestedSchema<'a> {
    Embedded(&'a TypeSchema),
    Resolved(Arc<TypeSchema>),
}

impl Deref for NestedSchema<'_> {
    type Target = TypeSchema;

    fn deref(&self) -> &TypeSchema {
        match self {
            Self::Embedded(schema) => schema,
            Self::Resolved(schema) => schema,
        }
    }
}

pub fn nested_schema_for<'a>(
    slice: &'a SliceDefinition,
    resolver: Option<&dyn SchemaResolver>,
) -> Option<NestedSchema<'a>> {
    if let Some(schema) = slice.type_schema.as_deref() {
        return Some(NestedSchema::Embedded(schema));
    }
    let url = slice.type_profile()?;
    match resolver.and_then(|r| r.resolve(url)) {
        Some(schema) => Some(NestedSchema::Resolved(schema)),
        None => {
            debug!("Slice {} references unresolved profile {url}", slice.name);
            None
        }
    }
}

/// Elements grouped under their longest declared ancestor.
struct ElementTree<'a> {
    entries: Vec<(&'a str, &'a ElementSpec)>,
    roots: Vec<usize>,
    children: Vec<Vec<usize>>,
}

impl<'a> ElementTree<'a> {
    fn build(elements: &'a ElementMap) -> Self {
        let entries: Vec<(&str, &ElementSpec)> =
            elements.iter().map(|(k, v)| (k.as_str(), v)).collect();
        let mut roots = Vec::new();
        let mut children = vec![Vec::new(); entries.len()];

        for (i, &(key, _)) in entries.iter().enumerate() {
            let parent = key
                .match_indices('.')
                .map(|(pos, _)| &key[..pos])
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .find_map(|prefix| elements.get_index_of(prefix));
            match parent {
                Some(parent) => children[parent].push(i),
                None => roots.push(i),
            }
        }

        Self {
            entries,
            roots,
            children,
        }
    }
}

pub struct SchemaCrawler<'a> {
    schema: &'a TypeSchema,
    resolver: Option<&'a dyn SchemaResolver>,
}

impl<'a> SchemaCrawler<'a> {
    pub fn new(schema: &'a TypeSchema) -> Self {
        Self {
            schema,
            resolver: None,
        }
    }

    pub fn with_resolver(mut self, resolver: &'a dyn SchemaResolver) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn crawl(&self, visitor: &mut impl SchemaVisitor) -> Result<()> {
        visitor.on_enter_resource(self.schema)?;
        let context = ElementsContext::new(self.schema.type_name.as_str(), &self.schema.elements)
            .with_type_name(self.schema.type_name.as_str());
        self.crawl_elements(&context, visitor, 0)?;
        visitor.on_exit_resource(self.schema)
    }

    fn crawl_elements(
        &self,
        context: &ElementsContext<'_>,
        visitor: &mut impl SchemaVisitor,
        depth: usize,
    ) -> Result<()> {
        let tree = ElementTree::build(context.elements);
        for &root in &tree.roots {
            self.crawl_element(context, &tree, root, visitor, depth)?;
        }
        Ok(())
    }

    fn crawl_element(
        &self,
        context: &ElementsContext<'_>,
        tree: &ElementTree<'_>,
        index: usize,
        visitor: &mut impl SchemaVisitor,
        depth: usize,
    ) -> Result<()> {
        let (key, element) = tree.entries[index];
        let path = format!("{}.{key}", context.path);

        visitor.on_enter_element(&path, element, context)?;

        if let Some(slicing) = element.active_slicing() {
            visitor.on_enter_slicing(&path, slicing)?;
            for slice in &slicing.slices {
                let resolved = nested_schema_for(slice, self.resolver);
                let nested = resolved.as_deref();
                visitor.on_enter_slice(&path, slicing, slice, nested)?;

                if depth < MAX_NESTED_DEPTH {
                    let mut slice_context =
                        ElementsContext::new(path.as_str(), slice.effective_elements(nested));
                    let slice_type = nested
                        .map(|schema| schema.type_name.as_str())
                        .or_else(|| slice.first_type_code())
                        .or_else(|| element.first_type_code());
                    if let Some(type_name) = slice_type {
                        slice_context = slice_context.with_type_name(type_name);
                    }
                    self.crawl_elements(&slice_context, visitor, depth + 1)?;
                } else {
                    warn!("Not crawling slice {} at {path}: nesting too deep", slice.name);
                }

                visitor.on_exit_slice(&path, slicing, slice, nested)?;
            }
            visitor.on_exit_slicing(&path, slicing)?;
        }

        for &child in &tree.children[index] {
            self.crawl_element(context, tree, child, visitor, depth)?;
        }

        visitor.on_exit_element(&path, element, context)
    }
}

/// Records crawl events as readable lines.
#[derive(Debug, Default)]
pub struct EventRecorder {
    pub events: Vec<String>,
    depth: usize,
}

impl EventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, event: String) {
        self.events.push(format!("{}{event}", "  ".repeat(self.depth)));
    }
}

impl SchemaVisitor for EventRecorder {
    fn on_enter_resource(&mut self, schema: &TypeSchema) -> Result<()> {
        self.push(format!("enter resource {}", schema.type_name));
        self.depth += 1;
        Ok(())
    }

    fn on_exit_resource(&mut self, schema: &TypeSchema) -> Result<()> {
        self.depth = self.depth.saturating_sub(1);
        self.push(format!("exit resource {}", schema.type_name));
        Ok(())
    }

    fn on_enter_element(
        &mut self,
        path: &str,
        element: &ElementSpec,
        _context: &ElementsContext<'_>,
    ) -> Result<()> {
        self.push(format!("enter element {path} ({element})"));
        self.depth += 1;
        Ok(())
    }

    fn on_exit_element(
        &mut self,
        path: &str,
        _element: &ElementSpec,
        _context: &ElementsContext<'_>,
    ) -> Result<()> {
        self.depth = self.depth.saturating_sub(1);
        self.push(format!("exit element {path}"));
        Ok(())
    }

    fn on_enter_slicing(&mut self, path: &str, slicing: &SlicingRules) -> Result<()> {
        let discriminators: Vec<String> = slicing
            .discriminator
            .iter()
            .map(|d| format!("{}:{}", d.discriminator_type, d.path))
            .collect();
        self.push(format!("enter slicing {path} [{}]", discriminators.join(", ")));
        self.depth += 1;
        Ok(())
    }

    fn on_exit_slicing(&mut self, path: &str, _slicing: &SlicingRules) -> Result<()> {
        self.depth = self.depth.saturating_sub(1);
        self.push(format!("exit slicing {path}"));
        Ok(())
    }

    fn on_enter_slice(
        &mut self,
        path: &str,
        _slicing: &SlicingRules,
        slice: &SliceDefinition,
        nested: Option<&TypeSchema>,
    ) -> Result<()> {
        match nested {
            Some(schema) => self.push(format!("enter slice {path}:{} -> {schema}", slice.name)),
            None => self.push(format!("enter slice {path}:{}", slice.name)),
        }
        self.depth += 1;
        Ok(())
    }

    fn on_exit_slice(
        &mut self,
        path: &str,
        _slicing: &SlicingRules,
        slice: &SliceDefinition,
        _nested: Option<&TypeSchema>,
    ) -> Result<()> {
        self.depth = self.depth.saturating_sub(1);
        self.push(format!("exit slice {path}:{}", slice.name));
        Ok(())
    }
}
