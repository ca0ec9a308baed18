use serde::{Deserialize, Serialize};
use std::fmt;

use super::{ElementMap, ElementSpec, ElementType, TaggedValue, TypeSchema};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DiscriminatorType {
    #[serde(rename = "value")]
    Value,
    #[serde(rename = "pattern")]
    Pattern,
    #[serde(rename = "type")]
    Type,
    #[serde(rename = "profile")]
    Profile,
    #[serde(rename = "exists")]
    Exists,
}

impl fmt::Display for DiscriminatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Value => "value",
            Self::Pattern => "pattern",
            Self::Type => "type",
            Self::Profile => "profile",
            Self::Exists => "exists",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Discriminator {
    #[serde(rename = "type")]
    pub discriminator_type: DiscriminatorType,
    pub path: String,
}

impl Discriminator {
    pub fn new(discriminator_type: DiscriminatorType, path: impl Into<String>) -> Self {
        Self {
            discriminator_type,
            path: path.into(),
        }
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.path.is_empty() {
            return Err(crate::FhirDefaultsError::invalid_schema(
                "Discriminator path cannot be empty",
            ));
        }
        Ok(())
    }
}

/// Discriminators (combined with AND) plus the slices they select between.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct SlicingRules {
    #[serde(default)]
    pub discriminator: Vec<Discriminator>,
    #[serde(default)]
    pub slices: Vec<SliceDefinition>,
}

impl SlicingRules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_discriminator(mut self, discriminator: Discriminator) -> Self {
        self.discriminator.push(discriminator);
        self
    }

    pub fn with_slice(mut self, slice: SliceDefinition) -> Self {
        self.slices.push(slice);
        self
    }

    pub fn slice(&self, name: &str) -> Option<&SliceDefinition> {
        self.slices.iter().find(|slice| slice.name == name)
    }

    pub fn slice_index(&self, name: &str) -> Option<usize> {
        self.slices.iter().position(|slice| slice.name == name)
    }

    pub fn validate(&self) -> crate::Result<()> {
        for discriminator in &self.discriminator {
            discriminator.validate()?;
        }

        for (i, slice) in self.slices.iter().enumerate() {
            if slice.name.is_empty() {
                return Err(crate::FhirDefaultsError::invalid_schema(
                    "Slice name cannot be empty",
                ));
            }
            if self.slices[..i].iter().any(|other| other.name == slice.name) {
                return Err(crate::FhirDefaultsError::invalid_schema(format!(
                    "Duplicate slice name: {}",
                    slice.name
                )));
            }
            for element in slice.elements.values() {
                element.validate()?;
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct SliceDefinition {
    pub name: String,
    #[serde(default)]
    pub min: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<u32>,
    #[serde(rename = "type", default)]
    pub types: Vec<ElementType>,
    /// Elements of the slice, keyed relative to the sliced element.
    #[serde(default)]
    pub elements: ElementMap,
    /// Nested profile governing the slice's values.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_schema: Option<Box<TypeSchema>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed: Option<TaggedValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<TaggedValue>,
}

impl SliceDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_cardinality(mut self, min: u32, max: Option<u32>) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    pub fn with_type(mut self, element_type: ElementType) -> Self {
        self.types.push(element_type);
        self
    }

    pub fn with_element(mut self, path: impl Into<String>, element: ElementSpec) -> Self {
        self.elements.insert(path.into(), element);
        self
    }

    pub fn with_type_schema(mut self, schema: TypeSchema) -> Self {
        self.type_schema = Some(Box::new(schema));
        self
    }

    pub fn with_pattern(mut self, pattern: TaggedValue) -> Self {
        self.pattern = Some(pattern);
        self
    }

    pub fn first_type_code(&self) -> Option<&str> {
        self.types.first().map(|t| t.code.as_str())
    }

    /// First profile URL declared on the slice's type alternatives.
    pub fn type_profile(&self) -> Option<&str> {
        self.types.iter().find_map(ElementType::first_profile)
    }

    /// Elements consulted when matching discriminators and when crawling.
    pub fn effective_elements<'a>(&'a self, nested: Option<&'a TypeSchema>) -> &'a ElementMap {
        match nested.or(self.type_schema.as_deref()) {
            Some(schema) => &schema.elements,
            None => &self.elements,
        }
    }
}
