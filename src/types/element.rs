use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::{SlicingRules, TaggedValue};

/// Elements keyed by dotted path relative to the owning schema (or slice).
pub type ElementMap = IndexMap<String, ElementSpec>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ElementType {
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<Vec<String>>,
}

impl ElementType {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            profile: None,
        }
    }

    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile.get_or_insert_with(Vec::new).push(profile.into());
        self
    }

    pub fn first_profile(&self) -> Option<&str> {
        self.profile
            .as_ref()
            .and_then(|profiles| profiles.first())
            .map(String::as_str)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ElementSpec {
    #[serde(rename = "type", default)]
    pub types: Vec<ElementType>,
    #[serde(default)]
    pub is_array: bool,
    #[serde(default)]
    pub min: u32,
    /// `None` means unbounded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed: Option<TaggedValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<TaggedValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slicing: Option<SlicingRules>,
}

/// The profile-mandated default an element carries, if any.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DefaultValue<'a> {
    /// Exact value, only used to seed absence.
    Fixed(&'a TaggedValue),
    /// Partial value, deep-merged into whatever is present.
    Pattern(&'a TaggedValue),
}

impl ElementSpec {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            types: vec![ElementType::new(code)],
            ..Default::default()
        }
    }

    pub fn with_type(mut self, element_type: ElementType) -> Self {
        self.types.push(element_type);
        self
    }

    pub fn with_cardinality(mut self, min: u32, max: Option<u32>) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    pub fn array(mut self) -> Self {
        self.is_array = true;
        self
    }

    pub fn with_fixed(mut self, fixed: TaggedValue) -> Self {
        self.fixed = Some(fixed);
        self
    }

    pub fn with_pattern(mut self, pattern: TaggedValue) -> Self {
        self.pattern = Some(pattern);
        self
    }

    pub fn with_slicing(mut self, slicing: SlicingRules) -> Self {
        self.slicing = Some(slicing);
        self
    }

    pub fn first_type_code(&self) -> Option<&str> {
        self.types.first().map(|t| t.code.as_str())
    }

    /// Complex FHIR type codes start uppercase, primitives lowercase.
    pub fn is_complex(&self) -> bool {
        self.first_type_code().is_some_and(is_complex_type_code)
    }

    pub fn is_required(&self) -> bool {
        self.min > 0
    }

    pub fn default_value(&self) -> Option<DefaultValue<'_>> {
        match (&self.fixed, &self.pattern) {
            (Some(fixed), _) => Some(DefaultValue::Fixed(fixed)),
            (None, Some(pattern)) => Some(DefaultValue::Pattern(pattern)),
            (None, None) => None,
        }
    }

    /// Slicing that actually declares slices.
    pub fn active_slicing(&self) -> Option<&SlicingRules> {
        self.slicing.as_ref().filter(|s| !s.slices.is_empty())
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.fixed.is_some() && self.pattern.is_some() {
            return Err(crate::FhirDefaultsError::invalid_schema(
                "Element declares both a fixed and a pattern value",
            ));
        }

        if let Some(max) = self.max
            && self.min > max
        {
            return Err(crate::FhirDefaultsError::invalid_schema(format!(
                "Invalid cardinality: min={} exceeds max={max}",
                self.min
            )));
        }

        if let Some(slicing) = &self.slicing {
            slicing.validate()?;
        }

        Ok(())
    }
}

impl fmt::Display for ElementSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let codes: Vec<&str> = self.types.iter().map(|t| t.code.as_str()).collect();
        write!(f, "{}", codes.join("|"))?;
        match self.max {
            Some(max) => write!(f, " [{}..{max}]", self.min)?,
            None => write!(f, " [{}..*]", self.min)?,
        }
        if self.is_array {
            write!(f, " array")?;
        }
        Ok(())
    }
}

/// FHIR primitive types
pub const FHIR_PRIMITIVE_TYPES: &[&str] = &[
    "boolean",
    "integer",
    "integer64",
    "string",
    "decimal",
    "uri",
    "url",
    "canonical",
    "base64Binary",
    "instant",
    "date",
    "dateTime",
    "time",
    "code",
    "oid",
    "id",
    "markdown",
    "unsignedInt",
    "positiveInt",
    "uuid",
    "xhtml",
];

pub fn is_complex_type_code(code: &str) -> bool {
    code.chars().next().is_some_and(char::is_uppercase)
}

/// Upper-case the first character (`quantity` -> `Quantity`).
pub fn capitalize(code: &str) -> String {
    let mut chars = code.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
