use serde::{Deserialize, Serialize};
use std::fmt;

use super::{ElementMap, ElementSpec};

/// One resolved structural profile or base type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TypeSchema {
    pub name: String,

    /// Resource or data type the schema constrains; the root of every path.
    #[serde(rename = "type")]
    pub type_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default)]
    pub elements: ElementMap,
}

impl TypeSchema {
    pub fn new(type_name: impl Into<String>) -> Self {
        let type_name = type_name.into();
        Self {
            name: type_name.clone(),
            type_name,
            url: None,
            elements: ElementMap::new(),
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_element(mut self, path: impl Into<String>, element: ElementSpec) -> Self {
        self.elements.insert(path.into(), element);
        self
    }

    pub fn element(&self, path: &str) -> Option<&ElementSpec> {
        self.elements.get(path)
    }

    /// Profile URLs referenced by slices anywhere in this schema, including
    /// inside embedded nested schemas.
    pub fn referenced_profiles(&self) -> Vec<String> {
        let mut urls = Vec::new();
        collect_slice_profiles(&self.elements, &mut urls);
        urls
    }

    pub fn validate_structure(&self) -> crate::Result<()> {
        if self.type_name.is_empty() {
            return Err(crate::FhirDefaultsError::invalid_schema(
                "Schema type cannot be empty",
            ));
        }

        for (path, element) in &self.elements {
            if path.is_empty() || path.split('.').any(str::is_empty) {
                return Err(crate::FhirDefaultsError::invalid_schema(format!(
                    "Invalid element path '{path}' in {}",
                    self.name
                )));
            }
            element.validate()?;
        }

        Ok(())
    }
}

fn collect_slice_profiles(elements: &ElementMap, urls: &mut Vec<String>) {
    for element in elements.values() {
        let Some(slicing) = &element.slicing else {
            continue;
        };
        for slice in &slicing.slices {
            if slice.type_schema.is_none()
                && let Some(url) = slice.type_profile()
                && !urls.iter().any(|known| known == url)
            {
                urls.push(url.to_string());
            }
            let nested = slice
                .type_schema
                .as_ref()
                .map(|schema| &schema.elements)
                .unwrap_or(&slice.elements);
            collect_slice_profiles(nested, urls);
        }
    }
}

impl fmt::Display for TypeSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeSchema({})", self.type_name)?;
        if self.name != self.type_name {
            write!(f, " - {}", self.name)?;
        }
        if let Some(url) = &self.url {
            write!(f, " [{url}]")?;
        }
        Ok(())
    }
}
