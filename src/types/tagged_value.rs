use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Type tag carried by absent values.
pub const UNDEFINED_TYPE: &str = "undefined";

/// A JSON value together with the FHIR type it was resolved to.
///
/// The structural shape of a value cannot tell `valueQuantity` from
/// `valueRange`, so every value flowing through the engine keeps the type the
/// schema resolved for it. Absence is a value too: tag `"undefined"` and no
/// payload. Repeated elements are one `TaggedValue` whose payload is an array
/// and whose tag applies to every item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaggedValue {
    #[serde(rename = "type")]
    pub type_tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl TaggedValue {
    pub fn new(type_tag: impl Into<String>, value: Value) -> Self {
        Self {
            type_tag: type_tag.into(),
            value: Some(value),
        }
    }

    pub fn undefined() -> Self {
        Self {
            type_tag: UNDEFINED_TYPE.to_string(),
            value: None,
        }
    }

    /// Build from an optional value; `None` and JSON `null` become `undefined`.
    pub fn from_option(type_tag: impl Into<String>, value: Option<Value>) -> Self {
        match value {
            Some(Value::Null) | None => Self::undefined(),
            Some(value) => Self::new(type_tag, value),
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self.value, None | Some(Value::Null))
    }

    pub fn is_sequence(&self) -> bool {
        matches!(self.value, Some(Value::Array(_)))
    }

    pub fn as_sequence(&self) -> Option<&Vec<Value>> {
        self.value.as_ref().and_then(Value::as_array)
    }

    /// Split a sequence into one tagged value per item, sharing the tag.
    pub fn items(&self) -> Vec<TaggedValue> {
        match &self.value {
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| TaggedValue::new(self.type_tag.clone(), item.clone()))
                .collect(),
            _ => Vec::new(),
        }
    }
}

impl fmt::Display for TaggedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "{}({value})", self.type_tag),
            None => write!(f, "{}", self.type_tag),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_undefined_has_tag_and_no_value() {
        let tv = TaggedValue::undefined();
        assert_eq!(tv.type_tag, "undefined");
        assert!(tv.value.is_none());
        assert!(tv.is_absent());
    }

    #[test]
    fn test_null_is_treated_as_absent() {
        let tv = TaggedValue::from_option("string", Some(Value::Null));
        assert_eq!(tv, TaggedValue::undefined());
    }

    #[test]
    fn test_sequence_items_share_tag() {
        let tv = TaggedValue::new("Coding", json!([{"code": "a"}, {"code": "b"}]));
        let items = tv.items();
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|item| item.type_tag == "Coding"));
        assert_eq!(items[1].value, Some(json!({"code": "b"})));
    }

    #[test]
    fn test_serde_shape() {
        let tv = TaggedValue::new("code", json!("final"));
        let encoded = serde_json::to_value(&tv).unwrap();
        assert_eq!(encoded, json!({"type": "code", "value": "final"}));

        let decoded: TaggedValue = serde_json::from_value(json!({"type": "undefined"})).unwrap();
        assert!(decoded.is_absent());
    }
}
