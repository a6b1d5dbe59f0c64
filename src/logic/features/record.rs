//! Flow Record - validated request body
//!
//! Single validation pass from the loosely-typed JSON body into numeric
//! features plus optional string metadata. Keys that are neither schema
//! features nor metadata are ignored.

use std::collections::HashMap;

use serde_json::{Map, Value};

use super::schema::FeatureSchema;

/// Non-numeric metadata accepted alongside the features
pub const METADATA_FIELDS: &[&str] = &["src_ip", "dst_ip"];

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RecordError {
    #[error("request body must be a JSON object")]
    NotAnObject,

    #[error("field `{field}` must be {expected}")]
    Mistyped { field: String, expected: &'static str },
}

/// Feature value plus its request text, kept verbatim for the decision log
#[derive(Debug, Clone, PartialEq)]
struct FeatureValue {
    value: f64,
    text: String,
}

impl FeatureValue {
    /// JSON numbers and numeric strings; `None` for anything else
    fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(number) => Some(Self {
                value: number.as_f64()?,
                text: number.to_string(),
            }),
            Value::String(text) => {
                let text = text.trim();
                let value = text.parse::<f64>().ok().filter(|v| v.is_finite())?;
                Some(Self { value, text: text.to_string() })
            }
            _ => None,
        }
    }
}

/// Validated flow description
#[derive(Debug, Clone, Default)]
pub struct FlowRecord {
    features: HashMap<String, FeatureValue>,
    metadata: HashMap<String, String>,
}

impl FlowRecord {
    /// Validate a JSON body against the schema.
    ///
    /// Absent schema features are not an error here; `FeatureSchema::project`
    /// reports them.
    pub fn parse(body: &Value, schema: &FeatureSchema) -> Result<Self, RecordError> {
        let object = body.as_object().ok_or(RecordError::NotAnObject)?;
        Self::from_map(object, schema)
    }

    fn from_map(object: &Map<String, Value>, schema: &FeatureSchema) -> Result<Self, RecordError> {
        let mut record = FlowRecord::default();

        for (key, value) in object {
            if METADATA_FIELDS.contains(&key.as_str()) {
                match value {
                    Value::Null => {}
                    Value::String(text) => {
                        record.metadata.insert(key.clone(), text.clone());
                    }
                    _ => {
                        return Err(RecordError::Mistyped {
                            field: key.clone(),
                            expected: "a string",
                        })
                    }
                }
                continue;
            }

            if !schema.contains(key) {
                continue;
            }

            if value.is_null() {
                continue;
            }
            let feature = FeatureValue::from_json(value).ok_or_else(|| RecordError::Mistyped {
                field: key.clone(),
                expected: "a number",
            })?;
            record.features.insert(key.clone(), feature);
        }

        Ok(record)
    }

    /// Numeric value of a feature, if present
    pub fn feature(&self, name: &str) -> Option<f64> {
        self.features.get(name).map(|f| f.value)
    }

    /// Feature value as it appeared in the request
    pub fn feature_text(&self, name: &str) -> Option<&str> {
        self.features.get(name).map(|f| f.text.as_str())
    }

    pub fn metadata(&self, name: &str) -> Option<&str> {
        self.metadata.get(name).map(String::as_str)
    }

    pub fn feature_count(&self) -> usize {
        self.features.len()
    }
}
