use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SiftError};

/// Index identifier — a plain string like `"products"`.
pub type IndexName = String;
/// Document identifier — the value of the identifier field, used for shard
/// routing and as the engine storage key.
pub type DocumentId = String;

/// Field that carries the document identifier unless the caller overrides it.
pub const DEFAULT_ID_FIELD: &str = "id";

/// A document with an identifier and an ordered set of named fields.
///
/// Fields are opaque to the orchestration layer: no schema is enforced, and
/// nesting is preserved as-is. Use [`Document::from_json`] to parse one from
/// a JSON object, or [`Document::from_json_tagged`] when the identifier comes
/// from an out-of-band source (a bulk action line).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub fields: IndexMap<String, FieldValue>,
}

impl Document {
    /// Parse a [`Document`] from a JSON object, taking the identifier from
    /// `id_field`. The identifier field stays in `fields` so the stored
    /// source round-trips byte-for-byte.
    ///
    /// # Errors
    ///
    /// [`SiftError::InvalidDocument`] if the value is not a JSON object,
    /// [`SiftError::MissingId`] if `id_field` is absent or not a string.
    pub fn from_json(json: &serde_json::Value, id_field: &str) -> Result<Self> {
        let obj = json
            .as_object()
            .ok_or_else(|| SiftError::InvalidDocument("expected a JSON object".to_string()))?;

        let id = match obj.get(id_field) {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(_) | None => return Err(SiftError::MissingId(id_field.to_string())),
        };

        let mut fields = IndexMap::new();
        for (key, val) in obj {
            if let Some(field_value) = json_value_to_field_value(val) {
                fields.insert(key.clone(), field_value);
            }
        }

        Ok(Document { id, fields })
    }

    /// Parse a [`Document`] from a JSON object whose identifier was supplied
    /// separately, tagging it into `fields` under [`DEFAULT_ID_FIELD`].
    /// This is the bulk-ingest path: the `_id` comes from the action line
    /// preceding the data line.
    pub fn from_json_tagged(id: impl Into<DocumentId>, json: &serde_json::Value) -> Result<Self> {
        let id = id.into();
        let obj = json
            .as_object()
            .ok_or_else(|| SiftError::InvalidDocument("expected a JSON object".to_string()))?;

        let mut fields = IndexMap::new();
        fields.insert(
            DEFAULT_ID_FIELD.to_string(),
            FieldValue::Text(id.clone()),
        );
        for (key, val) in obj {
            if let Some(field_value) = json_value_to_field_value(val) {
                fields.insert(key.clone(), field_value);
            }
        }

        Ok(Document { id, fields })
    }

    /// Render the stored fields back to a JSON object. The identifier is not
    /// injected; it appears only if it was part of the original fields.
    pub fn to_json(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        for (key, field_value) in &self.fields {
            map.insert(key.clone(), field_value_to_json_value(field_value));
        }
        serde_json::Value::Object(map)
    }

    /// Approximate serialized size in bytes, used for the per-shard batch
    /// flush threshold. Cheap structural estimate, not an exact encoding.
    pub fn approx_size(&self) -> usize {
        self.id.len()
            + self
                .fields
                .iter()
                .map(|(k, v)| k.len() + field_value_size(v))
                .sum::<usize>()
    }
}

fn field_value_size(value: &FieldValue) -> usize {
    match value {
        FieldValue::Text(s) => s.len(),
        FieldValue::Integer(_) | FieldValue::Float(_) => 8,
        FieldValue::Bool(_) => 1,
        FieldValue::Array(items) => items.iter().map(field_value_size).sum(),
        FieldValue::Object(map) => map
            .iter()
            .map(|(k, v)| k.len() + field_value_size(v))
            .sum(),
    }
}

/// Convert a JSON value to a [`FieldValue`]. Nulls are dropped (no tri-state
/// semantics in the engine), everything else maps one-to-one.
pub fn json_value_to_field_value(val: &serde_json::Value) -> Option<FieldValue> {
    match val {
        serde_json::Value::String(s) => Some(FieldValue::Text(s.clone())),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(FieldValue::Integer(i))
            } else {
                n.as_f64().map(FieldValue::Float)
            }
        }
        serde_json::Value::Bool(b) => Some(FieldValue::Bool(*b)),
        serde_json::Value::Array(arr) => Some(FieldValue::Array(
            arr.iter().filter_map(json_value_to_field_value).collect(),
        )),
        serde_json::Value::Object(obj) => {
            let mut nested = IndexMap::new();
            for (k, v) in obj {
                if let Some(field_val) = json_value_to_field_value(v) {
                    nested.insert(k.clone(), field_val);
                }
            }
            Some(FieldValue::Object(nested))
        }
        serde_json::Value::Null => None,
    }
}

pub fn field_value_to_json_value(field_value: &FieldValue) -> serde_json::Value {
    match field_value {
        FieldValue::Text(s) => serde_json::Value::String(s.clone()),
        FieldValue::Integer(i) => serde_json::json!(i),
        FieldValue::Float(f) => serde_json::json!(f),
        FieldValue::Bool(b) => serde_json::Value::Bool(*b),
        FieldValue::Array(arr) => {
            serde_json::Value::Array(arr.iter().map(field_value_to_json_value).collect())
        }
        FieldValue::Object(obj) => {
            let mut map = serde_json::Map::new();
            for (k, v) in obj {
                map.insert(k.clone(), field_value_to_json_value(v));
            }
            serde_json::Value::Object(map)
        }
    }
}

/// A dynamically-typed field value stored in a [`Document`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum FieldValue {
    Object(IndexMap<String, FieldValue>),
    Array(Vec<FieldValue>),
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
}
