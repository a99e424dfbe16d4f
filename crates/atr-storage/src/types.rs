//! Row and document types shared by every store backend.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::OffsetDateTime;

use atr_core::ResourceType;
use atr_core::time::format_instant;

use crate::error::StorageError;

/// The JSON payload of a stored row.
///
/// Always a JSON object. Rows never carry `id` or `meta`; those are
/// materialized from columns when the row is read back.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document(Map<String, Value>);

impl Document {
    /// Parses the `data` column text.
    pub fn from_text(text: &str) -> Result<Self, StorageError> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| StorageError::invalid_document(format!("malformed JSON: {e}")))?;
        Self::from_value(value)
    }

    /// Validates an already parsed JSON value.
    pub fn from_value(value: Value) -> Result<Self, StorageError> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(StorageError::invalid_document(format!(
                "expected a JSON object, got {}",
                json_kind(&other)
            ))),
        }
    }

    /// Serializes the document for the `data` column.
    pub fn to_text(&self) -> Result<String, StorageError> {
        serde_json::to_string(&self.0).map_err(|e| StorageError::internal(e.to_string()))
    }

    pub fn resource_type(&self) -> Option<&str> {
        self.0.get("resourceType").and_then(Value::as_str)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn as_object(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// One stored row: the `id`, `data` and `last_updated_ts` columns plus the
/// version tag assigned when the row was written.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceRecord {
    pub resource_type: ResourceType,
    pub id: i64,
    pub version_id: String,
    pub document: Document,
    pub last_updated: OffsetDateTime,
}

impl ResourceRecord {
    /// Materializes the FHIR resource, stamping `id` and `meta` from the row.
    pub fn to_resource(&self) -> Value {
        let mut map = self.document.as_object().clone();
        map.insert(
            "resourceType".to_string(),
            Value::String(self.resource_type.as_str().to_string()),
        );
        map.insert("id".to_string(), Value::String(self.id.to_string()));
        map.insert(
            "meta".to_string(),
            serde_json::json!({
                "versionId": self.version_id,
                "lastUpdated": format_instant(&self.last_updated),
            }),
        );
        Value::Object(map)
    }
}

/// A row to insert. The store assigns the id.
#[derive(Debug, Clone)]
pub struct NewRecord {
    pub document: Document,
    pub version_id: String,
    pub last_updated: OffsetDateTime,
}

/// Replacement content for an existing row. The store derives the version tag.
#[derive(Debug, Clone)]
pub struct UpdateRecord {
    pub document: Document,
    pub last_updated: OffsetDateTime,
}

/// Result of executing a [`StoreQuery`](crate::StoreQuery).
#[derive(Debug, Clone, Default)]
pub struct QueryOutput {
    /// Matching rows after sort, offset and limit.
    pub records: Vec<ResourceRecord>,
    /// Number of matching rows before offset and limit.
    pub total: usize,
}

impl QueryOutput {
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
