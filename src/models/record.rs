//! Timeline records and their storage shape.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Stable identity of a record within an entity's collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    /// Creates a new record ID.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for RecordId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// One timeline item as returned by the source.
///
/// `created_at` is kept verbatim (ISO-8601, usually with millisecond
/// precision and a `Z` suffix). Everything else the source returned lives in
/// `fields`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Identity, unique within the owning collection.
    pub id: RecordId,
    /// Creation timestamp as reported by the source.
    pub created_at: String,
    /// Remaining payload (text, metrics, references).
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Record {
    /// Creates a record with no payload fields.
    #[must_use]
    pub fn new(id: impl Into<RecordId>, created_at: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            created_at: created_at.into(),
            fields: Map::new(),
        }
    }

    /// Sets a payload field.
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Sets the `text` payload field.
    #[must_use]
    pub fn with_text(self, text: impl Into<String>) -> Self {
        self.with_field("text", text.into())
    }

    /// Returns the `text` payload, if present and a string.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        self.fields.get("text").and_then(Value::as_str)
    }

    /// Returns a copy restricted to the projected fields.
    #[must_use]
    pub fn project(&self, projection: &Projection) -> Self {
        match projection {
            Projection::All => self.clone(),
            Projection::Fields(keep) => Self {
                id: self.id.clone(),
                created_at: self.created_at.clone(),
                fields: self
                    .fields
                    .iter()
                    .filter(|(key, _)| keep.iter().any(|k| k == *key))
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect(),
            },
        }
    }
}

/// Attribute subset returned by full-collection loads.
///
/// Identity and `created_at` are always part of the result.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Projection {
    /// Every stored field.
    #[default]
    All,
    /// Only the named payload fields.
    Fields(Vec<String>),
}

impl Projection {
    /// Projection onto the `text` field only.
    #[must_use]
    pub fn text_only() -> Self {
        Self::Fields(vec!["text".to_string()])
    }
}

/// Storage-shaped record.
///
/// Built from a [`Record`] by a pure mapping: the identity becomes the
/// replace key and the remaining attributes become the document body. The
/// source record is left untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    /// Replace key.
    pub key: String,
    /// Sort attribute.
    pub created_at: String,
    /// Document body (payload fields, identity excluded).
    pub document: Map<String, Value>,
}

impl StoredRecord {
    /// Serializes the document body for storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the body cannot be encoded as JSON.
    pub fn document_json(&self) -> crate::Result<String> {
        serde_json::to_string(&self.document).map_err(|e| crate::Error::OperationFailed {
            operation: "encode_document".to_string(),
            cause: e.to_string(),
        })
    }

    /// Rebuilds a stored record from its persisted columns.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not a JSON object.
    pub fn from_columns(key: String, created_at: String, document: &str) -> crate::Result<Self> {
        let document: Map<String, Value> =
            serde_json::from_str(document).map_err(|e| crate::Error::OperationFailed {
                operation: "decode_document".to_string(),
                cause: format!("record '{key}': {e}"),
            })?;
        Ok(Self {
            key,
            created_at,
            document,
        })
    }

    /// Converts back into the domain record.
    #[must_use]
    pub fn into_record(self) -> Record {
        Record {
            id: RecordId::new(self.key),
            created_at: self.created_at,
            fields: self.document,
        }
    }
}

impl From<&Record> for StoredRecord {
    fn from(record: &Record) -> Self {
        Self {
            key: record.id.as_str().to_string(),
            created_at: record.created_at.clone(),
            document: record.fields.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_deserializes_source_payload() {
        let value = json!({
            "id": "1745",
            "created_at": "2024-01-03T00:00:00.000Z",
            "text": "hello",
            "public_metrics": {"like_count": 3}
        });
        let record: Record = serde_json::from_value(value).unwrap();
        assert_eq!(record.id.as_str(), "1745");
        assert_eq!(record.created_at, "2024-01-03T00:00:00.000Z");
        assert_eq!(record.text(), Some("hello"));
        assert!(record.fields.contains_key("public_metrics"));
        assert!(!record.fields.contains_key("id"));
    }

    #[test]
    fn test_stored_record_mapping_leaves_source_intact() {
        let record = Record::new("7", "2024-01-01T00:00:00").with_text("a");
        let stored = StoredRecord::from(&record);

        assert_eq!(stored.key, "7");
        assert_eq!(stored.document.get("text"), Some(&json!("a")));
        assert_eq!(record.id.as_str(), "7");
        assert_eq!(stored.clone().into_record(), record);
    }

    #[test]
    fn test_stored_record_columns() {
        let record = Record::new("9", "2024-01-01T00:00:00").with_field("lang", "en");
        let stored = StoredRecord::from(&record);
        let body = stored.document_json().unwrap();
        let restored =
            StoredRecord::from_columns("9".to_string(), record.created_at.clone(), &body).unwrap();
        assert_eq!(restored, stored);

        assert!(StoredRecord::from_columns("9".to_string(), String::new(), "[1]").is_err());
    }

    #[test]
    fn test_projection_keeps_identity() {
        let record = Record::new("1", "2024-01-01T00:00:00")
            .with_text("hi")
            .with_field("lang", "en");

        let projected = record.project(&Projection::text_only());
        assert_eq!(projected.id.as_str(), "1");
        assert_eq!(projected.created_at, "2024-01-01T00:00:00");
        assert_eq!(projected.text(), Some("hi"));
        assert!(!projected.fields.contains_key("lang"));

        assert_eq!(record.project(&Projection::All), record);
    }
}
