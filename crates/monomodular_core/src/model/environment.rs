//! Environment record domain model.
//!
//! # Responsibility
//! - Hold one named environment setting with an optional JSON value.
//! - Map the record to the `environments` table.
//!
//! # Invariants
//! - `key` is non-blank and unique per store.
//! - `metadata` is always present; a fresh record starts with the default.

use crate::store::{AggregateRoot, StoreError, StoreResult};
use rusqlite::types::Value;
use rusqlite::Row;
use serde::{Deserialize, Serialize};

pub type EnvironmentId = i64;

/// Descriptive data attached to an environment record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentMetadata {
    pub description: Option<String>,
    pub tags: Vec<String>,
}

/// One environment setting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentRecord {
    pub id: EnvironmentId,
    pub key: String,
    /// Arbitrary JSON payload; `None` means unset.
    pub value: Option<serde_json::Value>,
    #[serde(default)]
    pub metadata: EnvironmentMetadata,
}

impl EnvironmentRecord {
    pub fn new(id: EnvironmentId, key: impl Into<String>) -> Self {
        Self {
            id,
            key: key.into(),
            value: None,
            metadata: EnvironmentMetadata::default(),
        }
    }

    pub fn with_value(mut self, value: serde_json::Value) -> Self {
        self.value = Some(value);
        self
    }
}

impl AggregateRoot for EnvironmentRecord {
    type Key = EnvironmentId;

    const TABLE: &'static str = "environments";
    const KEY_COLUMN: &'static str = "id";
    const COLUMNS: &'static [&'static str] = &["key", "value", "metadata"];

    fn key(&self) -> Self::Key {
        self.id
    }

    fn to_columns(&self) -> StoreResult<Vec<Value>> {
        let value = match &self.value {
            Some(value) => Value::Text(serde_json::to_string(value)?),
            None => Value::Null,
        };
        Ok(vec![
            Value::Text(self.key.clone()),
            value,
            Value::Text(serde_json::to_string(&self.metadata)?),
        ])
    }

    fn from_row(row: &Row<'_>) -> StoreResult<Self> {
        let id: EnvironmentId = row.get("id")?;
        let value = match row.get::<_, Option<String>>("value")? {
            Some(text) => Some(serde_json::from_str(&text).map_err(|err| {
                StoreError::InvalidData(format!(
                    "invalid json in environments.value for id {id}: {err}"
                ))
            })?),
            None => None,
        };
        let metadata_text: String = row.get("metadata")?;
        let metadata = serde_json::from_str(&metadata_text).map_err(|err| {
            StoreError::InvalidData(format!(
                "invalid json in environments.metadata for id {id}: {err}"
            ))
        })?;

        Ok(Self {
            id,
            key: row.get("key")?,
            value,
            metadata,
        })
    }

    fn validate(&self) -> StoreResult<()> {
        if self.key.trim().is_empty() {
            return Err(StoreError::Validation(format!(
                "environment {} has a blank key",
                self.id
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{EnvironmentMetadata, EnvironmentRecord};
    use crate::store::{AggregateRoot, StoreError};
    use rusqlite::types::Value;
    use serde_json::json;

    #[test]
    fn new_record_starts_with_default_metadata() {
        let record = EnvironmentRecord::new(1, "a");
        assert_eq!(record.metadata, EnvironmentMetadata::default());
        assert!(record.value.is_none());
    }

    #[test]
    fn columns_follow_declared_order() {
        let record = EnvironmentRecord::new(4, "region").with_value(json!("eu-west"));
        let values = record.to_columns().unwrap();

        assert_eq!(values.len(), EnvironmentRecord::COLUMNS.len());
        assert_eq!(values[0], Value::Text("region".to_string()));
        assert_eq!(values[1], Value::Text("\"eu-west\"".to_string()));
    }

    #[test]
    fn blank_key_fails_validation() {
        let record = EnvironmentRecord::new(2, "  ");
        assert!(matches!(record.validate(), Err(StoreError::Validation(_))));
    }

    #[test]
    fn metadata_deserializes_with_missing_fields() {
        let metadata: EnvironmentMetadata =
            serde_json::from_str(r#"{"description":"x"}"#).unwrap();
        assert_eq!(metadata.description.as_deref(), Some("x"));
        assert!(metadata.tags.is_empty());
    }
}
