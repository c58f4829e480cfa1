use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::field_value::FieldValue;

/// Flattened search-facing representation of one repository object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDocument {
    /// Unique key, `<repositoryId>_<objectId>`.
    pub id: String,
    pub repository_id: String,
    pub object_id: String,
    pub fields: BTreeMap<String, Vec<FieldValue>>,
    /// Analyzed full-text body, if any.
    #[serde(default)]
    pub full_text: Option<String>,
    /// Sort key for default result ordering.
    #[serde(default)]
    pub modified: Option<DateTime<Utc>>,
}

impl IndexDocument {
    pub fn document_id(repository_id: &str, object_id: &str) -> String {
        format!("{repository_id}_{object_id}")
    }

    pub fn new(repository_id: impl Into<String>, object_id: impl Into<String>) -> Self {
        let repository_id = repository_id.into();
        let object_id = object_id.into();
        Self {
            id: Self::document_id(&repository_id, &object_id),
            repository_id,
            object_id,
            fields: BTreeMap::new(),
            full_text: None,
            modified: None,
        }
    }

    pub fn add(&mut self, field: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.entry(field.into()).or_default().push(value.into());
    }

    pub fn add_all<I>(&mut self, field: &str, values: I)
    where
        I: IntoIterator<Item = FieldValue>,
    {
        let entry = self.fields.entry(field.to_string()).or_default();
        entry.extend(values);
    }

    pub fn get(&self, field: &str) -> &[FieldValue] {
        self.fields.get(field).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn contains_field(&self, field: &str) -> bool {
        !self.get(field).is_empty()
    }
}
