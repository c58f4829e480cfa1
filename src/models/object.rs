//! Object snapshots as returned by the primary repository.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::field_value::FieldValue;
use super::types::BaseType;

pub mod property_ids {
    pub const OBJECT_ID: &str = "cmis:objectId";
    pub const BASE_TYPE_ID: &str = "cmis:baseTypeId";
    pub const OBJECT_TYPE_ID: &str = "cmis:objectTypeId";
    pub const NAME: &str = "cmis:name";
    pub const DESCRIPTION: &str = "cmis:description";
    pub const CREATION_DATE: &str = "cmis:creationDate";
    pub const CREATED_BY: &str = "cmis:createdBy";
    pub const LAST_MODIFICATION_DATE: &str = "cmis:lastModificationDate";
    pub const LAST_MODIFIED_BY: &str = "cmis:lastModifiedBy";
    pub const SECONDARY_OBJECT_TYPE_IDS: &str = "cmis:secondaryObjectTypeIds";
    pub const IS_LATEST_VERSION: &str = "cmis:isLatestVersion";
    pub const IS_MAJOR_VERSION: &str = "cmis:isMajorVersion";
    pub const IS_PRIVATE_WORKING_COPY: &str = "cmis:isPrivateWorkingCopy";
    pub const IS_VERSION_SERIES_CHECKED_OUT: &str = "cmis:isVersionSeriesCheckedOut";
    pub const VERSION_SERIES_CHECKED_OUT_ID: &str = "cmis:versionSeriesCheckedOutId";
    pub const VERSION_SERIES_CHECKED_OUT_BY: &str = "cmis:versionSeriesCheckedOutBy";
    pub const CHECKIN_COMMENT: &str = "cmis:checkinComment";
    pub const VERSION_LABEL: &str = "cmis:versionLabel";
    pub const VERSION_SERIES_ID: &str = "cmis:versionSeriesId";
    pub const CONTENT_STREAM_ID: &str = "cmis:contentStreamId";
    pub const CONTENT_STREAM_FILE_NAME: &str = "cmis:contentStreamFileName";
    pub const CONTENT_STREAM_LENGTH: &str = "cmis:contentStreamLength";
    pub const CONTENT_STREAM_MIME_TYPE: &str = "cmis:contentStreamMimeType";
    pub const PARENT_ID: &str = "cmis:parentId";
    pub const PATH: &str = "cmis:path";
    pub const ALLOWED_CHILD_OBJECT_TYPE_IDS: &str = "cmis:allowedChildObjectTypeIds";
}

/// Current state of one repository object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectSnapshot {
    pub id: String,
    pub base_type: BaseType,
    pub object_type_id: String,
    #[serde(default)]
    pub secondary_type_ids: Vec<String>,
    /// Parent folders. Folders have at most one, documents may be multi-filed.
    #[serde(default)]
    pub parent_ids: Vec<String>,
    /// Property values keyed by property id; single-valued properties hold one value.
    #[serde(default)]
    pub properties: BTreeMap<String, Vec<FieldValue>>,
}

impl ObjectSnapshot {
    pub fn new(id: impl Into<String>, base_type: BaseType, object_type_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            base_type,
            object_type_id: object_type_id.into(),
            secondary_type_ids: Vec::new(),
            parent_ids: Vec::new(),
            properties: BTreeMap::new(),
        }
    }

    pub fn with_property(mut self, property_id: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.properties
            .entry(property_id.into())
            .or_default()
            .push(value.into());
        self
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_ids.push(parent_id.into());
        self
    }

    pub fn with_secondary_type(mut self, type_id: impl Into<String>) -> Self {
        self.secondary_type_ids.push(type_id.into());
        self
    }

    pub fn values(&self, property_id: &str) -> &[FieldValue] {
        self.properties
            .get(property_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn first_str(&self, property_id: &str) -> Option<&str> {
        self.values(property_id).first().and_then(FieldValue::as_str)
    }

    pub fn name(&self) -> Option<&str> {
        self.first_str(property_ids::NAME)
    }

    pub fn mime_type(&self) -> Option<&str> {
        self.first_str(property_ids::CONTENT_STREAM_MIME_TYPE)
    }

    pub fn last_modified(&self) -> Option<DateTime<Utc>> {
        self.values(property_ids::LAST_MODIFICATION_DATE)
            .first()
            .and_then(FieldValue::as_datetime)
    }
}

/// Binary content attached to a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentStream {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}
