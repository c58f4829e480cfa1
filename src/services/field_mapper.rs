//! Property id to search-index field name dictionary.
//!
//! Standard properties map through a fixed table. Custom properties get a
//! `dynamic.property.` field; those contributed by a secondary type are further
//! namespaced by the secondary type's query name. Any other `cmis:` property is
//! unmapped and rejected by the compiler.

use once_cell::sync::Lazy;
use std::collections::HashMap;

use crate::error::CompileError;
use crate::models::{property_ids as ids, ColumnReference, PropertyDefinition, PropertyType};

pub const REPOSITORY_ID_FIELD: &str = "repository_id";
pub const FULL_TEXT_FIELD: &str = "text";
pub const OBJECT_ID_FIELD: &str = "object_id";
pub const BASE_TYPE_FIELD: &str = "basetype";
pub const OBJECT_TYPE_FIELD: &str = "objecttype";
pub const PARENT_ID_FIELD: &str = "parent_id";
pub const MODIFIED_FIELD: &str = "modified";
pub const SECONDARY_TYPE_IDS_FIELD: &str = "secondary_object_type_ids";

const DYNAMIC_PREFIX: &str = "dynamic.property.";
const DYNAMIC_DATE_PREFIX: &str = "dynamicDate.property.";
const SEPARATOR: &str = ".";

static BASE_FIELDS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        (ids::OBJECT_ID, OBJECT_ID_FIELD),
        (ids::BASE_TYPE_ID, BASE_TYPE_FIELD),
        (ids::OBJECT_TYPE_ID, OBJECT_TYPE_FIELD),
        (ids::NAME, "name"),
        (ids::DESCRIPTION, "cmis_description"),
        (ids::CREATION_DATE, "creation_date"),
        (ids::CREATED_BY, "creator"),
        (ids::LAST_MODIFICATION_DATE, MODIFIED_FIELD),
        (ids::LAST_MODIFIED_BY, "modifier"),
        (ids::SECONDARY_OBJECT_TYPE_IDS, SECONDARY_TYPE_IDS_FIELD),
        (ids::IS_LATEST_VERSION, "is_latest_version"),
        (ids::IS_MAJOR_VERSION, "is_major_version"),
        (ids::IS_PRIVATE_WORKING_COPY, "is_pwc"),
        (ids::IS_VERSION_SERIES_CHECKED_OUT, "is_checkedout"),
        (ids::VERSION_SERIES_CHECKED_OUT_ID, "checkedout_id"),
        (ids::VERSION_SERIES_CHECKED_OUT_BY, "checkedout_by"),
        (ids::CHECKIN_COMMENT, "checkin_comment"),
        (ids::VERSION_LABEL, "version_label"),
        (ids::VERSION_SERIES_ID, "version_series_id"),
        (ids::CONTENT_STREAM_ID, "content_id"),
        (ids::CONTENT_STREAM_FILE_NAME, "content_name"),
        (ids::CONTENT_STREAM_LENGTH, "content_length"),
        (ids::CONTENT_STREAM_MIME_TYPE, "content_mimetype"),
        (ids::PARENT_ID, PARENT_ID_FIELD),
        (ids::PATH, "path"),
        (ids::ALLOWED_CHILD_OBJECT_TYPE_IDS, "allowed_child_object_type_ids"),
    ])
});

/// Field for a standard property, `None` for custom or unsupported properties.
pub fn base_field(property_id: &str) -> Option<&'static str> {
    BASE_FIELDS.get(property_id).copied()
}

/// Standard (`cmis:`) properties are never given a dynamic field.
pub fn is_standard_property(property_id: &str) -> bool {
    property_id.starts_with("cmis:")
}

/// Field for a custom property, optionally contributed by a secondary type.
pub fn dynamic_field(property: &PropertyDefinition, secondary_query_name: Option<&str>) -> String {
    let prefix = if property.property_type == PropertyType::DateTime {
        DYNAMIC_DATE_PREFIX
    } else {
        DYNAMIC_PREFIX
    };
    match secondary_query_name {
        Some(secondary) => format!("{prefix}{secondary}{SEPARATOR}{}", property.id),
        None => format!("{prefix}{}", property.id),
    }
}

/// Field for `property_id` given the definition that declares it.
pub fn field_for_property(
    property_id: &str,
    definition: Option<&PropertyDefinition>,
    secondary_query_name: Option<&str>,
) -> Result<String, CompileError> {
    if let Some(field) = base_field(property_id) {
        return Ok(field.to_string());
    }
    match definition {
        Some(def) if !is_standard_property(property_id) => {
            Ok(dynamic_field(def, secondary_query_name))
        }
        _ => Err(CompileError::UnmappedProperty {
            property_id: property_id.to_string(),
        }),
    }
}

pub fn field_for_column(column: &ColumnReference) -> Result<String, CompileError> {
    let owner = &column.type_definition;
    let secondary = owner.is_secondary().then_some(owner.query_name.as_str());
    field_for_property(&column.property_id, owner.property(&column.property_id), secondary)
}

/// True when `field` is something the dictionary can produce.
pub fn is_known_field(field: &str) -> bool {
    field == REPOSITORY_ID_FIELD
        || field == FULL_TEXT_FIELD
        || BASE_FIELDS.values().any(|f| *f == field)
        || field.starts_with(DYNAMIC_PREFIX)
        || field.starts_with(DYNAMIC_DATE_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BaseType, Cardinality, TypeDefinition};
    use rstest::rstest;
    use std::sync::Arc;

    #[rstest]
    #[case(ids::NAME, "name")]
    #[case(ids::DESCRIPTION, "cmis_description")]
    #[case(ids::CREATION_DATE, "creation_date")]
    #[case(ids::LAST_MODIFICATION_DATE, "modified")]
    #[case(ids::IS_PRIVATE_WORKING_COPY, "is_pwc")]
    #[case(ids::CONTENT_STREAM_MIME_TYPE, "content_mimetype")]
    #[case(ids::PARENT_ID, "parent_id")]
    fn test_base_fields(#[case] property_id: &str, #[case] expected: &str) {
        assert_eq!(base_field(property_id), Some(expected));
        assert!(is_known_field(expected));
    }

    #[test]
    fn test_dynamic_fields() {
        let plain = PropertyDefinition::single("acme:invoiceNo", PropertyType::String);
        let date = PropertyDefinition::single("acme:dueDate", PropertyType::DateTime);
        assert_eq!(dynamic_field(&plain, None), "dynamic.property.acme:invoiceNo");
        assert_eq!(dynamic_field(&date, None), "dynamicDate.property.acme:dueDate");
        assert_eq!(
            dynamic_field(&plain, Some("acme:billable")),
            "dynamic.property.acme:billable.acme:invoiceNo"
        );
    }

    #[test]
    fn test_unsupported_standard_property_is_unmapped() {
        let def = PropertyDefinition::single("cmis:changeToken", PropertyType::String);
        let err = field_for_property("cmis:changeToken", Some(&def), None).unwrap_err();
        assert!(matches!(err, CompileError::UnmappedProperty { .. }));
    }

    #[test]
    fn test_undeclared_custom_property_is_unmapped() {
        assert!(field_for_property("acme:ghost", None, None).is_err());
    }

    #[test]
    fn test_column_on_secondary_type() {
        let secondary = Arc::new(
            TypeDefinition::new("acme:billableAspect", BaseType::Secondary)
                .with_query_name("acme:billable")
                .with_property(PropertyDefinition::new(
                    "acme:rate",
                    PropertyType::Decimal,
                    Cardinality::Single,
                )),
        );
        let column = ColumnReference::for_property(secondary, "acme:rate").unwrap();
        assert_eq!(
            field_for_column(&column).unwrap(),
            "dynamic.property.acme:billable.acme:rate"
        );
    }
}
