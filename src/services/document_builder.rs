//! Index document construction
//!
//! Flattens an [`ObjectSnapshot`] into an [`IndexDocument`] whose field names
//! are exactly the ones the predicate compiler produces.

use std::sync::Arc;
use tracing::debug;

use crate::models::{property_ids as ids, FieldValue, IndexDocument, ObjectSnapshot, TypeDefinition};
use crate::repository::TypeCatalog;

use super::field_mapper::{
    self, BASE_TYPE_FIELD, OBJECT_ID_FIELD, OBJECT_TYPE_FIELD, PARENT_ID_FIELD, REPOSITORY_ID_FIELD,
    SECONDARY_TYPE_IDS_FIELD,
};

/// Properties whose field is filled from the snapshot structure itself.
const STRUCTURAL_PROPERTIES: &[&str] = &[
    ids::OBJECT_ID,
    ids::BASE_TYPE_ID,
    ids::OBJECT_TYPE_ID,
    ids::SECONDARY_OBJECT_TYPE_IDS,
    ids::PARENT_ID,
];

/// Builds the index document for `object` in `repository_id`.
///
/// `content` is the already extracted full text of the content stream; it is
/// indexed together with the name and the description.
pub fn build_document(
    repository_id: &str,
    object: &ObjectSnapshot,
    catalog: &dyn TypeCatalog,
    content: Option<String>,
) -> IndexDocument {
    let mut doc = IndexDocument::new(repository_id, &object.id);
    doc.add(REPOSITORY_ID_FIELD, repository_id);
    doc.add(OBJECT_ID_FIELD, object.id.as_str());
    doc.add(BASE_TYPE_FIELD, object.base_type.as_str());
    doc.add(OBJECT_TYPE_FIELD, object.object_type_id.as_str());
    doc.add_all(
        SECONDARY_TYPE_IDS_FIELD,
        object.secondary_type_ids.iter().map(|t| FieldValue::str(t.as_str())),
    );
    doc.add_all(
        PARENT_ID_FIELD,
        object.parent_ids.iter().map(|p| FieldValue::str(p.as_str())),
    );

    let object_type = catalog.get_type(&object.object_type_id);
    let secondary_types: Vec<_> = object
        .secondary_type_ids
        .iter()
        .filter_map(|id| catalog.get_type(id))
        .collect();

    for (property_id, values) in &object.properties {
        if STRUCTURAL_PROPERTIES.contains(&property_id.as_str()) || values.is_empty() {
            continue;
        }
        match property_field(property_id, object_type.as_deref(), &secondary_types) {
            Some(field) => doc.add_all(&field, values.iter().cloned()),
            None => debug!(
                object_id = %object.id,
                property_id = %property_id,
                "Property has no index field, skipping"
            ),
        }
    }

    doc.modified = object.last_modified();
    doc.full_text = full_text(object, content);
    doc
}

fn property_field(
    property_id: &str,
    object_type: Option<&TypeDefinition>,
    secondary_types: &[Arc<TypeDefinition>],
) -> Option<String> {
    if let Some(field) = field_mapper::base_field(property_id) {
        return Some(field.to_string());
    }
    if field_mapper::is_standard_property(property_id) {
        return None;
    }
    if let Some(definition) = object_type.and_then(|t| t.property(property_id)) {
        return Some(field_mapper::dynamic_field(definition, None));
    }
    secondary_types.iter().find_map(|secondary| {
        secondary
            .property(property_id)
            .map(|definition| field_mapper::dynamic_field(definition, Some(&secondary.query_name)))
    })
}

fn full_text(object: &ObjectSnapshot, content: Option<String>) -> Option<String> {
    let parts: Vec<String> = [
        object.name().map(str::to_string),
        object.first_str(ids::DESCRIPTION).map(str::to_string),
        content,
    ]
    .into_iter()
    .flatten()
    .filter(|part| !part.trim().is_empty())
    .collect();
    (!parts.is_empty()).then(|| parts.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BaseType, PropertyDefinition, PropertyType};
    use crate::repository::InMemoryRepository;
    use chrono::{TimeZone, Utc};

    fn catalog() -> InMemoryRepository {
        let repo = InMemoryRepository::new();
        repo.register_type(
            TypeDefinition::new("invoice", BaseType::Document)
                .with_parent("cmis:document")
                .with_property(PropertyDefinition::single("acme:amount", PropertyType::Decimal))
                .with_property(PropertyDefinition::single("acme:due", PropertyType::DateTime)),
        );
        repo.register_type(
            TypeDefinition::new("acme:taggable", BaseType::Secondary)
                .with_query_name("taggable")
                .with_property(PropertyDefinition::multi("acme:tags", PropertyType::String)),
        );
        repo
    }

    #[test]
    fn test_document_fields() {
        let modified = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let object = ObjectSnapshot::new("doc-1", BaseType::Document, "invoice")
            .with_parent("folder-1")
            .with_secondary_type("acme:taggable")
            .with_property(ids::NAME, "march.txt")
            .with_property(ids::DESCRIPTION, "March invoice")
            .with_property(ids::LAST_MODIFICATION_DATE, modified)
            .with_property(ids::IS_LATEST_VERSION, true)
            .with_property(ids::OBJECT_TYPE_ID, "invoice")
            .with_property("cmis:changeToken", "17")
            .with_property("acme:amount", FieldValue::Decimal(12.5))
            .with_property("acme:due", modified)
            .with_property("acme:tags", "paid")
            .with_property("acme:tags", "q1")
            .with_property("acme:unknown", "x");

        let doc = build_document("repo", &object, &catalog(), Some("Total: 12.50".into()));

        assert_eq!(doc.id, "repo_doc-1");
        assert_eq!(doc.get(REPOSITORY_ID_FIELD), &[FieldValue::str("repo")]);
        assert_eq!(doc.get(BASE_TYPE_FIELD), &[FieldValue::str("cmis:document")]);
        assert_eq!(doc.get(OBJECT_TYPE_FIELD), &[FieldValue::str("invoice")]);
        assert_eq!(doc.get(PARENT_ID_FIELD), &[FieldValue::str("folder-1")]);
        assert_eq!(doc.get(SECONDARY_TYPE_IDS_FIELD), &[FieldValue::str("acme:taggable")]);
        assert_eq!(doc.get("name"), &[FieldValue::str("march.txt")]);
        assert_eq!(doc.get("is_latest_version"), &[FieldValue::Bool(true)]);
        assert_eq!(doc.get("dynamic.property.acme:amount"), &[FieldValue::Decimal(12.5)]);
        assert_eq!(doc.get("dynamicDate.property.acme:due"), &[FieldValue::DateTime(modified)]);
        assert_eq!(doc.get("dynamic.property.taggable.acme:tags").len(), 2);
        assert!(!doc.fields.keys().any(|k| k.contains("changeToken") || k.contains("unknown")));
        assert_eq!(doc.modified, Some(modified));
        assert_eq!(
            doc.full_text.as_deref(),
            Some("march.txt\nMarch invoice\nTotal: 12.50")
        );
    }

    #[test]
    fn test_folder_without_text() {
        let object = ObjectSnapshot::new("f", BaseType::Folder, "cmis:folder")
            .with_parent("root")
            .with_property(ids::PATH, "/a");
        let doc = build_document("repo", &object, &catalog(), None);
        assert_eq!(doc.get("path"), &[FieldValue::str("/a")]);
        assert_eq!(doc.full_text, None);
        assert_eq!(doc.modified, None);
    }
}
