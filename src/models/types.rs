//! Repository type metadata: base types, property definitions and object types.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Base object type of the repository model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BaseType {
    #[serde(rename = "cmis:document")]
    Document,
    #[serde(rename = "cmis:folder")]
    Folder,
    #[serde(rename = "cmis:relationship")]
    Relationship,
    #[serde(rename = "cmis:policy")]
    Policy,
    #[serde(rename = "cmis:item")]
    Item,
    #[serde(rename = "cmis:secondary")]
    Secondary,
}

impl BaseType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Document => "cmis:document",
            Self::Folder => "cmis:folder",
            Self::Relationship => "cmis:relationship",
            Self::Policy => "cmis:policy",
            Self::Item => "cmis:item",
            Self::Secondary => "cmis:secondary",
        }
    }

    /// Only documents and folders are mirrored into the search index.
    pub fn is_indexable(self) -> bool {
        matches!(self, Self::Document | Self::Folder)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
    String,
    Id,
    Html,
    Uri,
    Integer,
    Decimal,
    Boolean,
    DateTime,
}

impl PropertyType {
    /// Types LIKE may be applied to.
    pub fn is_string_family(self) -> bool {
        matches!(self, Self::String | Self::Id | Self::Html | Self::Uri)
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, Self::Integer | Self::Decimal)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cardinality {
    Single,
    Multi,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDefinition {
    pub id: String,
    pub query_name: String,
    pub property_type: PropertyType,
    pub cardinality: Cardinality,
}

impl PropertyDefinition {
    pub fn new(id: impl Into<String>, property_type: PropertyType, cardinality: Cardinality) -> Self {
        let id = id.into();
        Self {
            query_name: id.clone(),
            id,
            property_type,
            cardinality,
        }
    }

    pub fn single(id: impl Into<String>, property_type: PropertyType) -> Self {
        Self::new(id, property_type, Cardinality::Single)
    }

    pub fn multi(id: impl Into<String>, property_type: PropertyType) -> Self {
        Self::new(id, property_type, Cardinality::Multi)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDefinition {
    pub id: String,
    pub query_name: String,
    pub base_type: BaseType,
    pub parent_type_id: Option<String>,
    /// Whether a query on an ancestor type also returns objects of this type.
    pub included_in_supertype_query: bool,
    pub property_definitions: BTreeMap<String, PropertyDefinition>,
}

impl TypeDefinition {
    pub fn new(id: impl Into<String>, base_type: BaseType) -> Self {
        let id = id.into();
        Self {
            query_name: id.clone(),
            id,
            base_type,
            parent_type_id: None,
            included_in_supertype_query: true,
            property_definitions: BTreeMap::new(),
        }
    }

    pub fn with_parent(mut self, parent_type_id: impl Into<String>) -> Self {
        self.parent_type_id = Some(parent_type_id.into());
        self
    }

    pub fn with_query_name(mut self, query_name: impl Into<String>) -> Self {
        self.query_name = query_name.into();
        self
    }

    pub fn with_property(mut self, definition: PropertyDefinition) -> Self {
        self.property_definitions
            .insert(definition.id.clone(), definition);
        self
    }

    pub fn excluded_from_supertype_query(mut self) -> Self {
        self.included_in_supertype_query = false;
        self
    }

    pub fn property(&self, property_id: &str) -> Option<&PropertyDefinition> {
        self.property_definitions.get(property_id)
    }

    pub fn is_secondary(&self) -> bool {
        self.base_type == BaseType::Secondary
    }
}
