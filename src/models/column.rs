//! Column references and the resolution seam between the query parser and the compiler.

use std::collections::HashMap;
use std::sync::Arc;

use super::ast::SourcePosition;
use super::types::{Cardinality, PropertyDefinition, PropertyType, TypeDefinition};

/// A WHERE-clause column resolved against the type system.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnReference {
    pub property_id: String,
    pub property_query_name: String,
    /// Type that declares the property.
    pub type_definition: Arc<TypeDefinition>,
    pub property_type: PropertyType,
    pub cardinality: Cardinality,
}

impl ColumnReference {
    pub fn from_definition(type_definition: Arc<TypeDefinition>, property: &PropertyDefinition) -> Self {
        Self {
            property_id: property.id.clone(),
            property_query_name: property.query_name.clone(),
            type_definition,
            property_type: property.property_type,
            cardinality: property.cardinality,
        }
    }

    /// Resolves `property_id` on `type_definition`, `None` if the type does not declare it.
    pub fn for_property(type_definition: Arc<TypeDefinition>, property_id: &str) -> Option<Self> {
        let property = type_definition.property(property_id)?.clone();
        Some(Self::from_definition(type_definition, &property))
    }

    pub fn is_multi_valued(&self) -> bool {
        self.cardinality == Cardinality::Multi
    }
}

/// Column metadata supplied by the query parser's type resolution pass.
pub trait ColumnResolver: Send + Sync {
    /// Column at `position` in the query text.
    fn resolve(&self, position: SourcePosition) -> Option<ColumnReference>;

    /// Type bound to a FROM-clause alias.
    fn type_for_alias(&self, alias: &str) -> Option<Arc<TypeDefinition>>;
}

/// Resolver backed by lookup tables filled in by the caller.
#[derive(Debug, Default, Clone)]
pub struct StaticColumnResolver {
    columns: HashMap<SourcePosition, ColumnReference>,
    aliases: HashMap<String, Arc<TypeDefinition>>,
}

impl StaticColumnResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_column(mut self, position: SourcePosition, column: ColumnReference) -> Self {
        self.columns.insert(position, column);
        self
    }

    pub fn with_alias(mut self, alias: impl Into<String>, type_definition: Arc<TypeDefinition>) -> Self {
        self.aliases.insert(alias.into(), type_definition);
        self
    }
}

impl ColumnResolver for StaticColumnResolver {
    fn resolve(&self, position: SourcePosition) -> Option<ColumnReference> {
        self.columns.get(&position).cloned()
    }

    fn type_for_alias(&self, alias: &str) -> Option<Arc<TypeDefinition>> {
        self.aliases.get(alias).cloned()
    }
}
