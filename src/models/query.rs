//! Parsed query statements handed to the query processor, and their results.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::ast::QueryNode;
use super::field_value::FieldValue;

/// `FROM <type> [alias]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FromClause {
    pub type_id: String,
    pub alias: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectColumn {
    pub property_id: String,
    /// Output key; defaults to the property id.
    pub alias: Option<String>,
}

impl SelectColumn {
    pub fn new(property_id: impl Into<String>) -> Self {
        Self {
            property_id: property_id.into(),
            alias: None,
        }
    }

    pub fn aliased(property_id: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            property_id: property_id.into(),
            alias: Some(alias.into()),
        }
    }

    pub fn output_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.property_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Projection {
    /// `SELECT *`
    All,
    Columns(Vec<SelectColumn>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub property_id: String,
    pub descending: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryStatement {
    pub projection: Projection,
    pub from: FromClause,
    pub where_clause: Option<QueryNode>,
    #[serde(default)]
    pub order_by: Vec<SortSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub statement: QueryStatement,
    pub principal: String,
    #[serde(default)]
    pub skip_count: usize,
    /// Defaults to the configured page size when absent.
    #[serde(default)]
    pub max_items: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResultRow {
    pub object_id: String,
    pub properties: BTreeMap<String, Vec<FieldValue>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub rows: Vec<QueryResultRow>,
    /// Number of index hits before permission filtering.
    pub num_items: usize,
    pub has_more_items: bool,
}
