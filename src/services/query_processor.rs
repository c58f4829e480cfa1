//! 查询处理器
//!
//! Runs a parsed query statement end to end:
//! 1. FROM type → repository and object-type filter
//! 2. WHERE clause → compiled target query
//! 3. index search with paging, last-modified first
//! 4. object fetch, permission check, projection and ORDER BY

use futures::future::join_all;
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::error::{QueryError, RepositoryError};
use crate::infrastructure::config::QueryConfig;
use crate::models::{
    property_ids as ids, ColumnResolver, FieldValue, ObjectSnapshot, Projection, QueryRequest,
    QueryResult, QueryResultRow, SortSpec, TargetQuery,
};
use crate::repository::{ObjectStore, PermissionFilter, TypeCatalog};
use crate::search_engine::{SearchIndex, SearchPage};

use super::field_mapper::{OBJECT_TYPE_FIELD, REPOSITORY_ID_FIELD};
use super::predicate_compiler::{compile, QueryContext};

pub struct QueryProcessor {
    repository_id: String,
    index: Arc<dyn SearchIndex>,
    objects: Arc<dyn ObjectStore>,
    types: Arc<dyn TypeCatalog>,
    permissions: Arc<dyn PermissionFilter>,
    config: QueryConfig,
}

impl QueryProcessor {
    pub fn new(
        repository_id: impl Into<String>,
        index: Arc<dyn SearchIndex>,
        objects: Arc<dyn ObjectStore>,
        types: Arc<dyn TypeCatalog>,
        permissions: Arc<dyn PermissionFilter>,
        config: QueryConfig,
    ) -> Self {
        Self {
            repository_id: repository_id.into(),
            index,
            objects,
            types,
            permissions,
            config,
        }
    }

    /// Executes `request`; `columns` resolves the column references of its WHERE clause.
    #[instrument(
        skip_all,
        fields(repository_id = %self.repository_id, from = %request.statement.from.type_id)
    )]
    pub async fn query(
        &self,
        request: &QueryRequest,
        columns: &dyn ColumnResolver,
    ) -> Result<QueryResult, QueryError> {
        let statement = &request.statement;
        let filter = self.type_filter(&statement.from.type_id)?;

        let query = match &statement.where_clause {
            Some(node) => {
                let ctx = QueryContext::new(&self.repository_id, columns, self.index.as_ref())
                    .with_in_tree_max_depth(self.config.in_tree_max_depth);
                compile(node, &ctx)?
            }
            None => TargetQuery::MatchAll,
        };
        debug!(query = %query, filter = %filter, "Compiled query");

        let max_items = request.max_items.unwrap_or(self.config.default_max_items);
        let hits = self
            .index
            .search(&query, &filter, SearchPage::new(request.skip_count, max_items))?;

        let fetched = join_all(hits.hits.iter().map(|hit| self.objects.get_object(&hit.object_id))).await;
        let mut visible = Vec::with_capacity(fetched.len());
        for (hit, result) in hits.hits.iter().zip(fetched) {
            match result {
                Ok(object) if self.permissions.is_visible(&request.principal, &object) => {
                    visible.push(object)
                }
                Ok(_) => debug!(object_id = %hit.object_id, "Filtered by permissions"),
                Err(RepositoryError::NotFound(_)) => {
                    warn!(object_id = %hit.object_id, "Indexed object missing from repository, skipping")
                }
                Err(e) => return Err(e.into()),
            }
        }

        sort_objects(&mut visible, &statement.order_by);
        let rows = visible
            .iter()
            .map(|object| project(object, &statement.projection))
            .collect::<Vec<_>>();

        let result = QueryResult {
            num_items: hits.total,
            has_more_items: request.skip_count + hits.hits.len() < hits.total,
            rows,
        };
        info!(
            total = result.num_items,
            returned = result.rows.len(),
            has_more = result.has_more_items,
            "Query completed"
        );
        Ok(result)
    }

    /// `repository_id = repo AND objecttype IN (type, queryable subtypes)`
    fn type_filter(&self, type_id: &str) -> Result<TargetQuery, QueryError> {
        let main = self
            .types
            .get_type(type_id)
            .ok_or_else(|| QueryError::UnknownType(type_id.to_string()))?;

        let mut type_ids = vec![main.id.clone()];
        type_ids.extend(
            self.types
                .descendants(&main.id)
                .into_iter()
                .filter(|t| t.included_in_supertype_query)
                .map(|t| t.id.clone()),
        );

        Ok(TargetQuery::all_of([
            TargetQuery::term(REPOSITORY_ID_FIELD, self.repository_id.as_str()),
            TargetQuery::any_of(
                type_ids
                    .into_iter()
                    .map(|id| TargetQuery::term(OBJECT_TYPE_FIELD, id)),
            ),
        ]))
    }
}

/// Values of `property_id`, including the ones carried by the snapshot structure.
fn property_values(object: &ObjectSnapshot, property_id: &str) -> Vec<FieldValue> {
    match property_id {
        ids::OBJECT_ID => vec![FieldValue::str(object.id.as_str())],
        ids::BASE_TYPE_ID => vec![FieldValue::str(object.base_type.as_str())],
        ids::OBJECT_TYPE_ID => vec![FieldValue::str(object.object_type_id.as_str())],
        _ => object.values(property_id).to_vec(),
    }
}

fn project(object: &ObjectSnapshot, projection: &Projection) -> QueryResultRow {
    let properties = match projection {
        Projection::All => {
            let mut all = object.properties.clone();
            for id in [ids::OBJECT_ID, ids::BASE_TYPE_ID, ids::OBJECT_TYPE_ID] {
                all.entry(id.to_string())
                    .or_insert_with(|| property_values(object, id));
            }
            all
        }
        Projection::Columns(columns) => columns
            .iter()
            .map(|column| {
                (
                    column.output_key().to_string(),
                    property_values(object, &column.property_id),
                )
            })
            .collect(),
    };
    QueryResultRow {
        object_id: object.id.clone(),
        properties,
    }
}

/// Stable sort; objects without a value sort first in ascending order.
fn sort_objects(objects: &mut [ObjectSnapshot], order_by: &[SortSpec]) {
    if order_by.is_empty() {
        return;
    }
    objects.sort_by(|a, b| {
        order_by
            .iter()
            .map(|spec| {
                let left = property_values(a, &spec.property_id);
                let right = property_values(b, &spec.property_id);
                let ordering = compare_values(left.first(), right.first());
                if spec.descending {
                    ordering.reverse()
                } else {
                    ordering
                }
            })
            .find(|ordering| *ordering != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    });
}

fn compare_values(left: Option<&FieldValue>, right: Option<&FieldValue>) -> Ordering {
    use FieldValue::*;
    match (left, right) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(l), Some(r)) => match (l, r) {
            (Int(a), Int(b)) => a.cmp(b),
            (Int(_) | Decimal(_), Int(_) | Decimal(_)) => {
                as_f64(l).total_cmp(&as_f64(r))
            }
            (Bool(a), Bool(b)) => a.cmp(b),
            (DateTime(a), DateTime(b)) => a.cmp(b),
            _ => l.to_string().cmp(&r.to_string()),
        },
    }
}

fn as_f64(value: &FieldValue) -> f64 {
    match value {
        FieldValue::Int(i) => *i as f64,
        FieldValue::Decimal(d) => *d,
        _ => f64::NAN,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BaseType, SelectColumn};
    use chrono::{TimeZone, Utc};
    use rstest::rstest;

    fn object(id: &str, name: Option<&str>) -> ObjectSnapshot {
        let object = ObjectSnapshot::new(id, BaseType::Document, "cmis:document");
        match name {
            Some(name) => object.with_property(ids::NAME, name),
            None => object,
        }
    }

    #[rstest]
    #[case(FieldValue::Int(2), FieldValue::Decimal(10.5), Ordering::Less)]
    #[case(FieldValue::Decimal(-1.0), FieldValue::Int(-3), Ordering::Greater)]
    #[case(FieldValue::str("b"), FieldValue::str("a"), Ordering::Greater)]
    #[case(FieldValue::Bool(false), FieldValue::Bool(true), Ordering::Less)]
    fn test_compare_values(#[case] l: FieldValue, #[case] r: FieldValue, #[case] expected: Ordering) {
        assert_eq!(compare_values(Some(&l), Some(&r)), expected);
    }

    #[test]
    fn test_compare_dates_and_missing() {
        let early = FieldValue::DateTime(Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap());
        let late = FieldValue::DateTime(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(compare_values(Some(&early), Some(&late)), Ordering::Less);
        assert_eq!(compare_values(None, Some(&early)), Ordering::Less);
    }

    #[test]
    fn test_sort_by_name_descending() {
        let mut objects = vec![object("1", Some("b")), object("2", None), object("3", Some("c"))];
        sort_objects(
            &mut objects,
            &[SortSpec {
                property_id: ids::NAME.into(),
                descending: true,
            }],
        );
        let order: Vec<&str> = objects.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(order, vec!["3", "1", "2"]);
    }

    #[test]
    fn test_projection_by_alias() {
        let doc = object("1", Some("report.pdf"));
        let row = project(
            &doc,
            &Projection::Columns(vec![
                SelectColumn::aliased(ids::NAME, "title"),
                SelectColumn::new(ids::OBJECT_ID),
            ]),
        );
        assert_eq!(row.properties["title"], vec![FieldValue::str("report.pdf")]);
        assert_eq!(row.properties[ids::OBJECT_ID], vec![FieldValue::str("1")]);
        assert_eq!(row.properties.len(), 2);

        let all = project(&doc, &Projection::All);
        assert!(all.properties.contains_key(ids::NAME));
        assert!(all.properties.contains_key(ids::BASE_TYPE_ID));
    }
}
