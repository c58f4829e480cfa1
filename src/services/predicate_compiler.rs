//! Predicate compiler
//!
//! Walks a WHERE-clause tree into a [`TargetQuery`]. Compilation is a pure
//! function of the tree and the [`QueryContext`] except for IN_TREE, which reads
//! folder children from the index to expand the subtree.

use std::collections::HashSet;
use tracing::{debug, warn};

use crate::error::CompileError;
use crate::models::{
    ColumnNode, ColumnReference, ColumnResolver, ComparisonOp, Expr, FieldValue, Literal,
    PropertyType, QueryNode, TargetQuery, TextSearchNode,
};
use crate::search_engine::SearchIndex;

use super::field_mapper::{self, FULL_TEXT_FIELD, OBJECT_TYPE_FIELD, PARENT_ID_FIELD};
use super::like_pattern::translate_like;

pub const DEFAULT_IN_TREE_MAX_DEPTH: usize = 10;

/// Everything a single compilation needs besides the tree itself.
pub struct QueryContext<'a> {
    pub repository_id: &'a str,
    pub columns: &'a dyn ColumnResolver,
    /// Used only by IN_TREE.
    pub index: &'a dyn SearchIndex,
    pub in_tree_max_depth: usize,
}

impl<'a> QueryContext<'a> {
    pub fn new(
        repository_id: &'a str,
        columns: &'a dyn ColumnResolver,
        index: &'a dyn SearchIndex,
    ) -> Self {
        Self {
            repository_id,
            columns,
            index,
            in_tree_max_depth: DEFAULT_IN_TREE_MAX_DEPTH,
        }
    }

    pub fn with_in_tree_max_depth(mut self, depth: usize) -> Self {
        self.in_tree_max_depth = depth;
        self
    }
}

/// Compiles `root` into a backend-agnostic query.
pub fn compile(root: &QueryNode, ctx: &QueryContext<'_>) -> Result<TargetQuery, CompileError> {
    PredicateCompiler { ctx }.walk(root)
}

struct PredicateCompiler<'c, 'a> {
    ctx: &'c QueryContext<'a>,
}

impl PredicateCompiler<'_, '_> {
    fn walk(&self, node: &QueryNode) -> Result<TargetQuery, CompileError> {
        debug!(node = node.kind(), "Compiling predicate node");
        match node {
            QueryNode::And(l, r) => Ok(TargetQuery::and(self.walk(l)?, self.walk(r)?)),
            QueryNode::Or(l, r) => Ok(TargetQuery::or(self.walk(l)?, self.walk(r)?)),
            QueryNode::Not(inner) => Ok(TargetQuery::not(self.walk(inner)?)),
            QueryNode::Comparison { op, column, value } => self.comparison(*op, column, value),
            QueryNode::Like {
                column,
                pattern,
                negated,
            } => {
                let like = self.like(column, pattern)?;
                Ok(negate_if(like, *negated))
            }
            QueryNode::In {
                column,
                values,
                negated,
            } => {
                let resolved = self.resolve(column)?;
                let field = field_mapper::field_for_column(&resolved)?;
                let terms = self.term_list(&field, &resolved, values)?;
                Ok(negate_if(TargetQuery::any_of(terms), *negated))
            }
            QueryNode::AnyIn {
                column,
                values,
                negated,
            } => {
                let resolved = self.resolve_multi(column, "ANY ... IN")?;
                let field = field_mapper::field_for_column(&resolved)?;
                let terms = self.term_list(&field, &resolved, values)?;
                Ok(negate_if(TargetQuery::any_of(terms), *negated))
            }
            QueryNode::EqAny { column, value } => {
                let resolved = self.resolve_multi(column, "= ANY")?;
                let field = field_mapper::field_for_column(&resolved)?;
                let value = self.value(value, Some(resolved.property_type))?;
                Ok(TargetQuery::Term { field, value })
            }
            QueryNode::IsNull { column, negated } => {
                let resolved = self.resolve(column)?;
                let field = field_mapper::field_for_column(&resolved)?;
                let present = TargetQuery::has_value(field);
                // IS NULL is the negation of "has any value"
                Ok(negate_if(present, !*negated))
            }
            QueryNode::InFolder {
                qualifier,
                folder_id,
            } => {
                let folder = self.folder_id(folder_id, "IN_FOLDER")?;
                let q = TargetQuery::term(PARENT_ID_FIELD, folder);
                self.qualify(qualifier.as_deref(), q)
            }
            QueryNode::InTree {
                qualifier,
                folder_id,
            } => {
                let folder = self.folder_id(folder_id, "IN_TREE")?;
                let descendants = self.descendant_folders(&folder)?;
                let q = if descendants.len() == 1 {
                    TargetQuery::term(PARENT_ID_FIELD, folder)
                } else {
                    TargetQuery::any_of(
                        descendants
                            .into_iter()
                            .map(|id| TargetQuery::term(PARENT_ID_FIELD, id)),
                    )
                };
                self.qualify(qualifier.as_deref(), q)
            }
            // No joins, so the qualifier cannot narrow anything.
            QueryNode::Contains { expression, .. } => Ok(text_search(expression)),
            QueryNode::Other { kind, text } => Err(internal(kind, text)),
        }
    }

    fn comparison(
        &self,
        op: ComparisonOp,
        column: &ColumnNode,
        value: &Expr,
    ) -> Result<TargetQuery, CompileError> {
        use std::ops::Bound::{Excluded, Included, Unbounded};

        let resolved = self.resolve(column)?;
        let field = field_mapper::field_for_column(&resolved)?;
        let value = self.value(value, Some(resolved.property_type))?;

        Ok(match op {
            ComparisonOp::Eq => TargetQuery::Term { field, value },
            ComparisonOp::NotEq => TargetQuery::not(TargetQuery::Term { field, value }),
            ComparisonOp::Gt => TargetQuery::Range {
                field,
                lower: Excluded(value),
                upper: Unbounded,
            },
            ComparisonOp::GtEq => TargetQuery::Range {
                field,
                lower: Included(value),
                upper: Unbounded,
            },
            ComparisonOp::Lt => TargetQuery::Range {
                field,
                lower: Unbounded,
                upper: Excluded(value),
            },
            ComparisonOp::LtEq => TargetQuery::Range {
                field,
                lower: Unbounded,
                upper: Included(value),
            },
        })
    }

    fn like(&self, column: &ColumnNode, pattern: &Expr) -> Result<TargetQuery, CompileError> {
        let raw = match pattern {
            Expr::Literal(Literal::String(raw)) => raw,
            Expr::Literal(_) | Expr::List(_) | Expr::Column(_) => {
                return Err(CompileError::semantic(
                    "LIKE requires a string literal on the right hand side",
                ))
            }
            Expr::Other { kind, text } => return Err(internal(kind, text)),
        };

        let resolved = self.resolve(column)?;
        if !resolved.property_type.is_string_family() {
            return Err(CompileError::semantic(format!(
                "LIKE is not allowed on {:?} property {}",
                resolved.property_type, resolved.property_id
            )));
        }
        if resolved.is_multi_valued() {
            return Err(CompileError::semantic(format!(
                "LIKE is not allowed on multi-valued property {}",
                resolved.property_id
            )));
        }

        let field = field_mapper::field_for_column(&resolved)?;
        let pattern = translate_like(&unquote(raw));
        Ok(TargetQuery::Wildcard { field, pattern })
    }

    fn term_list(
        &self,
        field: &str,
        column: &ColumnReference,
        values: &Expr,
    ) -> Result<Vec<TargetQuery>, CompileError> {
        let items = match values {
            Expr::List(items) => items.as_slice(),
            single @ Expr::Literal(_) => std::slice::from_ref(single),
            Expr::Column(c) => {
                return Err(CompileError::semantic(format!(
                    "IN list expected, found column {}",
                    c.name
                )))
            }
            Expr::Other { kind, text } => return Err(internal(kind, text)),
        };
        items
            .iter()
            .map(|item| {
                let value = self.value(item, Some(column.property_type))?;
                Ok(TargetQuery::term(field, value))
            })
            .collect()
    }

    /// Restricts `query` to the type bound to `qualifier`.
    fn qualify(&self, qualifier: Option<&str>, query: TargetQuery) -> Result<TargetQuery, CompileError> {
        let Some(alias) = qualifier else {
            return Ok(query);
        };
        let type_definition = self
            .ctx
            .columns
            .type_for_alias(alias)
            .ok_or_else(|| CompileError::semantic(format!("Unknown type alias '{alias}'")))?;
        Ok(TargetQuery::and(
            TargetQuery::term(OBJECT_TYPE_FIELD, type_definition.id.as_str()),
            query,
        ))
    }

    /// Breadth-first expansion of `root` into itself plus every descendant folder.
    fn descendant_folders(&self, root: &str) -> Result<Vec<String>, CompileError> {
        let mut visited: HashSet<String> = HashSet::from([root.to_string()]);
        let mut ordered = vec![root.to_string()];
        let mut frontier = vec![root.to_string()];
        let mut depth = 0;

        while !frontier.is_empty() {
            if depth >= self.ctx.in_tree_max_depth {
                warn!(
                    folder_id = %root,
                    max_depth = self.ctx.in_tree_max_depth,
                    "IN_TREE expansion stopped at depth limit"
                );
                break;
            }
            let children = self
                .ctx
                .index
                .child_folders(self.ctx.repository_id, &frontier)?;
            frontier = children
                .into_iter()
                .filter(|id| visited.insert(id.clone()))
                .collect();
            ordered.extend(frontier.iter().cloned());
            depth += 1;
        }

        debug!(folder_id = %root, count = ordered.len(), depth, "Expanded IN_TREE folder set");
        Ok(ordered)
    }

    fn folder_id(&self, expr: &Expr, operator: &str) -> Result<String, CompileError> {
        let id = match expr {
            Expr::Literal(Literal::String(raw)) => unquote(raw),
            Expr::List(items) if items.len() == 1 => return self.folder_id(&items[0], operator),
            Expr::Other { kind, text } => return Err(internal(kind, text)),
            _ => String::new(),
        };
        if id.trim().is_empty() {
            return Err(CompileError::semantic(format!(
                "Folder id in {operator} must be a non-empty string"
            )));
        }
        Ok(id)
    }

    fn resolve(&self, column: &ColumnNode) -> Result<ColumnReference, CompileError> {
        self.ctx
            .columns
            .resolve(column.position)
            .ok_or_else(|| CompileError::UnknownColumn {
                name: column.name.clone(),
                position: column.position,
            })
    }

    fn resolve_multi(&self, column: &ColumnNode, operator: &str) -> Result<ColumnReference, CompileError> {
        let resolved = self.resolve(column)?;
        if !resolved.is_multi_valued() {
            return Err(CompileError::semantic(format!(
                "Operator {operator} is only allowed on multi-valued properties, {} is single-valued",
                resolved.property_id
            )));
        }
        Ok(resolved)
    }

    fn value(&self, expr: &Expr, target: Option<PropertyType>) -> Result<FieldValue, CompileError> {
        match expr {
            Expr::Literal(literal) => literal_value(literal, target),
            Expr::List(_) => Err(CompileError::semantic("A list is not allowed here")),
            Expr::Column(c) => Err(CompileError::semantic(format!(
                "Column {} is not allowed on the right hand side",
                c.name
            ))),
            Expr::Other { kind, text } => Err(internal(kind, text)),
        }
    }
}

fn negate_if(query: TargetQuery, negate: bool) -> TargetQuery {
    if negate {
        TargetQuery::not(query)
    } else {
        query
    }
}

fn internal(kind: &str, text: &str) -> CompileError {
    tracing::error!(node_kind = %kind, text = %text, "Unknown node type in query tree");
    CompileError::Internal {
        node_kind: kind.to_string(),
        text: text.to_string(),
    }
}

fn text_search(node: &TextSearchNode) -> TargetQuery {
    match node {
        TextSearchNode::And(children) => TargetQuery::all_of(children.iter().map(text_search)),
        TextSearchNode::Or(children) => TargetQuery::any_of(children.iter().map(text_search)),
        TextSearchNode::Minus(inner) => TargetQuery::not(text_search(inner)),
        TextSearchNode::Word(word) => TargetQuery::term(FULL_TEXT_FIELD, word.as_str()),
        TextSearchNode::Phrase(phrase) => {
            let trimmed = phrase
                .strip_prefix('"')
                .and_then(|p| p.strip_suffix('"'))
                .unwrap_or(phrase);
            TargetQuery::term(FULL_TEXT_FIELD, trimmed)
        }
    }
}

/// Strips the surrounding quotes of a string literal and undoes quote escaping.
pub fn unquote(raw: &str) -> String {
    let inner = raw
        .strip_prefix('\'')
        .and_then(|s| s.strip_suffix('\''))
        .unwrap_or(raw);
    inner.replace("''", "'").replace("\\'", "'")
}

/// Converts a literal token into a typed value, coerced toward the column type.
pub fn literal_value(literal: &Literal, target: Option<PropertyType>) -> Result<FieldValue, CompileError> {
    let invalid = || CompileError::InvalidLiteral {
        kind: literal.kind(),
        text: literal.text().to_string(),
    };

    match literal {
        Literal::Boolean(text) => match text.to_ascii_lowercase().as_str() {
            "true" => Ok(FieldValue::Bool(true)),
            "false" => Ok(FieldValue::Bool(false)),
            _ => Err(invalid()),
        },
        Literal::Number(text) => {
            if target.is_some_and(PropertyType::is_string_family) {
                return Ok(FieldValue::Str(text.clone()));
            }
            if text.contains(['.', 'e', 'E']) {
                text.parse::<f64>().map(FieldValue::Decimal).map_err(|_| invalid())
            } else {
                text.parse::<i64>().map(FieldValue::Int).map_err(|_| invalid())
            }
        }
        Literal::String(raw) => Ok(FieldValue::Str(unquote(raw))),
        Literal::Timestamp(text) => {
            let start = text.find('\'').ok_or_else(invalid)?;
            let inner = text[start + 1..].strip_suffix('\'').ok_or_else(invalid)?;
            Ok(FieldValue::Timestamp(inner.to_string()))
        }
    }
}
