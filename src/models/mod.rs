pub mod ast;
pub mod change_event;
pub mod column;
pub mod field_value;
pub mod index_document;
pub mod object;
pub mod query;
pub mod target_query;
pub mod types;

// 重新导出核心类型
pub use ast::{ColumnNode, ComparisonOp, Expr, Literal, QueryNode, SourcePosition, TextSearchNode};
pub use change_event::{ChangeEvent, ChangeEventPage, ChangeType};
pub use column::{ColumnReference, ColumnResolver, StaticColumnResolver};
pub use field_value::{format_utc, FieldValue};
pub use index_document::IndexDocument;
pub use object::{property_ids, ContentStream, ObjectSnapshot};
pub use query::{
    FromClause, Projection, QueryRequest, QueryResult, QueryResultRow, QueryStatement,
    SelectColumn, SortSpec,
};
pub use target_query::{Clause, Occur, TargetQuery, WildcardPattern, WildcardToken};
pub use types::{BaseType, Cardinality, PropertyDefinition, PropertyType, TypeDefinition};
