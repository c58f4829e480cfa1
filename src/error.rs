use miette::Diagnostic;
use thiserror::Error;

use crate::models::SourcePosition;

/**
 * 应用错误类型 - 使用 miette 提供用户友好的错误诊断
 *
 * 顶层错误，聚合查询编译、索引、仓库访问和变更追踪四类子系统错误
 */
#[derive(Error, Debug, Diagnostic)]
pub enum AppError {
    #[error(transparent)]
    #[diagnostic(
        code(content_search::compile),
        help("Check the column names and operators used in the WHERE clause")
    )]
    Compile(#[from] CompileError),

    #[error(transparent)]
    #[diagnostic(code(content_search::query))]
    Query(#[from] QueryError),

    #[error(transparent)]
    #[diagnostic(
        code(content_search::index),
        help("Ensure the index directory is writable and not locked by another process")
    )]
    Index(#[from] IndexError),

    #[error(transparent)]
    #[diagnostic(code(content_search::repository))]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    #[diagnostic(code(content_search::tracker))]
    Tracker(#[from] TrackerError),

    #[error("Configuration error: {0}")]
    #[diagnostic(
        code(content_search::config),
        help("Run ServiceConfiguration::validate() to see which value is out of range")
    )]
    Config(String),
}

pub type Result<T> = std::result::Result<T, AppError>;

/// Errors raised while compiling a query predicate into a [`crate::models::TargetQuery`].
///
/// Everything except [`CompileError::Internal`] and [`CompileError::Index`] is
/// a semantic error in the user's query.
#[derive(Error, Debug)]
pub enum CompileError {
    #[error("Unknown column '{name}' at {position}")]
    UnknownColumn {
        name: String,
        position: SourcePosition,
    },

    #[error("Property '{property_id}' has no search index field")]
    UnmappedProperty { property_id: String },

    #[error("Invalid query: {0}")]
    Semantic(String),

    #[error("Invalid {kind} literal: {text}")]
    InvalidLiteral { kind: &'static str, text: String },

    #[error("Unknown node type: {node_kind} ({text})")]
    Internal { node_kind: String, text: String },

    #[error("Folder tree expansion failed: {0}")]
    Index(#[from] IndexError),
}

impl CompileError {
    /// True for errors caused by the query itself rather than the compiler or the index.
    pub fn is_semantic(&self) -> bool {
        !matches!(self, Self::Internal { .. } | Self::Index(_))
    }

    pub fn semantic(message: impl Into<String>) -> Self {
        Self::Semantic(message.into())
    }
}

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Tantivy error: {0}")]
    Tantivy(#[from] tantivy::TantivyError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Document serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Index directory error: {0}")]
    OpenDirectory(#[from] tantivy::directory::error::OpenDirectoryError),

    #[error("Index unavailable: {0}")]
    Unavailable(String),
}

pub type IndexResult<T> = std::result::Result<T, IndexError>;

#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Repository unavailable: {0}")]
    Unavailable(String),

    #[error("Malformed object {object_id}: {reason}")]
    Malformed { object_id: String, reason: String },
}

#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("Change log fetch failed: {0}")]
    ChangeLog(#[source] RepositoryError),

    #[error("Continuation token store failed: {0}")]
    TokenStore(#[source] IndexError),

    #[error("Index commit failed: {0}")]
    Index(#[source] IndexError),

    #[error("Indexing worker terminated abnormally: {0}")]
    Worker(String),

    #[error("A tracking run is already in progress for repository {0}")]
    AlreadyRunning(String),

    #[error("Tracking run cancelled before the batch completed")]
    Cancelled,
}

#[derive(Error, Debug)]
pub enum QueryError {
    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error("Search failed: {0}")]
    Index(#[from] IndexError),

    #[error("Object retrieval failed: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Unknown type in FROM clause: {0}")]
    UnknownType(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_semantic_classification() {
        assert!(CompileError::semantic("LIKE on integer").is_semantic());
        assert!(CompileError::UnmappedProperty {
            property_id: "cmis:changeToken".into()
        }
        .is_semantic());
        assert!(!CompileError::Internal {
            node_kind: "FUNCTION".into(),
            text: "SCORE()".into()
        }
        .is_semantic());
        assert!(!CompileError::Index(IndexError::Unavailable("down".into())).is_semantic());
    }

    #[test]
    fn test_app_error_wraps_compile_error() {
        let err: AppError = CompileError::UnknownColumn {
            name: "cmis:nme".into(),
            position: SourcePosition::new(1, 30),
        }
        .into();
        assert!(err.to_string().contains("cmis:nme"));
        assert!(err.to_string().contains("1:30"));
    }
}
