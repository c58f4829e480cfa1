//! Search index module
//!
//! Defines the index seam used by the compiler, the query processor and the
//! change tracker, plus a Tantivy-backed implementation with:
//! - one flattened exact-match field holding every (field, value) pair
//! - an analyzed full-text field
//! - the change-log continuation token stored as a record in the same index

pub mod query_translator;
pub mod schema;
pub mod tantivy_index;
pub mod term_encoding;

pub use query_translator::QueryTranslator;
pub use schema::ContentSchema;
pub use tantivy_index::TantivyIndex;

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::IndexResult;
use crate::models::{IndexDocument, TargetQuery};

/// Offset and size of a result window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchPage {
    pub skip: usize,
    pub limit: usize,
}

impl SearchPage {
    pub fn new(skip: usize, limit: usize) -> Self {
        Self { skip, limit }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Index document key.
    pub id: String,
    pub object_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHits {
    /// Hits in result order, last-modified first.
    pub hits: Vec<SearchHit>,
    /// Total matches, ignoring the page window.
    pub total: usize,
}

/// Operations the search side needs from an inverted index.
///
/// Writes become visible to `exists`, `search` and `child_folders` after `commit`.
pub trait SearchIndex: Send + Sync {
    /// Inserts or replaces the document with the same id.
    fn upsert(&self, document: &IndexDocument) -> IndexResult<()>;

    /// Removes the document with `id`. Removing an absent id is a no-op.
    fn delete(&self, id: &str) -> IndexResult<()>;

    fn exists(&self, id: &str) -> IndexResult<bool>;

    /// Documents matching both `query` and `filter`.
    fn search(&self, query: &TargetQuery, filter: &TargetQuery, page: SearchPage) -> IndexResult<SearchHits>;

    /// Object ids of folders whose parent is any of `parent_ids`.
    fn child_folders(&self, repository_id: &str, parent_ids: &[String]) -> IndexResult<Vec<String>>;

    fn commit(&self) -> IndexResult<()>;

    /// Removes every document of a repository, including its continuation token.
    fn clear_repository(&self, repository_id: &str) -> IndexResult<()>;
}

/// Durable home of the change-log continuation token, one per repository.
pub trait TokenStore: Send + Sync {
    /// `None` when no token was stored or the stored token is empty.
    fn read_token(&self, repository_id: &str) -> IndexResult<Option<String>>;

    /// Persists `token`; an empty token resets tracking to the beginning.
    fn store_token(&self, repository_id: &str, token: &str) -> IndexResult<()>;

    /// Lock serializing tracking runs of `repository_id` against this store.
    /// Every tracker sharing the store gets the same lock for a repository.
    fn run_lock(&self, repository_id: &str) -> Arc<tokio::sync::Mutex<()>>;
}
