//! 主仓库协作接口
//!
//! The change log, object store, type catalog and permission check belong to
//! the primary repository. The indexer and the query processor only see them
//! through these traits.

pub mod in_memory;

pub use in_memory::InMemoryRepository;

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::RepositoryError;
use crate::models::{ChangeEventPage, ContentStream, ObjectSnapshot, TypeDefinition};

/**
 * 变更日志
 *
 * Events come back oldest first. When `token` is given, the first event of the
 * page is the one at the token position and the caller drops it.
 */
#[async_trait]
pub trait ChangeLog: Send + Sync {
    /// `max_items = None` returns everything after `token`.
    async fn fetch_changes(
        &self,
        token: Option<&str>,
        max_items: Option<usize>,
    ) -> Result<ChangeEventPage, RepositoryError>;
}

/**
 * 对象快照存储
 */
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// `RepositoryError::NotFound` when the object no longer exists.
    async fn get_object(&self, object_id: &str) -> Result<ObjectSnapshot, RepositoryError>;

    /// `Ok(None)` for objects without content.
    async fn get_content_stream(&self, object_id: &str) -> Result<Option<ContentStream>, RepositoryError>;
}

/// Type metadata, read-only and cheap to query.
pub trait TypeCatalog: Send + Sync {
    fn get_type(&self, type_id: &str) -> Option<Arc<TypeDefinition>>;

    /// Every transitive subtype of `type_id`, excluding the type itself.
    fn descendants(&self, type_id: &str) -> Vec<Arc<TypeDefinition>>;
}

/// Read permission check applied to query results.
pub trait PermissionFilter: Send + Sync {
    fn is_visible(&self, principal: &str, object: &ObjectSnapshot) -> bool;
}

/// Every object is visible to every principal.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl PermissionFilter for AllowAll {
    fn is_visible(&self, _principal: &str, _object: &ObjectSnapshot) -> bool {
        true
    }
}
