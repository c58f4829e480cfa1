//! 集成测试共享桩
//!
//! Wraps [`InMemoryRepository`] with a scripted change log and an object store
//! that can be told to fail or panic for chosen objects.

#![allow(dead_code)]

use async_trait::async_trait;
use content_search::error::RepositoryError;
use content_search::models::{
    property_ids as ids, BaseType, ChangeEvent, ChangeEventPage, ChangeType, ContentStream,
    ObjectSnapshot, TypeDefinition,
};
use content_search::repository::{ChangeLog, InMemoryRepository, ObjectStore, TypeCatalog};
use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

pub const REPO: &str = "repo";

pub fn document(id: &str, name: &str) -> ObjectSnapshot {
    ObjectSnapshot::new(id, BaseType::Document, "cmis:document").with_property(ids::NAME, name)
}

pub fn folder(id: &str, parent: &str) -> ObjectSnapshot {
    ObjectSnapshot::new(id, BaseType::Folder, "cmis:folder")
        .with_parent(parent)
        .with_property(ids::NAME, id)
}

pub fn page(events: &[(&str, ChangeType, u64)], token: &str) -> ChangeEventPage {
    ChangeEventPage {
        events: events
            .iter()
            .map(|(id, t, pos)| ChangeEvent::new(*id, *t, *pos))
            .collect(),
        latest_token: token.to_string(),
    }
}

/// Repository whose change log replays a fixed list of pages.
///
/// Every fetch is recorded with the token it was called with. Once the script
/// is exhausted, fetches return an empty page. Objects are served from the
/// wrapped [`InMemoryRepository`].
pub struct ScriptedRepository {
    pub objects: InMemoryRepository,
    pages: Mutex<VecDeque<Result<ChangeEventPage, String>>>,
    fetches: Mutex<Vec<Option<String>>>,
    failing: Mutex<HashSet<String>>,
    panicking: Mutex<HashSet<String>>,
}

impl ScriptedRepository {
    pub fn new() -> Self {
        Self {
            objects: InMemoryRepository::new(),
            pages: Mutex::new(VecDeque::new()),
            fetches: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
            panicking: Mutex::new(HashSet::new()),
        }
    }

    pub fn with_page(self, page: ChangeEventPage) -> Self {
        self.pages.lock().push_back(Ok(page));
        self
    }

    /// The next fetch after the scripted pages so far fails.
    pub fn with_fetch_failure(self, message: &str) -> Self {
        self.pages.lock().push_back(Err(message.to_string()));
        self
    }

    pub fn with_object(self, object: ObjectSnapshot) -> Self {
        self.objects.put_object(object);
        self
    }

    /// `get_object` for `id` returns `Unavailable`.
    pub fn fail_object(&self, id: &str) {
        self.failing.lock().insert(id.to_string());
    }

    /// `get_object` for `id` panics inside the worker task.
    pub fn panic_on_object(&self, id: &str) {
        self.panicking.lock().insert(id.to_string());
    }

    pub fn fetch_tokens(&self) -> Vec<Option<String>> {
        self.fetches.lock().clone()
    }
}

#[async_trait]
impl ChangeLog for ScriptedRepository {
    async fn fetch_changes(
        &self,
        token: Option<&str>,
        _max_items: Option<usize>,
    ) -> Result<ChangeEventPage, RepositoryError> {
        self.fetches.lock().push(token.map(str::to_string));
        match self.pages.lock().pop_front() {
            Some(Ok(page)) => Ok(page),
            Some(Err(message)) => Err(RepositoryError::Unavailable(message)),
            None => Ok(ChangeEventPage {
                events: Vec::new(),
                latest_token: token.unwrap_or_default().to_string(),
            }),
        }
    }
}

#[async_trait]
impl ObjectStore for ScriptedRepository {
    async fn get_object(&self, object_id: &str) -> Result<ObjectSnapshot, RepositoryError> {
        if self.panicking.lock().contains(object_id) {
            panic!("object store crashed on {object_id}");
        }
        if self.failing.lock().contains(object_id) {
            return Err(RepositoryError::Unavailable(format!("timeout fetching {object_id}")));
        }
        self.objects.get_object(object_id).await
    }

    async fn get_content_stream(&self, object_id: &str) -> Result<Option<ContentStream>, RepositoryError> {
        self.objects.get_content_stream(object_id).await
    }
}

impl TypeCatalog for ScriptedRepository {
    fn get_type(&self, type_id: &str) -> Option<Arc<TypeDefinition>> {
        self.objects.get_type(type_id)
    }

    fn descendants(&self, type_id: &str) -> Vec<Arc<TypeDefinition>> {
        self.objects.descendants(type_id)
    }
}
