//! In-process repository
//!
//! Keeps objects, content, types and an append-only change log in memory.
//! Every mutation appends a change event, so the tracker sees exactly what a
//! real repository would report.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use super::{ChangeLog, ObjectStore, TypeCatalog};
use crate::error::RepositoryError;
use crate::models::{
    ChangeEvent, ChangeEventPage, ChangeType, ContentStream, ObjectSnapshot, TypeDefinition,
};

#[derive(Default)]
struct RepositoryState {
    objects: HashMap<String, ObjectSnapshot>,
    content: HashMap<String, ContentStream>,
    types: HashMap<String, Arc<TypeDefinition>>,
    change_log: Vec<ChangeEvent>,
}

#[derive(Default)]
pub struct InMemoryRepository {
    state: RwLock<RepositoryState>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_type(&self, definition: TypeDefinition) -> Arc<TypeDefinition> {
        let definition = Arc::new(definition);
        self.state
            .write()
            .types
            .insert(definition.id.clone(), Arc::clone(&definition));
        definition
    }

    /// Stores `object`, logging CREATED or UPDATED.
    pub fn put_object(&self, object: ObjectSnapshot) {
        let mut state = self.state.write();
        let change_type = if state.objects.contains_key(&object.id) {
            ChangeType::Updated
        } else {
            ChangeType::Created
        };
        let object_id = object.id.clone();
        state.objects.insert(object_id.clone(), object);
        Self::record(&mut state, object_id, change_type);
    }

    pub fn set_content(&self, object_id: &str, content: ContentStream) {
        self.state
            .write()
            .content
            .insert(object_id.to_string(), content);
    }

    /// Removes the object, logging DELETED. Returns whether it existed.
    pub fn remove_object(&self, object_id: &str) -> bool {
        let mut state = self.state.write();
        let existed = state.objects.remove(object_id).is_some();
        state.content.remove(object_id);
        if existed {
            Self::record(&mut state, object_id.to_string(), ChangeType::Deleted);
        }
        existed
    }

    pub fn change_count(&self) -> usize {
        self.state.read().change_log.len()
    }

    fn record(state: &mut RepositoryState, object_id: String, change_type: ChangeType) {
        let position = state.change_log.len() as u64 + 1;
        state
            .change_log
            .push(ChangeEvent::new(object_id, change_type, position));
    }
}

fn parse_token(token: &str) -> Result<u64, RepositoryError> {
    token
        .parse()
        .map_err(|_| RepositoryError::Unavailable(format!("invalid change log token '{token}'")))
}

#[async_trait]
impl ChangeLog for InMemoryRepository {
    async fn fetch_changes(
        &self,
        token: Option<&str>,
        max_items: Option<usize>,
    ) -> Result<ChangeEventPage, RepositoryError> {
        let start = match token.filter(|t| !t.is_empty()) {
            Some(t) => parse_token(t)?,
            None => 0,
        };
        let state = self.state.read();
        let events: Vec<ChangeEvent> = state
            .change_log
            .iter()
            .filter(|e| e.position >= start)
            .take(max_items.unwrap_or(usize::MAX))
            .cloned()
            .collect();
        let latest_token = events
            .last()
            .map(|e| e.position.to_string())
            .or_else(|| token.map(str::to_string))
            .unwrap_or_default();
        Ok(ChangeEventPage {
            events,
            latest_token,
        })
    }
}

#[async_trait]
impl ObjectStore for InMemoryRepository {
    async fn get_object(&self, object_id: &str) -> Result<ObjectSnapshot, RepositoryError> {
        self.state
            .read()
            .objects
            .get(object_id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(object_id.to_string()))
    }

    async fn get_content_stream(&self, object_id: &str) -> Result<Option<ContentStream>, RepositoryError> {
        Ok(self.state.read().content.get(object_id).cloned())
    }
}

impl TypeCatalog for InMemoryRepository {
    fn get_type(&self, type_id: &str) -> Option<Arc<TypeDefinition>> {
        self.state.read().types.get(type_id).cloned()
    }

    fn descendants(&self, type_id: &str) -> Vec<Arc<TypeDefinition>> {
        let state = self.state.read();
        let mut found = Vec::new();
        let mut seen = HashSet::from([type_id.to_string()]);
        let mut queue = VecDeque::from([type_id.to_string()]);
        while let Some(parent) = queue.pop_front() {
            let mut children: Vec<_> = state
                .types
                .values()
                .filter(|t| t.parent_type_id.as_deref() == Some(parent.as_str()))
                .filter(|t| seen.insert(t.id.clone()))
                .cloned()
                .collect();
            children.sort_by(|a, b| a.id.cmp(&b.id));
            queue.extend(children.iter().map(|t| t.id.clone()));
            found.extend(children);
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BaseType;

    #[tokio::test]
    async fn test_change_log_repeats_event_at_token() {
        let repo = InMemoryRepository::new();
        repo.put_object(ObjectSnapshot::new("a", BaseType::Document, "cmis:document"));
        repo.put_object(ObjectSnapshot::new("b", BaseType::Document, "cmis:document"));
        repo.put_object(ObjectSnapshot::new("a", BaseType::Document, "cmis:document"));

        let first = repo.fetch_changes(None, Some(2)).await.unwrap();
        assert_eq!(first.events.len(), 2);
        assert_eq!(first.latest_token, "2");

        let second = repo.fetch_changes(Some("2"), None).await.unwrap();
        let positions: Vec<u64> = second.events.iter().map(|e| e.position).collect();
        assert_eq!(positions, vec![2, 3]);
        assert_eq!(second.events[1].change_type, ChangeType::Updated);
        assert_eq!(second.latest_token, "3");
    }

    #[tokio::test]
    async fn test_removed_object_is_not_found() {
        let repo = InMemoryRepository::new();
        repo.put_object(ObjectSnapshot::new("a", BaseType::Folder, "cmis:folder"));
        assert!(repo.remove_object("a"));
        assert!(!repo.remove_object("a"));
        assert!(matches!(
            repo.get_object("a").await,
            Err(RepositoryError::NotFound(_))
        ));
        assert_eq!(repo.change_count(), 2);
    }

    #[tokio::test]
    async fn test_invalid_token_is_rejected() {
        let repo = InMemoryRepository::new();
        assert!(repo.fetch_changes(Some("abc"), None).await.is_err());
    }

    #[test]
    fn test_descendants_are_transitive() {
        let repo = InMemoryRepository::new();
        repo.register_type(TypeDefinition::new("cmis:document", BaseType::Document));
        repo.register_type(TypeDefinition::new("invoice", BaseType::Document).with_parent("cmis:document"));
        repo.register_type(TypeDefinition::new("vat_invoice", BaseType::Document).with_parent("invoice"));
        repo.register_type(TypeDefinition::new("cmis:folder", BaseType::Folder));

        let ids: Vec<String> = repo
            .descendants("cmis:document")
            .iter()
            .map(|t| t.id.clone())
            .collect();
        assert_eq!(ids, vec!["invoice", "vat_invoice"]);
        assert!(repo.descendants("vat_invoice").is_empty());
    }

    proptest::proptest! {
        /// Resuming from each page's token and dropping the repeated event
        /// visits every logged position exactly once.
        #[test]
        fn prop_resumed_paging_visits_each_event_once(count in 0usize..40, page_size in 2usize..8) {
            let repo = InMemoryRepository::new();
            for i in 0..count {
                repo.put_object(ObjectSnapshot::new(format!("o{}", i % 5), BaseType::Document, "cmis:document"));
            }

            let positions = tokio_test::block_on(async {
                let mut seen = Vec::new();
                let mut token: Option<String> = None;
                loop {
                    let page = repo.fetch_changes(token.as_deref(), Some(page_size)).await.unwrap();
                    let skip = usize::from(token.is_some() && !page.events.is_empty());
                    let fresh: Vec<u64> = page.events.iter().skip(skip).map(|e| e.position).collect();
                    if fresh.is_empty() {
                        break;
                    }
                    seen.extend(fresh);
                    token = Some(page.latest_token);
                }
                seen
            });

            proptest::prop_assert_eq!(positions, (1..=count as u64).collect::<Vec<_>>());
        }
    }
}
