//! 索引 worker
//!
//! Applies one contiguous slice of deduplicated change events to the search
//! index. A failing event is logged and counted, and the slice goes on with
//! the next event.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::error::{RepositoryError, Result};
use crate::infrastructure::config::FulltextConfig;
use crate::models::{BaseType, ChangeEvent, ChangeType, IndexDocument, ObjectSnapshot};
use crate::repository::{ObjectStore, TypeCatalog};
use crate::search_engine::SearchIndex;

use super::content_extractor;
use super::document_builder::build_document;

/// Per-slice counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SliceReport {
    pub applied: usize,
    pub skipped: usize,
    pub failures: usize,
    /// Stopped before the end of the slice.
    pub cancelled: bool,
}

impl SliceReport {
    pub fn merge(&mut self, other: SliceReport) {
        self.applied += other.applied;
        self.skipped += other.skipped;
        self.failures += other.failures;
        self.cancelled |= other.cancelled;
    }
}

enum Outcome {
    Applied,
    Skipped,
}

pub struct IndexingWorker {
    repository_id: String,
    index: Arc<dyn SearchIndex>,
    objects: Arc<dyn ObjectStore>,
    types: Arc<dyn TypeCatalog>,
    fulltext: FulltextConfig,
    cancel: CancellationToken,
}

impl IndexingWorker {
    pub fn new(
        repository_id: impl Into<String>,
        index: Arc<dyn SearchIndex>,
        objects: Arc<dyn ObjectStore>,
        types: Arc<dyn TypeCatalog>,
        fulltext: FulltextConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            repository_id: repository_id.into(),
            index,
            objects,
            types,
            fulltext,
            cancel,
        }
    }

    /// Applies `events` in order; never fails as a whole.
    pub async fn process_slice(&self, worker_id: usize, events: Vec<ChangeEvent>) -> SliceReport {
        let mut report = SliceReport::default();
        debug!(worker_id, events = events.len(), "Worker started");

        for event in &events {
            if self.cancel.is_cancelled() {
                warn!(worker_id, object_id = %event.object_id, "Worker cancelled before end of slice");
                report.cancelled = true;
                break;
            }

            match self.apply(event).await {
                Ok(Outcome::Applied) => report.applied += 1,
                Ok(Outcome::Skipped) => report.skipped += 1,
                Err(e) => {
                    error!(
                        worker_id,
                        object_id = %event.object_id,
                        change_type = ?event.change_type,
                        error = %e,
                        "Failed to apply change event"
                    );
                    report.failures += 1;
                }
            }
        }

        debug!(worker_id, ?report, "Worker finished");
        report
    }

    async fn apply(&self, event: &ChangeEvent) -> Result<Outcome> {
        match event.change_type {
            ChangeType::Created | ChangeType::Updated => self.upsert(&event.object_id).await,
            ChangeType::Deleted => self.delete(&event.object_id),
        }
    }

    async fn upsert(&self, object_id: &str) -> Result<Outcome> {
        let object = match self.objects.get_object(object_id).await {
            Ok(object) => object,
            Err(RepositoryError::NotFound(_)) => {
                debug!(object_id = %object_id, "Object deleted after the change was logged, skipping");
                return Ok(Outcome::Skipped);
            }
            Err(e) => return Err(e.into()),
        };

        if !object.base_type.is_indexable() {
            debug!(
                object_id = %object_id,
                base_type = object.base_type.as_str(),
                "Base type is not indexed, skipping"
            );
            return Ok(Outcome::Skipped);
        }

        let content = self.content_text(&object).await;
        let document = build_document(&self.repository_id, &object, self.types.as_ref(), content);
        self.index.upsert(&document)?;
        debug!(object_id = %object_id, id = %document.id, "Indexed object");
        Ok(Outcome::Applied)
    }

    fn delete(&self, object_id: &str) -> Result<Outcome> {
        let id = IndexDocument::document_id(&self.repository_id, object_id);
        if !self.index.exists(&id)? {
            debug!(object_id = %object_id, "Object not in index, nothing to delete");
            return Ok(Outcome::Skipped);
        }
        self.index.delete(&id)?;
        debug!(object_id = %object_id, "Removed object from index");
        Ok(Outcome::Applied)
    }

    /// Extracted content text; fetch failures degrade to metadata-only indexing.
    async fn content_text(&self, object: &ObjectSnapshot) -> Option<String> {
        if object.base_type != BaseType::Document
            || !content_extractor::is_allowed(object.mime_type(), &self.fulltext)
        {
            return None;
        }
        match self.objects.get_content_stream(&object.id).await {
            Ok(Some(stream)) => content_extractor::extract_text(&stream, self.fulltext.max_content_bytes),
            Ok(None) => None,
            Err(e) => {
                warn!(object_id = %object.id, error = %e, "Content stream unavailable, indexing metadata only");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{property_ids as ids, ContentStream, TargetQuery};
    use crate::repository::InMemoryRepository;
    use crate::search_engine::{SearchPage, TantivyIndex};

    struct Fixture {
        repo: Arc<InMemoryRepository>,
        index: Arc<TantivyIndex>,
        worker: IndexingWorker,
    }

    fn fixture(fulltext: FulltextConfig) -> Fixture {
        let repo = Arc::new(InMemoryRepository::new());
        let index = Arc::new(TantivyIndex::in_memory().unwrap());
        let worker = IndexingWorker::new(
            "repo",
            index.clone(),
            repo.clone(),
            repo.clone(),
            fulltext,
            CancellationToken::new(),
        );
        Fixture { repo, index, worker }
    }

    fn document(id: &str) -> ObjectSnapshot {
        ObjectSnapshot::new(id, BaseType::Document, "cmis:document")
            .with_property(ids::NAME, format!("{id}.txt"))
            .with_property(ids::CONTENT_STREAM_MIME_TYPE, "text/plain")
    }

    fn search_text(index: &TantivyIndex, text: &str) -> usize {
        index
            .search(
                &TargetQuery::term("text", text),
                &TargetQuery::MatchAll,
                SearchPage::new(0, 10),
            )
            .unwrap()
            .total
    }

    #[tokio::test]
    async fn test_upsert_and_idempotent_delete() {
        let f = fixture(FulltextConfig::default());
        f.repo.put_object(document("a"));

        let report = f
            .worker
            .process_slice(0, vec![ChangeEvent::new("a", ChangeType::Created, 1)])
            .await;
        f.index.commit().unwrap();
        assert_eq!(report.applied, 1);
        assert!(f.index.exists("repo_a").unwrap());

        let deletes = vec![
            ChangeEvent::new("a", ChangeType::Deleted, 2),
            ChangeEvent::new("never-indexed", ChangeType::Deleted, 3),
        ];
        let report = f.worker.process_slice(0, deletes).await;
        f.index.commit().unwrap();
        assert_eq!((report.applied, report.skipped, report.failures), (1, 1, 0));
        assert!(!f.index.exists("repo_a").unwrap());
    }

    #[tokio::test]
    async fn test_missing_and_unindexable_objects_are_skipped() {
        let f = fixture(FulltextConfig::default());
        f.repo.put_object(ObjectSnapshot::new("rel", BaseType::Relationship, "cmis:relationship"));

        let report = f
            .worker
            .process_slice(
                1,
                vec![
                    ChangeEvent::new("gone", ChangeType::Updated, 1),
                    ChangeEvent::new("rel", ChangeType::Created, 2),
                ],
            )
            .await;
        assert_eq!((report.applied, report.skipped, report.failures), (0, 2, 0));
    }

    #[tokio::test]
    async fn test_content_is_indexed_when_enabled() {
        let enabled = FulltextConfig {
            enabled: true,
            ..Default::default()
        };
        for (config, expected) in [(FulltextConfig::default(), 0), (enabled, 1)] {
            let f = fixture(config);
            f.repo.put_object(document("a"));
            f.repo.set_content(
                "a",
                ContentStream {
                    mime_type: "text/plain".into(),
                    bytes: b"quarterly revenue figures".to_vec(),
                },
            );
            f.worker
                .process_slice(0, vec![ChangeEvent::new("a", ChangeType::Created, 1)])
                .await;
            f.index.commit().unwrap();
            assert_eq!(search_text(&f.index, "revenue"), expected);
            assert_eq!(search_text(&f.index, "a.txt"), 1);
        }
    }

    #[tokio::test]
    async fn test_cancelled_worker_stops() {
        let f = fixture(FulltextConfig::default());
        f.repo.put_object(document("a"));
        f.worker.cancel.cancel();
        let report = f
            .worker
            .process_slice(0, vec![ChangeEvent::new("a", ChangeType::Created, 1)])
            .await;
        assert!(report.cancelled);
        assert_eq!(report.applied, 0);
    }
}
