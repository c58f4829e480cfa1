//! Tantivy-backed search index
//!
//! Implements [`SearchIndex`] and [`TokenStore`] on a single Tantivy index.
//! Writes go through one shared writer; readers are reloaded on commit so a
//! committed change is visible to the next search.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tantivy::{
    collector::{Count, DocSetCollector, TopDocs},
    directory::MmapDirectory,
    query::{BooleanQuery, Occur, Query, TermQuery},
    schema::{IndexRecordOption, Value},
    Index, IndexReader, IndexWriter, Order, ReloadPolicy, TantivyDocument, Term,
};
use tracing::{debug, info};

use super::query_translator::QueryTranslator;
use super::schema::{ContentSchema, KIND_OBJECT, KIND_TOKEN, MODIFIED_SORT_FIELD};
use super::term_encoding::encode_term;
use super::{SearchHit, SearchHits, SearchIndex, SearchPage, TokenStore};
use crate::error::IndexResult;
use crate::infrastructure::config::IndexConfig;
use crate::models::{BaseType, FieldValue, IndexDocument, TargetQuery};
use crate::services::field_mapper::{BASE_TYPE_FIELD, PARENT_ID_FIELD, REPOSITORY_ID_FIELD};

const TOKEN_ID_PREFIX: &str = "__change_token__";

pub struct TantivyIndex {
    index: Index,
    reader: IndexReader,
    writer: Arc<Mutex<IndexWriter>>,
    schema: ContentSchema,
    run_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl TantivyIndex {
    /// Opens the index described by `config`, in RAM when no path is configured.
    pub fn open(config: &IndexConfig) -> IndexResult<Self> {
        let schema = ContentSchema::build();
        let index = match &config.path {
            Some(path) => Self::open_in_dir(path, &schema)?,
            None => Index::create_in_ram(schema.schema.clone()),
        };
        Self::with_index(index, schema, config.writer_heap_size)
    }

    pub fn in_memory() -> IndexResult<Self> {
        Self::open(&IndexConfig::default())
    }

    fn open_in_dir(path: &Path, schema: &ContentSchema) -> IndexResult<Index> {
        std::fs::create_dir_all(path)?;
        let directory = MmapDirectory::open(path)?;
        Ok(Index::open_or_create(directory, schema.schema.clone())?)
    }

    fn with_index(index: Index, schema: ContentSchema, writer_heap_size: usize) -> IndexResult<Self> {
        schema.configure_tokenizers(&index);

        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;

        let writer = index.writer_with_num_threads(1, writer_heap_size)?;

        info!(heap_size = writer_heap_size, "Search index initialized");

        Ok(Self {
            index,
            reader,
            writer: Arc::new(Mutex::new(writer)),
            schema,
            run_locks: Mutex::new(HashMap::new()),
        })
    }

    /// Stored source of a committed document.
    pub fn load_document(&self, id: &str) -> IndexResult<Option<IndexDocument>> {
        let Some(doc) = self.find_by_id(id)? else {
            return Ok(None);
        };
        match doc.get_first(self.schema.source).and_then(|v| v.as_str()) {
            Some(json) => Ok(Some(serde_json::from_str(json)?)),
            None => Ok(None),
        }
    }

    fn find_by_id(&self, id: &str) -> IndexResult<Option<TantivyDocument>> {
        let searcher = self.reader.searcher();
        let query = TermQuery::new(self.id_term(id), IndexRecordOption::Basic);
        let top = searcher.search(&query, &TopDocs::with_limit(1))?;
        match top.first() {
            Some((_, address)) => Ok(Some(searcher.doc(*address)?)),
            None => Ok(None),
        }
    }

    fn id_term(&self, id: &str) -> Term {
        Term::from_field_text(self.schema.id, id)
    }

    fn kind_query(&self, kind: &str) -> Box<dyn Query> {
        Box::new(TermQuery::new(
            Term::from_field_text(self.schema.kind, kind),
            IndexRecordOption::Basic,
        ))
    }

    fn token_id(repository_id: &str) -> String {
        format!("{TOKEN_ID_PREFIX}{repository_id}")
    }

    fn to_tantivy(&self, document: &IndexDocument) -> IndexResult<TantivyDocument> {
        let mut doc = TantivyDocument::default();
        doc.add_text(self.schema.id, &document.id);
        doc.add_text(self.schema.kind, KIND_OBJECT);
        doc.add_text(self.schema.repository, &document.repository_id);
        doc.add_text(self.schema.object_id, &document.object_id);
        for (field, values) in &document.fields {
            for value in values {
                doc.add_text(self.schema.props, &encode_term(field, value));
            }
        }
        if let Some(text) = &document.full_text {
            doc.add_text(self.schema.text, text);
        }
        let modified = document.modified.map(|m| m.timestamp_millis()).unwrap_or(0);
        doc.add_i64(self.schema.modified, modified);
        doc.add_text(self.schema.source, &serde_json::to_string(document)?);
        Ok(doc)
    }
}

impl SearchIndex for TantivyIndex {
    fn upsert(&self, document: &IndexDocument) -> IndexResult<()> {
        let doc = self.to_tantivy(document)?;
        let writer = self.writer.lock();
        writer.delete_term(self.id_term(&document.id));
        writer.add_document(doc)?;
        debug!(id = %document.id, fields = document.fields.len(), "Document staged for indexing");
        Ok(())
    }

    fn delete(&self, id: &str) -> IndexResult<()> {
        let writer = self.writer.lock();
        writer.delete_term(self.id_term(id));
        debug!(id = %id, "Document staged for deletion");
        Ok(())
    }

    fn exists(&self, id: &str) -> IndexResult<bool> {
        let searcher = self.reader.searcher();
        let query = TermQuery::new(self.id_term(id), IndexRecordOption::Basic);
        Ok(searcher.search(&query, &Count)? > 0)
    }

    fn search(&self, query: &TargetQuery, filter: &TargetQuery, page: SearchPage) -> IndexResult<SearchHits> {
        let translator = QueryTranslator::new(&self.index, &self.schema);
        let combined = BooleanQuery::new(vec![
            (Occur::Must, self.kind_query(KIND_OBJECT)),
            (Occur::Must, translator.translate(query)?),
            (Occur::Must, translator.translate(filter)?),
        ]);

        let searcher = self.reader.searcher();
        let total = searcher.search(&combined, &Count)?;
        if page.limit == 0 || page.skip >= total {
            return Ok(SearchHits { hits: Vec::new(), total });
        }

        let collector = TopDocs::with_limit(page.limit)
            .and_offset(page.skip)
            .order_by_fast_field::<i64>(MODIFIED_SORT_FIELD, Order::Desc);
        let top_docs = searcher.search(&combined, &collector)?;

        let mut hits = Vec::with_capacity(top_docs.len());
        for (_modified, address) in top_docs {
            let doc: TantivyDocument = searcher.doc(address)?;
            let id = doc.get_first(self.schema.id).and_then(|v| v.as_str());
            let object_id = doc.get_first(self.schema.object_id).and_then(|v| v.as_str());
            if let (Some(id), Some(object_id)) = (id, object_id) {
                hits.push(SearchHit {
                    id: id.to_string(),
                    object_id: object_id.to_string(),
                });
            }
        }

        debug!(query = %query, total, returned = hits.len(), "Search completed");
        Ok(SearchHits { hits, total })
    }

    fn child_folders(&self, repository_id: &str, parent_ids: &[String]) -> IndexResult<Vec<String>> {
        if parent_ids.is_empty() {
            return Ok(Vec::new());
        }
        let translator = QueryTranslator::new(&self.index, &self.schema);
        let parents: Vec<(Occur, Box<dyn Query>)> = parent_ids
            .iter()
            .map(|p| {
                let q: Box<dyn Query> =
                    Box::new(translator.exact(PARENT_ID_FIELD, &FieldValue::str(p.as_str())));
                (Occur::Should, q)
            })
            .collect();
        let query = BooleanQuery::new(vec![
            (Occur::Must, self.kind_query(KIND_OBJECT)),
            (
                Occur::Must,
                Box::new(translator.exact(REPOSITORY_ID_FIELD, &FieldValue::str(repository_id))),
            ),
            (
                Occur::Must,
                Box::new(translator.exact(BASE_TYPE_FIELD, &FieldValue::str(BaseType::Folder.as_str()))),
            ),
            (Occur::Must, Box::new(BooleanQuery::new(parents))),
        ]);

        let searcher = self.reader.searcher();
        let addresses = searcher.search(&query, &DocSetCollector)?;
        let mut children = Vec::with_capacity(addresses.len());
        for address in addresses {
            let doc: TantivyDocument = searcher.doc(address)?;
            if let Some(object_id) = doc.get_first(self.schema.object_id).and_then(|v| v.as_str()) {
                children.push(object_id.to_string());
            }
        }
        children.sort();
        Ok(children)
    }

    fn commit(&self) -> IndexResult<()> {
        let mut writer = self.writer.lock();
        writer.commit()?;
        self.reader.reload()?;
        Ok(())
    }

    fn clear_repository(&self, repository_id: &str) -> IndexResult<()> {
        let mut writer = self.writer.lock();
        writer.delete_term(Term::from_field_text(self.schema.repository, repository_id));
        writer.commit()?;
        self.reader.reload()?;
        info!(repository_id = %repository_id, "Cleared repository from search index");
        Ok(())
    }
}

impl TokenStore for TantivyIndex {
    fn read_token(&self, repository_id: &str) -> IndexResult<Option<String>> {
        let token = self
            .find_by_id(&Self::token_id(repository_id))?
            .and_then(|doc| {
                doc.get_first(self.schema.token)
                    .and_then(|v| v.as_str())
                    .map(str::to_string)
            })
            .filter(|t| !t.is_empty());
        Ok(token)
    }

    fn store_token(&self, repository_id: &str, token: &str) -> IndexResult<()> {
        let id = Self::token_id(repository_id);
        let mut doc = TantivyDocument::default();
        doc.add_text(self.schema.id, &id);
        doc.add_text(self.schema.kind, KIND_TOKEN);
        doc.add_text(self.schema.repository, repository_id);
        doc.add_text(self.schema.token, token);
        doc.add_i64(self.schema.modified, 0);

        let mut writer = self.writer.lock();
        writer.delete_term(self.id_term(&id));
        writer.add_document(doc)?;
        writer.commit()?;
        self.reader.reload()?;
        debug!(repository_id = %repository_id, token = %token, "Stored continuation token");
        Ok(())
    }

    fn run_lock(&self, repository_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.run_locks
            .lock()
            .entry(repository_id.to_string())
            .or_default()
            .clone()
    }
}
