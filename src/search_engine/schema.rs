//! Tantivy schema definition for repository objects
//!
//! Defines the search index schema with:
//! - a unique raw `id` key per document
//! - a flattened raw `props` field carrying every mapped property as an exact term
//! - an analyzed `text` field for CONTAINS
//! - a fast `modified` field for default result ordering
//! - the stored source document and the continuation token

use tantivy::schema::{
    Field, IndexRecordOption, NumericOptions, Schema, TextFieldIndexing, TextOptions,
};
use tantivy::tokenizer::TextAnalyzer;

pub const KIND_OBJECT: &str = "object";
pub const KIND_TOKEN: &str = "token";
pub const MODIFIED_SORT_FIELD: &str = "modified_at";

#[derive(Clone, Debug)]
pub struct ContentSchema {
    pub schema: Schema,
    pub id: Field,         // Unique key, <repositoryId>_<objectId>
    pub kind: Field,       // object | token
    pub repository: Field, // Owning repository
    pub object_id: Field,  // Stored for hit resolution
    pub props: Field,      // field\u{1}value exact terms
    pub text: Field,       // Full-text body
    pub modified: Field,   // Epoch millis, fast
    pub source: Field,     // Stored JSON of the IndexDocument
    pub token: Field,      // Continuation token value
}

fn raw_indexed() -> TextOptions {
    TextOptions::default().set_indexing_options(
        TextFieldIndexing::default()
            .set_tokenizer("raw")
            .set_index_option(IndexRecordOption::Basic),
    )
}

impl ContentSchema {
    pub fn build() -> Self {
        let mut schema_builder = Schema::builder();

        let id = schema_builder.add_text_field("id", raw_indexed().set_stored());
        let kind = schema_builder.add_text_field("kind", raw_indexed());
        let repository = schema_builder.add_text_field("repository", raw_indexed().set_stored());
        let object_id = schema_builder.add_text_field("object_id", TextOptions::default().set_stored());
        let props = schema_builder.add_text_field("props", raw_indexed());

        // Positions are required for phrase queries
        let text = schema_builder.add_text_field(
            "text",
            TextOptions::default().set_indexing_options(
                TextFieldIndexing::default()
                    .set_tokenizer("en_stem")
                    .set_index_option(IndexRecordOption::WithFreqsAndPositions),
            ),
        );

        let modified = schema_builder.add_i64_field(
            MODIFIED_SORT_FIELD,
            NumericOptions::default().set_fast(),
        );

        let source = schema_builder.add_text_field("source", TextOptions::default().set_stored());
        let token = schema_builder.add_text_field("token", TextOptions::default().set_stored());

        Self {
            schema: schema_builder.build(),
            id,
            kind,
            repository,
            object_id,
            props,
            text,
            modified,
            source,
            token,
        }
    }

    /// Registers the analyzers referenced by the schema.
    pub fn configure_tokenizers(&self, index: &tantivy::Index) {
        let tokenizer_manager = index.tokenizers();

        tokenizer_manager.register(
            "en_stem",
            TextAnalyzer::builder(tantivy::tokenizer::SimpleTokenizer::default())
                .filter(tantivy::tokenizer::RemoveLongFilter::limit(40))
                .filter(tantivy::tokenizer::LowerCaser)
                .filter(tantivy::tokenizer::Stemmer::default())
                .build(),
        );

        tokenizer_manager.register(
            "raw",
            TextAnalyzer::builder(tantivy::tokenizer::RawTokenizer::default()).build(),
        );
    }
}

impl Default for ContentSchema {
    fn default() -> Self {
        Self::build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tantivy::Index;

    #[test]
    fn test_schema_creation() {
        let content_schema = ContentSchema::build();
        for name in ["id", "kind", "repository", "object_id", "props", "text", MODIFIED_SORT_FIELD, "source", "token"] {
            assert!(content_schema.schema.get_field(name).is_ok(), "missing {name}");
        }
    }

    #[test]
    fn test_tokenizer_configuration() {
        let content_schema = ContentSchema::build();
        let index = Index::create_in_ram(content_schema.schema.clone());
        content_schema.configure_tokenizers(&index);
        assert!(index.tokenizers().get("en_stem").is_some());
    }
}
