//! 服务层
//!
//! - 查询侧：字段映射、LIKE 转换、谓词编译、查询处理
//! - 索引侧：变更去重、文档构建、内容提取、索引 worker

pub mod change_extractor;
pub mod content_extractor;
pub mod document_builder;
pub mod field_mapper;
pub mod indexing_worker;
pub mod like_pattern;
pub mod predicate_compiler;
pub mod query_processor;

pub use change_extractor::extract_latest;
pub use document_builder::build_document;
pub use indexing_worker::{IndexingWorker, SliceReport};
pub use like_pattern::translate_like;
pub use predicate_compiler::{compile, QueryContext};
pub use query_processor::QueryProcessor;
