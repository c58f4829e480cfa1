//! TargetQuery to Tantivy translation
//!
//! Exact terms, ranges and wildcards run against the flattened `props` field.
//! Full-text terms are analyzed with the `text` field's tokenizer and become a
//! term query or a phrase query depending on how many tokens they produce.

use std::ops::Bound;
use tantivy::query::{
    AllQuery, BooleanQuery, EmptyQuery, Occur, PhraseQuery, Query, RangeQuery, RegexQuery,
    TermQuery,
};
use tantivy::schema::IndexRecordOption;
use tantivy::tokenizer::TokenStream;
use tantivy::{Index, Term};

use super::schema::ContentSchema;
use super::term_encoding::{encode_term, field_lower_limit, field_upper_limit, FIELD_SEPARATOR};
use crate::error::{IndexError, IndexResult};
use crate::models::{self, FieldValue, TargetQuery, WildcardPattern, WildcardToken};
use crate::services::field_mapper::FULL_TEXT_FIELD;

pub struct QueryTranslator<'a> {
    index: &'a Index,
    schema: &'a ContentSchema,
}

impl<'a> QueryTranslator<'a> {
    pub fn new(index: &'a Index, schema: &'a ContentSchema) -> Self {
        Self { index, schema }
    }

    pub fn translate(&self, query: &TargetQuery) -> IndexResult<Box<dyn Query>> {
        match query {
            TargetQuery::MatchAll => Ok(Box::new(AllQuery)),
            TargetQuery::MatchNone => Ok(Box::new(EmptyQuery)),
            TargetQuery::Term { field, value } if field == FULL_TEXT_FIELD => self.text_query(value),
            TargetQuery::Term { field, value } => Ok(Box::new(self.exact(field, value))),
            TargetQuery::Range { field, lower, upper } => Ok(Box::new(self.range(field, lower, upper))),
            TargetQuery::Wildcard { field, pattern } => self.wildcard(field, pattern),
            TargetQuery::Boolean(clauses) => {
                let subqueries = clauses
                    .iter()
                    .map(|clause| Ok((occur(clause.occur), self.translate(&clause.query)?)))
                    .collect::<IndexResult<Vec<_>>>()?;
                Ok(Box::new(BooleanQuery::new(subqueries)))
            }
        }
    }

    /// Exact match on one encoded (field, value) pair.
    pub fn exact(&self, field: &str, value: &FieldValue) -> TermQuery {
        let term = Term::from_field_text(self.schema.props, &encode_term(field, value));
        TermQuery::new(term, IndexRecordOption::Basic)
    }

    fn range(&self, field: &str, lower: &Bound<FieldValue>, upper: &Bound<FieldValue>) -> RangeQuery {
        let lower = match lower {
            Bound::Included(v) => Bound::Included(encode_term(field, v)),
            Bound::Excluded(v) => Bound::Excluded(encode_term(field, v)),
            Bound::Unbounded => Bound::Included(field_lower_limit(field)),
        };
        let upper = match upper {
            Bound::Included(v) => Bound::Included(encode_term(field, v)),
            Bound::Excluded(v) => Bound::Excluded(encode_term(field, v)),
            Bound::Unbounded => Bound::Excluded(field_upper_limit(field)),
        };
        RangeQuery::new_str_bounds(
            "props".to_string(),
            lower.as_ref().map(String::as_str),
            upper.as_ref().map(String::as_str),
        )
    }

    fn wildcard(&self, field: &str, pattern: &WildcardPattern) -> IndexResult<Box<dyn Query>> {
        let regex = format!(
            "{}\\x{:02x}{}",
            regex::escape(field),
            FIELD_SEPARATOR as u32,
            wildcard_regex(pattern)
        );
        let query = RegexQuery::from_pattern(&regex, self.schema.props)
            .map_err(|e| IndexError::Query(format!("invalid wildcard pattern {pattern}: {e}")))?;
        Ok(Box::new(query))
    }

    fn text_query(&self, value: &FieldValue) -> IndexResult<Box<dyn Query>> {
        let text = value.to_string();
        let mut analyzer = self.index.tokenizer_for_field(self.schema.text)?;
        let mut stream = analyzer.token_stream(&text);
        let mut terms = Vec::new();
        while stream.advance() {
            terms.push(Term::from_field_text(self.schema.text, &stream.token().text));
        }

        Ok(match terms.len() {
            0 => Box::new(EmptyQuery),
            1 => Box::new(TermQuery::new(
                terms.remove(0),
                IndexRecordOption::WithFreqs,
            )),
            _ => Box::new(PhraseQuery::new(terms)),
        })
    }
}

fn occur(occur: models::Occur) -> Occur {
    match occur {
        models::Occur::Must => Occur::Must,
        models::Occur::Should => Occur::Should,
        models::Occur::MustNot => Occur::MustNot,
    }
}

/// Whole-term regex for a wildcard pattern; literals are escaped.
pub fn wildcard_regex(pattern: &WildcardPattern) -> String {
    pattern
        .tokens
        .iter()
        .map(|token| match token {
            WildcardToken::Literal(text) => regex::escape(text),
            WildcardToken::AnySequence => ".*".to_string(),
            WildcardToken::AnySingle => ".".to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::like_pattern::translate_like;

    #[test]
    fn test_wildcard_regex_escapes_literals() {
        assert_eq!(wildcard_regex(&translate_like(r"a.b\%_%")), r"a\.b%..*");
    }

    #[test]
    fn test_translate_builds_for_every_variant() {
        let schema = ContentSchema::build();
        let index = Index::create_in_ram(schema.schema.clone());
        schema.configure_tokenizers(&index);
        let translator = QueryTranslator::new(&index, &schema);

        let queries = [
            TargetQuery::MatchAll,
            TargetQuery::MatchNone,
            TargetQuery::term("name", "x"),
            TargetQuery::term(FULL_TEXT_FIELD, "quarterly report"),
            TargetQuery::term(FULL_TEXT_FIELD, "..."),
            TargetQuery::not(TargetQuery::has_value("parent_id")),
            TargetQuery::Wildcard {
                field: "name".into(),
                pattern: translate_like("rep%"),
            },
        ];
        for q in &queries {
            assert!(translator.translate(q).is_ok(), "failed on {q}");
        }
    }
}
