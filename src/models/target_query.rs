//! Backend-agnostic boolean query tree produced by the predicate compiler.
//!
//! Values are kept typed and wildcard patterns are kept tokenized, so a backend
//! applies its own escaping when rendering. `Display` renders Lucene query syntax.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Bound;

use super::field_value::FieldValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Occur {
    Must,
    Should,
    MustNot,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clause {
    pub occur: Occur,
    pub query: TargetQuery,
}

impl Clause {
    pub fn must(query: TargetQuery) -> Self {
        Self {
            occur: Occur::Must,
            query,
        }
    }

    pub fn should(query: TargetQuery) -> Self {
        Self {
            occur: Occur::Should,
            query,
        }
    }

    pub fn must_not(query: TargetQuery) -> Self {
        Self {
            occur: Occur::MustNot,
            query,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WildcardToken {
    Literal(String),
    /// Any run of characters, including none.
    AnySequence,
    /// Exactly one character.
    AnySingle,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WildcardPattern {
    pub tokens: Vec<WildcardToken>,
}

impl WildcardPattern {
    /// Appends a literal, merging with a preceding literal.
    pub fn push_literal(&mut self, text: &str) {
        if let Some(WildcardToken::Literal(last)) = self.tokens.last_mut() {
            last.push_str(text);
        } else {
            self.tokens.push(WildcardToken::Literal(text.to_string()));
        }
    }

    pub fn push(&mut self, token: WildcardToken) {
        match token {
            WildcardToken::Literal(text) => self.push_literal(&text),
            other => self.tokens.push(other),
        }
    }

    pub fn has_wildcards(&self) -> bool {
        self.tokens
            .iter()
            .any(|t| !matches!(t, WildcardToken::Literal(_)))
    }
}

impl fmt::Display for WildcardPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for token in &self.tokens {
            match token {
                WildcardToken::Literal(text) => f.write_str(&escape_query_chars(text))?,
                WildcardToken::AnySequence => f.write_str("*")?,
                WildcardToken::AnySingle => f.write_str("?")?,
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TargetQuery {
    MatchAll,
    MatchNone,
    Term {
        field: String,
        value: FieldValue,
    },
    Range {
        field: String,
        lower: Bound<FieldValue>,
        upper: Bound<FieldValue>,
    },
    Wildcard {
        field: String,
        pattern: WildcardPattern,
    },
    Boolean(Vec<Clause>),
}

impl TargetQuery {
    pub fn term(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self::Term {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Matches every document with at least one value in `field`.
    pub fn has_value(field: impl Into<String>) -> Self {
        Self::Range {
            field: field.into(),
            lower: Bound::Unbounded,
            upper: Bound::Unbounded,
        }
    }

    pub fn and(left: TargetQuery, right: TargetQuery) -> Self {
        Self::Boolean(vec![Clause::must(left), Clause::must(right)])
    }

    pub fn or(left: TargetQuery, right: TargetQuery) -> Self {
        Self::Boolean(vec![Clause::should(left), Clause::should(right)])
    }

    /// Negation. A boolean group needs one positive clause, hence the match-all.
    pub fn not(inner: TargetQuery) -> Self {
        Self::Boolean(vec![
            Clause::must(TargetQuery::MatchAll),
            Clause::must_not(inner),
        ])
    }

    /// Disjunction over `queries`; an empty list matches nothing.
    pub fn any_of(queries: impl IntoIterator<Item = TargetQuery>) -> Self {
        let clauses: Vec<Clause> = queries.into_iter().map(Clause::should).collect();
        if clauses.is_empty() {
            Self::MatchNone
        } else {
            Self::Boolean(clauses)
        }
    }

    pub fn all_of(queries: impl IntoIterator<Item = TargetQuery>) -> Self {
        let clauses: Vec<Clause> = queries.into_iter().map(Clause::must).collect();
        if clauses.is_empty() {
            Self::MatchAll
        } else {
            Self::Boolean(clauses)
        }
    }

    /// Every field name referenced anywhere in the tree.
    pub fn fields(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_fields(&mut out);
        out
    }

    fn collect_fields<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::MatchAll | Self::MatchNone => {}
            Self::Term { field, .. } | Self::Range { field, .. } | Self::Wildcard { field, .. } => {
                out.push(field)
            }
            Self::Boolean(clauses) => clauses.iter().for_each(|c| c.query.collect_fields(out)),
        }
    }
}

/// Lucene query-syntax escaping of special characters and whitespace.
pub fn escape_query_chars(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(
            c,
            '\\' | '+' | '-' | '!' | '(' | ')' | ':' | '^' | '[' | ']' | '"' | '{' | '}' | '~'
                | '*' | '?' | '|' | '&' | ';' | '/'
        ) || c.is_whitespace()
        {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn write_bound(f: &mut fmt::Formatter<'_>, bound: &Bound<FieldValue>) -> fmt::Result {
    match bound {
        Bound::Included(v) | Bound::Excluded(v) => f.write_str(&escape_query_chars(&v.to_string())),
        Bound::Unbounded => f.write_str("*"),
    }
}

impl fmt::Display for TargetQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MatchAll => f.write_str("*:*"),
            Self::MatchNone => f.write_str("-*:*"),
            Self::Term { field, value } => write!(
                f,
                "{}:{}",
                escape_query_chars(field),
                escape_query_chars(&value.to_string())
            ),
            Self::Range { field, lower, upper } => {
                write!(f, "{}:", escape_query_chars(field))?;
                f.write_str(if matches!(lower, Bound::Included(_)) { "[" } else { "{" })?;
                write_bound(f, lower)?;
                f.write_str(" TO ")?;
                write_bound(f, upper)?;
                f.write_str(if matches!(upper, Bound::Included(_)) { "]" } else { "}" })
            }
            Self::Wildcard { field, pattern } => {
                write!(f, "{}:{}", escape_query_chars(field), pattern)
            }
            Self::Boolean(clauses) => {
                f.write_str("(")?;
                for (i, clause) in clauses.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    match clause.occur {
                        Occur::Must => f.write_str("+")?,
                        Occur::MustNot => f.write_str("-")?,
                        Occur::Should => {}
                    }
                    write!(f, "{}", clause.query)?;
                }
                f.write_str(")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_keeps_a_positive_clause() {
        let q = TargetQuery::not(TargetQuery::term("name", "a"));
        match q {
            TargetQuery::Boolean(clauses) => {
                assert_eq!(clauses.len(), 2);
                assert_eq!(clauses[0], Clause::must(TargetQuery::MatchAll));
                assert_eq!(clauses[1].occur, Occur::MustNot);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_lucene_rendering() {
        let q = TargetQuery::and(
            TargetQuery::term("cmis_description", "a:b c"),
            TargetQuery::Range {
                field: "content_length".into(),
                lower: Bound::Excluded(FieldValue::Int(10)),
                upper: Bound::Unbounded,
            },
        );
        assert_eq!(
            q.to_string(),
            r"(+cmis_description:a\:b\ c +content_length:{10 TO *})"
        );
    }

    #[test]
    fn test_wildcard_rendering_escapes_literals() {
        let pattern = WildcardPattern {
            tokens: vec![
                WildcardToken::Literal("a*b".into()),
                WildcardToken::AnySequence,
                WildcardToken::Literal("%".into()),
                WildcardToken::AnySingle,
            ],
        };
        assert_eq!(pattern.to_string(), r"a\*b*%?");
    }

    #[test]
    fn test_any_of_empty_matches_nothing() {
        assert_eq!(TargetQuery::any_of(Vec::new()), TargetQuery::MatchNone);
    }

    #[test]
    fn test_fields_walks_whole_tree() {
        let q = TargetQuery::or(
            TargetQuery::term("name", "x"),
            TargetQuery::not(TargetQuery::has_value("parent_id")),
        );
        assert_eq!(q.fields(), vec!["name", "parent_id"]);
    }
}
