//! Parsed content-query predicate tree.
//!
//! Produced by the query parser and consumed read-only by the predicate compiler.
//! Literal leaves keep the raw token text so that numeric and quoting rules are
//! applied in one place at compile time.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Token position in the query text, used to look up column metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourcePosition {
    pub line: u32,
    pub column: u32,
}

impl SourcePosition {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for SourcePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A column occurrence in the WHERE clause, e.g. `d.cmis:name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnNode {
    pub name: String,
    pub qualifier: Option<String>,
    pub position: SourcePosition,
}

impl ColumnNode {
    pub fn new(name: impl Into<String>, position: SourcePosition) -> Self {
        Self {
            name: name.into(),
            qualifier: None,
            position,
        }
    }

    pub fn qualified(mut self, qualifier: impl Into<String>) -> Self {
        self.qualifier = Some(qualifier.into());
        self
    }
}

/// Literal token exactly as the parser saw it.
///
/// `String` text still carries its surrounding quotes and SQL escaping,
/// `Timestamp` text is the whole `TIMESTAMP '...'` token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Literal {
    Boolean(String),
    Number(String),
    String(String),
    Timestamp(String),
}

impl Literal {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Boolean(_) => "boolean",
            Self::Number(_) => "numeric",
            Self::String(_) => "string",
            Self::Timestamp(_) => "timestamp",
        }
    }

    pub fn text(&self) -> &str {
        match self {
            Self::Boolean(t) | Self::Number(t) | Self::String(t) | Self::Timestamp(t) => t,
        }
    }

    /// Convenience for building string literals in code: quotes and escapes `value`.
    pub fn quoted(value: &str) -> Self {
        Self::String(format!("'{}'", value.replace('\'', "''")))
    }
}

/// Value-position expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Expr {
    Literal(Literal),
    List(Vec<Expr>),
    Column(ColumnNode),
    /// A parser node the compiler has no rule for (function call, parameter, ...).
    Other { kind: String, text: String },
}

impl From<Literal> for Expr {
    fn from(literal: Literal) -> Self {
        Self::Literal(literal)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComparisonOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

impl ComparisonOp {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::NotEq => "<>",
            Self::Lt => "<",
            Self::LtEq => "<=",
            Self::Gt => ">",
            Self::GtEq => ">=",
        }
    }
}

/// WHERE-clause predicate node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryNode {
    And(Box<QueryNode>, Box<QueryNode>),
    Or(Box<QueryNode>, Box<QueryNode>),
    Not(Box<QueryNode>),
    Comparison {
        op: ComparisonOp,
        column: ColumnNode,
        value: Expr,
    },
    Like {
        column: ColumnNode,
        pattern: Expr,
        negated: bool,
    },
    In {
        column: ColumnNode,
        values: Expr,
        negated: bool,
    },
    /// `ANY col IN (...)` / `ANY col NOT IN (...)`
    AnyIn {
        column: ColumnNode,
        values: Expr,
        negated: bool,
    },
    /// `literal = ANY col`
    EqAny { column: ColumnNode, value: Expr },
    IsNull { column: ColumnNode, negated: bool },
    InFolder {
        qualifier: Option<String>,
        folder_id: Expr,
    },
    InTree {
        qualifier: Option<String>,
        folder_id: Expr,
    },
    Contains {
        qualifier: Option<String>,
        expression: TextSearchNode,
    },
    Other { kind: String, text: String },
}

impl QueryNode {
    pub fn and(left: QueryNode, right: QueryNode) -> Self {
        Self::And(Box::new(left), Box::new(right))
    }

    pub fn or(left: QueryNode, right: QueryNode) -> Self {
        Self::Or(Box::new(left), Box::new(right))
    }

    pub fn negate(inner: QueryNode) -> Self {
        Self::Not(Box::new(inner))
    }

    pub fn compare(op: ComparisonOp, column: ColumnNode, value: impl Into<Expr>) -> Self {
        Self::Comparison {
            op,
            column,
            value: value.into(),
        }
    }

    /// Node tag used in log and error messages.
    pub fn kind(&self) -> &str {
        match self {
            Self::And(..) => "AND",
            Self::Or(..) => "OR",
            Self::Not(_) => "NOT",
            Self::Comparison { op, .. } => op.symbol(),
            Self::Like { negated: false, .. } => "LIKE",
            Self::Like { negated: true, .. } => "NOT_LIKE",
            Self::In { negated: false, .. } => "IN",
            Self::In { negated: true, .. } => "NOT_IN",
            Self::AnyIn { negated: false, .. } => "IN_ANY",
            Self::AnyIn { negated: true, .. } => "NOT_IN_ANY",
            Self::EqAny { .. } => "EQ_ANY",
            Self::IsNull { negated: false, .. } => "IS_NULL",
            Self::IsNull { negated: true, .. } => "IS_NOT_NULL",
            Self::InFolder { .. } => "IN_FOLDER",
            Self::InTree { .. } => "IN_TREE",
            Self::Contains { .. } => "CONTAINS",
            Self::Other { kind, .. } => kind,
        }
    }
}

/// Full-text sub-grammar of `CONTAINS('...')`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextSearchNode {
    And(Vec<TextSearchNode>),
    Or(Vec<TextSearchNode>),
    Minus(Box<TextSearchNode>),
    Word(String),
    Phrase(String),
}
