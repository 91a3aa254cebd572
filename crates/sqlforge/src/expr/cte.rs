//! Common table expression specifications.
//!
//! CTE bodies are independent expression maps (or raw SQL); a CTE cannot
//! reference its containing map by construction, which bounds the
//! recursion during emission.

use crate::expr::QueryExpressionMap;

/// The body of a CTE.
#[derive(Clone)]
pub enum CteBody {
    /// An independently owned nested map, emitted recursively.
    Map(Box<QueryExpressionMap>),
    /// Raw SQL; `:name` placeholders resolve against the containing
    /// map's parameters.
    Raw(String),
}

impl std::fmt::Debug for CteBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CteBody::Map(_) => f.write_str("CteBody::Map(..)"),
            CteBody::Raw(sql) => f.debug_tuple("CteBody::Raw").field(sql).finish(),
        }
    }
}

/// One WITH-clause entry.
#[derive(Debug, Clone)]
pub struct CteSpec {
    pub name: String,
    /// Optional explicit column list.
    pub columns: Vec<String>,
    pub body: CteBody,
    pub recursive: bool,
    /// Postgres materialization hint: `Some(true)` forces MATERIALIZED,
    /// `Some(false)` forces NOT MATERIALIZED.
    pub materialized: Option<bool>,
}
