//! Dialect abstraction: the small set of decisions that differ between
//! database engines.
//!
//! A dialect answers questions (identifier quoting, placeholder shape,
//! capability flags) and renders the few clauses whose syntax genuinely
//! diverges. Everything else is assembled by the emitter from these
//! answers, so adding an engine means implementing this trait, not
//! touching the emitter.

mod cockroach;
mod mssql;
mod mysql;
mod postgres;

pub use cockroach::CockroachDialect;
pub use mssql::MssqlDialect;
pub use mysql::MysqlDialect;
pub use postgres::PostgresDialect;

use crate::error::QueryResult;
use crate::expr::lock::{LockMode, OnLocked};

/// How a dialect returns affected rows from a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturningStyle {
    /// `RETURNING ...` appended after the statement body.
    Returning,
    /// `OUTPUT INSERTED.* / DELETED.*` between clause head and body.
    Output,
    Unsupported,
}

/// How a dialect expresses upserts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertStyle {
    /// `ON CONFLICT (...) DO NOTHING / DO UPDATE SET ...`
    OnConflict,
    /// `ON DUPLICATE KEY UPDATE ...` (no conflict target, no condition).
    OnDuplicateKey,
    Unsupported,
}

/// Where a rendered lock request lands in the statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockRendering {
    /// Appended after ORDER BY / LIMIT (`FOR UPDATE ...`).
    Suffix(String),
    /// Table hint placed right after each locked table reference
    /// (`WITH (NOLOCK)`).
    TableHint(String),
}

pub trait Dialect: Send + Sync {
    fn name(&self) -> &'static str;

    /// Quote a single identifier part, escaping embedded quote characters.
    fn quote(&self, ident: &str) -> String;

    /// Render the placeholder for the 1-based parameter `index`.
    fn placeholder(&self, index: usize) -> String;

    /// Whether placeholders carry an index (so a repeated named parameter
    /// can reuse one slot) or are purely positional.
    fn indexed_placeholders(&self) -> bool;

    fn returning_style(&self) -> ReturningStyle;

    fn upsert_style(&self) -> UpsertStyle;

    /// `AS OF SYSTEM TIME` support.
    fn supports_time_travel(&self) -> bool {
        false
    }

    /// `SELECT DISTINCT ON (...)` support.
    fn supports_distinct_on(&self) -> bool {
        false
    }

    /// `MATERIALIZED` / `NOT MATERIALIZED` CTE hints.
    fn supports_cte_materialization_hint(&self) -> bool {
        false
    }

    /// Whether the WITH keyword takes RECURSIVE when any CTE is recursive.
    fn requires_recursive_keyword(&self) -> bool {
        true
    }

    /// The body of an INSERT with no explicit columns or values.
    fn default_values_clause(&self) -> &'static str {
        "DEFAULT VALUES"
    }

    /// Optimizer hint bounding statement execution time, where the engine
    /// has one. Engines without it ignore the request.
    fn max_execution_time_hint(&self, _ms: u64) -> Option<String> {
        None
    }

    /// Index usage hint placed after the FROM table reference, where the
    /// engine has one.
    fn index_hint(&self, _index: &str) -> Option<String> {
        None
    }

    /// Render the pagination tail. Defaults to `LIMIT n OFFSET m`.
    fn pagination_clause(&self, limit: Option<u64>, offset: Option<u64>) -> Option<String> {
        match (limit, offset) {
            (Some(l), Some(o)) => Some(format!("LIMIT {l} OFFSET {o}")),
            (Some(l), None) => Some(format!("LIMIT {l}")),
            (None, Some(o)) => Some(format!("OFFSET {o}")),
            (None, None) => None,
        }
    }

    /// Render a lock request, or reject combinations the engine cannot
    /// express. `lock_tables` arrives already quoted.
    fn lock_clause(
        &self,
        mode: LockMode,
        on_locked: Option<OnLocked>,
        lock_tables: &[String],
        has_full_join: bool,
    ) -> QueryResult<LockRendering>;

    /// Quote a dotted path (`schema.table`, `alias.column`) part by part.
    fn quote_path(&self, path: &str) -> String {
        path.split('.')
            .map(|part| self.quote(part))
            .collect::<Vec<_>>()
            .join(".")
    }
}

/// Append `OF ... NOWAIT/SKIP LOCKED` decorations shared by the
/// postgres-family suffix locks.
pub(crate) fn suffix_lock(
    keyword: &str,
    on_locked: Option<OnLocked>,
    lock_tables: &[String],
) -> LockRendering {
    let mut sql = keyword.to_string();
    if !lock_tables.is_empty() {
        sql.push_str(" OF ");
        sql.push_str(&lock_tables.join(", "));
    }
    if let Some(on_locked) = on_locked {
        sql.push(' ');
        sql.push_str(on_locked.as_sql());
    }
    LockRendering::Suffix(sql)
}
