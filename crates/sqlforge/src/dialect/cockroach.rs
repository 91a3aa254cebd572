//! CockroachDB dialect.
//!
//! Wire-compatible with postgres for everything this crate renders, plus
//! `AS OF SYSTEM TIME`, minus CTE materialization hints and the key-share
//! lock modes.

use crate::error::{QueryError, QueryResult};
use crate::expr::lock::{LockMode, OnLocked};

use super::{suffix_lock, Dialect, LockRendering, ReturningStyle, UpsertStyle};

#[derive(Debug, Clone, Copy, Default)]
pub struct CockroachDialect;

impl Dialect for CockroachDialect {
    fn name(&self) -> &'static str {
        "cockroachdb"
    }

    fn quote(&self, ident: &str) -> String {
        format!("\"{}\"", ident.replace('"', "\"\""))
    }

    fn placeholder(&self, index: usize) -> String {
        format!("${index}")
    }

    fn indexed_placeholders(&self) -> bool {
        true
    }

    fn returning_style(&self) -> ReturningStyle {
        ReturningStyle::Returning
    }

    fn upsert_style(&self) -> UpsertStyle {
        UpsertStyle::OnConflict
    }

    fn supports_time_travel(&self) -> bool {
        true
    }

    fn supports_distinct_on(&self) -> bool {
        true
    }

    fn lock_clause(
        &self,
        mode: LockMode,
        on_locked: Option<OnLocked>,
        lock_tables: &[String],
        has_full_join: bool,
    ) -> QueryResult<LockRendering> {
        if has_full_join {
            return Err(QueryError::unsupported(
                "row locking combined with FULL JOIN",
                self.name(),
            ));
        }
        let keyword = match mode {
            LockMode::PessimisticRead => "FOR SHARE",
            LockMode::PessimisticWrite => "FOR UPDATE",
            LockMode::ForNoKeyUpdate | LockMode::ForKeyShare | LockMode::DirtyRead => {
                return Err(QueryError::unsupported("requested lock mode", self.name()));
            }
        };
        Ok(suffix_lock(keyword, on_locked, lock_tables))
    }
}
