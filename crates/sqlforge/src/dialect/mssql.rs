//! SQL Server dialect.

use crate::error::{QueryError, QueryResult};
use crate::expr::lock::{LockMode, OnLocked};

use super::{Dialect, LockRendering, ReturningStyle, UpsertStyle};

#[derive(Debug, Clone, Copy, Default)]
pub struct MssqlDialect;

impl Dialect for MssqlDialect {
    fn name(&self) -> &'static str {
        "mssql"
    }

    fn quote(&self, ident: &str) -> String {
        format!("[{}]", ident.replace(']', "]]"))
    }

    fn placeholder(&self, index: usize) -> String {
        format!("@p{index}")
    }

    fn indexed_placeholders(&self) -> bool {
        true
    }

    fn returning_style(&self) -> ReturningStyle {
        ReturningStyle::Output
    }

    fn upsert_style(&self) -> UpsertStyle {
        UpsertStyle::Unsupported
    }

    fn requires_recursive_keyword(&self) -> bool {
        // WITH is implicitly recursive.
        false
    }

    fn pagination_clause(&self, limit: Option<u64>, offset: Option<u64>) -> Option<String> {
        match (limit, offset) {
            (Some(l), o) => Some(format!(
                "OFFSET {} ROWS FETCH NEXT {l} ROWS ONLY",
                o.unwrap_or(0)
            )),
            (None, Some(o)) => Some(format!("OFFSET {o} ROWS")),
            (None, None) => None,
        }
    }

    fn lock_clause(
        &self,
        mode: LockMode,
        on_locked: Option<OnLocked>,
        _lock_tables: &[String],
        _has_full_join: bool,
    ) -> QueryResult<LockRendering> {
        let mut hints: Vec<&'static str> = match mode {
            LockMode::PessimisticRead => vec!["HOLDLOCK", "ROWLOCK"],
            LockMode::PessimisticWrite => vec!["UPDLOCK", "ROWLOCK"],
            LockMode::DirtyRead => vec!["NOLOCK"],
            LockMode::ForNoKeyUpdate | LockMode::ForKeyShare => {
                return Err(QueryError::unsupported("requested lock mode", self.name()));
            }
        };
        match on_locked {
            Some(OnLocked::Nowait) => hints.push("NOWAIT"),
            Some(OnLocked::SkipLocked) => {
                return Err(QueryError::unsupported("skip locked", self.name()));
            }
            None => {}
        }
        Ok(LockRendering::TableHint(format!(
            "WITH ({})",
            hints.join(", ")
        )))
    }
}
