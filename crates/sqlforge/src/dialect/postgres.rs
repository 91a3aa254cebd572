//! PostgreSQL dialect.

use crate::error::{QueryError, QueryResult};
use crate::expr::lock::{LockMode, OnLocked};

use super::{suffix_lock, Dialect, LockRendering, ReturningStyle, UpsertStyle};

#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl Dialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "postgres"
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

    fn supports_distinct_on(&self) -> bool {
        true
    }

    fn supports_cte_materialization_hint(&self) -> bool {
        true
    }

    fn lock_clause(
        &self,
        mode: LockMode,
        on_locked: Option<OnLocked>,
        lock_tables: &[String],
        has_full_join: bool,
    ) -> QueryResult<LockRendering> {
        // Postgres rejects row locks on the nullable side of outer joins.
        if has_full_join {
            return Err(QueryError::unsupported(
                "row locking combined with FULL JOIN",
                self.name(),
            ));
        }
        let keyword = match mode {
            LockMode::PessimisticRead => "FOR SHARE",
            LockMode::PessimisticWrite => "FOR UPDATE",
            LockMode::ForNoKeyUpdate => "FOR NO KEY UPDATE",
            LockMode::ForKeyShare => "FOR KEY SHARE",
            LockMode::DirtyRead => {
                return Err(QueryError::unsupported("dirty read", self.name()));
            }
        };
        Ok(suffix_lock(keyword, on_locked, lock_tables))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoting_doubles_embedded_quotes() {
        let d = PostgresDialect;
        assert_eq!(d.quote("user"), "\"user\"");
        assert_eq!(d.quote("we\"ird"), "\"we\"\"ird\"");
        assert_eq!(d.quote_path("public.users"), "\"public\".\"users\"");
    }

    #[test]
    fn lock_suffix_with_tables_and_nowait() {
        let d = PostgresDialect;
        let rendered = d
            .lock_clause(
                LockMode::PessimisticWrite,
                Some(OnLocked::Nowait),
                &["\"user\"".to_string()],
                false,
            )
            .unwrap();
        assert_eq!(
            rendered,
            LockRendering::Suffix("FOR UPDATE OF \"user\" NOWAIT".to_string())
        );
    }

    #[test]
    fn lock_with_full_join_rejected() {
        let d = PostgresDialect;
        let err = d
            .lock_clause(LockMode::PessimisticRead, None, &[], true)
            .unwrap_err();
        assert!(err.is_unsupported());
    }
}
