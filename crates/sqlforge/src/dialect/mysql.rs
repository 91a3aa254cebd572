//! MySQL / MariaDB dialect.

use crate::error::{QueryError, QueryResult};
use crate::expr::lock::{LockMode, OnLocked};

use super::{suffix_lock, Dialect, LockRendering, ReturningStyle, UpsertStyle};

#[derive(Debug, Clone, Copy, Default)]
pub struct MysqlDialect;

impl Dialect for MysqlDialect {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn quote(&self, ident: &str) -> String {
        format!("`{}`", ident.replace('`', "``"))
    }

    fn placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }

    fn indexed_placeholders(&self) -> bool {
        false
    }

    fn returning_style(&self) -> ReturningStyle {
        ReturningStyle::Unsupported
    }

    fn upsert_style(&self) -> UpsertStyle {
        UpsertStyle::OnDuplicateKey
    }

    fn default_values_clause(&self) -> &'static str {
        "VALUES ()"
    }

    fn max_execution_time_hint(&self, ms: u64) -> Option<String> {
        Some(format!("/*+ MAX_EXECUTION_TIME({ms}) */"))
    }

    fn index_hint(&self, index: &str) -> Option<String> {
        Some(format!("USE INDEX ({index})"))
    }

    fn lock_clause(
        &self,
        mode: LockMode,
        on_locked: Option<OnLocked>,
        lock_tables: &[String],
        _has_full_join: bool,
    ) -> QueryResult<LockRendering> {
        let keyword = match mode {
            LockMode::PessimisticRead => "LOCK IN SHARE MODE",
            LockMode::PessimisticWrite => "FOR UPDATE",
            LockMode::ForNoKeyUpdate | LockMode::ForKeyShare | LockMode::DirtyRead => {
                return Err(QueryError::unsupported("requested lock mode", self.name()));
            }
        };
        // LOCK IN SHARE MODE takes neither OF nor NOWAIT.
        if matches!(mode, LockMode::PessimisticRead) {
            return Ok(LockRendering::Suffix(keyword.to_string()));
        }
        Ok(suffix_lock(keyword, on_locked, lock_tables))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backtick_quoting() {
        let d = MysqlDialect;
        assert_eq!(d.quote("user"), "`user`");
        assert_eq!(d.quote("we`ird"), "`we``ird`");
    }

    #[test]
    fn positional_placeholders() {
        let d = MysqlDialect;
        assert_eq!(d.placeholder(1), "?");
        assert_eq!(d.placeholder(7), "?");
        assert!(!d.indexed_placeholders());
    }

    #[test]
    fn share_lock_ignores_decorations() {
        let rendered = MysqlDialect
            .lock_clause(
                LockMode::PessimisticRead,
                Some(OnLocked::SkipLocked),
                &["`user`".to_string()],
                false,
            )
            .unwrap();
        assert_eq!(
            rendered,
            LockRendering::Suffix("LOCK IN SHARE MODE".to_string())
        );
    }
}
