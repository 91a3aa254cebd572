//! INSERT payload: columns, value rows and upsert policy.

use crate::expr::predicate::Predicate;
use crate::value::Value;

/// One cell of an INSERT row.
#[derive(Debug, Clone)]
pub enum InsertValue {
    /// A bound value.
    Value(Value),
    /// A raw SQL expression (may contain `:name` placeholders).
    Raw(String),
    /// The column's declared default.
    Default,
}

/// Conflict resolution action.
#[derive(Debug, Clone)]
pub enum ConflictAction {
    DoNothing,
    DoUpdate {
        /// Columns overwritten from the incoming row (`EXCLUDED.col` /
        /// `VALUES(col)` depending on dialect).
        overwrite: Vec<String>,
        /// Optional condition restricting the update.
        condition: Option<Predicate>,
    },
}

/// Upsert policy attached to an INSERT.
#[derive(Debug, Clone)]
pub struct OnConflict {
    /// Conflict target columns (property paths, resolved via metadata).
    pub target: Vec<String>,
    /// Partial-index predicate for the conflict target.
    pub index_predicate: Option<String>,
    pub action: ConflictAction,
}

/// The per-type payload of an INSERT query.
#[derive(Debug, Clone, Default)]
pub struct InsertPayload {
    /// Property paths (resolved to columns via metadata when available).
    pub columns: Vec<String>,
    /// Value rows; each row must match `columns` in length.
    pub rows: Vec<Vec<InsertValue>>,
    pub on_conflict: Option<OnConflict>,
}
