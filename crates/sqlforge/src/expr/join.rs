//! Join specifications.

use crate::expr::predicate::Predicate;

/// Join kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Full,
}

impl JoinKind {
    pub fn keyword(self) -> &'static str {
        match self {
            JoinKind::Inner => "INNER JOIN",
            JoinKind::Left => "LEFT JOIN",
            JoinKind::Full => "FULL JOIN",
        }
    }
}

/// What a join targets.
#[derive(Debug, Clone)]
pub enum JoinTarget {
    /// A plain table path.
    Table(String),
    /// A raw subquery (may contain `:name` placeholders).
    Subquery(String),
    /// A mapped relation: `parent_alias`.`property_path`, resolved through
    /// entity metadata at emission time.
    Relation {
        parent_alias: String,
        property_path: String,
    },
}

/// One JOIN entry. The alias must be unique across the owning map,
/// validated when the join is appended.
#[derive(Debug, Clone)]
pub struct JoinSpec {
    pub alias: String,
    pub kind: JoinKind,
    pub target: JoinTarget,
    /// Extra ON condition, ANDed with any metadata-derived join condition.
    pub condition: Option<Predicate>,
}
