//! Composable boolean predicate trees for WHERE and HAVING clauses.
//!
//! A predicate is either a raw SQL fragment with named parameter bindings,
//! a structured equality comparison produced from object-form conditions,
//! or an AND/OR/bracket composition of other predicates. Composition order
//! is preserved and rendered with explicit parentheses; operator precedence
//! is never left implicit.

use std::collections::BTreeMap;

use crate::value::Value;

/// How a clause attaches to the ones before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connective {
    /// The first clause in a chain.
    First,
    And,
    Or,
}

/// One appended WHERE/HAVING clause.
#[derive(Debug, Clone)]
pub struct WhereClause {
    pub connective: Connective,
    pub predicate: Predicate,
}

/// A node in a predicate tree.
#[derive(Debug, Clone)]
pub enum Predicate {
    /// Raw SQL fragment with `:name` placeholders and their local bindings.
    /// Local bindings shadow map-level parameters of the same name.
    Raw {
        sql: String,
        params: BTreeMap<String, Value>,
    },
    /// Structured equality against a column, rendered with dialect quoting.
    /// A `Null` value renders as `IS NULL`.
    Compare {
        alias: Option<String>,
        column: String,
        value: Value,
    },
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    /// Explicitly bracketed sub-tree.
    Bracket(Box<Predicate>),
}

impl Predicate {
    /// A raw fragment without parameters.
    pub fn raw(sql: impl Into<String>) -> Self {
        Predicate::Raw {
            sql: sql.into(),
            params: BTreeMap::new(),
        }
    }

    /// A raw fragment with named parameter bindings.
    pub fn raw_with<N, V>(sql: impl Into<String>, params: impl IntoIterator<Item = (N, V)>) -> Self
    where
        N: Into<String>,
        V: Into<Value>,
    {
        Predicate::Raw {
            sql: sql.into(),
            params: params
                .into_iter()
                .map(|(n, v)| (n.into(), v.into()))
                .collect(),
        }
    }

    /// A structured equality comparison.
    pub fn compare(
        alias: Option<String>,
        column: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        Predicate::Compare {
            alias,
            column: column.into(),
            value: value.into(),
        }
    }

    pub fn and(children: Vec<Predicate>) -> Self {
        Predicate::And(children)
    }

    pub fn or(children: Vec<Predicate>) -> Self {
        Predicate::Or(children)
    }

    pub fn bracket(inner: Predicate) -> Self {
        Predicate::Bracket(Box::new(inner))
    }

    /// Whether this node contributes no SQL at all.
    pub fn is_empty(&self) -> bool {
        match self {
            Predicate::Raw { sql, .. } => sql.trim().is_empty(),
            Predicate::Compare { .. } => false,
            Predicate::And(children) | Predicate::Or(children) => {
                children.iter().all(|c| c.is_empty())
            }
            Predicate::Bracket(inner) => inner.is_empty(),
        }
    }
}

/// Fold an appended clause chain into a single predicate tree.
///
/// The fold is left-associative: `A, OR B, AND C` becomes
/// `And([Or([A, B]), C])`, which renders as `(A OR B) AND C`. Consecutive
/// clauses with the same connective are flattened into one node.
pub fn fold_where_clauses(clauses: &[WhereClause]) -> Option<Predicate> {
    let mut current: Option<Predicate> = None;
    for clause in clauses {
        if clause.predicate.is_empty() {
            continue;
        }
        let predicate = clause.predicate.clone();
        current = Some(match (current, clause.connective) {
            (None, _) => predicate,
            (Some(Predicate::And(mut children)), Connective::And) => {
                children.push(predicate);
                Predicate::And(children)
            }
            (Some(Predicate::Or(mut children)), Connective::Or) => {
                children.push(predicate);
                Predicate::Or(children)
            }
            (Some(prev), Connective::And) => Predicate::And(vec![prev, predicate]),
            (Some(prev), Connective::Or | Connective::First) => {
                Predicate::Or(vec![prev, predicate])
            }
        });
    }
    current
}

/// Incrementally builds a bracketed sub-tree, for nested condition callbacks.
#[derive(Debug, Clone, Default)]
pub struct PredicateBuilder {
    clauses: Vec<WhereClause>,
}

impl PredicateBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, connective: Connective, predicate: Predicate) {
        let connective = if self.clauses.is_empty() {
            Connective::First
        } else {
            connective
        };
        self.clauses.push(WhereClause {
            connective,
            predicate,
        });
    }

    /// Start the sub-tree with a condition.
    pub fn where_pred(mut self, predicate: Predicate) -> Self {
        self.clauses.clear();
        self.push(Connective::First, predicate);
        self
    }

    /// Append a condition with AND.
    pub fn and_where(mut self, predicate: Predicate) -> Self {
        self.push(Connective::And, predicate);
        self
    }

    /// Append a condition with OR.
    pub fn or_where(mut self, predicate: Predicate) -> Self {
        self.push(Connective::Or, predicate);
        self
    }

    /// Produce the bracketed predicate, or `None` if nothing was added.
    pub fn into_predicate(self) -> Option<Predicate> {
        fold_where_clauses(&self.clauses).map(Predicate::bracket)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(sql: &str) -> Predicate {
        Predicate::raw(sql)
    }

    #[test]
    fn fold_single_clause() {
        let clauses = vec![WhereClause {
            connective: Connective::First,
            predicate: raw("a = 1"),
        }];
        let folded = fold_where_clauses(&clauses).unwrap();
        assert!(matches!(folded, Predicate::Raw { .. }));
    }

    #[test]
    fn fold_or_then_and_groups_left() {
        let clauses = vec![
            WhereClause {
                connective: Connective::First,
                predicate: raw("a"),
            },
            WhereClause {
                connective: Connective::Or,
                predicate: raw("b"),
            },
            WhereClause {
                connective: Connective::And,
                predicate: raw("c"),
            },
        ];
        let folded = fold_where_clauses(&clauses).unwrap();
        match folded {
            Predicate::And(children) => {
                assert_eq!(children.len(), 2);
                assert!(matches!(children[0], Predicate::Or(_)));
            }
            other => panic!("expected And, got {other:?}"),
        }
    }

    #[test]
    fn fold_skips_empty_predicates() {
        let clauses = vec![
            WhereClause {
                connective: Connective::First,
                predicate: raw("  "),
            },
            WhereClause {
                connective: Connective::And,
                predicate: raw("a"),
            },
        ];
        let folded = fold_where_clauses(&clauses).unwrap();
        assert!(matches!(folded, Predicate::Raw { .. }));
    }

    #[test]
    fn builder_produces_bracketed_tree() {
        let predicate = PredicateBuilder::new()
            .where_pred(raw("a"))
            .or_where(raw("b"))
            .into_predicate()
            .unwrap();
        assert!(matches!(predicate, Predicate::Bracket(_)));
    }

    #[test]
    fn empty_builder_produces_nothing() {
        assert!(PredicateBuilder::new().into_predicate().is_none());
    }
}
