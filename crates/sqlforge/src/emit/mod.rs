//! SQL emission: walks a finalized expression map and produces SQL text
//! plus an ordered parameter list for one dialect.
//!
//! One [`Emitter`] instance spans the whole statement, CTE bodies
//! included, so parameter numbering is consistent across fragments.
//! Emission never mutates the map; emitting the same map twice yields
//! byte-identical output.

mod delete;
mod insert;
mod relation;
mod select;
#[cfg(test)]
mod tests;
mod update;

use tracing::debug;

use crate::binder::ParamBinder;
use crate::dialect::{Dialect, LockRendering, ReturningStyle};
use crate::error::{QueryError, QueryResult};
use crate::expr::alias::Alias;
use crate::expr::cte::CteBody;
use crate::expr::predicate::{fold_where_clauses, Predicate};
use crate::expr::{QueryExpressionMap, QueryVariant, Returning, SelectItem};
use crate::value::Value;

/// The finalized statement: SQL text and its ordered parameter values.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct EmittedQuery {
    pub sql: String,
    pub values: Vec<Value>,
}

/// Emit the map as a statement in the given dialect.
pub fn emit(map: &QueryExpressionMap, dialect: &dyn Dialect) -> QueryResult<EmittedQuery> {
    let mut emitter = Emitter {
        dialect,
        binder: ParamBinder::new(dialect),
    };
    let mut sql = emitter.emit_map(map)?;
    if let Some(comment) = &map.comment {
        // A comment must not be able to terminate itself early.
        let safe = comment.replace("*/", "");
        sql = format!("/* {safe} */ {sql}");
    }
    let values = emitter.binder.into_values();
    debug!(dialect = dialect.name(), sql = %sql, params = values.len(), "emitted query");
    Ok(EmittedQuery { sql, values })
}

pub(crate) struct Emitter<'a> {
    pub(crate) dialect: &'a dyn Dialect,
    pub(crate) binder: ParamBinder<'a>,
}

impl Emitter<'_> {
    pub(crate) fn emit_map(&mut self, map: &QueryExpressionMap) -> QueryResult<String> {
        self.validate(map)?;
        match &map.variant {
            QueryVariant::Select => self.emit_select(map),
            QueryVariant::Insert(payload) => self.emit_insert(map, payload),
            QueryVariant::Update(payload) => self.emit_update(map, payload),
            QueryVariant::Delete => self.emit_delete(map),
            QueryVariant::SoftDelete => self.emit_soft_delete(map, true),
            QueryVariant::Restore => self.emit_soft_delete(map, false),
            QueryVariant::Relation(payload) => self.emit_relation(map, payload),
        }
    }

    /// Reject option combinations that are meaningless for the active
    /// query type before any SQL is produced.
    fn validate(&self, map: &QueryExpressionMap) -> QueryResult<()> {
        let kind = map.variant.kind_name();
        if !map.variant.is_select() {
            if map.lock_mode.is_some() {
                return Err(QueryError::configuration(format!(
                    "locking cannot be used on a {kind} query"
                )));
            }
            if map.skip.is_some() || map.take.is_some() {
                return Err(QueryError::configuration(format!(
                    "skip/take pagination cannot be used on a {kind} query"
                )));
            }
        }
        if map.variant.is_select() && !map.returning.is_none() {
            return Err(QueryError::configuration(
                "a returning clause cannot be used on a select query",
            ));
        }
        Ok(())
    }

    // ==================== Shared clause rendering ====================

    /// Render the WITH clause, or `None` when the map declares no CTEs.
    pub(crate) fn render_ctes(&mut self, map: &QueryExpressionMap) -> QueryResult<Option<String>> {
        if map.ctes.is_empty() {
            return Ok(None);
        }
        let recursive =
            map.ctes.iter().any(|c| c.recursive) && self.dialect.requires_recursive_keyword();
        let mut entries = Vec::with_capacity(map.ctes.len());
        for cte in &map.ctes {
            let mut entry = self.dialect.quote(&cte.name);
            if !cte.columns.is_empty() {
                let cols: Vec<String> =
                    cte.columns.iter().map(|c| self.dialect.quote(c)).collect();
                entry.push_str(&format!("({})", cols.join(", ")));
            }
            entry.push_str(" AS ");
            if let Some(materialized) = cte.materialized {
                if self.dialect.supports_cte_materialization_hint() {
                    entry.push_str(if materialized {
                        "MATERIALIZED "
                    } else {
                        "NOT MATERIALIZED "
                    });
                }
            }
            let body = match &cte.body {
                CteBody::Map(inner) => self.emit_map(inner)?,
                CteBody::Raw(sql) => {
                    self.binder
                        .resolve_fragment(sql, &Default::default(), &map.parameters)?
                }
            };
            entry.push_str(&format!("({body})"));
            entries.push(entry);
        }
        let keyword = if recursive { "WITH RECURSIVE" } else { "WITH" };
        Ok(Some(format!("{keyword} {}", entries.join(", "))))
    }

    /// Resolve `alias.property` to quoted SQL, mapping the property to its
    /// column through the alias metadata when available.
    pub(crate) fn resolve_column(
        &self,
        map: &QueryExpressionMap,
        alias_name: &str,
        property: &str,
    ) -> QueryResult<String> {
        let alias = map.alias_by_name(alias_name)?;
        let column = match &alias.metadata {
            Some(meta) => meta
                .column_by_property_path(property)
                .map(|c| c.column_name.as_str())
                .unwrap_or(property),
            None => property,
        };
        Ok(format!(
            "{}.{}",
            self.dialect.quote(alias_name),
            self.dialect.quote_path(column)
        ))
    }

    /// Render a select/order/group expression. A bare `alias.property`
    /// path gets alias and column resolution; anything else is a raw
    /// fragment whose `:name` placeholders are bound.
    pub(crate) fn render_expression(
        &mut self,
        map: &QueryExpressionMap,
        expr: &str,
    ) -> QueryResult<String> {
        if is_simple_path(expr) {
            if let Some((alias_name, property)) = expr.split_once('.') {
                if map.alias_by_name(alias_name).is_ok() {
                    return self.resolve_column(map, alias_name, property);
                }
            } else if map.alias_prefixing {
                if let Some(main) = map.main_alias.as_deref() {
                    if map.alias_by_name(main).is_ok() {
                        return self.resolve_column(map, main, expr);
                    }
                }
            }
        }
        self.binder
            .resolve_fragment(expr, &Default::default(), &map.parameters)
    }

    /// Render one predicate node.
    pub(crate) fn render_predicate(
        &mut self,
        map: &QueryExpressionMap,
        predicate: &Predicate,
    ) -> QueryResult<String> {
        match predicate {
            Predicate::Raw { sql, params } => {
                self.binder.resolve_fragment(sql, params, &map.parameters)
            }
            Predicate::Compare {
                alias,
                column,
                value,
            } => {
                let lhs = match (map.alias_prefixing, alias) {
                    (true, Some(alias_name)) => self.resolve_column(map, alias_name, column)?,
                    (true, None) => match map.main_alias.as_deref() {
                        Some(main) => self.resolve_column(map, main, column)?,
                        None => self.dialect.quote_path(column),
                    },
                    (false, _) => self.dialect.quote_path(column),
                };
                if value.is_null() {
                    Ok(format!("{lhs} IS NULL"))
                } else {
                    let placeholder = self.binder.bind_value(value.clone());
                    Ok(format!("{lhs} = {placeholder}"))
                }
            }
            Predicate::And(children) => self.render_composite(map, children, " AND "),
            Predicate::Or(children) => self.render_composite(map, children, " OR "),
            Predicate::Bracket(inner) => {
                let rendered = self.render_predicate(map, inner)?;
                Ok(format!("({rendered})"))
            }
        }
    }

    fn render_composite(
        &mut self,
        map: &QueryExpressionMap,
        children: &[Predicate],
        joiner: &str,
    ) -> QueryResult<String> {
        let mut parts = Vec::with_capacity(children.len());
        for child in children {
            if child.is_empty() {
                continue;
            }
            let rendered = self.render_predicate(map, child)?;
            // A nested composite keeps its grouping explicit.
            if matches!(child, Predicate::And(_) | Predicate::Or(_)) {
                parts.push(format!("({rendered})"));
            } else {
                parts.push(rendered);
            }
        }
        Ok(parts.join(joiner))
    }

    /// Render the full WHERE expression for the map: the folded explicit
    /// clauses, the soft-delete filter, and the extra appended AND
    /// condition. Each contributing part keeps its own brackets when more
    /// than one is present.
    pub(crate) fn render_where(
        &mut self,
        map: &QueryExpressionMap,
        soft_delete_filter: bool,
    ) -> QueryResult<Option<String>> {
        let mut parts: Vec<String> = Vec::new();
        if let Some(folded) = fold_where_clauses(&map.wheres) {
            parts.push(self.render_predicate(map, &folded)?);
        }
        if soft_delete_filter && !map.with_deleted {
            let mut filters = Vec::new();
            for alias in source_aliases(map) {
                if let Some(meta) = &alias.metadata {
                    if let Some(column) = &meta.delete_date_column {
                        filters.push(format!(
                            "{}.{} IS NULL",
                            self.dialect.quote(&alias.name),
                            self.dialect.quote(column)
                        ));
                    }
                }
            }
            if !filters.is_empty() {
                parts.push(filters.join(" AND "));
            }
        }
        if let Some(extra) = &map.extra_appended_and_where {
            if !extra.is_empty() {
                parts.push(self.render_predicate(map, extra)?);
            }
        }
        Ok(compose_and_parts(parts))
    }

    /// Render HAVING from the having clause chain.
    pub(crate) fn render_having(
        &mut self,
        map: &QueryExpressionMap,
    ) -> QueryResult<Option<String>> {
        match fold_where_clauses(&map.havings) {
            Some(folded) => Ok(Some(self.render_predicate(map, &folded)?)),
            None => Ok(None),
        }
    }

    /// Render the ORDER BY tail using the effective (possibly defaulted)
    /// ordering.
    pub(crate) fn render_order_by(
        &mut self,
        map: &QueryExpressionMap,
    ) -> QueryResult<Option<String>> {
        let order_bys = map.effective_order_bys();
        if order_bys.is_empty() {
            return Ok(None);
        }
        let mut entries = Vec::with_capacity(order_bys.len());
        for spec in &order_bys {
            let expr = self.render_expression(map, &spec.expression)?;
            let mut entry = format!("{expr} {}", spec.direction.as_sql());
            if let Some(nulls) = spec.nulls {
                entry.push(' ');
                entry.push_str(nulls.as_sql());
            }
            entries.push(entry);
        }
        Ok(Some(format!("ORDER BY {}", entries.join(", "))))
    }

    /// Resolve the returning column list against the main alias metadata
    /// and decide whether the dialect can honor the request.
    ///
    /// `Optional` returning is dropped silently on dialects without one;
    /// `Required` fails instead. `row_prefix` is the OUTPUT pseudo-table
    /// (`INSERTED`/`DELETED`) for dialects with that style.
    pub(crate) fn render_returning(
        &mut self,
        map: &QueryExpressionMap,
        row_prefix: &str,
    ) -> QueryResult<ReturningClause> {
        let style = self.dialect.returning_style();
        let columns = match (&map.returning, style) {
            (Returning::None, _) => return Ok(ReturningClause::None),
            (Returning::Optional(_), ReturningStyle::Unsupported) => {
                return Ok(ReturningClause::None);
            }
            (Returning::Required(_), ReturningStyle::Unsupported) => {
                return Err(QueryError::unsupported(
                    "a returning or output clause",
                    self.dialect.name(),
                ));
            }
            (Returning::Optional(cols) | Returning::Required(cols), _) => cols,
        };
        let meta = map.main_alias().ok().and_then(|a| a.metadata.clone());
        let resolved: Vec<String> = columns
            .iter()
            .map(|property| {
                if property.as_str() == "*" {
                    return property.clone();
                }
                let column = meta
                    .as_deref()
                    .and_then(|m| m.column_by_property_path(property))
                    .map(|c| c.column_name.as_str())
                    .unwrap_or(property);
                self.dialect.quote(column)
            })
            .collect();
        if matches!(style, ReturningStyle::Output) {
            let cols: Vec<String> = resolved
                .iter()
                .map(|c| format!("{row_prefix}.{c}"))
                .collect();
            Ok(ReturningClause::Output(format!("OUTPUT {}", cols.join(", "))))
        } else {
            Ok(ReturningClause::Suffix(format!(
                "RETURNING {}",
                resolved.join(", ")
            )))
        }
    }

    /// Resolve and render a row-lock request when one is set.
    pub(crate) fn render_lock(
        &mut self,
        map: &QueryExpressionMap,
    ) -> QueryResult<Option<LockRendering>> {
        let Some(mode) = map.lock_mode else {
            return Ok(None);
        };
        let tables: Vec<String> = map
            .lock_tables
            .iter()
            .map(|t| self.dialect.quote(t))
            .collect();
        let has_full_join = map
            .joins
            .iter()
            .any(|j| j.kind == crate::expr::join::JoinKind::Full);
        self.dialect
            .lock_clause(mode, map.on_locked, &tables, has_full_join)
            .map(Some)
    }
}

/// The rendered returning request.
pub(crate) enum ReturningClause {
    None,
    /// Appended after the statement body.
    Suffix(String),
    /// Inserted between clause head and body (`OUTPUT ...`).
    Output(String),
}

impl ReturningClause {
    pub(crate) fn suffix(&self) -> Option<&str> {
        match self {
            ReturningClause::Suffix(s) => Some(s),
            _ => None,
        }
    }

    pub(crate) fn output(&self) -> Option<&str> {
        match self {
            ReturningClause::Output(s) => Some(s),
            _ => None,
        }
    }
}

/// The aliases that contribute rows: the FROM sources and joins.
pub(crate) fn source_aliases(map: &QueryExpressionMap) -> impl Iterator<Item = &Alias> {
    use crate::expr::alias::AliasKind;
    map.aliases
        .iter()
        .filter(|a| matches!(a.kind, AliasKind::From | AliasKind::Join))
}

/// Join independently-built condition parts with AND, bracketing each
/// part when more than one is present so grouping stays explicit.
pub(crate) fn compose_and_parts(parts: Vec<String>) -> Option<String> {
    let mut parts: Vec<String> = parts.into_iter().filter(|p| !p.trim().is_empty()).collect();
    match parts.len() {
        0 => None,
        1 => parts.pop(),
        _ => Some(
            parts
                .iter()
                .map(|p| format!("({p})"))
                .collect::<Vec<_>>()
                .join(" AND "),
        ),
    }
}

/// Default select-list entries for a metadata-backed main alias.
pub(crate) fn default_select_items(map: &QueryExpressionMap) -> Vec<SelectItem> {
    let Ok(main) = map.main_alias() else {
        return Vec::new();
    };
    let Some(meta) = &main.metadata else {
        return Vec::new();
    };
    meta.columns
        .iter()
        .map(|column| SelectItem {
            expression: format!("{}.{}", main.name, column.property_path),
            output_alias: Some(format!("{}_{}", main.name, column.property_path)),
        })
        .collect()
}

/// Whether the expression is a plain dotted identifier path, eligible for
/// alias and column resolution.
fn is_simple_path(expr: &str) -> bool {
    !expr.is_empty()
        && expr
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
        && !expr.starts_with('.')
        && !expr.ends_with('.')
}
