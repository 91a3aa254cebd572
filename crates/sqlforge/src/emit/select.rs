//! SELECT emission.
//!
//! Clauses are rendered strictly in their final textual order so that
//! positional-placeholder dialects see parameter values in the order the
//! placeholders appear.

use crate::dialect::LockRendering;
use crate::error::{QueryError, QueryResult};
use crate::expr::join::{JoinSpec, JoinTarget};
use crate::expr::{QueryExpressionMap, TimeTravel};
use crate::metadata::{EntityMetadata, RelationKind};

use super::{compose_and_parts, default_select_items, Emitter};

impl Emitter<'_> {
    pub(crate) fn emit_select(&mut self, map: &QueryExpressionMap) -> QueryResult<String> {
        let with = self.render_ctes(map)?;
        let lock = self.render_lock(map)?;
        let (lock_suffix, table_hint) = match lock {
            Some(LockRendering::Suffix(s)) => (Some(s), None),
            Some(LockRendering::TableHint(h)) => (None, Some(h)),
            None => (None, None),
        };

        let mut sql = String::new();
        if let Some(with) = with {
            sql.push_str(&with);
            sql.push(' ');
        }

        sql.push_str("SELECT");
        if let Some(ms) = map.max_execution_time {
            if let Some(hint) = self.dialect.max_execution_time_hint(ms) {
                sql.push(' ');
                sql.push_str(&hint);
            }
        }
        if !map.distinct_on.is_empty() {
            if !self.dialect.supports_distinct_on() {
                return Err(QueryError::unsupported("DISTINCT ON", self.dialect.name()));
            }
            let mut exprs = Vec::with_capacity(map.distinct_on.len());
            for expr in &map.distinct_on {
                exprs.push(self.render_expression(map, expr)?);
            }
            sql.push_str(&format!(" DISTINCT ON ({})", exprs.join(", ")));
        } else if map.distinct {
            sql.push_str(" DISTINCT");
        }

        sql.push(' ');
        sql.push_str(&self.render_select_list(map)?);

        sql.push_str(" FROM ");
        sql.push_str(&self.render_from(map, table_hint.as_deref())?);

        let joins = self.render_joins(map, table_hint.as_deref())?;
        if !joins.is_empty() {
            sql.push(' ');
            sql.push_str(&joins);
        }

        let outer_where = self.render_where(map, true)?;

        // Result-set-relative pagination over row-multiplying joins has to
        // page distinct primary rows, not joined rows: the page is picked
        // by a distinct-key subquery and the outer query stays unlimited.
        let paginate_by_subquery = (map.skip.is_some() || map.take.is_some())
            && map.has_row_multiplying_joins();
        let where_clause = if paginate_by_subquery {
            let subquery = self.render_pagination_subquery(map, table_hint.as_deref())?;
            compose_and_parts(match outer_where {
                Some(outer) => vec![outer, subquery],
                None => vec![subquery],
            })
        } else {
            outer_where
        };
        if let Some(where_clause) = where_clause {
            sql.push_str(" WHERE ");
            sql.push_str(&where_clause);
        }

        if !map.group_bys.is_empty() {
            let mut exprs = Vec::with_capacity(map.group_bys.len());
            for expr in &map.group_bys {
                exprs.push(self.render_expression(map, expr)?);
            }
            sql.push_str(&format!(" GROUP BY {}", exprs.join(", ")));
        }
        if let Some(having) = self.render_having(map)? {
            sql.push_str(" HAVING ");
            sql.push_str(&having);
        }
        if let Some(order_by) = self.render_order_by(map)? {
            sql.push(' ');
            sql.push_str(&order_by);
        }

        if !paginate_by_subquery {
            // skip/take and limit/offset are independent mechanisms;
            // skip/take wins when both are present. On the subquery path
            // the page is bounded inside the subquery, so the outer
            // statement carries no pagination at all.
            let (limit, offset) = if map.skip.is_some() || map.take.is_some() {
                (map.take, map.skip)
            } else {
                (map.limit, map.offset)
            };
            if let Some(pagination) = self.dialect.pagination_clause(limit, offset) {
                sql.push(' ');
                sql.push_str(&pagination);
            }
        }

        if let Some(lock_suffix) = lock_suffix {
            sql.push(' ');
            sql.push_str(&lock_suffix);
        }
        Ok(sql)
    }

    fn render_select_list(&mut self, map: &QueryExpressionMap) -> QueryResult<String> {
        let items = if map.selects.is_empty() {
            default_select_items(map)
        } else {
            map.selects.clone()
        };
        if items.is_empty() {
            return Ok("*".to_string());
        }
        let mut entries = Vec::with_capacity(items.len());
        for item in &items {
            let expr = self.render_expression(map, &item.expression)?;
            match &item.output_alias {
                Some(alias) => entries.push(format!("{expr} AS {}", self.dialect.quote(alias))),
                None => entries.push(expr),
            }
        }
        Ok(entries.join(", "))
    }

    fn render_from(
        &mut self,
        map: &QueryExpressionMap,
        table_hint: Option<&str>,
    ) -> QueryResult<String> {
        let main = map.main_alias()?;
        let mut from = match &main.subquery {
            Some(subquery) => {
                let resolved =
                    self.binder
                        .resolve_fragment(subquery, &Default::default(), &map.parameters)?;
                format!("({resolved}) {}", self.dialect.quote(&main.name))
            }
            None => format!(
                "{} {}",
                self.dialect.quote_path(main.resolved_table_path()?),
                self.dialect.quote(&main.name)
            ),
        };
        if let Some(time_travel) = &map.time_travel {
            // Silently skipped on engines without system-time reads.
            if self.dialect.supports_time_travel() {
                let at = match time_travel {
                    TimeTravel::FollowerReadTimestamp => "follower_read_timestamp()",
                    TimeTravel::At(expr) => expr.as_str(),
                };
                from.push_str(&format!(" AS OF SYSTEM TIME {at}"));
            }
        }
        if let Some(index) = &map.use_index {
            if let Some(hint) = self.dialect.index_hint(index) {
                from.push(' ');
                from.push_str(&hint);
            }
        }
        if let Some(hint) = table_hint {
            from.push(' ');
            from.push_str(hint);
        }
        Ok(from)
    }

    pub(crate) fn render_joins(
        &mut self,
        map: &QueryExpressionMap,
        table_hint: Option<&str>,
    ) -> QueryResult<String> {
        let mut fragments = Vec::with_capacity(map.joins.len());
        for join in &map.joins {
            fragments.push(self.render_join(map, join, table_hint)?);
        }
        Ok(fragments.join(" "))
    }

    fn render_join(
        &mut self,
        map: &QueryExpressionMap,
        join: &JoinSpec,
        table_hint: Option<&str>,
    ) -> QueryResult<String> {
        let keyword = join.kind.keyword();
        let quoted_alias = self.dialect.quote(&join.alias);
        let hint = table_hint.map(|h| format!(" {h}")).unwrap_or_default();

        let extra = match &join.condition {
            Some(condition) => Some(self.render_predicate(map, condition)?),
            None => None,
        };

        match &join.target {
            JoinTarget::Table(path) => {
                let on = extra.ok_or_else(|| {
                    QueryError::configuration(format!(
                        "join \"{}\" on a plain table requires a condition",
                        join.alias
                    ))
                })?;
                Ok(format!(
                    "{keyword} {} {quoted_alias}{hint} ON {on}",
                    self.dialect.quote_path(path)
                ))
            }
            JoinTarget::Subquery(subquery) => {
                let resolved =
                    self.binder
                        .resolve_fragment(subquery, &Default::default(), &map.parameters)?;
                let on = extra.ok_or_else(|| {
                    QueryError::configuration(format!(
                        "join \"{}\" on a subquery requires a condition",
                        join.alias
                    ))
                })?;
                Ok(format!("{keyword} ({resolved}) {quoted_alias}{hint} ON {on}"))
            }
            JoinTarget::Relation {
                parent_alias,
                property_path,
            } => {
                let parent = map.alias_by_name(parent_alias)?;
                let parent_meta = parent.metadata()?;
                let relation = parent_meta
                    .relation_by_property_path(property_path)
                    .ok_or_else(|| {
                        QueryError::property_not_found(property_path, &parent_meta.name)
                    })?;
                let target_meta = map.provider().resolve(&relation.target).ok_or_else(|| {
                    QueryError::configuration(format!(
                        "relation \"{property_path}\" targets unmapped entity \"{}\"",
                        relation.target
                    ))
                })?;
                let target_table = self.dialect.quote_path(&target_meta.table_path);
                let parent_quoted = self.dialect.quote(parent_alias);

                let mut on = match relation.kind {
                    RelationKind::ManyToOne | RelationKind::OneToOne => {
                        let fk = relation.join_column.as_deref().ok_or_else(|| {
                            QueryError::configuration(format!(
                                "to-one relation \"{property_path}\" has no join column"
                            ))
                        })?;
                        let target_pk = single_primary_column(&target_meta)?;
                        format!(
                            "{quoted_alias}.{} = {parent_quoted}.{}",
                            self.dialect.quote(target_pk),
                            self.dialect.quote(fk)
                        )
                    }
                    RelationKind::OneToMany => {
                        let fk = relation.join_column.as_deref().ok_or_else(|| {
                            QueryError::configuration(format!(
                                "one-to-many relation \"{property_path}\" has no join column"
                            ))
                        })?;
                        let parent_pk = single_primary_column(parent_meta)?;
                        format!(
                            "{quoted_alias}.{} = {parent_quoted}.{}",
                            self.dialect.quote(fk),
                            self.dialect.quote(parent_pk)
                        )
                    }
                    RelationKind::ManyToMany => {
                        let junction = relation.junction.as_ref().ok_or_else(|| {
                            QueryError::configuration(format!(
                                "many-to-many relation \"{property_path}\" has no junction table"
                            ))
                        })?;
                        let junction_alias = self.dialect.quote(&format!("{}_junction", join.alias));
                        let parent_pk = single_primary_column(parent_meta)?;
                        let target_pk = single_primary_column(&target_meta)?;
                        let junction_join = format!(
                            "{keyword} {} {junction_alias}{hint} ON {junction_alias}.{} = {parent_quoted}.{}",
                            self.dialect.quote_path(&junction.table_path),
                            self.dialect.quote(&junction.owner_column),
                            self.dialect.quote(parent_pk)
                        );
                        let mut on = format!(
                            "{quoted_alias}.{} = {junction_alias}.{}",
                            self.dialect.quote(target_pk),
                            self.dialect.quote(&junction.inverse_column)
                        );
                        if let Some(extra) = extra {
                            on = format!("{on} AND ({extra})");
                        }
                        return Ok(format!(
                            "{junction_join} {keyword} {target_table} {quoted_alias}{hint} ON {on}"
                        ));
                    }
                };
                if let Some(extra) = extra {
                    on = format!("{on} AND ({extra})");
                }
                Ok(format!(
                    "{keyword} {target_table} {quoted_alias}{hint} ON {on}"
                ))
            }
        }
    }

    /// The distinct-key subquery that picks the paginated page of main
    /// entity rows: `pk IN (SELECT DISTINCT main.pk ... LIMIT take OFFSET
    /// skip)`.
    fn render_pagination_subquery(
        &mut self,
        map: &QueryExpressionMap,
        table_hint: Option<&str>,
    ) -> QueryResult<String> {
        let main = map.main_alias()?;
        let meta = main.metadata()?;
        let pk = single_primary_column(meta)?;
        let pk_ref = format!(
            "{}.{}",
            self.dialect.quote(&main.name),
            self.dialect.quote(pk)
        );

        // DISTINCT requires the ordering expressions in the select list.
        let mut select_list = vec![pk_ref.clone()];
        for spec in &map.effective_order_bys() {
            let expr = self.render_expression(map, &spec.expression)?;
            if expr != pk_ref {
                select_list.push(expr);
            }
        }
        let mut inner = format!("SELECT DISTINCT {}", select_list.join(", "));
        inner.push_str(" FROM ");
        inner.push_str(&self.render_from(map, table_hint)?);
        let joins = self.render_joins(map, table_hint)?;
        if !joins.is_empty() {
            inner.push(' ');
            inner.push_str(&joins);
        }
        if let Some(where_clause) = self.render_where(map, true)? {
            inner.push_str(" WHERE ");
            inner.push_str(&where_clause);
        }
        if let Some(order_by) = self.render_order_by(map)? {
            inner.push(' ');
            inner.push_str(&order_by);
        }
        if let Some(pagination) = self.dialect.pagination_clause(map.take, map.skip) {
            inner.push(' ');
            inner.push_str(&pagination);
        }
        Ok(format!("{pk_ref} IN ({inner})"))
    }
}

/// The single primary key column of an entity. Composite keys cannot be
/// used where a scalar key comparison is required.
pub(crate) fn single_primary_column(meta: &EntityMetadata) -> QueryResult<&str> {
    let mut primaries = meta.primary_columns();
    let first = primaries.next().ok_or_else(|| {
        QueryError::configuration(format!("entity \"{}\" has no primary column", meta.name))
    })?;
    if primaries.next().is_some() {
        return Err(QueryError::configuration(format!(
            "entity \"{}\" has a composite primary key, which cannot be used here",
            meta.name
        )));
    }
    Ok(&first.column_name)
}
