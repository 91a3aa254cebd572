//! Fluent query construction over a [`QueryExpressionMap`].
//!
//! The builder is a thin mutation layer: every method records intent on
//! the map and nothing touches SQL until [`QueryBuilder::finalize`].
//! Methods that can only fail at emission time stay infallible here;
//! methods that validate eagerly (joins, object conditions, FROM
//! targets) return a `QueryResult`.

#[cfg(test)]
mod tests;

use std::sync::Arc;

use tracing::trace;

use crate::dialect::Dialect;
use crate::emit::{emit, EmittedQuery};
use crate::error::{QueryError, QueryResult};
use crate::expr::alias::{AliasKind, AliasOptions};
use crate::expr::cte::{CteBody, CteSpec};
use crate::expr::insert::{InsertPayload, InsertValue, OnConflict};
use crate::expr::join::{JoinKind, JoinSpec, JoinTarget};
use crate::expr::lock::{LockMode, OnLocked};
use crate::expr::order::{NullOrdering, OrderBySpec, OrderDirection};
use crate::expr::predicate::{Connective, Predicate, PredicateBuilder};
use crate::expr::relation::{RelationOp, RelationPayload};
use crate::expr::{
    QueryExpressionMap, QueryVariant, Returning, SelectItem, SetValue, TimeTravel, UpdatePayload,
};
use crate::metadata::MetadataProvider;
use crate::value::Value;

/// Builds one query through chained mutations, then emits it.
#[derive(Clone)]
pub struct QueryBuilder {
    map: QueryExpressionMap,
    dialect: Arc<dyn Dialect>,
}

impl std::fmt::Debug for QueryBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryBuilder")
            .field("map", &self.map)
            .field("dialect", &self.dialect.name())
            .finish()
    }
}

impl QueryBuilder {
    /// Start an empty SELECT query.
    pub fn new(provider: Arc<dyn MetadataProvider>, dialect: Arc<dyn Dialect>) -> Self {
        Self {
            map: QueryExpressionMap::new(provider),
            dialect,
        }
    }

    // ==================== Query type ====================

    /// Establish the FROM source and main alias.
    pub fn from(mut self, target: impl Into<String>, alias: impl Into<String>) -> QueryResult<Self> {
        let alias = alias.into();
        self.map.create_alias(
            AliasKind::From,
            AliasOptions {
                name: Some(alias.clone()),
                target: Some(target.into()),
                ..Default::default()
            },
        )?;
        self.map.set_main_alias(alias);
        Ok(self)
    }

    /// FROM over a raw subquery instead of a table.
    pub fn from_subquery(
        mut self,
        subquery: impl Into<String>,
        alias: impl Into<String>,
    ) -> QueryResult<Self> {
        let alias = alias.into();
        self.map.create_alias(
            AliasKind::From,
            AliasOptions {
                name: Some(alias.clone()),
                subquery: Some(subquery.into()),
                ..Default::default()
            },
        )?;
        self.map.set_main_alias(alias);
        Ok(self)
    }

    /// Switch to an INSERT against the target entity or table.
    pub fn insert_into(mut self, target: impl Into<String>) -> QueryResult<Self> {
        self.map.variant = QueryVariant::Insert(InsertPayload::default());
        self.main_target(target.into())
    }

    /// Switch to an UPDATE against the target entity or table.
    pub fn update(mut self, target: impl Into<String>) -> QueryResult<Self> {
        self.map.variant = QueryVariant::Update(UpdatePayload::default());
        self.map.alias_prefixing = false;
        self.main_target(target.into())
    }

    /// Switch to a DELETE against the target entity or table.
    pub fn delete_from(mut self, target: impl Into<String>) -> QueryResult<Self> {
        self.map.variant = QueryVariant::Delete;
        self.map.alias_prefixing = false;
        self.main_target(target.into())
    }

    /// Switch to a soft deletion (marks the delete-date column).
    pub fn soft_delete(mut self, target: impl Into<String>) -> QueryResult<Self> {
        self.map.variant = QueryVariant::SoftDelete;
        self.map.alias_prefixing = false;
        self.main_target(target.into())
    }

    /// Switch to a restore (clears the delete-date column).
    pub fn restore(mut self, target: impl Into<String>) -> QueryResult<Self> {
        self.map.variant = QueryVariant::Restore;
        self.map.alias_prefixing = false;
        self.main_target(target.into())
    }

    /// Switch to a relation mutation on `target`'s relation `property`.
    pub fn relation(
        mut self,
        target: impl Into<String>,
        property: impl Into<String>,
    ) -> QueryResult<Self> {
        self.map.variant = QueryVariant::Relation(RelationPayload {
            property_path: property.into(),
            of: Vec::new(),
            op: None,
        });
        self.map.alias_prefixing = false;
        self.main_target(target.into())
    }

    fn main_target(mut self, target: String) -> QueryResult<Self> {
        let alias_name = target.clone();
        self.map.create_alias(
            AliasKind::From,
            AliasOptions {
                name: Some(alias_name.clone()),
                target: Some(target),
                ..Default::default()
            },
        )?;
        self.map.set_main_alias(alias_name);
        Ok(self)
    }

    // ==================== Select list ====================

    /// Replace the select list with a single expression.
    pub fn select(mut self, expression: impl Into<String>) -> Self {
        self.map.selects = vec![SelectItem {
            expression: expression.into(),
            output_alias: None,
        }];
        self
    }

    /// Append a select expression.
    pub fn add_select(mut self, expression: impl Into<String>) -> Self {
        self.map.selects.push(SelectItem {
            expression: expression.into(),
            output_alias: None,
        });
        self
    }

    /// Append a select expression with an output alias.
    pub fn add_select_as(
        mut self,
        expression: impl Into<String>,
        output_alias: impl Into<String>,
    ) -> Self {
        self.map.selects.push(SelectItem {
            expression: expression.into(),
            output_alias: Some(output_alias.into()),
        });
        self
    }

    pub fn distinct(mut self) -> Self {
        self.map.distinct = true;
        self
    }

    pub fn distinct_on<S: Into<String>>(mut self, expressions: impl IntoIterator<Item = S>) -> Self {
        self.map.distinct_on = expressions.into_iter().map(Into::into).collect();
        self
    }

    // ==================== Conditions ====================

    /// Replace the WHERE chain with a raw condition.
    pub fn where_sql(mut self, sql: impl Into<String>) -> Self {
        self.map.wheres.clear();
        self.map.add_where(Connective::First, Predicate::raw(sql));
        self
    }

    /// Replace the WHERE chain with a raw condition and local bindings.
    pub fn where_params<N, V>(
        mut self,
        sql: impl Into<String>,
        params: impl IntoIterator<Item = (N, V)>,
    ) -> Self
    where
        N: Into<String>,
        V: Into<Value>,
    {
        self.map.wheres.clear();
        self.map
            .add_where(Connective::First, Predicate::raw_with(sql, params));
        self
    }

    /// AND a raw condition onto the WHERE chain.
    pub fn and_where(mut self, sql: impl Into<String>) -> Self {
        self.map.add_where(Connective::And, Predicate::raw(sql));
        self
    }

    /// AND a raw condition with local bindings.
    pub fn and_where_params<N, V>(
        mut self,
        sql: impl Into<String>,
        params: impl IntoIterator<Item = (N, V)>,
    ) -> Self
    where
        N: Into<String>,
        V: Into<Value>,
    {
        self.map
            .add_where(Connective::And, Predicate::raw_with(sql, params));
        self
    }

    /// OR a raw condition onto the WHERE chain.
    pub fn or_where(mut self, sql: impl Into<String>) -> Self {
        self.map.add_where(Connective::Or, Predicate::raw(sql));
        self
    }

    /// OR a raw condition with local bindings.
    pub fn or_where_params<N, V>(
        mut self,
        sql: impl Into<String>,
        params: impl IntoIterator<Item = (N, V)>,
    ) -> Self
    where
        N: Into<String>,
        V: Into<Value>,
    {
        self.map
            .add_where(Connective::Or, Predicate::raw_with(sql, params));
        self
    }

    /// AND a bracketed sub-tree built through a nested callback.
    pub fn and_where_group(
        mut self,
        build: impl FnOnce(PredicateBuilder) -> PredicateBuilder,
    ) -> Self {
        if let Some(predicate) = build(PredicateBuilder::new()).into_predicate() {
            self.map.add_where(Connective::And, predicate);
        }
        self
    }

    /// OR a bracketed sub-tree built through a nested callback.
    pub fn or_where_group(
        mut self,
        build: impl FnOnce(PredicateBuilder) -> PredicateBuilder,
    ) -> Self {
        if let Some(predicate) = build(PredicateBuilder::new()).into_predicate() {
            self.map.add_where(Connective::Or, predicate);
        }
        self
    }

    /// Replace the WHERE chain with an object-form condition: property
    /// names checked against the main entity's metadata, values bound as
    /// parameters. An array at the top level becomes an OR of its
    /// entries.
    pub fn where_object(mut self, object: serde_json::Value) -> QueryResult<Self> {
        let predicate = self.object_predicate(object)?;
        self.map.wheres.clear();
        self.map.add_where(Connective::First, predicate);
        Ok(self)
    }

    /// AND an object-form condition onto the WHERE chain.
    pub fn and_where_object(mut self, object: serde_json::Value) -> QueryResult<Self> {
        let predicate = self.object_predicate(object)?;
        self.map.add_where(Connective::And, predicate);
        Ok(self)
    }

    /// OR an object-form condition onto the WHERE chain.
    pub fn or_where_object(mut self, object: serde_json::Value) -> QueryResult<Self> {
        let predicate = self.object_predicate(object)?;
        self.map.add_where(Connective::Or, predicate);
        Ok(self)
    }

    fn object_predicate(&self, object: serde_json::Value) -> QueryResult<Predicate> {
        let main = self.map.main_alias()?;
        let alias_name = main.name.clone();
        let metadata = main.metadata.clone();

        let entries = match object {
            serde_json::Value::Array(items) => items,
            other => vec![other],
        };
        let mut branches = Vec::with_capacity(entries.len());
        for entry in entries {
            let mut pairs = Vec::new();
            flatten_object("", &entry, &mut pairs)?;
            if pairs.is_empty() {
                continue;
            }
            let mut compares = Vec::with_capacity(pairs.len());
            for (path, value) in pairs {
                if let Some(meta) = &metadata {
                    if meta.column_by_property_path(&path).is_none() {
                        return Err(QueryError::property_not_found(path, &meta.name));
                    }
                }
                compares.push(Predicate::compare(Some(alias_name.clone()), path, value));
            }
            if compares.len() == 1 {
                branches.extend(compares);
            } else {
                branches.push(Predicate::And(compares));
            }
        }
        let mut branches = branches.into_iter();
        match (branches.next(), branches.next()) {
            (None, _) => Err(QueryError::configuration(
                "object condition resolves to no comparisons",
            )),
            (Some(single), None) => Ok(single),
            (Some(first), Some(second)) => {
                let mut all = vec![first, second];
                all.extend(branches);
                Ok(Predicate::bracket(Predicate::Or(all)))
            }
        }
    }

    /// Set the condition ANDed after everything else, each side kept in
    /// its own brackets.
    pub fn append_extra_condition(mut self, predicate: Predicate) -> Self {
        self.map.extra_appended_and_where = Some(predicate);
        self
    }

    /// AND a raw HAVING condition.
    pub fn and_having(mut self, sql: impl Into<String>) -> Self {
        self.map.add_having(Connective::And, Predicate::raw(sql));
        self
    }

    /// OR a raw HAVING condition.
    pub fn or_having(mut self, sql: impl Into<String>) -> Self {
        self.map.add_having(Connective::Or, Predicate::raw(sql));
        self
    }

    // ==================== Joins ====================

    pub fn inner_join(
        self,
        table: impl Into<String>,
        alias: impl Into<String>,
        on: impl Into<String>,
    ) -> QueryResult<Self> {
        self.join_table(JoinKind::Inner, table.into(), alias.into(), on.into())
    }

    pub fn left_join(
        self,
        table: impl Into<String>,
        alias: impl Into<String>,
        on: impl Into<String>,
    ) -> QueryResult<Self> {
        self.join_table(JoinKind::Left, table.into(), alias.into(), on.into())
    }

    pub fn full_join(
        self,
        table: impl Into<String>,
        alias: impl Into<String>,
        on: impl Into<String>,
    ) -> QueryResult<Self> {
        self.join_table(JoinKind::Full, table.into(), alias.into(), on.into())
    }

    fn join_table(
        mut self,
        kind: JoinKind,
        table: String,
        alias: String,
        on: String,
    ) -> QueryResult<Self> {
        let spec = JoinSpec {
            alias: alias.clone(),
            kind,
            target: JoinTarget::Table(table.clone()),
            condition: Some(Predicate::raw(on)),
        };
        self.map.add_join(
            spec,
            AliasOptions {
                name: Some(alias),
                table_path: Some(table),
                ..Default::default()
            },
        )?;
        Ok(self)
    }

    /// Join a subquery with a raw ON condition.
    pub fn inner_join_subquery(
        mut self,
        subquery: impl Into<String>,
        alias: impl Into<String>,
        on: impl Into<String>,
    ) -> QueryResult<Self> {
        let alias = alias.into();
        let subquery = subquery.into();
        let spec = JoinSpec {
            alias: alias.clone(),
            kind: JoinKind::Inner,
            target: JoinTarget::Subquery(subquery.clone()),
            condition: Some(Predicate::raw(on.into())),
        };
        self.map.add_join(
            spec,
            AliasOptions {
                name: Some(alias),
                subquery: Some(subquery),
                ..Default::default()
            },
        )?;
        Ok(self)
    }

    /// INNER JOIN a mapped relation (`"parent.property"`).
    pub fn inner_join_relation(
        self,
        relation_path: impl Into<String>,
        alias: impl Into<String>,
    ) -> QueryResult<Self> {
        self.join_relation(JoinKind::Inner, relation_path.into(), alias.into(), None)
    }

    /// LEFT JOIN a mapped relation (`"parent.property"`).
    pub fn left_join_relation(
        self,
        relation_path: impl Into<String>,
        alias: impl Into<String>,
    ) -> QueryResult<Self> {
        self.join_relation(JoinKind::Left, relation_path.into(), alias.into(), None)
    }

    /// LEFT JOIN a mapped relation with an extra ON condition.
    pub fn left_join_relation_on(
        self,
        relation_path: impl Into<String>,
        alias: impl Into<String>,
        on: impl Into<String>,
    ) -> QueryResult<Self> {
        self.join_relation(
            JoinKind::Left,
            relation_path.into(),
            alias.into(),
            Some(Predicate::raw(on.into())),
        )
    }

    fn join_relation(
        mut self,
        kind: JoinKind,
        relation_path: String,
        alias: String,
        condition: Option<Predicate>,
    ) -> QueryResult<Self> {
        let (parent_alias, property_path) = relation_path.split_once('.').ok_or_else(|| {
            QueryError::configuration(format!(
                "relation join path \"{relation_path}\" must be \"alias.property\""
            ))
        })?;
        // Bind the join alias to the relation target's metadata when the
        // parent side can resolve it, so soft-delete filtering and column
        // resolution work through the joined alias.
        let target = {
            let parent = self.map.alias_by_name(parent_alias)?;
            parent
                .metadata
                .as_ref()
                .and_then(|m| m.relation_by_property_path(property_path))
                .map(|r| r.target.clone())
        };
        let spec = JoinSpec {
            alias: alias.clone(),
            kind,
            target: JoinTarget::Relation {
                parent_alias: parent_alias.to_string(),
                property_path: property_path.to_string(),
            },
            condition,
        };
        self.map.add_join(
            spec,
            AliasOptions {
                name: Some(alias),
                target,
                ..Default::default()
            },
        )?;
        Ok(self)
    }

    // ==================== Grouping and ordering ====================

    pub fn group_by(mut self, expression: impl Into<String>) -> Self {
        self.map.group_bys = vec![expression.into()];
        self
    }

    pub fn add_group_by(mut self, expression: impl Into<String>) -> Self {
        self.map.group_bys.push(expression.into());
        self
    }

    /// Replace the ORDER BY list.
    pub fn order_by(mut self, expression: impl Into<String>, direction: OrderDirection) -> Self {
        self.map.order_bys = vec![OrderBySpec::new(expression, direction)];
        self
    }

    pub fn add_order_by(mut self, expression: impl Into<String>, direction: OrderDirection) -> Self {
        self.map.order_bys.push(OrderBySpec::new(expression, direction));
        self
    }

    pub fn add_order_by_nulls(
        mut self,
        expression: impl Into<String>,
        direction: OrderDirection,
        nulls: NullOrdering,
    ) -> Self {
        self.map
            .order_bys
            .push(OrderBySpec::new(expression, direction).with_nulls(nulls));
        self
    }

    /// Suppress the entity-declared default ordering fallback.
    pub fn disable_default_order(mut self) -> Self {
        self.map.disable_default_order = true;
        self
    }

    // ==================== Pagination ====================

    /// Raw row limit applied to the joined result set.
    pub fn limit(mut self, limit: impl Into<Option<u64>>) -> Self {
        self.map.limit = limit.into();
        self
    }

    /// Raw row offset applied to the joined result set.
    pub fn offset(mut self, offset: impl Into<Option<u64>>) -> Self {
        self.map.offset = offset.into();
        self
    }

    /// Skip whole main-entity rows. Wins over `offset` when both are set.
    pub fn skip(mut self, skip: impl Into<Option<u64>>) -> Self {
        self.map.skip = skip.into();
        self
    }

    /// Take whole main-entity rows. Wins over `limit` when both are set.
    pub fn take(mut self, take: impl Into<Option<u64>>) -> Self {
        self.map.take = take.into();
        self
    }

    // ==================== Locking ====================

    pub fn lock(mut self, mode: LockMode) -> Self {
        self.map.lock_mode = Some(mode);
        self
    }

    pub fn on_locked(mut self, behavior: OnLocked) -> Self {
        self.map.on_locked = Some(behavior);
        self
    }

    pub fn lock_tables<S: Into<String>>(mut self, tables: impl IntoIterator<Item = S>) -> Self {
        self.map.lock_tables = tables.into_iter().map(Into::into).collect();
        self
    }

    // ==================== Write-query options ====================

    /// Request returned columns where the dialect has them; silently
    /// dropped elsewhere.
    pub fn returning<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.map.returning = Returning::Optional(columns.into_iter().map(Into::into).collect());
        self
    }

    /// Request returned columns; emission fails on dialects without them.
    pub fn returning_required<S: Into<String>>(
        mut self,
        columns: impl IntoIterator<Item = S>,
    ) -> Self {
        self.map.returning = Returning::Required(columns.into_iter().map(Into::into).collect());
        self
    }

    /// Set the INSERT column list.
    pub fn columns<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> QueryResult<Self> {
        self.insert_payload_mut()?.columns = columns.into_iter().map(Into::into).collect();
        Ok(self)
    }

    /// Append one INSERT row of bound values.
    pub fn values<V: Into<Value>>(mut self, row: impl IntoIterator<Item = V>) -> QueryResult<Self> {
        let row: Vec<InsertValue> = row
            .into_iter()
            .map(|v| InsertValue::Value(v.into()))
            .collect();
        self.insert_payload_mut()?.rows.push(row);
        Ok(self)
    }

    /// Append one INSERT row mixing bound values, raw SQL and defaults.
    pub fn values_raw(mut self, row: Vec<InsertValue>) -> QueryResult<Self> {
        self.insert_payload_mut()?.rows.push(row);
        Ok(self)
    }

    /// Attach an upsert policy to the INSERT.
    pub fn on_conflict(mut self, on_conflict: OnConflict) -> QueryResult<Self> {
        self.insert_payload_mut()?.on_conflict = Some(on_conflict);
        Ok(self)
    }

    fn insert_payload_mut(&mut self) -> QueryResult<&mut InsertPayload> {
        match &mut self.map.variant {
            QueryVariant::Insert(payload) => Ok(payload),
            other => Err(QueryError::configuration(format!(
                "insert options cannot be used on a {} query",
                other.kind_name()
            ))),
        }
    }

    /// Add a SET assignment with a bound value.
    pub fn set(mut self, property: impl Into<String>, value: impl Into<Value>) -> QueryResult<Self> {
        self.update_payload_mut()?
            .assignments
            .push((property.into(), SetValue::Value(value.into())));
        Ok(self)
    }

    /// Add a SET assignment with a raw SQL right-hand side.
    pub fn set_raw(mut self, property: impl Into<String>, sql: impl Into<String>) -> QueryResult<Self> {
        self.update_payload_mut()?
            .assignments
            .push((property.into(), SetValue::Raw(sql.into())));
        Ok(self)
    }

    fn update_payload_mut(&mut self) -> QueryResult<&mut UpdatePayload> {
        match &mut self.map.variant {
            QueryVariant::Update(payload) => Ok(payload),
            other => Err(QueryError::configuration(format!(
                "set assignments cannot be used on a {} query",
                other.kind_name()
            ))),
        }
    }

    // ==================== Relation mutations ====================

    /// Name the owning entity id(s) whose relation is mutated.
    pub fn of<V: Into<Value>>(mut self, ids: impl IntoIterator<Item = V>) -> QueryResult<Self> {
        self.relation_payload_mut()?.of = ids.into_iter().map(Into::into).collect();
        Ok(self)
    }

    /// Point a to-one relation at the given id, or clear it with `None`.
    pub fn set_relation(mut self, id: Option<Value>) -> QueryResult<Self> {
        self.relation_payload_mut()?.op = Some(RelationOp::Set(id));
        Ok(self)
    }

    /// Attach target ids to a to-many relation.
    pub fn add_relation<V: Into<Value>>(
        mut self,
        ids: impl IntoIterator<Item = V>,
    ) -> QueryResult<Self> {
        self.relation_payload_mut()?.op =
            Some(RelationOp::Add(ids.into_iter().map(Into::into).collect()));
        Ok(self)
    }

    /// Detach target ids from a to-many relation.
    pub fn remove_relation<V: Into<Value>>(
        mut self,
        ids: impl IntoIterator<Item = V>,
    ) -> QueryResult<Self> {
        self.relation_payload_mut()?.op =
            Some(RelationOp::Remove(ids.into_iter().map(Into::into).collect()));
        Ok(self)
    }

    fn relation_payload_mut(&mut self) -> QueryResult<&mut RelationPayload> {
        match &mut self.map.variant {
            QueryVariant::Relation(payload) => Ok(payload),
            other => Err(QueryError::configuration(format!(
                "relation options cannot be used on a {} query",
                other.kind_name()
            ))),
        }
    }

    // ==================== CTEs ====================

    /// Attach a CTE whose body is another builder's map.
    pub fn with_query(mut self, name: impl Into<String>, body: QueryBuilder) -> Self {
        self.map.ctes.push(CteSpec {
            name: name.into(),
            columns: Vec::new(),
            body: CteBody::Map(Box::new(body.into_map())),
            recursive: false,
            materialized: None,
        });
        self
    }

    /// Attach a raw-SQL CTE.
    pub fn with_raw(mut self, name: impl Into<String>, sql: impl Into<String>) -> Self {
        self.map.ctes.push(CteSpec {
            name: name.into(),
            columns: Vec::new(),
            body: CteBody::Raw(sql.into()),
            recursive: false,
            materialized: None,
        });
        self
    }

    /// Attach a fully specified CTE.
    pub fn with_cte(mut self, cte: CteSpec) -> Self {
        self.map.ctes.push(cte);
        self
    }

    // ==================== Scalar options ====================

    /// Include soft-deleted rows in the result set.
    pub fn with_deleted(mut self) -> Self {
        self.map.with_deleted = true;
        self
    }

    /// Read against a historical snapshot where the engine supports it;
    /// silently ignored elsewhere.
    pub fn time_travel(mut self, at: TimeTravel) -> Self {
        self.map.time_travel = Some(at);
        self
    }

    pub fn use_index(mut self, index: impl Into<String>) -> Self {
        self.map.use_index = Some(index.into());
        self
    }

    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.map.comment = Some(comment.into());
        self
    }

    pub fn max_execution_time(mut self, ms: u64) -> Self {
        self.map.max_execution_time = Some(ms);
        self
    }

    /// Bind a map-level named parameter for raw fragments.
    pub fn set_parameter(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.map.set_parameter(name, value);
        self
    }

    // Execution directives, read by the external runner.

    pub fn use_transaction(mut self, enabled: bool) -> Self {
        self.map.use_transaction = enabled;
        self
    }

    pub fn call_listeners(mut self, enabled: bool) -> Self {
        self.map.call_listeners = enabled;
        self
    }

    pub fn update_entity(mut self, enabled: bool) -> Self {
        self.map.update_entity = enabled;
        self
    }

    pub fn cache(mut self, enabled: bool) -> Self {
        self.map.cache = Some(enabled);
        self
    }

    pub fn cache_id(mut self, id: impl Into<String>) -> Self {
        self.map.cache_id = Some(id.into());
        self
    }

    pub fn cache_duration_ms(mut self, ms: u64) -> Self {
        self.map.cache_duration_ms = Some(ms);
        self
    }

    // ==================== Finalization ====================

    /// Emit the statement for this builder's dialect. Does not mutate the
    /// map; finalizing twice yields identical output.
    pub fn finalize(&self) -> QueryResult<EmittedQuery> {
        trace!(kind = self.map.variant.kind_name(), "finalizing query");
        emit(&self.map, self.dialect.as_ref())
    }

    /// Read-only view of the underlying map.
    pub fn expression_map(&self) -> &QueryExpressionMap {
        &self.map
    }

    /// Escape hatch for mutations without a builder method.
    pub fn expression_map_mut(&mut self) -> &mut QueryExpressionMap {
        &mut self.map
    }

    /// Take the map out of the builder.
    pub fn into_map(self) -> QueryExpressionMap {
        self.map
    }
}

/// Flatten a JSON object into dotted property paths with scalar values.
fn flatten_object(
    prefix: &str,
    value: &serde_json::Value,
    out: &mut Vec<(String, Value)>,
) -> QueryResult<()> {
    match value {
        serde_json::Value::Object(map) => {
            for (key, child) in map {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                flatten_object(&path, child, out)?;
            }
            Ok(())
        }
        _ if prefix.is_empty() => Err(QueryError::configuration(
            "object condition must be a JSON object",
        )),
        other => {
            out.push((prefix.to_string(), Value::from_json(other.clone())));
            Ok(())
        }
    }
}
