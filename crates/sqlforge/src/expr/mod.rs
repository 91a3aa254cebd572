//! The Query Expression Map: the aggregate every builder mutates and the
//! emitter reads.
//!
//! The map exclusively owns its alias registry, predicate trees and clause
//! collections, and holds a non-owning handle to the external metadata
//! provider. Cloning deep-copies every owned component (including nested
//! CTE maps) so two clones can be mutated and emitted concurrently without
//! interference; only the provider `Arc` is shared, because it is
//! immutable from this crate's perspective.

pub mod alias;
pub mod cte;
pub mod insert;
pub mod join;
pub mod lock;
pub mod order;
pub mod predicate;
pub mod relation;

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{QueryError, QueryResult};
use crate::metadata::MetadataProvider;
use crate::value::Value;

use alias::{Alias, AliasKind, AliasOptions};
use cte::CteSpec;
use insert::InsertPayload;
use join::JoinSpec;
use lock::{LockMode, OnLocked};
use order::OrderBySpec;
use predicate::{Connective, Predicate, WhereClause};
use relation::RelationPayload;

/// Per-type payload of a SET clause assignment.
#[derive(Debug, Clone)]
pub enum SetValue {
    Value(Value),
    /// Raw SQL expression (may contain `:name` placeholders).
    Raw(String),
}

/// The per-type payload of an UPDATE query.
#[derive(Debug, Clone, Default)]
pub struct UpdatePayload {
    /// Property path (resolved via metadata when available) to value.
    pub assignments: Vec<(String, SetValue)>,
}

/// Query type discriminator with the fields only meaningful for that type.
#[derive(Debug, Clone)]
pub enum QueryVariant {
    Select,
    Insert(InsertPayload),
    Update(UpdatePayload),
    Delete,
    SoftDelete,
    Restore,
    Relation(RelationPayload),
}

impl QueryVariant {
    /// Human-readable discriminator name, for error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            QueryVariant::Select => "select",
            QueryVariant::Insert(_) => "insert",
            QueryVariant::Update(_) => "update",
            QueryVariant::Delete => "delete",
            QueryVariant::SoftDelete => "soft-delete",
            QueryVariant::Restore => "restore",
            QueryVariant::Relation(_) => "relation",
        }
    }

    pub fn is_select(&self) -> bool {
        matches!(self, QueryVariant::Select)
    }
}

/// RETURNING/OUTPUT request.
///
/// `Optional` is opportunistic: silently omitted on dialects without a
/// returning clause. `Required` fails emission on those dialects instead.
#[derive(Debug, Clone, Default)]
pub enum Returning {
    #[default]
    None,
    Optional(Vec<String>),
    Required(Vec<String>),
}

impl Returning {
    pub fn is_none(&self) -> bool {
        matches!(self, Returning::None)
    }
}

/// Time-travel request (Cockroach `AS OF SYSTEM TIME`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeTravel {
    /// `follower_read_timestamp()`
    FollowerReadTimestamp,
    /// An explicit timestamp or interval expression.
    At(String),
}

/// One SELECT list entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectItem {
    /// `alias.property` (resolved via metadata) or a raw expression.
    pub expression: String,
    pub output_alias: Option<String>,
}

/// Contains everything needed to build the final query.
pub struct QueryExpressionMap {
    provider: Arc<dyn MetadataProvider>,
    pub variant: QueryVariant,

    /// All aliases (including the main alias) used in the query.
    pub aliases: Vec<Alias>,
    /// Name of the main alias; resolved against the registry on read.
    pub main_alias: Option<String>,

    pub selects: Vec<SelectItem>,
    pub distinct: bool,
    /// `SELECT DISTINCT ON (...)` expressions (postgres family).
    pub distinct_on: Vec<String>,

    pub joins: Vec<JoinSpec>,
    pub wheres: Vec<WhereClause>,
    pub havings: Vec<WhereClause>,
    pub group_bys: Vec<String>,
    pub order_bys: Vec<OrderBySpec>,
    pub ctes: Vec<CteSpec>,

    pub limit: Option<u64>,
    pub offset: Option<u64>,
    /// Result-set-relative pagination; see the emitter's pagination policy.
    pub skip: Option<u64>,
    pub take: Option<u64>,

    pub lock_mode: Option<LockMode>,
    pub on_locked: Option<OnLocked>,
    /// Aliases listed in `FOR UPDATE OF`.
    pub lock_tables: Vec<String>,

    pub returning: Returning,
    /// Include soft-deleted rows in SELECT results.
    pub with_deleted: bool,
    /// Suppress the entity-declared default ordering fallback.
    pub disable_default_order: bool,
    pub time_travel: Option<TimeTravel>,
    pub use_index: Option<String>,
    pub comment: Option<String>,
    /// Max execution time in milliseconds, passed through as a dialect
    /// hint where one exists; never enforced here.
    pub max_execution_time: Option<u64>,

    // Execution directives, consumed by the external runner.
    pub use_transaction: bool,
    pub call_listeners: bool,
    pub update_entity: bool,
    pub cache: Option<bool>,
    pub cache_id: Option<String>,
    pub cache_duration_ms: Option<u64>,

    /// Whether structured conditions are rendered with an alias prefix.
    /// Disabled for UPDATE/DELETE, where aliases are not available.
    pub alias_prefixing: bool,

    /// Map-level named parameters for raw fragments.
    pub parameters: BTreeMap<String, Value>,
    parameter_counter: u64,

    /// Extra condition ANDed after the explicit WHERE tree, each side
    /// wrapped in its own brackets.
    pub extra_appended_and_where: Option<Predicate>,
}

impl QueryExpressionMap {
    /// Create an empty SELECT map over the given metadata provider.
    pub fn new(provider: Arc<dyn MetadataProvider>) -> Self {
        Self {
            provider,
            variant: QueryVariant::Select,
            aliases: Vec::new(),
            main_alias: None,
            selects: Vec::new(),
            distinct: false,
            distinct_on: Vec::new(),
            joins: Vec::new(),
            wheres: Vec::new(),
            havings: Vec::new(),
            group_bys: Vec::new(),
            order_bys: Vec::new(),
            ctes: Vec::new(),
            limit: None,
            offset: None,
            skip: None,
            take: None,
            lock_mode: None,
            on_locked: None,
            lock_tables: Vec::new(),
            returning: Returning::None,
            with_deleted: false,
            disable_default_order: false,
            time_travel: None,
            use_index: None,
            comment: None,
            max_execution_time: None,
            use_transaction: false,
            call_listeners: true,
            update_entity: true,
            cache: None,
            cache_id: None,
            cache_duration_ms: None,
            alias_prefixing: true,
            parameters: BTreeMap::new(),
            parameter_counter: 0,
            extra_appended_and_where: None,
        }
    }

    /// The metadata provider handle (shared, read-only).
    pub fn provider(&self) -> &Arc<dyn MetadataProvider> {
        &self.provider
    }

    // ==================== Alias registry ====================

    /// Register a new alias, returning its derived name.
    pub fn create_alias(&mut self, kind: AliasKind, options: AliasOptions) -> QueryResult<String> {
        let alias = options.build(kind, &self.provider)?;
        let name = alias.name.clone();
        self.aliases.push(alias);
        Ok(name)
    }

    /// Find an alias by name; a hard failure when absent.
    pub fn alias_by_name(&self, name: &str) -> QueryResult<&Alias> {
        self.aliases
            .iter()
            .find(|a| a.name == name)
            .ok_or_else(|| QueryError::AliasNotFound(name.to_string()))
    }

    /// Replace the main alias reference. The previous main alias stays in
    /// the registry; removing it would silently break live join references,
    /// so that decision is left to the caller.
    pub fn set_main_alias(&mut self, name: impl Into<String>) {
        self.main_alias = Some(name.into());
    }

    /// Resolve the main alias; absence is a hard failure, not a default.
    pub fn main_alias(&self) -> QueryResult<&Alias> {
        let name = self.main_alias.as_deref().ok_or_else(|| {
            QueryError::configuration("no main alias: the query has no FROM-establishing operation")
        })?;
        self.alias_by_name(name)
    }

    // ==================== Clause mutation ====================

    /// Append a WHERE clause.
    pub fn add_where(&mut self, connective: Connective, predicate: Predicate) {
        let connective = if self.wheres.is_empty() {
            Connective::First
        } else {
            connective
        };
        self.wheres.push(WhereClause {
            connective,
            predicate,
        });
    }

    /// Append a HAVING clause.
    pub fn add_having(&mut self, connective: Connective, predicate: Predicate) {
        let connective = if self.havings.is_empty() {
            Connective::First
        } else {
            connective
        };
        self.havings.push(WhereClause {
            connective,
            predicate,
        });
    }

    /// Append a join, registering its alias. The join alias must be unique
    /// across the map; a duplicate is rejected here, before emission.
    /// The registered name always comes from the spec, so the join and its
    /// alias cannot drift apart.
    pub fn add_join(&mut self, spec: JoinSpec, mut options: AliasOptions) -> QueryResult<()> {
        if self.aliases.iter().any(|a| a.name == spec.alias) {
            return Err(QueryError::configuration(format!(
                "alias \"{}\" is already registered on this query",
                spec.alias
            )));
        }
        options.name = Some(spec.alias.clone());
        self.create_alias(AliasKind::Join, options)?;
        self.joins.push(spec);
        Ok(())
    }

    // ==================== Parameters ====================

    /// Bind a named parameter for raw fragments.
    pub fn set_parameter(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.parameters.insert(name.into(), value.into());
    }

    /// Generate a fresh auto parameter name and bind the value to it.
    pub fn bind_auto_parameter(&mut self, value: Value) -> String {
        let name = format!("orm_param_{}", self.parameter_counter);
        self.parameter_counter += 1;
        self.parameters.insert(name.clone(), value);
        name
    }

    // ==================== Computed accessors ====================

    /// The effective ORDER BY list: explicit entries if any exist,
    /// otherwise the entity-declared default order of a metadata-backed
    /// main alias, unless the default-order fallback is disabled.
    /// Computed on read, never stored.
    pub fn effective_order_bys(&self) -> Vec<OrderBySpec> {
        if !self.order_bys.is_empty() || self.disable_default_order {
            return self.order_bys.clone();
        }
        let Some(main) = self
            .main_alias
            .as_deref()
            .and_then(|n| self.aliases.iter().find(|a| a.name == n))
        else {
            return Vec::new();
        };
        let Some(meta) = &main.metadata else {
            return Vec::new();
        };
        meta.default_order
            .iter()
            .map(|(property, direction)| {
                OrderBySpec::new(format!("{}.{}", main.name, property), *direction)
            })
            .collect()
    }

    /// Whether any join could multiply main-entity rows in the result set.
    /// True for one-to-many and many-to-many relation joins, and for plain
    /// table/subquery joins whose cardinality is unknown.
    pub fn has_row_multiplying_joins(&self) -> bool {
        use crate::metadata::RelationKind;
        self.joins.iter().any(|join| match &join.target {
            join::JoinTarget::Relation {
                parent_alias,
                property_path,
            } => {
                let Ok(parent) = self.alias_by_name(parent_alias) else {
                    return true;
                };
                let Some(meta) = &parent.metadata else {
                    return true;
                };
                match meta
                    .relation_by_property_path(property_path)
                    .map(|r| r.kind)
                {
                    Some(RelationKind::OneToOne) | Some(RelationKind::ManyToOne) => false,
                    _ => true,
                }
            }
            _ => true,
        })
    }
}

impl std::fmt::Debug for QueryExpressionMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryExpressionMap")
            .field("variant", &self.variant.kind_name())
            .field("main_alias", &self.main_alias)
            .field("aliases", &self.aliases.len())
            .field("joins", &self.joins.len())
            .field("wheres", &self.wheres.len())
            .finish_non_exhaustive()
    }
}

impl Clone for QueryExpressionMap {
    /// Deep copy of every owned component; the provider handle is shared.
    ///
    /// Spelled out field by field so each collection is visibly copied and
    /// a new field cannot silently become shared mutable state.
    fn clone(&self) -> Self {
        Self {
            provider: Arc::clone(&self.provider),
            variant: self.variant.clone(),
            aliases: self.aliases.clone(),
            main_alias: self.main_alias.clone(),
            selects: self.selects.clone(),
            distinct: self.distinct,
            distinct_on: self.distinct_on.clone(),
            joins: self.joins.clone(),
            wheres: self.wheres.clone(),
            havings: self.havings.clone(),
            group_bys: self.group_bys.clone(),
            order_bys: self.order_bys.clone(),
            // CteBody::Map recurses into the nested map's own Clone.
            ctes: self.ctes.clone(),
            limit: self.limit,
            offset: self.offset,
            skip: self.skip,
            take: self.take,
            lock_mode: self.lock_mode,
            on_locked: self.on_locked,
            lock_tables: self.lock_tables.clone(),
            returning: self.returning.clone(),
            with_deleted: self.with_deleted,
            disable_default_order: self.disable_default_order,
            time_travel: self.time_travel.clone(),
            use_index: self.use_index.clone(),
            comment: self.comment.clone(),
            max_execution_time: self.max_execution_time,
            use_transaction: self.use_transaction,
            call_listeners: self.call_listeners,
            update_entity: self.update_entity,
            cache: self.cache,
            cache_id: self.cache_id.clone(),
            cache_duration_ms: self.cache_duration_ms,
            alias_prefixing: self.alias_prefixing,
            parameters: self.parameters.clone(),
            parameter_counter: self.parameter_counter,
            extra_appended_and_where: self.extra_appended_and_where.clone(),
        }
    }
}
