//! Entity metadata collaborator interface.
//!
//! Metadata resolution itself is external to this crate: the engine only
//! needs to look an entity up by its target identifier and ask its shape
//! about columns, relations and default ordering. [`MetadataProvider`] is
//! that narrow interface; [`MetadataRegistry`] is a plain in-memory
//! implementation suitable for tests and embedders that build their
//! metadata up front.
//!
//! The provider is passed around as an explicit `Arc` handle rather than
//! ambient global state, so construction and emission stay deterministic
//! given their inputs.

use std::collections::HashMap;
use std::sync::Arc;

use crate::expr::order::OrderDirection;

/// A mapped column of an entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMetadata {
    /// Application-level property path (may be dotted for embedded columns).
    pub property_path: String,
    /// Database column name.
    pub column_name: String,
    /// Whether this column is part of the primary key.
    pub is_primary: bool,
}

/// Relation cardinality and ownership shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    OneToOne,
    ManyToOne,
    OneToMany,
    ManyToMany,
}

/// Junction table description for many-to-many relations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JunctionTable {
    pub table_path: String,
    /// Column referencing the owning entity's primary key.
    pub owner_column: String,
    /// Column referencing the target entity's primary key.
    pub inverse_column: String,
}

/// A mapped relation of an entity.
///
/// `join_column` is the foreign key column: on this entity's table for
/// to-one relations, on the target (child) table for one-to-many.
/// Many-to-many relations carry a `junction` instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationMetadata {
    pub property_path: String,
    /// Target entity identifier, resolvable through the provider.
    pub target: String,
    pub kind: RelationKind,
    pub join_column: Option<String>,
    pub junction: Option<JunctionTable>,
}

/// The shape of a mapped entity, as consumed by the query engine.
#[derive(Debug, Clone)]
pub struct EntityMetadata {
    /// Entity identifier (the name queries target).
    pub name: String,
    /// Table path, possibly schema-qualified (`schema.table`).
    pub table_path: String,
    pub columns: Vec<ColumnMetadata>,
    pub relations: Vec<RelationMetadata>,
    /// Entity-declared default ordering: property path to direction.
    pub default_order: Vec<(String, OrderDirection)>,
    /// Soft-delete marker column, when the entity supports soft deletion.
    pub delete_date_column: Option<String>,
}

impl EntityMetadata {
    /// Create metadata for an entity mapped to the given table.
    pub fn new(name: impl Into<String>, table_path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table_path: table_path.into(),
            columns: Vec::new(),
            relations: Vec::new(),
            default_order: Vec::new(),
            delete_date_column: None,
        }
    }

    /// Add a regular column.
    pub fn with_column(mut self, property: impl Into<String>, column: impl Into<String>) -> Self {
        self.columns.push(ColumnMetadata {
            property_path: property.into(),
            column_name: column.into(),
            is_primary: false,
        });
        self
    }

    /// Add a primary key column.
    pub fn with_primary_column(
        mut self,
        property: impl Into<String>,
        column: impl Into<String>,
    ) -> Self {
        self.columns.push(ColumnMetadata {
            property_path: property.into(),
            column_name: column.into(),
            is_primary: true,
        });
        self
    }

    /// Add a relation.
    pub fn with_relation(mut self, relation: RelationMetadata) -> Self {
        self.relations.push(relation);
        self
    }

    /// Declare the default ordering applied when a query has none.
    pub fn with_default_order(
        mut self,
        property: impl Into<String>,
        direction: OrderDirection,
    ) -> Self {
        self.default_order.push((property.into(), direction));
        self
    }

    /// Declare the soft-delete marker column.
    pub fn with_delete_date_column(mut self, column: impl Into<String>) -> Self {
        self.delete_date_column = Some(column.into());
        self
    }

    /// Find a column by its property path.
    pub fn column_by_property_path(&self, path: &str) -> Option<&ColumnMetadata> {
        self.columns.iter().find(|c| c.property_path == path)
    }

    /// Find a relation by its property path.
    pub fn relation_by_property_path(&self, path: &str) -> Option<&RelationMetadata> {
        self.relations.iter().find(|r| r.property_path == path)
    }

    /// The primary key columns, in declaration order.
    pub fn primary_columns(&self) -> impl Iterator<Item = &ColumnMetadata> {
        self.columns.iter().filter(|c| c.is_primary)
    }
}

/// Resolves a target identifier to entity metadata.
///
/// Returning `None` means the target is not a mapped entity; callers fall
/// back to treating the identifier as a plain table path.
pub trait MetadataProvider: Send + Sync {
    fn resolve(&self, target: &str) -> Option<Arc<EntityMetadata>>;
}

/// Plain in-memory metadata registry keyed by entity name.
#[derive(Default)]
pub struct MetadataRegistry {
    entities: HashMap<String, Arc<EntityMetadata>>,
}

impl MetadataRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entity. Replaces any previous entry with the same name.
    pub fn register(&mut self, metadata: EntityMetadata) {
        self.entities
            .insert(metadata.name.clone(), Arc::new(metadata));
    }
}

impl MetadataProvider for MetadataRegistry {
    fn resolve(&self, target: &str) -> Option<Arc<EntityMetadata>> {
        self.entities.get(target).cloned()
    }
}
