//! Relation-management payload.
//!
//! A relation query mutates the link between entities rather than entity
//! rows themselves: setting or clearing a foreign key, or inserting and
//! deleting junction-table rows for many-to-many relations.

use crate::value::Value;

/// The relation mutation to perform.
#[derive(Debug, Clone)]
pub enum RelationOp {
    /// Point a to-one relation at the given id, or clear it with `None`.
    Set(Option<Value>),
    /// Attach the given target ids (one-to-many / many-to-many).
    Add(Vec<Value>),
    /// Detach the given target ids (one-to-many / many-to-many).
    Remove(Vec<Value>),
}

/// The per-type payload of a relation query.
#[derive(Debug, Clone)]
pub struct RelationPayload {
    /// Property path of the relation on the main entity.
    pub property_path: String,
    /// Primary key value(s) of the entity whose relation is mutated.
    pub of: Vec<Value>,
    pub op: Option<RelationOp>,
}
