//! Relation mutation emission.
//!
//! A relation query updates the link between two entities: a foreign key
//! update for to-one and one-to-many relations, junction-table inserts
//! and deletes for many-to-many. Which operations are legal depends on
//! the relation's cardinality, validated here before any SQL is built.

use crate::error::{QueryError, QueryResult};
use crate::expr::relation::{RelationOp, RelationPayload};
use crate::expr::QueryExpressionMap;
use crate::metadata::{JunctionTable, RelationKind, RelationMetadata};
use crate::value::Value;

use super::select::single_primary_column;
use super::Emitter;

impl Emitter<'_> {
    pub(crate) fn emit_relation(
        &mut self,
        map: &QueryExpressionMap,
        payload: &RelationPayload,
    ) -> QueryResult<String> {
        let main = map.main_alias()?;
        let meta = main.metadata()?.clone();
        let relation = meta
            .relation_by_property_path(&payload.property_path)
            .ok_or_else(|| QueryError::property_not_found(&payload.property_path, &meta.name))?
            .clone();
        let op = payload.op.as_ref().ok_or_else(|| {
            QueryError::configuration("relation query has no set/add/remove operation")
        })?;
        if payload.of.is_empty() {
            return Err(QueryError::configuration(
                "relation query has no owning entity id (missing \"of\")",
            ));
        }

        match (relation.kind, op) {
            (RelationKind::ManyToOne | RelationKind::OneToOne, RelationOp::Set(value)) => {
                self.emit_to_one_set(&meta.table_path, &meta, &relation, &payload.of, value)
            }
            (RelationKind::OneToMany, RelationOp::Add(ids)) => {
                self.emit_one_to_many(map, &relation, &payload.of, ids, true)
            }
            (RelationKind::OneToMany, RelationOp::Remove(ids)) => {
                self.emit_one_to_many(map, &relation, &payload.of, ids, false)
            }
            (RelationKind::ManyToMany, RelationOp::Add(ids)) => {
                let junction = junction_of(&relation)?;
                self.emit_junction_insert(junction, &payload.of, ids)
            }
            (RelationKind::ManyToMany, RelationOp::Remove(ids)) => {
                let junction = junction_of(&relation)?;
                self.emit_junction_delete(junction, &payload.of, ids)
            }
            (kind, op) => Err(QueryError::configuration(format!(
                "{} is not a valid operation for a {kind:?} relation",
                op_name(op)
            ))),
        }
    }

    /// Point the owning side's foreign key at the new target (or NULL).
    fn emit_to_one_set(
        &mut self,
        owner_table: &str,
        owner_meta: &crate::metadata::EntityMetadata,
        relation: &RelationMetadata,
        of: &[Value],
        value: &Option<Value>,
    ) -> QueryResult<String> {
        let fk = relation.join_column.as_deref().ok_or_else(|| {
            QueryError::configuration(format!(
                "to-one relation \"{}\" has no join column",
                relation.property_path
            ))
        })?;
        let pk = single_primary_column(owner_meta)?;
        let rhs = match value {
            Some(value) => self.binder.bind_value(value.clone()),
            None => "NULL".to_string(),
        };
        let ids = self.placeholder_list(of);
        Ok(format!(
            "UPDATE {} SET {} = {rhs} WHERE {} IN ({ids})",
            self.dialect.quote_path(owner_table),
            self.dialect.quote(fk),
            self.dialect.quote(pk)
        ))
    }

    /// Re-point (or clear) the child rows' foreign key. Attaching requires
    /// exactly one owner id, since a child row has one parent.
    fn emit_one_to_many(
        &mut self,
        map: &QueryExpressionMap,
        relation: &RelationMetadata,
        of: &[Value],
        ids: &[Value],
        attaching: bool,
    ) -> QueryResult<String> {
        if ids.is_empty() {
            return Err(QueryError::configuration(
                "relation add/remove was given no target ids",
            ));
        }
        let fk = relation.join_column.as_deref().ok_or_else(|| {
            QueryError::configuration(format!(
                "one-to-many relation \"{}\" has no join column",
                relation.property_path
            ))
        })?;
        let child_meta = map.provider().resolve(&relation.target).ok_or_else(|| {
            QueryError::configuration(format!(
                "relation \"{}\" targets unmapped entity \"{}\"",
                relation.property_path, relation.target
            ))
        })?;
        let child_pk = single_primary_column(&child_meta)?;

        let quoted_fk = self.dialect.quote(fk);
        let rhs = if attaching {
            if of.len() != 1 {
                return Err(QueryError::configuration(
                    "attaching one-to-many children requires exactly one owner id",
                ));
            }
            self.binder.bind_value(of[0].clone())
        } else {
            "NULL".to_string()
        };
        let id_list = self.placeholder_list(ids);
        let mut sql = format!(
            "UPDATE {} SET {quoted_fk} = {rhs} WHERE {} IN ({id_list})",
            self.dialect.quote_path(&child_meta.table_path),
            self.dialect.quote(child_pk)
        );
        if !attaching {
            // Only detach children that belong to the named owner(s).
            let owner_list = self.placeholder_list(of);
            sql.push_str(&format!(" AND {quoted_fk} IN ({owner_list})"));
        }
        Ok(sql)
    }

    fn emit_junction_insert(
        &mut self,
        junction: &JunctionTable,
        of: &[Value],
        ids: &[Value],
    ) -> QueryResult<String> {
        if ids.is_empty() {
            return Err(QueryError::configuration(
                "relation add/remove was given no target ids",
            ));
        }
        let mut rows = Vec::with_capacity(of.len() * ids.len());
        for owner in of {
            for id in ids {
                let owner_ph = self.binder.bind_value(owner.clone());
                let id_ph = self.binder.bind_value(id.clone());
                rows.push(format!("({owner_ph}, {id_ph})"));
            }
        }
        Ok(format!(
            "INSERT INTO {}({}, {}) VALUES {}",
            self.dialect.quote_path(&junction.table_path),
            self.dialect.quote(&junction.owner_column),
            self.dialect.quote(&junction.inverse_column),
            rows.join(", ")
        ))
    }

    fn emit_junction_delete(
        &mut self,
        junction: &JunctionTable,
        of: &[Value],
        ids: &[Value],
    ) -> QueryResult<String> {
        if ids.is_empty() {
            return Err(QueryError::configuration(
                "relation add/remove was given no target ids",
            ));
        }
        let owner_list = self.placeholder_list(of);
        let id_list = self.placeholder_list(ids);
        Ok(format!(
            "DELETE FROM {} WHERE {} IN ({owner_list}) AND {} IN ({id_list})",
            self.dialect.quote_path(&junction.table_path),
            self.dialect.quote(&junction.owner_column),
            self.dialect.quote(&junction.inverse_column)
        ))
    }

    fn placeholder_list(&mut self, values: &[Value]) -> String {
        values
            .iter()
            .map(|v| self.binder.bind_value(v.clone()))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn junction_of(relation: &RelationMetadata) -> QueryResult<&JunctionTable> {
    relation.junction.as_ref().ok_or_else(|| {
        QueryError::configuration(format!(
            "many-to-many relation \"{}\" has no junction table",
            relation.property_path
        ))
    })
}

fn op_name(op: &RelationOp) -> &'static str {
    match op {
        RelationOp::Set(_) => "set",
        RelationOp::Add(_) => "add",
        RelationOp::Remove(_) => "remove",
    }
}
