//! UPDATE emission, shared by plain updates and the soft-delete/restore
//! variants that synthesize their SET clause.

use crate::error::{QueryError, QueryResult};
use crate::expr::{QueryExpressionMap, SetValue, UpdatePayload};
use crate::metadata::EntityMetadata;

use super::insert::resolve_column_name;
use super::Emitter;

impl Emitter<'_> {
    pub(crate) fn emit_update(
        &mut self,
        map: &QueryExpressionMap,
        payload: &UpdatePayload,
    ) -> QueryResult<String> {
        if payload.assignments.is_empty() {
            return Err(QueryError::configuration(
                "update query has an empty SET clause",
            ));
        }
        let main = map.main_alias()?;
        let meta = main.metadata.clone();

        let mut assignments = Vec::with_capacity(payload.assignments.len());
        for (property, value) in &payload.assignments {
            let column = self.dialect.quote(resolve_column_name(meta.as_deref(), property));
            let rhs = match value {
                SetValue::Value(value) => self.binder.bind_value(value.clone()),
                SetValue::Raw(fragment) => self.binder.resolve_fragment(
                    fragment,
                    &Default::default(),
                    &map.parameters,
                )?,
            };
            assignments.push(format!("{column} = {rhs}"));
        }
        self.emit_update_statement(map, &assignments.join(", "))
    }

    /// Soft deletion marks the delete-date column instead of removing the
    /// row; restore clears it. Both require the entity to declare that
    /// column.
    pub(crate) fn emit_soft_delete(
        &mut self,
        map: &QueryExpressionMap,
        deleting: bool,
    ) -> QueryResult<String> {
        let main = map.main_alias()?;
        let meta = main.metadata()?;
        let column = delete_date_column(meta)?;
        let column = self.dialect.quote(column);
        let assignment = if deleting {
            format!("{column} = CURRENT_TIMESTAMP")
        } else {
            format!("{column} = NULL")
        };
        self.emit_update_statement(map, &assignment)
    }

    fn emit_update_statement(
        &mut self,
        map: &QueryExpressionMap,
        set_clause: &str,
    ) -> QueryResult<String> {
        let with = self.render_ctes(map)?;
        let main = map.main_alias()?;
        let table = self.dialect.quote_path(main.resolved_table_path()?);

        let mut sql = String::new();
        if let Some(with) = with {
            sql.push_str(&with);
            sql.push(' ');
        }
        sql.push_str(&format!("UPDATE {table} SET {set_clause}"));

        let returning = self.render_returning(map, "INSERTED")?;
        if let Some(output) = returning.output() {
            sql.push(' ');
            sql.push_str(output);
        }
        if let Some(where_clause) = self.render_where(map, false)? {
            sql.push_str(" WHERE ");
            sql.push_str(&where_clause);
        }
        if let Some(suffix) = returning.suffix() {
            sql.push(' ');
            sql.push_str(suffix);
        }
        Ok(sql)
    }
}

pub(crate) fn delete_date_column(meta: &EntityMetadata) -> QueryResult<&str> {
    meta.delete_date_column.as_deref().ok_or_else(|| {
        QueryError::configuration(format!(
            "entity \"{}\" has no delete date column and cannot be soft-deleted or restored",
            meta.name
        ))
    })
}
