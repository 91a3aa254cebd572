//! INSERT emission, including upsert policies.

use crate::dialect::UpsertStyle;
use crate::error::{QueryError, QueryResult};
use crate::expr::insert::{ConflictAction, InsertPayload, InsertValue, OnConflict};
use crate::expr::QueryExpressionMap;
use crate::metadata::EntityMetadata;

use super::Emitter;

impl Emitter<'_> {
    pub(crate) fn emit_insert(
        &mut self,
        map: &QueryExpressionMap,
        payload: &InsertPayload,
    ) -> QueryResult<String> {
        let with = self.render_ctes(map)?;
        let main = map.main_alias()?;
        let table = self.dialect.quote_path(main.resolved_table_path()?);
        let meta = main.metadata.clone();

        for (i, row) in payload.rows.iter().enumerate() {
            if row.len() != payload.columns.len() {
                return Err(QueryError::configuration(format!(
                    "insert row {i} has {} values for {} columns",
                    row.len(),
                    payload.columns.len()
                )));
            }
        }

        // MySQL expresses DO NOTHING as INSERT IGNORE.
        let ignore_keyword = matches!(
            (&payload.on_conflict, self.dialect.upsert_style()),
            (
                Some(OnConflict {
                    action: ConflictAction::DoNothing,
                    ..
                }),
                UpsertStyle::OnDuplicateKey
            )
        );

        let mut sql = String::new();
        if let Some(with) = with {
            sql.push_str(&with);
            sql.push(' ');
        }
        sql.push_str(if ignore_keyword {
            "INSERT IGNORE INTO "
        } else {
            "INSERT INTO "
        });
        sql.push_str(&table);

        let columns: Vec<String> = payload
            .columns
            .iter()
            .map(|property| self.dialect.quote(resolve_column_name(meta.as_deref(), property)))
            .collect();
        if !columns.is_empty() {
            sql.push_str(&format!("({})", columns.join(", ")));
        }

        let returning = self.render_returning(map, "INSERTED")?;
        if let Some(output) = returning.output() {
            sql.push(' ');
            sql.push_str(output);
        }

        if payload.rows.is_empty() || payload.columns.is_empty() {
            sql.push(' ');
            sql.push_str(self.dialect.default_values_clause());
        } else {
            let mut rows = Vec::with_capacity(payload.rows.len());
            for row in &payload.rows {
                let mut cells = Vec::with_capacity(row.len());
                for cell in row {
                    cells.push(match cell {
                        InsertValue::Value(value) => self.binder.bind_value(value.clone()),
                        InsertValue::Raw(fragment) => self.binder.resolve_fragment(
                            fragment,
                            &Default::default(),
                            &map.parameters,
                        )?,
                        InsertValue::Default => "DEFAULT".to_string(),
                    });
                }
                rows.push(format!("({})", cells.join(", ")));
            }
            sql.push_str(&format!(" VALUES {}", rows.join(", ")));
        }

        if let Some(on_conflict) = &payload.on_conflict {
            if !ignore_keyword {
                let clause = self.render_on_conflict(map, meta.as_deref(), on_conflict)?;
                sql.push(' ');
                sql.push_str(&clause);
            }
        }

        if let Some(suffix) = returning.suffix() {
            sql.push(' ');
            sql.push_str(suffix);
        }
        Ok(sql)
    }

    fn render_on_conflict(
        &mut self,
        map: &QueryExpressionMap,
        meta: Option<&EntityMetadata>,
        on_conflict: &OnConflict,
    ) -> QueryResult<String> {
        match self.dialect.upsert_style() {
            UpsertStyle::OnConflict => {
                let mut sql = "ON CONFLICT".to_string();
                if !on_conflict.target.is_empty() {
                    let cols: Vec<String> = on_conflict
                        .target
                        .iter()
                        .map(|p| self.dialect.quote(resolve_column_name(meta, p)))
                        .collect();
                    sql.push_str(&format!(" ({})", cols.join(", ")));
                }
                if let Some(index_predicate) = &on_conflict.index_predicate {
                    let resolved = self.binder.resolve_fragment(
                        index_predicate,
                        &Default::default(),
                        &map.parameters,
                    )?;
                    sql.push_str(&format!(" WHERE {resolved}"));
                }
                match &on_conflict.action {
                    ConflictAction::DoNothing => sql.push_str(" DO NOTHING"),
                    ConflictAction::DoUpdate {
                        overwrite,
                        condition,
                    } => {
                        let assignments: Vec<String> = overwrite
                            .iter()
                            .map(|p| {
                                let column = self.dialect.quote(resolve_column_name(meta, p));
                                format!("{column} = EXCLUDED.{column}")
                            })
                            .collect();
                        sql.push_str(&format!(" DO UPDATE SET {}", assignments.join(", ")));
                        if let Some(condition) = condition {
                            let rendered = self.render_predicate(map, condition)?;
                            sql.push_str(&format!(" WHERE {rendered}"));
                        }
                    }
                }
                Ok(sql)
            }
            UpsertStyle::OnDuplicateKey => match &on_conflict.action {
                // DoNothing became INSERT IGNORE upstream.
                ConflictAction::DoNothing => Ok(String::new()),
                ConflictAction::DoUpdate {
                    overwrite,
                    condition,
                } => {
                    if condition.is_some() {
                        return Err(QueryError::unsupported(
                            "a conditional upsert",
                            self.dialect.name(),
                        ));
                    }
                    let assignments: Vec<String> = overwrite
                        .iter()
                        .map(|p| {
                            let column = self.dialect.quote(resolve_column_name(meta, p));
                            format!("{column} = VALUES({column})")
                        })
                        .collect();
                    Ok(format!("ON DUPLICATE KEY UPDATE {}", assignments.join(", ")))
                }
            },
            UpsertStyle::Unsupported => Err(QueryError::unsupported(
                "an upsert clause",
                self.dialect.name(),
            )),
        }
    }
}

/// Map a property path to its column name, passing unmapped names through.
pub(crate) fn resolve_column_name<'a>(meta: Option<&'a EntityMetadata>, property: &'a str) -> &'a str {
    meta.and_then(|m| m.column_by_property_path(property))
        .map(|c| c.column_name.as_str())
        .unwrap_or(property)
}
