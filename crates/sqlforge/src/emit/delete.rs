//! DELETE emission.

use crate::error::QueryResult;
use crate::expr::QueryExpressionMap;

use super::Emitter;

impl Emitter<'_> {
    pub(crate) fn emit_delete(&mut self, map: &QueryExpressionMap) -> QueryResult<String> {
        let with = self.render_ctes(map)?;
        let main = map.main_alias()?;
        let table = self.dialect.quote_path(main.resolved_table_path()?);

        let mut sql = String::new();
        if let Some(with) = with {
            sql.push_str(&with);
            sql.push(' ');
        }
        sql.push_str(&format!("DELETE FROM {table}"));

        let returning = self.render_returning(map, "DELETED")?;
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
