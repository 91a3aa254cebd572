//! Parameter binding: turns `:name` placeholders and bound values into
//! dialect-native placeholders plus one ordered value list.
//!
//! A single binder instance spans an entire emission, including nested
//! CTE bodies, so parameter numbering stays consistent across every
//! fragment of the final statement.

use std::collections::{BTreeMap, HashMap};

use crate::dialect::Dialect;
use crate::error::{QueryError, QueryResult};
use crate::value::Value;

/// Accumulates the ordered value list while rewriting SQL text.
pub struct ParamBinder<'a> {
    dialect: &'a dyn Dialect,
    values: Vec<Value>,
    /// Name to 1-based slot, for dialects with indexed placeholders.
    slots: HashMap<String, usize>,
}

impl<'a> ParamBinder<'a> {
    pub fn new(dialect: &'a dyn Dialect) -> Self {
        Self {
            dialect,
            values: Vec::new(),
            slots: HashMap::new(),
        }
    }

    /// Bind an anonymous value and return its placeholder. Always takes a
    /// fresh slot.
    pub fn bind_value(&mut self, value: Value) -> String {
        self.values.push(value);
        self.dialect.placeholder(self.values.len())
    }

    /// Bind a named value and return its placeholder.
    ///
    /// On indexed-placeholder dialects a repeated name reuses its slot,
    /// so `:id = a OR :id = b` binds one value. Positional dialects
    /// append the value once per occurrence instead.
    pub fn bind_named(&mut self, name: &str, value: &Value) -> String {
        if self.dialect.indexed_placeholders() {
            // Reuse the slot only while the name still maps to the same
            // value; a fragment-local rebinding gets a fresh slot.
            if let Some(&slot) = self.slots.get(name) {
                if self.values[slot - 1] == *value {
                    return self.dialect.placeholder(slot);
                }
            }
            self.values.push(value.clone());
            let slot = self.values.len();
            self.slots.insert(name.to_string(), slot);
            self.dialect.placeholder(slot)
        } else {
            self.values.push(value.clone());
            self.dialect.placeholder(self.values.len())
        }
    }

    /// Rewrite every `:name` in a raw fragment to a dialect placeholder,
    /// resolving names against fragment-local parameters first, then the
    /// map-level ones. An unresolvable name is a hard failure.
    ///
    /// Single-quoted literals and quoted identifiers are passed through
    /// untouched; `::` stays as the postgres cast operator.
    pub fn resolve_fragment(
        &mut self,
        sql: &str,
        local: &BTreeMap<String, Value>,
        map_level: &BTreeMap<String, Value>,
    ) -> QueryResult<String> {
        let mut out = String::with_capacity(sql.len());
        let mut chars = sql.char_indices().peekable();

        while let Some((i, c)) = chars.next() {
            match c {
                '\'' | '"' | '`' => {
                    out.push(c);
                    // Copy until the matching close quote; doubled close
                    // quotes are escapes.
                    while let Some((_, inner)) = chars.next() {
                        out.push(inner);
                        if inner == c {
                            if chars.next_if(|&(_, n)| n == c).is_some() {
                                out.push(c);
                            } else {
                                break;
                            }
                        }
                    }
                }
                ':' => {
                    if chars.next_if(|&(_, n)| n == ':').is_some() {
                        // Cast operator.
                        out.push_str("::");
                        continue;
                    }
                    let start = i + 1;
                    let mut end = start;
                    while let Some(&(j, n)) = chars.peek() {
                        if n.is_ascii_alphanumeric() || n == '_' {
                            chars.next();
                            end = j + n.len_utf8();
                        } else {
                            break;
                        }
                    }
                    if end == start {
                        out.push(c);
                        continue;
                    }
                    let name = &sql[start..end];
                    let value = local
                        .get(name)
                        .or_else(|| map_level.get(name))
                        .ok_or_else(|| QueryError::MissingParameter(name.to_string()))?;
                    let placeholder = self.bind_named(name, value);
                    out.push_str(&placeholder);
                }
                _ => out.push(c),
            }
        }
        Ok(out)
    }

    /// Number of values bound so far.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Finish binding and take the ordered value list.
    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{MysqlDialect, PostgresDialect};

    fn params(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn repeated_name_shares_a_slot_on_postgres() {
        let dialect = PostgresDialect;
        let mut binder = ParamBinder::new(&dialect);
        let bound = params(&[("id", Value::Int(7))]);
        let sql = binder
            .resolve_fragment("a.id = :id OR b.owner = :id", &bound, &BTreeMap::new())
            .unwrap();
        assert_eq!(sql, "a.id = $1 OR b.owner = $1");
        assert_eq!(binder.into_values(), vec![Value::Int(7)]);
    }

    #[test]
    fn repeated_name_appends_per_occurrence_on_mysql() {
        let dialect = MysqlDialect;
        let mut binder = ParamBinder::new(&dialect);
        let bound = params(&[("id", Value::Int(7))]);
        let sql = binder
            .resolve_fragment("a.id = :id OR b.owner = :id", &bound, &BTreeMap::new())
            .unwrap();
        assert_eq!(sql, "a.id = ? OR b.owner = ?");
        assert_eq!(binder.into_values(), vec![Value::Int(7), Value::Int(7)]);
    }

    #[test]
    fn local_params_shadow_map_level() {
        let dialect = PostgresDialect;
        let mut binder = ParamBinder::new(&dialect);
        let local = params(&[("name", Value::Text("local".into()))]);
        let map_level = params(&[
            ("name", Value::Text("global".into())),
            ("age", Value::Int(30)),
        ]);
        let sql = binder
            .resolve_fragment("name = :name AND age = :age", &local, &map_level)
            .unwrap();
        assert_eq!(sql, "name = $1 AND age = $2");
        assert_eq!(
            binder.into_values(),
            vec![Value::Text("local".into()), Value::Int(30)]
        );
    }

    #[test]
    fn missing_parameter_is_an_error() {
        let dialect = PostgresDialect;
        let mut binder = ParamBinder::new(&dialect);
        let err = binder
            .resolve_fragment("id = :missing", &BTreeMap::new(), &BTreeMap::new())
            .unwrap_err();
        assert!(err.is_missing_parameter());
    }

    #[test]
    fn literals_and_casts_pass_through() {
        let dialect = PostgresDialect;
        let mut binder = ParamBinder::new(&dialect);
        let bound = params(&[("id", Value::Int(1))]);
        let sql = binder
            .resolve_fragment(
                "note = ':id is not a param' AND id = :id::bigint",
                &bound,
                &BTreeMap::new(),
            )
            .unwrap();
        assert_eq!(sql, "note = ':id is not a param' AND id = $1::bigint");
    }

    #[test]
    fn bare_colon_passes_through() {
        let dialect = PostgresDialect;
        let mut binder = ParamBinder::new(&dialect);
        let sql = binder
            .resolve_fragment("ts > '12:30'", &BTreeMap::new(), &BTreeMap::new())
            .unwrap();
        assert_eq!(sql, "ts > '12:30'");
        assert!(binder.is_empty());
    }
}
