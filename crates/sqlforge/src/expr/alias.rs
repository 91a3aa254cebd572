//! Query aliases: named references to tables, subqueries and joined relations.

use std::sync::Arc;

use crate::error::{QueryError, QueryResult};
use crate::metadata::{EntityMetadata, MetadataProvider};

/// What kind of source an alias names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AliasKind {
    From,
    Select,
    Join,
    Other,
}

/// A named reference to a queryable source.
///
/// Never mutated after creation; deep-copied on map clone; destroyed with
/// the owning map. Metadata is shared with the provider (immutable from
/// this crate's perspective), so the `Arc` is not a deep copy.
#[derive(Debug, Clone)]
pub struct Alias {
    pub name: String,
    pub kind: AliasKind,
    pub metadata: Option<Arc<EntityMetadata>>,
    pub table_path: Option<String>,
    pub subquery: Option<String>,
}

impl Alias {
    /// Whether this alias is backed by entity metadata.
    pub fn has_metadata(&self) -> bool {
        self.metadata.is_some()
    }

    /// The metadata backing this alias, or a configuration error.
    pub fn metadata(&self) -> QueryResult<&Arc<EntityMetadata>> {
        self.metadata.as_ref().ok_or_else(|| {
            QueryError::configuration(format!(
                "alias \"{}\" has no entity metadata",
                self.name
            ))
        })
    }

    /// The table this alias resolves to: an explicit table path, or the
    /// metadata-declared one.
    pub fn resolved_table_path(&self) -> QueryResult<&str> {
        if let Some(path) = &self.table_path {
            return Ok(path);
        }
        if let Some(meta) = &self.metadata {
            return Ok(&meta.table_path);
        }
        Err(QueryError::configuration(format!(
            "alias \"{}\" resolves to neither a table nor a subquery",
            self.name
        )))
    }
}

/// Options for registering a new alias.
///
/// The alias name is derived with the precedence: explicit name, table
/// path, target identifier. Deriving nothing is a configuration error.
#[derive(Debug, Clone, Default)]
pub struct AliasOptions {
    pub name: Option<String>,
    pub target: Option<String>,
    pub table_path: Option<String>,
    pub subquery: Option<String>,
    pub metadata: Option<Arc<EntityMetadata>>,
}

impl AliasOptions {
    pub(crate) fn build(
        self,
        kind: AliasKind,
        provider: &Arc<dyn MetadataProvider>,
    ) -> QueryResult<Alias> {
        let name = self
            .name
            .or_else(|| self.table_path.clone())
            .or_else(|| self.target.clone())
            .ok_or_else(|| {
                QueryError::configuration("alias name could not be derived and none was supplied")
            })?;

        let metadata = match self.metadata {
            Some(meta) => Some(meta),
            None => self.target.as_deref().and_then(|t| provider.resolve(t)),
        };

        // An unresolvable target is still usable as a plain table path.
        let table_path = match (&self.table_path, &metadata, &self.target, &self.subquery) {
            (Some(path), _, _, _) => Some(path.clone()),
            (None, None, Some(target), None) => Some(target.clone()),
            _ => None,
        };

        Ok(Alias {
            name,
            kind,
            metadata,
            table_path,
            subquery: self.subquery,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::MetadataRegistry;

    fn provider() -> Arc<dyn MetadataProvider> {
        let mut registry = MetadataRegistry::new();
        registry.register(EntityMetadata::new("User", "users"));
        Arc::new(registry)
    }

    #[test]
    fn derives_name_from_target() {
        let alias = AliasOptions {
            target: Some("User".to_string()),
            ..Default::default()
        }
        .build(AliasKind::From, &provider())
        .unwrap();

        assert_eq!(alias.name, "User");
        assert!(alias.has_metadata());
        assert_eq!(alias.resolved_table_path().unwrap(), "users");
    }

    #[test]
    fn explicit_name_wins_over_table_path() {
        let alias = AliasOptions {
            name: Some("u".to_string()),
            table_path: Some("users".to_string()),
            ..Default::default()
        }
        .build(AliasKind::From, &provider())
        .unwrap();

        assert_eq!(alias.name, "u");
        assert_eq!(alias.resolved_table_path().unwrap(), "users");
    }

    #[test]
    fn unresolvable_target_becomes_table_path() {
        let alias = AliasOptions {
            name: Some("l".to_string()),
            target: Some("audit_log".to_string()),
            ..Default::default()
        }
        .build(AliasKind::From, &provider())
        .unwrap();

        assert!(!alias.has_metadata());
        assert_eq!(alias.resolved_table_path().unwrap(), "audit_log");
    }

    #[test]
    fn underivable_name_is_rejected() {
        let err = AliasOptions {
            subquery: Some("SELECT 1".to_string()),
            ..Default::default()
        }
        .build(AliasKind::From, &provider())
        .unwrap_err();
        assert!(err.is_configuration());
    }
}
