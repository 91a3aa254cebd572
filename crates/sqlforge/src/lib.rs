//! sqlforge is a SQL construction engine: a mutable query description
//! (the expression map), a fluent builder over it, and dialect-aware
//! emission into SQL text plus an ordered parameter list.
//!
//! Nothing here talks to a database. The emitted [`EmittedQuery`] is
//! handed to an external executor, and entity shapes arrive through the
//! [`MetadataProvider`] collaborator.
//!
//! ```
//! use std::sync::Arc;
//! use sqlforge::{EntityMetadata, MetadataRegistry, PostgresDialect, QueryBuilder};
//!
//! let mut registry = MetadataRegistry::new();
//! registry.register(
//!     EntityMetadata::new("User", "users")
//!         .with_primary_column("id", "id")
//!         .with_column("firstName", "first_name"),
//! );
//!
//! let query = QueryBuilder::new(Arc::new(registry), Arc::new(PostgresDialect))
//!     .from("User", "user").unwrap()
//!     .select("user.firstName")
//!     .where_params("user.id = :id", [("id", 42i64)])
//!     .finalize()
//!     .unwrap();
//!
//! assert_eq!(
//!     query.sql,
//!     "SELECT \"user\".\"first_name\" FROM \"users\" \"user\" WHERE user.id = $1"
//! );
//! ```

pub mod binder;
pub mod builder;
pub mod dialect;
pub mod emit;
pub mod error;
pub mod expr;
pub mod metadata;
pub mod value;

pub use builder::QueryBuilder;
pub use dialect::{
    CockroachDialect, Dialect, MssqlDialect, MysqlDialect, PostgresDialect, ReturningStyle,
    UpsertStyle,
};
pub use emit::{emit, EmittedQuery};
pub use error::{QueryError, QueryResult};
pub use expr::alias::{Alias, AliasKind, AliasOptions};
pub use expr::cte::{CteBody, CteSpec};
pub use expr::insert::{ConflictAction, InsertValue, OnConflict};
pub use expr::join::{JoinKind, JoinSpec, JoinTarget};
pub use expr::lock::{LockMode, OnLocked};
pub use expr::order::{NullOrdering, OrderBySpec, OrderDirection};
pub use expr::predicate::{Connective, Predicate, PredicateBuilder};
pub use expr::relation::{RelationOp, RelationPayload};
pub use expr::{
    QueryExpressionMap, QueryVariant, Returning, SelectItem, SetValue, TimeTravel, UpdatePayload,
};
pub use metadata::{
    ColumnMetadata, EntityMetadata, JunctionTable, MetadataProvider, MetadataRegistry,
    RelationKind, RelationMetadata,
};
pub use value::Value;
