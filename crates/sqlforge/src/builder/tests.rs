use std::sync::Arc;

use crate::dialect::PostgresDialect;
use crate::expr::predicate::Predicate;
use crate::metadata::{EntityMetadata, MetadataProvider, MetadataRegistry};
use crate::value::Value;

use super::QueryBuilder;

fn provider() -> Arc<dyn MetadataProvider> {
    let mut registry = MetadataRegistry::new();
    registry.register(
        EntityMetadata::new("User", "users")
            .with_primary_column("id", "id")
            .with_column("firstName", "first_name"),
    );
    Arc::new(registry)
}

fn pg() -> QueryBuilder {
    QueryBuilder::new(provider(), Arc::new(PostgresDialect))
}

#[test]
fn clone_emits_identically_then_diverges() {
    let original = pg()
        .from("User", "user")
        .unwrap()
        .select("user.id")
        .where_params("user.id = :id", [("id", 1i64)]);
    let copy = original.clone();
    assert_eq!(original.finalize().unwrap(), copy.finalize().unwrap());

    let mutated = copy.and_where("user.first_name = 'x'");
    assert_ne!(original.finalize().unwrap().sql, mutated.finalize().unwrap().sql);
    // The original is untouched by the copy's mutation.
    assert_eq!(original.expression_map().wheres.len(), 1);
}

#[test]
fn builder_debug_names_the_dialect() {
    let qb = pg().from("User", "user").unwrap();
    let rendered = format!("{qb:?}");
    assert!(rendered.contains("QueryBuilder"));
    assert!(rendered.contains("postgres"));
}

#[test]
fn duplicate_join_alias_is_rejected() {
    let err = pg()
        .from("User", "user")
        .unwrap()
        .left_join("photos", "p", "p.user_id = user.id")
        .unwrap()
        .left_join("posts", "p", "p.author_id = user.id")
        .unwrap_err();
    assert!(err.is_configuration());
}

#[test]
fn join_alias_resolves_to_registered_metadata() {
    let qb = pg()
        .from("User", "user")
        .unwrap()
        .left_join("photos", "photo", "photo.user_id = user.id")
        .unwrap();
    let alias = qb.expression_map().alias_by_name("photo").unwrap();
    assert_eq!(alias.resolved_table_path().unwrap(), "photos");
}

#[test]
fn unknown_property_fails_before_any_sql() {
    let err = pg()
        .from("User", "user")
        .unwrap()
        .where_object(serde_json::json!({ "unknownProp": 1 }))
        .unwrap_err();
    assert!(err.is_property_not_found());
}

#[test]
fn object_condition_array_becomes_or() {
    let query = pg()
        .from("User", "user")
        .unwrap()
        .select("user.id")
        .where_object(serde_json::json!([
            { "firstName": "Alex" },
            { "firstName": "Blake" }
        ]))
        .unwrap()
        .finalize()
        .unwrap();
    assert!(query.sql.ends_with(
        "WHERE (\"user\".\"first_name\" = $1 OR \"user\".\"first_name\" = $2)"
    ));
    assert_eq!(
        query.values,
        vec![Value::Text("Alex".into()), Value::Text("Blake".into())]
    );
}

#[test]
fn nested_condition_group_is_bracketed() {
    let query = pg()
        .from("User", "user")
        .unwrap()
        .select("user.id")
        .where_sql("a = 1")
        .and_where_group(|group| {
            group
                .where_pred(Predicate::raw("b = 2"))
                .or_where(Predicate::raw("c = 3"))
        })
        .finalize()
        .unwrap();
    assert!(query.sql.ends_with("WHERE a = 1 AND (b = 2 OR c = 3)"));
}

#[test]
fn insert_options_require_an_insert_query() {
    let err = pg()
        .from("User", "user")
        .unwrap()
        .values(["x"])
        .unwrap_err();
    assert!(err.is_configuration());

    let err = pg().delete_from("User").unwrap().set("firstName", "x").unwrap_err();
    assert!(err.is_configuration());

    let err = pg().from("User", "user").unwrap().of([1i64]).unwrap_err();
    assert!(err.is_configuration());
}

#[test]
fn where_replaces_and_chains_append() {
    let qb = pg()
        .from("User", "user")
        .unwrap()
        .and_where("a = 1")
        .or_where("b = 2")
        .where_sql("c = 3");
    // where_sql discards the previously chained clauses.
    assert_eq!(qb.expression_map().wheres.len(), 1);
}

#[test]
fn execution_directives_are_recorded_not_emitted() {
    let qb = pg()
        .from("User", "user")
        .unwrap()
        .select("user.id")
        .use_transaction(true)
        .call_listeners(false)
        .cache(true)
        .cache_id("users-page")
        .cache_duration_ms(60_000);
    let map = qb.expression_map();
    assert!(map.use_transaction);
    assert!(!map.call_listeners);
    assert_eq!(map.cache, Some(true));
    assert_eq!(map.cache_id.as_deref(), Some("users-page"));

    let query = qb.finalize().unwrap();
    assert_eq!(query.sql, "SELECT \"user\".\"id\" FROM \"users\" \"user\"");
}
