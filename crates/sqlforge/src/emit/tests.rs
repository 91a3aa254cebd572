use std::sync::Arc;

use crate::builder::QueryBuilder;
use crate::dialect::{CockroachDialect, MssqlDialect, MysqlDialect, PostgresDialect};
use crate::expr::cte::{CteBody, CteSpec};
use crate::expr::insert::{ConflictAction, OnConflict};
use crate::expr::lock::{LockMode, OnLocked};
use crate::expr::order::OrderDirection;
use crate::expr::predicate::Predicate;
use crate::expr::TimeTravel;
use crate::metadata::{
    EntityMetadata, JunctionTable, MetadataProvider, MetadataRegistry, RelationKind,
    RelationMetadata,
};
use crate::value::Value;

fn provider() -> Arc<dyn MetadataProvider> {
    let mut registry = MetadataRegistry::new();
    registry.register(
        EntityMetadata::new("User", "users")
            .with_primary_column("id", "id")
            .with_column("firstName", "first_name")
            .with_relation(RelationMetadata {
                property_path: "photos".to_string(),
                target: "Photo".to_string(),
                kind: RelationKind::OneToMany,
                join_column: Some("user_id".to_string()),
                junction: None,
            })
            .with_relation(RelationMetadata {
                property_path: "groups".to_string(),
                target: "Group".to_string(),
                kind: RelationKind::ManyToMany,
                join_column: None,
                junction: Some(JunctionTable {
                    table_path: "user_groups".to_string(),
                    owner_column: "user_id".to_string(),
                    inverse_column: "group_id".to_string(),
                }),
            }),
    );
    registry.register(
        EntityMetadata::new("Photo", "photos")
            .with_primary_column("id", "id")
            .with_column("url", "url")
            .with_relation(RelationMetadata {
                property_path: "owner".to_string(),
                target: "User".to_string(),
                kind: RelationKind::ManyToOne,
                join_column: Some("user_id".to_string()),
                junction: None,
            }),
    );
    registry.register(
        EntityMetadata::new("Group", "groups")
            .with_primary_column("id", "id")
            .with_column("name", "name"),
    );
    registry.register(
        EntityMetadata::new("Post", "posts")
            .with_primary_column("id", "id")
            .with_column("title", "title")
            .with_default_order("id", OrderDirection::Asc)
            .with_delete_date_column("deleted_at"),
    );
    Arc::new(registry)
}

fn pg() -> QueryBuilder {
    QueryBuilder::new(provider(), Arc::new(PostgresDialect))
}

fn mysql() -> QueryBuilder {
    QueryBuilder::new(provider(), Arc::new(MysqlDialect))
}

fn mssql() -> QueryBuilder {
    QueryBuilder::new(provider(), Arc::new(MssqlDialect))
}

fn crdb() -> QueryBuilder {
    QueryBuilder::new(provider(), Arc::new(CockroachDialect))
}

#[test]
fn select_defaults_to_all_mapped_columns() {
    let query = pg().from("User", "user").unwrap().finalize().unwrap();
    assert_eq!(
        query.sql,
        "SELECT \"user\".\"id\" AS \"user_id\", \"user\".\"first_name\" AS \"user_firstName\" \
         FROM \"users\" \"user\""
    );
    assert!(query.values.is_empty());
}

#[test]
fn where_or_then_extra_and_keeps_brackets() {
    let query = pg()
        .from("User", "user")
        .unwrap()
        .select("user.id")
        .where_params("user.id = :a", [("a", 1i64)])
        .or_where_params("user.first_name = :b", [("b", "x")])
        .append_extra_condition(Predicate::raw("user.active = TRUE"))
        .finalize()
        .unwrap();
    assert_eq!(
        query.sql,
        "SELECT \"user\".\"id\" FROM \"users\" \"user\" \
         WHERE (user.id = $1 OR user.first_name = $2) AND (user.active = TRUE)"
    );
    assert_eq!(query.values, vec![Value::Int(1), Value::Text("x".into())]);
}

#[test]
fn repeated_named_parameter_round_trip() {
    let build = |qb: QueryBuilder| {
        qb.from("User", "user")
            .unwrap()
            .select("user.id")
            .where_params("user.id = :id OR user.referrer = :id", [("id", 7i64)])
            .finalize()
            .unwrap()
    };
    let on_pg = build(pg());
    assert!(on_pg.sql.ends_with("WHERE user.id = $1 OR user.referrer = $1"));
    assert_eq!(on_pg.values, vec![Value::Int(7)]);

    let on_mysql = build(mysql());
    assert!(on_mysql.sql.ends_with("WHERE user.id = ? OR user.referrer = ?"));
    assert_eq!(on_mysql.values, vec![Value::Int(7), Value::Int(7)]);
}

#[test]
fn object_condition_resolves_columns() {
    let query = pg()
        .from("User", "user")
        .unwrap()
        .select("user.id")
        .where_object(serde_json::json!({ "firstName": "Alex" }))
        .unwrap()
        .finalize()
        .unwrap();
    assert_eq!(
        query.sql,
        "SELECT \"user\".\"id\" FROM \"users\" \"user\" WHERE \"user\".\"first_name\" = $1"
    );
    assert_eq!(query.values, vec![Value::Text("Alex".into())]);
}

#[test]
fn soft_delete_filter_and_default_order() {
    let query = pg().from("Post", "post").unwrap().select("post.id").finalize().unwrap();
    assert_eq!(
        query.sql,
        "SELECT \"post\".\"id\" FROM \"posts\" \"post\" \
         WHERE \"post\".\"deleted_at\" IS NULL ORDER BY \"post\".\"id\" ASC"
    );

    let with_deleted = pg()
        .from("Post", "post")
        .unwrap()
        .select("post.id")
        .with_deleted()
        .disable_default_order()
        .finalize()
        .unwrap();
    assert_eq!(
        with_deleted.sql,
        "SELECT \"post\".\"id\" FROM \"posts\" \"post\""
    );
}

#[test]
fn finalize_is_idempotent() {
    let qb = pg()
        .from("User", "user")
        .unwrap()
        .select("user.id")
        .where_params("user.id = :id", [("id", 1i64)])
        .skip(2u64)
        .take(5u64);
    let first = qb.finalize().unwrap();
    let second = qb.finalize().unwrap();
    assert_eq!(first, second);
}

#[test]
fn skip_take_pages_distinct_primary_rows_over_one_to_many() {
    let query = pg()
        .from("User", "user")
        .unwrap()
        .select("user.id")
        .left_join_relation("user.photos", "photo")
        .unwrap()
        .skip(0u64)
        .take(2u64)
        .finalize()
        .unwrap();
    assert_eq!(
        query.sql,
        "SELECT \"user\".\"id\" FROM \"users\" \"user\" \
         LEFT JOIN \"photos\" \"photo\" ON \"photo\".\"user_id\" = \"user\".\"id\" \
         WHERE \"user\".\"id\" IN (\
         SELECT DISTINCT \"user\".\"id\" FROM \"users\" \"user\" \
         LEFT JOIN \"photos\" \"photo\" ON \"photo\".\"user_id\" = \"user\".\"id\" \
         LIMIT 2 OFFSET 0)"
    );
}

#[test]
fn subquery_pagination_suppresses_limit_offset_on_the_outer_statement() {
    let query = pg()
        .from("User", "user")
        .unwrap()
        .select("user.id")
        .left_join_relation("user.photos", "photo")
        .unwrap()
        .limit(10u64)
        .offset(5u64)
        .skip(1u64)
        .take(2u64)
        .finalize()
        .unwrap();
    // The page is bounded inside the distinct-key subquery only.
    assert!(query.sql.ends_with("LIMIT 2 OFFSET 1)"));
    assert!(!query.sql.ends_with("LIMIT 10 OFFSET 5"));
}

#[test]
fn skip_take_wins_over_limit_offset() {
    let query = pg()
        .from("User", "user")
        .unwrap()
        .select("user.id")
        .limit(10u64)
        .offset(5u64)
        .take(3u64)
        .skip(1u64)
        .finalize()
        .unwrap();
    assert!(query.sql.ends_with("LIMIT 3 OFFSET 1"));
}

#[test]
fn to_one_relation_join() {
    let query = pg()
        .from("Photo", "photo")
        .unwrap()
        .select("photo.url")
        .inner_join_relation("photo.owner", "owner")
        .unwrap()
        .finalize()
        .unwrap();
    assert_eq!(
        query.sql,
        "SELECT \"photo\".\"url\" FROM \"photos\" \"photo\" \
         INNER JOIN \"users\" \"owner\" ON \"owner\".\"id\" = \"photo\".\"user_id\""
    );
}

#[test]
fn many_to_many_join_goes_through_junction() {
    let query = pg()
        .from("User", "user")
        .unwrap()
        .select("user.id")
        .left_join_relation("user.groups", "grp")
        .unwrap()
        .finalize()
        .unwrap();
    assert_eq!(
        query.sql,
        "SELECT \"user\".\"id\" FROM \"users\" \"user\" \
         LEFT JOIN \"user_groups\" \"grp_junction\" \
         ON \"grp_junction\".\"user_id\" = \"user\".\"id\" \
         LEFT JOIN \"groups\" \"grp\" ON \"grp\".\"id\" = \"grp_junction\".\"group_id\""
    );
}

#[test]
fn group_by_and_having() {
    let query = pg()
        .from("User", "user")
        .unwrap()
        .select("user.id")
        .add_select("COUNT(*)")
        .group_by("user.id")
        .and_having("COUNT(*) > 1")
        .finalize()
        .unwrap();
    assert_eq!(
        query.sql,
        "SELECT \"user\".\"id\", COUNT(*) FROM \"users\" \"user\" \
         GROUP BY \"user\".\"id\" HAVING COUNT(*) > 1"
    );
}

#[test]
fn insert_with_returning() {
    let query = pg()
        .insert_into("User")
        .unwrap()
        .columns(["firstName"])
        .unwrap()
        .values(["Alex"])
        .unwrap()
        .returning(["id"])
        .finalize()
        .unwrap();
    assert_eq!(
        query.sql,
        "INSERT INTO \"users\"(\"first_name\") VALUES ($1) RETURNING \"id\""
    );
    assert_eq!(query.values, vec![Value::Text("Alex".into())]);
}

#[test]
fn optional_returning_dropped_required_fails_on_mysql() {
    let optional = mysql()
        .insert_into("User")
        .unwrap()
        .columns(["firstName"])
        .unwrap()
        .values(["Alex"])
        .unwrap()
        .returning(["id"])
        .finalize()
        .unwrap();
    assert_eq!(
        optional.sql,
        "INSERT INTO `users`(`first_name`) VALUES (?)"
    );

    let required = mysql()
        .insert_into("User")
        .unwrap()
        .columns(["firstName"])
        .unwrap()
        .values(["Alex"])
        .unwrap()
        .returning_required(["id"])
        .finalize()
        .unwrap_err();
    assert!(required.is_unsupported());
}

#[test]
fn upsert_per_dialect() {
    let conflict = OnConflict {
        target: vec!["firstName".to_string()],
        index_predicate: None,
        action: ConflictAction::DoUpdate {
            overwrite: vec!["firstName".to_string()],
            condition: None,
        },
    };
    let on_pg = pg()
        .insert_into("User")
        .unwrap()
        .columns(["firstName"])
        .unwrap()
        .values(["Alex"])
        .unwrap()
        .on_conflict(conflict.clone())
        .unwrap()
        .finalize()
        .unwrap();
    assert_eq!(
        on_pg.sql,
        "INSERT INTO \"users\"(\"first_name\") VALUES ($1) \
         ON CONFLICT (\"first_name\") DO UPDATE SET \"first_name\" = EXCLUDED.\"first_name\""
    );

    let on_mysql = mysql()
        .insert_into("User")
        .unwrap()
        .columns(["firstName"])
        .unwrap()
        .values(["Alex"])
        .unwrap()
        .on_conflict(conflict)
        .unwrap()
        .finalize()
        .unwrap();
    assert_eq!(
        on_mysql.sql,
        "INSERT INTO `users`(`first_name`) VALUES (?) \
         ON DUPLICATE KEY UPDATE `first_name` = VALUES(`first_name`)"
    );
}

#[test]
fn do_nothing_becomes_insert_ignore_on_mysql() {
    let query = mysql()
        .insert_into("User")
        .unwrap()
        .columns(["firstName"])
        .unwrap()
        .values(["Alex"])
        .unwrap()
        .on_conflict(OnConflict {
            target: Vec::new(),
            index_predicate: None,
            action: ConflictAction::DoNothing,
        })
        .unwrap()
        .finalize()
        .unwrap();
    assert_eq!(query.sql, "INSERT IGNORE INTO `users`(`first_name`) VALUES (?)");
}

#[test]
fn update_resolves_columns_without_alias_prefix() {
    let query = pg()
        .update("User")
        .unwrap()
        .set("firstName", "Blake")
        .unwrap()
        .where_params("id = :id", [("id", 1i64)])
        .finalize()
        .unwrap();
    assert_eq!(
        query.sql,
        "UPDATE \"users\" SET \"first_name\" = $1 WHERE id = $2"
    );
    assert_eq!(
        query.values,
        vec![Value::Text("Blake".into()), Value::Int(1)]
    );
}

#[test]
fn soft_delete_and_restore_mark_the_column() {
    let deleted = pg()
        .soft_delete("Post")
        .unwrap()
        .where_sql("id = 1")
        .finalize()
        .unwrap();
    assert_eq!(
        deleted.sql,
        "UPDATE \"posts\" SET \"deleted_at\" = CURRENT_TIMESTAMP WHERE id = 1"
    );

    let restored = pg()
        .restore("Post")
        .unwrap()
        .where_sql("id = 1")
        .finalize()
        .unwrap();
    assert_eq!(
        restored.sql,
        "UPDATE \"posts\" SET \"deleted_at\" = NULL WHERE id = 1"
    );

    let err = pg().soft_delete("User").unwrap().finalize().unwrap_err();
    assert!(err.is_configuration());
}

#[test]
fn delete_with_output_on_mssql() {
    let query = mssql()
        .delete_from("User")
        .unwrap()
        .returning(["*"])
        .where_params("id = :id", [("id", 3i64)])
        .finalize()
        .unwrap();
    assert_eq!(
        query.sql,
        "DELETE FROM [users] OUTPUT DELETED.* WHERE id = @p1"
    );
    assert_eq!(query.values, vec![Value::Int(3)]);
}

#[test]
fn many_to_many_attach_and_detach() {
    let attach = pg()
        .relation("User", "groups")
        .unwrap()
        .of([1i64])
        .unwrap()
        .add_relation([2i64, 3i64])
        .unwrap()
        .finalize()
        .unwrap();
    assert_eq!(
        attach.sql,
        "INSERT INTO \"user_groups\"(\"user_id\", \"group_id\") VALUES ($1, $2), ($3, $4)"
    );
    assert_eq!(
        attach.values,
        vec![Value::Int(1), Value::Int(2), Value::Int(1), Value::Int(3)]
    );

    let detach = pg()
        .relation("User", "groups")
        .unwrap()
        .of([1i64])
        .unwrap()
        .remove_relation([2i64])
        .unwrap()
        .finalize()
        .unwrap();
    assert_eq!(
        detach.sql,
        "DELETE FROM \"user_groups\" WHERE \"user_id\" IN ($1) AND \"group_id\" IN ($2)"
    );
}

#[test]
fn to_one_set_and_clear() {
    let set = pg()
        .relation("Photo", "owner")
        .unwrap()
        .of([5i64])
        .unwrap()
        .set_relation(Some(Value::Int(1)))
        .unwrap()
        .finalize()
        .unwrap();
    assert_eq!(
        set.sql,
        "UPDATE \"photos\" SET \"user_id\" = $1 WHERE \"id\" IN ($2)"
    );

    let clear = pg()
        .relation("Photo", "owner")
        .unwrap()
        .of([5i64])
        .unwrap()
        .set_relation(None)
        .unwrap()
        .finalize()
        .unwrap();
    assert_eq!(
        clear.sql,
        "UPDATE \"photos\" SET \"user_id\" = NULL WHERE \"id\" IN ($1)"
    );
}

#[test]
fn one_to_many_attach_updates_child_foreign_key() {
    let query = pg()
        .relation("User", "photos")
        .unwrap()
        .of([1i64])
        .unwrap()
        .add_relation([10i64, 11i64])
        .unwrap()
        .finalize()
        .unwrap();
    assert_eq!(
        query.sql,
        "UPDATE \"photos\" SET \"user_id\" = $1 WHERE \"id\" IN ($2, $3)"
    );
}

#[test]
fn invalid_relation_operation_rejected() {
    let err = pg()
        .relation("User", "photos")
        .unwrap()
        .of([1i64])
        .unwrap()
        .set_relation(Some(Value::Int(2)))
        .unwrap()
        .finalize()
        .unwrap_err();
    assert!(err.is_configuration());
}

#[test]
fn cte_shares_parameter_numbering_with_outer_query() {
    let query = pg()
        .from("User", "user")
        .unwrap()
        .select("user.id")
        .with_raw("active", "SELECT id FROM users WHERE active = :flag")
        .set_parameter("flag", true)
        .where_params("user.id = :id", [("id", 1i64)])
        .finalize()
        .unwrap();
    assert_eq!(
        query.sql,
        "WITH \"active\" AS (SELECT id FROM users WHERE active = $1) \
         SELECT \"user\".\"id\" FROM \"users\" \"user\" WHERE user.id = $2"
    );
    assert_eq!(query.values, vec![Value::Bool(true), Value::Int(1)]);
}

#[test]
fn recursive_cte_uses_the_recursive_keyword() {
    let query = pg()
        .from("User", "user")
        .unwrap()
        .select("user.id")
        .with_cte(CteSpec {
            name: "tree".to_string(),
            columns: vec!["id".to_string()],
            body: CteBody::Raw("SELECT 1".to_string()),
            recursive: true,
            materialized: None,
        })
        .finalize()
        .unwrap();
    assert!(query.sql.starts_with("WITH RECURSIVE \"tree\"(\"id\") AS (SELECT 1)"));
}

#[test]
fn nested_map_cte_is_emitted_recursively() {
    let inner = pg().from("Group", "grp").unwrap().select("grp.id");
    let query = pg()
        .from("User", "user")
        .unwrap()
        .select("user.id")
        .with_query("grp_ids", inner)
        .finalize()
        .unwrap();
    assert_eq!(
        query.sql,
        "WITH \"grp_ids\" AS (SELECT \"grp\".\"id\" FROM \"groups\" \"grp\") \
         SELECT \"user\".\"id\" FROM \"users\" \"user\""
    );
}

#[test]
fn lock_suffix_and_full_join_rejection() {
    let query = pg()
        .from("User", "user")
        .unwrap()
        .select("user.id")
        .lock(LockMode::PessimisticWrite)
        .on_locked(OnLocked::SkipLocked)
        .finalize()
        .unwrap();
    assert!(query.sql.ends_with("FOR UPDATE SKIP LOCKED"));

    let err = pg()
        .from("User", "user")
        .unwrap()
        .select("user.id")
        .full_join("audit", "a", "a.user_id = user.id")
        .unwrap()
        .lock(LockMode::PessimisticRead)
        .finalize()
        .unwrap_err();
    assert!(err.is_unsupported());
}

#[test]
fn dirty_read_renders_as_table_hint_on_mssql() {
    let query = mssql()
        .from("User", "user")
        .unwrap()
        .select("user.id")
        .lock(LockMode::DirtyRead)
        .finalize()
        .unwrap();
    assert_eq!(
        query.sql,
        "SELECT [user].[id] FROM [users] [user] WITH (NOLOCK)"
    );
}

#[test]
fn time_travel_only_where_supported() {
    let on_crdb = crdb()
        .from("User", "user")
        .unwrap()
        .select("user.id")
        .time_travel(TimeTravel::FollowerReadTimestamp)
        .finalize()
        .unwrap();
    assert_eq!(
        on_crdb.sql,
        "SELECT \"user\".\"id\" FROM \"users\" \"user\" \
         AS OF SYSTEM TIME follower_read_timestamp()"
    );

    let on_pg = pg()
        .from("User", "user")
        .unwrap()
        .select("user.id")
        .time_travel(TimeTravel::FollowerReadTimestamp)
        .finalize()
        .unwrap();
    assert_eq!(on_pg.sql, "SELECT \"user\".\"id\" FROM \"users\" \"user\"");
}

#[test]
fn distinct_on_requires_support() {
    let on_pg = pg()
        .from("User", "user")
        .unwrap()
        .select("user.id")
        .distinct_on(["user.firstName"])
        .finalize()
        .unwrap();
    assert!(on_pg.sql.starts_with("SELECT DISTINCT ON (\"user\".\"first_name\")"));

    let err = mysql()
        .from("User", "user")
        .unwrap()
        .select("user.id")
        .distinct_on(["user.firstName"])
        .finalize()
        .unwrap_err();
    assert!(err.is_unsupported());
}

#[test]
fn mssql_pagination_uses_offset_fetch() {
    let query = mssql()
        .from("User", "user")
        .unwrap()
        .select("user.id")
        .order_by("user.id", OrderDirection::Asc)
        .limit(10u64)
        .offset(20u64)
        .finalize()
        .unwrap();
    assert!(query.sql.ends_with("ORDER BY [user].[id] ASC OFFSET 20 ROWS FETCH NEXT 10 ROWS ONLY"));
}

#[test]
fn comment_is_prepended_and_sanitized() {
    let query = pg()
        .from("User", "user")
        .unwrap()
        .select("user.id")
        .comment("users */ drop")
        .finalize()
        .unwrap();
    assert!(query.sql.starts_with("/* users  drop */ SELECT"));
}

#[test]
fn mysql_hints_are_rendered() {
    let query = mysql()
        .from("User", "user")
        .unwrap()
        .select("user.id")
        .use_index("idx_users_name")
        .max_execution_time(500)
        .finalize()
        .unwrap();
    assert_eq!(
        query.sql,
        "SELECT /*+ MAX_EXECUTION_TIME(500) */ `user`.`id` \
         FROM `users` `user` USE INDEX (idx_users_name)"
    );
}

#[test]
fn cross_variant_options_are_rejected() {
    let err = pg()
        .from("User", "user")
        .unwrap()
        .select("user.id")
        .returning(["id"])
        .finalize()
        .unwrap_err();
    assert!(err.is_configuration());

    let err = pg()
        .update("User")
        .unwrap()
        .set("firstName", "x")
        .unwrap()
        .lock(LockMode::PessimisticWrite)
        .finalize()
        .unwrap_err();
    assert!(err.is_configuration());

    let err = pg()
        .delete_from("User")
        .unwrap()
        .take(5u64)
        .finalize()
        .unwrap_err();
    assert!(err.is_configuration());
}
