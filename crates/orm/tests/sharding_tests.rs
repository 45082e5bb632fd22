//! Sharded select tests.

mod common;

use std::sync::Arc;

use common::*;
use quarry_orm::error::{OrmError, QueryError};
use quarry_orm::expr::{asc, col, not};
use quarry_orm::session::Rows;
use quarry_orm::sharding::{DataSource, HashSharding, Pattern};
use quarry_orm::{Db, Value};

fn scheme() -> Arc<HashSharding> {
    Arc::new(
        HashSharding::new(
            "id",
            Pattern::sharded("order_db", 2),
            Pattern::sharded("order_tab", 3),
        )
        .unwrap(),
    )
}

fn sharded_db() -> (Db, Arc<RecordingConnection>, Arc<RecordingConnection>) {
    let primary = Arc::new(RecordingConnection::new("primary"));
    let shard0 = Arc::new(RecordingConnection::new("order_db_0"));
    let db = Db::builder(primary.clone())
        .sharding(scheme())
        .shard("order_db_0", shard0.clone())
        .build();
    (db, primary, shard0)
}

fn one_row(id: i64, name: &str) -> Rows {
    Rows::new(
        vec!["id".to_string(), "first_name".to_string(), "age".to_string()],
        vec![vec![Value::Int(id), Value::from(name), Value::Int(30)]],
    )
}

#[test]
fn test_eq_on_key_targets_one_shard() {
    let (db, _, _) = sharded_db();
    let statements = db
        .sharded_select::<TestModel>()
        .where_([col("id").eq(5)])
        .build()
        .unwrap();
    assert_eq!(statements.len(), 1);

    let (target, query) = &statements[0];
    assert_eq!(target, &DataSource::new("order_db_1", "order_tab_2"));
    assert_eq!(
        query.sql(),
        "SELECT * FROM `order_db_1`.`order_tab_2` WHERE `id` = ?;"
    );
    assert_eq!(query.args(), [Value::Int(5)]);
}

#[test]
fn test_or_unions_targets() {
    let (db, _, _) = sharded_db();
    let statements = db
        .sharded_select::<TestModel>()
        .where_([col("id").eq(1).or(col("id").eq(2))])
        .build()
        .unwrap();
    let targets: Vec<_> = statements.iter().map(|(t, _)| t.to_string()).collect();
    assert_eq!(targets, vec![
        "`order_db_0`.`order_tab_2`",
        "`order_db_1`.`order_tab_1`"
    ]);
}

#[test]
fn test_unprunable_predicates_broadcast_with_own_args() {
    let (db, _, _) = sharded_db();

    for predicate in [col("age").gt(18), col("id").gt(18), not(col("id").eq(18))] {
        let statements = db
            .sharded_select::<TestModel>()
            .where_([predicate])
            .build()
            .unwrap();
        assert_eq!(statements.len(), 6);
        for (_, query) in &statements {
            assert_eq!(query.args(), [Value::Int(18)]);
        }
    }

    let statements = db
        .sharded_select::<TestModel>()
        .order_by([asc("id")])
        .limit(10)
        .build()
        .unwrap();
    assert_eq!(statements.len(), 6);
    assert_eq!(
        statements[0].1.sql(),
        "SELECT * FROM `order_db_0`.`order_tab_0` ORDER BY `id` ASC LIMIT ?;"
    );
}

#[test]
fn test_disjoint_and_has_no_data_source() {
    let (db, _, _) = sharded_db();
    let err = db
        .sharded_select::<TestModel>()
        .where_([col("id").eq(1), col("id").eq(2)])
        .build()
        .unwrap_err();
    assert!(matches!(err, OrmError::Query(QueryError::NoDataSource)));
}

#[test]
fn test_requires_algorithm() {
    let (db, _) = recording_db();
    let err = db.sharded_select::<TestModel>().build().unwrap_err();
    assert!(matches!(err, OrmError::Query(QueryError::NoShardingAlgorithm)));
}

#[test]
fn test_unknown_key_field() {
    let (db, _, _) = sharded_db();
    let err = db
        .sharded_select::<TestModel>()
        .where_([col("Invalid").eq(1)])
        .build()
        .unwrap_err();
    assert!(err.is_query_error());
}

#[tokio::test]
async fn test_get_multi_runs_on_shard_connections() {
    let (db, primary, shard0) = sharded_db();
    shard0.set_rows(one_row(2, "from shard"));
    primary.set_rows(one_row(3, "from primary"));

    let found = db
        .sharded_select::<TestModel>()
        .where_([col("id").eq(2).or(col("id").eq(3))])
        .get_multi()
        .await
        .unwrap();

    // order_db_0 has its own connection, order_db_1 falls back to the primary.
    assert_eq!(shard0.sql(), vec![
        "SELECT * FROM `order_db_0`.`order_tab_2` WHERE (`id` = ?) OR (`id` = ?);".to_string()
    ]);
    assert_eq!(primary.sql(), vec![
        "SELECT * FROM `order_db_1`.`order_tab_0` WHERE (`id` = ?) OR (`id` = ?);".to_string()
    ]);
    assert_eq!(found, vec![
        TestModel {
            id: 2,
            first_name: "from shard".to_string(),
            age: 30
        },
        TestModel {
            id: 3,
            first_name: "from primary".to_string(),
            age: 30
        },
    ]);
}

#[tokio::test]
async fn test_broadcast_concatenates_in_target_order() {
    let (db, primary, shard0) = sharded_db();
    shard0.set_rows(one_row(0, "zero"));
    primary.set_rows(one_row(1, "one"));

    let found = db.sharded_select::<TestModel>().get_multi().await.unwrap();
    let names: Vec<_> = found.iter().map(|m| m.first_name.as_str()).collect();
    assert_eq!(names, vec!["zero", "zero", "zero", "one", "one", "one"]);
    assert_eq!(shard0.recorded().len(), 3);
    assert_eq!(primary.recorded().len(), 3);
}
