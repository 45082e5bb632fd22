//! Transaction tests.

mod common;

use common::*;
use quarry_orm::error::{ConnectivityError, OrmError, QueryError, TransactionError};
use quarry_orm::expr::col;
use quarry_orm::{Session, Value};

#[tokio::test]
async fn test_commit_on_success() {
    let db = sqlite_db();

    let inserted = db
        .transaction(|tx| {
            Box::pin(async move {
                let result = tx
                    .insert::<TestModel>()
                    .values([TestModel::new(1, "Tom", 18), TestModel::new(2, "Jerry", 20)])
                    .exec()
                    .await?;
                // Reads inside the transaction see its own writes.
                let seen = tx.select::<TestModel>().get_multi().await?;
                assert_eq!(seen.len(), 2);
                Ok::<_, OrmError>(result.rows_affected)
            })
        })
        .await
        .unwrap();
    assert_eq!(inserted, 2);

    let rows = db.select::<TestModel>().get_multi().await.unwrap();
    assert_eq!(rows.len(), 2);
}

#[tokio::test]
async fn test_rollback_on_error_keeps_cause() {
    let db = sqlite_db();

    let err = db
        .transaction(|tx| {
            Box::pin(async move {
                tx.insert::<TestModel>()
                    .values([TestModel::new(1, "Tom", 18)])
                    .exec()
                    .await?;
                tx.select::<TestModel>()
                    .where_([col("Invalid").eq(1)])
                    .get()
                    .await?;
                Ok::<_, OrmError>(())
            })
        })
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        OrmError::Query(QueryError::IllegalField { .. })
    ));

    assert!(
        db.select::<TestModel>()
            .get_multi()
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn test_panic_rolls_back() {
    let db = sqlite_db();

    let err = db
        .transaction(|tx| {
            Box::pin(async move {
                tx.insert::<TestModel>()
                    .values([TestModel::new(1, "Tom", 18)])
                    .exec()
                    .await?;
                if tx.core().default_timeout().is_none() {
                    panic!("lost the plot");
                }
                Ok::<_, OrmError>(())
            })
        })
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        OrmError::Transaction(TransactionError::Panicked { ref message }) if message == "lost the plot"
    ));

    assert!(
        db.select::<TestModel>()
            .get_multi()
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn test_nested_transaction_reuses_outer() {
    let (db, conn) = recording_db();

    db.transaction(|tx| {
        Box::pin(async move {
            tx.insert::<TestModel>()
                .values([TestModel::new(1, "Tom", 18)])
                .exec()
                .await?;
            tx.transaction(|inner| {
                Box::pin(async move {
                    inner
                        .delete::<TestModel>()
                        .where_([col("id").eq(2)])
                        .exec()
                        .await?;
                    Ok::<_, OrmError>(())
                })
            })
            .await?;
            Ok::<_, OrmError>(())
        })
    })
    .await
    .unwrap();

    // One commit, issued by the outermost transaction only.
    assert_eq!(conn.sql(), vec![
        "INSERT INTO `test_model`(`id`,`first_name`,`age`) VALUES(?,?,?);".to_string(),
        "DELETE FROM `test_model` WHERE `id` = ?;".to_string(),
        "COMMIT".to_string(),
    ]);
}

#[tokio::test]
async fn test_failed_inner_call_rolls_back_outer() {
    let (db, conn) = recording_db();

    let err = db
        .transaction(|tx| {
            Box::pin(async move {
                tx.transaction(|inner| {
                    Box::pin(async move {
                        inner.insert::<TestModel>().values(Vec::new()).exec().await?;
                        Ok::<_, OrmError>(())
                    })
                })
                .await
            })
        })
        .await
        .unwrap_err();
    assert!(matches!(err, OrmError::Query(QueryError::ZeroRows)));
    assert_eq!(conn.sql(), vec!["ROLLBACK".to_string()]);
}

#[tokio::test]
async fn test_failed_rollback_keeps_task_error() {
    let (db, conn) = recording_db();
    conn.fail_rollback("connection reset");

    let err = db
        .transaction(|tx| {
            Box::pin(async move {
                tx.insert::<TestModel>().values(Vec::new()).exec().await?;
                Ok::<_, OrmError>(())
            })
        })
        .await
        .unwrap_err();

    match err {
        OrmError::Transaction(TransactionError::RollbackFailed { cause, rollback }) => {
            assert!(matches!(*cause, OrmError::Query(QueryError::ZeroRows)));
            assert!(matches!(
                *rollback,
                OrmError::Connectivity(ConnectivityError::QueryFailed { ref message })
                    if message == "connection reset"
            ));
        }
        other => panic!("expected a rollback failure, got {other}"),
    }
    assert_eq!(conn.sql(), vec!["ROLLBACK".to_string()]);
}

#[tokio::test]
async fn test_failed_rollback_after_panic_keeps_panic() {
    let (db, conn) = recording_db();
    conn.fail_rollback("connection reset");

    let err = db
        .transaction(|tx| {
            Box::pin(async move {
                if tx.core().default_timeout().is_none() {
                    panic!("lost the plot");
                }
                Ok::<_, OrmError>(())
            })
        })
        .await
        .unwrap_err();

    match err {
        OrmError::Transaction(TransactionError::RollbackFailed { cause, rollback }) => {
            assert!(matches!(
                *cause,
                OrmError::Transaction(TransactionError::Panicked { ref message })
                    if message == "lost the plot"
            ));
            assert!(matches!(
                *rollback,
                OrmError::Connectivity(ConnectivityError::QueryFailed { .. })
            ));
        }
        other => panic!("expected a rollback failure, got {other}"),
    }
    assert_eq!(conn.sql(), vec!["ROLLBACK".to_string()]);
}

#[tokio::test]
async fn test_explicit_begin_and_commit() {
    let db = sqlite_db();

    let tx = db.begin().await.unwrap();
    tx.raw::<TestModel>(
        "INSERT INTO test_model (id, first_name, age) VALUES (?, ?, ?)",
        vec![Value::Int(5), Value::from("Tyke"), Value::Int(2)],
    )
    .exec()
    .await
    .unwrap();
    tx.commit().await.unwrap();

    let tyke = db
        .select::<TestModel>()
        .where_([col("id").eq(5)])
        .get()
        .await
        .unwrap();
    assert_eq!(tyke.first_name, "Tyke");
}

#[tokio::test]
async fn test_explicit_rollback() {
    let db = sqlite_db();

    let tx = db.begin().await.unwrap();
    tx.insert::<TestModel>()
        .values([TestModel::new(1, "Tom", 18)])
        .exec()
        .await
        .unwrap();
    tx.rollback().await.unwrap();

    assert!(
        db.select::<TestModel>()
            .get_multi()
            .await
            .unwrap()
            .is_empty()
    );
}
