//! Replica discovery and read routing tests.
//!
//! Time is paused so background refreshes fire deterministically.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use quarry_orm::config::ReplicaConfig;
use quarry_orm::error::{ConnectivityError, OrmError};
use quarry_orm::replica::{ReplicaSelector, ReplicaSelectorConfig};
use quarry_orm::{Connection, Db, OrmConfig, Session};

const DSN: &str = "app:secret@tcp(replicas.internal:3306)/orders?timeout=1s";

fn replica_dsn(n: u8) -> String {
    format!("app:secret@tcp(10.0.0.{n}:3306)/orders?timeout=1s")
}

async fn start(
    resolver: &Arc<MockResolver>,
    connector: &Arc<MockConnector>,
) -> Arc<ReplicaSelector> {
    ReplicaSelector::start(
        DSN,
        ReplicaSelectorConfig::default(),
        resolver.clone(),
        connector.clone(),
    )
    .await
    .unwrap()
}

fn names(selector: &ReplicaSelector) -> Vec<String> {
    selector
        .snapshot()
        .replicas
        .iter()
        .map(|r| r.dsn.clone())
        .collect()
}

#[tokio::test(start_paused = true)]
async fn test_initial_resolution() {
    let resolver = MockResolver::new(vec![ip(1), ip(2), ip(3)]);
    let connector = MockConnector::new();
    let selector = start(&resolver, &connector).await;

    let set = selector.snapshot();
    assert_eq!(set.domain, "replicas.internal");
    assert_eq!(names(&selector), vec![
        replica_dsn(1),
        replica_dsn(2),
        replica_dsn(3)
    ]);
    assert_eq!(set.replicas[0].name, "replica_0");
    assert_eq!(connector.connects(), 3);
    selector.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_round_robin_starts_after_first() {
    let resolver = MockResolver::new(vec![ip(1), ip(2), ip(3)]);
    let connector = MockConnector::new();
    let selector = start(&resolver, &connector).await;

    let picked: Vec<String> = (0..4)
        .map(|_| selector.next().unwrap().name().to_string())
        .collect();
    assert_eq!(picked, vec![
        replica_dsn(2),
        replica_dsn(3),
        replica_dsn(1),
        replica_dsn(2)
    ]);

    assert!(selector.pick(true).is_none());
    selector.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_background_refresh_swaps_list() {
    let resolver = MockResolver::new(vec![ip(1), ip(2)]);
    let connector = MockConnector::new();
    let selector = start(&resolver, &connector).await;
    let first = selector.snapshot();

    resolver.set(vec![ip(2), ip(4)]);
    tokio::time::sleep(Duration::from_millis(1100)).await;

    assert_eq!(names(&selector), vec![replica_dsn(2), replica_dsn(4)]);
    // The unchanged address keeps its connection; only the new one is opened.
    assert_eq!(connector.connects(), 3);
    assert!(Arc::ptr_eq(
        &first.replicas[1].connection,
        &selector.snapshot().replicas[0].connection
    ));
    // Readers holding the old list still see it whole.
    assert_eq!(first.replicas.len(), 2);
    assert_eq!(first.replicas[0].dsn, replica_dsn(1));
    selector.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_failed_refresh_keeps_previous_list() {
    let resolver = MockResolver::new(vec![ip(1), ip(2)]);
    let connector = MockConnector::new();
    let selector = start(&resolver, &connector).await;

    resolver.fail("no such host");
    tokio::time::sleep(Duration::from_millis(2500)).await;

    assert!(resolver.calls() >= 3);
    assert_eq!(names(&selector), vec![replica_dsn(1), replica_dsn(2)]);
    assert!(selector.next().is_some());

    let err = selector.refresh().await.unwrap_err();
    assert!(matches!(
        err,
        OrmError::Connectivity(ConnectivityError::Resolution { ref domain, .. })
            if domain == "replicas.internal"
    ));
    selector.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_slow_resolution_times_out() {
    let resolver = MockResolver::new(vec![ip(1)]);
    let connector = MockConnector::new();
    let selector = start(&resolver, &connector).await;
    selector.shutdown().await;

    resolver.set_delay(Duration::from_secs(5));
    resolver.set(vec![ip(7)]);
    let err = selector.refresh().await.unwrap_err();
    assert!(err.is_timeout());
    assert_eq!(names(&selector), vec![replica_dsn(1)]);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_refresh_and_is_idempotent() {
    let resolver = MockResolver::new(vec![ip(1)]);
    let connector = MockConnector::new();
    let selector = start(&resolver, &connector).await;
    assert!(!selector.is_shut_down());

    selector.shutdown().await;
    selector.shutdown().await;
    assert!(selector.is_shut_down());

    let calls = resolver.calls();
    resolver.set(vec![ip(5)]);
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(resolver.calls(), calls);
    assert_eq!(names(&selector), vec![replica_dsn(1)]);
}

#[tokio::test(start_paused = true)]
async fn test_initial_failure_is_fatal() {
    let resolver = MockResolver::new(vec![]);
    resolver.fail("no such host");
    let connector = MockConnector::new();

    let err = ReplicaSelector::start(
        DSN,
        ReplicaSelectorConfig::default(),
        resolver.clone(),
        connector.clone(),
    )
    .await
    .unwrap_err();
    assert!(matches!(
        err,
        OrmError::Connectivity(ConnectivityError::Resolution { .. })
    ));
    assert_eq!(connector.connects(), 0);

    let err = ReplicaSelector::start(
        "replicas.internal:3306",
        ReplicaSelectorConfig::default(),
        MockResolver::new(vec![ip(1)]),
        connector,
    )
    .await
    .unwrap_err();
    assert!(matches!(
        err,
        OrmError::Connectivity(ConnectivityError::InvalidDsn { .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn test_reads_go_to_replicas_writes_to_primary() {
    let resolver = MockResolver::new(vec![ip(1), ip(2)]);
    let connector = MockConnector::new();
    let selector = start(&resolver, &connector).await;

    let primary = Arc::new(RecordingConnection::new("primary"));
    let db = Db::builder(primary.clone()).replicas(selector).build();

    db.select::<TestModel>().get_multi().await.unwrap();
    db.select::<TestModel>().get_multi().await.unwrap();
    db.select::<TestModel>().use_primary().get_multi().await.unwrap();
    db.insert::<TestModel>()
        .values([TestModel::new(1, "Tom", 18)])
        .exec()
        .await
        .unwrap();

    assert_eq!(connector.get(&replica_dsn(2)).recorded().len(), 1);
    assert_eq!(connector.get(&replica_dsn(1)).recorded().len(), 1);
    assert_eq!(primary.sql(), vec![
        "SELECT * FROM `test_model`;".to_string(),
        "INSERT INTO `test_model`(`id`,`first_name`,`age`) VALUES(?,?,?);".to_string(),
    ]);

    db.close().await;
    assert!(db.replicas().unwrap().is_shut_down());
}

#[tokio::test(start_paused = true)]
async fn test_empty_replica_list_reads_from_primary() {
    let resolver = MockResolver::new(vec![]);
    let connector = MockConnector::new();
    let selector = start(&resolver, &connector).await;
    assert!(selector.next().is_none());

    let primary = Arc::new(RecordingConnection::new("primary"));
    let db = Db::builder(primary.clone()).replicas(selector).build();
    db.select::<TestModel>().get_multi().await.unwrap();
    assert_eq!(primary.recorded().len(), 1);
    db.close().await;
}

#[tokio::test(start_paused = true)]
async fn test_open_from_config() {
    let mut config = OrmConfig::new("primary.internal:3306");
    config.replicas = Some(ReplicaConfig {
        dsn: DSN.to_string(),
        interval: Duration::from_secs(1),
        timeout: Duration::from_secs(1),
    });

    let resolver = MockResolver::new(vec![ip(9)]);
    let connector = MockConnector::new();
    let db = Db::open_with_resolver(&config, connector.clone(), resolver.clone())
        .await
        .unwrap();

    db.select::<TestModel>().get_multi().await.unwrap();
    assert_eq!(connector.get(&replica_dsn(9)).recorded().len(), 1);
    assert!(connector.get("primary.internal:3306").recorded().is_empty());
    db.close().await;
}
