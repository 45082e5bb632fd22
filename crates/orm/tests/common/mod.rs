//! Shared fixtures for the integration tests.
//!
//! - [`TestModel`] / [`Profile`] - entities used across the suites
//! - [`sqlite_db`] - a real in-memory SQLite store with the tables created
//! - [`RecordingConnection`] - a driver double that records statements and
//!   replays canned rows
//! - [`MockResolver`] / [`MockConnector`] - replica discovery doubles

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use quarry_orm::backends::sqlite::SqliteConnection;
use quarry_orm::dialect::SqliteDialect;
use quarry_orm::error::{ConnectivityError, OrmResult, TransactionError};
use quarry_orm::replica::{Connector, HostResolver};
use quarry_orm::session::{CallOptions, DriverTransaction, ExecResult, Rows};
use quarry_orm::{Connection, Db, Entity, Value};

/// The entity most suites use.
#[derive(Debug, Clone, Default, PartialEq, Entity)]
pub struct TestModel {
    pub id: i64,
    pub first_name: String,
    pub age: i8,
}

impl TestModel {
    pub fn new(id: i64, first_name: &str, age: i8) -> Self {
        Self {
            id,
            first_name: first_name.to_string(),
            age,
        }
    }
}

/// An entity with nullable fields and a tagged field.
#[derive(Debug, Clone, Default, PartialEq, Entity)]
pub struct Profile {
    pub id: i64,
    #[orm(tag = "nick")]
    pub nick_name: Option<String>,
    pub score: Option<f64>,
    pub active: bool,
}

pub const TEST_MODEL_SCHEMA: &str = "CREATE TABLE test_model (
    id INTEGER PRIMARY KEY,
    first_name TEXT NOT NULL,
    age INTEGER NOT NULL
)";

pub const PROFILE_SCHEMA: &str = "CREATE TABLE profile (
    id INTEGER PRIMARY KEY,
    nick_name TEXT,
    score REAL,
    active INTEGER NOT NULL
)";

/// An in-memory SQLite database holding both fixture tables.
pub fn sqlite_connection() -> Arc<SqliteConnection> {
    let conn = SqliteConnection::in_memory("primary").expect("Failed to create SQLite database");
    conn.execute_batch(TEST_MODEL_SCHEMA)
        .expect("Failed to create test_model");
    conn.execute_batch(PROFILE_SCHEMA)
        .expect("Failed to create profile");
    Arc::new(conn)
}

/// A [`Db`] over [`sqlite_connection`] using the SQLite dialect.
pub fn sqlite_db() -> Db {
    Db::builder(sqlite_connection())
        .dialect(Arc::new(SqliteDialect))
        .build()
}

/// A [`Db`] over a [`RecordingConnection`] with the default (MySQL) dialect.
pub fn recording_db() -> (Db, Arc<RecordingConnection>) {
    let conn = Arc::new(RecordingConnection::new("primary"));
    (Db::builder(conn.clone()).build(), conn)
}

/// A statement seen by a [`RecordingConnection`].
#[derive(Debug, Clone, PartialEq)]
pub struct Recorded {
    pub sql: String,
    pub args: Vec<Value>,
    pub options: CallOptions,
}

/// Records every statement and answers reads with canned rows.
#[derive(Debug)]
pub struct RecordingConnection {
    name: String,
    rows: Mutex<Rows>,
    delay: Mutex<Option<Duration>>,
    rollback_failure: Arc<Mutex<Option<String>>>,
    log: Arc<Mutex<Vec<Recorded>>>,
}

impl RecordingConnection {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            rows: Mutex::new(Rows::default()),
            delay: Mutex::new(None),
            rollback_failure: Arc::new(Mutex::new(None)),
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Rows returned by every read from now on.
    pub fn set_rows(&self, rows: Rows) {
        *self.rows.lock() = rows;
    }

    /// Makes every call sleep first.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    /// Makes every transaction rollback fail with `message`.
    pub fn fail_rollback(&self, message: &str) {
        *self.rollback_failure.lock() = Some(message.to_string());
    }

    pub fn recorded(&self) -> Vec<Recorded> {
        self.log.lock().clone()
    }

    pub fn sql(&self) -> Vec<String> {
        self.log.lock().iter().map(|r| r.sql.clone()).collect()
    }

    fn record(&self, sql: &str, args: &[Value], options: &CallOptions) {
        self.log.lock().push(Recorded {
            sql: sql.to_string(),
            args: args.to_vec(),
            options: *options,
        });
    }

    async fn pause(&self) {
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl Connection for RecordingConnection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn query(&self, sql: &str, args: &[Value], options: &CallOptions) -> OrmResult<Rows> {
        self.pause().await;
        self.record(sql, args, options);
        Ok(self.rows.lock().clone())
    }

    async fn exec(
        &self,
        sql: &str,
        args: &[Value],
        options: &CallOptions,
    ) -> OrmResult<ExecResult> {
        self.pause().await;
        self.record(sql, args, options);
        Ok(ExecResult {
            rows_affected: 1,
            last_insert_id: None,
        })
    }

    async fn begin(&self) -> OrmResult<Box<dyn DriverTransaction>> {
        Ok(Box::new(RecordingTx {
            log: self.log.clone(),
            active: Mutex::new(true),
            rollback_failure: self.rollback_failure.clone(),
        }))
    }
}

struct RecordingTx {
    log: Arc<Mutex<Vec<Recorded>>>,
    active: Mutex<bool>,
    rollback_failure: Arc<Mutex<Option<String>>>,
}

#[async_trait]
impl DriverTransaction for RecordingTx {
    async fn query(&self, sql: &str, args: &[Value]) -> OrmResult<Rows> {
        self.exec(sql, args).await?;
        Ok(Rows::default())
    }

    async fn exec(&self, sql: &str, args: &[Value]) -> OrmResult<ExecResult> {
        if !*self.active.lock() {
            return Err(TransactionError::InvalidTransaction.into());
        }
        self.log.lock().push(Recorded {
            sql: sql.to_string(),
            args: args.to_vec(),
            options: CallOptions::default(),
        });
        Ok(ExecResult::default())
    }

    async fn commit(&self) -> OrmResult<()> {
        *self.active.lock() = false;
        self.log.lock().push(Recorded {
            sql: "COMMIT".to_string(),
            args: vec![],
            options: CallOptions::default(),
        });
        Ok(())
    }

    async fn rollback(&self) -> OrmResult<()> {
        *self.active.lock() = false;
        self.log.lock().push(Recorded {
            sql: "ROLLBACK".to_string(),
            args: vec![],
            options: CallOptions::default(),
        });
        match self.rollback_failure.lock().clone() {
            Some(message) => Err(ConnectivityError::QueryFailed { message }.into()),
            None => Ok(()),
        }
    }
}

/// `10.0.0.<n>`
pub fn ip(n: u8) -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(10, 0, 0, n))
}

/// A resolver with a settable answer.
#[derive(Debug)]
pub struct MockResolver {
    answer: Mutex<Result<Vec<IpAddr>, String>>,
    delay: Mutex<Option<Duration>>,
    calls: AtomicUsize,
}

impl MockResolver {
    pub fn new(ips: Vec<IpAddr>) -> Arc<Self> {
        Arc::new(Self {
            answer: Mutex::new(Ok(ips)),
            delay: Mutex::new(None),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn set(&self, ips: Vec<IpAddr>) {
        *self.answer.lock() = Ok(ips);
    }

    pub fn fail(&self, message: &str) {
        *self.answer.lock() = Err(message.to_string());
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HostResolver for MockResolver {
    async fn resolve(&self, domain: &str, _port: u16) -> OrmResult<Vec<IpAddr>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let answer = self.answer.lock().clone();
        answer.map_err(|message| {
            ConnectivityError::Resolution {
                domain: domain.to_string(),
                message,
            }
            .into()
        })
    }
}

/// Opens a [`RecordingConnection`] per DSN and remembers it.
#[derive(Debug, Default)]
pub struct MockConnector {
    opened: Mutex<HashMap<String, Arc<RecordingConnection>>>,
    connects: AtomicUsize,
}

impl MockConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// The connection opened for `dsn`.
    pub fn get(&self, dsn: &str) -> Arc<RecordingConnection> {
        self.opened
            .lock()
            .get(dsn)
            .cloned()
            .unwrap_or_else(|| panic!("no connection opened for {dsn}"))
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, _name: &str, dsn: &str) -> OrmResult<Arc<dyn Connection>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let conn = Arc::new(RecordingConnection::new(dsn));
        self.opened.lock().insert(dsn.to_string(), conn.clone());
        Ok(conn)
    }
}
