//! SQLite connection implementation.

use std::fmt::Debug;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::OpenFlags;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ConnectivityError, OrmError, OrmResult};
use crate::replica::Connector;
use crate::session::{CallOptions, Connection, DriverTransaction, ExecResult, Rows};
use crate::value::Value;

use super::transaction::SqliteTransaction;

/// A pooled SQLite database.
pub struct SqliteConnection {
    name: String,
    pool: Pool<SqliteConnectionManager>,
    config: SqliteConfig,
    is_memory: bool,
    /// Holds a shared-cache memory database open while the pool is idle.
    _keep_alive: Option<Mutex<rusqlite::Connection>>,
}

impl Debug for SqliteConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteConnection")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("is_memory", &self.is_memory)
            .finish_non_exhaustive()
    }
}

/// Configuration for the SQLite driver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqliteConfig {
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of idle connections.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection timeout in milliseconds.
    #[serde(default = "default_connection_timeout_ms")]
    pub connection_timeout_ms: u64,

    /// SQLite busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u32,

    /// Enable foreign key constraints.
    #[serde(default = "default_true")]
    pub enable_foreign_keys: bool,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

fn default_connection_timeout_ms() -> u64 {
    30000
}

fn default_busy_timeout_ms() -> u32 {
    5000
}

fn default_true() -> bool {
    true
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connection_timeout_ms: default_connection_timeout_ms(),
            busy_timeout_ms: default_busy_timeout_ms(),
            enable_foreign_keys: true,
        }
    }
}

fn memory_flags() -> OpenFlags {
    OpenFlags::SQLITE_OPEN_URI | OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE
}

impl SqliteConnection {
    /// Creates a fresh in-memory database shared by every pooled connection.
    pub fn in_memory(name: impl Into<String>) -> OrmResult<Self> {
        let uri = format!("file:quarry_mem_{}?mode=memory&cache=shared", uuid::Uuid::new_v4());
        let keep_alive = rusqlite::Connection::open_with_flags(&uri, memory_flags())?;
        let manager = SqliteConnectionManager::file(&uri).with_flags(memory_flags());
        Self::build(name.into(), manager, SqliteConfig::default(), true, Some(keep_alive))
    }

    /// Opens or creates a file-based database.
    pub fn open<P: AsRef<Path>>(name: impl Into<String>, path: P) -> OrmResult<Self> {
        Self::with_config(name, path, SqliteConfig::default())
    }

    /// Opens a file-based database with custom configuration.
    pub fn with_config<P: AsRef<Path>>(
        name: impl Into<String>,
        path: P,
        config: SqliteConfig,
    ) -> OrmResult<Self> {
        let manager = SqliteConnectionManager::file(path.as_ref());
        Self::build(name.into(), manager, config, false, None)
    }

    fn build(
        name: String,
        manager: SqliteConnectionManager,
        config: SqliteConfig,
        is_memory: bool,
        keep_alive: Option<rusqlite::Connection>,
    ) -> OrmResult<Self> {
        let busy_timeout = Duration::from_millis(u64::from(config.busy_timeout_ms));
        let foreign_keys = config.enable_foreign_keys;
        let manager = manager.with_init(move |conn| {
            conn.busy_timeout(busy_timeout)?;
            if foreign_keys {
                conn.execute_batch("PRAGMA foreign_keys = ON")?;
            }
            Ok(())
        });

        let pool = Pool::builder()
            .max_size(config.max_connections)
            .min_idle(Some(config.min_connections))
            .connection_timeout(Duration::from_millis(config.connection_timeout_ms))
            .build(manager)?;

        debug!(name = %name, is_memory, "SQLite pool ready");
        Ok(Self {
            name,
            pool,
            config,
            is_memory,
            _keep_alive: keep_alive.map(Mutex::new),
        })
    }

    /// Runs several statements, e.g. a schema script.
    pub fn execute_batch(&self, sql: &str) -> OrmResult<()> {
        self.get_connection()?.execute_batch(sql)?;
        Ok(())
    }

    /// Returns whether this is an in-memory database.
    pub fn is_memory(&self) -> bool {
        self.is_memory
    }

    /// Returns the driver configuration.
    pub fn config(&self) -> &SqliteConfig {
        &self.config
    }

    pub(crate) fn get_connection(&self) -> OrmResult<PooledConnection<SqliteConnectionManager>> {
        pooled(&self.pool)
    }
}

fn pooled(
    pool: &Pool<SqliteConnectionManager>,
) -> OrmResult<PooledConnection<SqliteConnectionManager>> {
    pool.get().map_err(|e| {
        ConnectivityError::ConnectionFailed {
            backend_name: "sqlite".to_string(),
            message: e.to_string(),
        }
        .into()
    })
}

/// Runs driver work on the blocking pool so a deadline can stop waiting on it.
pub(crate) async fn run_blocking<T, F>(work: F) -> OrmResult<T>
where
    F: FnOnce() -> OrmResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work).await.map_err(|e| {
        OrmError::from(ConnectivityError::Internal {
            backend_name: "sqlite".to_string(),
            message: e.to_string(),
            source: Some(Box::new(e)),
        })
    })?
}

/// Reads every row of `sql`.
pub(crate) fn query_rows(
    conn: &rusqlite::Connection,
    sql: &str,
    args: &[Value],
) -> OrmResult<Rows> {
    let mut stmt = conn.prepare(sql)?;
    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let mut cursor = stmt.query(rusqlite::params_from_iter(args.iter()))?;

    let mut rows = Vec::new();
    while let Some(row) = cursor.next()? {
        let mut values = Vec::with_capacity(columns.len());
        for i in 0..columns.len() {
            values.push(Value::from(row.get_ref(i)?));
        }
        rows.push(values);
    }
    Ok(Rows::new(columns, rows))
}

/// Runs `sql` without reading rows.
pub(crate) fn exec_statement(
    conn: &rusqlite::Connection,
    sql: &str,
    args: &[Value],
) -> OrmResult<ExecResult> {
    let changed = conn.execute(sql, rusqlite::params_from_iter(args.iter()))?;
    Ok(ExecResult {
        rows_affected: changed as u64,
        last_insert_id: Some(conn.last_insert_rowid()),
    })
}

#[async_trait]
impl Connection for SqliteConnection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn query(&self, sql: &str, args: &[Value], _options: &CallOptions) -> OrmResult<Rows> {
        let pool = self.pool.clone();
        let (sql, args) = (sql.to_string(), args.to_vec());
        run_blocking(move || query_rows(&*pooled(&pool)?, &sql, &args)).await
    }

    async fn exec(
        &self,
        sql: &str,
        args: &[Value],
        _options: &CallOptions,
    ) -> OrmResult<ExecResult> {
        let pool = self.pool.clone();
        let (sql, args) = (sql.to_string(), args.to_vec());
        run_blocking(move || exec_statement(&*pooled(&pool)?, &sql, &args)).await
    }

    async fn begin(&self) -> OrmResult<Box<dyn DriverTransaction>> {
        let pool = self.pool.clone();
        let tx = run_blocking(move || SqliteTransaction::new(pooled(&pool)?)).await?;
        Ok(Box::new(tx))
    }
}

/// Opens [`SqliteConnection`]s from DSNs.
///
/// `:memory:` creates a fresh in-memory database; anything else is a file
/// path, optionally prefixed with `sqlite://`.
#[derive(Debug, Clone, Default)]
pub struct SqliteConnector {
    config: SqliteConfig,
}

impl SqliteConnector {
    /// A connector applying `config` to file databases.
    pub fn new(config: SqliteConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Connector for SqliteConnector {
    async fn connect(&self, name: &str, dsn: &str) -> OrmResult<Arc<dyn Connection>> {
        let path = dsn.strip_prefix("sqlite://").unwrap_or(dsn);
        if path.is_empty() {
            return Err(OrmError::from(ConnectivityError::InvalidDsn {
                dsn: dsn.to_string(),
                message: "empty path".to_string(),
            }));
        }
        let connection = if path == ":memory:" {
            SqliteConnection::in_memory(name)?
        } else {
            SqliteConnection::with_config(name, path, self.config.clone())?
        };
        Ok(Arc::new(connection))
    }
}
