//! Connections, sessions and transactions.
//!
//! [`Connection`] is the driver seam. [`Db`] and [`Tx`] implement
//! [`Session`], which is what the statement builders execute against.

mod db;
mod tx;

pub use db::{Db, DbBuilder};
pub use tx::Tx;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::builder::{Delete, Insert, RawQuery, Select};
use crate::dialect::{Dialect, MySqlDialect};
use crate::error::{ConnectivityError, OrmResult};
use crate::interceptor::{Endpoint, Interceptor, Next, QueryContext, QueryOutput};
use crate::materializer::MaterializerKind;
use crate::model::{Entity, Registry};
use crate::sharding::Algorithm;
use crate::value::Value;

/// Per-call execution options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallOptions {
    /// Route reads to the primary even when replicas exist.
    pub use_primary: bool,
    /// Deadline for the call; the session default applies when unset.
    pub timeout: Option<Duration>,
}

impl CallOptions {
    /// Options forcing the primary.
    pub fn primary() -> Self {
        Self {
            use_primary: true,
            timeout: None,
        }
    }

    /// Sets the deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Fills an unset deadline from `default`.
    pub fn or_default_timeout(mut self, default: Option<Duration>) -> Self {
        self.timeout = self.timeout.or(default);
        self
    }
}

/// A fully read result set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Rows {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Rows {
    /// Creates a result set. Every row must have one value per column.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self { columns, rows }
    }

    /// Column names.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if there are no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Iterates the rows.
    pub fn iter(&self) -> impl Iterator<Item = Row<'_>> {
        self.rows.iter().map(|values| Row {
            columns: &self.columns,
            values,
        })
    }

    /// Appends the rows of `other`.
    pub fn extend(&mut self, other: Rows) {
        if self.columns.is_empty() {
            self.columns = other.columns;
        }
        self.rows.extend(other.rows);
    }
}

/// A single row borrowed from [`Rows`].
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    columns: &'a [String],
    values: &'a [Value],
}

impl<'a> Row<'a> {
    /// Column names.
    pub fn columns(&self) -> &'a [String] {
        self.columns
    }

    /// Values in column order.
    pub fn values(&self) -> &'a [Value] {
        self.values
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Returns true for a row without columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Value of a named column.
    pub fn get(&self, column: &str) -> Option<&'a Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .and_then(|i| self.values.get(i))
    }

    /// Column/value pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&'a str, &'a Value)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }
}

/// Outcome of a write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecResult {
    /// Rows changed.
    pub rows_affected: u64,
    /// Row id of the last insert, if the driver reports one.
    pub last_insert_id: Option<i64>,
}

/// A physical database handle.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Name used in logs and replica lists.
    fn name(&self) -> &str;

    /// Runs a statement returning rows.
    async fn query(&self, sql: &str, args: &[Value], options: &CallOptions) -> OrmResult<Rows>;

    /// Runs a statement without rows.
    async fn exec(&self, sql: &str, args: &[Value], options: &CallOptions)
    -> OrmResult<ExecResult>;

    /// Starts a transaction.
    async fn begin(&self) -> OrmResult<Box<dyn DriverTransaction>>;
}

/// A driver transaction.
///
/// After `commit` or `rollback` every call fails with
/// [`TransactionError::InvalidTransaction`](crate::error::TransactionError::InvalidTransaction).
#[async_trait]
pub trait DriverTransaction: Send + Sync {
    /// Runs a statement returning rows inside the transaction.
    async fn query(&self, sql: &str, args: &[Value]) -> OrmResult<Rows>;

    /// Runs a statement without rows inside the transaction.
    async fn exec(&self, sql: &str, args: &[Value]) -> OrmResult<ExecResult>;

    /// Commits.
    async fn commit(&self) -> OrmResult<()>;

    /// Rolls back.
    async fn rollback(&self) -> OrmResult<()>;
}

/// Metadata and behavior shared by a database and its transactions.
#[derive(Clone)]
pub struct Core {
    pub(crate) registry: Arc<Registry>,
    pub(crate) dialect: Arc<dyn Dialect>,
    pub(crate) materializer: MaterializerKind,
    pub(crate) interceptors: Vec<Arc<dyn Interceptor>>,
    pub(crate) sharding: Option<Arc<dyn Algorithm>>,
    pub(crate) default_timeout: Option<Duration>,
}

impl Core {
    /// The model registry.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// The SQL dialect.
    pub fn dialect(&self) -> &dyn Dialect {
        self.dialect.as_ref()
    }

    /// The row materializer.
    pub fn materializer(&self) -> MaterializerKind {
        self.materializer
    }

    /// Interceptors in registration order.
    pub fn interceptors(&self) -> &[Arc<dyn Interceptor>] {
        &self.interceptors
    }

    /// The sharding algorithm, if configured.
    pub fn sharding(&self) -> Option<&Arc<dyn Algorithm>> {
        self.sharding.as_ref()
    }

    /// Deadline applied when a call sets none.
    pub fn default_timeout(&self) -> Option<Duration> {
        self.default_timeout
    }
}

impl Default for Core {
    fn default() -> Self {
        Self {
            registry: Arc::new(Registry::new()),
            dialect: Arc::new(MySqlDialect),
            materializer: MaterializerKind::default(),
            interceptors: Vec::new(),
            sharding: None,
            default_timeout: None,
        }
    }
}

impl std::fmt::Debug for Core {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Core")
            .field("dialect", &self.dialect.name())
            .field("materializer", &self.materializer)
            .field("interceptors", &self.interceptors)
            .field("sharding", &self.sharding)
            .field("default_timeout", &self.default_timeout)
            .finish_non_exhaustive()
    }
}

/// Something statements can be executed against: a [`Db`] or a [`Tx`].
#[async_trait]
pub trait Session: Send + Sync {
    /// Shared metadata.
    fn core(&self) -> &Core;

    /// Runs a read. `options.timeout` is already resolved.
    async fn query(&self, sql: &str, args: &[Value], options: &CallOptions) -> OrmResult<Rows>;

    /// Runs a write. `options.timeout` is already resolved.
    async fn exec(&self, sql: &str, args: &[Value], options: &CallOptions)
    -> OrmResult<ExecResult>;

    /// Starts a `SELECT` for `T`.
    fn select<T: Entity>(&self) -> Select<'_, T, Self>
    where
        Self: Sized,
    {
        Select::new(self)
    }

    /// Starts an `INSERT` for `T`.
    fn insert<T: Entity>(&self) -> Insert<'_, T, Self>
    where
        Self: Sized,
    {
        Insert::new(self)
    }

    /// Starts a `DELETE` for `T`.
    fn delete<T: Entity>(&self) -> Delete<'_, T, Self>
    where
        Self: Sized,
    {
        Delete::new(self)
    }

    /// Wraps caller supplied SQL whose rows map onto `T`.
    fn raw<T: Entity>(&self, sql: impl Into<String>, args: Vec<Value>) -> RawQuery<'_, T, Self>
    where
        Self: Sized,
    {
        RawQuery::new(self, sql, args)
    }
}

/// Awaits `fut`, failing with a timeout error once `timeout` elapses.
pub(crate) async fn with_deadline<T, F>(timeout: Option<Duration>, fut: F) -> OrmResult<T>
where
    F: Future<Output = OrmResult<T>>,
{
    match timeout {
        Some(limit) => match tokio::time::timeout(limit, fut).await {
            Ok(result) => result,
            Err(_) => Err(ConnectivityError::Timeout {
                timeout_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
            }
            .into()),
        },
        None => fut.await,
    }
}

struct SessionEndpoint<'s, S: ?Sized> {
    session: &'s S,
}

#[async_trait]
impl<S: Session + ?Sized> Endpoint for SessionEndpoint<'_, S> {
    async fn call(&self, ctx: &QueryContext) -> OrmResult<QueryOutput> {
        let (sql, args) = (ctx.query.sql(), ctx.query.args());
        with_deadline(ctx.options.timeout, async {
            if ctx.kind.is_read() {
                self.session
                    .query(sql, args, &ctx.options)
                    .await
                    .map(QueryOutput::Rows)
            } else {
                self.session
                    .exec(sql, args, &ctx.options)
                    .await
                    .map(QueryOutput::Exec)
            }
        })
        .await
    }
}

pub(crate) struct ConnectionEndpoint<'c> {
    pub(crate) connection: &'c dyn Connection,
}

#[async_trait]
impl Endpoint for ConnectionEndpoint<'_> {
    async fn call(&self, ctx: &QueryContext) -> OrmResult<QueryOutput> {
        let (sql, args) = (ctx.query.sql(), ctx.query.args());
        with_deadline(ctx.options.timeout, async {
            if ctx.kind.is_read() {
                self.connection
                    .query(sql, args, &ctx.options)
                    .await
                    .map(QueryOutput::Rows)
            } else {
                self.connection
                    .exec(sql, args, &ctx.options)
                    .await
                    .map(QueryOutput::Exec)
            }
        })
        .await
    }
}

/// Sends `ctx` through the session's interceptors to the session itself.
pub(crate) async fn dispatch<S: Session + ?Sized>(
    session: &S,
    mut ctx: QueryContext,
) -> OrmResult<QueryOutput> {
    let core = session.core();
    ctx.options = ctx.options.or_default_timeout(core.default_timeout);
    let endpoint = SessionEndpoint { session };
    Next::new(core.interceptors(), &endpoint).run(&ctx).await
}

/// Sends `ctx` through `core`'s interceptors to a specific connection.
pub(crate) async fn dispatch_to(
    core: &Core,
    connection: &dyn Connection,
    mut ctx: QueryContext,
) -> OrmResult<QueryOutput> {
    ctx.options = ctx.options.or_default_timeout(core.default_timeout);
    let endpoint = ConnectionEndpoint { connection };
    Next::new(core.interceptors(), &endpoint).run(&ctx).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_deadline_expiry_is_a_timeout() {
        let err = with_deadline(Some(Duration::from_millis(50)), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await
        .unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(err.to_string(), "operation timed out after 50ms");
    }

    #[tokio::test]
    async fn test_no_deadline_waits() {
        let value = with_deadline(None, async { Ok(7) }).await.unwrap();
        assert_eq!(value, 7);
    }

    #[test]
    fn test_call_timeout_beats_default() {
        let options = CallOptions::default()
            .with_timeout(Duration::from_secs(1))
            .or_default_timeout(Some(Duration::from_secs(9)));
        assert_eq!(options.timeout, Some(Duration::from_secs(1)));

        let options = CallOptions::primary().or_default_timeout(Some(Duration::from_secs(9)));
        assert!(options.use_primary);
        assert_eq!(options.timeout, Some(Duration::from_secs(9)));
    }

    #[test]
    fn test_row_lookup() {
        let rows = Rows::new(
            vec!["id".to_string(), "age".to_string()],
            vec![vec![Value::Int(1), Value::Int(18)]],
        );
        let row = rows.iter().next().unwrap();
        assert_eq!(row.get("age"), Some(&Value::Int(18)));
        assert_eq!(row.get("missing"), None);
        assert_eq!(row.len(), 2);
    }
}
