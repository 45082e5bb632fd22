//! Transaction support for the SQLite driver.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use r2d2::PooledConnection;
use r2d2_sqlite::SqliteConnectionManager;

use crate::error::{OrmResult, TransactionError};
use crate::session::{DriverTransaction, ExecResult, Rows};
use crate::value::Value;

use super::backend::{exec_statement, query_rows, run_blocking};

/// A SQLite transaction holding one pooled connection.
pub struct SqliteTransaction {
    /// The connection used for this transaction.
    conn: Arc<Mutex<PooledConnection<SqliteConnectionManager>>>,
    /// Whether the transaction is still active.
    active: AtomicBool,
}

impl std::fmt::Debug for SqliteTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteTransaction")
            .field("active", &self.active.load(Ordering::Relaxed))
            .finish()
    }
}

impl SqliteTransaction {
    pub(crate) fn new(conn: PooledConnection<SqliteConnectionManager>) -> OrmResult<Self> {
        conn.execute_batch("BEGIN IMMEDIATE")
            .map_err(|e| TransactionError::BeginFailed {
                message: e.to_string(),
            })?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            active: AtomicBool::new(true),
        })
    }

    fn ensure_active(&self) -> OrmResult<()> {
        if self.active.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(TransactionError::InvalidTransaction.into())
        }
    }

    /// Marks the transaction finished; fails if it already was.
    fn finish(&self) -> OrmResult<()> {
        if self.active.swap(false, Ordering::AcqRel) {
            Ok(())
        } else {
            Err(TransactionError::InvalidTransaction.into())
        }
    }
}

#[async_trait]
impl DriverTransaction for SqliteTransaction {
    async fn query(&self, sql: &str, args: &[Value]) -> OrmResult<Rows> {
        self.ensure_active()?;
        let conn = Arc::clone(&self.conn);
        let (sql, args) = (sql.to_string(), args.to_vec());
        run_blocking(move || query_rows(&conn.lock(), &sql, &args)).await
    }

    async fn exec(&self, sql: &str, args: &[Value]) -> OrmResult<ExecResult> {
        self.ensure_active()?;
        let conn = Arc::clone(&self.conn);
        let (sql, args) = (sql.to_string(), args.to_vec());
        run_blocking(move || exec_statement(&conn.lock(), &sql, &args)).await
    }

    async fn commit(&self) -> OrmResult<()> {
        self.finish()?;
        let conn = Arc::clone(&self.conn);
        run_blocking(move || {
            conn.lock()
                .execute_batch("COMMIT")
                .map_err(|e| TransactionError::CommitFailed {
                    message: e.to_string(),
                })?;
            Ok(())
        })
        .await
    }

    async fn rollback(&self) -> OrmResult<()> {
        self.finish()?;
        let conn = Arc::clone(&self.conn);
        run_blocking(move || {
            conn.lock().execute_batch("ROLLBACK")?;
            Ok(())
        })
        .await
    }
}

impl Drop for SqliteTransaction {
    fn drop(&mut self) {
        // The pooled connection goes back to the pool; never with a live transaction.
        if self.active.load(Ordering::Acquire) {
            let _ = self.conn.lock().execute_batch("ROLLBACK");
        }
    }
}
