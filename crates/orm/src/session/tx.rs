//! Transaction handles.

use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use futures::future::BoxFuture;
use tracing::{debug, warn};

use crate::error::{OrmError, OrmResult, TransactionError};
use crate::value::Value;

use super::{CallOptions, Core, DriverTransaction, ExecResult, Rows, Session};

/// An open transaction.
///
/// Statements built on a `Tx` run on the transaction's connection. The code
/// that began the transaction decides whether it commits or rolls back.
pub struct Tx<'a> {
    core: &'a Core,
    driver: Box<dyn DriverTransaction>,
    done: AtomicBool,
}

impl std::fmt::Debug for Tx<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tx")
            .field("done", &self.done.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl<'a> Tx<'a> {
    pub(crate) fn new(core: &'a Core, driver: Box<dyn DriverTransaction>) -> Self {
        Self {
            core,
            driver,
            done: AtomicBool::new(false),
        }
    }

    /// Commits the transaction.
    pub async fn commit(self) -> OrmResult<()> {
        self.done.store(true, Ordering::Relaxed);
        self.driver.commit().await?;
        debug!("Transaction committed");
        Ok(())
    }

    /// Rolls the transaction back.
    pub async fn rollback(self) -> OrmResult<()> {
        self.done.store(true, Ordering::Relaxed);
        self.driver.rollback().await?;
        debug!("Transaction rolled back");
        Ok(())
    }

    /// Runs `f` on this transaction without starting a new one.
    ///
    /// Commit and rollback stay with whoever began the transaction.
    pub async fn transaction<R, F>(&self, f: F) -> OrmResult<R>
    where
        F: for<'t> FnOnce(&'t Tx<'a>) -> BoxFuture<'t, OrmResult<R>>,
    {
        f(self).await
    }
}

impl Drop for Tx<'_> {
    fn drop(&mut self) {
        if !self.done.load(Ordering::Relaxed) {
            warn!("Transaction dropped without commit or rollback");
        }
    }
}

#[async_trait]
impl Session for Tx<'_> {
    fn core(&self) -> &Core {
        self.core
    }

    async fn query(&self, sql: &str, args: &[Value], _options: &CallOptions) -> OrmResult<Rows> {
        self.driver.query(sql, args).await
    }

    async fn exec(
        &self,
        sql: &str,
        args: &[Value],
        _options: &CallOptions,
    ) -> OrmResult<ExecResult> {
        self.driver.exec(sql, args).await
    }
}

/// Commits on success, otherwise rolls back and reports the cause.
pub(crate) async fn finish<R>(
    tx: Tx<'_>,
    outcome: Result<OrmResult<R>, Box<dyn Any + Send>>,
) -> OrmResult<R> {
    match outcome {
        Ok(Ok(value)) => {
            tx.commit().await?;
            Ok(value)
        }
        Ok(Err(cause)) => Err(rollback_after(tx, cause).await),
        Err(panic) => {
            let cause = TransactionError::Panicked {
                message: panic_message(panic.as_ref()),
            };
            warn!(error = %cause, "Rolling back after panic");
            Err(rollback_after(tx, cause.into()).await)
        }
    }
}

async fn rollback_after(tx: Tx<'_>, cause: OrmError) -> OrmError {
    match tx.rollback().await {
        Ok(()) => cause,
        Err(rollback) => TransactionError::RollbackFailed {
            cause: Box::new(cause),
            rollback: Box::new(rollback),
        }
        .into(),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
