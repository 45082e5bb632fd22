//! Interceptor chain wrapped around statement execution.
//!
//! Interceptors run in registration order: the first registered one sees the
//! call first and the result last.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ConnectivityError, OrmResult};
use crate::query::Query;
use crate::session::{CallOptions, ExecResult, Rows};

/// What kind of statement is being executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementKind {
    /// `SELECT`
    Select,
    /// `INSERT`, with or without upsert
    Insert,
    /// `DELETE`
    Delete,
    /// Caller supplied SQL returning rows
    Raw,
    /// Caller supplied SQL without rows
    RawExec,
}

impl StatementKind {
    /// Returns true if the statement returns rows.
    pub fn is_read(self) -> bool {
        matches!(self, StatementKind::Select | StatementKind::Raw)
    }
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StatementKind::Select => "select",
            StatementKind::Insert => "insert",
            StatementKind::Delete => "delete",
            StatementKind::Raw => "raw",
            StatementKind::RawExec => "raw_exec",
        })
    }
}

/// A statement on its way to the driver.
#[derive(Debug, Clone)]
pub struct QueryContext {
    /// Statement kind.
    pub kind: StatementKind,
    /// Target table as rendered in the SQL.
    pub table: String,
    /// The compiled statement.
    pub query: Query,
    /// Per-call options.
    pub options: CallOptions,
}

/// Result of executing a statement.
#[derive(Debug)]
pub enum QueryOutput {
    /// Rows of a read.
    Rows(Rows),
    /// Outcome of a write.
    Exec(ExecResult),
}

impl QueryOutput {
    /// Unwraps rows, failing if the chain returned a write outcome.
    pub fn into_rows(self) -> OrmResult<Rows> {
        match self {
            QueryOutput::Rows(rows) => Ok(rows),
            QueryOutput::Exec(_) => Err(unexpected_output("rows")),
        }
    }

    /// Unwraps a write outcome, failing if the chain returned rows.
    pub fn into_exec(self) -> OrmResult<ExecResult> {
        match self {
            QueryOutput::Exec(result) => Ok(result),
            QueryOutput::Rows(_) => Err(unexpected_output("an exec result")),
        }
    }
}

fn unexpected_output(expected: &str) -> crate::error::OrmError {
    ConnectivityError::Internal {
        backend_name: "interceptor".to_string(),
        message: format!("interceptor chain did not return {expected}"),
        source: None,
    }
    .into()
}

/// The innermost handler of a chain.
#[async_trait]
pub trait Endpoint: Send + Sync {
    /// Executes the statement.
    async fn call(&self, ctx: &QueryContext) -> OrmResult<QueryOutput>;
}

/// Cross-cutting behavior around statement execution.
#[async_trait]
pub trait Interceptor: Send + Sync + fmt::Debug {
    /// Handles `ctx`, usually by delegating to `next`.
    async fn intercept(&self, ctx: &QueryContext, next: Next<'_>) -> OrmResult<QueryOutput>;
}

/// The remainder of a chain.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    interceptors: &'a [Arc<dyn Interceptor>],
    endpoint: &'a dyn Endpoint,
}

impl<'a> Next<'a> {
    /// A chain over `interceptors` ending at `endpoint`.
    pub fn new(interceptors: &'a [Arc<dyn Interceptor>], endpoint: &'a dyn Endpoint) -> Self {
        Self {
            interceptors,
            endpoint,
        }
    }

    /// Runs the rest of the chain.
    pub async fn run(self, ctx: &QueryContext) -> OrmResult<QueryOutput> {
        match self.interceptors.split_first() {
            Some((first, rest)) => {
                first
                    .intercept(ctx, Next::new(rest, self.endpoint))
                    .await
            }
            None => self.endpoint.call(ctx).await,
        }
    }
}

/// Logs every statement before it runs.
#[derive(Debug, Default, Clone)]
pub struct AccessLog;

#[async_trait]
impl Interceptor for AccessLog {
    async fn intercept(&self, ctx: &QueryContext, next: Next<'_>) -> OrmResult<QueryOutput> {
        info!(
            kind = %ctx.kind,
            table = %ctx.table,
            sql = %ctx.query.sql(),
            args = ctx.query.args().len(),
            "Executing statement"
        );
        next.run(ctx).await
    }
}

/// Logs how long each statement took, including failures.
#[derive(Debug, Default, Clone)]
pub struct CostTime;

#[async_trait]
impl Interceptor for CostTime {
    async fn intercept(&self, ctx: &QueryContext, next: Next<'_>) -> OrmResult<QueryOutput> {
        let start = Instant::now();
        let result = next.run(ctx).await;
        info!(
            kind = %ctx.kind,
            table = %ctx.table,
            elapsed_ms = start.elapsed().as_millis() as u64,
            ok = result.is_ok(),
            "Statement finished"
        );
        result
    }
}

/// Built-in interceptors selectable from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterceptorKind {
    /// [`AccessLog`]
    AccessLog,
    /// [`CostTime`]
    CostTime,
}

impl InterceptorKind {
    /// Instantiates the interceptor.
    pub fn build(self) -> Arc<dyn Interceptor> {
        match self {
            InterceptorKind::AccessLog => Arc::new(AccessLog),
            InterceptorKind::CostTime => Arc::new(CostTime),
        }
    }
}
