//! Primary/replica connection.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::error::OrmResult;
use crate::session::{CallOptions, Connection, DriverTransaction, ExecResult, Rows};
use crate::value::Value;

use super::ReplicaSelector;

/// Sends reads to a replica and everything else to the primary.
///
/// Reads stay on the primary when the call asks for it, when no selector is
/// configured, or when the selector currently knows no replica.
pub struct MasterSlaves {
    primary: Arc<dyn Connection>,
    replicas: Option<Arc<ReplicaSelector>>,
}

impl MasterSlaves {
    /// Wraps `primary` with an optional replica selector.
    pub fn new(primary: Arc<dyn Connection>, replicas: Option<Arc<ReplicaSelector>>) -> Self {
        Self { primary, replicas }
    }

    /// The primary connection.
    pub fn primary(&self) -> &Arc<dyn Connection> {
        &self.primary
    }

    fn reader(&self, options: &CallOptions) -> Arc<dyn Connection> {
        self.replicas
            .as_ref()
            .and_then(|selector| selector.pick(options.use_primary))
            .unwrap_or_else(|| Arc::clone(&self.primary))
    }
}

#[async_trait]
impl Connection for MasterSlaves {
    fn name(&self) -> &str {
        self.primary.name()
    }

    async fn query(&self, sql: &str, args: &[Value], options: &CallOptions) -> OrmResult<Rows> {
        let connection = self.reader(options);
        debug!(connection = %connection.name(), "Read routed");
        connection.query(sql, args, options).await
    }

    async fn exec(
        &self,
        sql: &str,
        args: &[Value],
        options: &CallOptions,
    ) -> OrmResult<ExecResult> {
        self.primary.exec(sql, args, options).await
    }

    async fn begin(&self) -> OrmResult<Box<dyn DriverTransaction>> {
        self.primary.begin().await
    }
}
