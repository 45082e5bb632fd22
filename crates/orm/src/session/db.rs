//! The database handle.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use tracing::{debug, info};

use crate::builder::ShardedSelect;
use crate::config::OrmConfig;
use crate::dialect::Dialect;
use crate::error::OrmResult;
use crate::interceptor::Interceptor;
use crate::materializer::MaterializerKind;
use crate::model::{Entity, Registry};
use crate::replica::{
    Connector, HostResolver, MasterSlaves, ReplicaSelector, SystemResolver,
};
use crate::sharding::Algorithm;
use crate::value::Value;

use super::tx::{Tx, finish};
use super::{CallOptions, Connection, Core, ExecResult, Rows, Session};

/// A logical database: a primary connection plus shared metadata.
///
/// Optional shard connections are looked up by database name when a
/// [`ShardedSelect`](crate::builder::ShardedSelect) runs.
pub struct Db {
    core: Core,
    connection: Arc<dyn Connection>,
    shards: HashMap<String, Arc<dyn Connection>>,
    replicas: Option<Arc<ReplicaSelector>>,
}

impl std::fmt::Debug for Db {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Db")
            .field("core", &self.core)
            .field("connection", &self.connection.name())
            .field("shards", &self.shards.keys().collect::<Vec<_>>())
            .field("replicas", &self.replicas.is_some())
            .finish()
    }
}

impl Db {
    /// Starts building a database over `connection`.
    pub fn builder(connection: Arc<dyn Connection>) -> DbBuilder {
        DbBuilder {
            connection,
            core: Core::default(),
            shards: HashMap::new(),
            replicas: None,
        }
    }

    /// Opens a database described by `config`, resolving replicas through DNS.
    pub async fn open(config: &OrmConfig, connector: Arc<dyn Connector>) -> OrmResult<Self> {
        Self::open_with_resolver(config, connector, Arc::new(SystemResolver)).await
    }

    /// Opens a database described by `config` with a custom resolver.
    pub async fn open_with_resolver(
        config: &OrmConfig,
        connector: Arc<dyn Connector>,
        resolver: Arc<dyn HostResolver>,
    ) -> OrmResult<Self> {
        config.validate()?;

        let primary = connector.connect("primary", &config.connection).await?;
        let mut builder = Db::builder(Arc::clone(&primary))
            .dialect(config.dialect.build())
            .materializer(config.materializer);

        if let Some(timeout) = config.default_timeout {
            builder = builder.default_timeout(timeout);
        }
        for kind in &config.interceptors {
            builder = builder.interceptor(kind.build());
        }
        if let Some(sharding) = &config.sharding {
            builder = builder.sharding(Arc::new(sharding.build()?));
        }
        if let Some(replicas) = &config.replicas {
            let selector = ReplicaSelector::start(
                &replicas.dsn,
                replicas.selector_config(),
                resolver,
                connector,
            )
            .await?;
            builder = builder.replicas(selector);
        }

        let db = builder.build();
        info!(
            dialect = db.core.dialect().name(),
            sharded = db.core.sharding().is_some(),
            replicas = db.replicas.is_some(),
            "Database opened"
        );
        Ok(db)
    }

    /// Shared metadata.
    pub fn core(&self) -> &Core {
        &self.core
    }

    /// The primary (or primary/replica) connection.
    pub fn connection(&self) -> &Arc<dyn Connection> {
        &self.connection
    }

    /// The connection registered for a shard database.
    pub fn shard(&self, database: &str) -> Option<&Arc<dyn Connection>> {
        self.shards.get(database)
    }

    /// The replica selector, when replicas are configured.
    pub fn replicas(&self) -> Option<&Arc<ReplicaSelector>> {
        self.replicas.as_ref()
    }

    /// Starts a select fanned out over the configured shards.
    pub fn sharded_select<T: Entity>(&self) -> ShardedSelect<'_, T> {
        ShardedSelect::new(self)
    }

    /// Begins a transaction on the primary.
    ///
    /// The caller owns the handle and must commit or roll it back.
    pub async fn begin(&self) -> OrmResult<Tx<'_>> {
        let driver = self.connection.begin().await?;
        debug!(connection = %self.connection.name(), "Transaction started");
        Ok(Tx::new(&self.core, driver))
    }

    /// Runs `f` inside a transaction.
    ///
    /// Commits when `f` succeeds. Rolls back when it fails or panics, keeping
    /// the original error and appending any rollback failure to it.
    ///
    /// ```ignore
    /// db.transaction(|tx| {
    ///     Box::pin(async move {
    ///         Insert::new(tx).values(vec![model]).exec().await?;
    ///         Ok(())
    ///     })
    /// })
    /// .await?;
    /// ```
    pub async fn transaction<'a, R, F>(&'a self, f: F) -> OrmResult<R>
    where
        F: for<'t> FnOnce(&'t Tx<'a>) -> BoxFuture<'t, OrmResult<R>>,
    {
        let tx = self.begin().await?;
        let outcome = AssertUnwindSafe(f(&tx)).catch_unwind().await;
        finish(tx, outcome).await
    }

    /// Stops background replica discovery.
    pub async fn close(&self) {
        if let Some(replicas) = &self.replicas {
            replicas.shutdown().await;
        }
    }
}

#[async_trait]
impl Session for Db {
    fn core(&self) -> &Core {
        &self.core
    }

    async fn query(&self, sql: &str, args: &[Value], options: &CallOptions) -> OrmResult<Rows> {
        self.connection.query(sql, args, options).await
    }

    async fn exec(
        &self,
        sql: &str,
        args: &[Value],
        options: &CallOptions,
    ) -> OrmResult<ExecResult> {
        self.connection.exec(sql, args, options).await
    }
}

/// Builder for [`Db`].
pub struct DbBuilder {
    connection: Arc<dyn Connection>,
    core: Core,
    shards: HashMap<String, Arc<dyn Connection>>,
    replicas: Option<Arc<ReplicaSelector>>,
}

impl DbBuilder {
    /// Shares a registry, e.g. between databases.
    pub fn registry(mut self, registry: Arc<Registry>) -> Self {
        self.core.registry = registry;
        self
    }

    /// Sets the SQL dialect.
    pub fn dialect(mut self, dialect: Arc<dyn Dialect>) -> Self {
        self.core.dialect = dialect;
        self
    }

    /// Sets the row materializer.
    pub fn materializer(mut self, materializer: MaterializerKind) -> Self {
        self.core.materializer = materializer;
        self
    }

    /// Appends an interceptor. The first appended runs outermost.
    pub fn interceptor(mut self, interceptor: Arc<dyn Interceptor>) -> Self {
        self.core.interceptors.push(interceptor);
        self
    }

    /// Sets the sharding algorithm.
    pub fn sharding(mut self, algorithm: Arc<dyn Algorithm>) -> Self {
        self.core.sharding = Some(algorithm);
        self
    }

    /// Registers the connection serving a shard database.
    pub fn shard(mut self, database: impl Into<String>, connection: Arc<dyn Connection>) -> Self {
        self.shards.insert(database.into(), connection);
        self
    }

    /// Sends reads to `selector`'s replicas; writes stay on the primary.
    pub fn replicas(mut self, selector: Arc<ReplicaSelector>) -> Self {
        self.replicas = Some(selector);
        self
    }

    /// Sets the deadline applied to calls that set none.
    pub fn default_timeout(mut self, timeout: Duration) -> Self {
        self.core.default_timeout = Some(timeout);
        self
    }

    /// Finishes the database.
    pub fn build(self) -> Db {
        let connection = match &self.replicas {
            Some(selector) => Arc::new(MasterSlaves::new(
                self.connection,
                Some(Arc::clone(selector)),
            )) as Arc<dyn Connection>,
            None => self.connection,
        };
        Db {
            core: self.core,
            connection,
            shards: self.shards,
            replicas: self.replicas,
        }
    }
}
