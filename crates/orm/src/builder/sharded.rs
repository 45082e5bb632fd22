//! `SELECT` over a sharded table.

use std::marker::PhantomData;

use futures::future::try_join_all;
use tracing::debug;

use crate::error::{OrmResult, QueryError};
use crate::expr::{Column, OrderTerm, Predicate, SqlWriter};
use crate::interceptor::{QueryContext, StatementKind};
use crate::model::Entity;
use crate::query::Query;
use crate::session::{Db, dispatch_to};
use crate::sharding::{DataSource, route};

use super::Clauses;

/// Fans a select out to every shard its `WHERE` clause can touch.
///
/// Targets are chosen by the database's sharding algorithm. Each target gets
/// its own statement naming `` `db`.`table` `` and runs on the connection
/// registered for that database, or on the primary when none is.
pub struct ShardedSelect<'db, T> {
    db: &'db Db,
    clauses: Clauses,
    _entity: PhantomData<fn() -> T>,
}

impl<'db, T: Entity> ShardedSelect<'db, T> {
    /// Starts a sharded select on `db`.
    pub fn new(db: &'db Db) -> Self {
        Self {
            db,
            clauses: Clauses::default(),
            _entity: PhantomData,
        }
    }

    /// Replaces the `WHERE` predicates; several are joined with `AND`.
    pub fn where_(mut self, predicates: impl IntoIterator<Item = Predicate>) -> Self {
        self.clauses.where_ = predicates.into_iter().collect();
        self
    }

    /// Replaces the `GROUP BY` columns.
    pub fn group_by(mut self, columns: impl IntoIterator<Item = Column>) -> Self {
        self.clauses.group_by = columns.into_iter().collect();
        self
    }

    /// Sets the `HAVING` predicate. Requires a `GROUP BY`.
    pub fn having(mut self, predicate: Predicate) -> Self {
        self.clauses.having = Some(predicate);
        self
    }

    /// Replaces the `ORDER BY` terms. Ordering holds per shard only.
    pub fn order_by(mut self, terms: impl IntoIterator<Item = OrderTerm>) -> Self {
        self.clauses.order_by = terms.into_iter().collect();
        self
    }

    /// Sets `LIMIT`, applied per shard.
    pub fn limit(mut self, limit: u32) -> Self {
        self.clauses.limit = Some(limit);
        self
    }

    /// Sets `OFFSET`, applied per shard.
    pub fn offset(mut self, offset: u32) -> Self {
        self.clauses.offset = Some(offset);
        self
    }

    forward_options!();

    /// Compiles one statement per routed target.
    pub fn build(&self) -> OrmResult<Vec<(DataSource, Query)>> {
        let core = self.db.core();
        let algorithm = core.sharding().ok_or(QueryError::NoShardingAlgorithm)?;
        let model = core.registry().get::<T>()?;

        let predicate = self.clauses.where_predicate();
        let targets = route(algorithm.as_ref(), &model, predicate.as_ref())?;

        targets
            .into_iter()
            .map(|target| {
                let mut out = SqlWriter::new();
                self.clauses
                    .write_select(&mut out, &model, &target.to_string())?;
                Ok((target, out.into()))
            })
            .collect()
    }

    /// Runs every routed statement concurrently and concatenates the rows
    /// in target order.
    pub async fn get_multi(&self) -> OrmResult<Vec<T>> {
        let core = self.db.core();
        let model = core.registry().get::<T>()?;
        let statements = self.build()?;
        debug!(
            table = %model.table_name(),
            targets = statements.len(),
            "Sharded select routed"
        );

        let runs = statements.into_iter().map(|(target, query)| {
            let model = &model;
            async move {
                let connection = self
                    .db
                    .shard(&target.database)
                    .unwrap_or_else(|| self.db.connection());
                let ctx = QueryContext {
                    kind: StatementKind::Select,
                    table: target.to_string(),
                    query,
                    options: self.clauses.options,
                };
                let rows = dispatch_to(core, connection.as_ref(), ctx)
                    .await?
                    .into_rows()?;
                core.materializer().materialize_all::<T>(model, &rows)
            }
        });

        Ok(try_join_all(runs).await?.into_iter().flatten().collect())
    }
}
