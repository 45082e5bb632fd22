//! `SELECT` builder.

use std::marker::PhantomData;

use crate::error::OrmResult;
use crate::expr::{Column, OrderTerm, Predicate, SqlWriter};
use crate::interceptor::StatementKind;
use crate::model::Entity;
use crate::query::{Query, QueryBuilder};
use crate::session::Session;

use super::{Clauses, fetch_all, first};

/// Builds and runs `SELECT * FROM ...` for entity `T`.
///
/// ```ignore
/// let adults: Vec<TestModel> = db
///     .select::<TestModel>()
///     .where_([col("age").gt(18), col("age").lt(35)])
///     .order_by([asc("age")])
///     .get_multi()
///     .await?;
/// ```
pub struct Select<'s, T, S: ?Sized> {
    session: &'s S,
    clauses: Clauses,
    _entity: PhantomData<fn() -> T>,
}

impl<'s, T: Entity, S: Session + ?Sized> Select<'s, T, S> {
    /// Starts a select on `session`.
    pub fn new(session: &'s S) -> Self {
        Self {
            session,
            clauses: Clauses::default(),
            _entity: PhantomData,
        }
    }

    /// Overrides the table, emitted verbatim. An empty name keeps the default.
    pub fn from(mut self, table: &str) -> Self {
        self.clauses.set_table(table);
        self
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

    /// Replaces the `ORDER BY` terms.
    pub fn order_by(mut self, terms: impl IntoIterator<Item = OrderTerm>) -> Self {
        self.clauses.order_by = terms.into_iter().collect();
        self
    }

    /// Sets `LIMIT`.
    pub fn limit(mut self, limit: u32) -> Self {
        self.clauses.limit = Some(limit);
        self
    }

    /// Sets `OFFSET`.
    pub fn offset(mut self, offset: u32) -> Self {
        self.clauses.offset = Some(offset);
        self
    }

    forward_options!();

    /// Runs the query and returns the first row.
    pub async fn get(&self) -> OrmResult<T> {
        first(self.get_multi().await?)
    }

    /// Runs the query and returns every row.
    pub async fn get_multi(&self) -> OrmResult<Vec<T>> {
        let model = self.session.core().registry().get::<T>()?;
        let query = self.build()?;
        fetch_all(
            self.session,
            &model,
            StatementKind::Select,
            self.clauses.table_sql(&model),
            query,
            self.clauses.options,
        )
        .await
    }
}

impl<T: Entity, S: Session + ?Sized> QueryBuilder for Select<'_, T, S> {
    fn build(&self) -> OrmResult<Query> {
        let model = self.session.core().registry().get::<T>()?;
        let mut out = SqlWriter::new();
        self.clauses
            .write_select(&mut out, &model, &self.clauses.table_sql(&model))?;
        Ok(out.into())
    }
}
