//! `DELETE` builder.

use std::marker::PhantomData;

use crate::error::OrmResult;
use crate::expr::{Predicate, SqlWriter};
use crate::interceptor::StatementKind;
use crate::model::Entity;
use crate::query::{Query, QueryBuilder};
use crate::session::{ExecResult, Session};

use super::{Clauses, execute};

/// Builds and runs `DELETE FROM ...` for entity `T`.
pub struct Delete<'s, T, S: ?Sized> {
    session: &'s S,
    clauses: Clauses,
    _entity: PhantomData<fn() -> T>,
}

impl<'s, T: Entity, S: Session + ?Sized> Delete<'s, T, S> {
    /// Starts a delete on `session`.
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

    forward_options!();

    /// Runs the statement.
    pub async fn exec(&self) -> OrmResult<ExecResult> {
        let model = self.session.core().registry().get::<T>()?;
        let query = self.build()?;
        execute(
            self.session,
            StatementKind::Delete,
            self.clauses.table_sql(&model),
            query,
            self.clauses.options,
        )
        .await
    }
}

impl<T: Entity, S: Session + ?Sized> QueryBuilder for Delete<'_, T, S> {
    fn build(&self) -> OrmResult<Query> {
        let model = self.session.core().registry().get::<T>()?;
        let mut out = SqlWriter::new();
        out.push_str("DELETE FROM ");
        out.push_str(&self.clauses.table_sql(&model));
        self.clauses.write_where(&mut out, &model)?;
        out.push(';');
        Ok(out.into())
    }
}
