//! Caller supplied SQL.

use std::marker::PhantomData;

use crate::error::OrmResult;
use crate::interceptor::StatementKind;
use crate::model::Entity;
use crate::query::{Query, QueryBuilder};
use crate::session::{CallOptions, ExecResult, Session};
use crate::value::Value;

use super::{execute, fetch_all, first};

/// SQL passed through verbatim, with results mapped onto entity `T`.
///
/// `T` only matters for [`get`](RawQuery::get) and
/// [`get_multi`](RawQuery::get_multi).
pub struct RawQuery<'s, T, S: ?Sized> {
    session: &'s S,
    sql: String,
    args: Vec<Value>,
    clauses: RawClauses,
    _entity: PhantomData<fn() -> T>,
}

#[derive(Debug, Default)]
struct RawClauses {
    options: CallOptions,
}

impl<'s, T: Entity, S: Session + ?Sized> RawQuery<'s, T, S> {
    /// Wraps `sql` and its placeholder arguments.
    pub fn new(session: &'s S, sql: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            session,
            sql: sql.into(),
            args,
            clauses: RawClauses::default(),
            _entity: PhantomData,
        }
    }

    forward_options!();

    /// Runs the query and returns the first row.
    pub async fn get(&self) -> OrmResult<T> {
        first(self.get_multi().await?)
    }

    /// Runs the query and returns every row.
    pub async fn get_multi(&self) -> OrmResult<Vec<T>> {
        let model = self.session.core().registry().get::<T>()?;
        fetch_all(
            self.session,
            &model,
            StatementKind::Raw,
            format!("`{}`", model.table_name()),
            self.build()?,
            self.clauses.options,
        )
        .await
    }

    /// Runs the statement without reading rows.
    pub async fn exec(&self) -> OrmResult<ExecResult> {
        let model = self.session.core().registry().get::<T>()?;
        execute(
            self.session,
            StatementKind::RawExec,
            format!("`{}`", model.table_name()),
            self.build()?,
            self.clauses.options,
        )
        .await
    }
}

impl<T, S: ?Sized> QueryBuilder for RawQuery<'_, T, S> {
    fn build(&self) -> OrmResult<Query> {
        Ok(Query::new(self.sql.clone(), self.args.clone()))
    }
}
