//! Statement builders.
//!
//! Every builder owns a [`Clauses`] value with the parts the statements have
//! in common and compiles it into a fresh writer on each `build()`, so a
//! builder can be built repeatedly and always yields equal queries.

// Shared by every builder with a `clauses` field.
macro_rules! forward_options {
    () => {
        /// Sends reads to the primary even when replicas exist.
        pub fn use_primary(mut self) -> Self {
            self.clauses.options.use_primary = true;
            self
        }

        /// Sets a deadline for execution.
        pub fn timeout(mut self, timeout: std::time::Duration) -> Self {
            self.clauses.options.timeout = Some(timeout);
            self
        }
    };
}

mod delete;
mod insert;
mod raw;
mod select;
mod sharded;

pub use delete::Delete;
pub use insert::{Insert, OnDuplicateKey};
pub use raw::RawQuery;
pub use select::Select;
pub use sharded::ShardedSelect;

use crate::error::{OrmResult, QueryError, QueryResult};
use crate::expr::{Column, Expression, OrderTerm, Predicate, SqlWriter, compile};
use crate::interceptor::{QueryContext, StatementKind};
use crate::model::{Entity, TableModel};
use crate::query::Query;
use crate::session::{CallOptions, ExecResult, Session, dispatch};
use crate::value::Value;

/// Clause state shared by the statement builders.
#[derive(Debug, Clone, Default)]
pub(crate) struct Clauses {
    table: Option<String>,
    where_: Vec<Predicate>,
    group_by: Vec<Column>,
    having: Option<Predicate>,
    order_by: Vec<OrderTerm>,
    limit: Option<u32>,
    offset: Option<u32>,
    options: CallOptions,
}

impl Clauses {
    /// An empty name falls back to the derived table name.
    fn set_table(&mut self, table: &str) {
        self.table = (!table.is_empty()).then(|| table.to_string());
    }

    /// The table as rendered: an explicit name verbatim, else the quoted default.
    fn table_sql(&self, model: &TableModel) -> String {
        match &self.table {
            Some(table) => table.clone(),
            None => format!("`{}`", model.table_name()),
        }
    }

    /// All top-level predicates folded with AND.
    fn where_predicate(&self) -> Option<Predicate> {
        let mut predicates = self.where_.iter().cloned();
        let first = predicates.next()?;
        Some(predicates.fold(first, Predicate::and))
    }

    fn write_where(&self, out: &mut SqlWriter, model: &TableModel) -> QueryResult<()> {
        if let Some(p) = self.where_predicate() {
            out.push_str(" WHERE ");
            compile(&Expression::Predicate(p), model, out)?;
        }
        Ok(())
    }

    /// `SELECT * FROM <table>` followed by every clause and `;`.
    fn write_select(&self, out: &mut SqlWriter, model: &TableModel, table: &str) -> QueryResult<()> {
        out.push_str("SELECT * FROM ");
        out.push_str(table);

        self.write_where(out, model)?;

        if !self.group_by.is_empty() {
            out.push_str(" GROUP BY ");
            write_list(out, model, self.group_by.iter().cloned().map(Expression::Column))?;
        }

        if let Some(having) = &self.having {
            if self.group_by.is_empty() {
                return Err(QueryError::MissingGroupBy);
            }
            out.push_str(" HAVING ");
            compile(&Expression::Predicate(having.clone()), model, out)?;
        }

        if !self.order_by.is_empty() {
            out.push_str(" ORDER BY ");
            write_list(out, model, self.order_by.iter().cloned().map(Expression::Order))?;
        }

        if let Some(limit) = self.limit {
            out.push_str(" LIMIT ");
            out.push_arg(Value::from(limit));
        }
        if let Some(offset) = self.offset {
            out.push_str(" OFFSET ");
            out.push_arg(Value::from(offset));
        }

        out.push(';');
        Ok(())
    }
}

fn write_list(
    out: &mut SqlWriter,
    model: &TableModel,
    items: impl Iterator<Item = Expression>,
) -> QueryResult<()> {
    for (i, item) in items.enumerate() {
        if i > 0 {
            out.push(',');
        }
        compile(&item, model, out)?;
    }
    Ok(())
}

/// Runs a read through the interceptor chain and materializes every row.
async fn fetch_all<T, S>(
    session: &S,
    model: &TableModel,
    kind: StatementKind,
    table: String,
    query: Query,
    options: CallOptions,
) -> OrmResult<Vec<T>>
where
    T: Entity,
    S: Session + ?Sized,
{
    let ctx = QueryContext {
        kind,
        table,
        query,
        options,
    };
    let rows = dispatch(session, ctx).await?.into_rows()?;
    session.core().materializer().materialize_all(model, &rows)
}

/// Returns the first entity or `NoRows`.
fn first<T>(entities: Vec<T>) -> OrmResult<T> {
    entities
        .into_iter()
        .next()
        .ok_or_else(|| crate::error::ResultError::NoRows.into())
}

/// Runs a write through the interceptor chain.
async fn execute<S: Session + ?Sized>(
    session: &S,
    kind: StatementKind,
    table: String,
    query: Query,
    options: CallOptions,
) -> OrmResult<ExecResult> {
    let ctx = QueryContext {
        kind,
        table,
        query,
        options,
    };
    dispatch(session, ctx).await?.into_exec()
}
