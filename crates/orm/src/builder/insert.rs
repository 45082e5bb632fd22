//! `INSERT` builder with optional upsert.

use crate::error::{OrmResult, QueryError};
use crate::expr::{Assignable, SqlWriter, column_name};
use crate::interceptor::StatementKind;
use crate::materializer::Materializer;
use crate::model::Entity;
use crate::query::{Query, QueryBuilder};
use crate::session::{CallOptions, ExecResult, Session};

use super::execute;

/// Builds and runs `INSERT INTO ...` for entity `T`.
///
/// Without [`columns`](Insert::columns) every field is written.
pub struct Insert<'s, T, S: ?Sized> {
    session: &'s S,
    values: Vec<T>,
    columns: Vec<String>,
    upsert: Option<Vec<Assignable>>,
    clauses: InsertClauses,
}

#[derive(Debug, Default)]
struct InsertClauses {
    options: CallOptions,
}

impl<'s, T: Entity, S: Session + ?Sized> Insert<'s, T, S> {
    /// Starts an insert on `session`.
    pub fn new(session: &'s S) -> Self {
        Self {
            session,
            values: Vec::new(),
            columns: Vec::new(),
            upsert: None,
            clauses: InsertClauses::default(),
        }
    }

    /// Replaces the rows to insert.
    pub fn values(mut self, values: impl IntoIterator<Item = T>) -> Self {
        self.values = values.into_iter().collect();
        self
    }

    /// Restricts the written columns, given by field name.
    pub fn columns<I, C>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Turns the insert into an upsert.
    pub fn on_duplicate_key(self) -> OnDuplicateKey<'s, T, S> {
        OnDuplicateKey { insert: self }
    }

    forward_options!();

    /// Runs the statement.
    pub async fn exec(&self) -> OrmResult<ExecResult> {
        let model = self.session.core().registry().get::<T>()?;
        let query = self.build()?;
        execute(
            self.session,
            StatementKind::Insert,
            format!("`{}`", model.table_name()),
            query,
            self.clauses.options,
        )
        .await
    }
}

impl<T: Entity, S: Session + ?Sized> QueryBuilder for Insert<'_, T, S> {
    fn build(&self) -> OrmResult<Query> {
        if self.values.is_empty() {
            return Err(QueryError::ZeroRows.into());
        }
        let core = self.session.core();
        let model = core.registry().get::<T>()?;

        let fields: Vec<&str> = if self.columns.is_empty() {
            model.fields().iter().map(|f| f.name.as_str()).collect()
        } else {
            self.columns.iter().map(String::as_str).collect()
        };

        let mut out = SqlWriter::new();
        out.push_str("INSERT INTO ");
        out.push_ident(model.table_name());
        out.push('(');
        for (i, field) in fields.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            out.push_ident(column_name(&model, field)?);
        }
        out.push_str(") VALUES");

        let materializer = core.materializer();
        for (row, value) in self.values.iter().enumerate() {
            if row > 0 {
                out.push(',');
            }
            out.push('(');
            for (i, field) in fields.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_arg(materializer.read_column(&model, value, field)?);
            }
            out.push(')');
        }

        if let Some(assigns) = &self.upsert {
            core.dialect().upsert(&mut out, &model, assigns)?;
        }
        out.push(';');
        Ok(out.into())
    }
}

/// Pending upsert; [`update`](OnDuplicateKey::update) names what changes on conflict.
pub struct OnDuplicateKey<'s, T, S: ?Sized> {
    insert: Insert<'s, T, S>,
}

impl<'s, T: Entity, S: Session + ?Sized> OnDuplicateKey<'s, T, S> {
    /// Sets the conflict assignments.
    ///
    /// A bare [`Column`](crate::expr::Column) re-uses the inserted value, an
    /// [`Assignment`](crate::expr::Assignment) binds an explicit one.
    pub fn update<I, A>(mut self, assigns: I) -> Insert<'s, T, S>
    where
        I: IntoIterator<Item = A>,
        A: Into<Assignable>,
    {
        self.insert.upsert = Some(assigns.into_iter().map(Into::into).collect());
        self.insert
    }
}
