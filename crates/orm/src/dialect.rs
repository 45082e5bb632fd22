//! Engine specific SQL rendering.

use std::fmt::Debug;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::QueryResult;
use crate::expr::{Assignable, SqlWriter, column_name};
use crate::model::TableModel;

/// Renders the parts of a statement that differ between engines.
pub trait Dialect: Send + Sync + Debug {
    /// Dialect name for logs.
    fn name(&self) -> &'static str;

    /// Appends the upsert clause for `assigns`.
    fn upsert(
        &self,
        out: &mut SqlWriter,
        model: &TableModel,
        assigns: &[Assignable],
    ) -> QueryResult<()>;
}

/// `ON DUPLICATE KEY UPDATE`.
#[derive(Debug, Default, Clone, Copy)]
pub struct MySqlDialect;

impl Dialect for MySqlDialect {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn upsert(
        &self,
        out: &mut SqlWriter,
        model: &TableModel,
        assigns: &[Assignable],
    ) -> QueryResult<()> {
        out.push_str(" ON DUPLICATE KEY UPDATE ");
        write_assignments(out, model, assigns, |out, column| {
            out.push_str("=VALUES(");
            out.push_ident(column);
            out.push(')');
        })
    }
}

/// `ON CONFLICT DO UPDATE SET`, re-using values through `excluded`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteDialect;

impl Dialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn upsert(
        &self,
        out: &mut SqlWriter,
        model: &TableModel,
        assigns: &[Assignable],
    ) -> QueryResult<()> {
        out.push_str(" ON CONFLICT DO UPDATE SET ");
        write_assignments(out, model, assigns, |out, column| {
            out.push_str("=excluded.");
            out.push_ident(column);
        })
    }
}

fn write_assignments(
    out: &mut SqlWriter,
    model: &TableModel,
    assigns: &[Assignable],
    reuse: impl Fn(&mut SqlWriter, &str),
) -> QueryResult<()> {
    for (i, assign) in assigns.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        match assign {
            Assignable::Column(column) => {
                let name = column_name(model, column.name())?;
                out.push_ident(name);
                reuse(out, name);
            }
            Assignable::Assignment(assignment) => {
                out.push_ident(column_name(model, assignment.column())?);
                out.push('=');
                out.push_arg(assignment.value().clone());
            }
        }
    }
    Ok(())
}

/// Dialects selectable from configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DialectKind {
    /// [`MySqlDialect`]
    #[default]
    Mysql,
    /// [`SqliteDialect`]
    Sqlite,
}

impl DialectKind {
    /// Instantiates the dialect.
    pub fn build(self) -> Arc<dyn Dialect> {
        match self {
            DialectKind::Mysql => Arc::new(MySqlDialect),
            DialectKind::Sqlite => Arc::new(SqliteDialect),
        }
    }
}
