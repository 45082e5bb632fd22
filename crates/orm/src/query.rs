//! Compiled queries.

use std::fmt;

use crate::error::OrmResult;
use crate::expr::SqlWriter;
use crate::value::Value;

/// SQL text plus its ordered placeholder arguments.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Query {
    sql: String,
    args: Vec<Value>,
}

impl Query {
    /// Creates a query from raw parts.
    pub fn new(sql: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            args,
        }
    }

    /// SQL text.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Arguments in placeholder order.
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Consumes the query.
    pub fn into_parts(self) -> (String, Vec<Value>) {
        (self.sql, self.args)
    }
}

impl From<SqlWriter> for Query {
    fn from(writer: SqlWriter) -> Self {
        let (sql, args) = writer.into_parts();
        Self { sql, args }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)
    }
}

/// Anything that compiles to a single [`Query`].
pub trait QueryBuilder {
    /// Compiles the statement. Calling it twice yields equal queries.
    fn build(&self) -> OrmResult<Query>;
}
