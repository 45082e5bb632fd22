//! Expression compiler.

use crate::error::{QueryError, QueryResult};
use crate::model::TableModel;
use crate::value::Value;

use super::{Expression, Predicate};

/// SQL text under construction plus its bound arguments.
///
/// Every `?` written through [`SqlWriter::push_arg`] appends exactly one
/// argument, so placeholders and arguments stay aligned.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SqlWriter {
    sql: String,
    args: Vec<Value>,
}

impl SqlWriter {
    /// Creates an empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends raw SQL text.
    pub fn push_str(&mut self, s: &str) {
        self.sql.push_str(s);
    }

    /// Appends a single character.
    pub fn push(&mut self, c: char) {
        self.sql.push(c);
    }

    /// Appends a backtick-quoted identifier.
    pub fn push_ident(&mut self, ident: &str) {
        self.sql.push('`');
        self.sql.push_str(ident);
        self.sql.push('`');
    }

    /// Appends a placeholder bound to `value`.
    pub fn push_arg(&mut self, value: Value) {
        self.sql.push('?');
        self.args.push(value);
    }

    /// SQL written so far.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Arguments bound so far.
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Consumes the writer.
    pub fn into_parts(self) -> (String, Vec<Value>) {
        (self.sql, self.args)
    }
}

/// Resolves a field name to its column, or fails with `IllegalField`.
pub(crate) fn column_name<'m>(model: &'m TableModel, field: &str) -> QueryResult<&'m str> {
    model
        .field(field)
        .map(|f| f.column_name.as_str())
        .ok_or_else(|| QueryError::IllegalField {
            field: field.to_string(),
        })
}

/// Compiles `expr` against `model`, appending to `out`.
///
/// A predicate operand is parenthesized only when it is itself a predicate.
/// `NOT` has an empty left side, so its output starts with a space.
pub fn compile(expr: &Expression, model: &TableModel, out: &mut SqlWriter) -> QueryResult<()> {
    match expr {
        Expression::Column(column) => {
            out.push_ident(column_name(model, column.name())?);
        }
        Expression::Aggregate(aggregate) => {
            let column = column_name(model, aggregate.column())?;
            out.push_str(aggregate.function().as_str());
            out.push('(');
            out.push_ident(column);
            out.push(')');
        }
        Expression::Value(value) => out.push_arg(value.clone()),
        Expression::Order(term) => {
            out.push_ident(column_name(model, term.column())?);
            out.push(' ');
            out.push_str(term.direction().as_str());
        }
        Expression::Predicate(predicate) => compile_predicate(predicate, model, out)?,
    }
    Ok(())
}

fn compile_predicate(p: &Predicate, model: &TableModel, out: &mut SqlWriter) -> QueryResult<()> {
    if let Some(left) = p.left() {
        compile_operand(left, model, out)?;
    }
    out.push(' ');
    out.push_str(p.op().as_str());
    out.push(' ');
    compile_operand(p.right(), model, out)
}

fn compile_operand(side: &Expression, model: &TableModel, out: &mut SqlWriter) -> QueryResult<()> {
    if side.is_predicate() {
        out.push('(');
        compile(side, model, out)?;
        out.push(')');
        Ok(())
    } else {
        compile(side, model, out)
    }
}
