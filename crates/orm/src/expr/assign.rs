//! Upsert assignments.

use crate::value::Value;

use super::Column;

/// `column = ?` with a bound value.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    column: String,
    value: Value,
}

/// Assigns `value` to `column` on conflict.
pub fn assign(column: impl Into<String>, value: impl Into<Value>) -> Assignment {
    Assignment {
        column: column.into(),
        value: value.into(),
    }
}

impl Assignment {
    /// Field name.
    pub fn column(&self) -> &str {
        &self.column
    }

    /// Bound value.
    pub fn value(&self) -> &Value {
        &self.value
    }
}

/// One entry of an upsert update list.
#[derive(Debug, Clone, PartialEq)]
pub enum Assignable {
    /// Re-use the value the insert tried to write.
    Column(Column),
    /// Write an explicit value.
    Assignment(Assignment),
}

impl From<Column> for Assignable {
    fn from(column: Column) -> Self {
        Assignable::Column(column)
    }
}

impl From<Assignment> for Assignable {
    fn from(assignment: Assignment) -> Self {
        Assignable::Assignment(assignment)
    }
}
