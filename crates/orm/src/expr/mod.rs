//! Query expression tree.
//!
//! Trees are built with [`col`], the aggregate helpers and the comparison
//! methods, then combined with [`Predicate::and`], [`Predicate::or`] and
//! [`not`]. Combinators always wrap their operands in a new node.
//!
//! ```
//! use quarry_orm::expr::{col, not};
//!
//! let adults = col("age").gt(18).and(col("age").lt(35));
//! let excluded = not(col("first_name").eq("Tom"));
//! let _ = adults.or(excluded);
//! ```

mod assign;
mod compile;

pub use assign::{Assignable, Assignment, assign};
pub use compile::{SqlWriter, compile};
pub(crate) use compile::column_name;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// Operators of a [`Predicate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    /// Logical AND.
    And,
    /// Logical OR.
    Or,
    /// Logical NOT (unary).
    Not,
    /// Less than.
    Lt,
    /// Greater than.
    Gt,
    /// Equality.
    Eq,
}

impl Op {
    /// The SQL token for this operator.
    pub fn as_str(self) -> &'static str {
        match self {
            Op::And => "AND",
            Op::Or => "OR",
            Op::Not => "NOT",
            Op::Lt => "<",
            Op::Gt => ">",
            Op::Eq => "=",
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregate functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AggregateFunction {
    /// `SUM`
    Sum,
    /// `AVG`
    Avg,
    /// `COUNT`
    Count,
    /// `MAX`
    Max,
    /// `MIN`
    Min,
}

impl AggregateFunction {
    /// The SQL function name.
    pub fn as_str(self) -> &'static str {
        match self {
            AggregateFunction::Sum => "SUM",
            AggregateFunction::Avg => "AVG",
            AggregateFunction::Count => "COUNT",
            AggregateFunction::Max => "MAX",
            AggregateFunction::Min => "MIN",
        }
    }
}

/// Sort direction of an order term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    /// Ascending.
    Asc,
    /// Descending.
    Desc,
}

impl Direction {
    /// The SQL keyword.
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

/// A reference to an entity field by its Rust name.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    name: String,
}

/// Creates a column reference.
pub fn col(name: impl Into<String>) -> Column {
    Column { name: name.into() }
}

impl Column {
    /// Field name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `self = value`
    pub fn eq(self, value: impl IntoExpression) -> Predicate {
        Predicate::binary(self.into_expression(), Op::Eq, value.into_expression())
    }

    /// `self < value`
    pub fn lt(self, value: impl IntoExpression) -> Predicate {
        Predicate::binary(self.into_expression(), Op::Lt, value.into_expression())
    }

    /// `self > value`
    pub fn gt(self, value: impl IntoExpression) -> Predicate {
        Predicate::binary(self.into_expression(), Op::Gt, value.into_expression())
    }
}

/// An aggregate call over a single field.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregate {
    function: AggregateFunction,
    column: String,
}

impl Aggregate {
    /// Creates an aggregate over `column`.
    pub fn new(function: AggregateFunction, column: impl Into<String>) -> Self {
        Self {
            function,
            column: column.into(),
        }
    }

    /// Aggregate function.
    pub fn function(&self) -> AggregateFunction {
        self.function
    }

    /// Target field name.
    pub fn column(&self) -> &str {
        &self.column
    }

    /// `self = value`
    pub fn eq(self, value: impl IntoExpression) -> Predicate {
        Predicate::binary(self.into_expression(), Op::Eq, value.into_expression())
    }

    /// `self < value`
    pub fn lt(self, value: impl IntoExpression) -> Predicate {
        Predicate::binary(self.into_expression(), Op::Lt, value.into_expression())
    }

    /// `self > value`
    pub fn gt(self, value: impl IntoExpression) -> Predicate {
        Predicate::binary(self.into_expression(), Op::Gt, value.into_expression())
    }
}

/// `SUM(column)`
pub fn sum(column: impl Into<String>) -> Aggregate {
    Aggregate::new(AggregateFunction::Sum, column)
}

/// `AVG(column)`
pub fn avg(column: impl Into<String>) -> Aggregate {
    Aggregate::new(AggregateFunction::Avg, column)
}

/// `COUNT(column)`
pub fn count(column: impl Into<String>) -> Aggregate {
    Aggregate::new(AggregateFunction::Count, column)
}

/// `MAX(column)`
pub fn max(column: impl Into<String>) -> Aggregate {
    Aggregate::new(AggregateFunction::Max, column)
}

/// `MIN(column)`
pub fn min(column: impl Into<String>) -> Aggregate {
    Aggregate::new(AggregateFunction::Min, column)
}

/// A column with a sort direction.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderTerm {
    column: String,
    direction: Direction,
}

impl OrderTerm {
    /// Field name.
    pub fn column(&self) -> &str {
        &self.column
    }

    /// Sort direction.
    pub fn direction(&self) -> Direction {
        self.direction
    }
}

/// Ascending order on `column`.
pub fn asc(column: impl Into<String>) -> OrderTerm {
    OrderTerm {
        column: column.into(),
        direction: Direction::Asc,
    }
}

/// Descending order on `column`.
pub fn desc(column: impl Into<String>) -> OrderTerm {
    OrderTerm {
        column: column.into(),
        direction: Direction::Desc,
    }
}

/// A binary or unary operation.
///
/// Unary `NOT` has no left operand.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    left: Option<Box<Expression>>,
    op: Op,
    right: Box<Expression>,
}

impl Predicate {
    fn binary(left: Expression, op: Op, right: Expression) -> Self {
        Self {
            left: Some(Box::new(left)),
            op,
            right: Box::new(right),
        }
    }

    #[cfg(test)]
    pub(crate) fn from_parts(left: Option<Expression>, op: Op, right: Expression) -> Self {
        Self {
            left: left.map(Box::new),
            op,
            right: Box::new(right),
        }
    }

    /// `(self) AND (other)`
    pub fn and(self, other: Predicate) -> Predicate {
        Predicate::binary(Expression::Predicate(self), Op::And, Expression::Predicate(other))
    }

    /// `(self) OR (other)`
    pub fn or(self, other: Predicate) -> Predicate {
        Predicate::binary(Expression::Predicate(self), Op::Or, Expression::Predicate(other))
    }

    /// Left operand, absent for `NOT`.
    pub fn left(&self) -> Option<&Expression> {
        self.left.as_deref()
    }

    /// Operator.
    pub fn op(&self) -> Op {
        self.op
    }

    /// Right operand.
    pub fn right(&self) -> &Expression {
        &self.right
    }
}

/// `NOT (predicate)`
pub fn not(predicate: Predicate) -> Predicate {
    Predicate {
        left: None,
        op: Op::Not,
        right: Box::new(Expression::Predicate(predicate)),
    }
}

/// A node of the expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// Field reference.
    Column(Column),
    /// Bound literal.
    Value(Value),
    /// Aggregate call.
    Aggregate(Aggregate),
    /// Operator node.
    Predicate(Predicate),
    /// Order term.
    Order(OrderTerm),
}

impl Expression {
    /// Returns true for predicate nodes.
    pub fn is_predicate(&self) -> bool {
        matches!(self, Expression::Predicate(_))
    }
}

/// Conversion into an expression node.
///
/// Literal types become [`Expression::Value`].
pub trait IntoExpression {
    /// Performs the conversion.
    fn into_expression(self) -> Expression;
}

impl IntoExpression for Expression {
    fn into_expression(self) -> Expression {
        self
    }
}

impl IntoExpression for Column {
    fn into_expression(self) -> Expression {
        Expression::Column(self)
    }
}

impl IntoExpression for Aggregate {
    fn into_expression(self) -> Expression {
        Expression::Aggregate(self)
    }
}

impl IntoExpression for Predicate {
    fn into_expression(self) -> Expression {
        Expression::Predicate(self)
    }
}

impl IntoExpression for OrderTerm {
    fn into_expression(self) -> Expression {
        Expression::Order(self)
    }
}

impl IntoExpression for Value {
    fn into_expression(self) -> Expression {
        Expression::Value(self)
    }
}

macro_rules! literal_into_expression {
    ($($t:ty),*) => {
        $(
            impl IntoExpression for $t {
                fn into_expression(self) -> Expression {
                    Expression::Value(Value::from(self))
                }
            }
        )*
    };
}

literal_into_expression!(
    bool, i8, i16, i32, i64, u8, u16, u32, f32, f64, String, &str, Vec<u8>
);

impl<T: Into<Value>> IntoExpression for Option<T> {
    fn into_expression(self) -> Expression {
        Expression::Value(self.map_or(Value::Null, Into::into))
    }
}
