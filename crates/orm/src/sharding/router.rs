//! Predicate-driven shard routing.

use std::collections::BTreeSet;

use crate::error::{QueryError, QueryResult};
use crate::expr::{Expression, Op, Predicate};
use crate::model::TableModel;
use crate::value::Value;

use super::{Algorithm, DataSource};

/// Computes the targets a `WHERE` clause can touch.
///
/// `AND` intersects, `OR` unions, and anything that cannot be pruned
/// broadcasts. No clause at all also broadcasts. An empty result is an error.
pub fn route(
    algorithm: &dyn Algorithm,
    model: &TableModel,
    predicate: Option<&Predicate>,
) -> QueryResult<BTreeSet<DataSource>> {
    let targets = match predicate {
        Some(p) => route_predicate(algorithm, model, p)?,
        None => algorithm.broadcast(),
    };
    if targets.is_empty() {
        return Err(QueryError::NoDataSource);
    }
    Ok(targets)
}

fn route_predicate(
    algorithm: &dyn Algorithm,
    model: &TableModel,
    p: &Predicate,
) -> QueryResult<BTreeSet<DataSource>> {
    match p.op() {
        Op::And | Op::Or => {
            let left = as_predicate(p.left(), "left")?;
            let right = as_predicate(Some(p.right()), "right")?;
            let left = route_predicate(algorithm, model, left)?;
            let right = route_predicate(algorithm, model, right)?;
            Ok(if p.op() == Op::And {
                left.intersection(&right).cloned().collect()
            } else {
                left.union(&right).cloned().collect()
            })
        }
        Op::Eq | Op::Lt | Op::Gt => {
            let column = match p.left() {
                Some(Expression::Column(column)) => column,
                _ => return Err(QueryError::NotAColumn),
            };
            let field = model
                .field(column.name())
                .ok_or_else(|| QueryError::IllegalField {
                    field: column.name().to_string(),
                })?;
            let value = match p.right() {
                Expression::Value(value) => value,
                _ => return Err(QueryError::NotAValue),
            };

            let key = algorithm.sharding_key();
            if field.name != key && field.column_name != key {
                return Ok(algorithm.broadcast());
            }
            match value {
                Value::Int(v) => algorithm.sharding(p.op(), *v),
                _ => Ok(algorithm.broadcast()),
            }
        }
        // a negation cannot be pruned
        Op::Not => Ok(algorithm.broadcast()),
    }
}

fn as_predicate<'e>(side: Option<&'e Expression>, name: &'static str) -> QueryResult<&'e Predicate> {
    match side {
        Some(Expression::Predicate(p)) => Ok(p),
        _ => Err(QueryError::NotAPredicate { side: name }),
    }
}
