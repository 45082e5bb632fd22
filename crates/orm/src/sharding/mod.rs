//! Horizontal partitioning.
//!
//! An [`Algorithm`] maps a comparison on the shard key to physical
//! [`DataSource`] targets; [`route`] folds a whole predicate tree into the
//! minimal target set.

mod hash;
mod router;

pub use hash::HashSharding;
pub use router::route;

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::QueryResult;
use crate::expr::Op;

/// Partitioning of one dimension (database or table).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pattern {
    /// Number of partitions.
    #[serde(default = "default_base")]
    pub base: u64,

    /// Name, or name prefix when partitioned.
    pub default_name: String,

    /// Whether this dimension is partitioned.
    #[serde(default)]
    pub is_sharding: bool,
}

fn default_base() -> u64 {
    1
}

impl Pattern {
    /// A dimension split into `base` partitions named `{name}_{index}`.
    pub fn sharded(default_name: impl Into<String>, base: u64) -> Self {
        Self {
            base,
            default_name: default_name.into(),
            is_sharding: true,
        }
    }

    /// An unpartitioned dimension.
    pub fn single(default_name: impl Into<String>) -> Self {
        Self {
            base: 1,
            default_name: default_name.into(),
            is_sharding: false,
        }
    }

    /// Name of partition `index`.
    pub fn name_at(&self, index: u64) -> String {
        if self.is_sharding {
            format!("{}_{}", self.default_name, index)
        } else {
            self.default_name.clone()
        }
    }

    /// Every name of this dimension.
    pub fn names(&self) -> Vec<String> {
        if self.is_sharding {
            (0..self.base).map(|i| self.name_at(i)).collect()
        } else {
            vec![self.default_name.clone()]
        }
    }
}

/// A physical target.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DataSource {
    /// Database name.
    pub database: String,
    /// Table name.
    pub table: String,
}

impl DataSource {
    /// Creates a target.
    pub fn new(database: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            table: table.into(),
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "`{}`.`{}`", self.database, self.table)
    }
}

/// A partitioning scheme.
pub trait Algorithm: Send + Sync + fmt::Debug {
    /// The field the scheme partitions on.
    fn sharding_key(&self) -> &str;

    /// Targets for `sharding_key <op> value`.
    fn sharding(&self, op: Op, value: i64) -> QueryResult<BTreeSet<DataSource>>;

    /// Every target of the scheme.
    fn broadcast(&self) -> BTreeSet<DataSource>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_names() {
        assert_eq!(Pattern::sharded("order_db", 3).names(), vec![
            "order_db_0",
            "order_db_1",
            "order_db_2"
        ]);
        assert_eq!(Pattern::single("order_tab").names(), vec!["order_tab"]);
        assert_eq!(Pattern::single("order_tab").name_at(7), "order_tab");
    }

    #[test]
    fn test_data_source_display() {
        assert_eq!(DataSource::new("db_1", "tab_0").to_string(), "`db_1`.`tab_0`");
    }

    #[test]
    fn test_pattern_deserialize_defaults() {
        let pattern: Pattern = serde_json::from_str(r#"{"default_name": "user_db"}"#).unwrap();
        assert_eq!(pattern, Pattern::single("user_db"));
    }
}
