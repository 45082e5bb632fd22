//! Modulo hash partitioning.

use std::collections::BTreeSet;

use crate::error::{ConfigError, QueryResult};
use crate::expr::Op;

use super::{Algorithm, DataSource, Pattern};

/// Routes `key = v` to database `v mod db_base` and table `v mod table_base`.
///
/// Range comparisons cannot be pruned and broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashSharding {
    sharding_key: String,
    database: Pattern,
    table: Pattern,
}

impl HashSharding {
    /// Creates the scheme, rejecting empty keys and zero partition counts.
    pub fn new(
        sharding_key: impl Into<String>,
        database: Pattern,
        table: Pattern,
    ) -> Result<Self, ConfigError> {
        let sharding_key = sharding_key.into();
        if sharding_key.is_empty() {
            return Err(ConfigError::Invalid {
                key: "sharding.sharding_key".to_string(),
                message: "sharding key is empty".to_string(),
            });
        }
        for (key, pattern) in [("sharding.database", &database), ("sharding.table", &table)] {
            if pattern.is_sharding && pattern.base == 0 {
                return Err(ConfigError::Invalid {
                    key: format!("{key}.base"),
                    message: "partition count must be positive".to_string(),
                });
            }
        }
        Ok(Self {
            sharding_key,
            database,
            table,
        })
    }

    /// Database dimension.
    pub fn database(&self) -> &Pattern {
        &self.database
    }

    /// Table dimension.
    pub fn table(&self) -> &Pattern {
        &self.table
    }

    fn index(pattern: &Pattern, value: i64) -> u64 {
        if pattern.is_sharding {
            // base is validated non-zero; the remainder lies in 0..base
            i128::from(value).rem_euclid(i128::from(pattern.base)) as u64
        } else {
            0
        }
    }
}

impl Algorithm for HashSharding {
    fn sharding_key(&self) -> &str {
        &self.sharding_key
    }

    fn sharding(&self, op: Op, value: i64) -> QueryResult<BTreeSet<DataSource>> {
        match op {
            Op::Eq => {
                let database = self.database.name_at(Self::index(&self.database, value));
                let table = self.table.name_at(Self::index(&self.table, value));
                Ok(BTreeSet::from([DataSource { database, table }]))
            }
            _ => Ok(self.broadcast()),
        }
    }

    fn broadcast(&self) -> BTreeSet<DataSource> {
        let tables = self.table.names();
        self.database
            .names()
            .into_iter()
            .flat_map(|database| {
                tables
                    .iter()
                    .map(move |table| DataSource::new(database.clone(), table.clone()))
            })
            .collect()
    }
}
