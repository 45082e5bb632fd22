//! Quarry persistence-access layer
//!
//! This crate compiles typed query trees into parameterized SQL and routes the
//! result to the right physical target when data is sharded or replicated.
//!
//! # Features
//!
//! - **Expression compiler**: predicate trees to SQL with exact
//!   parenthesization and left-to-right argument order
//! - **Statement builders**: `SELECT`, `INSERT` (with upsert), `DELETE` and raw SQL
//! - **Shard router**: the same predicate tree pruned to the minimal target set
//! - **Replica selector**: DNS-discovered read replicas with round-robin reads
//! - **Interceptors**: access log and timing around every statement
//! - **Transactions**: scoped callbacks with rollback on error or panic
//!
//! # Driver Features
//!
//! - `sqlite` (default) - pooled SQLite with shared in-memory databases
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use quarry_orm::backends::sqlite::SqliteConnection;
//! use quarry_orm::expr::col;
//! use quarry_orm::{Db, Entity, OrmResult, Session};
//!
//! #[derive(Debug, Default, Entity)]
//! struct TestModel {
//!     id: i64,
//!     first_name: String,
//!     age: i8,
//! }
//!
//! # async fn example() -> OrmResult<()> {
//! let conn = SqliteConnection::in_memory("primary")?;
//! conn.execute_batch("CREATE TABLE test_model (id INTEGER PRIMARY KEY, first_name TEXT, age INTEGER)")?;
//! let db = Db::builder(Arc::new(conn)).build();
//!
//! db.insert::<TestModel>()
//!     .values([TestModel { id: 1, first_name: "Tom".into(), age: 18 }])
//!     .exec()
//!     .await?;
//!
//! let tom = db
//!     .select::<TestModel>()
//!     .where_([col("id").eq(1)])
//!     .get()
//!     .await?;
//! assert_eq!(tom.age, 18);
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │             Select / Insert / Delete / RawQuery           │
//! │                       ShardedSelect                       │
//! ├───────────────┬─────────────────────┬─────────────────────┤
//! │   Registry    │ Expression compiler │    Shard router     │
//! ├───────────────┴─────────────────────┴─────────────────────┤
//! │                   Interceptor chain                       │
//! ├───────────────────────────────────────────────────────────┤
//! │          MasterSlaves (primary + ReplicaSelector)         │
//! ├───────────────────────────────────────────────────────────┤
//! │                    Connection (driver)                    │
//! └───────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

// Lets `#[derive(Entity)]` refer to `::quarry_orm` from inside this crate.
extern crate self as quarry_orm;

pub mod backends;
pub mod builder;
pub mod config;
pub mod dialect;
pub mod error;
pub mod expr;
pub mod interceptor;
pub mod materializer;
pub mod model;
pub mod query;
pub mod replica;
pub mod session;
pub mod sharding;
pub mod value;

// Re-export commonly used types at crate root
pub use config::OrmConfig;
pub use error::{OrmError, OrmResult};
pub use model::{Describe, Entity, Registry, TableModel};
pub use query::{Query, QueryBuilder};
pub use session::{CallOptions, Connection, Db, DbBuilder, Session, Tx};
pub use value::{SqlType, Value, ValueType};

// Re-export the builders
pub use builder::{Delete, Insert, OnDuplicateKey, RawQuery, Select, ShardedSelect};

// Re-export the derive under the trait's name
pub use quarry_derive::Entity;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
