//! SQLite driver.
//!
//! Implements the [`Connection`](crate::session::Connection) seam over an
//! `r2d2` pool of `rusqlite` connections. In-memory databases use a named
//! shared cache so every pooled connection sees the same data, which makes
//! them a real backing store for tests.
//!
//! # Example
//!
//! ```no_run
//! use quarry_orm::backends::sqlite::SqliteConnection;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let conn = SqliteConnection::in_memory("primary")?;
//! conn.execute_batch("CREATE TABLE test_model (id INTEGER PRIMARY KEY, first_name TEXT, age INTEGER)")?;
//! # Ok(())
//! # }
//! ```

mod backend;
mod transaction;

pub use backend::{SqliteConfig, SqliteConnection, SqliteConnector};
pub use transaction::SqliteTransaction;
