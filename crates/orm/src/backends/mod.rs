//! Storage drivers.
//!
//! Each driver implements [`Connection`](crate::session::Connection) and a
//! matching [`Connector`](crate::replica::Connector), and is gated behind a
//! feature flag.
//!
//! | Driver | Feature | Description |
//! |--------|---------|-------------|
//! | SQLite | `sqlite` | Embedded database, used as the default and by the tests |

#[cfg(feature = "sqlite")]
pub mod sqlite;
