//! `#[derive(Entity)]` for quarry-orm.
//!
//! Generates the record descriptor the registry maps to a table, and the
//! by-name and by-index field accessors the materializers use.
//!
//! ```ignore
//! #[derive(Debug, Default, Entity)]
//! struct TestModel {
//!     #[orm(tag = "identity")]
//!     id: i64,
//!     first_name: String,
//!     age: Option<i8>,
//! }
//! ```

use proc_macro::TokenStream;

mod entity;

#[proc_macro_derive(Entity, attributes(orm))]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    entity::derive_entity(input.into()).into()
}
