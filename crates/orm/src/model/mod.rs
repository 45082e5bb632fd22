//! Entity metadata.
//!
//! - [`Describe`] / [`TypeDescriptor`] - static shape of a type
//! - [`Entity`] - field accessors used by the materializers and `INSERT`
//! - [`TableModel`] - column mapping derived from a descriptor
//! - [`Registry`] - cached, concurrency-safe model lookup

mod descriptor;
mod registry;
mod table;

pub use descriptor::{Describe, FieldDescriptor, RecordDescriptor, TypeDescriptor};
pub use registry::Registry;
pub use table::{Field, TableModel, underscore_name};

use crate::error::ValueError;
use crate::value::Value;

/// A record that can be written to and read from a table.
///
/// Usually implemented with `#[derive(Entity)]`.
pub trait Entity: Describe + Default + Send + Sync {
    /// Reads a field by Rust name.
    fn get_field(&self, name: &str) -> Result<Value, ValueError>;

    /// Writes a field by Rust name.
    fn set_field(&mut self, name: &str, value: Value) -> Result<(), ValueError>;

    /// Reads a field by declaration index.
    fn get_at(&self, index: usize) -> Result<Value, ValueError>;

    /// Writes a field by declaration index.
    fn set_at(&mut self, index: usize, value: Value) -> Result<(), ValueError>;
}
