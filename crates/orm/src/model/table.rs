//! Table models built from record descriptors.

use std::collections::HashMap;

use crate::error::{SchemaError, SchemaResult};
use crate::value::ValueType;

use super::descriptor::{RecordDescriptor, TypeDescriptor};

/// A mapped field.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    /// Rust field identifier.
    pub name: String,
    /// Column the field is stored in.
    pub column_name: String,
    /// Field type.
    pub value_type: ValueType,
    /// Whether the column accepts NULL.
    pub nullable: bool,
    /// Declaration index, used by the positional materializer.
    pub offset: usize,
}

/// Table metadata for one entity type.
#[derive(Debug, Clone)]
pub struct TableModel {
    table_name: String,
    fields: Vec<Field>,
    by_name: HashMap<String, usize>,
    by_tag: HashMap<String, usize>,
    by_column: HashMap<String, usize>,
}

impl TableModel {
    /// Builds a model from a descriptor, following indirection.
    pub fn from_descriptor(descriptor: &TypeDescriptor) -> SchemaResult<Self> {
        match descriptor.resolve() {
            TypeDescriptor::Record(record) => Self::from_record(record),
            other => Err(SchemaError::UnsupportedType {
                type_name: other.type_name(),
            }),
        }
    }

    fn from_record(record: &RecordDescriptor) -> SchemaResult<Self> {
        let table_name = underscore_name(record.name);
        let mut model = Self {
            table_name,
            fields: Vec::with_capacity(record.fields.len()),
            by_name: HashMap::new(),
            by_tag: HashMap::new(),
            by_column: HashMap::new(),
        };

        for (offset, fd) in record.fields.iter().enumerate() {
            let column_name = underscore_name(fd.name);
            if model.by_column.contains_key(&column_name) {
                return Err(SchemaError::DuplicateColumn {
                    table: model.table_name,
                    column: column_name,
                });
            }

            let tag = fd.tag.unwrap_or(fd.name).to_string();
            if model.by_tag.contains_key(&tag) {
                return Err(SchemaError::DuplicateTag {
                    table: model.table_name,
                    tag,
                });
            }

            model.by_name.insert(fd.name.to_string(), offset);
            model.by_tag.insert(tag, offset);
            model.by_column.insert(column_name.clone(), offset);
            model.fields.push(Field {
                name: fd.name.to_string(),
                column_name,
                value_type: fd.value_type,
                nullable: fd.nullable,
                offset,
            });
        }

        Ok(model)
    }

    /// The derived table name.
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// All fields in declaration order.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Number of mapped columns.
    pub fn column_count(&self) -> usize {
        self.fields.len()
    }

    /// Column names in declaration order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.column_name.as_str())
    }

    /// Looks up a field by its Rust name.
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.by_name.get(name).map(|&i| &self.fields[i])
    }

    /// Looks up a field by its mapping key (tag, or name when untagged).
    pub fn field_by_tag(&self, tag: &str) -> Option<&Field> {
        self.by_tag.get(tag).map(|&i| &self.fields[i])
    }

    /// Looks up a field by its column name.
    pub fn field_by_column(&self, column: &str) -> Option<&Field> {
        self.by_column.get(column).map(|&i| &self.fields[i])
    }

    /// Resolves a result set column: column name first, then field name.
    pub fn field_for_row_column(&self, column: &str) -> Option<&Field> {
        self.field_by_column(column).or_else(|| self.field(column))
    }
}

/// Converts CamelCase to snake_case.
///
/// An underscore is inserted before every uppercase letter except a leading
/// one, and the letter is lowercased. Already snake-cased input is unchanged.
pub fn underscore_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, c) in name.chars().enumerate() {
        if c.is_uppercase() {
            if i != 0 {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}
