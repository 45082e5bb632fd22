//! Copying result rows into entities and reading entity fields back out.
//!
//! Two strategies share one contract: [`ReflectiveMaterializer`] addresses
//! fields by name, [`PositionalMaterializer`] by declaration index.

use serde::{Deserialize, Serialize};

use crate::error::{OrmError, OrmResult, ResultError};
use crate::model::{Entity, Field, TableModel};
use crate::session::{Row, Rows};
use crate::value::Value;

/// Moves values between rows and entities.
pub trait Materializer {
    /// Copies `row` into `dest`.
    ///
    /// Fails if the row has more columns than the schema or a column the
    /// schema does not know.
    fn copy_from<T: Entity>(&self, model: &TableModel, row: &Row<'_>, dest: &mut T)
    -> OrmResult<()>;

    /// Reads the value of the field `name` from `src`.
    fn read_column<T: Entity>(&self, model: &TableModel, src: &T, name: &str) -> OrmResult<Value>;
}

fn resolve_row<'m>(model: &'m TableModel, row: &Row<'_>) -> OrmResult<Vec<&'m Field>> {
    if row.len() > model.column_count() {
        return Err(ResultError::ColumnCountMismatch {
            expected: model.column_count(),
            actual: row.len(),
        }
        .into());
    }
    row.columns()
        .iter()
        .map(|column| {
            model.field_for_row_column(column).ok_or_else(|| {
                OrmError::from(ResultError::ColumnNotInSchema {
                    column: column.clone(),
                })
            })
        })
        .collect()
}

fn schema_field<'m>(model: &'m TableModel, name: &str) -> OrmResult<&'m Field> {
    model.field(name).ok_or_else(|| {
        ResultError::ColumnNotInSchema {
            column: name.to_string(),
        }
        .into()
    })
}

/// Addresses fields by name.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReflectiveMaterializer;

impl Materializer for ReflectiveMaterializer {
    fn copy_from<T: Entity>(
        &self,
        model: &TableModel,
        row: &Row<'_>,
        dest: &mut T,
    ) -> OrmResult<()> {
        let fields = resolve_row(model, row)?;
        for (field, value) in fields.into_iter().zip(row.values()) {
            dest.set_field(&field.name, value.clone())?;
        }
        Ok(())
    }

    fn read_column<T: Entity>(&self, model: &TableModel, src: &T, name: &str) -> OrmResult<Value> {
        let field = schema_field(model, name)?;
        Ok(src.get_field(&field.name)?)
    }
}

/// Addresses fields by declaration index.
#[derive(Debug, Default, Clone, Copy)]
pub struct PositionalMaterializer;

impl Materializer for PositionalMaterializer {
    fn copy_from<T: Entity>(
        &self,
        model: &TableModel,
        row: &Row<'_>,
        dest: &mut T,
    ) -> OrmResult<()> {
        let fields = resolve_row(model, row)?;
        for (field, value) in fields.into_iter().zip(row.values()) {
            dest.set_at(field.offset, value.clone())?;
        }
        Ok(())
    }

    fn read_column<T: Entity>(&self, model: &TableModel, src: &T, name: &str) -> OrmResult<Value> {
        let field = schema_field(model, name)?;
        Ok(src.get_at(field.offset)?)
    }
}

/// Materializer selectable from configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaterializerKind {
    /// [`ReflectiveMaterializer`]
    Reflective,
    /// [`PositionalMaterializer`]
    #[default]
    Positional,
}

impl MaterializerKind {
    /// Materializes every row of `rows` into a new entity.
    pub fn materialize_all<T: Entity>(self, model: &TableModel, rows: &Rows) -> OrmResult<Vec<T>> {
        rows.iter()
            .map(|row| {
                let mut entity = T::default();
                self.copy_from(model, &row, &mut entity)?;
                Ok(entity)
            })
            .collect()
    }
}

impl Materializer for MaterializerKind {
    fn copy_from<T: Entity>(
        &self,
        model: &TableModel,
        row: &Row<'_>,
        dest: &mut T,
    ) -> OrmResult<()> {
        match self {
            MaterializerKind::Reflective => ReflectiveMaterializer.copy_from(model, row, dest),
            MaterializerKind::Positional => PositionalMaterializer.copy_from(model, row, dest),
        }
    }

    fn read_column<T: Entity>(&self, model: &TableModel, src: &T, name: &str) -> OrmResult<Value> {
        match self {
            MaterializerKind::Reflective => ReflectiveMaterializer.read_column(model, src, name),
            MaterializerKind::Positional => PositionalMaterializer.read_column(model, src, name),
        }
    }
}
