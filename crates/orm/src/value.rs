//! Literal values bound to statement placeholders.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValueError;

/// The type of a mapped field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    /// Boolean.
    Bool,
    /// Signed integer (stored as i64).
    Int,
    /// Floating point.
    Float,
    /// UTF-8 text.
    Text,
    /// Raw bytes.
    Bytes,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Bool => write!(f, "bool"),
            ValueType::Int => write!(f, "int"),
            ValueType::Float => write!(f, "float"),
            ValueType::Text => write!(f, "text"),
            ValueType::Bytes => write!(f, "bytes"),
        }
    }
}

/// A bound statement argument or a value read from a result row.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// SQL NULL.
    #[default]
    Null,
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Floating point value.
    Float(f64),
    /// Text value.
    Text(String),
    /// Binary value.
    Bytes(Vec<u8>),
}

/// Largest integer magnitude an `f64` holds exactly (2^53).
const MAX_EXACT_FLOAT_INT: u64 = 1 << 53;

impl Value {
    /// Returns the type of this value, or `None` for NULL.
    pub fn value_type(&self) -> Option<ValueType> {
        match self {
            Value::Null => None,
            Value::Bool(_) => Some(ValueType::Bool),
            Value::Int(_) => Some(ValueType::Int),
            Value::Float(_) => Some(ValueType::Float),
            Value::Text(_) => Some(ValueType::Text),
            Value::Bytes(_) => Some(ValueType::Bytes),
        }
    }

    /// Returns true for NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns the integer payload, if this is an integer.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Converts a driver value into the representation of `target`.
    ///
    /// Drivers may hand back numbers as text or booleans as integers; only
    /// lossless conversions are performed. NULL passes through unchanged.
    pub fn coerce(self, target: ValueType) -> Result<Value, ValueError> {
        let mismatch = |found: &Value| ValueError::TypeMismatch {
            expected: target,
            found: found.type_name().to_string(),
        };

        match (target, self) {
            (_, Value::Null) => Ok(Value::Null),
            (ValueType::Bool, Value::Bool(b)) => Ok(Value::Bool(b)),
            (ValueType::Bool, Value::Int(i)) if i == 0 || i == 1 => Ok(Value::Bool(i == 1)),
            (ValueType::Int, Value::Int(i)) => Ok(Value::Int(i)),
            (ValueType::Int, Value::Bool(b)) => Ok(Value::Int(i64::from(b))),
            (ValueType::Int, Value::Text(s)) => s
                .trim()
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|_| mismatch(&Value::Text(s))),
            (ValueType::Float, Value::Float(f)) => Ok(Value::Float(f)),
            (ValueType::Float, Value::Int(i)) if i.unsigned_abs() <= MAX_EXACT_FLOAT_INT => {
                Ok(Value::Float(i as f64))
            }
            (ValueType::Float, Value::Text(s)) => s
                .trim()
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|_| mismatch(&Value::Text(s))),
            (ValueType::Text, Value::Text(s)) => Ok(Value::Text(s)),
            (ValueType::Text, Value::Bytes(b)) => String::from_utf8(b)
                .map(Value::Text)
                .map_err(|e| mismatch(&Value::Bytes(e.into_bytes()))),
            (ValueType::Bytes, Value::Bytes(b)) => Ok(Value::Bytes(b)),
            (ValueType::Bytes, Value::Text(s)) => Ok(Value::Bytes(s.into_bytes())),
            (_, other) => Err(mismatch(&other)),
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::Bytes(_) => "bytes",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Text(s) => write!(f, "{s:?}"),
            Value::Bytes(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

/// A Rust type that can be stored in a mapped field.
pub trait SqlType: Sized {
    /// The column type of this Rust type.
    const VALUE_TYPE: ValueType;

    /// Whether NULL is representable.
    const NULLABLE: bool = false;

    /// Converts this field into a bound value.
    fn to_value(&self) -> Value;

    /// Converts a (coerced) value back into this type.
    fn from_value(value: Value) -> Result<Self, ValueError>;
}

fn type_mismatch(expected: ValueType, value: &Value) -> ValueError {
    match value {
        Value::Null => ValueError::UnexpectedNull { expected },
        other => ValueError::TypeMismatch {
            expected,
            found: other.type_name().to_string(),
        },
    }
}

macro_rules! impl_int_sql_type {
    ($($t:ty),*) => {
        $(
            impl SqlType for $t {
                const VALUE_TYPE: ValueType = ValueType::Int;

                fn to_value(&self) -> Value {
                    Value::Int(i64::from(*self))
                }

                fn from_value(value: Value) -> Result<Self, ValueError> {
                    match value.coerce(ValueType::Int)? {
                        Value::Int(i) => <$t>::try_from(i).map_err(|_| ValueError::OutOfRange {
                            value: i,
                            target: stringify!($t),
                        }),
                        other => Err(type_mismatch(ValueType::Int, &other)),
                    }
                }
            }

            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Value::Int(i64::from(v))
                }
            }
        )*
    };
}

impl_int_sql_type!(i8, i16, i32, i64, u8, u16, u32);

impl SqlType for bool {
    const VALUE_TYPE: ValueType = ValueType::Bool;

    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value.coerce(ValueType::Bool)? {
            Value::Bool(b) => Ok(b),
            other => Err(type_mismatch(ValueType::Bool, &other)),
        }
    }
}

impl SqlType for f64 {
    const VALUE_TYPE: ValueType = ValueType::Float;

    fn to_value(&self) -> Value {
        Value::Float(*self)
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value.coerce(ValueType::Float)? {
            Value::Float(f) => Ok(f),
            other => Err(type_mismatch(ValueType::Float, &other)),
        }
    }
}

impl SqlType for f32 {
    const VALUE_TYPE: ValueType = ValueType::Float;

    fn to_value(&self) -> Value {
        Value::Float(f64::from(*self))
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        f64::from_value(value).map(|f| f as f32)
    }
}

impl SqlType for String {
    const VALUE_TYPE: ValueType = ValueType::Text;

    fn to_value(&self) -> Value {
        Value::Text(self.clone())
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value.coerce(ValueType::Text)? {
            Value::Text(s) => Ok(s),
            other => Err(type_mismatch(ValueType::Text, &other)),
        }
    }
}

impl SqlType for Vec<u8> {
    const VALUE_TYPE: ValueType = ValueType::Bytes;

    fn to_value(&self) -> Value {
        Value::Bytes(self.clone())
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value.coerce(ValueType::Bytes)? {
            Value::Bytes(b) => Ok(b),
            other => Err(type_mismatch(ValueType::Bytes, &other)),
        }
    }
}

impl<T: SqlType> SqlType for Option<T> {
    const VALUE_TYPE: ValueType = T::VALUE_TYPE;
    const NULLABLE: bool = true;

    fn to_value(&self) -> Value {
        match self {
            Some(v) => v.to_value(),
            None => Value::Null,
        }
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        if value.is_null() {
            Ok(None)
        } else {
            T::from_value(value).map(Some)
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(f64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

#[cfg(feature = "sqlite")]
impl rusqlite::ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<rusqlite::types::ToSqlOutput<'_>> {
        use rusqlite::types::{ToSqlOutput, ValueRef};

        Ok(match self {
            Value::Null => ToSqlOutput::Borrowed(ValueRef::Null),
            Value::Bool(b) => ToSqlOutput::Owned(rusqlite::types::Value::Integer(i64::from(*b))),
            Value::Int(i) => ToSqlOutput::Borrowed(ValueRef::Integer(*i)),
            Value::Float(f) => ToSqlOutput::Borrowed(ValueRef::Real(*f)),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::Bytes(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
        })
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::types::ValueRef<'_>> for Value {
    fn from(v: rusqlite::types::ValueRef<'_>) -> Self {
        use rusqlite::types::ValueRef;

        match v {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(i) => Value::Int(i),
            ValueRef::Real(f) => Value::Float(f),
            ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(b) => Value::Bytes(b.to_vec()),
        }
    }
}
