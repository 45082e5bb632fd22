//! Static type descriptions consumed by the registry.
//!
//! `#[derive(Entity)]` implements [`Describe`] for records. The blanket
//! implementations below let a descriptor point through smart pointers, and
//! the scalar implementations exist so non-record types are rejected with a
//! proper error instead of failing to compile.

use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

use crate::value::ValueType;

/// Shape of a described type.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeDescriptor {
    /// A record with named fields.
    Record(RecordDescriptor),
    /// A pointer-like wrapper around another type.
    Indirect(Box<TypeDescriptor>),
    /// A single scalar value.
    Scalar(ValueType),
    /// A collection type such as a map.
    Collection(&'static str),
}

impl TypeDescriptor {
    /// Follows indirection until a non-pointer descriptor is reached.
    pub fn resolve(&self) -> &TypeDescriptor {
        let mut current = self;
        while let TypeDescriptor::Indirect(inner) = current {
            current = inner;
        }
        current
    }

    /// A short human readable name for error messages.
    pub fn type_name(&self) -> String {
        match self {
            TypeDescriptor::Record(record) => record.name.to_string(),
            TypeDescriptor::Indirect(inner) => format!("&{}", inner.type_name()),
            TypeDescriptor::Scalar(ty) => ty.to_string(),
            TypeDescriptor::Collection(name) => (*name).to_string(),
        }
    }
}

/// A record and its fields in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordDescriptor {
    /// Type name in CamelCase.
    pub name: &'static str,
    /// Fields in declaration order.
    pub fields: Vec<FieldDescriptor>,
}

/// A single record field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    /// Field identifier.
    pub name: &'static str,
    /// Optional mapping key from `#[orm(tag = "...")]`.
    pub tag: Option<&'static str>,
    /// Field type.
    pub value_type: ValueType,
    /// Whether the field is an `Option`.
    pub nullable: bool,
}

/// Types that can describe their own shape.
pub trait Describe: 'static {
    /// Returns the static shape of `Self`.
    fn describe() -> TypeDescriptor;
}

impl<T: Describe> Describe for Box<T> {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::Indirect(Box::new(T::describe()))
    }
}

impl<T: Describe> Describe for Arc<T> {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::Indirect(Box::new(T::describe()))
    }
}

impl<T: Describe> Describe for Rc<T> {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::Indirect(Box::new(T::describe()))
    }
}

impl<K: 'static, V: 'static> Describe for HashMap<K, V> {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::Collection("map")
    }
}

macro_rules! describe_scalar {
    ($($t:ty => $vt:expr),* $(,)?) => {
        $(
            impl Describe for $t {
                fn describe() -> TypeDescriptor {
                    TypeDescriptor::Scalar($vt)
                }
            }
        )*
    };
}

describe_scalar!(
    bool => ValueType::Bool,
    i8 => ValueType::Int,
    i16 => ValueType::Int,
    i32 => ValueType::Int,
    i64 => ValueType::Int,
    u8 => ValueType::Int,
    u16 => ValueType::Int,
    u32 => ValueType::Int,
    f32 => ValueType::Float,
    f64 => ValueType::Float,
    String => ValueType::Text,
);
