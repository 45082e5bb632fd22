//! Process-scoped cache of table models.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::RwLock;
use tracing::debug;

use crate::error::SchemaResult;

use super::descriptor::Describe;
use super::table::TableModel;

/// Caches one [`TableModel`] per described type.
///
/// Reads take a shared lock. The first lookup of a type takes the exclusive
/// lock and re-checks the cache before parsing, so a type is parsed at most
/// once even under contention. Failed parses are not cached.
#[derive(Debug, Default)]
pub struct Registry {
    models: RwLock<HashMap<TypeId, Arc<TableModel>>>,
    parses: AtomicUsize,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the table model for `T`, parsing it on first use.
    pub fn get<T: Describe>(&self) -> SchemaResult<Arc<TableModel>> {
        let key = TypeId::of::<T>();
        if let Some(model) = self.models.read().get(&key) {
            return Ok(Arc::clone(model));
        }

        let mut models = self.models.write();
        if let Some(model) = models.get(&key) {
            return Ok(Arc::clone(model));
        }

        let model = Arc::new(TableModel::from_descriptor(&T::describe())?);
        self.parses.fetch_add(1, Ordering::Relaxed);
        debug!(table = %model.table_name(), columns = model.column_count(), "Registered table model");
        models.insert(key, Arc::clone(&model));
        Ok(model)
    }

    /// Number of successful parses so far.
    pub fn parse_count(&self) -> usize {
        self.parses.load(Ordering::Relaxed)
    }

    /// Number of cached models.
    pub fn len(&self) -> usize {
        self.models.read().len()
    }

    /// Returns true if nothing has been registered.
    pub fn is_empty(&self) -> bool {
        self.models.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SchemaError;
    use crate::model::descriptor::{FieldDescriptor, RecordDescriptor, TypeDescriptor};
    use crate::value::ValueType;

    struct Account;

    impl Describe for Account {
        fn describe() -> TypeDescriptor {
            TypeDescriptor::Record(RecordDescriptor {
                name: "Account",
                fields: vec![FieldDescriptor {
                    name: "balance",
                    tag: None,
                    value_type: ValueType::Int,
                    nullable: false,
                }],
            })
        }
    }

    #[test]
    fn test_second_get_hits_cache() {
        let registry = Registry::new();
        let first = registry.get::<Account>().unwrap();
        let second = registry.get::<Account>().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.parse_count(), 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_concurrent_gets_parse_once() {
        let registry = Arc::new(Registry::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || registry.get::<Account>().unwrap())
            })
            .collect();
        let models: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert!(models.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
        assert_eq!(registry.parse_count(), 1);
    }

    #[test]
    fn test_pointer_descriptor_resolves() {
        let registry = Registry::new();
        let model = registry.get::<Box<Arc<Account>>>().unwrap();
        assert_eq!(model.table_name(), "account");
    }

    #[test]
    fn test_non_record_not_cached() {
        let registry = Registry::new();
        let err = registry.get::<HashMap<String, i64>>().unwrap_err();
        assert_eq!(
            err,
            SchemaError::UnsupportedType {
                type_name: "map".to_string()
            }
        );
        assert!(registry.is_empty());
        assert_eq!(registry.parse_count(), 0);
    }

    #[test]
    fn test_registries_are_independent() {
        let a = Registry::new();
        let b = Registry::new();
        a.get::<Account>().unwrap();
        assert!(b.is_empty());
    }
}
