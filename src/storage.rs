use serde_json::Value;

use crate::entity::{Entity, EntityType};
use crate::error::EntityError;

/// Trait for storing and loading entities.
pub trait EntityStore: Send + Sync {
    /// Store an entity.
    /// Implementations that only accept one entity type check it with
    /// [`TypedStore::assert_entity`] first.
    fn store(&self, entity: &dyn Entity) -> Result<(), EntityError>;

    /// Load the entity identified by the given key components.
    fn load(&self, key: &[Value]) -> Result<Box<dyn Entity>, EntityError>;
}

/// Entity type guard for store implementations.
///
/// Without an expected type every entity is accepted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TypedStore {
    expected: Option<EntityType>,
}

impl TypedStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A guard that only accepts entities of type `T`.
    pub fn expecting<T: Entity>() -> Self {
        Self {
            expected: Some(EntityType::of::<T>()),
        }
    }

    pub fn set_expected_type(&mut self, ty: EntityType) {
        self.expected = Some(ty);
    }

    pub fn expected_type(&self) -> Option<EntityType> {
        self.expected
    }

    pub fn is_entity(&self, entity: &dyn Entity) -> bool {
        match &self.expected {
            Some(ty) => entity.is_a(ty),
            None => true,
        }
    }

    pub fn assert_entity(&self, entity: &dyn Entity) -> Result<(), EntityError> {
        match &self.expected {
            Some(ty) if !entity.is_a(ty) => {
                let actual = entity.entity_type();
                tracing::warn!("Rejected entity of type {}, expected {}", actual, ty);
                Err(EntityError::WrongEntityType {
                    expected: ty.name(),
                    actual: actual.name(),
                })
            }
            _ => Ok(()),
        }
    }
}

// In-memory implementation for testing
#[cfg(any(test, feature = "test-utils"))]
pub mod memory {
    use super::*;
    use crate::entity::Record;
    use indexmap::IndexMap;
    use std::collections::HashMap;
    use std::sync::RwLock;

    /// In-memory entity store keyed by one or more key fields.
    ///
    /// Stores a snapshot of the entity's field map and loads it back as a
    /// plain [`Record`].
    pub struct InMemoryEntityStore {
        key_fields: Vec<String>,
        guard: TypedStore,
        entities: RwLock<HashMap<String, IndexMap<String, Value>>>,
    }

    impl InMemoryEntityStore {
        pub fn new<I, K>(key_fields: I) -> Self
        where
            I: IntoIterator<Item = K>,
            K: Into<String>,
        {
            Self {
                key_fields: key_fields.into_iter().map(Into::into).collect(),
                guard: TypedStore::new(),
                entities: RwLock::new(HashMap::new()),
            }
        }

        /// Only accept entities of type `T`.
        pub fn expecting<T: Entity>(mut self) -> Self {
            self.guard = TypedStore::expecting::<T>();
            self
        }

        pub fn typed_store(&self) -> &TypedStore {
            &self.guard
        }

        /// Number of stored entities.
        pub fn len(&self) -> Result<usize, EntityError> {
            let entities = self
                .entities
                .read()
                .map_err(|e| EntityError::Storage(e.to_string()))?;
            Ok(entities.len())
        }

        pub fn is_empty(&self) -> Result<bool, EntityError> {
            Ok(self.len()? == 0)
        }

        fn encode_key(key: &[Value]) -> Result<String, EntityError> {
            Ok(serde_json::to_string(key)?)
        }

        fn key_of(&self, entity: &dyn Entity) -> Result<String, EntityError> {
            let mut key = Vec::with_capacity(self.key_fields.len());
            for name in &self.key_fields {
                if !entity.is_field(name) {
                    return Err(EntityError::FieldNotFound(name.clone()));
                }
                key.push(entity.get(name).clone());
            }
            Self::encode_key(&key)
        }
    }

    impl EntityStore for InMemoryEntityStore {
        fn store(&self, entity: &dyn Entity) -> Result<(), EntityError> {
            self.guard.assert_entity(entity)?;
            let key = self.key_of(entity)?;

            let mut entities = self
                .entities
                .write()
                .map_err(|e| EntityError::Storage(e.to_string()))?;
            entities.insert(key, entity.to_map());
            Ok(())
        }

        fn load(&self, key: &[Value]) -> Result<Box<dyn Entity>, EntityError> {
            if key.len() != self.key_fields.len() {
                return Err(EntityError::InvalidKey {
                    expected: self.key_fields.len(),
                    actual: key.len(),
                });
            }
            let key = Self::encode_key(key)?;

            let entities = self
                .entities
                .read()
                .map_err(|e| EntityError::Storage(e.to_string()))?;
            match entities.get(&key) {
                Some(values) => Ok(Box::new(Record::from_map(values.clone()))),
                None => Err(EntityError::EntityNotFound(key)),
            }
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::field::EntityField;
        use serde_json::json;
        use std::sync::Arc;

        fn make_record(id: i64, label: &str) -> Record {
            Record::with_fields([
                EntityField::new("id", id),
                EntityField::new("label", label),
            ])
        }

        #[test]
        fn test_store_and_load() {
            let store = InMemoryEntityStore::new(["id"]);
            store.store(&make_record(1, "Oslo")).unwrap();
            store.store(&make_record(2, "Bergen")).unwrap();
            assert_eq!(store.len().unwrap(), 2);

            let loaded = store.load(&[json!(1)]).unwrap();
            assert_eq!(loaded.get("label"), &json!("Oslo"));
            assert!(!loaded.is_dirty());
        }

        #[test]
        fn test_store_overwrites_same_key() {
            let store = InMemoryEntityStore::new(["id"]);
            let mut record = make_record(1, "Oslo");
            store.store(&record).unwrap();

            record.set("label", json!("Trondheim")).unwrap();
            store.store(&record).unwrap();

            assert_eq!(store.len().unwrap(), 1);
            let loaded = store.load(&[json!(1)]).unwrap();
            assert_eq!(loaded.get("label"), &json!("Trondheim"));
        }

        #[test]
        fn test_composite_key() {
            let store = InMemoryEntityStore::new(["id", "label"]);
            store.store(&make_record(1, "Oslo")).unwrap();

            assert!(store.load(&[json!(1), json!("Oslo")]).is_ok());
            assert!(matches!(
                store.load(&[json!(1), json!("Bergen")]),
                Err(EntityError::EntityNotFound(_))
            ));
            assert!(matches!(
                store.load(&[json!(1)]),
                Err(EntityError::InvalidKey {
                    expected: 2,
                    actual: 1
                })
            ));
        }

        #[test]
        fn test_store_requires_key_field() {
            let store = InMemoryEntityStore::new(["uuid"]);
            let err = store.store(&make_record(1, "Oslo")).unwrap_err();
            assert!(matches!(err, EntityError::FieldNotFound(ref name) if name == "uuid"));
            assert!(store.is_empty().unwrap());
        }

        #[test]
        fn test_entity_store_binding() {
            let concrete = Arc::new(InMemoryEntityStore::new(["id"]));
            let store: Arc<dyn EntityStore> = concrete.clone();

            let mut record = make_record(7, "Tromsø");
            record.store().unwrap();
            assert!(concrete.is_empty().unwrap());

            record.set_entity_store(&store);
            assert!(record.entity_store().is_some());
            record.store().unwrap();
            assert_eq!(concrete.len().unwrap(), 1);
        }

        #[test]
        fn test_binding_does_not_keep_store_alive() {
            let store: Arc<dyn EntityStore> = Arc::new(InMemoryEntityStore::new(["id"]));
            let mut record = make_record(7, "Tromsø");
            record.set_entity_store(&store);
            drop(store);

            assert!(record.entity_store().is_none());
            record.store().unwrap();
        }

        #[test]
        fn test_loaded_entity_can_be_populated_and_stored() {
            let concrete = Arc::new(InMemoryEntityStore::new(["id"]));
            let store: Arc<dyn EntityStore> = concrete.clone();
            store.store(&make_record(1, "Oslo")).unwrap();

            let mut loaded = store.load(&[json!(1)]).unwrap();
            let mut values = IndexMap::new();
            values.insert("id".to_string(), json!(2));
            values.insert("label".to_string(), json!("Bergen"));
            loaded.populate(values).unwrap();
            assert_eq!(loaded.dirty_fields(), vec!["id", "label"]);

            loaded.set_entity_store(&store);
            loaded.store().unwrap();
            loaded.reset_dirty();

            assert_eq!(concrete.len().unwrap(), 2);
            let reloaded = store.load(&[json!(2)]).unwrap();
            assert_eq!(reloaded.get("label"), &json!("Bergen"));
            assert!(!loaded.is_dirty());
        }

        #[test]
        fn test_poisoned_lock_is_reported() {
            let store = Arc::new(InMemoryEntityStore::new(["id"]));
            let writer = store.clone();
            let result = std::thread::spawn(move || {
                let _guard = writer.entities.write().unwrap();
                panic!("writer panicked while holding the lock");
            })
            .join();
            assert!(result.is_err());

            assert!(matches!(store.len(), Err(EntityError::Storage(_))));
            assert!(matches!(store.is_empty(), Err(EntityError::Storage(_))));
            assert!(matches!(
                store.store(&make_record(1, "Oslo")),
                Err(EntityError::Storage(_))
            ));
        }
    }
}
