use std::any::{Any, TypeId};
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;

use crate::error::EntityError;
use crate::field::EntityField;
use crate::storage::EntityStore;
use crate::value::NULL;

/// Runtime identity of a concrete entity type.
#[derive(Debug, Clone, Copy)]
pub struct EntityType {
    id: TypeId,
    name: &'static str,
}

impl EntityType {
    pub fn of<T: Any + ?Sized>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for EntityType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for EntityType {}

impl std::hash::Hash for EntityType {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name)
    }
}

/// Insertion-ordered field registry with an optional store binding.
///
/// A `Record` is also the plain base entity: it implements [`Entity`]
/// directly, and concrete entity types wrap one.
#[derive(Clone, Default)]
pub struct Record {
    fields: IndexMap<String, EntityField>,
    entity_store: Option<Weak<dyn EntityStore>>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a record from explicit field descriptors.
    pub fn with_fields(fields: impl IntoIterator<Item = EntityField>) -> Self {
        let mut record = Self::new();
        for field in fields {
            record.add_field(field);
        }
        record
    }

    /// Build a record from a plain mapping; every entry becomes a field
    /// without a rule whose default is the given value.
    pub fn from_map(values: IndexMap<String, Value>) -> Self {
        Self::with_fields(
            values
                .into_iter()
                .map(|(name, value)| EntityField::new(name, value)),
        )
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Entity for Record {
    fn record(&self) -> &Record {
        self
    }

    fn record_mut(&mut self) -> &mut Record {
        self
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, field) in &self.fields {
            map.serialize_entry(name, field.value())?;
        }
        map.end()
    }
}

impl std::fmt::Debug for Record {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.fields.iter().map(|(name, field)| (name, field.value())))
            .finish()
    }
}

/// Upcast to `&dyn Entity`, implemented for every sized entity.
pub trait AsEntity {
    fn as_entity(&self) -> &dyn Entity;
}

impl<T: Entity> AsEntity for T {
    fn as_entity(&self) -> &dyn Entity {
        self
    }
}

/// A record type with named, validated, change-tracked fields.
///
/// Implementors only hand out their [`Record`]; every operation is provided.
pub trait Entity: Any + AsEntity {
    fn record(&self) -> &Record;

    fn record_mut(&mut self) -> &mut Record;

    fn entity_type(&self) -> EntityType {
        EntityType::of::<Self>()
    }

    /// Whether this entity is of type `ty`. Entities that extend another
    /// entity type override this to also answer for their parent.
    fn is_a(&self, ty: &EntityType) -> bool {
        self.entity_type() == *ty
    }

    /// Register a field, replacing any field with the same name.
    /// A replaced field keeps its original position.
    fn add_field(&mut self, field: EntityField) {
        let name = field.name().to_string();
        self.record_mut().fields.insert(name, field);
    }

    fn is_field(&self, name: &str) -> bool {
        self.record().fields.contains_key(name)
    }

    /// Field names in registration order.
    fn field_names(&self) -> Vec<&str> {
        self.record().fields.keys().map(String::as_str).collect()
    }

    fn entity_field(&self, name: &str) -> Option<&EntityField> {
        self.record().fields.get(name)
    }

    /// Current value of a field, or `null` if there is no such field.
    fn get(&self, name: &str) -> &Value {
        match self.record().fields.get(name) {
            Some(field) => field.value(),
            None => &NULL,
        }
    }

    fn set(&mut self, name: &str, value: Value) -> Result<(), EntityError> {
        match self.record_mut().fields.get_mut(name) {
            Some(field) => field.set_value(value),
            None => Err(EntityError::FieldNotFound(name.to_string())),
        }
    }

    /// True if the field exists and holds a non-null value.
    fn is_set(&self, name: &str) -> bool {
        self.is_field(name) && !self.get(name).is_null()
    }

    /// Apply `set` for every entry in order.
    ///
    /// Stops at the first failure; entries applied before it keep their
    /// new values.
    fn populate(&mut self, values: IndexMap<String, Value>) -> Result<(), EntityError> {
        for (name, value) in values {
            self.set(&name, value)?;
        }
        Ok(())
    }

    fn set_from_map(&mut self, values: IndexMap<String, Value>) -> Result<(), EntityError> {
        self.populate(values)
    }

    fn is_dirty(&self) -> bool {
        self.record().fields.values().any(EntityField::is_dirty)
    }

    fn is_field_dirty(&self, name: &str) -> Result<bool, EntityError> {
        self.entity_field(name)
            .map(EntityField::is_dirty)
            .ok_or_else(|| EntityError::FieldNotFound(name.to_string()))
    }

    /// Names of changed fields in registration order.
    fn dirty_fields(&self) -> Vec<&str> {
        self.record()
            .fields
            .values()
            .filter(|field| field.is_dirty())
            .map(EntityField::name)
            .collect()
    }

    fn dirty_field_values(&self) -> IndexMap<String, Value> {
        self.record()
            .fields
            .values()
            .filter(|field| field.is_dirty())
            .map(|field| (field.name().to_string(), field.value().clone()))
            .collect()
    }

    fn reset_dirty(&mut self) {
        let mut reset = 0;
        for field in self.record_mut().fields.values_mut() {
            if field.is_dirty() {
                field.reset_dirty();
                reset += 1;
            }
        }
        if reset > 0 {
            tracing::debug!("Reset {} dirty fields", reset);
        }
    }

    /// All field values in registration order.
    fn to_map(&self) -> IndexMap<String, Value> {
        self.record()
            .fields
            .iter()
            .map(|(name, field)| (name.clone(), field.value().clone()))
            .collect()
    }

    /// The field map as a JSON object.
    fn to_json(&self) -> Value {
        Value::Object(self.to_map().into_iter().collect())
    }

    fn to_json_string(&self) -> Result<String, EntityError> {
        Ok(serde_json::to_string(self.record())?)
    }

    /// Bind a store without taking ownership of it.
    fn set_entity_store(&mut self, store: &Arc<dyn EntityStore>) {
        self.record_mut().entity_store = Some(Arc::downgrade(store));
    }

    /// The bound store, if one is bound and still alive.
    fn entity_store(&self) -> Option<Arc<dyn EntityStore>> {
        let weak = self.record().entity_store.as_ref()?;
        let store = weak.upgrade();
        if store.is_none() {
            tracing::warn!("Entity store bound to {} has been dropped", self.entity_type());
        }
        store
    }

    /// Hand this entity to the bound store. Without a store this does nothing.
    fn store(&self) -> Result<(), EntityError> {
        match self.entity_store() {
            Some(store) => {
                tracing::debug!("Storing {}", self.entity_type());
                store.store(self.as_entity())
            }
            None => Ok(()),
        }
    }
}
