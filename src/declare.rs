//! Declarative field registration.
//!
//! A concrete entity lists its fields with their defaults once, and the
//! record is built from that list instead of from explicit `add_field` calls.

use std::sync::Arc;

use serde_json::Value;

use crate::entity::{Entity, Record};
use crate::field::EntityField;
use crate::validation::{KindRule, Rule};
use crate::value::FieldKind;

/// Declaration of a single field: name, default and optional rule.
#[derive(Clone)]
pub struct FieldDecl {
    name: String,
    default: Value,
    rule: Option<Arc<dyn Rule>>,
}

impl FieldDecl {
    pub fn new(name: impl Into<String>, default: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            default: default.into(),
            rule: None,
        }
    }

    /// Declare a field constrained to the kind of its default.
    /// A `null` default carries no kind, so no rule is attached.
    pub fn typed(name: impl Into<String>, default: impl Into<Value>) -> Self {
        let decl = Self::new(name, default);
        match FieldKind::of(&decl.default) {
            FieldKind::Null => decl,
            kind => decl.with_rule(KindRule::new(kind)),
        }
    }

    pub fn with_rule(mut self, rule: impl Rule + 'static) -> Self {
        self.rule = Some(Arc::new(rule));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn default(&self) -> &Value {
        &self.default
    }

    pub fn into_field(self) -> EntityField {
        let field = EntityField::declared(self.name, self.default);
        match self.rule {
            Some(rule) => field.with_shared_rule(rule),
            None => field,
        }
    }
}

impl Record {
    /// Register every declaration as a managed field, in order.
    pub fn register_fields(&mut self, decls: impl IntoIterator<Item = FieldDecl>) -> &mut Self {
        for decl in decls {
            self.add_field(decl.into_field());
        }
        self
    }
}

/// An entity whose fields come from a declaration list.
pub trait DeclaredEntity: Entity + Sized {
    /// Fields declared by this entity type.
    fn declared_fields() -> Vec<FieldDecl>;

    /// Names owned by the base type. Declarations with these names are
    /// not turned into fields.
    fn inherited_names() -> &'static [&'static str] {
        &[]
    }

    fn from_record(record: Record) -> Self;

    /// Build the entity from its declared fields minus the inherited names.
    fn declare() -> Self {
        let inherited = Self::inherited_names();
        let mut record = Record::new();
        record.register_fields(
            Self::declared_fields()
                .into_iter()
                .filter(|decl| !inherited.iter().any(|name| *name == decl.name())),
        );
        tracing::debug!(
            "Declared {} fields for {}",
            record.len(),
            std::any::type_name::<Self>()
        );
        Self::from_record(record)
    }
}
