use std::sync::Arc;

use serde_json::Value;

use crate::error::EntityError;
use crate::validation::Rule;
use crate::value::FieldKind;

/// A named, validated value that remembers its last committed state.
#[derive(Clone)]
pub struct EntityField {
    name: String,
    default: Value,
    value: Value,
    old_value: Value,
    rule: Option<Arc<dyn Rule>>,
    kind: Option<FieldKind>,
}

impl EntityField {
    /// Create a field whose value and old value both start at `default`.
    pub fn new(name: impl Into<String>, default: impl Into<Value>) -> Self {
        let default = default.into();
        Self {
            name: name.into(),
            value: default.clone(),
            old_value: default.clone(),
            default,
            rule: None,
            kind: None,
        }
    }

    /// Create a field and tag it with the kind inferred from its default.
    pub fn declared(name: impl Into<String>, default: impl Into<Value>) -> Self {
        let mut field = Self::new(name, default);
        field.kind = Some(FieldKind::of(&field.default));
        field
    }

    pub fn with_rule(mut self, rule: impl Rule + 'static) -> Self {
        self.rule = Some(Arc::new(rule));
        self
    }

    pub fn with_shared_rule(mut self, rule: Arc<dyn Rule>) -> Self {
        self.rule = Some(rule);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn default(&self) -> &Value {
        &self.default
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Value at construction or at the last `reset_dirty`.
    pub fn old_value(&self) -> &Value {
        &self.old_value
    }

    pub fn rule(&self) -> Option<&Arc<dyn Rule>> {
        self.rule.as_ref()
    }

    /// Kind inferred from the declared default, for declared fields.
    pub fn kind(&self) -> Option<FieldKind> {
        self.kind
    }

    /// Set a new value after checking it against the rule.
    /// On rejection the current value is left untouched.
    pub fn set_value(&mut self, value: Value) -> Result<(), EntityError> {
        if let Some(rule) = &self.rule {
            if let Err(source) = rule.assert(&value) {
                tracing::warn!("Rejected value {} for field {}: {}", value, self.name, source);
                return Err(EntityError::FieldValidation {
                    field: self.name.clone(),
                    value,
                    source,
                });
            }
        }
        tracing::debug!("Field {} set to {}", self.name, value);
        self.value = value;
        Ok(())
    }

    pub fn is_dirty(&self) -> bool {
        self.value != self.old_value
    }

    /// Commit the current value as the old value.
    pub fn reset_dirty(&mut self) {
        self.old_value = self.value.clone();
    }
}

impl std::fmt::Debug for EntityField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityField")
            .field("name", &self.name)
            .field("default", &self.default)
            .field("value", &self.value)
            .field("old_value", &self.old_value)
            .field("has_rule", &self.rule.is_some())
            .field("kind", &self.kind)
            .finish()
    }
}
