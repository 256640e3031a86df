use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EntityError {
    #[error("field not found: {0}")]
    FieldNotFound(String),

    #[error("failed setting {field} to {value}")]
    FieldValidation {
        field: String,
        value: Value,
        #[source]
        source: ValidationError,
    },

    #[error("wrong entity type: expected {expected}, got {actual}")]
    WrongEntityType {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Entity not found: {0}")]
    EntityNotFound(String),

    #[error("Invalid key: expected {expected} components, got {actual}")]
    InvalidKey { expected: usize, actual: usize },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(String),
}

/// Failure reported by a validation rule.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("expected a value of kind {expected}, got {actual}")]
    KindMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("{0}")]
    Rejected(String),
}

impl EntityError {
    /// Name of the field the error refers to, if any.
    pub fn field(&self) -> Option<&str> {
        match self {
            EntityError::FieldNotFound(name) => Some(name),
            EntityError::FieldValidation { field, .. } => Some(field),
            _ => None,
        }
    }
}
