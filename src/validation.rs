use serde_json::Value;

use crate::error::ValidationError;
use crate::value::FieldKind;

/// A validation rule attached to a field.
///
/// The only operation is to assert that a candidate value is acceptable.
pub trait Rule: Send + Sync {
    fn assert(&self, value: &Value) -> Result<(), ValidationError>;
}

impl<F> Rule for F
where
    F: Fn(&Value) -> Result<(), ValidationError> + Send + Sync,
{
    fn assert(&self, value: &Value) -> Result<(), ValidationError> {
        self(value)
    }
}

/// Accepts values of a single kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KindRule {
    kind: FieldKind,
    nullable: bool,
}

impl KindRule {
    pub fn new(kind: FieldKind) -> Self {
        Self {
            kind,
            nullable: false,
        }
    }

    /// Also accept `null`.
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn kind(&self) -> FieldKind {
        self.kind
    }
}

impl Rule for KindRule {
    fn assert(&self, value: &Value) -> Result<(), ValidationError> {
        let actual = FieldKind::of(value);
        if actual == self.kind || (self.nullable && actual == FieldKind::Null) {
            return Ok(());
        }
        Err(ValidationError::KindMismatch {
            expected: self.kind.as_str(),
            actual: actual.as_str(),
        })
    }
}
