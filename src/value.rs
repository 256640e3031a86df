use serde_json::Value;

/// Sentinel returned for reads of unknown fields.
pub static NULL: Value = Value::Null;

/// Type tag inferred from a field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Null,
    Bool,
    Int,
    Float,
    String,
    Array,
    Object,
}

impl FieldKind {
    /// Infer the kind of a value.
    /// Numbers representable as i64 or u64 are `Int`, all others are `Float`.
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => FieldKind::Null,
            Value::Bool(_) => FieldKind::Bool,
            Value::Number(n) if n.is_i64() || n.is_u64() => FieldKind::Int,
            Value::Number(_) => FieldKind::Float,
            Value::String(_) => FieldKind::String,
            Value::Array(_) => FieldKind::Array,
            Value::Object(_) => FieldKind::Object,
        }
    }

    /// Human-readable name used in error messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::Null => "null",
            FieldKind::Bool => "bool",
            FieldKind::Int => "int",
            FieldKind::Float => "float",
            FieldKind::String => "string",
            FieldKind::Array => "array",
            FieldKind::Object => "object",
        }
    }
}

impl std::fmt::Display for FieldKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
