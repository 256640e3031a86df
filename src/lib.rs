//! Tracked Entity - named, validated, change-tracked entity fields.
//!
//! An entity owns an insertion-ordered set of fields. Each field validates
//! writes against an optional rule and remembers its last committed value,
//! so the entity can report what changed since it was last stored.

pub mod declare;
pub mod entity;
pub mod error;
pub mod field;
pub mod storage;
pub mod validation;
pub mod value;

// Re-exports for convenience
pub use declare::{DeclaredEntity, FieldDecl};
pub use entity::{AsEntity, Entity, EntityType, Record};
pub use error::{EntityError, ValidationError};
pub use field::EntityField;
pub use storage::{EntityStore, TypedStore};
pub use validation::{KindRule, Rule};
pub use value::{FieldKind, NULL};

#[cfg(any(test, feature = "test-utils"))]
pub use storage::memory::InMemoryEntityStore;
