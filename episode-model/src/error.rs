//! Error types for the entity model.

use thiserror::Error;

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors raised while declaring entity types or manipulating instances.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    /// A value does not match the field's declared type.
    #[error("type mismatch on `{field}`: expected {expected}, got {found}")]
    TypeMismatch {
        field: String,
        expected: String,
        found: String,
    },

    /// The entity type has no field with this name.
    #[error("`{entity}` has no field named `{field}`")]
    UnknownField { entity: String, field: String },

    /// A relation points at an instance that was never persisted.
    #[error("relation `{field}` refers to an unsaved `{target}` instance")]
    UnboundRelation { field: String, target: String },

    /// A one-to-many value holds more instances than its foreign-key column can store.
    #[error("relation `{field}` holds {count} instances but stores a single foreign key")]
    MultiValuedRelation { field: String, count: usize },

    /// A user attribute was named after the implicit identity field.
    #[error("`{entity}` declares a field named `id`, which is reserved for the identity")]
    ReservedField { entity: String },

    /// The same attribute was declared twice.
    #[error("`{entity}` declares `{field}` more than once")]
    DuplicateField { entity: String, field: String },

    /// An entity declaration refers back to itself.
    #[error("`{entity}` is referenced while it is still being declared")]
    RecursiveDeclaration { entity: String },
}
