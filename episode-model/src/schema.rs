//! Schema declarations: the type vocabulary, [`EntitySchema`] and the
//! builder entity types declare their attributes through.
//!
//! A built schema always ends with the implicit `id` field, and its storage
//! name is the lowercased entity name.

use crate::error::{ModelError, ModelResult};
use crate::field::Field;
use crate::registry::{Entity, schema_of};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Name of the implicit identity field every entity type carries.
pub const IDENTITY_FIELD: &str = "id";

/// The declared type of an entity attribute.
///
/// `Optional` and `List` wrap another type the way an annotation such as
/// `Option<Department>` or `Vec<Department>` would. Registration collapses a
/// single outer `Optional` into the field's nullability.
#[derive(Debug, Clone)]
pub enum TypeRef {
    Integer,
    Real,
    Text,
    Boolean,
    Optional(Box<TypeRef>),
    List(Box<TypeRef>),
    Entity(Arc<EntitySchema>),
}

impl TypeRef {
    pub fn optional(inner: TypeRef) -> Self {
        TypeRef::Optional(Box::new(inner))
    }

    pub fn list(inner: TypeRef) -> Self {
        TypeRef::List(Box::new(inner))
    }

    /// Returns the related schema when this type is, or is a sequence of, an entity type.
    pub fn entity_target(&self) -> Option<&Arc<EntitySchema>> {
        match self {
            TypeRef::Entity(schema) => Some(schema),
            TypeRef::List(inner) | TypeRef::Optional(inner) => match inner.as_ref() {
                TypeRef::Entity(schema) => Some(schema),
                _ => None,
            },
            _ => None,
        }
    }
}

impl PartialEq for TypeRef {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (TypeRef::Integer, TypeRef::Integer)
            | (TypeRef::Real, TypeRef::Real)
            | (TypeRef::Text, TypeRef::Text)
            | (TypeRef::Boolean, TypeRef::Boolean) => true,
            (TypeRef::Optional(a), TypeRef::Optional(b)) | (TypeRef::List(a), TypeRef::List(b)) => {
                a == b
            }
            (TypeRef::Entity(a), TypeRef::Entity(b)) => a.name() == b.name(),
            _ => false,
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Integer => write!(f, "integer"),
            TypeRef::Real => write!(f, "real"),
            TypeRef::Text => write!(f, "text"),
            TypeRef::Boolean => write!(f, "boolean"),
            TypeRef::Optional(inner) => write!(f, "optional<{inner}>"),
            TypeRef::List(inner) => write!(f, "list<{inner}>"),
            TypeRef::Entity(schema) => write!(f, "{}", schema.name()),
        }
    }
}

/// How a field relates to another entity type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    None,
    OneToOne,
    OneToMany,
}

/// The derived description of an entity type: its storage name and fields.
///
/// Built once per entity type and shared read-only by every instance.
#[derive(Debug)]
pub struct EntitySchema {
    name: String,
    storage_name: String,
    fields: Vec<Field>,
}

impl EntitySchema {
    /// Starts describing an entity type called `name`.
    pub fn builder(name: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder::new(name)
    }

    /// The declared type name, e.g. `Department`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The table or collection name: the lowercase type name.
    pub fn storage_name(&self) -> &str {
        &self.storage_name
    }

    /// All fields in declaration order, identity last.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Fields declared by the user, i.e. everything except the identity.
    pub fn user_fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(|f| !f.is_identity())
    }

    /// Fields that reference another entity type.
    pub fn relations(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(|f| f.is_relation())
    }

    pub fn identity(&self) -> &Field {
        // `build` always pushes the identity last.
        &self.fields[self.fields.len() - 1]
    }

    pub fn get_field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name() == name)
    }

    /// Looks up a field, failing with [`ModelError::UnknownField`].
    pub fn field(&self, name: &str) -> ModelResult<&Field> {
        self.get_field(name).ok_or_else(|| ModelError::UnknownField {
            entity: self.name.clone(),
            field: name.to_string(),
        })
    }
}

/// Collects attribute declarations for one entity type.
#[derive(Debug)]
pub struct SchemaBuilder {
    name: String,
    attributes: Vec<(String, TypeRef)>,
    error: Option<ModelError>,
}

impl SchemaBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            error: None,
        }
    }

    /// Declares an attribute of any type.
    pub fn field(mut self, name: impl Into<String>, ty: TypeRef) -> Self {
        self.attributes.push((name.into(), ty));
        self
    }

    pub fn integer(self, name: impl Into<String>) -> Self {
        self.field(name, TypeRef::Integer)
    }

    pub fn real(self, name: impl Into<String>) -> Self {
        self.field(name, TypeRef::Real)
    }

    pub fn text(self, name: impl Into<String>) -> Self {
        self.field(name, TypeRef::Text)
    }

    pub fn boolean(self, name: impl Into<String>) -> Self {
        self.field(name, TypeRef::Boolean)
    }

    /// Declares a nullable attribute.
    pub fn optional(self, name: impl Into<String>, ty: TypeRef) -> Self {
        self.field(name, TypeRef::optional(ty))
    }

    /// Declares a reference to a single `E`, registering `E` if needed.
    pub fn one_to_one<E: Entity>(self, name: impl Into<String>) -> Self {
        self.related::<E>(name, |target| target)
    }

    /// Declares a reference to a sequence of `E`.
    pub fn one_to_many<E: Entity>(self, name: impl Into<String>) -> Self {
        self.related::<E>(name, TypeRef::list)
    }

    fn related<E: Entity>(
        mut self,
        name: impl Into<String>,
        wrap: impl FnOnce(TypeRef) -> TypeRef,
    ) -> Self {
        match schema_of::<E>() {
            Ok(target) => self.field(name, wrap(TypeRef::Entity(target))),
            Err(err) => {
                self.error.get_or_insert(err);
                self
            }
        }
    }

    /// Derives the schema: wraps each attribute in a [`Field`] and appends
    /// the implicit identity.
    pub fn build(self) -> ModelResult<EntitySchema> {
        if let Some(err) = self.error {
            return Err(err);
        }

        let mut seen = HashSet::new();
        let mut fields = Vec::with_capacity(self.attributes.len() + 1);
        for (name, ty) in self.attributes {
            if name == IDENTITY_FIELD {
                return Err(ModelError::ReservedField { entity: self.name });
            }
            if !seen.insert(name.clone()) {
                return Err(ModelError::DuplicateField {
                    entity: self.name,
                    field: name,
                });
            }
            fields.push(Field::new(name, ty));
        }
        fields.push(Field::identity());

        Ok(EntitySchema {
            storage_name: self.name.to_lowercase(),
            name: self.name,
            fields,
        })
    }
}
