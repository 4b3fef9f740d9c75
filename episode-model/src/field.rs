//! Per-attribute metadata and the typed accessor instances delegate to.

use crate::error::{ModelError, ModelResult};
use crate::instance::Instance;
use crate::schema::{EntitySchema, IDENTITY_FIELD, RelationKind, TypeRef};
use crate::value::Value;
use std::sync::Arc;

/// Schema-time descriptor of one entity attribute.
///
/// A field never owns data. Reads and writes go through [`Field::get`] and
/// [`Field::set`], which validate values against the declared type.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    name: String,
    declared_type: TypeRef,
    nullable: bool,
    relation: RelationKind,
}

impl Field {
    /// Wraps a declared attribute, collapsing one level of `Optional` into
    /// nullability and classifying relations.
    pub(crate) fn new(name: String, ty: TypeRef) -> Self {
        let (declared_type, nullable) = match ty {
            TypeRef::Optional(inner) => (*inner, true),
            other => (other, false),
        };
        let relation = match &declared_type {
            TypeRef::Entity(_) => RelationKind::OneToOne,
            TypeRef::List(inner) if matches!(inner.as_ref(), TypeRef::Entity(_)) => {
                RelationKind::OneToMany
            }
            _ => RelationKind::None,
        };
        Self {
            name,
            declared_type,
            nullable,
            relation,
        }
    }

    pub(crate) fn identity() -> Self {
        Self {
            name: IDENTITY_FIELD.to_string(),
            declared_type: TypeRef::Integer,
            nullable: true,
            relation: RelationKind::None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn declared_type(&self) -> &TypeRef {
        &self.declared_type
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn relation_kind(&self) -> RelationKind {
        self.relation
    }

    pub fn is_relation(&self) -> bool {
        self.relation != RelationKind::None
    }

    pub fn is_identity(&self) -> bool {
        self.name == IDENTITY_FIELD
    }

    /// The related entity type for relation fields.
    pub fn target(&self) -> Option<&Arc<EntitySchema>> {
        if self.is_relation() {
            self.declared_type.entity_target()
        } else {
            None
        }
    }

    /// Checks that `value` fits the declared type. Null is always accepted;
    /// the store enforces `NOT NULL`.
    pub fn check(&self, value: &Value) -> ModelResult<()> {
        if accepts(&self.declared_type, value) {
            Ok(())
        } else {
            Err(ModelError::TypeMismatch {
                field: self.name.clone(),
                expected: self.declared_type.to_string(),
                found: value.type_name(),
            })
        }
    }

    /// Validates and stores `value` on `instance`.
    pub fn set(&self, instance: &mut Instance, value: Value) -> ModelResult<()> {
        self.check(&value)?;
        instance.put(&self.name, value);
        Ok(())
    }

    /// Returns the stored value, or null if the instance has none.
    pub fn get<'a>(&self, instance: &'a Instance) -> &'a Value {
        instance.get(&self.name)
    }

    /// Converts a value to the form written to the store. Relations become
    /// the related instance's identity.
    pub fn to_storable(&self, value: &Value) -> ModelResult<Value> {
        if !self.is_relation() {
            return Ok(value.clone());
        }
        match value {
            Value::Null => Ok(Value::Null),
            Value::Entity(related) => self.bound_identity(related),
            Value::List(items) => match items.as_slice() {
                [] => Ok(Value::Null),
                [Value::Entity(related)] => self.bound_identity(related),
                [other] => Err(self.mismatch(other)),
                many => Err(ModelError::MultiValuedRelation {
                    field: self.name.clone(),
                    count: many.len(),
                }),
            },
            other => Err(self.mismatch(other)),
        }
    }

    /// Coerces a raw store value into the declared scalar type. Stores
    /// without a boolean column type hand booleans back as integers.
    pub fn from_storage(&self, raw: Value) -> Value {
        match (&self.declared_type, raw) {
            (TypeRef::Boolean, Value::Int(n)) => Value::Bool(n != 0),
            (TypeRef::Real, Value::Int(n)) => Value::Real(n as f64),
            (_, raw) => raw,
        }
    }

    fn bound_identity(&self, related: &Instance) -> ModelResult<Value> {
        if related.is_persisted() {
            Ok(related.id().clone())
        } else {
            Err(ModelError::UnboundRelation {
                field: self.name.clone(),
                target: related.schema().name().to_string(),
            })
        }
    }

    fn mismatch(&self, value: &Value) -> ModelError {
        ModelError::TypeMismatch {
            field: self.name.clone(),
            expected: self.declared_type.to_string(),
            found: value.type_name(),
        }
    }
}

fn accepts(ty: &TypeRef, value: &Value) -> bool {
    match (ty, value) {
        (_, Value::Null) => true,
        (TypeRef::Integer, Value::Int(_))
        | (TypeRef::Real, Value::Real(_))
        | (TypeRef::Text, Value::Text(_))
        | (TypeRef::Boolean, Value::Bool(_)) => true,
        (TypeRef::Optional(inner), value) => accepts(inner, value),
        (TypeRef::Entity(schema), Value::Entity(instance)) => {
            instance.schema().name() == schema.name()
        }
        (TypeRef::List(inner), Value::List(items)) => items.iter().all(|item| accepts(inner, item)),
        // A one-to-many field also takes a single related instance.
        (TypeRef::List(inner), Value::Entity(_)) => {
            matches!(inner.as_ref(), TypeRef::Entity(_)) && accepts(inner, value)
        }
        _ => false,
    }
}
