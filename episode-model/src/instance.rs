//! Entity instances: field values keyed by name, validated on write.

use crate::error::ModelResult;
use crate::registry::{Entity, schema_of};
use crate::schema::{EntitySchema, IDENTITY_FIELD};
use crate::value::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

static NULL: Value = Value::Null;

/// One record of an entity type.
///
/// The identity starts out null and is written back by the store once the
/// instance has been saved. Resetting it to null detaches the instance.
#[derive(Clone)]
pub struct Instance {
    schema: Arc<EntitySchema>,
    values: HashMap<String, Value>,
}

impl Instance {
    /// Creates an empty, unsaved instance.
    pub fn new(schema: Arc<EntitySchema>) -> Self {
        let mut values = HashMap::new();
        values.insert(IDENTITY_FIELD.to_string(), Value::Null);
        Self { schema, values }
    }

    /// Creates an empty instance of a registered entity type.
    pub fn of<E: Entity>() -> ModelResult<Self> {
        Ok(Self::new(schema_of::<E>()?))
    }

    /// Creates an instance and assigns each `(field, value)` pair through
    /// the field's validating setter.
    pub fn with_values<I, K, V>(schema: Arc<EntitySchema>, values: I) -> ModelResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        let mut instance = Self::new(schema);
        for (name, value) in values {
            instance.set(name.as_ref(), value)?;
        }
        Ok(instance)
    }

    pub fn schema(&self) -> &Arc<EntitySchema> {
        &self.schema
    }

    /// Assigns a field, failing on unknown names or mismatched types.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> ModelResult<()> {
        let schema = Arc::clone(&self.schema);
        schema.field(name)?.set(self, value.into())
    }

    /// Builder-style [`Instance::set`].
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> ModelResult<Self> {
        self.set(name, value)?;
        Ok(self)
    }

    /// Returns the stored value, or null when the field was never assigned.
    pub fn get(&self, name: &str) -> &Value {
        self.values.get(name).unwrap_or(&NULL)
    }

    pub fn id(&self) -> &Value {
        self.get(IDENTITY_FIELD)
    }

    pub fn is_persisted(&self) -> bool {
        !self.id().is_null()
    }

    /// Writes back a store-assigned identity.
    ///
    /// Not validated against the integer identity type: document stores hand
    /// back their own native identifiers.
    pub fn assign_id(&mut self, id: Value) {
        self.values.insert(IDENTITY_FIELD.to_string(), id);
    }

    /// Resets the identity to null, marking the instance as detached.
    pub fn detach(&mut self) {
        self.assign_id(Value::Null);
    }

    /// Assigned values in declaration order, identity included.
    pub fn values(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.schema
            .fields()
            .iter()
            .filter_map(|f| self.values.get(f.name()).map(|v| (f.name(), v)))
    }

    /// The storable form of every user field, in declaration order.
    pub fn storable_values(&self) -> ModelResult<Vec<(String, Value)>> {
        self.schema
            .user_fields()
            .map(|f| Ok((f.name().to_string(), f.to_storable(f.get(self))?)))
            .collect()
    }

    /// Serializes the assigned fields into a JSON object, recursing into
    /// related instances. The identity is left out at every level.
    pub fn to_json(&self) -> serde_json::Value {
        let map = self
            .values()
            .filter(|(name, _)| *name != IDENTITY_FIELD)
            .map(|(name, value)| (name.to_string(), value.to_json()))
            .collect::<serde_json::Map<_, _>>();
        serde_json::Value::Object(map)
    }

    pub(crate) fn put(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), value);
    }
}

impl PartialEq for Instance {
    fn eq(&self, other: &Self) -> bool {
        self.schema.name() == other.schema.name() && self.values == other.values
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct(self.schema.name());
        for (name, value) in self.values() {
            s.field(name, value);
        }
        s.finish()
    }
}

impl fmt::Display for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}", self.schema.name())?;
        let mut first = true;
        for (name, value) in self.values().filter(|(_, v)| !v.is_null()) {
            let sep = if first { " " } else { ", " };
            write!(f, "{sep}{name}={value}")?;
            first = false;
        }
        write!(f, ">")
    }
}
