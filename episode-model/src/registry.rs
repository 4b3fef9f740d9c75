//! Process-wide schema registry.
//!
//! Each entity type is described once, the first time its schema is asked
//! for, and the result is cached by type identity for the life of the process.

use crate::error::{ModelError, ModelResult};
use crate::schema::{EntitySchema, SchemaBuilder};
use std::any::TypeId;
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

/// An entity type: a name plus a declaration of its attributes.
///
/// ```
/// use episode_model::{Entity, SchemaBuilder, schema_of};
///
/// struct Department;
///
/// impl Entity for Department {
///     const NAME: &'static str = "Department";
///
///     fn declare(schema: SchemaBuilder) -> SchemaBuilder {
///         schema.text("name").integer("size")
///     }
/// }
///
/// let schema = schema_of::<Department>().unwrap();
/// assert_eq!(schema.storage_name(), "department");
/// ```
pub trait Entity: 'static {
    const NAME: &'static str;

    fn declare(schema: SchemaBuilder) -> SchemaBuilder;
}

/// Cache of derived schemas keyed by entity type.
pub struct SchemaRegistry {
    schemas: RwLock<HashMap<TypeId, Arc<EntitySchema>>>,
}

thread_local! {
    static DECLARING: RefCell<Vec<TypeId>> = const { RefCell::new(Vec::new()) };
}

/// Pops the type from the in-progress stack however the declaration ends.
struct DeclarationGuard;

impl Drop for DeclarationGuard {
    fn drop(&mut self) {
        DECLARING.with_borrow_mut(|stack| {
            stack.pop();
        });
    }
}

impl SchemaRegistry {
    /// The registry shared by the whole process.
    pub fn global() -> &'static SchemaRegistry {
        static GLOBAL: OnceLock<SchemaRegistry> = OnceLock::new();
        GLOBAL.get_or_init(|| SchemaRegistry {
            schemas: RwLock::new(HashMap::new()),
        })
    }

    /// Returns the schema of `E`, deriving it on first use.
    pub fn schema_of<E: Entity>(&self) -> ModelResult<Arc<EntitySchema>> {
        let key = TypeId::of::<E>();
        if let Some(schema) = self.get_by_type(key) {
            return Ok(schema);
        }

        let recursive = DECLARING.with_borrow_mut(|stack| {
            if stack.contains(&key) {
                true
            } else {
                stack.push(key);
                false
            }
        });
        if recursive {
            return Err(ModelError::RecursiveDeclaration {
                entity: E::NAME.to_string(),
            });
        }
        let _guard = DeclarationGuard;

        // The lock is not held while declaring: relations register their
        // targets through this same method.
        let schema = Arc::new(E::declare(EntitySchema::builder(E::NAME)).build()?);

        let mut schemas = self.schemas.write().unwrap_or_else(PoisonError::into_inner);
        Ok(schemas.entry(key).or_insert(schema).clone())
    }

    /// Finds a registered schema by type name or storage name.
    pub fn find(&self, name: &str) -> Option<Arc<EntitySchema>> {
        let schemas = self.schemas.read().unwrap_or_else(PoisonError::into_inner);
        schemas
            .values()
            .find(|s| s.name() == name || s.storage_name() == name)
            .cloned()
    }

    pub fn contains<E: Entity>(&self) -> bool {
        self.get_by_type(TypeId::of::<E>()).is_some()
    }

    fn get_by_type(&self, key: TypeId) -> Option<Arc<EntitySchema>> {
        let schemas = self.schemas.read().unwrap_or_else(PoisonError::into_inner);
        schemas.get(&key).cloned()
    }
}

/// Shorthand for `SchemaRegistry::global().schema_of::<E>()`.
pub fn schema_of<E: Entity>() -> ModelResult<Arc<EntitySchema>> {
    SchemaRegistry::global().schema_of::<E>()
}
