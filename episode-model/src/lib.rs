//! Entity model for episode.
//!
//! Defines how entity types are described and how their records live in memory:
//! - [`Entity`]: a type that declares its attributes once through a [`SchemaBuilder`]
//! - [`EntitySchema`]: the derived field map, storage name and implicit `id`
//! - [`Field`]: per-attribute metadata and the validating accessor
//! - [`Instance`]: one record, holding [`Value`]s keyed by field name
//!
//! Nothing here touches a database. Storage definitions and statements are
//! produced from these types by `episode-db`.

mod error;
mod field;
mod instance;
mod registry;
mod schema;
mod value;

pub use error::{ModelError, ModelResult};
pub use field::Field;
pub use instance::Instance;
pub use registry::{Entity, SchemaRegistry, schema_of};
pub use schema::{EntitySchema, IDENTITY_FIELD, RelationKind, SchemaBuilder, TypeRef};
pub use value::Value;
