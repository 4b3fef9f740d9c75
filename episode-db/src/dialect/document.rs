//! Document dialect: collections instead of tables, filter documents instead
//! of SQL. Types are not enforced by the store.

use crate::config::{DocumentBackend, DocumentConfig};
use crate::error::DbResult;
use crate::predicate::Predicate;
use crate::query::DocumentFind;
use crate::store::{Document, DocumentStore, MemoryData, MemoryStore};
use episode_model::{EntitySchema, IDENTITY_FIELD, Instance, Value};
use serde::Serialize;
use std::sync::{Arc, Mutex};

/// The store's native identity key.
pub const DOCUMENT_ID: &str = "_id";

/// Maps a model field name to its document key.
pub(crate) fn document_field(name: &str) -> &str {
    if name == IDENTITY_FIELD { DOCUMENT_ID } else { name }
}

/// Handle to one collection, keyed by storage name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Collection {
    pub name: String,
}

/// A write against a document store, ready to run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DocumentCommand {
    InsertOne {
        collection: String,
        document: Document,
    },
    UpdateOne {
        collection: String,
        id: serde_json::Value,
        document: Document,
    },
    DeleteOne {
        collection: String,
        id: serde_json::Value,
    },
    DeleteMany {
        collection: String,
        filter: serde_json::Value,
    },
}

impl DocumentCommand {
    pub fn collection(&self) -> &str {
        match self {
            DocumentCommand::InsertOne { collection, .. }
            | DocumentCommand::UpdateOne { collection, .. }
            | DocumentCommand::DeleteOne { collection, .. }
            | DocumentCommand::DeleteMany { collection, .. } => collection,
        }
    }

    /// Runs the command. Inserts yield the new identity.
    pub fn apply(&self, store: &mut dyn DocumentStore) -> DbResult<Option<Value>> {
        match self {
            DocumentCommand::InsertOne {
                collection,
                document,
            } => store.insert_one(collection, document.clone()).map(Some),
            DocumentCommand::UpdateOne {
                collection,
                id,
                document,
            } => {
                store.update_one(collection, &id_value(id), document.clone())?;
                Ok(None)
            }
            DocumentCommand::DeleteOne { collection, id } => {
                store.delete_one(collection, &id_value(id))?;
                Ok(None)
            }
            DocumentCommand::DeleteMany { collection, filter } => {
                store.delete_many(collection, filter)?;
                Ok(None)
            }
        }
    }
}

fn id_value(id: &serde_json::Value) -> Value {
    Value::from_json(id).unwrap_or(Value::Null)
}

/// Dialect for document stores.
///
/// The in-memory backend's data lives in the dialect, so every session opened
/// from clones of one dialect sees the same collections.
#[derive(Debug, Clone)]
pub struct DocumentDialect {
    config: DocumentConfig,
    memory: Arc<Mutex<MemoryData>>,
}

impl DocumentDialect {
    pub fn new(config: DocumentConfig) -> Self {
        Self {
            config,
            memory: MemoryData::shared(),
        }
    }

    pub fn name(&self) -> &'static str {
        "document"
    }

    pub fn config(&self) -> &DocumentConfig {
        &self.config
    }

    pub fn connect(&self) -> DbResult<Box<dyn DocumentStore>> {
        match &self.config.backend {
            DocumentBackend::Memory => Ok(Box::new(MemoryStore::new(Arc::clone(&self.memory)))),
            DocumentBackend::MongoDb {
                host,
                port,
                database,
            } => connect_mongodb(host, *port, database),
        }
    }

    /// Collections need no DDL; the handle is created on first use.
    pub fn create_schema(&self, schema: &EntitySchema) -> Collection {
        Collection {
            name: schema.storage_name().to_string(),
        }
    }

    /// Clears every document of the collection.
    pub fn drop_schema(&self, schema: &EntitySchema) -> DocumentCommand {
        DocumentCommand::DeleteMany {
            collection: schema.storage_name().to_string(),
            filter: serde_json::json!({}),
        }
    }

    /// Insert for unsaved instances, field update by `_id` otherwise.
    pub fn save_instance(&self, instance: &Instance) -> DbResult<DocumentCommand> {
        let collection = instance.schema().storage_name().to_string();
        let document: Document = instance
            .storable_values()?
            .into_iter()
            .map(|(name, value)| (name, value.to_json()))
            .collect();
        Ok(if instance.is_persisted() {
            DocumentCommand::UpdateOne {
                collection,
                id: instance.id().to_json(),
                document,
            }
        } else {
            DocumentCommand::InsertOne {
                collection,
                document,
            }
        })
    }

    pub fn delete_instance(&self, instance: &Instance) -> DocumentCommand {
        DocumentCommand::DeleteOne {
            collection: instance.schema().storage_name().to_string(),
            id: instance.id().to_json(),
        }
    }

    /// Single-document lookup used to hydrate relations.
    pub fn select_by_id(&self, id: &Value) -> DocumentFind {
        DocumentFind {
            filter: serde_json::json!({ DOCUMENT_ID: { "$eq": id.to_json() } }),
            projection: serde_json::Map::new(),
            limit: Some(1),
        }
    }

    pub fn compile_predicate(&self, predicate: &Predicate) -> serde_json::Value {
        predicate.to_document()
    }
}

#[cfg(feature = "mongodb")]
fn connect_mongodb(host: &str, port: u16, database: &str) -> DbResult<Box<dyn DocumentStore>> {
    Ok(Box::new(crate::store::mongo::MongoStore::connect(
        host, port, database,
    )?))
}

#[cfg(not(feature = "mongodb"))]
fn connect_mongodb(host: &str, port: u16, _database: &str) -> DbResult<Box<dyn DocumentStore>> {
    Err(crate::error::DbError::Connection(format!(
        "cannot reach mongodb at {host}:{port}: built without the `mongodb` feature"
    )))
}
