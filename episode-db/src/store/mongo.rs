//! MongoDB backend over the synchronous driver.
//!
//! Identities are native ObjectIds; they surface as their hex string and are
//! converted back whenever `_id` appears in a filter or update.

use super::{Document, DocumentStore};
use crate::dialect::document::DOCUMENT_ID;
use crate::error::{DbError, DbResult};
use crate::query::DocumentFind;
use bson::oid::ObjectId;
use bson::{Bson, doc};
use episode_model::Value;
use mongodb::options::FindOptions;
use mongodb::sync::{Client, Database};

pub struct MongoStore {
    client: Client,
    db: Database,
}

impl MongoStore {
    /// Connects and pings the server so an unreachable store fails at open.
    pub fn connect(host: &str, port: u16, database: &str) -> DbResult<Self> {
        let client = Client::with_uri_str(format!("mongodb://{host}:{port}"))
            .map_err(DbError::connection)?;
        let db = client.database(database);
        db.run_command(doc! { "ping": 1 }, None)
            .map_err(DbError::connection)?;
        Ok(Self { client, db })
    }

    fn collection(&self, name: &str) -> mongodb::sync::Collection<bson::Document> {
        self.db.collection(name)
    }
}

impl DocumentStore for MongoStore {
    fn backend_name(&self) -> &'static str {
        "mongodb"
    }

    fn ensure_collection(&mut self, collection: &str) -> DbResult<()> {
        if self.collection_names()?.iter().any(|n| n == collection) {
            return Ok(());
        }
        self.db
            .create_collection(collection, None)
            .map_err(|e| DbError::statement(format!("create collection {collection}"), e))
    }

    fn collection_names(&mut self) -> DbResult<Vec<String>> {
        self.db
            .list_collection_names(None)
            .map_err(|e| DbError::statement("list collections", e))
    }

    fn insert_one(&mut self, collection: &str, document: Document) -> DbResult<Value> {
        let document = to_bson_document(serde_json::Value::Object(document))?;
        let result = self
            .collection(collection)
            .insert_one(document, None)
            .map_err(|e| DbError::statement(format!("insert into {collection}"), e))?;
        Ok(match result.inserted_id {
            Bson::ObjectId(oid) => Value::Text(oid.to_hex()),
            Bson::Int64(i) => Value::Int(i),
            Bson::Int32(i) => Value::Int(i64::from(i)),
            other => Value::Text(other.to_string()),
        })
    }

    fn update_one(&mut self, collection: &str, id: &Value, document: Document) -> DbResult<u64> {
        let filter = id_filter(id)?;
        let mut fields = to_bson_document(serde_json::Value::Object(document))?;
        fields.remove(DOCUMENT_ID);
        let result = self
            .collection(collection)
            .update_one(filter, doc! { "$set": fields }, None)
            .map_err(|e| DbError::statement(format!("update {collection}"), e))?;
        Ok(result.matched_count)
    }

    fn delete_one(&mut self, collection: &str, id: &Value) -> DbResult<u64> {
        let result = self
            .collection(collection)
            .delete_one(id_filter(id)?, None)
            .map_err(|e| DbError::statement(format!("delete from {collection}"), e))?;
        Ok(result.deleted_count)
    }

    fn delete_many(&mut self, collection: &str, filter: &serde_json::Value) -> DbResult<u64> {
        let result = self
            .collection(collection)
            .delete_many(to_bson_document(filter.clone())?, None)
            .map_err(|e| DbError::statement(format!("delete from {collection}"), e))?;
        Ok(result.deleted_count)
    }

    fn find(&mut self, collection: &str, find: &DocumentFind) -> DbResult<Vec<Document>> {
        let mut options = FindOptions::default();
        if !find.projection.is_empty() {
            options.projection = Some(to_bson_document(serde_json::Value::Object(
                find.projection.clone(),
            ))?);
        }
        options.limit = find
            .limit
            .map(|n| i64::try_from(n).unwrap_or(i64::MAX));

        let statement = format!("find in {collection}");
        let cursor = self
            .collection(collection)
            .find(to_bson_document(find.filter.clone())?, options)
            .map_err(|e| DbError::statement(&statement, e))?;
        cursor
            .map(|doc| {
                let doc = doc.map_err(|e| DbError::statement(&statement, e))?;
                from_bson_document(doc)
            })
            .collect()
    }

    fn close(self: Box<Self>) -> DbResult<()> {
        drop(self.client);
        Ok(())
    }
}

fn id_filter(id: &Value) -> DbResult<bson::Document> {
    to_bson_document(serde_json::json!({ DOCUMENT_ID: id.to_json() }))
}

/// Converts a JSON object, turning hex strings under `_id` into ObjectIds.
fn to_bson_document(json: serde_json::Value) -> DbResult<bson::Document> {
    match bson::to_bson(&json).map_err(|e| DbError::InvalidData(e.to_string()))? {
        Bson::Document(doc) => Ok(restore_object_ids(doc)),
        other => Err(DbError::InvalidData(format!("expected a document, found {other}"))),
    }
}

fn restore_object_ids(doc: bson::Document) -> bson::Document {
    doc.into_iter()
        .map(|(key, value)| {
            let value = if key == DOCUMENT_ID {
                object_id(value)
            } else {
                nested(value)
            };
            (key, value)
        })
        .collect()
}

fn nested(value: Bson) -> Bson {
    match value {
        Bson::Document(doc) => Bson::Document(restore_object_ids(doc)),
        Bson::Array(items) => Bson::Array(items.into_iter().map(nested).collect()),
        other => other,
    }
}

/// `_id` values: a hex string becomes an ObjectId, operator maps recurse.
fn object_id(value: Bson) -> Bson {
    match value {
        Bson::String(hex) => match ObjectId::parse_str(&hex) {
            Ok(oid) => Bson::ObjectId(oid),
            Err(_) => Bson::String(hex),
        },
        Bson::Document(ops) => Bson::Document(
            ops.into_iter()
                .map(|(op, inner)| (op, object_id(inner)))
                .collect(),
        ),
        other => other,
    }
}

fn from_bson_document(doc: bson::Document) -> DbResult<Document> {
    doc.into_iter()
        .map(|(key, value)| Ok((key, to_json(value)?)))
        .collect()
}

fn to_json(value: Bson) -> DbResult<serde_json::Value> {
    Ok(match value {
        Bson::ObjectId(oid) => serde_json::Value::String(oid.to_hex()),
        Bson::Int32(i) => serde_json::Value::from(i),
        Bson::Int64(i) => serde_json::Value::from(i),
        Bson::Document(doc) => serde_json::Value::Object(from_bson_document(doc)?),
        other => other.into_relaxed_extjson(),
    })
}
