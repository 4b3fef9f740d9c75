//! Process-local document store.
//!
//! Understands the same filter language the document dialect emits: field
//! conditions `{field: {"$op": value}}` or `{field: literal}`, combined with
//! `{"$and"|"$or": [..]}`. Identities are auto-incrementing integers.
//! Writes to a collection that was never created affect no documents.

use super::{Document, DocumentStore};
use crate::dialect::document::DOCUMENT_ID;
use crate::error::DbResult;
use crate::query::DocumentFind;
use episode_model::Value;
use serde_json::Value as Json;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Collections shared by every [`MemoryStore`] opened on the same data.
#[derive(Debug, Default)]
pub struct MemoryData {
    collections: BTreeMap<String, Vec<Document>>,
    next_id: i64,
}

impl MemoryData {
    pub fn shared() -> Arc<Mutex<Self>> {
        Arc::new(Mutex::new(Self::default()))
    }
}

#[derive(Debug, Clone)]
pub struct MemoryStore {
    data: Arc<Mutex<MemoryData>>,
}

impl MemoryStore {
    pub fn new(data: Arc<Mutex<MemoryData>>) -> Self {
        Self { data }
    }

    fn lock(&self) -> MutexGuard<'_, MemoryData> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DocumentStore for MemoryStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    fn ensure_collection(&mut self, collection: &str) -> DbResult<()> {
        self.lock().collections.entry(collection.to_string()).or_default();
        Ok(())
    }

    fn collection_names(&mut self) -> DbResult<Vec<String>> {
        Ok(self.lock().collections.keys().cloned().collect())
    }

    fn insert_one(&mut self, collection: &str, mut document: Document) -> DbResult<Value> {
        let mut data = self.lock();
        data.next_id += 1;
        let id = data.next_id;
        document.insert(DOCUMENT_ID.to_string(), Json::from(id));
        data.collections
            .entry(collection.to_string())
            .or_default()
            .push(document);
        Ok(Value::Int(id))
    }

    fn update_one(&mut self, collection: &str, id: &Value, document: Document) -> DbResult<u64> {
        let id = id.to_json();
        let mut data = self.lock();
        let Some(docs) = data.collections.get_mut(collection) else {
            return Ok(0);
        };
        match docs.iter_mut().find(|doc| doc.get(DOCUMENT_ID) == Some(&id)) {
            Some(existing) => {
                for (key, value) in document {
                    if key != DOCUMENT_ID {
                        existing.insert(key, value);
                    }
                }
                Ok(1)
            }
            None => Ok(0),
        }
    }

    fn delete_one(&mut self, collection: &str, id: &Value) -> DbResult<u64> {
        let id = id.to_json();
        let mut data = self.lock();
        let Some(docs) = data.collections.get_mut(collection) else {
            return Ok(0);
        };
        match docs.iter().position(|doc| doc.get(DOCUMENT_ID) == Some(&id)) {
            Some(index) => {
                docs.remove(index);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    fn delete_many(&mut self, collection: &str, filter: &Json) -> DbResult<u64> {
        let mut data = self.lock();
        let Some(docs) = data.collections.get_mut(collection) else {
            return Ok(0);
        };
        let before = docs.len();
        docs.retain(|doc| !matches(doc, filter));
        Ok((before - docs.len()) as u64)
    }

    fn find(&mut self, collection: &str, find: &DocumentFind) -> DbResult<Vec<Document>> {
        let data = self.lock();
        let Some(docs) = data.collections.get(collection) else {
            return Ok(Vec::new());
        };
        let limit = find.limit.map_or(usize::MAX, |n| n as usize);
        Ok(docs
            .iter()
            .filter(|doc| matches(doc, &find.filter))
            .take(limit)
            .map(|doc| project(doc, &find.projection))
            .collect())
    }

    fn close(self: Box<Self>) -> DbResult<()> {
        Ok(())
    }
}

/// Evaluates a filter document against `doc`. Unknown operators never match.
pub fn matches(doc: &Document, filter: &Json) -> bool {
    let Json::Object(clauses) = filter else {
        return false;
    };
    clauses.iter().all(|(key, condition)| match key.as_str() {
        "$and" => each(condition).all(|f| matches(doc, f)),
        "$or" => each(condition).any(|f| matches(doc, f)),
        field => field_matches(doc.get(field).unwrap_or(&Json::Null), condition),
    })
}

fn each(condition: &Json) -> impl Iterator<Item = &Json> {
    condition.as_array().into_iter().flatten()
}

fn field_matches(actual: &Json, condition: &Json) -> bool {
    match condition {
        Json::Object(ops) if ops.keys().all(|k| k.starts_with('$')) => {
            ops.iter().all(|(op, expected)| {
                let ordering = compare(actual, expected);
                match op.as_str() {
                    "$eq" => ordering == Some(Ordering::Equal),
                    "$ne" => ordering != Some(Ordering::Equal),
                    "$lt" => ordering == Some(Ordering::Less),
                    "$lte" => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
                    "$gt" => ordering == Some(Ordering::Greater),
                    "$gte" => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
                    _ => false,
                }
            })
        }
        literal => compare(actual, literal) == Some(Ordering::Equal),
    }
}

/// Orders two JSON scalars of the same kind; mixed kinds are incomparable.
fn compare(a: &Json, b: &Json) -> Option<Ordering> {
    match (a, b) {
        (Json::Null, Json::Null) => Some(Ordering::Equal),
        (Json::Number(x), Json::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => Some(x.cmp(&y)),
            _ => x.as_f64()?.partial_cmp(&y.as_f64()?),
        },
        (Json::String(x), Json::String(y)) => Some(x.cmp(y)),
        (Json::Bool(x), Json::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn project(doc: &Document, projection: &serde_json::Map<String, Json>) -> Document {
    if projection.is_empty() {
        return doc.clone();
    }
    doc.iter()
        .filter(|(key, _)| {
            key.as_str() == DOCUMENT_ID
                || projection.get(key.as_str()).is_some_and(|flag| flag != &Json::from(0))
        })
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}
