//! Document store backends.
//!
//! A [`DocumentStore`] is the document-side counterpart of
//! [`SqlConnection`](crate::dialect::SqlConnection): a live handle that runs
//! already-compiled commands. Documents are JSON objects whose identity lives
//! under `_id`.

pub mod memory;
#[cfg(feature = "mongodb")]
pub mod mongo;

use crate::error::DbResult;
use crate::query::DocumentFind;
use episode_model::Value;

pub use memory::{MemoryData, MemoryStore};

/// A stored document.
pub type Document = serde_json::Map<String, serde_json::Value>;

/// A live connection to a document store.
pub trait DocumentStore: Send {
    /// Backend name for logs.
    fn backend_name(&self) -> &'static str;

    /// Creates the collection if it does not exist yet.
    fn ensure_collection(&mut self, collection: &str) -> DbResult<()>;

    fn collection_names(&mut self) -> DbResult<Vec<String>>;

    /// Inserts a document and returns the identity the store assigned.
    fn insert_one(&mut self, collection: &str, document: Document) -> DbResult<Value>;

    /// Replaces the fields of the document with identity `id`; returns the match count.
    fn update_one(&mut self, collection: &str, id: &Value, document: Document) -> DbResult<u64>;

    fn delete_one(&mut self, collection: &str, id: &Value) -> DbResult<u64>;

    /// Deletes every document matching `filter`; `{}` clears the collection.
    fn delete_many(&mut self, collection: &str, filter: &serde_json::Value) -> DbResult<u64>;

    fn find(&mut self, collection: &str, find: &DocumentFind) -> DbResult<Vec<Document>>;

    fn close(self: Box<Self>) -> DbResult<()>;
}
