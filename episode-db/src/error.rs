//! Error types for the database layer.

use episode_model::ModelError;
use std::fmt;
use thiserror::Error;

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

/// Errors that can occur while generating or executing statements.
#[derive(Debug, Error)]
pub enum DbError {
    /// Model-level failure (type mismatch, unbound relation, ...).
    #[error(transparent)]
    Model(#[from] ModelError),

    /// The dialect has no column type for a declared type.
    #[error("{dialect} has no column type for `{field}` ({ty})")]
    UnsupportedType {
        field: String,
        ty: String,
        dialect: String,
    },

    /// The store is unreachable or rejected the credentials.
    #[error("connection error: {0}")]
    Connection(String),

    /// The store rejected a generated statement.
    #[error("statement error: {message} (while running `{statement}`)")]
    Statement { statement: String, message: String },

    /// A foreign key points at a row that no longer exists.
    #[error("no `{storage}` row with id {id}")]
    MissingRelatedRow { storage: String, id: String },

    /// A value could not be bound to, or read back from, the store.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DbError {
    pub(crate) fn statement(statement: impl Into<String>, err: impl fmt::Display) -> Self {
        DbError::Statement {
            statement: statement.into(),
            message: err.to_string(),
        }
    }

    pub(crate) fn connection(err: impl fmt::Display) -> Self {
        DbError::Connection(err.to_string())
    }
}
