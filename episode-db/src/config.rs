//! Connection and session configuration.

use crate::error::DbResult;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Path used to request a private in-memory SQLite database.
pub const SQLITE_MEMORY: &str = ":memory:";

/// SQLite database location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqliteConfig {
    pub path: PathBuf,
}

impl SqliteConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// A database private to the connection, discarded when it closes.
    pub fn in_memory() -> Self {
        Self::new(SQLITE_MEMORY)
    }

    pub fn is_in_memory(&self) -> bool {
        self.path.as_os_str() == SQLITE_MEMORY
    }
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self::new("episode.db")
    }
}

/// MySQL server credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MySqlConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
}

impl Default for MySqlConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 3306,
            database: "episode".to_string(),
            user: "root".to_string(),
            password: String::new(),
        }
    }
}

/// Which document store a document session talks to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DocumentBackend {
    /// Process-local store; sessions opened from the same dialect share it.
    Memory,
    MongoDb {
        host: String,
        port: u16,
        database: String,
    },
}

impl DocumentBackend {
    pub fn mongodb(database: impl Into<String>) -> Self {
        DocumentBackend::MongoDb {
            host: "localhost".to_string(),
            port: 27017,
            database: database.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentConfig {
    pub backend: DocumentBackend,
}

impl DocumentConfig {
    pub fn memory() -> Self {
        Self {
            backend: DocumentBackend::Memory,
        }
    }

    pub fn mongodb(database: impl Into<String>) -> Self {
        Self {
            backend: DocumentBackend::mongodb(database),
        }
    }
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self::memory()
    }
}

/// Backend selection as it appears in a configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "dbms", rename_all = "snake_case")]
pub enum DatabaseConfig {
    Sqlite(SqliteConfig),
    Mysql(MySqlConfig),
    Document(DocumentConfig),
}

impl DatabaseConfig {
    pub fn from_json(text: &str) -> DbResult<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Per-session options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Mirror statement logs into `log_dir/log_file`.
    pub log: bool,
    pub log_dir: PathBuf,
    pub log_file: String,
    /// Level directive for the file logger, e.g. `debug` or `episode_db=trace`.
    pub log_level: String,
}

impl SessionConfig {
    pub fn with_log_file(dir: impl Into<PathBuf>, file: impl Into<String>) -> Self {
        Self {
            log: true,
            log_dir: dir.into(),
            log_file: file.into(),
            ..Self::default()
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            log: false,
            log_dir: PathBuf::from("."),
            log_file: "episodeDB.log".to_string(),
            log_level: "debug".to_string(),
        }
    }
}
