//! Sessions: one live connection, CRUD, queries and relation hydration.
//!
//! A session connects when opened and releases its connection exactly once:
//! through [`Session::close`], at the end of [`Session::scope`], or when
//! dropped. Each statement commits on its own.

use crate::config::SessionConfig;
use crate::dialect::{Collection, Dialect, DocumentDialect, SqlConnection, SqlDialect};
use crate::dialect::document::{DOCUMENT_ID, DocumentCommand};
use crate::error::{DbError, DbResult};
use crate::logging;
use crate::query::Query;
use crate::statement::{Row, Statement};
use crate::store::{Document, DocumentStore};
use episode_model::{Entity, EntitySchema, IDENTITY_FIELD, Instance, Value, schema_of};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

enum Backend {
    Sql {
        dialect: Arc<dyn SqlDialect>,
        conn: Box<dyn SqlConnection>,
    },
    Document {
        dialect: DocumentDialect,
        store: Box<dyn DocumentStore>,
        collections: HashMap<String, Collection>,
    },
}

impl Backend {
    fn close(self) -> DbResult<()> {
        match self {
            Backend::Sql { conn, .. } => conn.close(),
            Backend::Document { store, .. } => store.close(),
        }
    }
}

/// A connection to one store plus the operations that run on it.
///
/// Not meant for concurrent use; share the [`Dialect`] and open one session
/// per caller instead.
pub struct Session {
    backend: Option<Backend>,
    dialect_name: &'static str,
}

impl Session {
    /// Connects immediately. With `config.log` set, statements are also
    /// written to the configured log file.
    pub fn open(dialect: &Dialect, config: &SessionConfig) -> DbResult<Self> {
        if config.log {
            logging::configure_file_logger(&config.log_dir, &config.log_file, &config.log_level);
        }

        let backend = match dialect {
            Dialect::Sql(sql) => Backend::Sql {
                dialect: Arc::clone(sql),
                conn: sql.connect()?,
            },
            Dialect::Document(document) => Backend::Document {
                dialect: document.clone(),
                store: document.connect()?,
                collections: HashMap::new(),
            },
        };
        info!("Opened {} session", dialect.name());
        Ok(Self {
            backend: Some(backend),
            dialect_name: dialect.name(),
        })
    }

    /// Opens a session, runs `f` and closes the session whatever `f` returns.
    pub fn scope<T>(
        dialect: &Dialect,
        config: &SessionConfig,
        f: impl FnOnce(&mut Session) -> DbResult<T>,
    ) -> DbResult<T> {
        let mut session = Self::open(dialect, config)?;
        let result = f(&mut session);
        let closed = session.close();
        let value = result?;
        closed?;
        Ok(value)
    }

    pub fn dialect_name(&self) -> &'static str {
        self.dialect_name
    }

    /// Releases the connection, reporting any error from the driver.
    pub fn close(mut self) -> DbResult<()> {
        match self.backend.take() {
            Some(backend) => {
                debug!("Closing {} session", self.dialect_name);
                backend.close()
            }
            None => Ok(()),
        }
    }

    fn backend(&mut self) -> DbResult<&mut Backend> {
        self.backend
            .as_mut()
            .ok_or_else(|| DbError::Connection("session is closed".to_string()))
    }

    // ── Schema ───────────────────────────────────────────────────

    /// Creates the table (or collection) for `schema`.
    pub fn create_schema(&mut self, schema: &EntitySchema) -> DbResult<()> {
        match self.backend()? {
            Backend::Sql { dialect, conn } => {
                let statement = dialect.create_schema(schema)?;
                run(conn.as_mut(), &statement)?;
            }
            Backend::Document {
                dialect,
                store,
                collections,
            } => {
                let collection = dialect.create_schema(schema);
                debug!(backend = store.backend_name(), collection = %collection.name, "Creating collection");
                store.ensure_collection(&collection.name)?;
                collections.insert(collection.name.clone(), collection);
            }
        }
        Ok(())
    }

    /// Drops the table, or clears the collection if it exists.
    pub fn drop_schema(&mut self, schema: &EntitySchema) -> DbResult<()> {
        match self.backend()? {
            Backend::Sql { dialect, conn } => {
                run(conn.as_mut(), &dialect.drop_schema(schema))?;
            }
            Backend::Document { dialect, store, .. } => {
                let exists = store
                    .collection_names()?
                    .iter()
                    .any(|name| name == schema.storage_name());
                if exists {
                    apply(store.as_mut(), &dialect.drop_schema(schema))?;
                }
            }
        }
        Ok(())
    }

    /// Drop followed by create, for idempotent bootstrapping.
    pub fn recreate_schema(&mut self, schema: &EntitySchema) -> DbResult<()> {
        self.drop_schema(schema)?;
        self.create_schema(schema)
    }

    pub fn create<E: Entity>(&mut self) -> DbResult<()> {
        let schema = schema_of::<E>()?;
        self.create_schema(&schema)
    }

    pub fn drop_entity<E: Entity>(&mut self) -> DbResult<()> {
        let schema = schema_of::<E>()?;
        self.drop_schema(&schema)
    }

    pub fn recreate<E: Entity>(&mut self) -> DbResult<()> {
        let schema = schema_of::<E>()?;
        self.recreate_schema(&schema)
    }

    // ── CRUD ─────────────────────────────────────────────────────

    /// Inserts an unsaved instance and writes back its new identity, or
    /// updates a persisted one in place.
    pub fn save(&mut self, instance: &mut Instance) -> DbResult<()> {
        let assigned = match self.backend()? {
            Backend::Sql { dialect, conn } => {
                let statement = dialect.save_instance(instance)?;
                log_statement(&statement);
                if instance.is_persisted() {
                    conn.execute(&statement)?;
                    None
                } else {
                    Some(Value::Int(conn.insert(&statement)?))
                }
            }
            Backend::Document {
                dialect,
                store,
                collections,
            } => {
                let command = dialect.save_instance(instance)?;
                if !collections.contains_key(command.collection()) {
                    let collection = dialect.create_schema(instance.schema());
                    store.ensure_collection(&collection.name)?;
                    collections.insert(collection.name.clone(), collection);
                }
                apply(store.as_mut(), &command)?
            }
        };
        if let Some(id) = assigned {
            instance.assign_id(id);
        }
        Ok(())
    }

    /// Deletes a persisted instance and detaches it. Deleting an instance
    /// that is already detached does nothing.
    pub fn delete(&mut self, instance: &mut Instance) -> DbResult<()> {
        if !instance.is_persisted() {
            debug!("Skipping delete of detached {}", instance.schema().name());
            return Ok(());
        }
        match self.backend()? {
            Backend::Sql { dialect, conn } => {
                run(conn.as_mut(), &dialect.delete_instance(instance))?;
            }
            Backend::Document { dialect, store, .. } => {
                apply(store.as_mut(), &dialect.delete_instance(instance))?;
            }
        }
        instance.detach();
        Ok(())
    }

    // ── Queries ──────────────────────────────────────────────────

    /// Starts a query over every instance of `E`.
    pub fn select<E: Entity>(&self) -> DbResult<Query> {
        Query::of::<E>()
    }

    /// Runs `query` and returns its results as a single-pass iterator.
    /// Relations are resolved row by row as the iterator advances.
    pub fn run_query(&mut self, query: &Query) -> DbResult<QueryRows<'_>> {
        let schema = Arc::clone(query.schema());
        let rows = match self.backend()? {
            Backend::Sql { dialect, conn } => {
                let statement = query.compile_sql(dialect.as_ref());
                log_statement(&statement);
                conn.query(&statement)?
            }
            Backend::Document { store, .. } => {
                let find = query.compile_document();
                debug!(
                    backend = store.backend_name(),
                    collection = schema.storage_name(),
                    find = %serde_json::to_string(&find)?,
                    "Running find"
                );
                store
                    .find(schema.storage_name(), &find)?
                    .into_iter()
                    .map(document_row)
                    .collect::<DbResult<Vec<_>>>()?
            }
        };
        Ok(QueryRows {
            session: self,
            schema,
            rows: rows.into_iter(),
        })
    }

    fn fetch_by_id(&mut self, target: &EntitySchema, id: &Value) -> DbResult<Option<Row>> {
        let row = match self.backend()? {
            Backend::Sql { dialect, conn } => {
                let statement = dialect.select_by_id(target, id.clone());
                log_statement(&statement);
                conn.query(&statement)?.into_iter().next()
            }
            Backend::Document { dialect, store, .. } => {
                let find = dialect.select_by_id(id);
                debug!(collection = target.storage_name(), id = %id, "Looking up related document");
                match store.find(target.storage_name(), &find)?.into_iter().next() {
                    Some(document) => Some(document_row(document)?),
                    None => None,
                }
            }
        };
        Ok(row)
    }

    /// Builds an instance from a raw row, replacing every foreign key with
    /// the hydrated related instance. Columns the schema does not know are
    /// ignored.
    fn hydrate(&mut self, schema: &Arc<EntitySchema>, row: Row) -> DbResult<Instance> {
        let mut instance = Instance::new(Arc::clone(schema));
        for (column, raw) in row {
            let Some(field) = schema.get_field(&column) else {
                continue;
            };
            if field.is_identity() {
                instance.assign_id(raw);
                continue;
            }
            let value = match field.target() {
                Some(target) if !raw.is_null() => {
                    let target = Arc::clone(target);
                    let related = self.fetch_by_id(&target, &raw)?.ok_or_else(|| {
                        DbError::MissingRelatedRow {
                            storage: target.storage_name().to_string(),
                            id: raw.to_string(),
                        }
                    })?;
                    Value::from(self.hydrate(&target, related)?)
                }
                _ => field.from_storage(raw),
            };
            field.set(&mut instance, value)?;
        }
        Ok(instance)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(backend) = self.backend.take() {
            debug!("Releasing {} session", self.dialect_name);
            if let Err(e) = backend.close() {
                warn!("Failed to release {} connection: {}", self.dialect_name, e);
            }
        }
    }
}

/// Lazily hydrated query results.
///
/// Holds the session mutably until dropped; running the query again needs a
/// new [`Session::run_query`] call.
pub struct QueryRows<'s> {
    session: &'s mut Session,
    schema: Arc<EntitySchema>,
    rows: std::vec::IntoIter<Row>,
}

impl Iterator for QueryRows<'_> {
    type Item = DbResult<Instance>;

    fn next(&mut self) -> Option<Self::Item> {
        let row = self.rows.next()?;
        Some(self.session.hydrate(&self.schema, row))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.rows.size_hint()
    }
}

fn log_statement(statement: &Statement) {
    debug!(sql = %statement.sql, params = ?statement.params, "Executing statement");
}

fn run(conn: &mut dyn SqlConnection, statement: &Statement) -> DbResult<u64> {
    log_statement(statement);
    conn.execute(statement)
}

fn apply(store: &mut dyn DocumentStore, command: &DocumentCommand) -> DbResult<Option<Value>> {
    debug!(
        backend = store.backend_name(),
        command = %serde_json::to_string(command)?,
        "Executing document command"
    );
    command.apply(store)
}

/// Turns a stored document into a row, exposing `_id` as `id`.
fn document_row(document: Document) -> DbResult<Row> {
    document
        .into_iter()
        .map(|(key, json)| {
            let value = Value::from_json(&json).ok_or_else(|| {
                DbError::InvalidData(format!("field `{key}` holds a nested document"))
            })?;
            let column = if key == DOCUMENT_ID {
                IDENTITY_FIELD.to_string()
            } else {
                key
            };
            Ok((column, value))
        })
        .collect()
}
