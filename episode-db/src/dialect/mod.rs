//! Backend-specific strategies.
//!
//! The relational dialects share almost all statement generation through the
//! provided methods of [`SqlDialect`]; each one only supplies its column
//! types, identity column, placeholder style and driver. The document dialect
//! has no DDL and compiles predicates into filter documents instead.

pub mod document;
pub mod mysql;
pub mod sqlite;

use crate::config::DatabaseConfig;
use crate::error::{DbError, DbResult};
use crate::predicate::{Condition, Placeholders, Predicate};
use crate::statement::{ParamStyle, Params, Row, Statement};
use episode_model::{EntitySchema, Field, IDENTITY_FIELD, Instance, RelationKind, TypeRef, Value};
use std::fmt;
use std::sync::Arc;

pub use document::{Collection, DocumentDialect};
pub use mysql::MySqlDialect;
pub use sqlite::SqliteDialect;

/// A live connection to a relational store.
///
/// Every call blocks until the store replies. Each statement commits on its own.
pub trait SqlConnection: Send {
    /// Runs a statement that returns no rows; yields the number of rows affected.
    fn execute(&mut self, statement: &Statement) -> DbResult<u64>;

    /// Runs an INSERT and returns the identity the store assigned.
    fn insert(&mut self, statement: &Statement) -> DbResult<i64>;

    /// Runs a SELECT and collects every row.
    fn query(&mut self, statement: &Statement) -> DbResult<Vec<Row>>;

    /// Releases the connection.
    fn close(self: Box<Self>) -> DbResult<()>;
}

/// Statement generation for one relational engine.
pub trait SqlDialect: Send + Sync + fmt::Debug {
    /// Engine name for logs and error messages.
    fn name(&self) -> &'static str;

    fn param_style(&self) -> ParamStyle;

    /// Native column type for a scalar type, if the engine has one.
    fn scalar_type(&self, ty: &TypeRef) -> Option<&'static str>;

    /// Column definition of the auto-incrementing identity.
    fn identity_column(&self) -> &'static str;

    /// Opens a connection with the dialect's credentials.
    fn connect(&self) -> DbResult<Box<dyn SqlConnection>>;

    /// Placeholder text for a parameter called `name`.
    fn placeholder(&self, name: &str) -> String {
        match self.param_style() {
            ParamStyle::Positional => "?".to_string(),
            ParamStyle::Named => format!(":{name}"),
        }
    }

    /// Column type plus `NULL`/`NOT NULL`. Every relation is a single integer
    /// foreign key, unique for one-to-one.
    fn sql_type(&self, field: &Field) -> DbResult<String> {
        let integer = self.scalar_type(&TypeRef::Integer).unwrap_or("INTEGER");
        let base = match field.relation_kind() {
            RelationKind::OneToOne => format!("{integer} UNIQUE"),
            RelationKind::OneToMany => integer.to_string(),
            RelationKind::None => self
                .scalar_type(field.declared_type())
                .ok_or_else(|| DbError::UnsupportedType {
                    field: field.name().to_string(),
                    ty: field.declared_type().to_string(),
                    dialect: self.name().to_string(),
                })?
                .to_string(),
        };
        let null = if field.is_nullable() { "NULL" } else { "NOT NULL" };
        Ok(format!("{base} {null}"))
    }

    fn create_schema(&self, schema: &EntitySchema) -> DbResult<Statement> {
        let mut columns = vec![self.identity_column().to_string()];
        for field in schema.user_fields() {
            columns.push(format!("{} {}", field.name(), self.sql_type(field)?));
        }
        Ok(Statement::new(
            format!("CREATE TABLE {} ({})", schema.storage_name(), columns.join(", ")),
            Params::empty(self.param_style()),
        ))
    }

    fn drop_schema(&self, schema: &EntitySchema) -> Statement {
        Statement::new(
            format!("DROP TABLE IF EXISTS {}", schema.storage_name()),
            Params::empty(self.param_style()),
        )
    }

    /// INSERT for unsaved instances, UPDATE by identity otherwise.
    fn save_instance(&self, instance: &Instance) -> DbResult<Statement> {
        let values = instance.storable_values()?;
        if instance.is_persisted() {
            Ok(self.update(instance.schema(), values, instance.id().clone()))
        } else {
            Ok(self.insert(instance.schema(), values))
        }
    }

    fn insert(&self, schema: &EntitySchema, values: Vec<(String, Value)>) -> Statement {
        if values.is_empty() {
            return Statement::new(
                self.empty_insert(schema.storage_name()),
                Params::empty(self.param_style()),
            );
        }
        let columns: Vec<&str> = values.iter().map(|(name, _)| name.as_str()).collect();
        let markers: Vec<String> = columns.iter().map(|name| self.placeholder(name)).collect();
        Statement::new(
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                schema.storage_name(),
                columns.join(", "),
                markers.join(", ")
            ),
            self.bind(values),
        )
    }

    fn update(&self, schema: &EntitySchema, values: Vec<(String, Value)>, id: Value) -> Statement {
        let assignments = if values.is_empty() {
            format!("{IDENTITY_FIELD} = {IDENTITY_FIELD}")
        } else {
            values
                .iter()
                .map(|(name, _)| format!("{name} = {}", self.placeholder(name)))
                .collect::<Vec<_>>()
                .join(", ")
        };
        let params = self
            .bind(values)
            .concatenate(Params::single(self.param_style(), IDENTITY_FIELD, id));
        Statement::new(
            format!(
                "UPDATE {} SET {assignments} WHERE {IDENTITY_FIELD} = {}",
                schema.storage_name(),
                self.placeholder(IDENTITY_FIELD)
            ),
            params,
        )
    }

    /// INSERT for a table with nothing but its identity.
    fn empty_insert(&self, storage_name: &str) -> String {
        format!("INSERT INTO {storage_name} DEFAULT VALUES")
    }

    fn delete_instance(&self, instance: &Instance) -> Statement {
        self.by_identity("DELETE", instance.schema(), instance.id().clone())
    }

    /// Single-row lookup used to hydrate relations.
    fn select_by_id(&self, schema: &EntitySchema, id: Value) -> Statement {
        self.by_identity("SELECT *", schema, id)
    }

    fn by_identity(&self, verb: &str, schema: &EntitySchema, id: Value) -> Statement {
        Statement::new(
            format!(
                "{verb} FROM {} WHERE {IDENTITY_FIELD} = {}",
                schema.storage_name(),
                self.placeholder(IDENTITY_FIELD)
            ),
            Params::single(self.param_style(), IDENTITY_FIELD, id),
        )
    }

    /// Compiles one comparison leaf, minting a fresh placeholder name.
    fn compile_condition(&self, condition: &Condition, placeholders: &mut Placeholders) -> Statement {
        let name = placeholders.mint();
        Statement::new(
            format!(
                "{} {} {}",
                condition.field.name(),
                condition.op.sql_symbol(),
                self.placeholder(&name)
            ),
            Params::single(self.param_style(), &name, condition.value.clone()),
        )
    }

    fn compile_predicate(&self, predicate: &Predicate) -> Statement {
        predicate.to_sql(self, &mut Placeholders::new())
    }

    fn concatenate(&self, left: Params, right: Params) -> Params {
        left.concatenate(right)
    }

    /// Binds column values in the dialect's parameter style.
    fn bind(&self, values: Vec<(String, Value)>) -> Params {
        match self.param_style() {
            ParamStyle::Positional => {
                Params::Positional(values.into_iter().map(|(_, v)| v).collect())
            }
            ParamStyle::Named => Params::Named(values),
        }
    }
}

/// The backend a session talks to.
#[derive(Debug, Clone)]
pub enum Dialect {
    Sql(Arc<dyn SqlDialect>),
    Document(DocumentDialect),
}

impl Dialect {
    pub fn sqlite(config: crate::config::SqliteConfig) -> Self {
        Dialect::Sql(Arc::new(SqliteDialect::new(config)))
    }

    pub fn mysql(config: crate::config::MySqlConfig) -> Self {
        Dialect::Sql(Arc::new(MySqlDialect::new(config)))
    }

    pub fn document(config: crate::config::DocumentConfig) -> Self {
        Dialect::Document(DocumentDialect::new(config))
    }

    pub fn from_config(config: &DatabaseConfig) -> Self {
        match config {
            DatabaseConfig::Sqlite(c) => Self::sqlite(c.clone()),
            DatabaseConfig::Mysql(c) => Self::mysql(c.clone()),
            DatabaseConfig::Document(c) => Self::document(c.clone()),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Dialect::Sql(sql) => sql.name(),
            Dialect::Document(document) => document.name(),
        }
    }
}
