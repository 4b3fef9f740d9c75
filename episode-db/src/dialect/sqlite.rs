//! SQLite dialect over rusqlite: `:name` placeholders, AUTOINCREMENT identity.

use super::{SqlConnection, SqlDialect};
use crate::config::SqliteConfig;
use crate::error::{DbError, DbResult};
use crate::statement::{ParamStyle, Params, Row, Statement};
use episode_model::{TypeRef, Value};
use rusqlite::types::{ToSqlOutput, ValueRef};
use rusqlite::{Connection, ToSql};

#[derive(Debug, Clone)]
pub struct SqliteDialect {
    config: SqliteConfig,
}

impl SqliteDialect {
    pub fn new(config: SqliteConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SqliteConfig {
        &self.config
    }
}

impl SqlDialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn param_style(&self) -> ParamStyle {
        ParamStyle::Named
    }

    fn scalar_type(&self, ty: &TypeRef) -> Option<&'static str> {
        match ty {
            TypeRef::Integer | TypeRef::Boolean => Some("INTEGER"),
            TypeRef::Real => Some("REAL"),
            TypeRef::Text => Some("TEXT"),
            _ => None,
        }
    }

    fn identity_column(&self) -> &'static str {
        "id INTEGER PRIMARY KEY AUTOINCREMENT"
    }

    fn connect(&self) -> DbResult<Box<dyn SqlConnection>> {
        let conn = if self.config.is_in_memory() {
            Connection::open_in_memory()
        } else {
            Connection::open(&self.config.path)
        }
        .map_err(|e| DbError::Connection(format!("failed to open sqlite database: {e}")))?;
        Ok(Box::new(SqliteConnection { conn }))
    }
}

/// An open rusqlite connection in autocommit mode.
pub struct SqliteConnection {
    conn: Connection,
}

impl SqliteConnection {
    fn prepare<'c>(
        conn: &'c Connection,
        statement: &Statement,
    ) -> DbResult<rusqlite::Statement<'c>> {
        let mut stmt = conn
            .prepare(&statement.sql)
            .map_err(|e| DbError::statement(&statement.sql, e))?;
        bind(&mut stmt, &statement.params).map_err(|e| DbError::statement(&statement.sql, e))?;
        Ok(stmt)
    }
}

impl SqlConnection for SqliteConnection {
    fn execute(&mut self, statement: &Statement) -> DbResult<u64> {
        let mut stmt = Self::prepare(&self.conn, statement)?;
        let changed = stmt
            .raw_execute()
            .map_err(|e| DbError::statement(&statement.sql, e))?;
        Ok(changed as u64)
    }

    fn insert(&mut self, statement: &Statement) -> DbResult<i64> {
        self.execute(statement)?;
        Ok(self.conn.last_insert_rowid())
    }

    fn query(&mut self, statement: &Statement) -> DbResult<Vec<Row>> {
        let mut stmt = Self::prepare(&self.conn, statement)?;
        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();

        let mut rows = stmt.raw_query();
        let mut out = Vec::new();
        while let Some(row) = rows.next().map_err(|e| DbError::statement(&statement.sql, e))? {
            let mut record = Row::new();
            for (index, column) in columns.iter().enumerate() {
                let raw = row
                    .get_ref(index)
                    .map_err(|e| DbError::statement(&statement.sql, e))?;
                record.push(column.clone(), from_sql(raw)?);
            }
            out.push(record);
        }
        Ok(out)
    }

    fn close(self: Box<Self>) -> DbResult<()> {
        self.conn
            .close()
            .map_err(|(_, e)| DbError::Connection(format!("failed to close sqlite database: {e}")))
    }
}

fn bind(stmt: &mut rusqlite::Statement<'_>, params: &Params) -> rusqlite::Result<()> {
    match params {
        Params::Positional(values) => {
            for (index, value) in values.iter().enumerate() {
                stmt.raw_bind_parameter(index + 1, SqlValue(value))?;
            }
        }
        Params::Named(pairs) => {
            for (name, value) in pairs {
                let marker = format!(":{name}");
                let index = stmt
                    .parameter_index(&marker)?
                    .ok_or(rusqlite::Error::InvalidParameterName(marker))?;
                stmt.raw_bind_parameter(index, SqlValue(value))?;
            }
        }
    }
    Ok(())
}

fn from_sql(raw: ValueRef<'_>) -> DbResult<Value> {
    Ok(match raw {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Int(i),
        ValueRef::Real(f) => Value::Real(f),
        ValueRef::Text(bytes) => Value::Text(
            std::str::from_utf8(bytes)
                .map_err(|e| DbError::InvalidData(format!("non-utf8 text column: {e}")))?
                .to_string(),
        ),
        ValueRef::Blob(_) => return Err(DbError::InvalidData("unexpected blob column".into())),
    })
}

/// Binds a model value as a SQLite value.
struct SqlValue<'a>(&'a Value);

impl ToSql for SqlValue<'_> {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        to_output(self.0)
    }
}

fn to_output(value: &Value) -> rusqlite::Result<ToSqlOutput<'_>> {
    Ok(match value {
        Value::Null => ToSqlOutput::Borrowed(ValueRef::Null),
        Value::Int(i) => ToSqlOutput::Borrowed(ValueRef::Integer(*i)),
        Value::Real(f) => ToSqlOutput::Borrowed(ValueRef::Real(*f)),
        Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
        Value::Bool(b) => ToSqlOutput::Borrowed(ValueRef::Integer(i64::from(*b))),
        // A related instance is stored as its identity.
        Value::Entity(instance) => return to_output(instance.id()),
        Value::List(_) => {
            return Err(rusqlite::Error::ToSqlConversionFailure(
                "lists have no sqlite representation".into(),
            ));
        }
    })
}
