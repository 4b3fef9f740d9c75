//! MySQL dialect: positional `?` placeholders, AUTO_INCREMENT identity.
//!
//! Statement generation is always available; the driver is behind the
//! `mysql` feature.

use super::{SqlConnection, SqlDialect};
use crate::config::MySqlConfig;
use crate::error::DbResult;
use crate::statement::ParamStyle;
use episode_model::TypeRef;

#[derive(Debug, Clone)]
pub struct MySqlDialect {
    config: MySqlConfig,
}

impl MySqlDialect {
    pub fn new(config: MySqlConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MySqlConfig {
        &self.config
    }
}

impl SqlDialect for MySqlDialect {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn param_style(&self) -> ParamStyle {
        ParamStyle::Positional
    }

    fn scalar_type(&self, ty: &TypeRef) -> Option<&'static str> {
        match ty {
            TypeRef::Integer => Some("INTEGER"),
            TypeRef::Real => Some("DOUBLE"),
            TypeRef::Text => Some("VARCHAR(255)"),
            TypeRef::Boolean => Some("BOOLEAN"),
            _ => None,
        }
    }

    fn identity_column(&self) -> &'static str {
        "id INTEGER AUTO_INCREMENT PRIMARY KEY"
    }

    fn empty_insert(&self, storage_name: &str) -> String {
        format!("INSERT INTO {storage_name} () VALUES ()")
    }

    #[cfg(feature = "mysql")]
    fn connect(&self) -> DbResult<Box<dyn SqlConnection>> {
        Ok(Box::new(driver::MySqlConnection::open(&self.config)?))
    }

    #[cfg(not(feature = "mysql"))]
    fn connect(&self) -> DbResult<Box<dyn SqlConnection>> {
        Err(crate::error::DbError::Connection(format!(
            "cannot reach mysql at {}:{}: built without the `mysql` feature",
            self.config.host, self.config.port
        )))
    }
}

#[cfg(feature = "mysql")]
mod driver {
    use crate::config::MySqlConfig;
    use crate::dialect::SqlConnection;
    use crate::error::{DbError, DbResult};
    use crate::statement::{Row, Statement};
    use episode_model::Value;
    use ::mysql::prelude::Queryable;

    pub struct MySqlConnection {
        conn: ::mysql::Conn,
    }

    impl MySqlConnection {
        pub fn open(config: &MySqlConfig) -> DbResult<Self> {
            let opts = ::mysql::OptsBuilder::new()
                .ip_or_hostname(Some(config.host.clone()))
                .tcp_port(config.port)
                .db_name(Some(config.database.clone()))
                .user(Some(config.user.clone()))
                .pass(Some(config.password.clone()));
            let conn = ::mysql::Conn::new(opts).map_err(DbError::connection)?;
            Ok(Self { conn })
        }
    }

    impl SqlConnection for MySqlConnection {
        fn execute(&mut self, statement: &Statement) -> DbResult<u64> {
            self.conn
                .exec_drop(&statement.sql, params(statement))
                .map_err(|e| DbError::statement(&statement.sql, e))?;
            Ok(self.conn.affected_rows())
        }

        fn insert(&mut self, statement: &Statement) -> DbResult<i64> {
            self.execute(statement)?;
            i64::try_from(self.conn.last_insert_id())
                .map_err(|e| DbError::InvalidData(format!("insert id out of range: {e}")))
        }

        fn query(&mut self, statement: &Statement) -> DbResult<Vec<Row>> {
            let rows: Vec<::mysql::Row> = self
                .conn
                .exec(&statement.sql, params(statement))
                .map_err(|e| DbError::statement(&statement.sql, e))?;
            rows.into_iter().map(read_row).collect()
        }

        fn close(self: Box<Self>) -> DbResult<()> {
            drop(self.conn);
            Ok(())
        }
    }

    fn params(statement: &Statement) -> ::mysql::Params {
        let values: Vec<::mysql::Value> = statement
            .params
            .clone()
            .into_values()
            .iter()
            .map(to_mysql)
            .collect();
        if values.is_empty() {
            ::mysql::Params::Empty
        } else {
            ::mysql::Params::Positional(values)
        }
    }

    fn to_mysql(value: &Value) -> ::mysql::Value {
        match value {
            Value::Null | Value::List(_) => ::mysql::Value::NULL,
            Value::Int(i) => ::mysql::Value::Int(*i),
            Value::Real(f) => ::mysql::Value::Double(*f),
            Value::Text(s) => ::mysql::Value::Bytes(s.as_bytes().to_vec()),
            Value::Bool(b) => ::mysql::Value::Int(i64::from(*b)),
            Value::Entity(instance) => to_mysql(instance.id()),
        }
    }

    fn read_row(row: ::mysql::Row) -> DbResult<Row> {
        let names: Vec<String> = row
            .columns_ref()
            .iter()
            .map(|c| c.name_str().into_owned())
            .collect();
        let mut record = Row::new();
        for (index, name) in names.into_iter().enumerate() {
            let value = match row.as_ref(index) {
                None | Some(::mysql::Value::NULL) => Value::Null,
                Some(::mysql::Value::Int(i)) => Value::Int(*i),
                Some(::mysql::Value::UInt(u)) => Value::Int(
                    i64::try_from(*u)
                        .map_err(|e| DbError::InvalidData(format!("column `{name}`: {e}")))?,
                ),
                Some(::mysql::Value::Float(f)) => Value::Real(f64::from(*f)),
                Some(::mysql::Value::Double(f)) => Value::Real(*f),
                Some(::mysql::Value::Bytes(bytes)) => Value::Text(
                    String::from_utf8(bytes.clone())
                        .map_err(|e| DbError::InvalidData(format!("column `{name}`: {e}")))?,
                ),
                Some(other) => {
                    return Err(DbError::InvalidData(format!(
                        "column `{name}` has unsupported value {other:?}"
                    )));
                }
            };
            record.push(name, value);
        }
        Ok(record)
    }
}
