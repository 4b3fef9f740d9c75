//! Statement generation and execution for Episode entities.
//!
//! One API over three backends: SQLite and MySQL through generated,
//! parameterized SQL, and document stores (in-memory or MongoDB) through
//! filter documents.
//!
//! # Architecture
//!
//! - [`predicate`] builds comparison and AND/OR trees over fields
//! - [`query`] folds predicates left to right and adds projection and limit
//! - [`dialect`] turns schemas, instances and predicates into native statements
//! - [`session`] owns one connection, runs statements and hydrates relations
//!
//! ```no_run
//! use episode_db::{Dialect, Session, SessionConfig, SqliteConfig, ge};
//! use episode_model::{Entity, Instance, SchemaBuilder};
//!
//! struct Department;
//! impl Entity for Department {
//!     const NAME: &'static str = "Department";
//!     fn declare(schema: SchemaBuilder) -> SchemaBuilder {
//!         schema.text("name").integer("size")
//!     }
//! }
//!
//! # fn main() -> episode_db::DbResult<()> {
//! let dialect = Dialect::sqlite(SqliteConfig::new("school.db"));
//! Session::scope(&dialect, &SessionConfig::default(), |session| {
//!     session.recreate::<Department>()?;
//!     let mut science = Instance::of::<Department>()?
//!         .with("name", "Science")?
//!         .with("size", 2900)?;
//!     session.save(&mut science)?;
//!
//!     let query = session.select::<Department>()?.where_(ge("size", 1000));
//!     for department in session.run_query(&query)? {
//!         println!("{}", department?);
//!     }
//!     Ok(())
//! })
//! # }
//! ```

pub mod config;
pub mod dialect;
mod error;
pub mod logging;
pub mod predicate;
pub mod query;
pub mod session;
pub mod statement;
pub mod store;

pub use config::{
    DatabaseConfig, DocumentBackend, DocumentConfig, MySqlConfig, SessionConfig, SqliteConfig,
};
pub use dialect::document::DocumentCommand;
pub use dialect::{
    Collection, Dialect, DocumentDialect, MySqlDialect, SqlConnection, SqlDialect, SqliteDialect,
};
pub use error::{DbError, DbResult};
pub use predicate::{
    BoolCondition, BoolOp, CompareOp, Condition, FieldRef, Native, Placeholders, Predicate, and,
    eq, ge, gt, le, lt, ne, or,
};
pub use query::{CompiledQuery, DocumentFind, Filter, Query};
pub use session::{QueryRows, Session};
pub use statement::{ParamStyle, Params, Row, Statement};
pub use store::{Document, DocumentStore, MemoryStore};
