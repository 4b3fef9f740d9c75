//! Fluent query builder.
//!
//! `where_`, `and_` and `or_` fold predicates strictly left to right:
//! `where_(a).and_(b).or_(c)` means `((a AND b) OR c)`. The filter is kept as
//! an ordered list of `(operator, predicate)` steps rather than a tree so that
//! this order can never be rebalanced by precedence.

use crate::dialect::document::document_field;
use crate::dialect::{Dialect, SqlDialect};
use crate::error::DbResult;
use crate::predicate::{BoolOp, Placeholders, Predicate, combine_document, combine_sql};
use crate::statement::{Params, Statement};
use episode_model::{Entity, EntitySchema, schema_of};
use serde::Serialize;
use std::sync::Arc;

/// The accumulated filter: a seed predicate followed by folded steps.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    seed: Predicate,
    steps: Vec<(BoolOp, Predicate)>,
}

impl Filter {
    pub fn new(seed: Predicate) -> Self {
        Self {
            seed,
            steps: Vec::new(),
        }
    }

    pub fn push(&mut self, op: BoolOp, predicate: Predicate) {
        self.steps.push((op, predicate));
    }

    pub fn steps(&self) -> &[(BoolOp, Predicate)] {
        &self.steps
    }

    pub fn to_sql<D: SqlDialect + ?Sized>(
        &self,
        dialect: &D,
        placeholders: &mut Placeholders,
    ) -> Statement {
        let seed = self.seed.to_sql(dialect, placeholders);
        self.steps.iter().fold(seed, |acc, (op, predicate)| {
            let next = predicate.to_sql(dialect, placeholders);
            combine_sql(dialect, *op, acc, next)
        })
    }

    pub fn to_document(&self) -> serde_json::Value {
        self.steps
            .iter()
            .fold(self.seed.to_document(), |acc, (op, predicate)| {
                combine_document(*op, acc, predicate.to_document())
            })
    }
}

/// A compiled find for document stores.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentFind {
    /// Empty object when the query has no filter.
    pub filter: serde_json::Value,
    /// Field name to inclusion flag; empty means every field.
    pub projection: serde_json::Map<String, serde_json::Value>,
    pub limit: Option<u64>,
}

/// A query compiled for a specific dialect.
#[derive(Debug, Clone, PartialEq)]
pub enum CompiledQuery {
    Sql(Statement),
    Document(DocumentFind),
}

/// Accumulates filter, projection and row limit for one entity type.
#[derive(Debug, Clone)]
pub struct Query {
    schema: Arc<EntitySchema>,
    filter: Option<Filter>,
    projection: Vec<String>,
    limit: Option<u64>,
}

impl Query {
    pub fn new(schema: Arc<EntitySchema>) -> Self {
        Self {
            schema,
            filter: None,
            projection: Vec::new(),
            limit: None,
        }
    }

    pub fn of<E: Entity>() -> DbResult<Self> {
        Ok(Self::new(schema_of::<E>()?))
    }

    /// Replaces the filter with `predicate`.
    pub fn where_(mut self, predicate: Predicate) -> Self {
        self.filter = Some(Filter::new(predicate));
        self
    }

    /// Folds `predicate` into the filter with AND.
    pub fn and_(self, predicate: Predicate) -> Self {
        self.fold(BoolOp::And, predicate)
    }

    /// Folds `predicate` into the filter with OR.
    pub fn or_(self, predicate: Predicate) -> Self {
        self.fold(BoolOp::Or, predicate)
    }

    fn fold(mut self, op: BoolOp, predicate: Predicate) -> Self {
        match &mut self.filter {
            Some(filter) => filter.push(op, predicate),
            // Nothing to combine with yet: behaves like `where_`.
            None => self.filter = Some(Filter::new(predicate)),
        }
        self
    }

    /// Restricts the projection. Calling it with no names keeps every column.
    pub fn select_fields<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        if !names.is_empty() {
            self.projection = names;
        }
        self
    }

    /// Caps the number of rows. A limit of zero removes the cap.
    pub fn limit(mut self, n: u64) -> Self {
        self.limit = (n > 0).then_some(n);
        self
    }

    pub fn schema(&self) -> &Arc<EntitySchema> {
        &self.schema
    }

    pub fn filter(&self) -> Option<&Filter> {
        self.filter.as_ref()
    }

    pub fn projection(&self) -> &[String] {
        &self.projection
    }

    pub fn row_limit(&self) -> Option<u64> {
        self.limit
    }

    /// `SELECT <cols> FROM <storage> [WHERE ...] [LIMIT n]` plus parameters.
    pub fn compile_sql<D: SqlDialect + ?Sized>(&self, dialect: &D) -> Statement {
        let columns = if self.projection.is_empty() {
            "*".to_string()
        } else {
            self.projection.join(", ")
        };
        let mut sql = format!("SELECT {columns} FROM {}", self.schema.storage_name());

        let params = match &self.filter {
            Some(filter) => {
                let clause = filter.to_sql(dialect, &mut Placeholders::new());
                sql.push_str(" WHERE ");
                sql.push_str(&clause.sql);
                clause.params
            }
            None => Params::empty(dialect.param_style()),
        };

        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        Statement::new(sql, params)
    }

    /// The `(filter, projection, limit)` triple for a document store.
    pub fn compile_document(&self) -> DocumentFind {
        let filter = self
            .filter
            .as_ref()
            .map(Filter::to_document)
            .unwrap_or_else(|| serde_json::Value::Object(serde_json::Map::new()));
        let projection = self
            .projection
            .iter()
            .map(|name| (document_field(name).to_string(), serde_json::Value::from(1)))
            .collect();
        DocumentFind {
            filter,
            projection,
            limit: self.limit,
        }
    }

    pub fn compile(&self, dialect: &Dialect) -> CompiledQuery {
        match dialect {
            Dialect::Sql(sql) => CompiledQuery::Sql(self.compile_sql(sql.as_ref())),
            Dialect::Document(_) => CompiledQuery::Document(self.compile_document()),
        }
    }
}
