//! Predicate algebra: comparison leaves and AND/OR combinations over fields.
//!
//! Predicates are plain values built with [`eq`], [`lt`], ... and combined
//! with [`and`] / [`or`]. A dialect compiles them into a native fragment:
//! a parameterized boolean expression for SQL, a filter document otherwise.

use crate::dialect::document::document_field;
use crate::dialect::{Dialect, SqlDialect};
use crate::statement::Statement;
use episode_model::{Field, Value};
use serde_json::json;

/// A comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    pub fn sql_symbol(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }

    pub fn document_symbol(self) -> &'static str {
        match self {
            CompareOp::Eq => "$eq",
            CompareOp::Ne => "$ne",
            CompareOp::Lt => "$lt",
            CompareOp::Le => "$lte",
            CompareOp::Gt => "$gt",
            CompareOp::Ge => "$gte",
        }
    }
}

/// A boolean combinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOp {
    And,
    Or,
}

impl BoolOp {
    pub fn sql_keyword(self) -> &'static str {
        match self {
            BoolOp::And => "AND",
            BoolOp::Or => "OR",
        }
    }

    pub fn document_key(self) -> &'static str {
        match self {
            BoolOp::And => "$and",
            BoolOp::Or => "$or",
        }
    }
}

/// Names a field inside a predicate, either from a schema [`Field`] or by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRef(String);

impl FieldRef {
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl From<&Field> for FieldRef {
    fn from(field: &Field) -> Self {
        FieldRef(field.name().to_string())
    }
}

impl From<&str> for FieldRef {
    fn from(name: &str) -> Self {
        FieldRef(name.to_string())
    }
}

impl From<String> for FieldRef {
    fn from(name: String) -> Self {
        FieldRef(name)
    }
}

/// A leaf comparison `field <op> value`.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub field: FieldRef,
    pub op: CompareOp,
    pub value: Value,
}

/// `left <op> right`.
#[derive(Debug, Clone, PartialEq)]
pub struct BoolCondition {
    pub op: BoolOp,
    pub left: Box<Predicate>,
    pub right: Box<Predicate>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Condition(Condition),
    Bool(BoolCondition),
}

/// A compiled predicate in a dialect's native form.
#[derive(Debug, Clone, PartialEq)]
pub enum Native {
    Sql(Statement),
    Document(serde_json::Value),
}

/// Mints the synthetic placeholder names (`var0`, `var1`, ...) used by
/// named-parameter dialects, so comparing one field twice cannot collide.
#[derive(Debug, Default)]
pub struct Placeholders {
    next: usize,
}

impl Placeholders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mint(&mut self) -> String {
        let name = format!("var{}", self.next);
        self.next += 1;
        name
    }
}

impl Predicate {
    /// Compiles into a SQL boolean expression and its parameters.
    pub fn to_sql<D: SqlDialect + ?Sized>(
        &self,
        dialect: &D,
        placeholders: &mut Placeholders,
    ) -> Statement {
        match self {
            Predicate::Condition(condition) => dialect.compile_condition(condition, placeholders),
            Predicate::Bool(node) => {
                let left = node.left.to_sql(dialect, placeholders);
                let right = node.right.to_sql(dialect, placeholders);
                combine_sql(dialect, node.op, left, right)
            }
        }
    }

    /// Compiles into a filter document.
    pub fn to_document(&self) -> serde_json::Value {
        match self {
            Predicate::Condition(condition) => {
                let field = document_field(condition.field.name());
                let mut filter = serde_json::Map::new();
                filter.insert(
                    field.to_string(),
                    json!({ condition.op.document_symbol(): condition.value.to_json() }),
                );
                serde_json::Value::Object(filter)
            }
            Predicate::Bool(node) => {
                combine_document(node.op, node.left.to_document(), node.right.to_document())
            }
        }
    }

    /// Compiles for whichever dialect is given.
    pub fn to_native(&self, dialect: &Dialect) -> Native {
        match dialect {
            Dialect::Sql(sql) => Native::Sql(self.to_sql(sql.as_ref(), &mut Placeholders::new())),
            Dialect::Document(_) => Native::Document(self.to_document()),
        }
    }
}

pub(crate) fn combine_sql<D: SqlDialect + ?Sized>(
    dialect: &D,
    op: BoolOp,
    left: Statement,
    right: Statement,
) -> Statement {
    Statement::new(
        format!("({} {} {})", left.sql, op.sql_keyword(), right.sql),
        dialect.concatenate(left.params, right.params),
    )
}

pub(crate) fn combine_document(
    op: BoolOp,
    left: serde_json::Value,
    right: serde_json::Value,
) -> serde_json::Value {
    json!({ op.document_key(): [left, right] })
}

fn compare(field: impl Into<FieldRef>, op: CompareOp, value: impl Into<Value>) -> Predicate {
    // Comparing against a related instance compares its identity.
    let value = match value.into() {
        Value::Entity(instance) => instance.id().clone(),
        other => other,
    };
    Predicate::Condition(Condition {
        field: field.into(),
        op,
        value,
    })
}

pub fn eq(field: impl Into<FieldRef>, value: impl Into<Value>) -> Predicate {
    compare(field, CompareOp::Eq, value)
}

pub fn ne(field: impl Into<FieldRef>, value: impl Into<Value>) -> Predicate {
    compare(field, CompareOp::Ne, value)
}

pub fn lt(field: impl Into<FieldRef>, value: impl Into<Value>) -> Predicate {
    compare(field, CompareOp::Lt, value)
}

pub fn le(field: impl Into<FieldRef>, value: impl Into<Value>) -> Predicate {
    compare(field, CompareOp::Le, value)
}

pub fn gt(field: impl Into<FieldRef>, value: impl Into<Value>) -> Predicate {
    compare(field, CompareOp::Gt, value)
}

pub fn ge(field: impl Into<FieldRef>, value: impl Into<Value>) -> Predicate {
    compare(field, CompareOp::Ge, value)
}

pub fn and(left: Predicate, right: Predicate) -> Predicate {
    Predicate::Bool(BoolCondition {
        op: BoolOp::And,
        left: Box::new(left),
        right: Box::new(right),
    })
}

pub fn or(left: Predicate, right: Predicate) -> Predicate {
    Predicate::Bool(BoolCondition {
        op: BoolOp::Or,
        left: Box::new(left),
        right: Box::new(right),
    })
}
