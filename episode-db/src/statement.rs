//! Generated statements, their bound parameters and raw result rows.

use episode_model::Value;

/// How a dialect marks parameters inside statement text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamStyle {
    /// `?` markers bound to an ordered list.
    Positional,
    /// `:name` markers bound to a name-keyed map.
    Named,
}

/// Parameter values bound to a statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Params {
    Positional(Vec<Value>),
    Named(Vec<(String, Value)>),
}

impl Params {
    pub fn empty(style: ParamStyle) -> Self {
        match style {
            ParamStyle::Positional => Params::Positional(Vec::new()),
            ParamStyle::Named => Params::Named(Vec::new()),
        }
    }

    /// A single value under `name`; the name is dropped for positional style.
    pub fn single(style: ParamStyle, name: &str, value: Value) -> Self {
        match style {
            ParamStyle::Positional => Params::Positional(vec![value]),
            ParamStyle::Named => Params::Named(vec![(name.to_string(), value)]),
        }
    }

    /// Merges two parameter sets: ordered concatenation for positional
    /// parameters, key union for named ones (the right side wins on a clash).
    pub fn concatenate(self, other: Params) -> Params {
        match (self, other) {
            (Params::Positional(mut left), Params::Positional(right)) => {
                left.extend(right);
                Params::Positional(left)
            }
            (Params::Named(mut left), Params::Named(right)) => {
                for (name, value) in right {
                    match left.iter_mut().find(|(n, _)| *n == name) {
                        Some(slot) => slot.1 = value,
                        None => left.push((name, value)),
                    }
                }
                Params::Named(left)
            }
            // Mixed styles degrade to declaration order.
            (left, right) => {
                let mut values = left.into_values();
                values.extend(right.into_values());
                Params::Positional(values)
            }
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Params::Positional(values) => values.len(),
            Params::Named(pairs) => pairs.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Looks up a named parameter.
    pub fn get(&self, name: &str) -> Option<&Value> {
        match self {
            Params::Positional(_) => None,
            Params::Named(pairs) => pairs.iter().find(|(n, _)| n == name).map(|(_, v)| v),
        }
    }

    pub fn into_values(self) -> Vec<Value> {
        match self {
            Params::Positional(values) => values,
            Params::Named(pairs) => pairs.into_iter().map(|(_, v)| v).collect(),
        }
    }
}

/// Statement text plus its parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Params,
}

impl Statement {
    pub fn new(sql: impl Into<String>, params: Params) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }
}

/// One result row, columns in the order the store returned them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<(String, Value)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, column: impl Into<String>, value: Value) {
        self.columns.push((column.into(), value));
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns.iter().find(|(c, _)| c == column).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.iter().map(|(c, v)| (c.as_str(), v))
    }
}

impl IntoIterator for Row {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.columns.into_iter()
    }
}

impl FromIterator<(String, Value)> for Row {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            columns: iter.into_iter().collect(),
        }
    }
}
