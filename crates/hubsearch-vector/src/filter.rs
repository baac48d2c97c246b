//! Payload filter predicates.
//!
//! A [`Filter`] is a small AST built once and translated per backend:
//! evaluated directly against JSON payloads by the in-memory backend, and
//! rendered to a SQL predicate for LanceDB.
//!
//! Matching rules:
//! - `Eq` matches when the field equals the value, or when the field is an
//!   array containing the value.
//! - `In` matches when the field (or any element of an array field) equals
//!   any listed value.
//! - `And` matches when every child matches; an empty `And` matches all.
//! - Numbers compare by value, so `1` equals `1.0`.
//!
//! These rules hold on every backend: the SQL rendering is only a
//! prefilter, and [`Filter::matches`] has the final say.

use hubsearch_core::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A conjunction of per-key equality and membership constraints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Filter {
    /// `payload[key] == value`
    Eq {
        /// Payload key.
        key: String,
        /// Scalar to match.
        value: Value,
    },
    /// `payload[key] ∈ values`
    In {
        /// Payload key.
        key: String,
        /// Accepted scalars.
        values: Vec<Value>,
    },
    /// All children must match.
    And(Vec<Filter>),
}

impl Filter {
    /// Equality constraint.
    pub fn eq(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Eq {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Membership constraint.
    pub fn any_of<V: Into<Value>>(key: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        Self::In {
            key: key.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Conjunction of `filters`.
    pub fn and(filters: impl IntoIterator<Item = Filter>) -> Self {
        Self::And(filters.into_iter().collect())
    }

    /// Add another constraint, flattening into a single `And`.
    pub fn and_also(self, other: Filter) -> Self {
        match self {
            Self::And(mut children) => {
                children.push(other);
                Self::And(children)
            }
            first => Self::And(vec![first, other]),
        }
    }

    /// Reject malformed predicates: empty keys, empty `In` lists, and
    /// non-scalar values.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Eq { key, value } => {
                check_key(key)?;
                check_scalar(key, value)
            }
            Self::In { key, values } => {
                check_key(key)?;
                if values.is_empty() {
                    return Err(Error::validation(format!(
                        "filter on '{key}' must list at least one value"
                    )));
                }
                values.iter().try_for_each(|v| check_scalar(key, v))
            }
            Self::And(children) => children.iter().try_for_each(Filter::validate),
        }
    }

    /// Evaluate against a payload.
    pub fn matches(&self, payload: &Map<String, Value>) -> bool {
        match self {
            Self::Eq { key, value } => field_matches(payload.get(key), |v| scalar_eq(v, value)),
            Self::In { key, values } => {
                field_matches(payload.get(key), |v| values.iter().any(|x| scalar_eq(v, x)))
            }
            Self::And(children) => children.iter().all(|f| f.matches(payload)),
        }
    }

    /// Render as a SQL prefilter over a JSON-encoded `column`.
    ///
    /// String values are compared exactly. Numbers and booleans only require
    /// the field to be present, since their JSON text is not canonical.
    /// Array-valued fields cannot be searched element-wise in SQL, so any
    /// array is admitted. Callers must confirm candidates with
    /// [`Filter::matches`]: the result is a superset of the matching points.
    pub fn to_sql(&self, column: &str) -> Result<String> {
        self.validate()?;
        Ok(self.render_sql(column))
    }

    fn render_sql(&self, column: &str) -> String {
        match self {
            Self::Eq { key, value } if !value.is_string() => {
                format!("{} IS NOT NULL", json_path(column, key))
            }
            Self::In { key, values } if !values.iter().all(Value::is_string) => {
                format!("{} IS NOT NULL", json_path(column, key))
            }
            Self::Eq { key, value } => {
                let path = json_path(column, key);
                admit_arrays(&path, format!("{path} = {}", sql_literal(value)))
            }
            Self::In { key, values } => {
                let path = json_path(column, key);
                let list: Vec<String> = values.iter().map(sql_literal).collect();
                admit_arrays(&path, format!("{path} IN ({})", list.join(", ")))
            }
            Self::And(children) if children.is_empty() => "true".to_string(),
            Self::And(children) => children
                .iter()
                .map(|c| format!("({})", c.render_sql(column)))
                .collect::<Vec<_>>()
                .join(" AND "),
        }
    }
}

fn check_key(key: &str) -> Result<()> {
    if key.trim().is_empty() {
        return Err(Error::validation("filter key cannot be empty"));
    }
    Ok(())
}

fn check_scalar(key: &str, value: &Value) -> Result<()> {
    match value {
        Value::String(_) | Value::Number(_) | Value::Bool(_) => Ok(()),
        other => Err(Error::validation(format!(
            "filter on '{key}' must compare against a string, number, or bool, got {other}"
        ))),
    }
}

fn field_matches(field: Option<&Value>, pred: impl Fn(&Value) -> bool) -> bool {
    match field {
        Some(Value::Array(items)) => items.iter().any(&pred),
        Some(v) => pred(v),
        None => false,
    }
}

fn scalar_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        _ => a == b,
    }
}

fn escape(s: &str) -> String {
    s.replace('\'', "''")
}

fn json_path(column: &str, key: &str) -> String {
    format!("json_extract({column}, '$.{}')", escape(key))
}

fn admit_arrays(path: &str, scalar: String) -> String {
    format!("{scalar} OR {path} LIKE '[%'")
}

fn sql_literal(value: &Value) -> String {
    format!("'{}'", escape(value.as_str().unwrap_or_default()))
}

// ============================================================================
// Tests
// ============================================================================
