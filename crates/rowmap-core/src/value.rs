//! Scalar values stored on records
//!
//! Every assignment to a record field passes through [`Value::coerce`].
//! Coercion is null-safe: `Value::Null` is returned unchanged for every
//! column type, so an Integer column never turns `None` into `0`.

use std::fmt;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::schema::ScalarType;

/// A single column value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Real(f64),
    Text(String),
}

/// A value could not be converted to a column's scalar type
#[derive(Error, Debug, Clone, PartialEq)]
#[error("cannot convert {found} to {expected}")]
pub struct CoercionError {
    pub expected: ScalarType,
    pub found: String,
}

impl Value {
    /// Convert this value to `target`, leaving `Null` untouched
    pub fn coerce(self, target: ScalarType) -> Result<Value, CoercionError> {
        if self.is_null() {
            return Ok(Value::Null);
        }

        let fail = |value: &Value| CoercionError {
            expected: target,
            found: value.describe(),
        };

        let coerced = match (target, self) {
            (ScalarType::Integer, Value::Integer(i)) => Value::Integer(i),
            (ScalarType::Integer, Value::Boolean(b)) => Value::Integer(i64::from(b)),
            (ScalarType::Integer, Value::Real(f)) => {
                // Truncate toward zero; reject values with no integer meaning
                if !f.is_finite() || f.trunc() < i64::MIN as f64 || f.trunc() > i64::MAX as f64 {
                    return Err(fail(&Value::Real(f)));
                }
                Value::Integer(f.trunc() as i64)
            }
            (ScalarType::Integer, Value::Text(s)) => match s.trim().parse::<i64>() {
                Ok(i) => Value::Integer(i),
                Err(_) => return Err(fail(&Value::Text(s))),
            },

            (ScalarType::Real, Value::Real(f)) => Value::Real(f),
            (ScalarType::Real, Value::Integer(i)) => Value::Real(i as f64),
            (ScalarType::Real, Value::Boolean(b)) => Value::Real(if b { 1.0 } else { 0.0 }),
            (ScalarType::Real, Value::Text(s)) => match s.trim().parse::<f64>() {
                Ok(f) => Value::Real(f),
                Err(_) => return Err(fail(&Value::Text(s))),
            },

            (ScalarType::Boolean, Value::Boolean(b)) => Value::Boolean(b),
            (ScalarType::Boolean, Value::Integer(i)) => Value::Boolean(i != 0),
            (ScalarType::Boolean, Value::Real(f)) => Value::Boolean(f != 0.0),
            (ScalarType::Boolean, Value::Text(s)) => match parse_bool(&s) {
                Some(b) => Value::Boolean(b),
                None => return Err(fail(&Value::Text(s))),
            },

            (ScalarType::Text, Value::Text(s)) => Value::Text(s),
            (ScalarType::Text, Value::Integer(i)) => Value::Text(i.to_string()),
            (ScalarType::Text, Value::Real(f)) => Value::Text(format!("{:?}", f)),
            (ScalarType::Text, Value::Boolean(b)) => Value::Text(b.to_string()),

            (_, Value::Null) => Value::Null,
        };

        Ok(coerced)
    }

    /// Check if this value is SQL NULL
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Real(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Name of the value's variant, for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Real(_) => "real",
            Value::Text(_) => "text",
        }
    }

    /// Render this value as a SQL literal for a `DEFAULT` clause
    ///
    /// Returns `None` for `Null`, which means "no DEFAULT clause". The
    /// rendering must stay stable: reconciliation compares it textually
    /// against the default SQLite reports for existing columns.
    pub fn to_sql_literal(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Boolean(b) => Some(if *b { "1" } else { "0" }.to_string()),
            Value::Integer(i) => Some(i.to_string()),
            Value::Real(f) => Some(format!("{:?}", f)),
            Value::Text(s) => Some(format!("'{}'", s.replace('\'', "''"))),
        }
    }

    fn describe(&self) -> String {
        match self {
            Value::Text(s) => format!("text {:?}", s),
            other => format!("{} {}", other.type_name(), other),
        }
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "yes" | "1" => Some(true),
        "false" | "f" | "no" | "0" => Some(false),
        _ => None,
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Real(r) => write!(f, "{:?}", r),
            Value::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Integer(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Real(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Borrowed(ValueRef::Null),
            Value::Boolean(b) => ToSqlOutput::Borrowed(ValueRef::Integer(i64::from(*b))),
            Value::Integer(i) => ToSqlOutput::Borrowed(ValueRef::Integer(*i)),
            Value::Real(f) => ToSqlOutput::Borrowed(ValueRef::Real(*f)),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
        })
    }
}

impl FromSql for Value {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value {
            ValueRef::Null => Ok(Value::Null),
            ValueRef::Integer(i) => Ok(Value::Integer(i)),
            ValueRef::Real(f) => Ok(Value::Real(f)),
            ValueRef::Text(_) => value.as_str().map(|s| Value::Text(s.to_string())),
            ValueRef::Blob(_) => Err(FromSqlError::InvalidType),
        }
    }
}
