//! Scalar values exchanged with the database driver.

use std::collections::BTreeMap;

use base64::Engine as _;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Serialize, Serializer};

/// Named parameters bound to a statement template, keyed by placeholder name.
pub type Parameters = BTreeMap<String, SqlValue>;

/// Why a JSON value cannot be bound to a placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonValueError {
    NotScalar,
    IntegerOutOfRange,
}

/// A single scalar bound to a placeholder or read back from a result column.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Integer(i64),
    Real(f64),
    Numeric(Decimal),
    Text(String),
    Blob(Vec<u8>),
}

impl SqlValue {
    /// Convert a JSON scalar into a bindable value.
    ///
    /// Arrays and objects are rejected: placeholders only accept scalars.
    /// Integers above `i64::MAX` are rejected too, since no bindable type
    /// holds them exactly.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, JsonValueError> {
        match value {
            serde_json::Value::Null => Ok(Self::Null),
            serde_json::Value::Bool(b) => Ok(Self::Bool(*b)),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Self::Integer(i))
                } else if n.is_u64() {
                    Err(JsonValueError::IntegerOutOfRange)
                } else {
                    n.as_f64().map(Self::Real).ok_or(JsonValueError::IntegerOutOfRange)
                }
            }
            serde_json::Value::String(s) => Ok(Self::Text(s.clone())),
            serde_json::Value::Array(_) | serde_json::Value::Object(_) => {
                Err(JsonValueError::NotScalar)
            }
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            Self::Bool(b) => Some(i64::from(*b)),
            Self::Numeric(d) if d.fract().is_zero() => d.to_i64(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl Serialize for SqlValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_none(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Integer(i) => serializer.serialize_i64(*i),
            Self::Real(f) => serializer.serialize_f64(*f),
            Self::Numeric(d) => {
                // Whole numbers stay exact; fractional values become floats so
                // the agent sees a JSON number rather than a quoted string.
                if d.fract().is_zero()
                    && let Some(i) = d.to_i64()
                {
                    serializer.serialize_i64(i)
                } else if let Some(f) = d.to_f64() {
                    serializer.serialize_f64(f)
                } else {
                    serializer.serialize_str(&d.to_string())
                }
            }
            Self::Text(s) => serializer.serialize_str(s),
            Self::Blob(bytes) => {
                serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(bytes))
            }
        }
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for SqlValue {
    fn from(value: i32) -> Self {
        Self::Integer(value.into())
    }
}

impl From<f64> for SqlValue {
    fn from(value: f64) -> Self {
        Self::Real(value)
    }
}

impl From<bool> for SqlValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<Decimal> for SqlValue {
    fn from(value: Decimal) -> Self {
        Self::Numeric(value)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}
