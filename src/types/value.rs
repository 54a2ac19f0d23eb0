//! Driver value model.

use crate::error::ArgumentError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// A single SQL value, used both for bound parameters and for row fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// NULL value
    Null,
    /// Boolean value
    Boolean(bool),
    /// Integer value
    Integer(i64),
    /// Float value
    Float(f64),
    /// String value
    String(String),
    /// Binary data
    Binary(Vec<u8>),
}

impl Value {
    /// Check whether this is the null marker.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Name of the variant, used in conversion errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Boolean(_) => "BOOLEAN",
            Value::Integer(_) => "INTEGER",
            Value::Float(_) => "FLOAT",
            Value::String(_) => "STRING",
            Value::Binary(_) => "BINARY",
        }
    }

    /// Integer content, if any.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// String content, if any.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

// Floats compare by bit pattern so that bindings can be used as map keys.
impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Boolean(b) => b.hash(state),
            Value::Integer(i) => i.hash(state),
            Value::Float(f) => f.to_bits().hash(state),
            Value::String(s) => s.hash(state),
            Value::Binary(b) => b.hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::String(s) => write!(f, "'{}'", s.replace('\'', "''")),
            Value::Binary(b) => {
                write!(f, "X'")?;
                for byte in b {
                    write!(f, "{:02X}", byte)?;
                }
                write!(f, "'")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Integer(value as i64)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Value::Binary(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

/// Conversion from a row field into a Rust type.
pub trait FromValue: Sized {
    /// Convert the value found at `column`.
    fn from_value(value: &Value, column: usize) -> Result<Self, ArgumentError>;
}

fn mismatch(value: &Value, column: usize, expected: &'static str) -> ArgumentError {
    ArgumentError::TypeMismatch {
        column,
        expected,
        actual: value.kind(),
    }
}

impl FromValue for Value {
    fn from_value(value: &Value, _column: usize) -> Result<Self, ArgumentError> {
        Ok(value.clone())
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value, column: usize) -> Result<Self, ArgumentError> {
        match value {
            Value::Integer(i) => Ok(*i),
            other => Err(mismatch(other, column, "i64")),
        }
    }
}

impl FromValue for i32 {
    fn from_value(value: &Value, column: usize) -> Result<Self, ArgumentError> {
        match value {
            Value::Integer(i) => i32::try_from(*i).map_err(|_| mismatch(value, column, "i32")),
            other => Err(mismatch(other, column, "i32")),
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value, column: usize) -> Result<Self, ArgumentError> {
        match value {
            Value::Float(f) => Ok(*f),
            Value::Integer(i) => Ok(*i as f64),
            other => Err(mismatch(other, column, "f64")),
        }
    }
}

impl FromValue for bool {
    fn from_value(value: &Value, column: usize) -> Result<Self, ArgumentError> {
        match value {
            Value::Boolean(b) => Ok(*b),
            other => Err(mismatch(other, column, "bool")),
        }
    }
}

impl FromValue for String {
    fn from_value(value: &Value, column: usize) -> Result<Self, ArgumentError> {
        match value {
            Value::String(s) => Ok(s.clone()),
            other => Err(mismatch(other, column, "String")),
        }
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: &Value, column: usize) -> Result<Self, ArgumentError> {
        match value {
            Value::Binary(b) => Ok(b.clone()),
            other => Err(mismatch(other, column, "Vec<u8>")),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value, column: usize) -> Result<Self, ArgumentError> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other, column).map(Some),
        }
    }
}
