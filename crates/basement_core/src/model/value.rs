//! Primitive values stored in object properties.
//!
//! # Responsibility
//! - Define the value-semantics payload of primitive properties and lists.
//! - Convert between domain values and SQLite storage values.
//!
//! # Invariants
//! - `Value::Null` is accepted for every primitive property.
//! - Storage conversion is driven by the declared `ValueType`, never guessed.

use rusqlite::types::Value as SqlValue;
use serde::{Deserialize, Serialize};

/// Declared type of a primitive property or list element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    Bool,
    Int,
    Float,
    Text,
    Data,
}

impl ValueType {
    /// Stable name used in diagnostics.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Float => "float",
            Self::Text => "text",
            Self::Data => "data",
        }
    }
}

/// Primitive property value.
///
/// Copied by value during detachment; carries no identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Data(Vec<u8>),
}

impl Value {
    /// Returns the value type, or `None` for `Null`.
    pub fn value_type(&self) -> Option<ValueType> {
        match self {
            Self::Null => None,
            Self::Bool(_) => Some(ValueType::Bool),
            Self::Int(_) => Some(ValueType::Int),
            Self::Float(_) => Some(ValueType::Float),
            Self::Text(_) => Some(ValueType::Text),
            Self::Data(_) => Some(ValueType::Data),
        }
    }

    /// Returns whether this value may be stored in a property of `expected` type.
    ///
    /// NaN never fits: the engine binds it as NULL, so it could not be read back.
    pub fn fits(&self, expected: ValueType) -> bool {
        if matches!(self, Self::Float(value) if value.is_nan()) {
            return false;
        }
        self.value_type().map_or(true, |actual| actual == expected)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn as_data(&self) -> Option<&[u8]> {
        match self {
            Self::Data(value) => Some(value.as_slice()),
            _ => None,
        }
    }

    pub(crate) fn to_sql(&self) -> SqlValue {
        match self {
            Self::Null => SqlValue::Null,
            Self::Bool(value) => SqlValue::Integer(i64::from(*value)),
            Self::Int(value) => SqlValue::Integer(*value),
            Self::Float(value) => SqlValue::Real(*value),
            Self::Text(value) => SqlValue::Text(value.clone()),
            Self::Data(value) => SqlValue::Blob(value.clone()),
        }
    }

    /// Decodes a stored value using the declared property type.
    ///
    /// Returns `None` when the stored representation does not match `expected`.
    pub(crate) fn from_sql(stored: SqlValue, expected: ValueType) -> Option<Self> {
        match (stored, expected) {
            (SqlValue::Null, _) => Some(Self::Null),
            (SqlValue::Integer(value), ValueType::Bool) => match value {
                0 => Some(Self::Bool(false)),
                1 => Some(Self::Bool(true)),
                _ => None,
            },
            (SqlValue::Integer(value), ValueType::Int) => Some(Self::Int(value)),
            (SqlValue::Real(value), ValueType::Float) => Some(Self::Float(value)),
            (SqlValue::Integer(value), ValueType::Float) => Some(Self::Float(value as f64)),
            (SqlValue::Text(value), ValueType::Text) => Some(Self::Text(value)),
            (SqlValue::Blob(value), ValueType::Data) => Some(Self::Data(value)),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Self::Data(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}
