//! Item value representation
//!
//! A history record carries either a numeric sample or a textual payload.
//! The NDJSON source distinguishes the two at the token level (`1` and `1.0`
//! are numbers, `"1"` is a string); deserialization must preserve that
//! distinction, so [`Value`] is an untagged union over the two token shapes.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Zabbix item value type codes, as they appear in the `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ValueType {
    /// Numeric floating point (code 0)
    Float,
    /// Character/string (code 1)
    Character,
    /// Log line (code 2)
    Log,
    /// Numeric unsigned integer (code 3)
    Unsigned,
    /// Free-form text (code 4)
    Text,
}

impl ValueType {
    /// True for the two numeric value types.
    pub fn is_numeric(&self) -> bool {
        matches!(self, ValueType::Float | ValueType::Unsigned)
    }

    pub fn code(&self) -> u8 {
        (*self).into()
    }
}

impl Default for ValueType {
    fn default() -> Self {
        ValueType::Float
    }
}

impl TryFrom<u8> for ValueType {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(ValueType::Float),
            1 => Ok(ValueType::Character),
            2 => Ok(ValueType::Log),
            3 => Ok(ValueType::Unsigned),
            4 => Ok(ValueType::Text),
            other => Err(format!("invalid value type code {other}")),
        }
    }
}

impl From<ValueType> for u8 {
    fn from(vt: ValueType) -> u8 {
        match vt {
            ValueType::Float => 0,
            ValueType::Character => 1,
            ValueType::Log => 2,
            ValueType::Unsigned => 3,
            ValueType::Text => 4,
        }
    }
}

/// A collected item value: a JSON number (integers promoted to f64) or a
/// JSON string, depending on what the source line carried.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Number(f64),
    Text(String),
}

impl Value {
    /// Numeric view of the value. Text payloads yield `None`; they are
    /// never coerced.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Number(_) => None,
            Value::Text(s) => Some(s),
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Number(0.0)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{n}"),
            Value::Text(s) => f.write_str(s),
        }
    }
}

#[cfg(test)]
#[path = "value_test.rs"]
mod value_test;
