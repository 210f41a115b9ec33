//! Scalar field types and decoded values

use serde::{Deserialize, Serialize};
use std::fmt;

/// Semantic scalar type of a single field element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarType {
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float32,
    Float64,
    /// One byte of a NUL-padded character array
    Char,
    /// Enum-coded byte (flight mode and similar)
    Enum,
}

impl ScalarType {
    /// Returns the size in bytes of one element of this type.
    pub const fn size(&self) -> usize {
        match self {
            ScalarType::Int8 | ScalarType::UInt8 | ScalarType::Char | ScalarType::Enum => 1,
            ScalarType::Int16 | ScalarType::UInt16 => 2,
            ScalarType::Int32 | ScalarType::UInt32 | ScalarType::Float32 => 4,
            ScalarType::Int64 | ScalarType::UInt64 | ScalarType::Float64 => 8,
        }
    }
}

/// A decoded field value, tagged with its scalar kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Int8(i8),
    UInt8(u8),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Float32(f32),
    Float64(f64),
    Enum(u8),
    Text(String),
    Array(Vec<Value>),
}

impl Value {
    /// Numeric view of the value, `None` for text and arrays.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int8(v) => Some(*v as f64),
            Value::UInt8(v) | Value::Enum(v) => Some(*v as f64),
            Value::Int16(v) => Some(*v as f64),
            Value::UInt16(v) => Some(*v as f64),
            Value::Int32(v) => Some(*v as f64),
            Value::UInt32(v) => Some(*v as f64),
            Value::Int64(v) => Some(*v as f64),
            Value::UInt64(v) => Some(*v as f64),
            Value::Float32(v) => Some(*v as f64),
            Value::Float64(v) => Some(*v),
            Value::Text(_) | Value::Array(_) => None,
        }
    }

    /// Integer view of the value. Floats are truncated.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int8(v) => Some(*v as i64),
            Value::UInt8(v) | Value::Enum(v) => Some(*v as i64),
            Value::Int16(v) => Some(*v as i64),
            Value::UInt16(v) => Some(*v as i64),
            Value::Int32(v) => Some(*v as i64),
            Value::UInt32(v) => Some(*v as i64),
            Value::Int64(v) => Some(*v),
            Value::UInt64(v) => i64::try_from(*v).ok(),
            Value::Float32(v) => Some(*v as i64),
            Value::Float64(v) => Some(*v as i64),
            Value::Text(_) | Value::Array(_) => None,
        }
    }

    /// Unsigned view, `None` for negative or non-integer values.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::UInt64(v) => Some(*v),
            Value::Float32(_) | Value::Float64(_) => None,
            other => other.as_i64().and_then(|v| u64::try_from(v).ok()),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// The scalar kind this value was decoded as. Arrays report their first element.
    pub fn scalar_type(&self) -> Option<ScalarType> {
        match self {
            Value::Int8(_) => Some(ScalarType::Int8),
            Value::UInt8(_) => Some(ScalarType::UInt8),
            Value::Int16(_) => Some(ScalarType::Int16),
            Value::UInt16(_) => Some(ScalarType::UInt16),
            Value::Int32(_) => Some(ScalarType::Int32),
            Value::UInt32(_) => Some(ScalarType::UInt32),
            Value::Int64(_) => Some(ScalarType::Int64),
            Value::UInt64(_) => Some(ScalarType::UInt64),
            Value::Float32(_) => Some(ScalarType::Float32),
            Value::Float64(_) => Some(ScalarType::Float64),
            Value::Enum(_) => Some(ScalarType::Enum),
            Value::Text(_) => Some(ScalarType::Char),
            Value::Array(items) => items.first().and_then(Value::scalar_type),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Float32(v) => write!(f, "{v:.6}"),
            Value::Float64(v) => write!(f, "{v:.6}"),
            Value::UInt64(v) => write!(f, "{v}"),
            Value::Text(s) => f.write_str(s),
            Value::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            other => match other.as_i64() {
                Some(v) => write!(f, "{v}"),
                None => write!(f, "{:?}", other),
            },
        }
    }
}
