use std::cmp::Ordering;
use std::fmt;

use super::DataType;

/// A typed runtime value. Each variant corresponds to a [`DataType`].
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    TinyInt(i8),
    SmallInt(i16),
    Integer(i32),
    BigInt(i64),
    Float(f32),
    Double(f64),
    /// Used for both Char and VarChar columns
    String(String),
    Timestamp(i64),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Serializes a value to bytes according to the given DataType.
    /// Returns None if the value is incompatible with the type. Null
    /// serializes to nothing; the tuple layer's null bitmap covers it.
    pub fn serialize(&self, data_type: &DataType) -> Option<Vec<u8>> {
        match (self, data_type) {
            (Value::Null, _) => Some(Vec::new()),

            (Value::Boolean(b), DataType::Boolean) => Some(vec![u8::from(*b)]),
            (Value::TinyInt(v), DataType::TinyInt) => Some(v.to_le_bytes().to_vec()),
            (Value::SmallInt(v), DataType::SmallInt) => Some(v.to_le_bytes().to_vec()),
            (Value::Integer(v), DataType::Integer) => Some(v.to_le_bytes().to_vec()),
            (Value::BigInt(v), DataType::BigInt) => Some(v.to_le_bytes().to_vec()),
            (Value::Float(v), DataType::Float) => Some(v.to_le_bytes().to_vec()),
            (Value::Double(v), DataType::Double) => Some(v.to_le_bytes().to_vec()),
            (Value::Timestamp(v), DataType::Timestamp) => Some(v.to_le_bytes().to_vec()),

            (Value::String(s), DataType::Char(n)) => {
                let n = *n as usize;
                let bytes = s.as_bytes();
                if bytes.len() > n {
                    return None;
                }
                let mut result = bytes.to_vec();
                result.resize(n, b' ');
                Some(result)
            }

            (Value::String(s), DataType::VarChar(max_len)) => {
                let bytes = s.as_bytes();
                if bytes.len() > *max_len as usize {
                    return None;
                }
                let mut result = (bytes.len() as u16).to_le_bytes().to_vec();
                result.extend_from_slice(bytes);
                Some(result)
            }

            // Integer widening on write
            (Value::TinyInt(v), DataType::SmallInt) => Some((*v as i16).to_le_bytes().to_vec()),
            (Value::TinyInt(v), DataType::Integer) => Some((*v as i32).to_le_bytes().to_vec()),
            (Value::TinyInt(v), DataType::BigInt) => Some((*v as i64).to_le_bytes().to_vec()),
            (Value::SmallInt(v), DataType::Integer) => Some((*v as i32).to_le_bytes().to_vec()),
            (Value::SmallInt(v), DataType::BigInt) => Some((*v as i64).to_le_bytes().to_vec()),
            (Value::Integer(v), DataType::BigInt) => Some((*v as i64).to_le_bytes().to_vec()),
            (Value::Float(v), DataType::Double) => Some((*v as f64).to_le_bytes().to_vec()),

            _ => None,
        }
    }

    /// Deserializes a value from bytes according to the given DataType.
    /// Returns the value and the number of bytes consumed.
    pub fn deserialize(data: &[u8], data_type: &DataType) -> Option<(Self, usize)> {
        match data_type {
            DataType::Boolean => {
                let b = *data.first()?;
                Some((Value::Boolean(b != 0), 1))
            }
            DataType::TinyInt => {
                let b = *data.first()?;
                Some((Value::TinyInt(b as i8), 1))
            }
            DataType::SmallInt => {
                let bytes: [u8; 2] = data.get(..2)?.try_into().ok()?;
                Some((Value::SmallInt(i16::from_le_bytes(bytes)), 2))
            }
            DataType::Integer => {
                let bytes: [u8; 4] = data.get(..4)?.try_into().ok()?;
                Some((Value::Integer(i32::from_le_bytes(bytes)), 4))
            }
            DataType::BigInt => {
                let bytes: [u8; 8] = data.get(..8)?.try_into().ok()?;
                Some((Value::BigInt(i64::from_le_bytes(bytes)), 8))
            }
            DataType::Float => {
                let bytes: [u8; 4] = data.get(..4)?.try_into().ok()?;
                Some((Value::Float(f32::from_le_bytes(bytes)), 4))
            }
            DataType::Double => {
                let bytes: [u8; 8] = data.get(..8)?.try_into().ok()?;
                Some((Value::Double(f64::from_le_bytes(bytes)), 8))
            }
            DataType::Char(n) => {
                let n = *n as usize;
                let raw = data.get(..n)?;
                let s = String::from_utf8_lossy(raw).trim_end().to_string();
                Some((Value::String(s), n))
            }
            DataType::VarChar(_) => {
                let len_bytes: [u8; 2] = data.get(..2)?.try_into().ok()?;
                let len = u16::from_le_bytes(len_bytes) as usize;
                let raw = data.get(2..2 + len)?;
                let s = String::from_utf8_lossy(raw).to_string();
                Some((Value::String(s), 2 + len))
            }
            DataType::Timestamp => {
                let bytes: [u8; 8] = data.get(..8)?.try_into().ok()?;
                Some((Value::Timestamp(i64::from_le_bytes(bytes)), 8))
            }
        }
    }

    /// Compares two values. Returns None when the values are not comparable
    /// (mismatched types, or either side null).
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Null, Value::Null) => Some(Ordering::Equal),
            (Value::Null, _) | (_, Value::Null) => None,

            (Value::Boolean(a), Value::Boolean(b)) => Some(a.cmp(b)),
            (Value::TinyInt(a), Value::TinyInt(b)) => Some(a.cmp(b)),
            (Value::SmallInt(a), Value::SmallInt(b)) => Some(a.cmp(b)),
            (Value::Integer(a), Value::Integer(b)) => Some(a.cmp(b)),
            (Value::BigInt(a), Value::BigInt(b)) => Some(a.cmp(b)),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::Double(a), Value::Double(b)) => a.partial_cmp(b),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Timestamp(a), Value::Timestamp(b)) => Some(a.cmp(b)),

            // Mixed-width integer comparisons promote to the wider type
            (Value::TinyInt(a), Value::SmallInt(b)) => Some((*a as i16).cmp(b)),
            (Value::SmallInt(a), Value::TinyInt(b)) => Some(a.cmp(&(*b as i16))),
            (Value::TinyInt(a), Value::Integer(b)) => Some((*a as i32).cmp(b)),
            (Value::Integer(a), Value::TinyInt(b)) => Some(a.cmp(&(*b as i32))),
            (Value::SmallInt(a), Value::Integer(b)) => Some((*a as i32).cmp(b)),
            (Value::Integer(a), Value::SmallInt(b)) => Some(a.cmp(&(*b as i32))),
            (Value::Integer(a), Value::BigInt(b)) => Some((*a as i64).cmp(b)),
            (Value::BigInt(a), Value::Integer(b)) => Some(a.cmp(&(*b as i64))),
            (Value::Float(a), Value::Double(b)) => (*a as f64).partial_cmp(b),
            (Value::Double(a), Value::Float(b)) => a.partial_cmp(&(*b as f64)),

            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::TinyInt(v) => write!(f, "{}", v),
            Value::SmallInt(v) => write!(f, "{}", v),
            Value::Integer(v) => write!(f, "{}", v),
            Value::BigInt(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::String(s) => write!(f, "'{}'", s),
            Value::Timestamp(v) => write!(f, "TIMESTAMP({})", v),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<i16> for Value {
    fn from(v: i16) -> Self {
        Value::SmallInt(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::BigInt(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}
