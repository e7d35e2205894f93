use crate::storage::error::{StorageError, StorageResult};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::io::{self, Read, Write};

/// Maximum number of bytes stored for a `Varchar` value.
pub const STRING_LEN: usize = 128;

/// Data types supported by the database. Every type has a fixed on-page width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Boolean,
    Int32,
    Varchar,
}

impl DataType {
    /// Number of bytes a value of this type occupies in a tuple slot.
    pub fn width(&self) -> usize {
        match self {
            DataType::Boolean => 1,
            DataType::Int32 => 4,
            // length prefix + fixed payload
            DataType::Varchar => 4 + STRING_LEN,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Boolean => write!(f, "BOOLEAN"),
            DataType::Int32 => write!(f, "INT"),
            DataType::Varchar => write!(f, "VARCHAR"),
        }
    }
}

/// Comparison operators used by predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Equals,
    NotEquals,
    GreaterThan,
    GreaterThanOrEq,
    LessThan,
    LessThanOrEq,
    /// Substring match for strings, equality otherwise.
    Like,
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CompareOp::Equals => "=",
            CompareOp::NotEquals => "<>",
            CompareOp::GreaterThan => ">",
            CompareOp::GreaterThanOrEq => ">=",
            CompareOp::LessThan => "<",
            CompareOp::LessThanOrEq => "<=",
            CompareOp::Like => "LIKE",
        };
        write!(f, "{}", s)
    }
}

/// Values that can be stored in the database
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    Boolean(bool),
    Int32(i32),
    String(String),
}

impl Value {
    /// Get the data type of this value
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Boolean(_) => DataType::Boolean,
            Value::Int32(_) => DataType::Int32,
            Value::String(_) => DataType::Varchar,
        }
    }

    /// Check if this value is compatible with the given data type
    pub fn is_compatible_with(&self, data_type: DataType) -> bool {
        self.data_type() == data_type
    }

    /// Evaluate `self <op> other`. Values of different types never match.
    pub fn compare(&self, op: CompareOp, other: &Value) -> bool {
        if let (CompareOp::Like, Value::String(a), Value::String(b)) = (op, self, other) {
            return a.contains(b.as_str());
        }

        let ordering = match (self, other) {
            (Value::Boolean(a), Value::Boolean(b)) => a.cmp(b),
            (Value::Int32(a), Value::Int32(b)) => a.cmp(b),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            _ => return false,
        };

        match op {
            CompareOp::Equals | CompareOp::Like => ordering == Ordering::Equal,
            CompareOp::NotEquals => ordering != Ordering::Equal,
            CompareOp::GreaterThan => ordering == Ordering::Greater,
            CompareOp::GreaterThanOrEq => ordering != Ordering::Less,
            CompareOp::LessThan => ordering == Ordering::Less,
            CompareOp::LessThanOrEq => ordering != Ordering::Greater,
        }
    }

    /// Write the fixed-width encoding of this value.
    pub fn encode<W: Write>(&self, out: &mut W) -> io::Result<()> {
        match self {
            Value::Boolean(b) => out.write_u8(u8::from(*b)),
            Value::Int32(i) => out.write_i32::<BigEndian>(*i),
            Value::String(s) => {
                let bytes = s.as_bytes();
                let len = bytes.len().min(STRING_LEN);
                out.write_u32::<BigEndian>(len as u32)?;
                out.write_all(&bytes[..len])?;
                out.write_all(&[0u8; STRING_LEN][..STRING_LEN - len])
            }
        }
    }

    /// Read a value of `data_type` from its fixed-width encoding.
    pub fn decode<R: Read>(data_type: DataType, input: &mut R) -> StorageResult<Value> {
        let value = match data_type {
            DataType::Boolean => Value::Boolean(input.read_u8().map_err(codec_error)? != 0),
            DataType::Int32 => Value::Int32(input.read_i32::<BigEndian>().map_err(codec_error)?),
            DataType::Varchar => {
                let len = input.read_u32::<BigEndian>().map_err(codec_error)? as usize;
                let mut payload = [0u8; STRING_LEN];
                input.read_exact(&mut payload).map_err(codec_error)?;
                if len > STRING_LEN {
                    return Err(StorageError::ValueTooLong {
                        len,
                        max: STRING_LEN,
                    });
                }
                let s = std::str::from_utf8(&payload[..len])
                    .map_err(|e| StorageError::Malformed(e.to_string()))?;
                Value::String(s.to_string())
            }
        };
        Ok(value)
    }
}

fn codec_error(err: io::Error) -> StorageError {
    StorageError::Malformed(err.to_string())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Int32(i) => write!(f, "{}", i),
            Value::String(s) => write!(f, "{}", s),
        }
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int32(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}
