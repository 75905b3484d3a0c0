//! Caller-facing values and identifiers.

use crate::error::{CoreError, CoreResult};
use keyctx_engine::{NameOrId, ObjectId, RecordId};
use std::fmt;

/// A reference to a record inside a table.
///
/// The reference stays meaningful while the table is open; it does not copy
/// the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordRef {
    /// Table holding the record.
    pub table: ObjectId,
    /// Record id within the table.
    pub id: RecordId,
}

impl RecordRef {
    /// Creates a record reference.
    #[must_use]
    pub const fn new(table: ObjectId, id: RecordId) -> Self {
        Self { table, id }
    }
}

impl fmt::Display for RecordRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.table, self.id)
    }
}

/// A dynamically shaped key or value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// No value.
    Null,
    /// Boolean.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// Unsigned integer.
    UInt(u64),
    /// Floating point number.
    Float(f64),
    /// Microseconds since the Unix epoch.
    Time(i64),
    /// UTF-8 text.
    Text(String),
    /// Raw bytes.
    Bytes(Vec<u8>),
    /// Reference to a record in another table.
    Record(RecordRef),
}

impl Value {
    /// Returns the value as a non-negative integer, if it is one.
    pub fn as_non_negative(&self) -> Option<u64> {
        match self {
            Value::Int(i) => u64::try_from(*i).ok(),
            Value::UInt(u) => Some(*u),
            _ => None,
        }
    }

    /// Returns the value as a record id if it is a non-negative integer
    /// that fits one.
    pub fn as_record_id(&self) -> Option<RecordId> {
        self.as_non_negative()
            .and_then(|id| RecordId::try_from(id).ok())
    }

    /// Returns the byte content of text or bytes.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Text(text) => Some(text.as_bytes()),
            Value::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Returns the text content, or valid UTF-8 bytes as text.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(text) => Some(text),
            Value::Bytes(bytes) => std::str::from_utf8(bytes).ok(),
            _ => None,
        }
    }

    /// Returns the record reference, if this is one.
    pub fn as_record(&self) -> Option<RecordRef> {
        match self {
            Value::Record(record) => Some(*record),
            _ => None,
        }
    }

    /// Returns true for [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Short name of the value's shape, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::UInt(_) => "uint",
            Value::Float(_) => "float",
            Value::Time(_) => "time",
            Value::Text(_) => "text",
            Value::Bytes(_) => "bytes",
            Value::Record(_) => "record",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::UInt(u) => write!(f, "{u}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Time(us) => write!(f, "time:{us}"),
            Value::Text(text) => write!(f, "{text:?}"),
            Value::Bytes(bytes) => write!(f, "{}", String::from_utf8_lossy(bytes).escape_debug()),
            Value::Record(record) => write!(f, "{record}"),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(i64::from(value))
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::UInt(u64::from(value))
    }
}

impl From<u64> for Value {
    fn from(value: u64) -> Self {
        Value::UInt(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
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

impl From<&[u8]> for Value {
    fn from(value: &[u8]) -> Self {
        Value::Bytes(value.to_vec())
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Value::Bytes(value)
    }
}

impl From<RecordRef> for Value {
    fn from(value: RecordRef) -> Self {
        Value::Record(value)
    }
}

/// How a caller addresses a record: by id or by key.
#[derive(Debug, Clone, PartialEq)]
pub enum Identifier {
    /// A record id.
    Id(RecordId),
    /// A key to be encoded against the table's key domain.
    Key(Value),
}

impl From<Value> for Identifier {
    /// Plain non-negative integers become ids; everything else is a key.
    fn from(value: Value) -> Self {
        match value.as_record_id() {
            Some(id) => Identifier::Id(id),
            None => Identifier::Key(value),
        }
    }
}

impl From<RecordRef> for Identifier {
    fn from(record: RecordRef) -> Self {
        Identifier::Id(record.id)
    }
}

impl From<u32> for Identifier {
    fn from(id: RecordId) -> Self {
        Identifier::Id(id)
    }
}

impl From<i32> for Identifier {
    fn from(value: i32) -> Self {
        Value::from(value).into()
    }
}

impl From<i64> for Identifier {
    fn from(value: i64) -> Self {
        Value::from(value).into()
    }
}

impl From<u64> for Identifier {
    fn from(value: u64) -> Self {
        Value::from(value).into()
    }
}

impl From<&str> for Identifier {
    fn from(key: &str) -> Self {
        Identifier::Key(key.into())
    }
}

impl From<String> for Identifier {
    fn from(key: String) -> Self {
        Identifier::Key(key.into())
    }
}

impl From<&[u8]> for Identifier {
    fn from(key: &[u8]) -> Self {
        Identifier::Key(key.into())
    }
}

impl From<Vec<u8>> for Identifier {
    fn from(key: Vec<u8>) -> Self {
        Identifier::Key(key.into())
    }
}

impl TryFrom<&Value> for NameOrId {
    type Error = CoreError;

    fn try_from(value: &Value) -> CoreResult<Self> {
        if let Value::Text(name) = value {
            return Ok(NameOrId::Name(name.clone()));
        }
        value
            .as_non_negative()
            .and_then(|id| u32::try_from(id).ok())
            .map(|id| NameOrId::Id(ObjectId::new(id)))
            .ok_or_else(|| {
                CoreError::type_error(format!(
                    "should be string or unsigned integer: {value} ({})",
                    value.type_name()
                ))
            })
    }
}
