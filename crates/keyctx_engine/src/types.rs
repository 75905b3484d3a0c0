//! Engine-side type definitions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of a record inside a table.
pub type RecordId = u32;

/// The nil record id. Engines return it for "no such record".
pub const ID_NIL: RecordId = 0;

/// Identifier of an object in the engine namespace (database, type, table,
/// tokenizer).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId(pub u32);

impl ObjectId {
    /// Creates a new object ID.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "obj:{}", self.0)
    }
}

/// Identifier of an open table cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CursorId(pub u32);

/// Flags passed to engine initialization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InitFlags(pub u32);

impl InitFlags {
    /// No flags.
    pub const NONE: Self = Self(0);

    /// Returns true if every bit of `other` is set.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

/// Character encoding of a handle or table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Encoding {
    /// Engine build default.
    #[default]
    Default,
    /// No encoding; keys are opaque bytes.
    None,
    /// EUC-JP.
    EucJp,
    /// UTF-8.
    Utf8,
    /// Shift_JIS.
    Sjis,
    /// ISO-8859-1.
    Latin1,
    /// KOI8-R.
    Koi8r,
}

impl Encoding {
    /// Returns the canonical name of the encoding.
    pub fn name(self) -> &'static str {
        match self {
            Encoding::Default => "default",
            Encoding::None => "none",
            Encoding::EucJp => "euc-jp",
            Encoding::Utf8 => "utf-8",
            Encoding::Sjis => "sjis",
            Encoding::Latin1 => "latin1",
            Encoding::Koi8r => "koi8-r",
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Encoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        match normalized.as_str() {
            "default" => Ok(Encoding::Default),
            "none" => Ok(Encoding::None),
            "euc-jp" | "eucjp" | "euc" => Ok(Encoding::EucJp),
            "utf-8" | "utf8" => Ok(Encoding::Utf8),
            "sjis" | "shift-jis" | "shiftjis" | "cp932" => Ok(Encoding::Sjis),
            "latin1" | "latin-1" | "iso-8859-1" => Ok(Encoding::Latin1),
            "koi8-r" | "koi8r" => Ok(Encoding::Koi8r),
            _ => Err(format!("unknown encoding: {s}")),
        }
    }
}

/// Built-in scalar and text type kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// One-byte boolean.
    Bool,
    /// Signed 8-bit integer.
    Int8,
    /// Unsigned 8-bit integer.
    UInt8,
    /// Signed 16-bit integer.
    Int16,
    /// Unsigned 16-bit integer.
    UInt16,
    /// Signed 32-bit integer.
    Int32,
    /// Unsigned 32-bit integer.
    UInt32,
    /// Signed 64-bit integer.
    Int64,
    /// Unsigned 64-bit integer.
    UInt64,
    /// IEEE 754 double.
    Float,
    /// Microseconds since the Unix epoch, signed 64-bit.
    Time,
    /// Text up to 4 KiB.
    ShortText,
    /// Text up to 64 KiB.
    Text,
    /// Text up to 2 GiB.
    LongText,
}

impl TypeKind {
    /// Every built-in kind, in registration order.
    pub const ALL: [TypeKind; 14] = [
        TypeKind::Bool,
        TypeKind::Int8,
        TypeKind::UInt8,
        TypeKind::Int16,
        TypeKind::UInt16,
        TypeKind::Int32,
        TypeKind::UInt32,
        TypeKind::Int64,
        TypeKind::UInt64,
        TypeKind::Float,
        TypeKind::Time,
        TypeKind::ShortText,
        TypeKind::Text,
        TypeKind::LongText,
    ];

    /// Fixed width in bytes, or `None` for variable-size text.
    pub const fn width(self) -> Option<usize> {
        match self {
            TypeKind::Bool | TypeKind::Int8 | TypeKind::UInt8 => Some(1),
            TypeKind::Int16 | TypeKind::UInt16 => Some(2),
            TypeKind::Int32 | TypeKind::UInt32 => Some(4),
            TypeKind::Int64 | TypeKind::UInt64 | TypeKind::Float | TypeKind::Time => Some(8),
            TypeKind::ShortText | TypeKind::Text | TypeKind::LongText => None,
        }
    }

    /// Maximum encoded size in bytes.
    pub const fn max_size(self) -> usize {
        match self.width() {
            Some(width) => width,
            None => match self {
                TypeKind::ShortText => 4 * 1024,
                TypeKind::Text => 64 * 1024,
                _ => 2 * 1024 * 1024 * 1024,
            },
        }
    }

    /// Namespace name of the built-in type object.
    pub const fn name(self) -> &'static str {
        match self {
            TypeKind::Bool => "Bool",
            TypeKind::Int8 => "Int8",
            TypeKind::UInt8 => "UInt8",
            TypeKind::Int16 => "Int16",
            TypeKind::UInt16 => "UInt16",
            TypeKind::Int32 => "Int32",
            TypeKind::UInt32 => "UInt32",
            TypeKind::Int64 => "Int64",
            TypeKind::UInt64 => "UInt64",
            TypeKind::Float => "Float",
            TypeKind::Time => "Time",
            TypeKind::ShortText => "ShortText",
            TypeKind::Text => "Text",
            TypeKind::LongText => "LongText",
        }
    }
}

/// Storage layout of a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableKind {
    /// Hash-indexed keys.
    HashKey,
    /// Patricia-tree keys (ordered).
    PatKey,
    /// No keys; records are addressed by id only.
    NoKey,
}

/// Kind of an object in the engine namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    /// A database.
    Database,
    /// A built-in type.
    Type(TypeKind),
    /// A table.
    Table(TableKind),
    /// A tokenizer.
    Tokenizer,
}

/// Description of a namespace object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    /// Object id.
    pub id: ObjectId,
    /// Registered name, if any.
    pub name: Option<String>,
    /// Object kind.
    pub kind: ObjectKind,
    /// Key domain for tables; `None` when undeclared.
    pub domain: Option<ObjectId>,
    /// Value type for tables; `None` when the table stores no values.
    pub range: Option<ObjectId>,
}

/// A namespace lookup target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NameOrId {
    /// Lookup by registered name.
    Name(String),
    /// Lookup by object id.
    Id(ObjectId),
}

impl From<&str> for NameOrId {
    fn from(name: &str) -> Self {
        NameOrId::Name(name.to_string())
    }
}

impl From<String> for NameOrId {
    fn from(name: String) -> Self {
        NameOrId::Name(name)
    }
}

impl From<ObjectId> for NameOrId {
    fn from(id: ObjectId) -> Self {
        NameOrId::Id(id)
    }
}

impl fmt::Display for NameOrId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NameOrId::Name(name) => write!(f, "{name:?}"),
            NameOrId::Id(id) => write!(f, "{id}"),
        }
    }
}

/// Parameters for creating a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSpec {
    /// Registered name; anonymous when `None`.
    pub name: Option<String>,
    /// Storage layout.
    pub kind: TableKind,
    /// Key domain (type or table).
    pub key_type: Option<ObjectId>,
    /// Value type.
    pub value_type: Option<ObjectId>,
}

impl TableSpec {
    /// Creates an anonymous table spec with no key or value type.
    #[must_use]
    pub fn new(kind: TableKind) -> Self {
        Self {
            name: None,
            kind,
            key_type: None,
            value_type: None,
        }
    }

    /// Sets the table name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the key domain.
    #[must_use]
    pub fn key_type(mut self, key_type: ObjectId) -> Self {
        self.key_type = Some(key_type);
        self
    }

    /// Sets the value type.
    #[must_use]
    pub fn value_type(mut self, value_type: ObjectId) -> Self {
        self.value_type = Some(value_type);
        self
    }
}

/// Table-level metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableInfo {
    /// Encoding used for the table's keys.
    pub encoding: Encoding,
    /// Default tokenizer, if any.
    pub default_tokenizer: Option<ObjectId>,
}

/// Lookup behavior for [`crate::Engine::table_lookup`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupMode {
    /// Exact match only; nil id on miss.
    Exact,
    /// Exact match, creating the record on miss.
    ExactOrAdd,
}

/// Write behavior for [`crate::Engine::set_value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetMode {
    /// Replace the stored value.
    Set,
    /// Append to a variable-size stored value.
    Append,
}
