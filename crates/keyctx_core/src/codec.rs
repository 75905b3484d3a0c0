//! Key codec.
//!
//! Translates a [`Value`] into the bytes a table's key domain expects and
//! back. The domain is resolved once from the engine namespace into a
//! [`KeyDomain`] and then matched exhaustively.
//!
//! Fixed-width scalars are little-endian at their natural width. References
//! to keyed tables are 4-byte record ids.

use crate::error::{check, CoreError, CoreResult};
use crate::value::{RecordRef, Value};
use keyctx_engine::{
    Engine, LookupMode, ObjectId, ObjectKind, RecordId, TableKind, TypeKind, ID_NIL,
};

const ID_WIDTH: usize = std::mem::size_of::<RecordId>();

/// Resolved key (or value) domain of a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyDomain {
    /// No declared domain; keys are raw bytes.
    Untyped,
    /// A built-in scalar or text type.
    Scalar(TypeKind),
    /// Another table; keys are record ids in that table.
    Table {
        /// Referenced table.
        table: ObjectId,
        /// Its storage layout.
        kind: TableKind,
    },
    /// Any other object; keys are plain ids.
    Other(ObjectId),
}

impl KeyDomain {
    /// Resolves a domain object id.
    ///
    /// An id the engine cannot describe is treated as untyped.
    pub fn resolve(engine: &mut dyn Engine, domain: Option<ObjectId>) -> Self {
        let Some(id) = domain else {
            return KeyDomain::Untyped;
        };
        match engine.object_info(id).map(|info| info.kind) {
            Some(ObjectKind::Type(kind)) => KeyDomain::Scalar(kind),
            Some(ObjectKind::Table(kind)) => KeyDomain::Table { table: id, kind },
            Some(ObjectKind::Database | ObjectKind::Tokenizer) => KeyDomain::Other(id),
            None => KeyDomain::Untyped,
        }
    }

    /// Key domain of `table`.
    ///
    /// # Errors
    ///
    /// Fails if the engine cannot describe `table`.
    pub fn of_table(engine: &mut dyn Engine, table: ObjectId) -> CoreResult<Self> {
        let domain = describe(engine, table)?.0;
        Ok(Self::resolve(engine, domain))
    }

    /// Value domain of `table`.
    ///
    /// # Errors
    ///
    /// Fails if the engine cannot describe `table`.
    pub fn of_values(engine: &mut dyn Engine, table: ObjectId) -> CoreResult<Self> {
        let range = describe(engine, table)?.1;
        Ok(Self::resolve(engine, range))
    }
}

fn describe(
    engine: &mut dyn Engine,
    table: ObjectId,
) -> CoreResult<(Option<ObjectId>, Option<ObjectId>)> {
    let info = engine.object_info(table);
    check(engine, None)?;
    let info = info.ok_or_else(|| CoreError::type_error(format!("no such object: {table}")))?;
    Ok((info.domain, info.range))
}

/// Encodes `value` for `domain`.
///
/// Table domains may look the value up in the referenced table, which is why
/// the engine is needed.
///
/// # Errors
///
/// - [`CoreError::Type`] if the value cannot be coerced to the domain
/// - [`CoreError::UnresolvedReference`] if a nested key has no record
/// - [`CoreError::Engine`] if a nested lookup fails
pub fn encode(engine: &mut dyn Engine, domain: &KeyDomain, value: &Value) -> CoreResult<Vec<u8>> {
    match domain {
        KeyDomain::Untyped => encode_raw(value),
        KeyDomain::Scalar(kind) => encode_scalar(*kind, value),
        KeyDomain::Table { table, kind } => encode_reference(engine, *table, *kind, value),
        KeyDomain::Other(id) => match plain_id(*id, value) {
            Some(id) => Ok(id.to_le_bytes().to_vec()),
            None => Err(mismatch(value, "record id")),
        },
    }
}

fn mismatch(value: &Value, expected: &str) -> CoreError {
    CoreError::type_error(format!(
        "cannot use {value} ({}) as {expected}",
        value.type_name()
    ))
}

/// A plain non-negative integer, or a record reference into `table`.
fn plain_id(table: ObjectId, value: &Value) -> Option<RecordId> {
    match value {
        Value::Record(record) if record.table == table => Some(record.id),
        _ => value.as_record_id(),
    }
}

fn encode_raw(value: &Value) -> CoreResult<Vec<u8>> {
    match value {
        Value::Bool(b) => Ok(vec![u8::from(*b)]),
        Value::Int(i) => Ok(i.to_le_bytes().to_vec()),
        Value::UInt(u) => Ok(u.to_le_bytes().to_vec()),
        Value::Float(x) => Ok(x.to_le_bytes().to_vec()),
        Value::Time(us) => Ok(us.to_le_bytes().to_vec()),
        Value::Text(text) => Ok(text.as_bytes().to_vec()),
        Value::Bytes(bytes) => Ok(bytes.clone()),
        Value::Null | Value::Record(_) => Err(mismatch(value, "raw key")),
    }
}

fn integer(value: &Value) -> Option<i128> {
    match value {
        Value::Int(i) => Some(i128::from(*i)),
        Value::UInt(u) => Some(i128::from(*u)),
        _ => None,
    }
}

macro_rules! fixed {
    ($ty:ty, $value:expr, $kind:expr) => {
        integer($value)
            .and_then(|n| <$ty>::try_from(n).ok())
            .map(|n| n.to_le_bytes().to_vec())
            .ok_or_else(|| mismatch($value, $kind.name()))
    };
}

fn encode_scalar(kind: TypeKind, value: &Value) -> CoreResult<Vec<u8>> {
    match kind {
        TypeKind::Bool => match value {
            Value::Bool(b) => Ok(vec![u8::from(*b)]),
            _ => match integer(value) {
                Some(n @ (0 | 1)) => Ok(vec![u8::from(n == 1)]),
                _ => Err(mismatch(value, kind.name())),
            },
        },
        TypeKind::Int8 => fixed!(i8, value, kind),
        TypeKind::UInt8 => fixed!(u8, value, kind),
        TypeKind::Int16 => fixed!(i16, value, kind),
        TypeKind::UInt16 => fixed!(u16, value, kind),
        TypeKind::Int32 => fixed!(i32, value, kind),
        TypeKind::UInt32 => fixed!(u32, value, kind),
        TypeKind::Int64 => fixed!(i64, value, kind),
        TypeKind::UInt64 => fixed!(u64, value, kind),
        TypeKind::Float => {
            #[allow(clippy::cast_precision_loss)]
            let x = match value {
                Value::Float(x) => Some(*x),
                Value::Int(i) => Some(*i as f64),
                Value::UInt(u) => Some(*u as f64),
                _ => None,
            };
            x.map(|x| x.to_le_bytes().to_vec())
                .ok_or_else(|| mismatch(value, kind.name()))
        }
        TypeKind::Time => {
            #[allow(clippy::cast_possible_truncation)]
            let usec = match value {
                Value::Time(us) => Some(*us),
                Value::Int(secs) => secs.checked_mul(1_000_000),
                Value::Float(secs) if secs.is_finite() => Some((secs * 1e6).round() as i64),
                _ => None,
            };
            usec.map(|us| us.to_le_bytes().to_vec())
                .ok_or_else(|| mismatch(value, kind.name()))
        }
        TypeKind::ShortText | TypeKind::Text | TypeKind::LongText => {
            let bytes = value
                .as_bytes()
                .ok_or_else(|| mismatch(value, kind.name()))?;
            if bytes.len() > kind.max_size() {
                return Err(CoreError::type_error(format!(
                    "{} bytes exceed {} maximum of {}",
                    bytes.len(),
                    kind.name(),
                    kind.max_size()
                )));
            }
            Ok(bytes.to_vec())
        }
    }
}

fn encode_reference(
    engine: &mut dyn Engine,
    table: ObjectId,
    kind: TableKind,
    value: &Value,
) -> CoreResult<Vec<u8>> {
    if let Some(id) = plain_id(table, value) {
        return Ok(id.to_le_bytes().to_vec());
    }
    if let Value::Record(record) = value {
        return Err(CoreError::type_error(format!(
            "record {record} does not belong to referenced table {table}"
        )));
    }
    if kind == TableKind::NoKey {
        return Err(mismatch(value, "record id of a key-less table"));
    }

    let nested = KeyDomain::of_table(engine, table)?;
    let key = encode(engine, &nested, value)?;
    let id = engine.table_lookup(table, &key, LookupMode::Exact);
    check(engine, None)?;
    if id == ID_NIL {
        return Err(CoreError::UnresolvedReference {
            key: value.to_string(),
            table,
        });
    }
    Ok(id.to_le_bytes().to_vec())
}

fn fixed_bytes<const N: usize>(bytes: &[u8]) -> CoreResult<[u8; N]> {
    bytes.try_into().map_err(|_| CoreError::InvalidKeyBytes {
        expected: N,
        actual: bytes.len(),
    })
}

/// Decodes stored key bytes for `domain`.
///
/// # Errors
///
/// Returns [`CoreError::InvalidKeyBytes`] if a fixed-width key has the wrong
/// length.
pub fn decode(domain: &KeyDomain, bytes: &[u8]) -> CoreResult<Value> {
    let value = match domain {
        KeyDomain::Untyped => Value::Bytes(bytes.to_vec()),
        KeyDomain::Scalar(kind) => decode_scalar(*kind, bytes)?,
        KeyDomain::Table { table, .. } => Value::Record(RecordRef::new(
            *table,
            RecordId::from_le_bytes(fixed_bytes(bytes)?),
        )),
        KeyDomain::Other(_) => {
            Value::UInt(u64::from(RecordId::from_le_bytes(fixed_bytes(bytes)?)))
        }
    };
    Ok(value)
}

fn decode_scalar(kind: TypeKind, bytes: &[u8]) -> CoreResult<Value> {
    let value = match kind {
        TypeKind::Bool => Value::Bool(fixed_bytes::<1>(bytes)?[0] != 0),
        TypeKind::Int8 => Value::Int(i64::from(i8::from_le_bytes(fixed_bytes(bytes)?))),
        TypeKind::UInt8 => Value::UInt(u64::from(u8::from_le_bytes(fixed_bytes(bytes)?))),
        TypeKind::Int16 => Value::Int(i64::from(i16::from_le_bytes(fixed_bytes(bytes)?))),
        TypeKind::UInt16 => Value::UInt(u64::from(u16::from_le_bytes(fixed_bytes(bytes)?))),
        TypeKind::Int32 => Value::Int(i64::from(i32::from_le_bytes(fixed_bytes(bytes)?))),
        TypeKind::UInt32 => Value::UInt(u64::from(u32::from_le_bytes(fixed_bytes(bytes)?))),
        TypeKind::Int64 => Value::Int(i64::from_le_bytes(fixed_bytes(bytes)?)),
        TypeKind::UInt64 => Value::UInt(u64::from_le_bytes(fixed_bytes(bytes)?)),
        TypeKind::Float => Value::Float(f64::from_le_bytes(fixed_bytes(bytes)?)),
        TypeKind::Time => Value::Time(i64::from_le_bytes(fixed_bytes(bytes)?)),
        TypeKind::ShortText | TypeKind::Text | TypeKind::LongText => {
            match String::from_utf8(bytes.to_vec()) {
                Ok(text) => Value::Text(text),
                Err(err) => Value::Bytes(err.into_bytes()),
            }
        }
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyctx_engine::{MemoryEngine, NameOrId, TableSpec};
    use proptest::prelude::*;

    fn engine() -> MemoryEngine {
        let mut engine = MemoryEngine::new();
        engine.database_create().unwrap();
        engine
    }

    fn type_id(engine: &mut MemoryEngine, kind: TypeKind) -> ObjectId {
        engine.resolve(&NameOrId::from(kind.name())).unwrap()
    }

    #[test]
    fn resolve_domains() {
        let mut engine = engine();
        let uint32 = type_id(&mut engine, TypeKind::UInt32);
        let users = engine
            .table_create(&TableSpec::new(TableKind::HashKey).name("users"))
            .unwrap();
        let tokenizer = engine.resolve(&NameOrId::from("TokenBigram")).unwrap();

        assert_eq!(KeyDomain::resolve(&mut engine, None), KeyDomain::Untyped);
        assert_eq!(
            KeyDomain::resolve(&mut engine, Some(uint32)),
            KeyDomain::Scalar(TypeKind::UInt32)
        );
        assert_eq!(
            KeyDomain::resolve(&mut engine, Some(users)),
            KeyDomain::Table {
                table: users,
                kind: TableKind::HashKey
            }
        );
        assert_eq!(
            KeyDomain::resolve(&mut engine, Some(tokenizer)),
            KeyDomain::Other(tokenizer)
        );
        assert_eq!(
            KeyDomain::resolve(&mut engine, Some(ObjectId::new(9999))),
            KeyDomain::Untyped
        );
    }

    #[test]
    fn raw_encoding() {
        let mut engine = engine();
        let raw = |engine: &mut MemoryEngine, value: Value| {
            encode(engine, &KeyDomain::Untyped, &value).unwrap()
        };

        assert_eq!(raw(&mut engine, Value::from("apple")), b"apple");
        assert_eq!(raw(&mut engine, Value::Bool(true)), vec![1]);
        assert_eq!(raw(&mut engine, Value::Int(-2)), (-2i64).to_le_bytes());
        assert_eq!(raw(&mut engine, Value::Float(0.5)), 0.5f64.to_le_bytes());

        let error = encode(&mut engine, &KeyDomain::Untyped, &Value::Null).unwrap_err();
        assert!(matches!(error, CoreError::Type { .. }));
    }

    #[test]
    fn scalar_range_checks() {
        let mut engine = engine();
        let int8 = KeyDomain::Scalar(TypeKind::Int8);

        assert_eq!(encode(&mut engine, &int8, &Value::Int(-128)).unwrap(), vec![0x80]);
        assert!(encode(&mut engine, &int8, &Value::Int(128)).is_err());
        assert!(encode(&mut engine, &KeyDomain::Scalar(TypeKind::UInt16), &Value::Int(-1)).is_err());
        assert!(encode(&mut engine, &int8, &Value::from("1")).is_err());
        assert_eq!(
            encode(&mut engine, &KeyDomain::Scalar(TypeKind::Bool), &Value::Int(1)).unwrap(),
            vec![1]
        );
    }

    #[test]
    fn time_and_float_coercion() {
        let mut engine = engine();
        let time = KeyDomain::Scalar(TypeKind::Time);
        let float = KeyDomain::Scalar(TypeKind::Float);

        assert_eq!(
            encode(&mut engine, &time, &Value::Int(2)).unwrap(),
            2_000_000i64.to_le_bytes()
        );
        assert_eq!(
            encode(&mut engine, &time, &Value::Float(1.5)).unwrap(),
            1_500_000i64.to_le_bytes()
        );
        assert_eq!(
            encode(&mut engine, &float, &Value::Int(3)).unwrap(),
            3.0f64.to_le_bytes()
        );
    }

    #[test]
    fn text_kinds_enforce_maximum() {
        let mut engine = engine();
        let short = KeyDomain::Scalar(TypeKind::ShortText);

        assert_eq!(
            encode(&mut engine, &short, &Value::from("hello")).unwrap(),
            b"hello"
        );
        let long = Value::Bytes(vec![b'x'; TypeKind::ShortText.max_size() + 1]);
        assert!(encode(&mut engine, &short, &long).is_err());
        assert_eq!(
            decode(&short, b"hello").unwrap(),
            Value::Text("hello".into())
        );
        assert_eq!(decode(&short, &[0xff]).unwrap(), Value::Bytes(vec![0xff]));
    }

    #[test]
    fn integer_bypasses_nested_lookup() {
        let mut engine = engine();
        let users = engine
            .table_create(&TableSpec::new(TableKind::HashKey))
            .unwrap();
        let domain = KeyDomain::Table {
            table: users,
            kind: TableKind::HashKey,
        };

        // Id 42 does not exist; the integer is still taken as-is.
        assert_eq!(
            encode(&mut engine, &domain, &Value::Int(42)).unwrap(),
            42u32.to_le_bytes()
        );
        assert_eq!(engine.table_size(users), 0);
    }

    #[test]
    fn nested_key_is_looked_up() {
        let mut engine = engine();
        let users = engine
            .table_create(&TableSpec::new(TableKind::HashKey))
            .unwrap();
        let alice = engine.table_lookup(users, b"alice", LookupMode::ExactOrAdd);
        let domain = KeyDomain::Table {
            table: users,
            kind: TableKind::HashKey,
        };

        assert_eq!(
            encode(&mut engine, &domain, &Value::from("alice")).unwrap(),
            alice.to_le_bytes()
        );
        let error = encode(&mut engine, &domain, &Value::from("bob")).unwrap_err();
        assert!(matches!(error, CoreError::UnresolvedReference { table, .. } if table == users));

        let record = Value::Record(RecordRef::new(users, alice));
        assert_eq!(
            encode(&mut engine, &domain, &record).unwrap(),
            alice.to_le_bytes()
        );
        let foreign = Value::Record(RecordRef::new(ObjectId::new(999), 1));
        assert!(encode(&mut engine, &domain, &foreign).is_err());
    }

    #[test]
    fn key_less_reference_needs_id() {
        let mut engine = engine();
        let log = engine
            .table_create(&TableSpec::new(TableKind::NoKey))
            .unwrap();
        let domain = KeyDomain::Table {
            table: log,
            kind: TableKind::NoKey,
        };

        assert!(matches!(
            encode(&mut engine, &domain, &Value::from("x")),
            Err(CoreError::Type { .. })
        ));
        assert_eq!(
            encode(&mut engine, &domain, &Value::UInt(3)).unwrap(),
            3u32.to_le_bytes()
        );
    }

    #[test]
    fn other_domain_requires_id() {
        let mut engine = engine();
        let domain = KeyDomain::Other(ObjectId::new(1));

        assert_eq!(
            encode(&mut engine, &domain, &Value::Int(7)).unwrap(),
            7u32.to_le_bytes()
        );
        assert!(encode(&mut engine, &domain, &Value::from("seven")).is_err());
        assert_eq!(
            decode(&domain, &7u32.to_le_bytes()).unwrap(),
            Value::UInt(7)
        );
    }

    #[test]
    fn decode_wrong_width() {
        let error = decode(&KeyDomain::Scalar(TypeKind::UInt32), &[1, 2]).unwrap_err();
        assert_eq!(
            error,
            CoreError::InvalidKeyBytes {
                expected: 4,
                actual: 2
            }
        );
    }

    #[test]
    fn decode_table_reference() {
        let table = ObjectId::new(12);
        let domain = KeyDomain::Table {
            table,
            kind: TableKind::PatKey,
        };
        assert_eq!(
            decode(&domain, &5u32.to_le_bytes()).unwrap(),
            Value::Record(RecordRef::new(table, 5))
        );
    }

    fn scalar_case() -> impl Strategy<Value = (TypeKind, Value)> {
        prop_oneof![
            any::<bool>().prop_map(|b| (TypeKind::Bool, Value::Bool(b))),
            any::<i8>().prop_map(|n| (TypeKind::Int8, Value::Int(i64::from(n)))),
            any::<u8>().prop_map(|n| (TypeKind::UInt8, Value::UInt(u64::from(n)))),
            any::<i16>().prop_map(|n| (TypeKind::Int16, Value::Int(i64::from(n)))),
            any::<u16>().prop_map(|n| (TypeKind::UInt16, Value::UInt(u64::from(n)))),
            any::<i32>().prop_map(|n| (TypeKind::Int32, Value::Int(i64::from(n)))),
            any::<u32>().prop_map(|n| (TypeKind::UInt32, Value::UInt(u64::from(n)))),
            any::<i64>().prop_map(|n| (TypeKind::Int64, Value::Int(n))),
            any::<u64>().prop_map(|n| (TypeKind::UInt64, Value::UInt(n))),
            any::<i64>().prop_map(|n| (TypeKind::Time, Value::Time(n))),
            (-1e12f64..1e12).prop_map(|x| (TypeKind::Float, Value::Float(x))),
        ]
    }

    proptest! {
        #[test]
        fn untyped_bytes_round_trip(bytes in prop::collection::vec(any::<u8>(), 0..256)) {
            let mut engine = MemoryEngine::new();
            let value = Value::Bytes(bytes);
            let encoded = encode(&mut engine, &KeyDomain::Untyped, &value).unwrap();
            prop_assert_eq!(decode(&KeyDomain::Untyped, &encoded).unwrap(), value);
        }

        #[test]
        fn scalar_width_and_round_trip((kind, value) in scalar_case()) {
            let mut engine = MemoryEngine::new();
            let domain = KeyDomain::Scalar(kind);
            let encoded = encode(&mut engine, &domain, &value).unwrap();
            prop_assert_eq!(Some(encoded.len()), kind.width());
            prop_assert_eq!(decode(&domain, &encoded).unwrap(), value);
        }
    }
}
