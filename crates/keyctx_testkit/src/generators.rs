//! Property-based test generators using proptest.

use keyctx_core::Value;
use keyctx_engine::{Encoding, TypeKind};
use proptest::prelude::*;

/// Strategy for raw key bytes within the engine key limit.
pub fn raw_key_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 1..256)
}

/// Strategy for text keys.
pub fn text_key_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z0-9 _-]{1,64}").expect("Invalid regex")
}

/// Strategy for table names.
pub fn table_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Za-z][A-Za-z0-9_]{0,31}").expect("Invalid regex")
}

/// Strategy for a fixed-width type kind and a value that fits it.
pub fn scalar_strategy() -> impl Strategy<Value = (TypeKind, Value)> {
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

/// Strategy for any concrete encoding.
pub fn encoding_strategy() -> impl Strategy<Value = Encoding> {
    prop_oneof![
        Just(Encoding::None),
        Just(Encoding::EucJp),
        Just(Encoding::Utf8),
        Just(Encoding::Sjis),
        Just(Encoding::Latin1),
        Just(Encoding::Koi8r),
    ]
}
