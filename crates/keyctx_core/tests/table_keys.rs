//! Table façade and key codec integration tests.

use keyctx_core::{CoreError, Identifier, KeyDomain, RecordRef, Value};
use keyctx_engine::{Encoding, ResultCode, TableKind, TypeKind};
use keyctx_testkit::prelude::*;
use keyctx_testkit::scenarios;
use proptest::prelude::*;

#[test]
fn apple_scenario() {
    with_context(|ctx| {
        let table = ctx.hash_table("fruits");
        assert_eq!(table.key_domain(), KeyDomain::Untyped);

        let a = table.add("apple").unwrap().unwrap();
        let key = table.key(a.id).unwrap().unwrap();
        assert_eq!(key.as_str(), Some("apple"));

        assert_eq!(table.add("apple").unwrap(), Some(a));
        table.delete("apple").unwrap();
        assert_eq!(table.get("apple").unwrap(), None);
    });
}

#[test]
fn typed_keys_round_trip_through_engine() {
    with_context(|ctx| {
        let table = ctx.typed_table("times", TableKind::PatKey, TypeKind::Time);
        let record = table.add(Value::Time(1_234_567)).unwrap().unwrap();
        assert_eq!(table.key(record.id).unwrap(), Some(Value::Time(1_234_567)));

        // Seconds as an integer are scaled to microseconds.
        let by_seconds = table.add(Value::Int(-3)).unwrap().unwrap();
        assert_eq!(table.key(by_seconds.id).unwrap(), Some(Value::Time(-3_000_000)));
    });
}

#[test]
fn wrong_width_key_is_a_type_error() {
    with_context(|ctx| {
        let table = ctx.typed_table("small", TableKind::HashKey, TypeKind::UInt8);
        let error = table.add(Value::UInt(300)).unwrap_err();
        assert!(matches!(error, CoreError::Type { .. }));
        assert_eq!(table.len().unwrap(), 0);
    });
}

#[test]
fn reference_keys_resolve_and_decode() {
    with_context(|ctx| {
        let (users, profiles) = scenarios::users_and_profiles(ctx);
        let alice = users.get("alice").unwrap().unwrap();

        let profile = profiles.add("alice").unwrap().unwrap();
        assert_eq!(
            profiles.key(profile.id).unwrap(),
            Some(Value::Record(RecordRef::new(users.id(), alice.id)))
        );

        match profiles.add("carol").unwrap_err() {
            CoreError::UnresolvedReference { table, key } => {
                assert_eq!(table, users.id());
                assert!(key.contains("carol"));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        // A plain id is used as-is, even without a matching user.
        let dangling = profiles.add(99u32).unwrap().unwrap();
        assert_eq!(
            profiles.key(dangling.id).unwrap(),
            Some(Value::Record(RecordRef::new(users.id(), 99)))
        );
        assert_eq!(users.len().unwrap(), 2);
        assert_eq!(
            profiles.get(Identifier::Key(Value::from("alice"))).unwrap(),
            Some(profile)
        );
    });
}

#[test]
fn set_by_key_leaves_record_on_failure() {
    with_context(|ctx| {
        let table = ctx.valued_table("scores", TypeKind::UInt16);

        let error = table.set("zed", -1).unwrap_err();
        assert!(matches!(error, CoreError::Type { .. }));
        assert!(table.get("zed").unwrap().is_some());
        assert_eq!(table.value("zed").unwrap(), Some(Value::UInt(0)));

        let record = table.set("amy", 7).unwrap();
        assert_eq!(table.value(record).unwrap(), Some(Value::UInt(7)));
    });
}

#[test]
fn set_on_table_without_values_reports_engine_error() {
    with_context(|ctx| {
        let table = ctx.hash_table("bare");
        let error = table.set("k", "v").unwrap_err();
        assert_eq!(error.code(), Some(ResultCode::InvalidArgument));
        match error {
            CoreError::Engine {
                diagnostic,
                related,
                location,
                ..
            } => {
                assert_eq!(diagnostic, "table has no value type");
                assert_eq!(related.as_deref(), Some("Table(bare)"));
                assert_eq!(location.function, "set_value");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    });
}

#[test]
fn table_encoding_follows_context() {
    let ctx = TestContext::with_options(keyctx_core::ContextOptions::new().encoding(Encoding::EucJp));
    let table = ctx.hash_table("jp");
    assert_eq!(table.encoding().unwrap(), Encoding::EucJp);
}

#[test]
fn cursor_keys_for_reference_table() {
    with_context(|ctx| {
        let (users, profiles) = scenarios::users_and_profiles(ctx);
        profiles.add("bob").unwrap();
        profiles.add("alice").unwrap();

        let mut cursor = profiles.open_cursor().unwrap();
        let mut keys = Vec::new();
        while let Some(id) = cursor.next() {
            id.unwrap();
            keys.push(cursor.key().unwrap().unwrap());
        }
        let bob = users.get("bob").unwrap().unwrap();
        let alice = users.get("alice").unwrap().unwrap();
        assert_eq!(keys, vec![Value::Record(bob), Value::Record(alice)]);
    });
}

proptest! {
    #[test]
    fn add_is_idempotent(keys in prop::collection::vec(text_key_strategy(), 1..20)) {
        let ctx = TestContext::new();
        let table = ctx.hash_table("words");
        for key in &keys {
            let before = table.len().unwrap();
            let existed = table.get(key.as_str()).unwrap().is_some();
            let first = table.add(key.as_str()).unwrap();
            let second = table.add(key.as_str()).unwrap();
            prop_assert_eq!(first, second);
            prop_assert_eq!(table.len().unwrap(), before + usize::from(!existed));
        }
    }

    #[test]
    fn delete_then_lookup_is_none(key in raw_key_strategy()) {
        let ctx = TestContext::new();
        let table = ctx.pat_table("raw");
        table.add(key.clone()).unwrap().unwrap();
        table.delete(key.clone()).unwrap();
        prop_assert_eq!(table.get(key).unwrap(), None);
    }

    #[test]
    fn scalar_keys_survive_the_engine((kind, value) in scalar_strategy()) {
        let ctx = TestContext::new();
        let table = ctx.typed_table("scalars", TableKind::HashKey, kind);
        let record = table.add(value.clone()).unwrap().unwrap();
        prop_assert_eq!(table.key(record.id).unwrap(), Some(value));
    }
}
