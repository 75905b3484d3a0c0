//! Context fixtures and table helpers.

use keyctx_core::{Context, ContextOptions, ObjectKey, Table, UnbindFn};
use keyctx_engine::{MemoryProvider, ObjectId, TableKind, TableSpec, TypeKind};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// A context on the in-memory engine with a database attached.
pub struct TestContext {
    /// The context.
    pub context: Context,
    /// The attached database.
    pub database: ObjectId,
}

impl TestContext {
    /// Creates a context with default options.
    pub fn new() -> Self {
        Self::with_options(ContextOptions::new())
    }

    /// Creates a context with `options`.
    pub fn with_options(options: ContextOptions) -> Self {
        let context = Context::create_with(&MemoryProvider, options)
            .expect("Failed to create test context");
        let database = context
            .create_database()
            .expect("Failed to create test database");
        Self { context, database }
    }

    /// Id of a built-in type.
    pub fn type_id(&self, kind: TypeKind) -> ObjectId {
        self.context
            .lookup(kind.name())
            .expect("Failed to look up type")
            .expect("Built-in type should exist")
            .id
    }

    /// Creates and opens a table.
    pub fn table(&self, spec: &TableSpec) -> Table {
        self.context
            .create_table(spec)
            .expect("Failed to create table")
    }

    /// Untyped hash-key table.
    pub fn hash_table(&self, name: &str) -> Table {
        self.table(&TableSpec::new(TableKind::HashKey).name(name))
    }

    /// Untyped patricia-key table.
    pub fn pat_table(&self, name: &str) -> Table {
        self.table(&TableSpec::new(TableKind::PatKey).name(name))
    }

    /// Key-less table.
    pub fn array_table(&self, name: &str) -> Table {
        self.table(&TableSpec::new(TableKind::NoKey).name(name))
    }

    /// Table keyed by a built-in type.
    pub fn typed_table(&self, name: &str, kind: TableKind, key: TypeKind) -> Table {
        let key = self.type_id(key);
        self.table(&TableSpec::new(kind).name(name).key_type(key))
    }

    /// Hash-key table storing values of a built-in type.
    pub fn valued_table(&self, name: &str, value: TypeKind) -> Table {
        let value = self.type_id(value);
        self.table(&TableSpec::new(TableKind::HashKey).name(name).value_type(value))
    }

    /// Hash-key table whose keys reference records of `referenced`.
    pub fn reference_table(&self, name: &str, referenced: &Table) -> Table {
        self.table(
            &TableSpec::new(TableKind::HashKey)
                .name(name)
                .key_type(referenced.id()),
        )
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for TestContext {
    type Target = Context;

    fn deref(&self) -> &Self::Target {
        &self.context
    }
}

/// Runs a test with a fresh [`TestContext`].
pub fn with_context<F, R>(f: F) -> R
where
    F: FnOnce(&TestContext) -> R,
{
    let ctx = TestContext::new();
    f(&ctx)
}

/// Counts unbind callbacks.
#[derive(Debug, Clone, Default)]
pub struct UnbindProbe {
    count: Arc<AtomicUsize>,
}

impl UnbindProbe {
    /// Creates a probe with a zero count.
    pub fn new() -> Self {
        Self::default()
    }

    /// A callback that bumps the count.
    pub fn callback(&self) -> UnbindFn {
        let count = Arc::clone(&self.count);
        Box::new(move |_| {
            count.fetch_add(1, Ordering::SeqCst);
        })
    }

    /// Registers a callback-only object in `context`.
    pub fn register(&self, context: &Context) -> Option<ObjectKey> {
        context
            .register(None, self.callback())
            .expect("Failed to register probe")
    }

    /// Number of callbacks run so far.
    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;

    /// Hash-key table with `count` keys named `key-0`, `key-1`, ...
    pub fn populated_table(ctx: &TestContext, name: &str, count: usize) -> Table {
        let table = ctx.hash_table(name);
        for i in 0..count {
            table
                .add(format!("key-{i}"))
                .expect("Failed to add key")
                .expect("Record should be created");
        }
        table
    }

    /// A `users` table with `alice` and `bob`, and a `profiles` table keyed
    /// by it.
    pub fn users_and_profiles(ctx: &TestContext) -> (Table, Table) {
        let users = ctx.hash_table("users");
        for name in ["alice", "bob"] {
            users.add(name).expect("Failed to add user");
        }
        let profiles = ctx.reference_table("profiles", &users);
        (users, profiles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_has_database() {
        let ctx = TestContext::new();
        assert_eq!(ctx.database().unwrap(), Some(ctx.database));
    }

    #[test]
    fn populated_table_has_keys() {
        let ctx = TestContext::new();
        let table = scenarios::populated_table(&ctx, "t", 10);
        assert_eq!(table.len().unwrap(), 10);
        assert!(table.get("key-9").unwrap().is_some());
    }

    #[test]
    fn probe_counts_unbinds() {
        let ctx = TestContext::new();
        let probe = UnbindProbe::new();
        probe.register(&ctx).unwrap();

        ctx.destroy().unwrap();
        assert_eq!(probe.count(), 1);
    }
}
