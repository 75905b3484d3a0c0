//! Context lifecycle.
//!
//! A [`Context`] owns one engine handle and the registry of wrapper objects
//! bound to it. Clones share the same instance. Teardown runs on
//! [`Context::destroy`] or when the last clone is dropped:
//!
//! 1. Every registered wrapper is unbound exactly once
//! 2. The attached database is closed and detached
//! 3. The engine handle is finalized
//!
//! Afterwards every operation fails with [`CoreError::UseAfterFinalize`].

use crate::config::ContextOptions;
use crate::defaults::DefaultContext;
use crate::error::{check, check_rc, CoreError, CoreResult};
use crate::registry::{ObjectKey, ObjectRegistry, UnbindFn};
use crate::table::Table;
use crate::value::Value;
use keyctx_engine::{
    Encoding, Engine, EngineProvider, NameOrId, ObjectId, ObjectInfo, ObjectKind, TableSpec,
};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

struct ContextState {
    engine: Option<Box<dyn Engine>>,
    registry: Option<ObjectRegistry>,
}

struct ContextInner {
    state: Mutex<ContextState>,
}

impl ContextInner {
    fn teardown(&self) -> CoreResult<()> {
        // Callbacks run without the lock held and may register again, so
        // drain until no registry is left.
        let mut unbound = 0;
        loop {
            let registry = self.state.lock().registry.take();
            match registry {
                Some(registry) => unbound += registry.unbind_all(),
                None => break,
            }
        }

        let engine = self.state.lock().engine.take();
        let Some(mut engine) = engine else {
            return Ok(());
        };

        let mut first_error = None;
        if let Some(database) = engine.database() {
            let rc = engine.object_close(database);
            if let Err(error) = check_rc(&*engine, rc, None) {
                first_error.get_or_insert(error);
            }
        }
        engine.detach_database();
        let rc = engine.finalize();
        if let Err(error) = check_rc(&*engine, rc, None) {
            first_error.get_or_insert(error);
        }

        debug!(unbound, "context destroyed");
        first_error.map_or(Ok(()), Err)
    }
}

impl Drop for ContextInner {
    fn drop(&mut self) {
        if let Err(error) = self.teardown() {
            warn!(%error, "context teardown failed");
        }
    }
}

/// Handle to one engine instance.
///
/// # Thread Safety
///
/// `Context` is `Send + Sync` so it can live in the default slot, but one
/// context is meant for one logical thread at a time.
#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

impl Context {
    /// Creates a context with the process-wide provider.
    ///
    /// `options` are merged over [`Context::default_options`].
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Initialization`] if the engine fails to start.
    pub fn create(options: ContextOptions) -> CoreResult<Self> {
        DefaultContext::global().create(options)
    }

    /// Creates a context using `provider`.
    ///
    /// The encoding, if set, is applied before any other use of the handle.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Initialization`] if the engine fails to start.
    pub fn create_with(provider: &dyn EngineProvider, options: ContextOptions) -> CoreResult<Self> {
        let flags = options.init_flags();
        let mut engine = provider.init(flags).map_err(CoreError::Initialization)?;
        if let Some(encoding) = options.encoding {
            engine.set_encoding(encoding);
        }
        debug!(encoding = %engine.encoding(), flags = flags.0, "context created");

        Ok(Self {
            inner: Arc::new(ContextInner {
                state: Mutex::new(ContextState {
                    engine: Some(engine),
                    registry: None,
                }),
            }),
        })
    }

    /// Returns the process-wide default context, creating it on first use.
    ///
    /// # Errors
    ///
    /// Fails if the context has to be created and the engine fails to start.
    pub fn get_default() -> CoreResult<Self> {
        DefaultContext::global().get()
    }

    /// Replaces the process-wide default context; `None` resets the slot.
    pub fn set_default(context: Option<Context>) {
        DefaultContext::global().set(context);
    }

    /// Options used when the default slot creates a context.
    pub fn default_options() -> ContextOptions {
        DefaultContext::global().options()
    }

    /// Sets the options used when the default slot creates a context.
    pub fn set_default_options(options: ContextOptions) {
        DefaultContext::global().set_options(options);
    }

    /// Runs `f` against the live engine handle.
    ///
    /// `f` runs under the context lock; it must not create or drop wrappers.
    pub(crate) fn with_engine<T>(
        &self,
        f: impl FnOnce(&mut dyn Engine) -> CoreResult<T>,
    ) -> CoreResult<T> {
        let mut state = self.inner.state.lock();
        let engine = state
            .engine
            .as_deref_mut()
            .ok_or(CoreError::UseAfterFinalize)?;
        f(engine)
    }

    /// Returns the handle's encoding.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UseAfterFinalize`] after teardown.
    pub fn encoding(&self) -> CoreResult<Encoding> {
        self.with_engine(|engine| Ok(engine.encoding()))
    }

    /// Sets the handle's encoding.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UseAfterFinalize`] after teardown.
    pub fn set_encoding(&self, encoding: Encoding) -> CoreResult<()> {
        self.with_engine(|engine| {
            engine.set_encoding(encoding);
            Ok(())
        })
    }

    /// Returns the attached database, if any.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UseAfterFinalize`] after teardown.
    pub fn database(&self) -> CoreResult<Option<ObjectId>> {
        self.with_engine(|engine| Ok(engine.database()))
    }

    /// Creates a database and attaches it.
    ///
    /// # Errors
    ///
    /// Fails if the engine cannot create the database.
    pub fn create_database(&self) -> CoreResult<ObjectId> {
        self.with_engine(|engine| {
            let database = engine.database_create();
            check(engine, None)?;
            database.ok_or_else(|| CoreError::type_error("engine returned no database"))
        })
    }

    /// Attaches an existing database, or detaches with `None`.
    ///
    /// # Errors
    ///
    /// Fails if `database` is not a database object.
    pub fn attach_database(&self, database: Option<ObjectId>) -> CoreResult<()> {
        self.with_engine(|engine| {
            let rc = engine.attach_database(database);
            check_rc(engine, rc, None)
        })
    }

    /// Looks up an object by name or id.
    ///
    /// Returns `None` when nothing matches or no database is attached.
    ///
    /// # Errors
    ///
    /// Fails if the engine reports an error.
    pub fn lookup(&self, target: impl Into<NameOrId>) -> CoreResult<Option<ObjectInfo>> {
        let target = target.into();
        self.with_engine(|engine| {
            let id = engine.resolve(&target);
            check(engine, None)?;
            let Some(id) = id else {
                return Ok(None);
            };
            let info = engine.object_info(id);
            check(engine, None)?;
            Ok(info)
        })
    }

    /// Looks up an object by a dynamic value.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Type`] unless `value` is text or a non-negative
    /// integer.
    pub fn lookup_value(&self, value: &Value) -> CoreResult<Option<ObjectInfo>> {
        self.lookup(NameOrId::try_from(value)?)
    }

    /// Opens a table wrapper.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Type`] if the object exists but is not a table.
    pub fn open_table(&self, target: impl Into<NameOrId>) -> CoreResult<Option<Table>> {
        let target = target.into();
        let Some(info) = self.lookup(target.clone())? else {
            return Ok(None);
        };
        match info.kind {
            ObjectKind::Table(_) => Table::open(self.clone(), info).map(Some),
            kind => Err(CoreError::type_error(format!(
                "{target} is not a table: {kind:?}"
            ))),
        }
    }

    /// Creates a table and opens a wrapper for it.
    ///
    /// # Errors
    ///
    /// Fails if the engine rejects the spec.
    pub fn create_table(&self, spec: &TableSpec) -> CoreResult<Table> {
        let id = self.with_engine(|engine| {
            let id = engine.table_create(spec);
            check(engine, spec.name.as_deref())?;
            id.ok_or_else(|| CoreError::type_error("engine returned no table"))
        })?;
        self.open_table(id)?
            .ok_or_else(|| CoreError::type_error(format!("created table {id} not found")))
    }

    /// Registers a wrapper object.
    ///
    /// Returns `None` without registering when no database is attached. The
    /// callback runs once at teardown unless the key is unregistered first.
    /// Unregistering drops the callback under the context lock, so a
    /// callback that owns a clone of this context must never be unregistered.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UseAfterFinalize`] after teardown.
    pub fn register(
        &self,
        native: Option<ObjectId>,
        unbind: UnbindFn,
    ) -> CoreResult<Option<ObjectKey>> {
        let mut guard = self.inner.state.lock();
        let state = &mut *guard;
        let engine = state.engine.as_ref().ok_or(CoreError::UseAfterFinalize)?;
        if engine.database().is_none() {
            return Ok(None);
        }
        let registry = state.registry.get_or_insert_with(|| {
            debug!("object registry created");
            ObjectRegistry::new()
        });
        Ok(Some(registry.insert(native, unbind)))
    }

    /// Unregisters a wrapper; stale keys and a missing registry are ignored.
    pub fn unregister(&self, key: ObjectKey) -> bool {
        let mut state = self.inner.state.lock();
        match state.registry.as_mut() {
            Some(registry) => registry.remove(key),
            None => false,
        }
    }

    /// Number of registered wrappers.
    pub fn registered(&self) -> usize {
        self.inner
            .state
            .lock()
            .registry
            .as_ref()
            .map_or(0, ObjectRegistry::len)
    }

    /// Tears the context down. A second call is a no-op.
    ///
    /// Teardown completes even if closing the database fails; the first
    /// failure is returned.
    ///
    /// # Errors
    ///
    /// Returns the first engine error raised while closing.
    pub fn destroy(&self) -> CoreResult<()> {
        self.inner.teardown()
    }

    /// Returns true once the context has been torn down.
    pub fn is_finalized(&self) -> bool {
        self.inner.state.lock().engine.is_none()
    }

    /// Returns true if both handles refer to the same instance.
    pub fn ptr_eq(&self, other: &Context) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(state) = self.inner.state.try_lock() else {
            return f.write_str("Context { <locked> }");
        };
        match &state.engine {
            Some(engine) => f
                .debug_struct("Context")
                .field("encoding", &engine.encoding())
                .field("database", &engine.database())
                .field(
                    "registered",
                    &state.registry.as_ref().map_or(0, ObjectRegistry::len),
                )
                .finish(),
            None => f.write_str("Context { <finalized> }"),
        }
    }
}
