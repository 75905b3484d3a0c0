//! The default-context slot.
//!
//! A [`DefaultContext`] holds an optional context plus the options used to
//! create one. The rules:
//!
//! - [`DefaultContext::get`] returns the slot's context, creating it with the
//!   slot options if the slot is empty
//! - [`DefaultContext::set`] replaces the slot; `None` empties it without
//!   destroying the previous context, which lives on in any other clone
//! - Option changes only affect contexts created afterwards
//!
//! [`DefaultContext::global`] is the process-wide instance behind
//! [`Context::get_default`].

use crate::config::ContextOptions;
use crate::context::Context;
use crate::error::CoreResult;
use keyctx_engine::{EngineProvider, MemoryProvider};
use parking_lot::Mutex;
use std::fmt;
use std::sync::{Arc, OnceLock};
use tracing::debug;

static GLOBAL: OnceLock<DefaultContext> = OnceLock::new();

/// A default-context slot with its creation options.
pub struct DefaultContext {
    provider: Arc<dyn EngineProvider>,
    slot: Mutex<Option<Context>>,
    options: Mutex<ContextOptions>,
}

impl DefaultContext {
    /// Creates an empty slot backed by the in-memory engine.
    #[must_use]
    pub fn new() -> Self {
        Self::with_provider(Arc::new(MemoryProvider))
    }

    /// Creates an empty slot backed by `provider`.
    #[must_use]
    pub fn with_provider(provider: Arc<dyn EngineProvider>) -> Self {
        Self {
            provider,
            slot: Mutex::new(None),
            options: Mutex::new(ContextOptions::default()),
        }
    }

    /// The process-wide slot.
    pub fn global() -> &'static DefaultContext {
        GLOBAL.get_or_init(DefaultContext::new)
    }

    /// Installs the provider of the process-wide slot.
    ///
    /// Returns false if the global slot was already initialized.
    pub fn init_global(provider: Arc<dyn EngineProvider>) -> bool {
        GLOBAL.set(Self::with_provider(provider)).is_ok()
    }

    /// Returns the slot's context, creating it if the slot is empty.
    ///
    /// # Errors
    ///
    /// Fails if a context has to be created and the engine fails to start.
    pub fn get(&self) -> CoreResult<Context> {
        let mut slot = self.slot.lock();
        if let Some(context) = slot.as_ref() {
            return Ok(context.clone());
        }
        let context = Context::create_with(self.provider.as_ref(), self.options())?;
        debug!("default context created");
        *slot = Some(context.clone());
        Ok(context)
    }

    /// Replaces the slot's context.
    pub fn set(&self, context: Option<Context>) {
        let previous = std::mem::replace(&mut *self.slot.lock(), context);
        // Dropped outside the lock; this may tear the old context down.
        drop(previous);
    }

    /// Returns true if the slot holds a context.
    pub fn is_set(&self) -> bool {
        self.slot.lock().is_some()
    }

    /// Options used when the slot creates a context.
    pub fn options(&self) -> ContextOptions {
        *self.options.lock()
    }

    /// Replaces the slot options.
    pub fn set_options(&self, options: ContextOptions) {
        *self.options.lock() = options;
    }

    /// Creates a fresh context with `options` merged over the slot options.
    ///
    /// The slot itself is left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CoreError::Initialization`] if the engine fails to
    /// start.
    pub fn create(&self, options: ContextOptions) -> CoreResult<Context> {
        let merged = self.options().merge(options);
        Context::create_with(self.provider.as_ref(), merged)
    }
}

impl Default for DefaultContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DefaultContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DefaultContext")
            .field("set", &self.is_set())
            .field("options", &self.options())
            .finish_non_exhaustive()
    }
}
