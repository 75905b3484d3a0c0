//! Context configuration.

use keyctx_engine::{Encoding, InitFlags};
use serde::{Deserialize, Serialize};

/// Options for creating a context.
///
/// Unset fields fall back to the engine's own defaults. Options can be
/// merged so that a process-wide default set is refined per context.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ContextOptions {
    /// Encoding applied to the handle before any other use.
    pub encoding: Option<Encoding>,

    /// Flags passed to engine initialization.
    pub flags: Option<InitFlags>,
}

impl ContextOptions {
    /// Creates empty options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the encoding.
    #[must_use]
    pub const fn encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = Some(encoding);
        self
    }

    /// Sets the engine init flags.
    #[must_use]
    pub const fn flags(mut self, flags: InitFlags) -> Self {
        self.flags = Some(flags);
        self
    }

    /// Returns `self` with every field set in `overrides` replaced.
    #[must_use]
    pub fn merge(self, overrides: ContextOptions) -> Self {
        Self {
            encoding: overrides.encoding.or(self.encoding),
            flags: overrides.flags.or(self.flags),
        }
    }

    /// Init flags to use, defaulting to none.
    #[must_use]
    pub fn init_flags(&self) -> InitFlags {
        self.flags.unwrap_or_default()
    }
}
