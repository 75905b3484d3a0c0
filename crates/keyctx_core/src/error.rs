//! Error types and engine error translation.

use keyctx_engine::{Diagnostic, Engine, ObjectId, ResultCode};
use std::fmt;
use thiserror::Error;
use tracing::debug;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Coarse classification of a [`CoreError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The engine handle could not be initialized.
    Initialization,
    /// The context was already finalized.
    UseAfterFinalize,
    /// A value had the wrong shape for a key, id or option.
    Type,
    /// The engine reported a failure.
    Engine,
}

/// Engine-side source location of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceLocation {
    /// Source file.
    pub file: &'static str,
    /// Source line.
    pub line: u32,
    /// Function name.
    pub function: &'static str,
}

impl SourceLocation {
    /// Location carried by an engine diagnostic.
    pub fn of(diagnostic: &Diagnostic) -> Self {
        Self {
            file: diagnostic.file,
            line: diagnostic.line,
            function: diagnostic.function,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}()", self.file, self.line, self.function)
    }
}

/// Errors that can occur in core operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    /// The engine failed to initialize.
    #[error("failed to initialize engine: {0}")]
    Initialization(#[source] Diagnostic),

    /// The context has been finalized.
    #[error("context already finalized")]
    UseAfterFinalize,

    /// A value had the wrong shape.
    #[error("type error: {message}")]
    Type {
        /// Description of the mismatch.
        message: String,
    },

    /// An engine call failed.
    #[error("{message}: {diagnostic}{}\n{location}", related_suffix(.related))]
    Engine {
        /// Result code reported by the engine.
        code: ResultCode,
        /// Human-readable message for the code.
        message: &'static str,
        /// The engine's diagnostic text.
        diagnostic: String,
        /// Display form of the object involved, if any.
        related: Option<String>,
        /// Engine-side location of the failure.
        location: SourceLocation,
    },

    /// Lookup-or-create returned no record.
    #[error("failed to add new record with key: <{key}>: <{table}>")]
    RecordNotCreated {
        /// Display form of the key.
        key: String,
        /// Display form of the table.
        table: String,
    },

    /// A key could not be resolved in a referenced table.
    #[error("no record for key <{key}> in referenced table {table}")]
    UnresolvedReference {
        /// Display form of the key.
        key: String,
        /// The referenced table.
        table: ObjectId,
    },

    /// Stored key bytes do not match the declared width.
    #[error("invalid key bytes: expected {expected} bytes, got {actual}")]
    InvalidKeyBytes {
        /// Declared width.
        expected: usize,
        /// Actual length.
        actual: usize,
    },
}

fn related_suffix(related: &Option<String>) -> String {
    match related {
        Some(related) => format!(": {related}"),
        None => String::new(),
    }
}

impl CoreError {
    /// Creates a type error.
    pub fn type_error(message: impl Into<String>) -> Self {
        Self::Type {
            message: message.into(),
        }
    }

    /// Creates an engine error from a diagnostic.
    pub fn engine(diagnostic: &Diagnostic, related: Option<&str>) -> Self {
        Self::Engine {
            code: diagnostic.code,
            message: diagnostic.code.message(),
            diagnostic: diagnostic.message.clone(),
            related: related.map(str::to_string),
            location: SourceLocation::of(diagnostic),
        }
    }

    /// Returns the coarse kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::Initialization(_) => ErrorKind::Initialization,
            CoreError::UseAfterFinalize => ErrorKind::UseAfterFinalize,
            CoreError::Type { .. } | CoreError::UnresolvedReference { .. } => ErrorKind::Type,
            CoreError::Engine { .. }
            | CoreError::RecordNotCreated { .. }
            | CoreError::InvalidKeyBytes { .. } => ErrorKind::Engine,
        }
    }

    /// Returns the engine result code for engine errors.
    pub fn code(&self) -> Option<ResultCode> {
        match self {
            CoreError::Engine { code, .. } => Some(*code),
            CoreError::Initialization(diagnostic) => Some(diagnostic.code),
            _ => None,
        }
    }
}

/// Translates a diagnostic into an error, or `None` on success.
pub fn translate(diagnostic: &Diagnostic, related: Option<&str>) -> Option<CoreError> {
    if diagnostic.is_ok() {
        return None;
    }
    debug!(
        code = ?diagnostic.code,
        message = %diagnostic.message,
        function = diagnostic.function,
        related,
        "engine call failed"
    );
    Some(CoreError::engine(diagnostic, related))
}

/// Checks the engine's last error.
///
/// Must be called right after the engine call it reports on; the next
/// fallible call overwrites the diagnostic.
///
/// # Errors
///
/// Returns the translated error if the last call failed.
pub fn check(engine: &dyn Engine, related: Option<&str>) -> CoreResult<()> {
    match translate(engine.last_error(), related) {
        Some(error) => Err(error),
        None => Ok(()),
    }
}

/// Checks the engine's last error and a returned result code.
///
/// # Errors
///
/// Returns the translated error if either reports a failure.
pub fn check_rc(engine: &dyn Engine, rc: ResultCode, related: Option<&str>) -> CoreResult<()> {
    check(engine, related)?;
    if rc.is_err() {
        let diagnostic = Diagnostic {
            code: rc,
            ..Diagnostic::ok()
        };
        return Err(CoreError::engine(&diagnostic, related));
    }
    Ok(())
}
