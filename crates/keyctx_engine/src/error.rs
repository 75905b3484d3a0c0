//! Result codes and last-error diagnostics.

use std::fmt;
use std::panic::Location;
use thiserror::Error;

/// Result code reported by engine calls.
///
/// The numeric values are stable so they can cross a C boundary unchanged.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultCode {
    /// Operation succeeded.
    Success = 0,
    /// A cursor or iterator ran past its last item.
    EndOfData = 1,
    /// Unclassified failure.
    UnknownError = -1,
    /// The operation is not permitted in the current state.
    OperationNotPermitted = -2,
    /// An argument was rejected.
    InvalidArgument = -3,
    /// The referenced object does not exist.
    NoSuchObject = -4,
    /// The referenced record does not exist.
    NoSuchRecord = -5,
    /// Stored bytes do not have the expected shape.
    InvalidFormat = -6,
    /// The handle has already been finalized.
    Finalized = -7,
    /// The operation is not supported by this engine or object.
    NotSupported = -8,
    /// The engine could not allocate memory.
    NoMemoryAvailable = -9,
}

impl ResultCode {
    /// Returns true if the code indicates success.
    pub fn is_ok(self) -> bool {
        self == ResultCode::Success
    }

    /// Returns true if the code indicates an error.
    pub fn is_err(self) -> bool {
        self != ResultCode::Success
    }

    /// Returns the human-readable message for this code.
    pub fn message(self) -> &'static str {
        match self {
            ResultCode::Success => "success",
            ResultCode::EndOfData => "end of data",
            ResultCode::UnknownError => "unknown error",
            ResultCode::OperationNotPermitted => "operation not permitted",
            ResultCode::InvalidArgument => "invalid argument",
            ResultCode::NoSuchObject => "no such object",
            ResultCode::NoSuchRecord => "no such record",
            ResultCode::InvalidFormat => "invalid format",
            ResultCode::Finalized => "handle already finalized",
            ResultCode::NotSupported => "operation not supported",
            ResultCode::NoMemoryAvailable => "no memory available",
        }
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

impl From<ResultCode> for i32 {
    fn from(code: ResultCode) -> Self {
        code as i32
    }
}

impl From<i32> for ResultCode {
    fn from(code: i32) -> Self {
        match code {
            0 => ResultCode::Success,
            1 => ResultCode::EndOfData,
            -2 => ResultCode::OperationNotPermitted,
            -3 => ResultCode::InvalidArgument,
            -4 => ResultCode::NoSuchObject,
            -5 => ResultCode::NoSuchRecord,
            -6 => ResultCode::InvalidFormat,
            -7 => ResultCode::Finalized,
            -8 => ResultCode::NotSupported,
            -9 => ResultCode::NoMemoryAvailable,
            _ => ResultCode::UnknownError,
        }
    }
}

/// The last error recorded on an engine handle.
///
/// Holds the result code, the engine's diagnostic text and the engine-side
/// source location that raised it. The next fallible call on the same handle
/// overwrites it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {message}")]
pub struct Diagnostic {
    /// Result code of the failed call.
    pub code: ResultCode,
    /// Diagnostic text written by the engine.
    pub message: String,
    /// Engine source file that raised the error.
    pub file: &'static str,
    /// Engine source line that raised the error.
    pub line: u32,
    /// Engine function that raised the error.
    pub function: &'static str,
}

impl Diagnostic {
    /// A cleared diagnostic.
    pub const fn ok() -> Self {
        Self {
            code: ResultCode::Success,
            message: String::new(),
            file: "",
            line: 0,
            function: "",
        }
    }

    /// Creates a diagnostic located at the caller.
    #[track_caller]
    pub fn new(code: ResultCode, message: impl Into<String>, function: &'static str) -> Self {
        let location = Location::caller();
        Self {
            code,
            message: message.into(),
            file: location.file(),
            line: location.line(),
            function,
        }
    }

    /// Returns true if no error is recorded.
    pub fn is_ok(&self) -> bool {
        self.code.is_ok()
    }
}

impl Default for Diagnostic {
    fn default() -> Self {
        Self::ok()
    }
}
