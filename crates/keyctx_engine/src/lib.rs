//! # keyctx Engine
//!
//! Engine surface for keyctx.
//!
//! This crate describes the narrow, C-style function surface through which the
//! binding core talks to an embedded storage/search engine. The engine owns
//! table storage and persisted layout; the core only opens tables, looks keys
//! up, reads and writes values and walks cursors.
//!
//! ## Design Principles
//!
//! - One engine instance is one handle; it is driven by a single logical thread
//! - Calls are synchronous and in-process
//! - Fallible calls report through a per-handle last-error [`Diagnostic`]
//! - The engine never interprets key bytes beyond size checks
//!
//! ## Available Engines
//!
//! - [`MemoryEngine`] - Reference engine for tests and ephemeral embedding
//!
//! ## Example
//!
//! ```rust
//! use keyctx_engine::{Engine, LookupMode, MemoryEngine, TableKind, TableSpec};
//!
//! let mut engine = MemoryEngine::new();
//! engine.database_create().unwrap();
//! let table = engine
//!     .table_create(&TableSpec::new(TableKind::HashKey).name("words"))
//!     .unwrap();
//! let id = engine.table_lookup(table, b"apple", LookupMode::ExactOrAdd);
//! assert_eq!(engine.table_lookup(table, b"apple", LookupMode::Exact), id);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod engine;
mod error;
mod memory;
mod types;

pub use engine::{Engine, EngineProvider};
pub use error::{Diagnostic, ResultCode};
pub use memory::{MemoryEngine, MemoryProvider, BUILTIN_TOKENIZERS, MAX_KEY_SIZE};
pub use types::{
    CursorId, Encoding, InitFlags, LookupMode, NameOrId, ObjectId, ObjectInfo, ObjectKind,
    RecordId, SetMode, TableInfo, TableKind, TableSpec, TypeKind, ID_NIL,
};
