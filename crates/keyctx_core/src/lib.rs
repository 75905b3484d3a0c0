//! # keyctx Core
//!
//! Context lifecycle and table-key handling on top of a [`keyctx_engine`]
//! handle.
//!
//! This crate provides:
//! - [`Context`] - owns one engine handle and tears it down in order
//! - [`DefaultContext`] - the get-or-create default slot
//! - [`ObjectRegistry`] - arena of wrappers bound to a context
//! - [`codec`] - key encoding against a table's key domain
//! - [`Table`] - add, get, delete and set by id or key
//! - [`TableCursor`] - record iteration with decoded keys
//! - [`CoreError`] - engine failures translated with their diagnostics
//!
//! ## Example
//!
//! ```rust
//! use keyctx_core::{Context, ContextOptions, Value};
//! use keyctx_engine::{MemoryProvider, TableKind, TableSpec};
//!
//! let context = Context::create_with(&MemoryProvider, ContextOptions::new()).unwrap();
//! context.create_database().unwrap();
//! let fruits = context
//!     .create_table(&TableSpec::new(TableKind::HashKey).name("fruits"))
//!     .unwrap();
//!
//! let apple = fruits.add("apple").unwrap().unwrap();
//! assert_eq!(fruits.get("apple").unwrap(), Some(apple));
//! assert_eq!(
//!     fruits.key(apple.id).unwrap(),
//!     Some(Value::Bytes(b"apple".to_vec()))
//! );
//!
//! context.destroy().unwrap();
//! assert!(fruits.add("pear").is_err());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod codec;
mod config;
mod context;
mod cursor;
mod defaults;
mod error;
mod registry;
mod table;
mod value;

pub use codec::KeyDomain;
pub use config::ContextOptions;
pub use context::Context;
pub use cursor::TableCursor;
pub use defaults::DefaultContext;
pub use error::{check, check_rc, translate, CoreError, CoreResult, ErrorKind, SourceLocation};
pub use registry::{ObjectKey, ObjectRegistry, UnbindFn};
pub use table::Table;
pub use value::{Identifier, RecordRef, Value};
