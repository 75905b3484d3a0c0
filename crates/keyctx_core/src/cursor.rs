//! Cursors over table records.

use crate::codec::{decode, KeyDomain};
use crate::context::Context;
use crate::error::{check, check_rc, CoreError, CoreResult};
use crate::registry::ObjectKey;
use crate::table::Table;
use crate::value::{RecordRef, Value};
use keyctx_engine::{CursorId, ObjectId, RecordId, ID_NIL};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::trace;

/// Iterates the record ids of a table.
///
/// Yields `Err` at most once; iteration stops after an error.
pub struct TableCursor {
    context: Context,
    cursor: CursorId,
    table: ObjectId,
    label: String,
    current: RecordId,
    done: bool,
    key: Option<ObjectKey>,
    bound: Arc<AtomicBool>,
}

impl TableCursor {
    pub(crate) fn open(table: &Table) -> CoreResult<Self> {
        let context = table.context().clone();
        let label = table.label().to_string();
        let cursor = context.with_engine(|engine| {
            let cursor = engine.cursor_open(table.id());
            check(engine, Some(label.as_str()))?;
            cursor.ok_or_else(|| CoreError::type_error(format!("no cursor for {label}")))
        })?;

        let bound = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&bound);
        let key = context.register(
            Some(table.id()),
            Box::new(move |_| flag.store(false, Ordering::Release)),
        )?;
        trace!(table = %table.id(), cursor = cursor.0, "cursor opened");

        Ok(Self {
            context,
            cursor,
            table: table.id(),
            label,
            current: ID_NIL,
            done: false,
            key,
            bound,
        })
    }

    /// Returns false once the owning context has torn down.
    pub fn is_bound(&self) -> bool {
        self.bound.load(Ordering::Acquire)
    }

    /// The record at the current position.
    pub fn record(&self) -> Option<RecordRef> {
        (self.current != ID_NIL).then(|| RecordRef::new(self.table, self.current))
    }

    /// Decodes the key at the current position.
    ///
    /// Returns `None` before the first step, past the end, for key-less
    /// tables, and once the cursor is unbound.
    ///
    /// # Errors
    ///
    /// Fails if the stored key does not match the table's key domain.
    pub fn key(&self) -> CoreResult<Option<Value>> {
        if !self.is_bound() {
            return Ok(None);
        }
        self.context.with_engine(|engine| {
            let bytes = engine.cursor_get_key(self.cursor);
            check(engine, Some(self.label.as_str()))?;
            let Some(bytes) = bytes.filter(|bytes| !bytes.is_empty()) else {
                return Ok(None);
            };
            let table = engine.cursor_table(self.cursor).unwrap_or(self.table);
            let domain = KeyDomain::of_table(engine, table)?;
            decode(&domain, &bytes).map(Some)
        })
    }

    fn step(&mut self) -> CoreResult<RecordId> {
        let cursor = self.cursor;
        let label = &self.label;
        self.context.with_engine(|engine| {
            let id = engine.cursor_next(cursor);
            check(engine, Some(label.as_str()))?;
            Ok(id)
        })
    }
}

impl Iterator for TableCursor {
    type Item = CoreResult<RecordId>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.step() {
            Ok(ID_NIL) => {
                self.done = true;
                self.current = ID_NIL;
                None
            }
            Ok(id) => {
                self.current = id;
                Some(Ok(id))
            }
            Err(error) => {
                self.done = true;
                self.current = ID_NIL;
                Some(Err(error))
            }
        }
    }
}

impl Drop for TableCursor {
    fn drop(&mut self) {
        if self.is_bound() {
            let cursor = self.cursor;
            let closed = self.context.with_engine(|engine| {
                let rc = engine.cursor_close(cursor);
                check_rc(engine, rc, None)
            });
            if let Err(error) = closed {
                trace!(%error, "cursor close skipped");
            }
        }
        if let Some(key) = self.key.take() {
            self.context.unregister(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ContextOptions;
    use keyctx_engine::{MemoryProvider, TableKind, TableSpec, TypeKind};

    fn context() -> Context {
        let context = Context::create_with(&MemoryProvider, ContextOptions::new()).unwrap();
        context.create_database().unwrap();
        context
    }

    #[test]
    fn walks_patricia_keys_in_order() {
        let context = context();
        let table = context
            .create_table(&TableSpec::new(TableKind::PatKey))
            .unwrap();
        for key in ["cherry", "apple", "banana"] {
            table.add(key).unwrap();
        }

        let mut cursor = table.open_cursor().unwrap();
        assert_eq!(cursor.key().unwrap(), None);

        let mut keys = Vec::new();
        while let Some(id) = cursor.next() {
            id.unwrap();
            keys.push(cursor.key().unwrap().unwrap());
        }
        assert_eq!(
            keys,
            vec![
                Value::Bytes(b"apple".to_vec()),
                Value::Bytes(b"banana".to_vec()),
                Value::Bytes(b"cherry".to_vec()),
            ]
        );
        assert_eq!(cursor.record(), None);
        assert!(cursor.next().is_none());
    }

    #[test]
    fn decodes_typed_keys() {
        let context = context();
        let int64 = context.lookup(TypeKind::Int64.name()).unwrap().unwrap().id;
        let table = context
            .create_table(&TableSpec::new(TableKind::HashKey).key_type(int64))
            .unwrap();
        let record = table.add(-5).unwrap().unwrap();

        let mut cursor = table.open_cursor().unwrap();
        assert_eq!(cursor.next().unwrap().unwrap(), record.id);
        assert_eq!(cursor.record(), Some(record));
        assert_eq!(cursor.key().unwrap(), Some(Value::Int(-5)));
    }

    #[test]
    fn key_less_cursor_has_no_keys() {
        let context = context();
        let table = context
            .create_table(&TableSpec::new(TableKind::NoKey))
            .unwrap();
        table.add_record().unwrap();
        table.add_record().unwrap();

        let mut cursor = table.open_cursor().unwrap();
        let ids: Vec<_> = cursor.by_ref().map(Result::unwrap).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(cursor.key().unwrap(), None);
    }

    #[test]
    fn cursor_registers_and_closes() {
        let context = context();
        let table = context
            .create_table(&TableSpec::new(TableKind::HashKey))
            .unwrap();

        let cursor = table.open_cursor().unwrap();
        assert_eq!(context.registered(), 2);
        drop(cursor);
        assert_eq!(context.registered(), 1);
    }

    #[test]
    fn unbound_after_destroy() {
        let context = context();
        let table = context
            .create_table(&TableSpec::new(TableKind::HashKey))
            .unwrap();
        table.add("a").unwrap();
        let mut cursor = table.open_cursor().unwrap();

        context.destroy().unwrap();
        assert!(!cursor.is_bound());
        assert_eq!(cursor.key().unwrap(), None);
        assert_eq!(cursor.next(), Some(Err(CoreError::UseAfterFinalize)));
        assert_eq!(cursor.next(), None);
    }
}
