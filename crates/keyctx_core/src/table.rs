//! Table key façade.
//!
//! A [`Table`] wraps one engine table. Records are addressed with an
//! [`Identifier`]: plain non-negative integers are record ids, everything
//! else is a key that goes through the [`crate::codec`] first.
//!
//! Assigning by key is two engine calls: lookup-or-create, then the value
//! write. A record created by the first call stays even if the second fails.

use crate::codec::{decode, encode, KeyDomain};
use crate::context::Context;
use crate::cursor::TableCursor;
use crate::error::{check, check_rc, CoreError, CoreResult};
use crate::registry::ObjectKey;
use crate::value::{Identifier, RecordRef, Value};
use keyctx_engine::{
    Encoding, Engine, LookupMode, NameOrId, ObjectId, ObjectInfo, ObjectKind, RecordId, SetMode,
    TableKind, ID_NIL,
};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// A table opened through a [`Context`].
pub struct Table {
    context: Context,
    id: ObjectId,
    name: Option<String>,
    kind: TableKind,
    keys: KeyDomain,
    values: KeyDomain,
    label: String,
    key: Option<ObjectKey>,
    bound: Arc<AtomicBool>,
}

impl Table {
    pub(crate) fn open(context: Context, info: ObjectInfo) -> CoreResult<Self> {
        let ObjectKind::Table(kind) = info.kind else {
            return Err(CoreError::type_error(format!("not a table: {}", info.id)));
        };
        let (keys, values) = context.with_engine(|engine| {
            Ok((
                KeyDomain::resolve(engine, info.domain),
                KeyDomain::resolve(engine, info.range),
            ))
        })?;

        let bound = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&bound);
        let key = context.register(
            Some(info.id),
            Box::new(move |_| flag.store(false, Ordering::Release)),
        )?;

        let label = match &info.name {
            Some(name) => format!("Table({name})"),
            None => format!("Table({})", info.id),
        };
        debug!(table = %info.id, name = ?info.name, ?keys, "table opened");

        Ok(Self {
            context,
            id: info.id,
            name: info.name,
            kind,
            keys,
            values,
            label,
            key,
            bound,
        })
    }

    /// Engine object id.
    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// Registered name, if any.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Storage layout.
    pub fn kind(&self) -> TableKind {
        self.kind
    }

    /// The owning context.
    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Resolved key domain.
    pub fn key_domain(&self) -> KeyDomain {
        self.keys
    }

    /// Resolved value domain; untyped when the table stores no values.
    pub fn value_domain(&self) -> KeyDomain {
        self.values
    }

    /// Returns false once the owning context has torn down.
    pub fn is_bound(&self) -> bool {
        self.bound.load(Ordering::Acquire)
    }

    /// Reference to record `id` of this table.
    pub fn record(&self, id: RecordId) -> RecordRef {
        RecordRef::new(self.id, id)
    }

    fn related(&self) -> Option<&str> {
        Some(self.label.as_str())
    }

    fn with_engine<T>(&self, f: impl FnOnce(&mut dyn Engine) -> CoreResult<T>) -> CoreResult<T> {
        self.context.with_engine(f)
    }

    fn find(&self, engine: &mut dyn Engine, target: &Identifier) -> CoreResult<RecordId> {
        let id = match target {
            Identifier::Id(id) => engine.table_at(self.id, *id),
            Identifier::Key(key) => {
                let bytes = encode(engine, &self.keys, key)?;
                engine.table_lookup(self.id, &bytes, LookupMode::Exact)
            }
        };
        check(engine, self.related())?;
        Ok(id)
    }

    /// Adds a record with `key`, or returns the existing one.
    ///
    /// Returns `None` if the engine created no record.
    ///
    /// # Errors
    ///
    /// Fails if the key cannot be encoded or the engine rejects it.
    pub fn add(&self, key: impl Into<Value>) -> CoreResult<Option<RecordRef>> {
        let key = key.into();
        let id = self.with_engine(|engine| {
            let bytes = encode(engine, &self.keys, &key)?;
            let id = engine.table_lookup(self.id, &bytes, LookupMode::ExactOrAdd);
            check(engine, self.related())?;
            Ok(id)
        })?;
        Ok((id != ID_NIL).then(|| self.record(id)))
    }

    /// Appends a record to a key-less table.
    ///
    /// # Errors
    ///
    /// Fails if the table has keys.
    pub fn add_record(&self) -> CoreResult<Option<RecordRef>> {
        let id = self.with_engine(|engine| {
            let id = engine.table_add(self.id);
            check(engine, self.related())?;
            Ok(id)
        })?;
        Ok((id != ID_NIL).then(|| self.record(id)))
    }

    /// Returns the decoded key of record `id`, or `None` if it has none.
    ///
    /// # Errors
    ///
    /// Fails if the stored key does not match the key domain.
    pub fn key(&self, id: RecordId) -> CoreResult<Option<Value>> {
        self.with_engine(|engine| {
            let size = engine.table_get_key(self.id, id, &mut []);
            check(engine, self.related())?;
            if size == 0 {
                return Ok(None);
            }
            let mut buf = vec![0; size];
            engine.table_get_key(self.id, id, &mut buf);
            check(engine, self.related())?;
            decode(&self.keys, &buf).map(Some)
        })
    }

    /// Deletes a record by id or key.
    ///
    /// # Errors
    ///
    /// Fails if the record does not exist or the key cannot be encoded.
    pub fn delete(&self, target: impl Into<Identifier>) -> CoreResult<()> {
        let target = target.into();
        self.with_engine(|engine| {
            let rc = match &target {
                Identifier::Id(id) => engine.table_delete_by_id(self.id, *id),
                Identifier::Key(key) => {
                    let bytes = encode(engine, &self.keys, key)?;
                    engine.table_delete(self.id, &bytes)
                }
            };
            check_rc(engine, rc, self.related())
        })
    }

    /// Finds a record by id or key.
    ///
    /// # Errors
    ///
    /// Fails if the key cannot be encoded.
    pub fn get(&self, target: impl Into<Identifier>) -> CoreResult<Option<RecordRef>> {
        let target = target.into();
        let id = self.with_engine(|engine| self.find(engine, &target))?;
        Ok((id != ID_NIL).then(|| self.record(id)))
    }

    /// Sets the value of a record, creating it first when addressed by key.
    ///
    /// # Errors
    ///
    /// - [`CoreError::Type`] for a null key or an unencodable value
    /// - [`CoreError::RecordNotCreated`] if the engine creates no record
    pub fn set(&self, target: impl Into<Identifier>, value: impl Into<Value>) -> CoreResult<RecordRef> {
        self.write(target.into(), &value.into(), SetMode::Set)
    }

    /// Appends to a variable-size value, creating the record when addressed
    /// by key.
    ///
    /// # Errors
    ///
    /// As [`Table::set`]; fixed-size values cannot be appended to.
    pub fn append(
        &self,
        target: impl Into<Identifier>,
        value: impl Into<Value>,
    ) -> CoreResult<RecordRef> {
        self.write(target.into(), &value.into(), SetMode::Append)
    }

    fn write(&self, target: Identifier, value: &Value, mode: SetMode) -> CoreResult<RecordRef> {
        let id = match target {
            Identifier::Id(id) => id,
            Identifier::Key(key) => {
                if key.is_null() {
                    return Err(CoreError::type_error("record key must not be null"));
                }
                match self.add(key.clone())? {
                    Some(record) => record.id,
                    None => {
                        return Err(CoreError::RecordNotCreated {
                            key: key.to_string(),
                            table: self.label.clone(),
                        })
                    }
                }
            }
        };
        self.with_engine(|engine| {
            let bytes = encode(engine, &self.values, value)?;
            let rc = engine.set_value(self.id, id, &bytes, mode);
            check_rc(engine, rc, self.related())
        })?;
        Ok(self.record(id))
    }

    /// Reads and decodes the value of a record.
    ///
    /// Returns `None` if the record does not exist or the table stores no
    /// values.
    ///
    /// # Errors
    ///
    /// Fails if the key cannot be encoded or the stored value is malformed.
    pub fn value(&self, target: impl Into<Identifier>) -> CoreResult<Option<Value>> {
        let target = target.into();
        self.with_engine(|engine| {
            let id = self.find(engine, &target)?;
            if id == ID_NIL {
                return Ok(None);
            }
            let bytes = engine.get_value(self.id, id);
            check(engine, self.related())?;
            bytes.map(|bytes| decode(&self.values, &bytes)).transpose()
        })
    }

    /// Number of records.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UseAfterFinalize`] after teardown.
    pub fn len(&self) -> CoreResult<usize> {
        self.with_engine(|engine| {
            let size = engine.table_size(self.id);
            check(engine, self.related())?;
            Ok(size)
        })
    }

    /// Returns true if the table has no records.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UseAfterFinalize`] after teardown.
    pub fn is_empty(&self) -> CoreResult<bool> {
        self.len().map(|len| len == 0)
    }

    /// Encoding of the table's keys.
    ///
    /// # Errors
    ///
    /// Fails if the engine cannot describe the table.
    pub fn encoding(&self) -> CoreResult<Encoding> {
        self.with_engine(|engine| {
            let info = engine.table_info(self.id);
            check(engine, self.related())?;
            info.map(|info| info.encoding)
                .ok_or_else(|| CoreError::type_error(format!("{} has no table info", self.label)))
        })
    }

    /// The table's default tokenizer, if one is set.
    ///
    /// # Errors
    ///
    /// Fails if the engine cannot describe the table.
    pub fn default_tokenizer(&self) -> CoreResult<Option<ObjectInfo>> {
        self.with_engine(|engine| {
            let info = engine.table_info(self.id);
            check(engine, self.related())?;
            let Some(tokenizer) = info.and_then(|info| info.default_tokenizer) else {
                return Ok(None);
            };
            let tokenizer = engine.object_info(tokenizer);
            check(engine, self.related())?;
            Ok(tokenizer)
        })
    }

    /// Sets the default tokenizer by name or id; `None` clears it.
    ///
    /// # Errors
    ///
    /// - [`CoreError::Type`] if the tokenizer does not resolve
    /// - [`CoreError::Engine`] if the engine rejects it
    pub fn set_default_tokenizer(&self, tokenizer: Option<NameOrId>) -> CoreResult<()> {
        self.with_engine(|engine| {
            let tokenizer = match tokenizer {
                Some(target) => {
                    let id = engine.resolve(&target);
                    check(engine, self.related())?;
                    Some(id.ok_or_else(|| {
                        CoreError::type_error(format!("unknown tokenizer: {target}"))
                    })?)
                }
                None => None,
            };
            let rc = engine.set_default_tokenizer(self.id, tokenizer);
            check_rc(engine, rc, self.related())
        })
    }

    /// Opens a cursor over every record.
    ///
    /// # Errors
    ///
    /// Fails if the engine cannot open the cursor.
    pub fn open_cursor(&self) -> CoreResult<TableCursor> {
        TableCursor::open(self)
    }

    pub(crate) fn label(&self) -> &str {
        &self.label
    }
}

impl Drop for Table {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            self.context.unregister(key);
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

impl fmt::Debug for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Table")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("keys", &self.keys)
            .field("bound", &self.is_bound())
            .finish()
    }
}
