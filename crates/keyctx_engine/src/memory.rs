//! In-memory reference engine.

use crate::engine::{Engine, EngineProvider};
use crate::error::{Diagnostic, ResultCode};
use crate::types::{
    CursorId, Encoding, InitFlags, LookupMode, NameOrId, ObjectId, ObjectInfo, ObjectKind,
    RecordId, SetMode, TableInfo, TableKind, TableSpec, TypeKind, ID_NIL,
};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, trace};

/// Largest key the engine accepts, in bytes.
pub const MAX_KEY_SIZE: usize = 4096;

/// Tokenizers registered in every new database.
pub const BUILTIN_TOKENIZERS: [&str; 3] = ["TokenDelimit", "TokenUnigram", "TokenBigram"];

/// Width of an id stored as a key or value.
const ID_WIDTH: usize = std::mem::size_of::<RecordId>();

type Failure = (ResultCode, String);

#[derive(Debug)]
enum Body {
    Database,
    Type(TypeKind),
    Tokenizer,
    Table(TableData),
}

#[derive(Debug)]
struct Object {
    name: Option<String>,
    body: Body,
}

#[derive(Debug)]
struct Record {
    key: Vec<u8>,
    value: Vec<u8>,
}

/// Size rules for stored keys or values: fixed width, or a maximum.
#[derive(Debug, Clone, Copy)]
struct Shape {
    width: Option<usize>,
    max: usize,
}

impl Shape {
    fn check(self, len: usize, what: &str) -> Result<(), Failure> {
        match self.width {
            Some(width) if len != width => Err((
                ResultCode::InvalidArgument,
                format!("{what} size {len} does not match fixed width {width}"),
            )),
            _ if len > self.max => Err((
                ResultCode::InvalidArgument,
                format!("{what} size {len} exceeds maximum {}", self.max),
            )),
            _ => Ok(()),
        }
    }
}

#[derive(Debug)]
struct TableData {
    kind: TableKind,
    key_type: Option<ObjectId>,
    value_type: Option<ObjectId>,
    key_shape: Shape,
    value_shape: Option<Shape>,
    encoding: Encoding,
    tokenizer: Option<ObjectId>,
    keys: BTreeMap<Vec<u8>, RecordId>,
    records: BTreeMap<RecordId, Record>,
    next_id: RecordId,
}

impl TableData {
    fn validate_key(&self, key: &[u8]) -> Result<(), Failure> {
        if self.kind == TableKind::NoKey {
            return Err((
                ResultCode::OperationNotPermitted,
                "table has no keys".to_string(),
            ));
        }
        if key.is_empty() {
            return Err((ResultCode::InvalidArgument, "empty key".to_string()));
        }
        self.key_shape.check(key.len(), "key")
    }

    fn insert(&mut self, key: Vec<u8>) -> RecordId {
        let id = self.next_id;
        self.next_id += 1;
        if !key.is_empty() {
            self.keys.insert(key.clone(), id);
        }
        let value = match self.value_shape.and_then(|shape| shape.width) {
            Some(width) => vec![0; width],
            None => Vec::new(),
        };
        self.records.insert(id, Record { key, value });
        id
    }

    fn lookup(&mut self, key: &[u8], mode: LookupMode) -> Result<RecordId, Failure> {
        self.validate_key(key)?;
        if let Some(&id) = self.keys.get(key) {
            return Ok(id);
        }
        match mode {
            LookupMode::Exact => Ok(ID_NIL),
            LookupMode::ExactOrAdd => Ok(self.insert(key.to_vec())),
        }
    }

    fn delete_key(&mut self, key: &[u8]) -> Result<(), Failure> {
        self.validate_key(key)?;
        match self.keys.remove(key) {
            Some(id) => {
                self.records.remove(&id);
                Ok(())
            }
            None => Err((ResultCode::NoSuchRecord, "no record for key".to_string())),
        }
    }

    fn delete_id(&mut self, id: RecordId) -> Result<(), Failure> {
        match self.records.remove(&id) {
            Some(record) => {
                if !record.key.is_empty() {
                    self.keys.remove(&record.key);
                }
                Ok(())
            }
            None => Err((ResultCode::NoSuchRecord, format!("no record with id {id}"))),
        }
    }

    fn set_value(&mut self, id: RecordId, value: &[u8], mode: SetMode) -> Result<(), Failure> {
        let Some(shape) = self.value_shape else {
            return Err((
                ResultCode::InvalidArgument,
                "table has no value type".to_string(),
            ));
        };
        let record = self
            .records
            .get_mut(&id)
            .ok_or_else(|| (ResultCode::NoSuchRecord, format!("no record with id {id}")))?;
        match mode {
            SetMode::Set => {
                shape.check(value.len(), "value")?;
                record.value = value.to_vec();
            }
            SetMode::Append => {
                if shape.width.is_some() {
                    return Err((
                        ResultCode::NotSupported,
                        "cannot append to a fixed-size value".to_string(),
                    ));
                }
                shape.check(record.value.len() + value.len(), "value")?;
                record.value.extend_from_slice(value);
            }
        }
        Ok(())
    }

    fn ordered_ids(&self) -> Vec<RecordId> {
        match self.kind {
            TableKind::PatKey => self.keys.values().copied().collect(),
            TableKind::HashKey | TableKind::NoKey => self.records.keys().copied().collect(),
        }
    }
}

#[derive(Debug)]
struct CursorState {
    table: ObjectId,
    ids: Vec<RecordId>,
    position: usize,
    current: RecordId,
}

/// An in-memory engine handle.
///
/// This engine keeps one database namespace in memory and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Embedding without persistence
///
/// Every new database registers the built-in types (named after
/// [`TypeKind::name`]) and the [`BUILTIN_TOKENIZERS`].
///
/// Patricia-key tables iterate in key order; hash-key and key-less tables
/// iterate in id order. Record ids are never reused.
///
/// # Example
///
/// ```rust
/// use keyctx_engine::{Engine, MemoryEngine, NameOrId};
///
/// let mut engine = MemoryEngine::new();
/// assert!(engine.resolve(&NameOrId::from("UInt32")).is_none());
/// engine.database_create().unwrap();
/// assert!(engine.resolve(&NameOrId::from("UInt32")).is_some());
/// ```
#[derive(Debug)]
pub struct MemoryEngine {
    flags: InitFlags,
    encoding: Encoding,
    last_error: Diagnostic,
    finalized: bool,
    database: Option<ObjectId>,
    objects: BTreeMap<ObjectId, Object>,
    names: HashMap<String, ObjectId>,
    next_object: u32,
    cursors: HashMap<CursorId, CursorState>,
    next_cursor: u32,
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::with_flags(InitFlags::NONE)
    }
}

impl MemoryEngine {
    /// Creates a new engine handle with no database.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new engine handle with the given init flags.
    #[must_use]
    pub fn with_flags(flags: InitFlags) -> Self {
        Self {
            flags,
            encoding: Encoding::Default,
            last_error: Diagnostic::ok(),
            finalized: false,
            database: None,
            objects: BTreeMap::new(),
            names: HashMap::new(),
            next_object: 1,
            cursors: HashMap::new(),
            next_cursor: 1,
        }
    }

    /// Returns the flags the handle was initialized with.
    #[must_use]
    pub fn flags(&self) -> InitFlags {
        self.flags
    }

    /// Returns true once [`Engine::finalize`] has run.
    #[must_use]
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Returns the number of open cursors.
    #[must_use]
    pub fn open_cursors(&self) -> usize {
        self.cursors.len()
    }

    fn clear_error(&mut self) {
        self.last_error = Diagnostic::ok();
    }

    #[track_caller]
    fn fail(&mut self, code: ResultCode, message: impl Into<String>, function: &'static str) {
        let diagnostic = Diagnostic::new(code, message, function);
        trace!(code = ?diagnostic.code, message = %diagnostic.message, function, "engine call failed");
        self.last_error = diagnostic;
    }

    #[track_caller]
    fn ensure_live(&mut self, function: &'static str) -> bool {
        if self.finalized {
            self.fail(ResultCode::Finalized, "handle already finalized", function);
            return false;
        }
        true
    }

    #[track_caller]
    fn ensure_table(&mut self, table: ObjectId, function: &'static str) -> bool {
        if !self.ensure_live(function) {
            return false;
        }
        let is_table = matches!(
            self.objects.get(&table).map(|object| &object.body),
            Some(Body::Table(_))
        );
        if !is_table {
            self.fail(ResultCode::NoSuchObject, format!("not a table: {table}"), function);
        }
        is_table
    }

    fn table_data(&self, table: ObjectId) -> Option<&TableData> {
        match self.objects.get(&table).map(|object| &object.body) {
            Some(Body::Table(data)) => Some(data),
            _ => None,
        }
    }

    fn table_data_mut(&mut self, table: ObjectId) -> Option<&mut TableData> {
        match self.objects.get_mut(&table).map(|object| &mut object.body) {
            Some(Body::Table(data)) => Some(data),
            _ => None,
        }
    }

    fn insert_object(&mut self, name: Option<String>, body: Body) -> ObjectId {
        let id = ObjectId::new(self.next_object);
        self.next_object += 1;
        if let Some(name) = &name {
            self.names.insert(name.clone(), id);
        }
        self.objects.insert(id, Object { name, body });
        id
    }

    fn shape_of(&self, domain: Option<ObjectId>, key: bool) -> Result<Shape, Failure> {
        let Some(domain) = domain else {
            return Ok(Shape {
                width: None,
                max: MAX_KEY_SIZE,
            });
        };
        match self.objects.get(&domain).map(|object| &object.body) {
            Some(Body::Type(kind)) => {
                let max = if key {
                    kind.max_size().min(MAX_KEY_SIZE)
                } else {
                    kind.max_size()
                };
                Ok(Shape {
                    width: kind.width(),
                    max,
                })
            }
            Some(_) => Ok(Shape {
                width: Some(ID_WIDTH),
                max: ID_WIDTH,
            }),
            None => Err((ResultCode::NoSuchObject, format!("no such type: {domain}"))),
        }
    }
}

impl Engine for MemoryEngine {
    fn last_error(&self) -> &Diagnostic {
        &self.last_error
    }

    fn finalize(&mut self) -> ResultCode {
        self.clear_error();
        if !self.ensure_live("finalize") {
            return ResultCode::Finalized;
        }
        self.cursors.clear();
        self.objects.clear();
        self.names.clear();
        self.database = None;
        self.finalized = true;
        debug!("memory engine finalized");
        ResultCode::Success
    }

    fn encoding(&self) -> Encoding {
        self.encoding
    }

    fn set_encoding(&mut self, encoding: Encoding) {
        self.encoding = encoding;
    }

    fn database_create(&mut self) -> Option<ObjectId> {
        self.clear_error();
        if !self.ensure_live("database_create") {
            return None;
        }
        let exists = self
            .objects
            .values()
            .any(|object| matches!(object.body, Body::Database));
        if exists {
            self.fail(
                ResultCode::OperationNotPermitted,
                "a database already exists on this handle",
                "database_create",
            );
            return None;
        }

        let database = self.insert_object(None, Body::Database);
        for kind in TypeKind::ALL {
            self.insert_object(Some(kind.name().to_string()), Body::Type(kind));
        }
        for name in BUILTIN_TOKENIZERS {
            self.insert_object(Some(name.to_string()), Body::Tokenizer);
        }
        self.database = Some(database);
        debug!(%database, "memory database created");
        Some(database)
    }

    fn attach_database(&mut self, database: Option<ObjectId>) -> ResultCode {
        self.clear_error();
        if !self.ensure_live("attach_database") {
            return ResultCode::Finalized;
        }
        if let Some(id) = database {
            let is_database = matches!(
                self.objects.get(&id).map(|object| &object.body),
                Some(Body::Database)
            );
            if !is_database {
                self.fail(
                    ResultCode::NoSuchObject,
                    format!("not a database: {id}"),
                    "attach_database",
                );
                return ResultCode::NoSuchObject;
            }
        }
        self.database = database;
        ResultCode::Success
    }

    fn database(&self) -> Option<ObjectId> {
        self.database
    }

    fn detach_database(&mut self) -> Option<ObjectId> {
        self.database.take()
    }

    fn resolve(&mut self, target: &NameOrId) -> Option<ObjectId> {
        self.clear_error();
        if !self.ensure_live("resolve") {
            return None;
        }
        self.database?;
        match target {
            NameOrId::Name(name) => self.names.get(name).copied(),
            NameOrId::Id(id) => self.objects.contains_key(id).then_some(*id),
        }
    }

    fn object_info(&mut self, id: ObjectId) -> Option<ObjectInfo> {
        self.clear_error();
        if !self.ensure_live("object_info") {
            return None;
        }
        let object = self.objects.get(&id)?;
        let (kind, domain, range) = match &object.body {
            Body::Database => (ObjectKind::Database, None, None),
            Body::Type(kind) => (ObjectKind::Type(*kind), None, None),
            Body::Tokenizer => (ObjectKind::Tokenizer, None, None),
            Body::Table(data) => (ObjectKind::Table(data.kind), data.key_type, data.value_type),
        };
        Some(ObjectInfo {
            id,
            name: object.name.clone(),
            kind,
            domain,
            range,
        })
    }

    fn object_close(&mut self, id: ObjectId) -> ResultCode {
        self.clear_error();
        if !self.ensure_live("object_close") {
            return ResultCode::Finalized;
        }
        match self.objects.get(&id).map(|object| &object.body) {
            Some(Body::Database) => {
                self.cursors.clear();
                self.objects.clear();
                self.names.clear();
                if self.database == Some(id) {
                    self.database = None;
                }
                debug!(database = %id, "memory database closed");
                ResultCode::Success
            }
            // Other objects belong to the database and live as long as it does.
            Some(_) => ResultCode::Success,
            None => {
                self.fail(
                    ResultCode::NoSuchObject,
                    format!("no such object: {id}"),
                    "object_close",
                );
                ResultCode::NoSuchObject
            }
        }
    }

    fn table_create(&mut self, spec: &TableSpec) -> Option<ObjectId> {
        self.clear_error();
        if !self.ensure_live("table_create") {
            return None;
        }
        if self.database.is_none() {
            self.fail(
                ResultCode::OperationNotPermitted,
                "no database attached",
                "table_create",
            );
            return None;
        }
        if let Some(name) = &spec.name {
            if self.names.contains_key(name) {
                self.fail(
                    ResultCode::InvalidArgument,
                    format!("name already in use: {name}"),
                    "table_create",
                );
                return None;
            }
        }
        if spec.kind == TableKind::NoKey && spec.key_type.is_some() {
            self.fail(
                ResultCode::InvalidArgument,
                "key-less table cannot declare a key type",
                "table_create",
            );
            return None;
        }

        let shapes = self.shape_of(spec.key_type, true).and_then(|key_shape| {
            match spec.value_type {
                Some(_) => self
                    .shape_of(spec.value_type, false)
                    .map(|value_shape| (key_shape, Some(value_shape))),
                None => Ok((key_shape, None)),
            }
        });
        let (key_shape, value_shape) = match shapes {
            Ok(shapes) => shapes,
            Err((code, message)) => {
                self.fail(code, message, "table_create");
                return None;
            }
        };

        let data = TableData {
            kind: spec.kind,
            key_type: spec.key_type,
            value_type: spec.value_type,
            key_shape,
            value_shape,
            encoding: self.encoding,
            tokenizer: None,
            keys: BTreeMap::new(),
            records: BTreeMap::new(),
            next_id: 1,
        };
        let id = self.insert_object(spec.name.clone(), Body::Table(data));
        debug!(table = %id, name = ?spec.name, kind = ?spec.kind, "memory table created");
        Some(id)
    }

    fn table_lookup(&mut self, table: ObjectId, key: &[u8], mode: LookupMode) -> RecordId {
        self.clear_error();
        if !self.ensure_table(table, "table_lookup") {
            return ID_NIL;
        }
        let outcome = match self.table_data_mut(table) {
            Some(data) => data.lookup(key, mode),
            None => return ID_NIL,
        };
        match outcome {
            Ok(id) => id,
            Err((code, message)) => {
                self.fail(code, message, "table_lookup");
                ID_NIL
            }
        }
    }

    fn table_get_key(&mut self, table: ObjectId, id: RecordId, buf: &mut [u8]) -> usize {
        self.clear_error();
        if !self.ensure_table(table, "table_get_key") {
            return 0;
        }
        let Some(record) = self
            .table_data(table)
            .and_then(|data| data.records.get(&id))
        else {
            return 0;
        };
        let size = record.key.len();
        if buf.len() >= size {
            buf[..size].copy_from_slice(&record.key);
        }
        size
    }

    fn table_delete(&mut self, table: ObjectId, key: &[u8]) -> ResultCode {
        self.clear_error();
        if !self.ensure_table(table, "table_delete") {
            return self.last_error.code;
        }
        let outcome = match self.table_data_mut(table) {
            Some(data) => data.delete_key(key),
            None => return ResultCode::NoSuchObject,
        };
        match outcome {
            Ok(()) => ResultCode::Success,
            Err((code, message)) => {
                self.fail(code, message, "table_delete");
                code
            }
        }
    }

    fn table_delete_by_id(&mut self, table: ObjectId, id: RecordId) -> ResultCode {
        self.clear_error();
        if !self.ensure_table(table, "table_delete_by_id") {
            return self.last_error.code;
        }
        let outcome = match self.table_data_mut(table) {
            Some(data) => data.delete_id(id),
            None => return ResultCode::NoSuchObject,
        };
        match outcome {
            Ok(()) => ResultCode::Success,
            Err((code, message)) => {
                self.fail(code, message, "table_delete_by_id");
                code
            }
        }
    }

    fn table_add(&mut self, table: ObjectId) -> RecordId {
        self.clear_error();
        if !self.ensure_table(table, "table_add") {
            return ID_NIL;
        }
        let outcome = match self.table_data_mut(table) {
            Some(data) if data.kind == TableKind::NoKey => Ok(data.insert(Vec::new())),
            Some(_) => Err((
                ResultCode::OperationNotPermitted,
                "keyed table requires a key".to_string(),
            )),
            None => return ID_NIL,
        };
        match outcome {
            Ok(id) => id,
            Err((code, message)) => {
                self.fail(code, message, "table_add");
                ID_NIL
            }
        }
    }

    fn table_at(&mut self, table: ObjectId, id: RecordId) -> RecordId {
        self.clear_error();
        if !self.ensure_table(table, "table_at") {
            return ID_NIL;
        }
        match self.table_data(table) {
            Some(data) if data.records.contains_key(&id) => id,
            _ => ID_NIL,
        }
    }

    fn table_size(&mut self, table: ObjectId) -> usize {
        self.clear_error();
        if !self.ensure_table(table, "table_size") {
            return 0;
        }
        self.table_data(table).map_or(0, |data| data.records.len())
    }

    fn table_info(&mut self, table: ObjectId) -> Option<TableInfo> {
        self.clear_error();
        if !self.ensure_table(table, "table_info") {
            return None;
        }
        self.table_data(table).map(|data| TableInfo {
            encoding: data.encoding,
            default_tokenizer: data.tokenizer,
        })
    }

    fn set_default_tokenizer(
        &mut self,
        table: ObjectId,
        tokenizer: Option<ObjectId>,
    ) -> ResultCode {
        self.clear_error();
        if !self.ensure_table(table, "set_default_tokenizer") {
            return self.last_error.code;
        }
        if let Some(id) = tokenizer {
            let is_tokenizer = matches!(
                self.objects.get(&id).map(|object| &object.body),
                Some(Body::Tokenizer)
            );
            if !is_tokenizer {
                self.fail(
                    ResultCode::InvalidArgument,
                    format!("not a tokenizer: {id}"),
                    "set_default_tokenizer",
                );
                return ResultCode::InvalidArgument;
            }
        }
        if self.table_data(table).map(|data| data.kind) == Some(TableKind::NoKey) {
            self.fail(
                ResultCode::NotSupported,
                "key-less table has no tokenizer",
                "set_default_tokenizer",
            );
            return ResultCode::NotSupported;
        }
        match self.table_data_mut(table) {
            Some(data) => {
                data.tokenizer = tokenizer;
                ResultCode::Success
            }
            None => ResultCode::NoSuchObject,
        }
    }

    fn set_value(
        &mut self,
        table: ObjectId,
        id: RecordId,
        value: &[u8],
        mode: SetMode,
    ) -> ResultCode {
        self.clear_error();
        if !self.ensure_table(table, "set_value") {
            return self.last_error.code;
        }
        let outcome = match self.table_data_mut(table) {
            Some(data) => data.set_value(id, value, mode),
            None => return ResultCode::NoSuchObject,
        };
        match outcome {
            Ok(()) => ResultCode::Success,
            Err((code, message)) => {
                self.fail(code, message, "set_value");
                code
            }
        }
    }

    fn get_value(&mut self, table: ObjectId, id: RecordId) -> Option<Vec<u8>> {
        self.clear_error();
        if !self.ensure_table(table, "get_value") {
            return None;
        }
        let data = self.table_data(table)?;
        data.value_shape?;
        data.records.get(&id).map(|record| record.value.clone())
    }

    fn cursor_open(&mut self, table: ObjectId) -> Option<CursorId> {
        self.clear_error();
        if !self.ensure_table(table, "cursor_open") {
            return None;
        }
        let ids = self.table_data(table).map(TableData::ordered_ids)?;
        let cursor = CursorId(self.next_cursor);
        self.next_cursor += 1;
        self.cursors.insert(
            cursor,
            CursorState {
                table,
                ids,
                position: 0,
                current: ID_NIL,
            },
        );
        Some(cursor)
    }

    fn cursor_next(&mut self, cursor: CursorId) -> RecordId {
        self.clear_error();
        if !self.ensure_live("cursor_next") {
            return ID_NIL;
        }
        loop {
            let (table, id) = match self.cursors.get_mut(&cursor) {
                Some(state) if state.position < state.ids.len() => {
                    let id = state.ids[state.position];
                    state.position += 1;
                    (state.table, id)
                }
                Some(state) => {
                    state.current = ID_NIL;
                    return ID_NIL;
                }
                None => {
                    self.fail(
                        ResultCode::NoSuchObject,
                        format!("no such cursor: {}", cursor.0),
                        "cursor_next",
                    );
                    return ID_NIL;
                }
            };
            // Records deleted after the cursor opened are skipped.
            let alive = self
                .table_data(table)
                .is_some_and(|data| data.records.contains_key(&id));
            if alive {
                if let Some(state) = self.cursors.get_mut(&cursor) {
                    state.current = id;
                }
                return id;
            }
        }
    }

    fn cursor_get_key(&mut self, cursor: CursorId) -> Option<Vec<u8>> {
        self.clear_error();
        if !self.ensure_live("cursor_get_key") {
            return None;
        }
        let position = self
            .cursors
            .get(&cursor)
            .map(|state| (state.table, state.current));
        let Some((table, current)) = position else {
            self.fail(
                ResultCode::NoSuchObject,
                format!("no such cursor: {}", cursor.0),
                "cursor_get_key",
            );
            return None;
        };
        if current == ID_NIL {
            return None;
        }
        self.table_data(table)
            .and_then(|data| data.records.get(&current))
            .map(|record| record.key.clone())
    }

    fn cursor_table(&mut self, cursor: CursorId) -> Option<ObjectId> {
        self.cursors.get(&cursor).map(|state| state.table)
    }

    fn cursor_close(&mut self, cursor: CursorId) -> ResultCode {
        self.clear_error();
        if !self.ensure_live("cursor_close") {
            return ResultCode::Finalized;
        }
        if self.cursors.remove(&cursor).is_some() {
            ResultCode::Success
        } else {
            self.fail(
                ResultCode::NoSuchObject,
                format!("no such cursor: {}", cursor.0),
                "cursor_close",
            );
            ResultCode::NoSuchObject
        }
    }
}

/// Provider that initializes [`MemoryEngine`] handles.
#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryProvider;

impl EngineProvider for MemoryProvider {
    fn init(&self, flags: InitFlags) -> Result<Box<dyn Engine>, Diagnostic> {
        Ok(Box::new(MemoryEngine::with_flags(flags)))
    }
}
