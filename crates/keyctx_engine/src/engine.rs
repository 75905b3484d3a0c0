//! Engine trait definition.

use crate::error::{Diagnostic, ResultCode};
use crate::types::{
    CursorId, Encoding, InitFlags, LookupMode, NameOrId, ObjectId, ObjectInfo, RecordId, SetMode,
    TableInfo, TableSpec,
};

/// One embedded engine handle.
///
/// The surface is deliberately C-shaped: calls return plain ids, sizes or
/// [`ResultCode`]s, and a failing call leaves the details in
/// [`Engine::last_error`] until the next fallible call overwrites it. Callers
/// must read the last error immediately after the call that failed.
///
/// # Invariants
///
/// - Every fallible call clears the last error before doing any work
/// - A nil id ([`crate::ID_NIL`]) or `None` return with a cleared last error
///   means "not found", not "failed"
/// - After [`Engine::finalize`] the handle is never used again
///
/// # Implementors
///
/// - [`crate::MemoryEngine`] - Reference engine
pub trait Engine: Send {
    /// Returns the diagnostic left by the most recent fallible call.
    fn last_error(&self) -> &Diagnostic;

    /// Releases every resource held by the handle.
    fn finalize(&mut self) -> ResultCode;

    /// Returns the handle's character encoding.
    fn encoding(&self) -> Encoding;

    /// Sets the handle's character encoding.
    fn set_encoding(&mut self, encoding: Encoding);

    /// Creates a new database object and attaches it to the handle.
    fn database_create(&mut self) -> Option<ObjectId>;

    /// Attaches `database` to the handle, or detaches with `None`.
    fn attach_database(&mut self, database: Option<ObjectId>) -> ResultCode;

    /// Returns the attached database, if any.
    fn database(&self) -> Option<ObjectId>;

    /// Detaches and returns the attached database.
    fn detach_database(&mut self) -> Option<ObjectId>;

    /// Resolves a name or id in the attached database's namespace.
    fn resolve(&mut self, target: &NameOrId) -> Option<ObjectId>;

    /// Describes a namespace object.
    fn object_info(&mut self, id: ObjectId) -> Option<ObjectInfo>;

    /// Closes an object. Closing the attached database releases its namespace.
    fn object_close(&mut self, id: ObjectId) -> ResultCode;

    /// Creates a table in the attached database.
    fn table_create(&mut self, spec: &TableSpec) -> Option<ObjectId>;

    /// Looks up `key` in `table`, optionally creating the record.
    fn table_lookup(&mut self, table: ObjectId, key: &[u8], mode: LookupMode) -> RecordId;

    /// Copies the key of record `id` into `buf` if it fits.
    ///
    /// Returns the key size; zero means the record does not exist or has no
    /// key. Pass an empty buffer to probe the size.
    fn table_get_key(&mut self, table: ObjectId, id: RecordId, buf: &mut [u8]) -> usize;

    /// Deletes the record keyed by `key`.
    fn table_delete(&mut self, table: ObjectId, key: &[u8]) -> ResultCode;

    /// Deletes record `id`.
    fn table_delete_by_id(&mut self, table: ObjectId, id: RecordId) -> ResultCode;

    /// Appends a record to a key-less table.
    fn table_add(&mut self, table: ObjectId) -> RecordId;

    /// Returns `id` if the record exists, nil otherwise.
    fn table_at(&mut self, table: ObjectId, id: RecordId) -> RecordId;

    /// Returns the number of records in `table`.
    fn table_size(&mut self, table: ObjectId) -> usize;

    /// Returns table-level metadata.
    fn table_info(&mut self, table: ObjectId) -> Option<TableInfo>;

    /// Sets or clears the table's default tokenizer.
    fn set_default_tokenizer(
        &mut self,
        table: ObjectId,
        tokenizer: Option<ObjectId>,
    ) -> ResultCode;

    /// Writes the value of record `id`.
    fn set_value(&mut self, table: ObjectId, id: RecordId, value: &[u8], mode: SetMode)
        -> ResultCode;

    /// Reads the value of record `id`.
    fn get_value(&mut self, table: ObjectId, id: RecordId) -> Option<Vec<u8>>;

    /// Opens a cursor over every record in `table`.
    fn cursor_open(&mut self, table: ObjectId) -> Option<CursorId>;

    /// Advances the cursor; nil at the end.
    fn cursor_next(&mut self, cursor: CursorId) -> RecordId;

    /// Returns the raw key at the cursor's current position.
    fn cursor_get_key(&mut self, cursor: CursorId) -> Option<Vec<u8>>;

    /// Returns the table a cursor walks.
    fn cursor_table(&mut self, cursor: CursorId) -> Option<ObjectId>;

    /// Closes a cursor.
    fn cursor_close(&mut self, cursor: CursorId) -> ResultCode;
}

/// Creates engine handles.
///
/// This is the `init(flags)` half of the engine lifecycle; `finalize` lives on
/// the handle.
pub trait EngineProvider: Send + Sync {
    /// Initializes a fresh engine handle.
    ///
    /// # Errors
    ///
    /// Returns the engine's diagnostic if initialization fails.
    fn init(&self, flags: InitFlags) -> Result<Box<dyn Engine>, Diagnostic>;
}
