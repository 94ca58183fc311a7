//! Object store handles and the write path shared with cursors.

use crate::{
    db::{
        cursor::{Cursor, CursorKind, CursorSource, schedule_open},
        direction::Direction,
        index::Index,
        schema::{IndexId, ObjectStoreModel, StoreId},
        store::MemoryStore,
        transaction::{Reply, TaskContext, Transaction, reply_channel},
    },
    error::{ErrorClass, ErrorOrigin, InternalError},
    key::{Key, KeyRange},
    value::Payload,
};
use thiserror::Error as ThisError;

///
/// PutMode
/// Provenance of a write. Cursor updates may not change the key.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum PutMode {
    AddOnly,
    AddOrUpdate,
    CursorUpdate,
}

///
/// WriteError
///

#[derive(Debug, ThisError)]
pub enum WriteError {
    #[error("payload of {len} bytes exceeds the {max} byte limit")]
    PayloadTooLarge { len: usize, max: usize },

    #[error("object store '{store}' has a key path; an explicit key is not allowed")]
    ExplicitKey { store: String },

    #[error("object store '{store}' has no key path; a key is required")]
    MissingKey { store: String },

    #[error("key path '{path}' does not yield a valid key")]
    KeyPathMiss { path: String },

    #[error("cursor update may not change the key from {expected} to {found}")]
    KeyChanged { expected: Key, found: Key },

    #[error("key {key} already exists in object store '{store}'")]
    KeyExists { store: String, key: Key },

    #[error("unique index '{index}' already holds key {key}")]
    UniqueViolation { index: String, key: Key },

    #[error("key {key} not found in object store '{store}'")]
    NotFound { store: String, key: Key },
}

impl From<WriteError> for InternalError {
    fn from(err: WriteError) -> Self {
        let (class, origin) = match err {
            WriteError::PayloadTooLarge { .. }
            | WriteError::ExplicitKey { .. }
            | WriteError::MissingKey { .. }
            | WriteError::KeyPathMiss { .. }
            | WriteError::KeyChanged { .. } => (ErrorClass::Data, ErrorOrigin::Store),
            WriteError::KeyExists { .. } => (ErrorClass::Constraint, ErrorOrigin::Store),
            WriteError::UniqueViolation { .. } => (ErrorClass::Constraint, ErrorOrigin::Index),
            WriteError::NotFound { .. } => (ErrorClass::NotFound, ErrorOrigin::Store),
        };

        Self::new(class, origin, err.to_string())
    }
}

///
/// IndexEntry
/// One index row to write alongside an object.
///

struct IndexEntry {
    index: IndexId,
    name: String,
    key: Key,
    unique: bool,
}

///
/// ObjectStore
///

#[derive(Clone, Debug)]
pub struct ObjectStore {
    txn: Transaction,
    id: StoreId,
}

impl ObjectStore {
    pub(crate) const fn new(txn: Transaction, id: StoreId) -> Self {
        Self { txn, id }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.model().name
    }

    #[must_use]
    pub fn key_path(&self) -> Option<&str> {
        self.model().key_path.as_deref()
    }

    fn model(&self) -> &ObjectStoreModel {
        self.txn.schema().store(self.id)
    }

    /// Handle to an index registered on this store.
    pub fn index(&self, name: &str) -> Result<Index, InternalError> {
        let id = self.txn.schema().index_id(self.id, name)?;

        Ok(Index::new(self.txn.clone(), id, self.id))
    }

    // ─────────────────────────────────────────────
    // Writes
    // ─────────────────────────────────────────────

    /// Insert or overwrite. The reply carries the key written.
    pub fn put(&self, payload: Payload, key: Option<Key>) -> Result<Reply<Key>, InternalError> {
        self.put_with_mode(payload, key, PutMode::AddOrUpdate)
    }

    /// Insert; the reply fails with `Constraint` if the key already exists.
    pub fn add(&self, payload: Payload, key: Option<Key>) -> Result<Reply<Key>, InternalError> {
        self.put_with_mode(payload, key, PutMode::AddOnly)
    }

    /// Validate a write now and schedule it.
    ///
    /// Problems visible without the store (read-only transaction, payload
    /// size, key resolution, undecodable index fields) fail synchronously.
    /// Conflicts found when the write runs are delivered through the reply.
    pub(crate) fn put_with_mode(
        &self,
        payload: Payload,
        key: Option<Key>,
        mode: PutMode,
    ) -> Result<Reply<Key>, InternalError> {
        self.txn.ensure_writable()?;

        let max = self.txn.config().max_payload_bytes;
        if payload.len() > max {
            return Err(WriteError::PayloadTooLarge {
                len: payload.len(),
                max,
            }
            .into());
        }

        let key = resolve_key(self.model(), &payload, key, mode)?;
        let entries = self.index_entries(&payload)?;

        let store = self.id;
        let (responder, reply) = reply_channel(self.txn.downgrade());
        self.txn.schedule(
            "put",
            Box::new(move |cx: &mut TaskContext<'_>| {
                responder.send(write_object(cx, store, key, payload, &entries, mode));
                Ok(())
            }),
        )?;

        Ok(reply)
    }

    /// Delete by key; the reply fails with `NotFound` if nothing was there.
    pub fn delete(&self, key: Key) -> Result<Reply<()>, InternalError> {
        self.txn.ensure_writable()?;

        let store = self.id;
        let (responder, reply) = reply_channel(self.txn.downgrade());
        self.txn.schedule(
            "delete",
            Box::new(move |cx: &mut TaskContext<'_>| {
                let result = match cx.store.delete_object(store, &key) {
                    Some(row_id) => {
                        cx.log.log(format!("deleted key {key} (row {row_id})"));
                        Ok(())
                    }
                    None => Err(WriteError::NotFound {
                        store: cx.schema.store(store).name.clone(),
                        key,
                    }
                    .into()),
                };
                responder.send(result);

                Ok(())
            }),
        )?;

        Ok(reply)
    }

    fn index_entries(&self, payload: &Payload) -> Result<Vec<IndexEntry>, InternalError> {
        let mut entries = Vec::new();
        for (index, model) in self.txn.schema().indexes_for(self.id) {
            if let Some(key) = payload.key_at_path(&model.key_path)? {
                entries.push(IndexEntry {
                    index,
                    name: model.name.clone(),
                    key,
                    unique: model.unique,
                });
            }
        }

        Ok(entries)
    }

    // ─────────────────────────────────────────────
    // Reads
    // ─────────────────────────────────────────────

    pub fn get(&self, key: Key) -> Result<Reply<Option<Payload>>, InternalError> {
        let store = self.id;
        let (responder, reply) = reply_channel(self.txn.downgrade());
        self.txn.schedule(
            "get",
            Box::new(move |cx: &mut TaskContext<'_>| {
                responder.send(Ok(cx.store.get_object(store, &key).cloned()));
                Ok(())
            }),
        )?;

        Ok(reply)
    }

    /// Number of objects, counted when the task runs.
    pub fn count(&self) -> Result<Reply<usize>, InternalError> {
        let store = self.id;
        let (responder, reply) = reply_channel(self.txn.downgrade());
        self.txn.schedule(
            "count",
            Box::new(move |cx: &mut TaskContext<'_>| {
                responder.send(Ok(cx.store.object_count(store)));
                Ok(())
            }),
        )?;

        Ok(reply)
    }

    pub fn open_cursor(
        &self,
        range: KeyRange,
        direction: Direction,
    ) -> Result<Reply<Option<Cursor>>, InternalError> {
        schedule_open(
            &self.txn,
            CursorSource::ObjectStore(self.id),
            CursorKind::Value,
            range,
            direction,
        )
    }
}

// Key resolution rules:
// with a key path the key comes from the payload and an explicit key is
// refused, except for cursor updates where the two must agree;
// without a key path the caller must supply the key.
fn resolve_key(
    model: &ObjectStoreModel,
    payload: &Payload,
    explicit: Option<Key>,
    mode: PutMode,
) -> Result<Key, InternalError> {
    let Some(path) = &model.key_path else {
        return explicit.ok_or_else(|| {
            WriteError::MissingKey {
                store: model.name.clone(),
            }
            .into()
        });
    };

    let extracted = payload
        .key_at_path(path)?
        .ok_or_else(|| WriteError::KeyPathMiss { path: path.clone() })?;

    match (mode, explicit) {
        (PutMode::CursorUpdate, Some(expected)) if expected != extracted => {
            Err(WriteError::KeyChanged {
                expected,
                found: extracted,
            }
            .into())
        }
        (PutMode::CursorUpdate, _) | (_, None) => Ok(extracted),
        (_, Some(_)) => Err(WriteError::ExplicitKey {
            store: model.name.clone(),
        }
        .into()),
    }
}

fn write_object(
    cx: &mut TaskContext<'_>,
    store: StoreId,
    key: Key,
    payload: Payload,
    entries: &[IndexEntry],
    mode: PutMode,
) -> Result<Key, InternalError> {
    if mode == PutMode::AddOnly && cx.store.contains_object(store, &key) {
        return Err(WriteError::KeyExists {
            store: cx.schema.store(store).name.clone(),
            key,
        }
        .into());
    }
    check_unique(&*cx.store, entries, &key)?;

    let row_id = cx.store.put_object(store, key.clone(), payload);
    for entry in entries {
        cx.store
            .insert_index_entry(entry.index, entry.key.clone(), row_id, key.clone());
    }
    cx.log.log(format!(
        "wrote key {key} (row {row_id}, {} index entries)",
        entries.len()
    ));

    Ok(key)
}

fn check_unique(store: &MemoryStore, entries: &[IndexEntry], key: &Key) -> Result<(), WriteError> {
    for entry in entries.iter().filter(|entry| entry.unique) {
        if store.index_key_taken(entry.index, &entry.key, key) {
            return Err(WriteError::UniqueViolation {
                index: entry.name.clone(),
                key: entry.key.clone(),
            });
        }
    }

    Ok(())
}
