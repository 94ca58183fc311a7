use crate::{
    db::{
        cursor::{Cursor, CursorKind, CursorSource, schedule_open},
        direction::Direction,
        schema::{IndexId, IndexModel, StoreId},
        transaction::{Reply, TaskContext, Transaction, reply_channel},
    },
    error::InternalError,
    key::{Key, KeyRange},
    value::Payload,
};

///
/// Index
///
/// Handle to a secondary index. Entries are ordered by index key, then by
/// insertion; several objects may share an index key unless the index is
/// unique.
///

#[derive(Clone, Debug)]
pub struct Index {
    txn: Transaction,
    id: IndexId,
    store: StoreId,
}

impl Index {
    pub(crate) const fn new(txn: Transaction, id: IndexId, store: StoreId) -> Self {
        Self { txn, id, store }
    }

    fn model(&self) -> &IndexModel {
        self.txn.schema().index(self.id)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.model().name
    }

    #[must_use]
    pub fn key_path(&self) -> &str {
        &self.model().key_path
    }

    #[must_use]
    pub fn is_unique(&self) -> bool {
        self.model().unique
    }

    /// Cursor yielding the payload of each referenced object.
    pub fn open_cursor(
        &self,
        range: KeyRange,
        direction: Direction,
    ) -> Result<Reply<Option<Cursor>>, InternalError> {
        self.open(CursorKind::Value, range, direction)
    }

    /// Cursor yielding the key of each referenced object.
    pub fn open_key_cursor(
        &self,
        range: KeyRange,
        direction: Direction,
    ) -> Result<Reply<Option<Cursor>>, InternalError> {
        self.open(CursorKind::Reference, range, direction)
    }

    fn open(
        &self,
        kind: CursorKind,
        range: KeyRange,
        direction: Direction,
    ) -> Result<Reply<Option<Cursor>>, InternalError> {
        let source = CursorSource::Index {
            index: self.id,
            store: self.store,
        };

        schedule_open(&self.txn, source, kind, range, direction)
    }

    /// Payload of the first object stored under `key`.
    pub fn get(&self, key: Key) -> Result<Reply<Option<Payload>>, InternalError> {
        let (index, store) = (self.id, self.store);
        let (responder, reply) = reply_channel(self.txn.downgrade());
        self.txn.schedule(
            "index get",
            Box::new(move |cx: &mut TaskContext<'_>| {
                let payload = cx
                    .store
                    .first_index_entry(index, &key)
                    .and_then(|primary| cx.store.get_object(store, primary))
                    .cloned();
                responder.send(Ok(payload));

                Ok(())
            }),
        )?;

        Ok(reply)
    }

    /// Key of the first object stored under `key`.
    pub fn get_key(&self, key: Key) -> Result<Reply<Option<Key>>, InternalError> {
        let index = self.id;
        let (responder, reply) = reply_channel(self.txn.downgrade());
        self.txn.schedule(
            "index get key",
            Box::new(move |cx: &mut TaskContext<'_>| {
                responder.send(Ok(cx.store.first_index_entry(index, &key).cloned()));
                Ok(())
            }),
        )?;

        Ok(reply)
    }
}
