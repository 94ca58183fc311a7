//! Cursors over object stores and indexes.
//!
//! A [`Cursor`] is a handle: its state lives in the owning transaction's
//! registry and is released when the transaction commits or aborts. Reads
//! on a released or exhausted cursor return `None`.
//!
//! `continue_to` is scheduled on the transaction directly. `update` and
//! `delete` are validated here, synchronously, and then handed to the object
//! store's own write path, which schedules the write on the same queue. So
//! all three run in submission order, but only `continue_to` is a cursor
//! task; a write's reply comes from the object store.

mod advance;
mod mutation;
mod registry;
mod state;
#[cfg(test)]
mod tests;

pub use advance::SkipReason;
pub use state::{CursorKind, CursorValue};

pub(crate) use registry::{CursorId, CursorRegistry};
pub(crate) use state::{CursorCore, CursorSource, CursorState, Position};

use crate::{
    db::{
        direction::Direction,
        object_store::{ObjectStore, PutMode},
        store::RowId,
        transaction::{Reply, TaskContext, Transaction, TransactionInner, reply_channel},
    },
    error::InternalError,
    key::{Key, KeyRange},
    obs::sink::{self, MetricsEvent, MutationKind},
    value::Payload,
};
use advance::Advance;
use std::rc::Weak;
use thiserror::Error as ThisError;

///
/// CursorError
///

#[derive(Debug, ThisError)]
pub enum CursorError {
    #[error("cursor is exhausted")]
    Exhausted,

    #[error("cursor has no current position")]
    NoPosition,

    #[error("cursor yields references and cannot write")]
    NotValueCursor,

    #[error("cursor's transaction no longer exists")]
    TransactionGone,
}

impl From<CursorError> for InternalError {
    fn from(err: CursorError) -> Self {
        Self::cursor_not_allowed(err.to_string())
    }
}

///
/// Cursor
///

#[derive(Clone, Debug)]
pub struct Cursor {
    id: CursorId,
    direction: Direction,
    kind: CursorKind,
    txn: Weak<TransactionInner>,
}

impl Cursor {
    #[must_use]
    pub const fn direction(&self) -> Direction {
        self.direction
    }

    #[must_use]
    pub const fn is_value_cursor(&self) -> bool {
        matches!(self.kind, CursorKind::Value)
    }

    /// Key of the current row.
    #[must_use]
    pub fn key(&self) -> Option<Key> {
        self.read(|core| core.key().cloned()).flatten()
    }

    #[must_use]
    pub fn row_id(&self) -> Option<RowId> {
        self.read(CursorCore::row_id).flatten()
    }

    /// Key of the object behind the current row: the referenced key for
    /// index cursors, the current key otherwise.
    #[must_use]
    pub fn primary_key(&self) -> Option<Key> {
        self.read(|core| core.primary_key().cloned()).flatten()
    }

    /// Payload for value cursors, referenced key for key cursors.
    #[must_use]
    pub fn value(&self) -> Option<CursorValue> {
        self.read(CursorCore::value).flatten()
    }

    #[must_use]
    pub fn key_range(&self) -> Option<KeyRange> {
        self.read(|core| core.range().clone())
    }

    /// True once the cursor has run past its last row or was released.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.read(|core| !core.has_query()).unwrap_or(true)
    }

    /// Schedule an advance to the next accepted row, or to the next live row
    /// whose key equals `target`.
    ///
    /// The reply carries this cursor when it lands on a row and `None` when
    /// it runs out. Fails with `NotAllowed` before anything is scheduled if
    /// the cursor is exhausted or the transaction refuses new work.
    ///
    /// Exhaustion is only observed when a queued advance runs, so several
    /// continues queued from the last row are all accepted and every one of
    /// them resolves to `None`.
    pub fn continue_to(&self, target: Option<Key>) -> Result<Reply<Option<Self>>, InternalError> {
        let txn = self.transaction()?;
        if !txn.with_cursor(self.id, CursorCore::has_query).unwrap_or(false) {
            return Err(CursorError::Exhausted.into());
        }

        let (responder, reply) = reply_channel(txn.downgrade());
        let cursor = self.clone();
        txn.schedule(
            "continue",
            Box::new(move |cx: &mut TaskContext<'_>| {
                let outcome = match cx.cursors.get_mut(cursor.id) {
                    Some(core) => advance::advance(core, &*cx.store, target.as_ref(), cx.log),
                    None => Err(CursorError::Exhausted.into()),
                };

                responder.deliver(outcome.map(|step| match step {
                    Advance::Positioned => Some(cursor),
                    Advance::Exhausted => None,
                }))
            }),
        )?;

        Ok(reply)
    }

    /// Replace the object behind the current row.
    ///
    /// The reply carries the key written. For object stores with a key path,
    /// the payload must keep the same key.
    pub fn update(&self, payload: Payload) -> Result<Reply<Key>, InternalError> {
        let txn = self.transaction()?;
        let target = self.write_target(&txn)?;

        sink::record(MetricsEvent::MutationRouted {
            kind: MutationKind::Update,
        });
        txn.log().log(format!("cursor update routed to key {}", target.key));

        ObjectStore::new(txn, target.store).put_with_mode(
            payload,
            Some(target.key),
            PutMode::CursorUpdate,
        )
    }

    /// Delete the object behind the current row.
    pub fn delete(&self) -> Result<Reply<()>, InternalError> {
        let txn = self.transaction()?;
        let target = self.write_target(&txn)?;

        sink::record(MetricsEvent::MutationRouted {
            kind: MutationKind::Delete,
        });
        txn.log().log(format!("cursor delete routed to key {}", target.key));

        ObjectStore::new(txn, target.store).delete(target.key)
    }

    fn write_target(&self, txn: &Transaction) -> Result<mutation::WriteTarget, CursorError> {
        txn.with_cursor(self.id, mutation::write_target)
            .unwrap_or(Err(CursorError::Exhausted))
    }

    fn transaction(&self) -> Result<Transaction, CursorError> {
        self.txn
            .upgrade()
            .map(Transaction::from_inner)
            .ok_or(CursorError::TransactionGone)
    }

    fn read<R>(&self, f: impl FnOnce(&CursorCore) -> R) -> Option<R> {
        self.transaction().ok()?.with_cursor(self.id, f)
    }
}

/// Schedule opening a cursor. The reply carries `None` when the range holds
/// no live rows.
pub(crate) fn schedule_open(
    txn: &Transaction,
    source: CursorSource,
    kind: CursorKind,
    range: KeyRange,
    direction: Direction,
) -> Result<Reply<Option<Cursor>>, InternalError> {
    let (responder, reply) = reply_channel(txn.downgrade());
    let weak = txn.downgrade();

    txn.schedule(
        "open cursor",
        Box::new(move |cx: &mut TaskContext<'_>| {
            let opened = CursorCore::open(source, kind, range, direction, &*cx.store, cx.log);

            responder.deliver(opened.map(|core| {
                core.map(|core| Cursor {
                    id: cx.cursors.insert(core),
                    direction,
                    kind,
                    txn: weak,
                })
            }))
        }),
    )?;

    Ok(reply)
}
