use crate::{
    db::{
        direction::Direction,
        schema::{IndexId, StoreId},
        store::{BackingQuery, QuerySource, RowId, Table},
    },
    key::{Key, KeyRange},
    value::Payload,
};

///
/// CursorSource
/// The container a cursor iterates, and the object store its writes go to.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum CursorSource {
    ObjectStore(StoreId),
    Index { index: IndexId, store: StoreId },
}

impl CursorSource {
    pub(crate) const fn query_source(self) -> QuerySource {
        match self {
            Self::ObjectStore(store) => QuerySource::ObjectStore(store),
            Self::Index { index, .. } => QuerySource::Index(index),
        }
    }

    /// Authoritative table for the tombstone check.
    pub(crate) const fn table(self) -> Table {
        self.query_source().table()
    }

    pub(crate) const fn owning_store(self) -> StoreId {
        match self {
            Self::ObjectStore(store) | Self::Index { store, .. } => store,
        }
    }
}

///
/// CursorKind
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CursorKind {
    /// Yields the stored payload.
    Value,
    /// Yields the key of the referenced object.
    Reference,
}

///
/// CursorValue
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CursorValue {
    Payload(Payload),
    Reference(Key),
}

///
/// Position
///

#[derive(Clone, Debug)]
pub(crate) struct Position {
    pub row_id: RowId,
    pub key: Key,
    pub referenced_key: Option<Key>,
    pub payload: Option<Payload>,
}

///
/// CursorState
///
/// A positioned cursor always has both a row id and a key; an exhausted one
/// has neither. `Exhausted` is terminal.
///

#[derive(Clone, Debug)]
pub(crate) enum CursorState {
    Positioned(Position),
    Exhausted,
}

///
/// CursorCore
///
/// Per-cursor state owned by the transaction's cursor registry. The backing
/// query is stepped only by the advance loop and is dropped for good at
/// exhaustion.
///

pub(crate) struct CursorCore {
    pub(super) query: Option<Box<dyn BackingQuery>>,
    pub(super) direction: Direction,
    pub(super) range: KeyRange,
    pub(super) source: CursorSource,
    pub(super) kind: CursorKind,
    pub(super) state: CursorState,
}

impl CursorCore {
    pub(crate) const fn position(&self) -> Option<&Position> {
        match &self.state {
            CursorState::Positioned(position) => Some(position),
            CursorState::Exhausted => None,
        }
    }

    pub(crate) fn key(&self) -> Option<&Key> {
        self.position().map(|p| &p.key)
    }

    pub(crate) fn row_id(&self) -> Option<RowId> {
        self.position().map(|p| p.row_id)
    }

    pub(crate) fn primary_key(&self) -> Option<&Key> {
        self.position()
            .map(|p| p.referenced_key.as_ref().unwrap_or(&p.key))
    }

    pub(crate) fn value(&self) -> Option<CursorValue> {
        let position = self.position()?;

        match self.kind {
            CursorKind::Value => position.payload.clone().map(CursorValue::Payload),
            CursorKind::Reference => position
                .referenced_key
                .clone()
                .map(CursorValue::Reference),
        }
    }

    pub(crate) const fn range(&self) -> &KeyRange {
        &self.range
    }

    pub(crate) const fn has_query(&self) -> bool {
        self.query.is_some()
    }

    /// Release the backing query and clear the position.
    pub(crate) fn exhaust(&mut self) {
        self.query = None;
        self.state = CursorState::Exhausted;
    }
}
