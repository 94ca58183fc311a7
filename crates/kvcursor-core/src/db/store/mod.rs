//! Backing-store boundary.
//!
//! The cursor engine reads rows only through [`BackingStore`] and
//! [`BackingQuery`]. [`MemoryStore`] is the ordered in-memory implementation
//! used by [`Database`](crate::db::Database).

mod memory;

pub use memory::MemoryStore;

use crate::{
    db::{
        direction::Direction,
        schema::{IndexId, StoreId},
    },
    error::InternalError,
    key::{Key, KeyRange},
    value::Payload,
};
use std::fmt;

///
/// RowId
///
/// Opaque row identifier, unique across both tables of one store and never
/// reused. Zero is never allocated.
///

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct RowId(u64);

impl RowId {
    pub(crate) const MIN: Self = Self(0);
    pub(crate) const MAX: Self = Self(u64::MAX);

    pub(crate) const fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

///
/// Table
/// The authoritative table a row id belongs to.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Table {
    ObjectData,
    IndexData,
}

///
/// QuerySource
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum QuerySource {
    ObjectStore(StoreId),
    Index(IndexId),
}

impl QuerySource {
    #[must_use]
    pub const fn table(self) -> Table {
        match self {
            Self::ObjectStore(_) => Table::ObjectData,
            Self::Index(_) => Table::IndexData,
        }
    }
}

///
/// Row
///
/// One physical row produced by a backing query. Index rows carry the key of
/// the object they reference. Payloads are not part of the row; they are
/// loaded on demand through [`BackingStore::load_payload`].
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Row {
    pub id: RowId,
    pub key: Key,
    pub referenced_key: Option<Key>,
}

///
/// BackingQuery
///
/// Forward-only producer of ordered rows for one prepared range.
/// `Ok(None)` means end of results.
///

pub trait BackingQuery {
    fn step(&mut self) -> Result<Option<Row>, InternalError>;
}

///
/// BackingStore
///

pub trait BackingStore {
    /// Prepare a range query. Rows come back in `direction` order.
    fn prepare_range_query(
        &self,
        source: QuerySource,
        range: &KeyRange,
        direction: Direction,
    ) -> Result<Box<dyn BackingQuery>, InternalError>;

    /// Point existence check against the authoritative table.
    fn exists(&self, table: Table, row_id: RowId) -> Result<bool, InternalError>;

    /// Current payload behind a row. Index rows resolve through the object
    /// they reference. `Ok(None)` when the row no longer exists.
    fn load_payload(&self, table: Table, row_id: RowId) -> Result<Option<Payload>, InternalError>;
}
