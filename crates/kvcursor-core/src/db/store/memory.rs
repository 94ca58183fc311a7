use crate::{
    db::{
        direction::Direction,
        schema::{IndexId, StoreId},
        store::{BackingQuery, BackingStore, QuerySource, Row, RowId, Table},
    },
    error::InternalError,
    key::{Key, KeyRange},
    value::Payload,
};
use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    ops::Bound,
    vec,
};

///
/// IndexRow
///

#[derive(Clone, Debug)]
struct IndexRow {
    index: IndexId,
    key: Key,
    object_row: RowId,
    referenced_key: Key,
}

///
/// MemoryStore
///
/// Ordered in-memory store with two authoritative tables (object data and
/// index data) plus per-store and per-index ordering maps.
///
/// Range queries snapshot rows at prepare time, so a row deleted afterwards
/// is still produced by an open query; readers detect that through
/// [`BackingStore::exists`].
///

#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    last_row_id: u64,
    object_data: BTreeMap<RowId, Payload>,
    object_keys: HashMap<StoreId, BTreeMap<Key, RowId>>,
    index_data: BTreeMap<RowId, IndexRow>,
    index_keys: HashMap<IndexId, BTreeSet<(Key, RowId)>>,
    object_index_rows: HashMap<RowId, Vec<RowId>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    const fn allocate_row_id(&mut self) -> RowId {
        self.last_row_id += 1;
        RowId::new(self.last_row_id)
    }

    //
    // Object data
    //

    #[must_use]
    pub fn contains_object(&self, store: StoreId, key: &Key) -> bool {
        self.object_keys
            .get(&store)
            .is_some_and(|keys| keys.contains_key(key))
    }

    #[must_use]
    pub fn get_object(&self, store: StoreId, key: &Key) -> Option<&Payload> {
        let row_id = self.object_keys.get(&store)?.get(key)?;

        self.object_data.get(row_id)
    }

    #[must_use]
    pub fn object_count(&self, store: StoreId) -> usize {
        self.object_keys.get(&store).map_or(0, BTreeMap::len)
    }

    /// Insert or overwrite an object.
    ///
    /// An overwrite keeps the object's row id and drops its index rows; the
    /// caller re-adds index rows for the new payload.
    pub fn put_object(&mut self, store: StoreId, key: Key, payload: Payload) -> RowId {
        let existing = self
            .object_keys
            .get(&store)
            .and_then(|keys| keys.get(&key))
            .copied();

        let row_id = match existing {
            Some(row_id) => {
                self.remove_index_rows_for(row_id);
                row_id
            }
            None => {
                let row_id = self.allocate_row_id();
                self.object_keys
                    .entry(store)
                    .or_default()
                    .insert(key.clone(), row_id);
                row_id
            }
        };

        self.object_data.insert(row_id, payload);

        row_id
    }

    /// Delete an object and every index row that references it.
    pub fn delete_object(&mut self, store: StoreId, key: &Key) -> Option<RowId> {
        let row_id = self.object_keys.get_mut(&store)?.remove(key)?;
        self.object_data.remove(&row_id);
        self.remove_index_rows_for(row_id);

        Some(row_id)
    }

    //
    // Index data
    //

    pub fn insert_index_entry(
        &mut self,
        index: IndexId,
        key: Key,
        object_row: RowId,
        referenced_key: Key,
    ) -> RowId {
        let row_id = self.allocate_row_id();
        self.index_keys
            .entry(index)
            .or_default()
            .insert((key.clone(), row_id));
        self.index_data.insert(
            row_id,
            IndexRow {
                index,
                key,
                object_row,
                referenced_key,
            },
        );
        self.object_index_rows
            .entry(object_row)
            .or_default()
            .push(row_id);

        row_id
    }

    /// True when `index` holds `key` for an object other than `referenced_key`.
    #[must_use]
    pub fn index_key_taken(&self, index: IndexId, key: &Key, referenced_key: &Key) -> bool {
        self.index_rows_at(index, key)
            .any(|row| row.referenced_key != *referenced_key)
    }

    /// Referenced key of the first entry stored under `key`.
    #[must_use]
    pub fn first_index_entry(&self, index: IndexId, key: &Key) -> Option<&Key> {
        self.index_rows_at(index, key)
            .next()
            .map(|row| &row.referenced_key)
    }

    #[must_use]
    pub fn index_entry_count(&self, index: IndexId) -> usize {
        self.index_keys.get(&index).map_or(0, BTreeSet::len)
    }

    fn index_rows_at(&self, index: IndexId, key: &Key) -> impl Iterator<Item = &IndexRow> {
        let entries = self.index_keys.get(&index);
        let lower = Bound::Included((key.clone(), RowId::MIN));
        let upper = Bound::Included((key.clone(), RowId::MAX));

        entries
            .into_iter()
            .flat_map(move |set| set.range((lower.clone(), upper.clone())))
            .filter_map(|(_, row_id)| self.index_data.get(row_id))
    }

    fn remove_index_rows_for(&mut self, object_row: RowId) {
        let Some(rows) = self.object_index_rows.remove(&object_row) else {
            return;
        };

        for row_id in rows {
            if let Some(row) = self.index_data.remove(&row_id)
                && let Some(set) = self.index_keys.get_mut(&row.index)
            {
                set.remove(&(row.key, row_id));
            }
        }
    }

    //
    // Range snapshots
    //

    fn object_rows(&self, store: StoreId, range: &KeyRange) -> Vec<Row> {
        let Some(keys) = self.object_keys.get(&store) else {
            return Vec::new();
        };
        if range.is_empty() {
            return Vec::new();
        }

        keys.range::<Key, _>(range.as_bounds())
            .map(|(key, row_id)| Row {
                id: *row_id,
                key: key.clone(),
                referenced_key: None,
            })
            .collect()
    }

    fn index_rows(&self, index: IndexId, range: &KeyRange) -> Result<Vec<Row>, InternalError> {
        let Some(entries) = self.index_keys.get(&index) else {
            return Ok(Vec::new());
        };
        if range.is_empty() {
            return Ok(Vec::new());
        }

        entries
            .range(index_bounds(range))
            .map(|(key, row_id)| {
                let row = self.index_data.get(row_id).ok_or_else(|| {
                    InternalError::store_invariant(format!(
                        "index key {key} points at missing row {row_id}"
                    ))
                })?;

                Ok(Row {
                    id: *row_id,
                    key: key.clone(),
                    referenced_key: Some(row.referenced_key.clone()),
                })
            })
            .collect()
    }
}

// Lift key bounds onto (key, row id) pairs. Row ids 0 and u64::MAX are never
// allocated, so they sort before and after every real entry of a key.
fn index_bounds(range: &KeyRange) -> (Bound<(Key, RowId)>, Bound<(Key, RowId)>) {
    let (lower, upper) = range.as_bounds();

    let lower = match lower {
        Bound::Unbounded => Bound::Unbounded,
        Bound::Included(key) => Bound::Included((key.clone(), RowId::MIN)),
        Bound::Excluded(key) => Bound::Excluded((key.clone(), RowId::MAX)),
    };
    let upper = match upper {
        Bound::Unbounded => Bound::Unbounded,
        Bound::Included(key) => Bound::Included((key.clone(), RowId::MAX)),
        Bound::Excluded(key) => Bound::Excluded((key.clone(), RowId::MIN)),
    };

    (lower, upper)
}

// Descending order reverses keys but keeps equal keys in row-id order.
fn order_rows(mut rows: Vec<Row>, direction: Direction) -> Vec<Row> {
    if direction.is_reverse() {
        rows.sort_by(|a, b| b.key.cmp(&a.key).then(a.id.cmp(&b.id)));
    }

    rows
}

///
/// MemoryQuery
///

struct MemoryQuery {
    rows: vec::IntoIter<Row>,
}

impl BackingQuery for MemoryQuery {
    fn step(&mut self) -> Result<Option<Row>, InternalError> {
        Ok(self.rows.next())
    }
}

impl BackingStore for MemoryStore {
    fn prepare_range_query(
        &self,
        source: QuerySource,
        range: &KeyRange,
        direction: Direction,
    ) -> Result<Box<dyn BackingQuery>, InternalError> {
        let rows = match source {
            QuerySource::ObjectStore(store) => self.object_rows(store, range),
            QuerySource::Index(index) => self.index_rows(index, range)?,
        };

        Ok(Box::new(MemoryQuery {
            rows: order_rows(rows, direction).into_iter(),
        }))
    }

    fn exists(&self, table: Table, row_id: RowId) -> Result<bool, InternalError> {
        Ok(match table {
            Table::ObjectData => self.object_data.contains_key(&row_id),
            Table::IndexData => self.index_data.contains_key(&row_id),
        })
    }

    fn load_payload(&self, table: Table, row_id: RowId) -> Result<Option<Payload>, InternalError> {
        let object_row = match table {
            Table::ObjectData => row_id,
            Table::IndexData => match self.index_data.get(&row_id) {
                Some(row) => row.object_row,
                None => return Ok(None),
            },
        };

        match self.object_data.get(&object_row) {
            Some(payload) => Ok(Some(payload.clone())),
            None if table == Table::IndexData => Err(InternalError::store_invariant(format!(
                "index row {row_id} references missing object row {object_row}"
            ))),
            None => Ok(None),
        }
    }
}
