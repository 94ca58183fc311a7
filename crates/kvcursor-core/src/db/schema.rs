//! Fixed schema: the object stores and indexes a database was built with.
//!
//! Registration happens once, through `DatabaseBuilder`. Transactions hold a
//! shared, read-only view of the registry.

use crate::error::{ErrorClass, ErrorOrigin, InternalError};
use std::{
    collections::HashMap,
    fmt::{self, Display},
};
use thiserror::Error as ThisError;

///
/// StoreId
///

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct StoreId(u32);

///
/// IndexId
///

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct IndexId(u32);

///
/// ObjectStoreModel
/// Descriptor for one object store. Without a key path, every write must
/// supply its key explicitly.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ObjectStoreModel {
    pub name: String,
    pub key_path: Option<String>,
}

impl ObjectStoreModel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key_path: None,
        }
    }

    #[must_use]
    pub fn with_key_path(mut self, key_path: impl Into<String>) -> Self {
        self.key_path = Some(key_path.into());
        self
    }
}

///
/// IndexModel
/// Descriptor for a secondary index over one object store.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct IndexModel {
    pub name: String,
    pub store: String,
    pub key_path: String,
    pub unique: bool,
}

impl IndexModel {
    pub fn new(
        name: impl Into<String>,
        store: impl Into<String>,
        key_path: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            store: store.into(),
            key_path: key_path.into(),
            unique: false,
        }
    }

    #[must_use]
    pub const fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
}

impl Display for IndexModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.unique {
            write!(f, "UNIQUE {}.{}({})", self.store, self.name, self.key_path)
        } else {
            write!(f, "{}.{}({})", self.store, self.name, self.key_path)
        }
    }
}

///
/// SchemaError
///

#[derive(Debug, ThisError)]
pub enum SchemaError {
    #[error("object store '{0}' is already registered")]
    DuplicateStore(String),

    #[error("index '{index}' is already registered on object store '{store}'")]
    DuplicateIndex { store: String, index: String },

    #[error("object store '{0}' not found")]
    StoreNotFound(String),

    #[error("index '{index}' not found on object store '{store}'")]
    IndexNotFound { store: String, index: String },
}

impl From<SchemaError> for InternalError {
    fn from(err: SchemaError) -> Self {
        let class = match err {
            SchemaError::DuplicateStore(_) | SchemaError::DuplicateIndex { .. } => {
                ErrorClass::Constraint
            }
            SchemaError::StoreNotFound(_) | SchemaError::IndexNotFound { .. } => {
                ErrorClass::NotFound
            }
        };

        Self::new(class, ErrorOrigin::Store, err.to_string())
    }
}

///
/// SchemaRegistry
///

#[derive(Debug, Default)]
pub struct SchemaRegistry {
    stores: Vec<ObjectStoreModel>,
    indexes: Vec<(StoreId, IndexModel)>,
    store_names: HashMap<String, StoreId>,
}

impl SchemaRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_store(&mut self, model: ObjectStoreModel) -> Result<StoreId, SchemaError> {
        if self.store_names.contains_key(&model.name) {
            return Err(SchemaError::DuplicateStore(model.name));
        }

        let id = StoreId(next_id(self.stores.len()));
        self.store_names.insert(model.name.clone(), id);
        self.stores.push(model);

        Ok(id)
    }

    pub fn register_index(&mut self, model: IndexModel) -> Result<IndexId, SchemaError> {
        let store = self.store_id(&model.store)?;
        if self.index_id(store, &model.name).is_ok() {
            return Err(SchemaError::DuplicateIndex {
                store: model.store,
                index: model.name,
            });
        }

        let id = IndexId(next_id(self.indexes.len()));
        self.indexes.push((store, model));

        Ok(id)
    }

    pub fn store_id(&self, name: &str) -> Result<StoreId, SchemaError> {
        self.store_names
            .get(name)
            .copied()
            .ok_or_else(|| SchemaError::StoreNotFound(name.to_string()))
    }

    pub fn index_id(&self, store: StoreId, name: &str) -> Result<IndexId, SchemaError> {
        self.indexes
            .iter()
            .position(|(owner, model)| *owner == store && model.name == name)
            .map(|pos| IndexId(next_id(pos)))
            .ok_or_else(|| SchemaError::IndexNotFound {
                store: self.store(store).name.clone(),
                index: name.to_string(),
            })
    }

    /// Look up a store registered with this registry.
    #[must_use]
    pub fn store(&self, id: StoreId) -> &ObjectStoreModel {
        &self.stores[id.0 as usize]
    }

    /// Look up an index registered with this registry.
    #[must_use]
    pub fn index(&self, id: IndexId) -> &IndexModel {
        &self.indexes[id.0 as usize].1
    }

    #[must_use]
    pub fn index_store(&self, id: IndexId) -> StoreId {
        self.indexes[id.0 as usize].0
    }

    /// Indexes maintained on writes to `store`.
    pub fn indexes_for(&self, store: StoreId) -> impl Iterator<Item = (IndexId, &IndexModel)> {
        self.indexes
            .iter()
            .enumerate()
            .filter(move |(_, (owner, _))| *owner == store)
            .map(|(pos, (_, model))| (IndexId(next_id(pos)), model))
    }
}

// Ids are dense positions; the registry never holds anywhere near u32::MAX entries.
#[expect(clippy::cast_possible_truncation)]
const fn next_id(pos: usize) -> u32 {
    pos as u32
}
