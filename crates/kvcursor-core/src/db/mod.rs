pub mod cursor;
pub mod direction;
pub mod index;
pub mod object_store;
pub mod schema;
pub mod store;
pub mod transaction;


use crate::{
    config::Config,
    db::{
        schema::{IndexModel, ObjectStoreModel, SchemaRegistry},
        store::MemoryStore,
        transaction::{Transaction, TransactionMode},
    },
    error::InternalError,
};
use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};

///
/// Database
///
/// An ordered store plus the fixed schema it was built with. All access goes
/// through transactions.
///

pub struct Database {
    config: Rc<Config>,
    schema: Rc<SchemaRegistry>,
    store: Rc<RefCell<MemoryStore>>,
    next_txn_id: Cell<u64>,
}

impl Database {
    #[must_use]
    pub fn builder() -> DatabaseBuilder {
        DatabaseBuilder::default()
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Begin a transaction.
    ///
    /// Transactions are not coordinated with each other: run read-write
    /// transactions one at a time, since an abort restores the store as it
    /// was when that transaction began.
    #[must_use]
    pub fn transaction(&self, mode: TransactionMode) -> Transaction {
        let id = self.next_txn_id.get() + 1;
        self.next_txn_id.set(id);

        Transaction::new(
            id,
            mode,
            Rc::clone(&self.config),
            Rc::clone(&self.schema),
            Rc::clone(&self.store),
        )
    }
}

///
/// DatabaseBuilder
///

#[derive(Default)]
pub struct DatabaseBuilder {
    config: Config,
    schema: SchemaRegistry,
}

impl DatabaseBuilder {
    #[must_use]
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn object_store(mut self, model: ObjectStoreModel) -> Result<Self, InternalError> {
        self.schema.register_store(model)?;

        Ok(self)
    }

    pub fn index(mut self, model: IndexModel) -> Result<Self, InternalError> {
        self.schema.register_index(model)?;

        Ok(self)
    }

    pub fn build(self) -> Result<Database, InternalError> {
        self.config.validate()?;

        Ok(Database {
            config: Rc::new(self.config),
            schema: Rc::new(self.schema),
            store: Rc::new(RefCell::new(MemoryStore::new())),
            next_txn_id: Cell::new(0),
        })
    }
}
