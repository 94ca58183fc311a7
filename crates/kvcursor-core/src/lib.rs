//! Core runtime for kvcursor: directional cursors over an ordered key-value
//! store, with per-transaction task scheduling, deletion-tolerant advance,
//! duplicate-key collapsing, and update/delete through the cursor.

// public exports are one module level down
pub mod config;
pub mod db;
pub mod error;
pub mod key;
pub mod obs;
pub mod serialize;
pub mod value;

// test
#[cfg(test)]
pub(crate) mod test_support;

///
/// Prelude
///
/// Handles and vocabulary needed to open a database and walk it.
///

pub mod prelude {
    pub use crate::{
        config::Config,
        db::{
            Database,
            cursor::{Cursor, CursorValue},
            direction::Direction,
            index::Index,
            object_store::ObjectStore,
            schema::{IndexModel, ObjectStoreModel},
            transaction::{Reply, Transaction, TransactionMode, TransactionStatus},
        },
        error::{ErrorClass, InternalError},
        key::{Key, KeyNumber, KeyRange},
        value::Payload,
    };
}
