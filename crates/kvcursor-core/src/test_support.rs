//! Shared fixtures for unit tests.

use crate::{
    config::Config,
    db::{
        Database,
        cursor::Cursor,
        schema::{IndexModel, ObjectStoreModel},
        transaction::{Reply, Transaction, TransactionMode},
    },
    key::Key,
    value::Payload,
};
use serde::{Deserialize, Serialize};

/// Out-of-line keys, no indexes.
pub const ITEMS: &str = "items";

/// Keyed by `id`, indexed by `city` and (uniquely) by `email`.
pub const PEOPLE: &str = "people";

///
/// Person
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Person {
    pub id: u32,
    pub city: String,
    pub email: String,
}

impl Person {
    pub fn new(id: u32, city: &str) -> Self {
        Self {
            id,
            city: city.to_string(),
            email: format!("p{id}@example.com"),
        }
    }

    pub fn payload(&self) -> Payload {
        Payload::encode(self).unwrap()
    }
}

pub fn database() -> Database {
    database_with(Config::default())
}

pub fn database_with(config: Config) -> Database {
    Database::builder()
        .config(config)
        .object_store(ObjectStoreModel::new(ITEMS))
        .unwrap()
        .object_store(ObjectStoreModel::new(PEOPLE).with_key_path("id"))
        .unwrap()
        .index(IndexModel::new("by_city", PEOPLE, "city"))
        .unwrap()
        .index(IndexModel::new("by_email", PEOPLE, "email").unique())
        .unwrap()
        .build()
        .unwrap()
}

pub fn text(value: &str) -> Payload {
    Payload::encode(&value).unwrap()
}

/// Commit one item per key, with the key's text as payload.
pub fn seed_items(db: &Database, keys: &[&str]) {
    let txn = db.transaction(TransactionMode::ReadWrite);
    let items = txn.object_store(ITEMS).unwrap();
    for key in keys {
        let _ = items.put(text(key), Some(Key::from(*key))).unwrap();
    }
    txn.commit().unwrap();
}

/// Commit people in the order given.
pub fn seed_people(db: &Database, people: &[Person]) {
    let txn = db.transaction(TransactionMode::ReadWrite);
    let store = txn.object_store(PEOPLE).unwrap();
    for person in people {
        let _ = store.put(person.payload(), None).unwrap();
    }
    txn.commit().unwrap();
}

/// Walk a cursor to the end, collecting each delivered key.
pub fn walk(open: Reply<Option<Cursor>>) -> Vec<Key> {
    walk_with(open, Cursor::key)
}

/// Walk a cursor to the end, collecting each delivered primary key.
pub fn walk_primary(open: Reply<Option<Cursor>>) -> Vec<Key> {
    walk_with(open, Cursor::primary_key)
}

fn walk_with(open: Reply<Option<Cursor>>, read: fn(&Cursor) -> Option<Key>) -> Vec<Key> {
    let mut keys = Vec::new();
    let mut next = open.resolve().unwrap();
    while let Some(cursor) = next {
        keys.push(read(&cursor).unwrap());
        next = cursor.continue_to(None).unwrap().resolve().unwrap();
    }

    keys
}

pub fn keys(values: &[&str]) -> Vec<Key> {
    values.iter().map(|value| Key::from(*value)).collect()
}

pub fn ids(values: &[u32]) -> Vec<Key> {
    values.iter().map(|value| Key::from(*value)).collect()
}

pub fn read_write(db: &Database) -> Transaction {
    db.transaction(TransactionMode::ReadWrite)
}
