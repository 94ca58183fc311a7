//! Stored payloads.
//!
//! Payload bytes are opaque to the cursor engine: they are written by callers
//! through [`Payload::encode`] and handed back untouched. The only structural
//! read the engine performs is key-path extraction for object stores and
//! indexes that declare one.


use crate::{
    key::Key,
    serialize::{SerializeError, deserialize, deserialize_bounded, serialize},
};
use derive_more::Deref;
use serde::{Serialize, de::DeserializeOwned};
use serde_cbor::Value as CborValue;

///
/// Payload
///

#[derive(Clone, Debug, Deref, Eq, PartialEq)]
pub struct Payload(Vec<u8>);

impl Payload {
    pub fn encode<T: Serialize>(value: &T) -> Result<Self, SerializeError> {
        Ok(Self(serialize(value)?))
    }

    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, SerializeError> {
        deserialize(&self.0)
    }

    /// Decode with an explicit size ceiling.
    pub fn decode_bounded<T: DeserializeOwned>(&self, max_bytes: usize) -> Result<T, SerializeError> {
        deserialize_bounded(&self.0, max_bytes)
    }

    #[must_use]
    pub const fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// Extract the key found at a dotted `path`.
    ///
    /// Returns `Ok(None)` when the path is missing or the value there is not
    /// a valid key.
    pub fn key_at_path(&self, path: &str) -> Result<Option<Key>, SerializeError> {
        let root: CborValue = deserialize(&self.0)?;

        let mut current = &root;
        for segment in path.split('.').filter(|s| !s.is_empty()) {
            let CborValue::Map(map) = current else {
                return Ok(None);
            };
            match map.get(&CborValue::Text(segment.to_string())) {
                Some(next) => current = next,
                None => return Ok(None),
            }
        }

        Ok(key_from_cbor(current))
    }
}

#[expect(clippy::cast_precision_loss)]
fn key_from_cbor(value: &CborValue) -> Option<Key> {
    match value {
        CborValue::Integer(n) => Key::number(*n as f64).ok(),
        CborValue::Float(n) => Key::number(*n).ok(),
        CborValue::Text(s) => Some(Key::String(s.clone())),
        CborValue::Array(items) => items
            .iter()
            .map(key_from_cbor)
            .collect::<Option<Vec<_>>>()
            .map(Key::Array),
        _ => None,
    }
}
