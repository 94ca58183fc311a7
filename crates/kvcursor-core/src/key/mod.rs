mod range;

pub use range::KeyRange;

use crate::error::{ErrorClass, ErrorOrigin, InternalError};
use serde::{Deserialize, Serialize};
use std::{cmp::Ordering, fmt};
use thiserror::Error as ThisError;

///
/// Key
///
/// The ordering key shared by object-store rows and index entries.
/// Ordering across variants is Number < Date < String < Array; arrays compare
/// element-wise, then by length.
///

#[derive(Clone, Debug, Deserialize, Serialize)]
pub enum Key {
    Number(KeyNumber),
    /// Milliseconds since the Unix epoch.
    Date(KeyNumber),
    String(String),
    Array(Vec<Key>),
}

///
/// KeyNumber
///
/// Numeric key component. Never NaN, and `-0.0` is stored as `0.0`, so
/// equal numbers are always the same key. Deserialization applies the same
/// rules.
///

#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct KeyNumber(f64);

impl KeyNumber {
    pub fn new(value: f64) -> Result<Self, KeyError> {
        if value.is_nan() {
            return Err(KeyError::NotANumber);
        }

        // fold -0.0 into 0.0 so equality matches numeric equality
        Ok(Self(if value == 0.0 { 0.0 } else { value }))
    }

    #[must_use]
    pub const fn get(self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for KeyNumber {
    type Error = KeyError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<KeyNumber> for f64 {
    fn from(number: KeyNumber) -> Self {
        number.0
    }
}

impl Ord for KeyNumber {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl PartialOrd for KeyNumber {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for KeyNumber {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for KeyNumber {}

impl fmt::Display for KeyNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

///
/// KeyError
///

#[derive(Debug, ThisError)]
pub enum KeyError {
    #[error("key number must not be NaN")]
    NotANumber,

    #[error("key range lower bound is greater than its upper bound")]
    InvertedRange,
}

impl From<KeyError> for InternalError {
    fn from(err: KeyError) -> Self {
        Self::new(ErrorClass::Data, ErrorOrigin::Store, err.to_string())
    }
}

impl Key {
    /// Build a numeric key. `-0.0` is stored as `0.0`.
    pub fn number(value: f64) -> Result<Self, KeyError> {
        Ok(Self::Number(KeyNumber::new(value)?))
    }

    /// Build a date key from epoch milliseconds.
    pub fn date(epoch_millis: f64) -> Result<Self, KeyError> {
        Ok(Self::Date(KeyNumber::new(epoch_millis)?))
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::String(value.into())
    }

    #[must_use]
    pub const fn array(items: Vec<Self>) -> Self {
        Self::Array(items)
    }

    const fn variant_rank(&self) -> u8 {
        match self {
            Self::Number(_) => 0,
            Self::Date(_) => 1,
            Self::String(_) => 2,
            Self::Array(_) => 3,
        }
    }
}

impl Ord for Key {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) | (Self::Date(a), Self::Date(b)) => a.cmp(b),
            (Self::String(a), Self::String(b)) => a.cmp(b),
            (Self::Array(a), Self::Array(b)) => a.cmp(b),
            _ => self.variant_rank().cmp(&other.variant_rank()),
        }
    }
}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Key {}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Date(ms) => write!(f, "date({ms})"),
            Self::String(s) => write!(f, "{s:?}"),
            Self::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
        }
    }
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Key {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for Key {
    #[expect(clippy::cast_precision_loss)]
    fn from(value: i64) -> Self {
        Self::Number(KeyNumber(value as f64))
    }
}

impl From<u32> for Key {
    fn from(value: u32) -> Self {
        Self::Number(KeyNumber(f64::from(value)))
    }
}
