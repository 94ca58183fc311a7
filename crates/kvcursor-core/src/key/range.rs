use crate::key::{Key, KeyError};
use std::ops::Bound;

///
/// KeyRange
///
/// Inclusive/exclusive bounds over the key space. A missing bound is
/// unbounded on that side.
///

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct KeyRange {
    pub lower: Option<Key>,
    pub upper: Option<Key>,
    pub lower_open: bool,
    pub upper_open: bool,
}

impl KeyRange {
    /// The unbounded range.
    #[must_use]
    pub const fn all() -> Self {
        Self {
            lower: None,
            upper: None,
            lower_open: false,
            upper_open: false,
        }
    }

    /// The range containing exactly `key`.
    #[must_use]
    pub fn only(key: Key) -> Self {
        Self {
            lower: Some(key.clone()),
            upper: Some(key),
            lower_open: false,
            upper_open: false,
        }
    }

    #[must_use]
    pub const fn lower_bound(key: Key, open: bool) -> Self {
        Self {
            lower: Some(key),
            upper: None,
            lower_open: open,
            upper_open: false,
        }
    }

    #[must_use]
    pub const fn upper_bound(key: Key, open: bool) -> Self {
        Self {
            lower: None,
            upper: Some(key),
            lower_open: false,
            upper_open: open,
        }
    }

    pub fn bound(
        lower: Key,
        upper: Key,
        lower_open: bool,
        upper_open: bool,
    ) -> Result<Self, KeyError> {
        if lower > upper {
            return Err(KeyError::InvertedRange);
        }

        Ok(Self {
            lower: Some(lower),
            upper: Some(upper),
            lower_open,
            upper_open,
        })
    }

    #[must_use]
    pub fn contains(&self, key: &Key) -> bool {
        let above_lower = match &self.lower {
            None => true,
            Some(lower) if self.lower_open => key > lower,
            Some(lower) => key >= lower,
        };
        let below_upper = match &self.upper {
            None => true,
            Some(upper) if self.upper_open => key < upper,
            Some(upper) => key <= upper,
        };

        above_lower && below_upper
    }

    /// True when no key can satisfy both bounds.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match (&self.lower, &self.upper) {
            (Some(lower), Some(upper)) => {
                lower > upper || (lower == upper && (self.lower_open || self.upper_open))
            }
            _ => false,
        }
    }

    /// Borrowed bounds suitable for `BTreeMap::range`.
    pub(crate) fn as_bounds(&self) -> (Bound<&Key>, Bound<&Key>) {
        let lower = match &self.lower {
            None => Bound::Unbounded,
            Some(key) if self.lower_open => Bound::Excluded(key),
            Some(key) => Bound::Included(key),
        };
        let upper = match &self.upper {
            None => Bound::Unbounded,
            Some(key) if self.upper_open => Bound::Excluded(key),
            Some(key) => Bound::Included(key),
        };

        (lower, upper)
    }
}
