use serde::{Deserialize, Serialize};

///
/// Direction
///
/// Traversal direction of a cursor, fixed when the cursor is opened.
/// The `NoDuplicate` variants stop only on a change of key.
///

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum Direction {
    #[default]
    Next,
    NextNoDuplicate,
    Prev,
    PrevNoDuplicate,
}

impl Direction {
    #[must_use]
    pub const fn is_reverse(self) -> bool {
        matches!(self, Self::Prev | Self::PrevNoDuplicate)
    }

    #[must_use]
    pub const fn collapses_duplicates(self) -> bool {
        matches!(self, Self::NextNoDuplicate | Self::PrevNoDuplicate)
    }
}
