use crate::{
    db::{
        cursor::{CursorCore, CursorError, CursorKind},
        schema::StoreId,
    },
    key::Key,
};

///
/// WriteTarget
/// Where a write through a cursor lands.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct WriteTarget {
    pub store: StoreId,
    pub key: Key,
}

/// Resolve the object a cursor write applies to.
///
/// Index cursors write to the object their current entry references; object
/// store cursors write to their own current key.
pub(crate) fn write_target(core: &CursorCore) -> Result<WriteTarget, CursorError> {
    if !core.has_query() {
        return Err(CursorError::Exhausted);
    }
    let Some(key) = core.primary_key() else {
        return Err(CursorError::NoPosition);
    };
    if core.kind != CursorKind::Value {
        return Err(CursorError::NotValueCursor);
    }

    Ok(WriteTarget {
        store: core.source.owning_store(),
        key: key.clone(),
    })
}
