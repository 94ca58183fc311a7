use crate::db::cursor::CursorCore;
use derive_more::Deref;

///
/// CursorId
/// Slot of a cursor in its transaction's registry.
///

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub(crate) struct CursorId(usize);

///
/// CursorRegistry
///
/// Cursor state for one transaction, addressed by slot. Handles refer to
/// slots, never own them; a released slot reads as empty.
///

#[derive(Default, Deref)]
pub(crate) struct CursorRegistry(Vec<Option<CursorCore>>);

impl CursorRegistry {
    pub(crate) fn insert(&mut self, core: CursorCore) -> CursorId {
        self.0.push(Some(core));

        CursorId(self.0.len() - 1)
    }

    pub(crate) fn get(&self, id: CursorId) -> Option<&CursorCore> {
        self.0.get(id.0).and_then(Option::as_ref)
    }

    pub(crate) fn get_mut(&mut self, id: CursorId) -> Option<&mut CursorCore> {
        self.0.get_mut(id.0).and_then(Option::as_mut)
    }

    /// Drop every cursor and its backing query. Slots are kept so that stale
    /// handles still miss.
    pub(crate) fn release_all(&mut self) {
        for slot in &mut self.0 {
            *slot = None;
        }
    }
}
