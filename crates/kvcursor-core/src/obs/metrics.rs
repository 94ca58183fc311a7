use serde::Serialize;
use std::cell::RefCell;

///
/// EventState
/// Ephemeral, in-memory counters for cursor and transaction activity.
///

#[derive(Clone, Debug, Default, Serialize)]
pub(crate) struct EventState {
    pub ops: EventOps,
}

///
/// EventOps
///

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct EventOps {
    // Cursor lifecycle
    pub cursors_opened: u64,
    pub cursors_exhausted: u64,

    // Advance loop
    pub rows_fetched: u64,
    pub rows_accepted: u64,
    pub rows_skipped_tombstoned: u64,
    pub rows_skipped_target: u64,
    pub rows_skipped_duplicate: u64,

    // Task queue
    pub tasks_scheduled: u64,
    pub tasks_rejected: u64,
    pub tasks_failed: u64,

    // Mutation bridge
    pub cursor_updates: u64,
    pub cursor_deletes: u64,
}

///
/// EventReport
/// Point-in-time copy of the counters.
///

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct EventReport {
    pub ops: EventOps,
}

thread_local! {
    static EVENT_STATE: RefCell<EventState> = RefCell::new(EventState::default());
}

pub(crate) fn with_state_mut<R>(f: impl FnOnce(&mut EventState) -> R) -> R {
    EVENT_STATE.with_borrow_mut(f)
}

pub(crate) fn report() -> EventReport {
    EVENT_STATE.with_borrow(|state| EventReport {
        ops: state.ops.clone(),
    })
}

pub(crate) fn reset_all() {
    EVENT_STATE.with_borrow_mut(|state| *state = EventState::default());
}

pub(crate) const fn bump(counter: &mut u64) {
    *counter = counter.saturating_add(1);
}
