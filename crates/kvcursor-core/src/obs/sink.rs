//! Metrics sink boundary.
//!
//! All instrumentation flows through `MetricsEvent` and `MetricsSink`.
//! This module is the only bridge between engine logic and the counter state.

use crate::{
    db::cursor::SkipReason,
    obs::metrics::{self, EventReport, bump},
};
use std::{cell::RefCell, rc::Rc};

thread_local! {
    static SINK_OVERRIDE: RefCell<Option<Rc<dyn MetricsSink>>> = const { RefCell::new(None) };
}

///
/// MutationKind
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MutationKind {
    Update,
    Delete,
}

///
/// MetricsEvent
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MetricsEvent {
    CursorOpened,
    CursorExhausted,
    RowFetched,
    RowAccepted,
    RowSkipped { reason: SkipReason },
    TaskScheduled,
    TaskRejected,
    TaskFailed,
    MutationRouted { kind: MutationKind },
}

///
/// MetricsSink
///

pub trait MetricsSink {
    fn record(&self, event: MetricsEvent);
}

/// GlobalMetricsSink
/// Default sink that writes into the thread-local counter state.

pub(crate) struct GlobalMetricsSink;

impl MetricsSink for GlobalMetricsSink {
    fn record(&self, event: MetricsEvent) {
        metrics::with_state_mut(|m| {
            let ops = &mut m.ops;
            match event {
                MetricsEvent::CursorOpened => bump(&mut ops.cursors_opened),
                MetricsEvent::CursorExhausted => bump(&mut ops.cursors_exhausted),
                MetricsEvent::RowFetched => bump(&mut ops.rows_fetched),
                MetricsEvent::RowAccepted => bump(&mut ops.rows_accepted),
                MetricsEvent::RowSkipped { reason } => match reason {
                    SkipReason::Tombstoned => bump(&mut ops.rows_skipped_tombstoned),
                    SkipReason::TargetMismatch => bump(&mut ops.rows_skipped_target),
                    SkipReason::Duplicate => bump(&mut ops.rows_skipped_duplicate),
                },
                MetricsEvent::TaskScheduled => bump(&mut ops.tasks_scheduled),
                MetricsEvent::TaskRejected => bump(&mut ops.tasks_rejected),
                MetricsEvent::TaskFailed => bump(&mut ops.tasks_failed),
                MetricsEvent::MutationRouted { kind } => match kind {
                    MutationKind::Update => bump(&mut ops.cursor_updates),
                    MutationKind::Delete => bump(&mut ops.cursor_deletes),
                },
            }
        });
    }
}

pub(crate) fn record(event: MetricsEvent) {
    let sink = SINK_OVERRIDE.with_borrow(Clone::clone);
    match sink {
        Some(sink) => sink.record(event),
        None => GlobalMetricsSink.record(event),
    }
}

/// Snapshot the current counters.
#[must_use]
pub fn metrics_report() -> EventReport {
    metrics::report()
}

/// Reset all counters.
pub fn metrics_reset_all() {
    metrics::reset_all();
}

/// Run a closure with a temporary metrics sink override.
pub fn with_metrics_sink<T>(sink: Rc<dyn MetricsSink>, f: impl FnOnce() -> T) -> T {
    struct Guard(Option<Rc<dyn MetricsSink>>);

    impl Drop for Guard {
        fn drop(&mut self) {
            let previous = self.0.take();
            SINK_OVERRIDE.with_borrow_mut(|slot| *slot = previous);
        }
    }

    let previous = SINK_OVERRIDE.with_borrow_mut(|slot| slot.replace(sink));
    let _guard = Guard(previous);

    f()
}
