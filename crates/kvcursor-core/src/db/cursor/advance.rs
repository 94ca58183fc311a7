//! The skip-and-accept loop.
//!
//! A backing query is prepared once, so by the time a row comes up it may
//! have been deleted, may not be the key the caller asked to continue to, or
//! may repeat the key already delivered. Each of those is an explicit
//! [`SkipReason`]; anything else is accepted.

use crate::{
    db::{
        cursor::{CursorCore, CursorKind, CursorSource, CursorState, Position},
        direction::Direction,
        store::{BackingQuery, BackingStore, Row, Table},
        transaction::DebugLog,
    },
    error::InternalError,
    key::{Key, KeyRange},
    obs::sink::{self, MetricsEvent},
};
use std::fmt;

///
/// SkipReason
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SkipReason {
    /// The row is gone from its authoritative table.
    Tombstoned,
    /// A target key was given and this row's key differs.
    TargetMismatch,
    /// Duplicate-collapsing direction and the key did not change.
    Duplicate,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Tombstoned => "tombstoned",
            Self::TargetMismatch => "target mismatch",
            Self::Duplicate => "duplicate",
        };
        write!(f, "{label}")
    }
}

///
/// Verdict
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Verdict {
    Accept,
    Skip(SkipReason),
}

///
/// Seek
/// Fixed inputs of one advance.
///

#[derive(Clone, Copy, Debug)]
pub(crate) struct Seek<'a> {
    pub direction: Direction,
    /// Key of the position held when the advance began.
    pub previous: Option<&'a Key>,
    pub target: Option<&'a Key>,
}

/// Judge one candidate. Checks run in a fixed order: tombstone, target,
/// duplicate.
pub(crate) fn judge(key: &Key, live: bool, plan: &Seek<'_>) -> Verdict {
    if !live {
        return Verdict::Skip(SkipReason::Tombstoned);
    }
    if let Some(target) = plan.target
        && key != target
    {
        return Verdict::Skip(SkipReason::TargetMismatch);
    }
    if plan.direction.collapses_duplicates() && plan.previous == Some(key) {
        return Verdict::Skip(SkipReason::Duplicate);
    }

    Verdict::Accept
}

/// Step `query` until a candidate is accepted or the rows run out.
pub(crate) fn seek(
    query: &mut dyn BackingQuery,
    store: &dyn BackingStore,
    table: Table,
    kind: CursorKind,
    plan: &Seek<'_>,
    log: DebugLog,
) -> Result<Option<Position>, InternalError> {
    while let Some(row) = query.step()? {
        sink::record(MetricsEvent::RowFetched);

        let live = store.exists(table, row.id)?;
        match judge(&row.key, live, plan) {
            Verdict::Skip(reason) => {
                sink::record(MetricsEvent::RowSkipped { reason });
                if log.enabled() {
                    log.log(format!("skip row {} key {} ({reason})", row.id, row.key));
                }
            }
            Verdict::Accept => {
                let position = accept(row, store, table, kind)?;
                sink::record(MetricsEvent::RowAccepted);
                if log.enabled() {
                    log.log(format!("accept row {} key {}", position.row_id, position.key));
                }

                return Ok(Some(position));
            }
        }
    }

    Ok(None)
}

fn accept(
    row: Row,
    store: &dyn BackingStore,
    table: Table,
    kind: CursorKind,
) -> Result<Position, InternalError> {
    let payload = match kind {
        CursorKind::Value => Some(store.load_payload(table, row.id)?.ok_or_else(|| {
            InternalError::store_invariant(format!("live row {} has no payload", row.id))
        })?),
        CursorKind::Reference => None,
    };

    Ok(Position {
        row_id: row.id,
        key: row.key,
        referenced_key: row.referenced_key,
        payload,
    })
}

///
/// Advance
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Advance {
    Positioned,
    Exhausted,
}

impl CursorCore {
    /// Prepare the range query and load the first live row.
    ///
    /// Returns `None` when nothing in range is live; no cursor exists then.
    pub(crate) fn open(
        source: CursorSource,
        kind: CursorKind,
        range: KeyRange,
        direction: Direction,
        store: &dyn BackingStore,
        log: DebugLog,
    ) -> Result<Option<Self>, InternalError> {
        let mut query = store.prepare_range_query(source.query_source(), &range, direction)?;
        let first = Seek {
            direction,
            previous: None,
            target: None,
        };

        let Some(position) = seek(query.as_mut(), store, source.table(), kind, &first, log)? else {
            log.log("open found no live rows");
            return Ok(None);
        };
        sink::record(MetricsEvent::CursorOpened);

        Ok(Some(Self {
            query: Some(query),
            direction,
            range,
            source,
            kind,
            state: CursorState::Positioned(position),
        }))
    }
}

/// Move `core` to its next accepted row, or exhaust it.
///
/// A cursor without a backing query is already past its end and stays
/// exhausted. Exhaustion releases the query.
pub(crate) fn advance(
    core: &mut CursorCore,
    store: &dyn BackingStore,
    target: Option<&Key>,
    log: DebugLog,
) -> Result<Advance, InternalError> {
    let previous = core.key().cloned();
    let plan = Seek {
        direction: core.direction,
        previous: previous.as_ref(),
        target,
    };
    let (table, kind) = (core.source.table(), core.kind);

    let Some(query) = core.query.as_mut() else {
        core.exhaust();
        return Ok(Advance::Exhausted);
    };

    match seek(query.as_mut(), store, table, kind, &plan, log)? {
        Some(position) => {
            core.state = CursorState::Positioned(position);
            Ok(Advance::Positioned)
        }
        None => {
            core.exhaust();
            sink::record(MetricsEvent::CursorExhausted);
            log.log("cursor exhausted");
            Ok(Advance::Exhausted)
        }
    }
}
