use super::{
    advance::{Advance, Seek, Verdict, advance, judge},
    *,
};
use crate::{
    db::{
        Database,
        index::Index,
        schema::{ObjectStoreModel, SchemaRegistry, StoreId},
        store::{BackingQuery, BackingStore, QuerySource, Row, Table},
        transaction::{DebugLog, TransactionStatus},
    },
    error::ErrorClass,
    obs::{MetricsSink, with_metrics_sink},
    test_support::*,
};
use proptest::prelude::*;
use std::{cell::RefCell, collections::HashSet, rc::Rc};

const QUIET: DebugLog = DebugLog::new(false, 0);

fn people_by_city(txn: &Transaction) -> Index {
    txn.object_store(PEOPLE).unwrap().index("by_city").unwrap()
}

fn items_cursor(txn: &Transaction, direction: Direction) -> Cursor {
    txn.object_store(ITEMS)
        .unwrap()
        .open_cursor(KeyRange::all(), direction)
        .unwrap()
        .resolve()
        .unwrap()
        .unwrap()
}

// ─────────────────────────────────────────────
// Skip rules
// ─────────────────────────────────────────────

#[test]
fn judge_checks_tombstone_before_target_and_duplicate() {
    let b = Key::from("b");
    let plan = Seek {
        direction: Direction::NextNoDuplicate,
        previous: Some(&b),
        target: Some(&b),
    };

    assert_eq!(judge(&b, false, &plan), Verdict::Skip(SkipReason::Tombstoned));
    assert_eq!(
        judge(&Key::from("c"), true, &plan),
        Verdict::Skip(SkipReason::TargetMismatch)
    );
    assert_eq!(judge(&b, true, &plan), Verdict::Skip(SkipReason::Duplicate));
}

#[test]
fn judge_keeps_duplicates_for_plain_directions() {
    let b = Key::from("b");
    for direction in [Direction::Next, Direction::Prev] {
        let plan = Seek {
            direction,
            previous: Some(&b),
            target: None,
        };

        assert_eq!(judge(&b, true, &plan), Verdict::Accept, "{direction:?}");
    }
}

// ─────────────────────────────────────────────
// Delivery scenarios
// ─────────────────────────────────────────────

fn abbc(db: &Database) {
    seed_people(
        db,
        &[
            Person::new(1, "a"),
            Person::new(2, "b"),
            Person::new(3, "b"),
            Person::new(4, "c"),
        ],
    );
}

#[test]
fn next_keeps_duplicate_index_keys() {
    let db = database();
    abbc(&db);
    let txn = read_write(&db);

    let delivered = walk(
        people_by_city(&txn)
            .open_cursor(
                KeyRange::bound(Key::from("a"), Key::from("z"), false, false).unwrap(),
                Direction::Next,
            )
            .unwrap(),
    );

    assert_eq!(delivered, keys(&["a", "b", "b", "c"]));
}

#[test]
fn next_no_duplicate_collapses_runs() {
    let db = database();
    abbc(&db);
    let txn = read_write(&db);

    let delivered = walk_primary(
        people_by_city(&txn)
            .open_cursor(KeyRange::all(), Direction::NextNoDuplicate)
            .unwrap(),
    );

    assert_eq!(delivered, ids(&[1, 2, 4]));
}

#[test]
fn prev_directions_walk_keys_backwards() {
    let db = database();
    abbc(&db);
    let txn = read_write(&db);
    let index = people_by_city(&txn);

    let prev = walk_primary(index.open_cursor(KeyRange::all(), Direction::Prev).unwrap());
    let prev_unique = walk_primary(
        index
            .open_cursor(KeyRange::all(), Direction::PrevNoDuplicate)
            .unwrap(),
    );

    assert_eq!(prev, ids(&[4, 2, 3, 1]));
    assert_eq!(prev_unique, ids(&[4, 2, 1]));
}

#[test]
fn row_deleted_after_open_is_never_delivered() {
    let db = database();
    seed_items(&db, &["a", "b", "c"]);
    let txn = read_write(&db);
    let items = txn.object_store(ITEMS).unwrap();

    let open = items.open_cursor(KeyRange::all(), Direction::Next).unwrap();
    let deleted = items.delete(Key::from("b")).unwrap();
    let first = open.resolve().unwrap().unwrap();
    deleted.resolve().unwrap();

    assert_eq!(first.key(), Some(Key::from("a")));
    let second = first.continue_to(None).unwrap().resolve().unwrap().unwrap();
    assert_eq!(second.key(), Some(Key::from("c")));
    assert!(second.continue_to(None).unwrap().resolve().unwrap().is_none());
}

#[test]
fn tombstoned_candidate_does_not_hide_next_key_group() {
    let db = database();
    seed_people(
        &db,
        &[Person::new(1, "a"), Person::new(2, "b"), Person::new(3, "b")],
    );
    let txn = read_write(&db);

    let cursor = people_by_city(&txn)
        .open_cursor(KeyRange::all(), Direction::NextNoDuplicate)
        .unwrap()
        .resolve()
        .unwrap()
        .unwrap();
    txn.object_store(PEOPLE)
        .unwrap()
        .delete(Key::from(2_u32))
        .unwrap()
        .resolve()
        .unwrap();

    let next = cursor.continue_to(None).unwrap().resolve().unwrap().unwrap();
    assert_eq!(next.key(), Some(Key::from("b")));
    assert_eq!(next.primary_key(), Some(Key::from(3_u32)));
}

#[test]
fn continue_to_target_lands_on_matching_key_or_exhausts() {
    let db = database();
    seed_items(&db, &["a", "b", "c", "d", "e"]);
    let txn = read_write(&db);
    let cursor = items_cursor(&txn, Direction::Next);

    let landed = cursor
        .continue_to(Some(Key::from("d")))
        .unwrap()
        .resolve()
        .unwrap()
        .unwrap();
    assert_eq!(landed.key(), Some(Key::from("d")));

    let missed = cursor.continue_to(Some(Key::from("c"))).unwrap().resolve().unwrap();
    assert!(missed.is_none());
    assert!(cursor.is_exhausted());
}

#[test]
fn continue_after_exhaustion_is_not_allowed() {
    let db = database();
    seed_items(&db, &["a"]);
    let txn = read_write(&db);
    let cursor = items_cursor(&txn, Direction::Next);

    assert!(cursor.continue_to(None).unwrap().resolve().unwrap().is_none());

    let err = cursor.continue_to(None).unwrap_err();
    assert_eq!(err.class, ErrorClass::NotAllowed);
    assert_eq!(txn.pending_tasks(), 0);
}

#[test]
fn continues_queued_from_the_last_row_all_resolve_to_none() {
    let db = database();
    seed_items(&db, &["a"]);
    let txn = read_write(&db);
    let cursor = items_cursor(&txn, Direction::Next);

    let first = cursor.continue_to(None).unwrap();
    let second = cursor.continue_to(None).unwrap();
    assert_eq!(txn.pending_tasks(), 2);

    assert!(first.resolve().unwrap().is_none());
    assert!(second.resolve().unwrap().is_none());
    assert_eq!(txn.status(), TransactionStatus::Active);
    assert_eq!(cursor.continue_to(None).unwrap_err().class, ErrorClass::NotAllowed);
}

#[test]
fn continue_to_negative_zero_lands_on_zero() {
    let db = database();
    let txn = read_write(&db);
    let items = txn.object_store(ITEMS).unwrap();
    for (key, body) in [(-1.0, "minus"), (0.0, "zero"), (1.0, "one")] {
        let _ = items.put(text(body), Some(Key::number(key).unwrap())).unwrap();
    }
    let cursor = items_cursor(&txn, Direction::Next);

    let landed = cursor
        .continue_to(Some(Key::number(-0.0).unwrap()))
        .unwrap()
        .resolve()
        .unwrap()
        .unwrap();

    assert_eq!(landed.key(), Some(Key::number(0.0).unwrap()));
    assert_eq!(landed.value(), Some(CursorValue::Payload(text("zero"))));
}

#[test]
fn empty_range_opens_no_cursor() {
    let db = database();
    seed_items(&db, &["a", "b"]);
    let txn = read_write(&db);

    let opened = txn
        .object_store(ITEMS)
        .unwrap()
        .open_cursor(KeyRange::lower_bound(Key::from("b"), true), Direction::Next)
        .unwrap()
        .resolve()
        .unwrap();

    assert!(opened.is_none());
}

#[test]
fn position_reads_are_all_or_nothing() {
    let db = database();
    seed_items(&db, &["a", "b"]);
    let txn = read_write(&db);
    let cursor = items_cursor(&txn, Direction::Prev);

    assert_eq!(cursor.key(), Some(Key::from("b")));
    assert!(cursor.row_id().is_some());
    assert_eq!(cursor.value(), Some(CursorValue::Payload(text("b"))));
    assert_eq!(cursor.direction(), Direction::Prev);

    cursor.continue_to(None).unwrap().resolve().unwrap();
    cursor.continue_to(None).unwrap().resolve().unwrap();

    assert!(cursor.key().is_none());
    assert!(cursor.row_id().is_none());
    assert!(cursor.value().is_none());
}

#[test]
fn key_cursor_yields_referenced_keys() {
    let db = database();
    abbc(&db);
    let txn = read_write(&db);

    let cursor = people_by_city(&txn)
        .open_key_cursor(KeyRange::only(Key::from("b")), Direction::Next)
        .unwrap()
        .resolve()
        .unwrap()
        .unwrap();

    assert!(!cursor.is_value_cursor());
    assert_eq!(cursor.value(), Some(CursorValue::Reference(Key::from(2_u32))));
}

// ─────────────────────────────────────────────
// Writes through the cursor
// ─────────────────────────────────────────────

#[test]
fn update_through_index_cursor_targets_referenced_object() {
    let db = database();
    abbc(&db);
    let txn = read_write(&db);

    let cursor = people_by_city(&txn)
        .open_cursor(KeyRange::only(Key::from("c")), Direction::Next)
        .unwrap()
        .resolve()
        .unwrap()
        .unwrap();
    let moved = Person::new(4, "d");
    let written = cursor.update(moved.payload()).unwrap().resolve().unwrap();

    assert_eq!(written, Key::from(4_u32));
    let stored = txn
        .object_store(PEOPLE)
        .unwrap()
        .get(Key::from(4_u32))
        .unwrap()
        .resolve()
        .unwrap()
        .unwrap();
    assert_eq!(stored.decode::<Person>().unwrap(), moved);
}

#[test]
fn update_may_not_change_a_key_path_key() {
    let db = database();
    abbc(&db);
    let txn = read_write(&db);

    let cursor = people_by_city(&txn)
        .open_cursor(KeyRange::all(), Direction::Next)
        .unwrap()
        .resolve()
        .unwrap()
        .unwrap();
    let err = cursor.update(Person::new(99, "a").payload()).unwrap_err();

    assert_eq!(err.class, ErrorClass::Data);
}

#[test]
fn delete_through_cursor_removes_current_object() {
    let db = database();
    seed_items(&db, &["a", "b", "c"]);
    let txn = read_write(&db);
    let cursor = items_cursor(&txn, Direction::Next);

    let next = cursor.continue_to(None).unwrap().resolve().unwrap().unwrap();
    next.delete().unwrap().resolve().unwrap();

    let remaining = walk(
        txn.object_store(ITEMS)
            .unwrap()
            .open_cursor(KeyRange::all(), Direction::Next)
            .unwrap(),
    );
    assert_eq!(remaining, keys(&["a", "c"]));
}

#[test]
fn key_cursor_cannot_write() {
    let db = database();
    abbc(&db);
    let txn = read_write(&db);

    let cursor = people_by_city(&txn)
        .open_key_cursor(KeyRange::all(), Direction::Next)
        .unwrap()
        .resolve()
        .unwrap()
        .unwrap();

    assert!(cursor.update(Person::new(1, "a").payload()).unwrap_err().is_not_allowed());
    assert!(cursor.delete().unwrap_err().is_not_allowed());
}

#[test]
fn exhausted_cursor_cannot_write() {
    let db = database();
    seed_items(&db, &["a"]);
    let txn = read_write(&db);
    let cursor = items_cursor(&txn, Direction::Next);
    cursor.continue_to(None).unwrap().resolve().unwrap();

    assert!(cursor.update(text("z")).unwrap_err().is_not_allowed());
    assert!(cursor.delete().unwrap_err().is_not_allowed());
}

#[test]
fn cursor_writes_report_routing_events() {
    #[derive(Default)]
    struct Capture(RefCell<Vec<MetricsEvent>>);

    impl MetricsSink for Capture {
        fn record(&self, event: MetricsEvent) {
            self.0.borrow_mut().push(event);
        }
    }

    let db = database();
    seed_items(&db, &["a"]);
    let txn = read_write(&db);
    let capture = Rc::new(Capture::default());

    with_metrics_sink(capture.clone(), || {
        let cursor = items_cursor(&txn, Direction::Next);
        cursor.update(text("a2")).unwrap().resolve().unwrap();
    });

    let events = capture.0.borrow();
    assert!(events.contains(&MetricsEvent::CursorOpened));
    assert!(events.contains(&MetricsEvent::MutationRouted {
        kind: MutationKind::Update
    }));
}

// ─────────────────────────────────────────────
// Backing store failures
// ─────────────────────────────────────────────

struct FailingQuery {
    rows: Vec<Row>,
}

impl BackingQuery for FailingQuery {
    fn step(&mut self) -> Result<Option<Row>, InternalError> {
        match self.rows.pop() {
            Some(row) => Ok(Some(row)),
            None => Err(InternalError::store_corruption("page checksum mismatch")),
        }
    }
}

struct FailingStore;

impl BackingStore for FailingStore {
    fn prepare_range_query(
        &self,
        _: QuerySource,
        _: &KeyRange,
        _: Direction,
    ) -> Result<Box<dyn BackingQuery>, InternalError> {
        Ok(Box::new(FailingQuery { rows: Vec::new() }))
    }

    fn exists(&self, _: Table, _: RowId) -> Result<bool, InternalError> {
        Err(InternalError::store_internal("exists lookup failed"))
    }

    fn load_payload(&self, _: Table, _: RowId) -> Result<Option<Payload>, InternalError> {
        Ok(None)
    }
}

fn core_with(query: FailingQuery) -> CursorCore {
    CursorCore {
        query: Some(Box::new(query)),
        direction: Direction::Next,
        range: KeyRange::all(),
        source: CursorSource::ObjectStore(test_store_id()),
        kind: CursorKind::Reference,
        state: CursorState::Positioned(Position {
            row_id: RowId::new(1),
            key: Key::from("a"),
            referenced_key: None,
            payload: None,
        }),
    }
}

fn test_store_id() -> StoreId {
    SchemaRegistry::new()
        .register_store(ObjectStoreModel::new("t"))
        .unwrap()
}

#[test]
fn step_failure_propagates_and_keeps_position() {
    let mut core = core_with(FailingQuery { rows: Vec::new() });

    let err = advance(&mut core, &FailingStore, None, QUIET).unwrap_err();

    assert_eq!(err.class, ErrorClass::Corruption);
    assert_eq!(core.key(), Some(&Key::from("a")));
}

#[test]
fn exists_failure_propagates() {
    let row = Row {
        id: RowId::new(2),
        key: Key::from("b"),
        referenced_key: None,
    };
    let mut core = core_with(FailingQuery { rows: vec![row] });

    let err = advance(&mut core, &FailingStore, None, QUIET).unwrap_err();

    assert_eq!(err.class, ErrorClass::Internal);
}

#[test]
fn advance_without_query_stays_exhausted() {
    let mut core = core_with(FailingQuery { rows: Vec::new() });
    core.exhaust();

    let step = advance(&mut core, &FailingStore, None, QUIET).unwrap();

    assert_eq!(step, Advance::Exhausted);
    assert!(core.key().is_none() && core.row_id().is_none());
}

#[test]
fn failed_advance_aborts_the_transaction() {
    let db = database();
    seed_items(&db, &["a", "b"]);
    let txn = read_write(&db);
    let cursor = items_cursor(&txn, Direction::Next);

    // Swap the live query for one that fails on its next step.
    txn.with_cursor_mut(cursor.id, |core| {
        core.query = Some(Box::new(FailingQuery { rows: Vec::new() }));
    });

    let next = cursor.continue_to(None).unwrap();
    let queued = txn
        .object_store(ITEMS)
        .unwrap()
        .put(text("x"), Some(Key::from("x")))
        .unwrap();

    let err = next.resolve().unwrap_err();
    assert_eq!(err.class, ErrorClass::Corruption);
    assert!(queued.resolve().unwrap_err().is_aborted());
    assert_eq!(txn.status(), TransactionStatus::Aborted);
}

// ─────────────────────────────────────────────
// Properties
// ─────────────────────────────────────────────

fn expected_walk(tags: &[u8], deleted: &HashSet<usize>, direction: Direction) -> Vec<u32> {
    let mut order: Vec<usize> = (0..tags.len()).collect();
    if direction.is_reverse() {
        order.sort_by(|&a, &b| tags[b].cmp(&tags[a]).then(a.cmp(&b)));
    } else {
        order.sort_by(|&a, &b| tags[a].cmp(&tags[b]).then(a.cmp(&b)));
    }

    let mut delivered = vec![order[0]];
    for &pos in &order[1..] {
        if deleted.contains(&pos) {
            continue;
        }
        let last = *delivered.last().unwrap_or(&pos);
        if direction.collapses_duplicates() && tags[last] == tags[pos] {
            continue;
        }
        delivered.push(pos);
    }

    delivered.into_iter().map(|pos| u32::try_from(pos).unwrap()).collect()
}

fn direction_strategy() -> impl Strategy<Value = Direction> {
    prop_oneof![
        Just(Direction::Next),
        Just(Direction::NextNoDuplicate),
        Just(Direction::Prev),
        Just(Direction::PrevNoDuplicate),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn index_walk_matches_model(
        tags in prop::collection::vec(0_u8..4, 1..24),
        deleted in prop::collection::hash_set(0_usize..24, 0..12),
        direction in direction_strategy(),
    ) {
        let db = database();
        let people: Vec<Person> = tags
            .iter()
            .enumerate()
            .map(|(pos, tag)| Person::new(u32::try_from(pos).unwrap(), &tag.to_string()))
            .collect();
        seed_people(&db, &people);

        let txn = read_write(&db);
        let store = txn.object_store(PEOPLE).unwrap();
        let open = people_by_city(&txn).open_cursor(KeyRange::all(), direction).unwrap();
        let first = open.resolve().unwrap().unwrap();

        let deleted: HashSet<usize> = deleted.into_iter().filter(|pos| *pos < tags.len()).collect();
        for pos in &deleted {
            store.delete(Key::from(u32::try_from(*pos).unwrap())).unwrap().resolve().unwrap();
        }

        let mut delivered = vec![first.primary_key().unwrap()];
        let mut next = first.continue_to(None).unwrap().resolve().unwrap();
        while let Some(cursor) = next {
            prop_assert_eq!(cursor.key().is_some(), cursor.row_id().is_some());
            delivered.push(cursor.primary_key().unwrap());
            next = cursor.continue_to(None).unwrap().resolve().unwrap();
        }

        let expected: Vec<Key> = expected_walk(&tags, &deleted, direction)
            .into_iter()
            .map(Key::from)
            .collect();
        prop_assert_eq!(delivered, expected);
    }
}
