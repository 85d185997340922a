use chrono::{Duration, TimeZone, Utc};
use drafts_core::db::open_db_in_memory;
use drafts_core::{
    Clock, DocumentLifecycle, DocumentRecord, LifecycleError, ManualClock, MemoryRecordStore,
    RecordStore, Resolution, SqliteRecordStore, StoreError, DEFAULT_SLOT_KEY, DEFAULT_TITLE,
};
use std::collections::HashSet;

fn expect_ready(resolution: Resolution) -> (DocumentRecord, bool) {
    match resolution {
        Resolution::Ready(resolved) => (resolved.record, resolved.is_new),
        Resolution::NavigateAway { requested_id } => {
            panic!("unexpected navigate-away for `{requested_id}`")
        }
    }
}

#[test]
fn resolve_without_id_seeds_default_record() {
    let store = MemoryRecordStore::new();
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap());
    let lifecycle = DocumentLifecycle::with_clock(&store, &clock);

    let (record, is_new) = expect_ready(lifecycle.resolve(None).unwrap());

    assert!(is_new);
    assert_eq!(record.title, DEFAULT_TITLE);
    assert_eq!(record.content, "");
    assert_eq!(record.updated_at, clock.now());
    assert_eq!(store.read_all().unwrap(), vec![record]);
}

#[test]
fn resolve_existing_id_returns_stored_record() {
    let store = MemoryRecordStore::new();
    let lifecycle = DocumentLifecycle::new(&store);
    let created = lifecycle.create_document().unwrap();

    let (record, is_new) = expect_ready(lifecycle.resolve(Some(&created.id)).unwrap());

    assert!(!is_new);
    assert_eq!(record, created);
    assert_eq!(store.write_count(), 1);
}

#[test]
fn dangling_id_navigates_away_without_recreating_it() {
    let store = MemoryRecordStore::new();
    let now = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
    store.write_all(&[DocumentRecord::with_id("x", now)]).unwrap();
    let lifecycle = DocumentLifecycle::new(&store);

    let resolution = lifecycle.resolve(Some("missing")).unwrap();

    assert_eq!(
        resolution,
        Resolution::NavigateAway {
            requested_id: "missing".to_string()
        }
    );
    let ids: Vec<String> = store.read_all().unwrap().into_iter().map(|r| r.id).collect();
    assert_eq!(ids, vec!["x".to_string()]);
    assert_eq!(store.write_count(), 1);
}

#[test]
fn generated_ids_are_pairwise_distinct() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteRecordStore::try_new(&conn, DEFAULT_SLOT_KEY).unwrap();
    let lifecycle = DocumentLifecycle::new(&store);

    let mut ids = HashSet::new();
    for _ in 0..200 {
        let record = lifecycle.create_document().unwrap();
        assert!(ids.insert(record.id));
    }
    assert_eq!(store.read_all().unwrap().len(), 200);
}

#[test]
fn create_failure_is_reported_and_nothing_becomes_visible() {
    let store = MemoryRecordStore::new();
    let lifecycle = DocumentLifecycle::new(&store);
    lifecycle.create_document().unwrap();

    store.set_write_failure(Some("quota exceeded"));
    let err = lifecycle.resolve(None).unwrap_err();

    assert!(matches!(
        err,
        LifecycleError::Store(StoreError::Unavailable(_))
    ));
    assert_eq!(store.read_all().unwrap().len(), 1);
}

#[test]
fn malformed_store_is_replaced_on_first_create() {
    let store = MemoryRecordStore::with_raw("not json at all");
    let lifecycle = DocumentLifecycle::new(&store);

    assert!(lifecycle.list_documents().unwrap().is_empty());
    let created = lifecycle.create_document().unwrap();

    assert_eq!(store.read_all().unwrap(), vec![created]);
}

#[test]
fn list_documents_orders_by_recency_and_derives_previews() {
    let store = MemoryRecordStore::new();
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap());
    let lifecycle = DocumentLifecycle::with_clock(&store, &clock);

    let older = lifecycle.create_document().unwrap();
    clock.advance(Duration::minutes(5));
    let newer = lifecycle.create_document().unwrap();

    let mut records = store.read_all().unwrap();
    records[0].content = "<p>Shopping <em>list</em></p>".to_string();
    store.write_all(&records).unwrap();

    let listed = lifecycle.list_documents().unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].id, newer.id);
    assert_eq!(listed[0].preview_text, None);
    assert_eq!(listed[1].id, older.id);
    assert_eq!(listed[1].preview_text.as_deref(), Some("Shopping list"));
}
