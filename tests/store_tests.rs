use cyclestate::{AttributeBag, Cycle, CycleStore, RecordData, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

const SCORE_TYPE: i32 = 1;

fn daily_store() -> CycleStore {
    let store = CycleStore::new();
    store
        .register_creator(Cycle::Daily, SCORE_TYPE, |user| Some(RecordData::new(user)))
        .unwrap();
    store
}

#[test]
fn test_end_to_end_score_scenario() {
    let store = daily_store();

    assert!(store.increase_int(Cycle::Daily, SCORE_TYPE, 12345, "score", 10, |_| true));
    assert!(!store.decrease_int(Cycle::Daily, SCORE_TYPE, 12345, "score", 15));
    assert!(store.decrease_int(Cycle::Daily, SCORE_TYPE, 12345, "score", 5));

    let attributes = store.attributes(Cycle::Daily, SCORE_TYPE, 12345);
    assert_eq!(attributes.get("score"), Some(&Value::Int(5)));
}

#[test]
fn test_loader_wins_over_creator() {
    let store = daily_store();
    store
        .register_loader(Cycle::Daily, SCORE_TYPE, |_, _, user| {
            (user == 1).then(|| RecordData::new(user).with_attribute("source", "db"))
        })
        .unwrap();

    assert_eq!(
        store.attribute(Cycle::Daily, SCORE_TYPE, 1, "source"),
        Some(Value::Text("db".to_string()))
    );
    // Loader returns nothing for user 2, so the creator builds it.
    let record = store.resolve(Cycle::Daily, SCORE_TYPE, 2).unwrap();
    assert!(record.attributes().unwrap().is_empty());
}

#[test]
fn test_resolve_without_policies_is_absent() {
    let store = CycleStore::new();
    assert!(store.resolve(Cycle::Lifetime, 4, 1).is_none());
    assert!(store.attributes(Cycle::Lifetime, 4, 1).is_empty());
    assert!(!store.increase_int(Cycle::Lifetime, 4, 1, "score", 1, |_| true));
}

#[test]
fn test_resolution_is_idempotent() {
    let store = CycleStore::new();
    let created = Arc::new(AtomicUsize::new(0));
    let counter = created.clone();
    store
        .register_creator(Cycle::Weekly, 2, move |user| {
            counter.fetch_add(1, Ordering::SeqCst);
            Some(RecordData::new(user))
        })
        .unwrap();

    let first = store.resolve(Cycle::Weekly, 2, 7).unwrap();
    let second = store.resolve(Cycle::Weekly, 2, 7).unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(created.load(Ordering::SeqCst), 1);
}

#[test]
fn test_attributes_returns_a_copy() {
    let store = daily_store();
    assert!(store.set_attribute(Cycle::Daily, SCORE_TYPE, 3, "score", 1i32));

    let mut copy = store.attributes(Cycle::Daily, SCORE_TYPE, 3);
    copy.insert("score".to_string(), Value::Int32(99));

    assert_eq!(
        store.attribute(Cycle::Daily, SCORE_TYPE, 3, "score"),
        Some(Value::Int32(1))
    );
}

#[test]
fn test_set_attributes_uses_creator_not_loader() {
    let store = CycleStore::new();
    let loads = Arc::new(AtomicUsize::new(0));
    let loader_calls = loads.clone();
    store
        .register_loader(Cycle::Daily, SCORE_TYPE, move |_, _, user| {
            loader_calls.fetch_add(1, Ordering::SeqCst);
            Some(RecordData::new(user))
        })
        .unwrap();

    let bag: AttributeBag = HashMap::from([("level".to_string(), Value::Int32(4))]);
    // No creator registered.
    assert!(!store.set_attributes(Cycle::Daily, SCORE_TYPE, 8, bag.clone()));

    store
        .register_creator(Cycle::Daily, SCORE_TYPE, |user| {
            Some(RecordData::new(user).expires_at(1_000))
        })
        .unwrap();
    assert!(store.set_attributes(Cycle::Daily, SCORE_TYPE, 8, bag.clone()));

    let record = store.resolve(Cycle::Daily, SCORE_TYPE, 8).unwrap();
    assert_eq!(record.attributes().unwrap(), bag);
    assert_eq!(record.expire_time().unwrap(), 1_000);
    assert_eq!(loads.load(Ordering::SeqCst), 0);
}

#[test]
fn test_set_attributes_replaces_resident_bag() {
    let store = daily_store();
    assert!(store.set_attribute(Cycle::Daily, SCORE_TYPE, 5, "old", true));
    let before = store
        .resolve(Cycle::Daily, SCORE_TYPE, 5)
        .unwrap()
        .update_time()
        .unwrap();

    let bag: AttributeBag = HashMap::from([("new".to_string(), Value::Bool(true))]);
    assert!(store.set_attributes(Cycle::Daily, SCORE_TYPE, 5, bag));

    let record = store.resolve(Cycle::Daily, SCORE_TYPE, 5).unwrap();
    assert_eq!(record.attribute("old").unwrap(), None);
    assert_eq!(record.attribute("new").unwrap(), Some(Value::Bool(true)));
    assert_eq!(record.update_time().unwrap(), before);
}

#[test]
fn test_flush_keeps_records_resident() {
    let store = daily_store();
    let stored = Arc::new(Mutex::new(Vec::new()));
    let sink = stored.clone();
    store
        .register_storer(Cycle::Daily, SCORE_TYPE, move |_, _, data| {
            sink.lock().unwrap().push(data.user_id);
            Ok(())
        })
        .unwrap();

    for user in 1..=3 {
        assert!(store.increase_int(Cycle::Daily, SCORE_TYPE, user, "score", user, |_| true));
    }

    let report = store.flush(&Cycle::Daily, SCORE_TYPE).unwrap();
    assert_eq!(report.stored, 3);
    assert_eq!(report.failed, 0);

    let mut users = stored.lock().unwrap().clone();
    users.sort();
    assert_eq!(users, vec![1, 2, 3]);
    assert_eq!(store.stats().unwrap().records, 3);
    assert_eq!(
        store.attribute(Cycle::Daily, SCORE_TYPE, 2, "score"),
        Some(Value::Int(2))
    );
}

#[test]
fn test_flush_all_counts_failures_and_skips() {
    let store = daily_store();
    store
        .register_creator(Cycle::Weekly, 9, |user| Some(RecordData::new(user)))
        .unwrap();
    store
        .register_storer(Cycle::Daily, SCORE_TYPE, |_, _, data| {
            if data.user_id == 2 {
                anyhow::bail!("disk full");
            }
            Ok(())
        })
        .unwrap();

    assert!(store.set_attribute(Cycle::Daily, SCORE_TYPE, 1, "a", 1i32));
    assert!(store.set_attribute(Cycle::Daily, SCORE_TYPE, 2, "a", 1i32));
    assert!(store.set_attribute(Cycle::Weekly, 9, 1, "a", 1i32));

    let report = store.flush_all().unwrap();
    assert_eq!(report.stored, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(store.stats().unwrap().records, 3);
}

#[test]
fn test_flush_of_unknown_cycle_is_empty() {
    let store = CycleStore::new();
    let report = store.flush(&Cycle::Custom("season".into()), 1).unwrap();
    assert_eq!(report, Default::default());
}

#[test]
fn test_cycles_are_isolated() {
    let store = daily_store();
    store
        .register_creator(Cycle::Weekly, SCORE_TYPE, |user| Some(RecordData::new(user)))
        .unwrap();

    assert!(store.increase_int(Cycle::Daily, SCORE_TYPE, 1, "score", 3, |_| true));
    assert!(store.increase_int(Cycle::Weekly, SCORE_TYPE, 1, "score", 7, |_| true));

    assert_eq!(store.attribute(Cycle::Daily, SCORE_TYPE, 1, "score"), Some(Value::Int(3)));
    assert_eq!(store.attribute(Cycle::Weekly, SCORE_TYPE, 1, "score"), Some(Value::Int(7)));

    let stats = store.stats().unwrap();
    assert_eq!(stats.cycles, 2);
    assert_eq!(stats.shards, 2);
    assert_eq!(stats.registry.creators, 2);
}
