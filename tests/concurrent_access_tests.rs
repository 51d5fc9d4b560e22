use chrono::Utc;
use cyclestate::{Cycle, CycleStore, RecordData, StoreConfig, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex};
use std::thread;
use std::time::Duration;

fn counting_store(created: Arc<AtomicUsize>) -> CycleStore {
    let store = CycleStore::new();
    store
        .register_creator(Cycle::Daily, 1, move |user| {
            created.fetch_add(1, Ordering::SeqCst);
            Some(RecordData::new(user))
        })
        .unwrap();
    store
}

#[test]
fn test_concurrent_resolution_creates_once() {
    let created = Arc::new(AtomicUsize::new(0));
    let store = counting_store(created.clone());
    let barrier = Arc::new(Barrier::new(16));

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let store = store.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                store.resolve(Cycle::Daily, 1, 42).unwrap()
            })
        })
        .collect();

    let records: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(created.load(Ordering::SeqCst), 1);
    assert!(records.iter().all(|r| Arc::ptr_eq(r, &records[0])));
}

#[test]
fn test_concurrent_increments_are_not_lost() {
    let store = counting_store(Arc::new(AtomicUsize::new(0)));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let store = store.clone();
            thread::spawn(move || {
                for _ in 0..100 {
                    assert!(store.increase_int(Cycle::Daily, 1, 7, "score", 1, |_| true));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(store.attribute(Cycle::Daily, 1, 7, "score"), Some(Value::Int(800)));
}

#[test]
fn test_concurrent_guarded_decrease_never_goes_negative() {
    let store = counting_store(Arc::new(AtomicUsize::new(0)));
    assert!(store.increase_int(Cycle::Daily, 1, 7, "gold", 50, |_| true));

    let successes = Arc::new(AtomicUsize::new(0));
    let handles: Vec<_> = (0..10)
        .map(|_| {
            let store = store.clone();
            let successes = successes.clone();
            thread::spawn(move || {
                for _ in 0..10 {
                    if store.decrease_int(Cycle::Daily, 1, 7, "gold", 1) {
                        successes.fetch_add(1, Ordering::SeqCst);
                    }
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(successes.load(Ordering::SeqCst), 50);
    assert_eq!(store.attribute(Cycle::Daily, 1, 7, "gold"), Some(Value::Int(0)));
}

#[test]
fn test_increments_survive_concurrent_reclamation() {
    let store = counting_store(Arc::new(AtomicUsize::new(0)));
    let sink: Arc<Mutex<HashMap<i64, HashMap<String, Value>>>> = Arc::default();
    let saved = sink.clone();
    store
        .register_storer(Cycle::Daily, 1, move |_, _, data| {
            saved
                .lock()
                .unwrap()
                .insert(data.user_id, data.attributes.clone());
            Ok(())
        })
        .unwrap();
    let source = sink.clone();
    store
        .register_loader(Cycle::Daily, 1, move |_, _, user| {
            let attributes = source.lock().unwrap().get(&user).cloned()?;
            Some(RecordData::new(user).with_attributes(attributes))
        })
        .unwrap();

    let done = Arc::new(AtomicBool::new(false));
    let reclaimer = {
        let store = store.clone();
        let done = done.clone();
        thread::spawn(move || {
            while !done.load(Ordering::SeqCst) {
                let later = Utc::now() + chrono::Duration::days(1);
                store.reclaim_cold_at(&Cycle::Daily, later).unwrap();
            }
        })
    };

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let store = store.clone();
            thread::spawn(move || {
                for _ in 0..100 {
                    assert!(store.increase_int(Cycle::Daily, 1, 7, "score", 1, |_| true));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    done.store(true, Ordering::SeqCst);
    reclaimer.join().unwrap();

    assert_eq!(store.attribute(Cycle::Daily, 1, 7, "score"), Some(Value::Int(800)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_resolution_from_tasks_creates_once() {
    let created = Arc::new(AtomicUsize::new(0));
    let store = counting_store(created.clone());

    let mut tasks = Vec::new();
    for user in 0..4 {
        for _ in 0..8 {
            let store = store.clone();
            tasks.push(tokio::task::spawn_blocking(move || {
                store.resolve(Cycle::Daily, 1, user).is_some()
            }));
        }
    }
    for task in tasks {
        assert!(task.await.unwrap());
    }

    assert_eq!(created.load(Ordering::SeqCst), 4);
    assert_eq!(store.stats().unwrap().records, 4);
}

#[tokio::test]
async fn test_sweep_worker_evicts_and_stops() {
    let store = CycleStore::with_config(
        StoreConfig::new()
            .sweep_interval(Duration::from_millis(20))
            .cold_threshold(Duration::ZERO),
    );
    let stored = Arc::new(AtomicUsize::new(0));
    let counter = stored.clone();
    store
        .register_creator(Cycle::Daily, 1, |user| Some(RecordData::new(user)))
        .unwrap();
    store
        .register_storer(Cycle::Daily, 1, move |_, _, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .unwrap();
    assert!(store.set_attribute(Cycle::Daily, 1, 1, "score", 1i32));

    let worker = store.spawn_sweeper();
    assert!(worker.is_running());

    let mut evicted = false;
    for _ in 0..100 {
        tokio::time::sleep(Duration::from_millis(10)).await;
        if store.stats().unwrap().records == 0 {
            evicted = true;
            break;
        }
    }

    worker.stop().await.unwrap();
    assert!(evicted);
    assert_eq!(stored.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_dropping_worker_stops_sweeps() {
    let store = CycleStore::with_config(
        StoreConfig::new()
            .sweep_interval(Duration::from_millis(10))
            .cold_threshold(Duration::ZERO),
    );
    store
        .register_creator(Cycle::Daily, 1, |user| Some(RecordData::new(user)))
        .unwrap();
    store
        .register_storer(Cycle::Daily, 1, |_, _, _| Ok(()))
        .unwrap();

    drop(store.spawn_sweeper());
    assert!(store.set_attribute(Cycle::Daily, 1, 1, "score", 1i32));
    tokio::time::sleep(Duration::from_millis(60)).await;

    assert_eq!(store.stats().unwrap().records, 1);
}
