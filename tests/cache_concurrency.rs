//! Concurrency Tests for the Object Cache
//!
//! Hammers one cache from several threads and checks that pin accounting,
//! faulting and sweeping stay consistent.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use pincache::{
    CacheConfig, ManualScheduler, ObjectCache, SweepConfig, SweepEvictionStrategy,
    SweepSchedulers,
};

const THREADS: usize = 8;

fn shared_cache(unique_keys: bool) -> Arc<ObjectCache<String, usize>> {
    Arc::new(ObjectCache::new(
        CacheConfig::new("concurrency", 13).with_unique_keys(unique_keys),
    ))
}

#[test]
fn test_parallel_inserts_are_all_counted() {
    let cache = shared_cache(true);
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let cache = Arc::clone(&cache);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for i in 0..200 {
                    cache.insert_unpinned(format!("{t}-{i}"), i).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(cache.size(), THREADS * 200);
    assert_eq!(cache.enumerate_elements().count(), THREADS * 200);
}

#[test]
fn test_pins_on_one_key_balance_out() {
    let cache = shared_cache(true);
    let element = cache.insert_unpinned("hot".to_string(), 0).unwrap();
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let cache = Arc::clone(&cache);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let key = "hot".to_string();
                barrier.wait();
                for _ in 0..500 {
                    assert_eq!(cache.find(&key), Some(0));
                    cache.pin(&key).unwrap();
                    cache.unpin(&key).unwrap();
                    cache.unpin(&key).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(element.pin_count(), 0);
    assert_eq!(cache.stats().hits, (THREADS * 500) as u64);
}

#[test]
fn test_concurrent_misses_fault_once() {
    let cache = shared_cache(true);
    let faults = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&faults);
    cache.set_fault_strategy(Arc::new(
        move |_: &String| -> anyhow::Result<Option<usize>> {
            counter.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(20));
            Ok(Some(42))
        },
    ));
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let cache = Arc::clone(&cache);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                cache.find_or_fault(&"lazy".to_string()).unwrap()
            })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap(), Some(42));
    }

    assert_eq!(faults.load(Ordering::SeqCst), 1);
    assert_eq!(cache.size(), 1);
}

#[test]
fn test_removal_races_with_pinning() {
    let cache = shared_cache(true);
    for i in 0..100 {
        cache.insert_unpinned(format!("k{i}"), i).unwrap();
    }
    let barrier = Arc::new(Barrier::new(2));

    let pinner = {
        let cache = Arc::clone(&cache);
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || {
            barrier.wait();
            let mut held = Vec::new();
            for i in 0..100 {
                if cache.pin(&format!("k{i}")).is_ok() {
                    held.push(i);
                }
            }
            held
        })
    };
    let remover = {
        let cache = Arc::clone(&cache);
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || {
            barrier.wait();
            let mut removed = Vec::new();
            for i in (0..100).rev() {
                if let Ok(Some(_)) = cache.remove(&format!("k{i}"), false) {
                    removed.push(i);
                }
            }
            removed
        })
    };

    let held = pinner.join().unwrap();
    let removed = remover.join().unwrap();

    for i in 0..100 {
        let pinned = held.contains(&i);
        let gone = removed.contains(&i);
        // a pinned object cannot be removed without drop_ref
        assert!(!(gone && pinned), "k{i} removed while pinned");
        assert_eq!(cache.contains(&format!("k{i}")), !gone);
    }
    assert_eq!(cache.size(), 100 - removed.len());
}

#[test]
fn test_sweep_runs_alongside_readers() {
    let cache = shared_cache(true);
    let scheduler = Arc::new(ManualScheduler::new());
    let strategy = SweepEvictionStrategy::background(
        &cache,
        SweepConfig::new(0, Duration::from_secs(60)),
        SweepSchedulers::shared(scheduler.clone()),
    );
    let anchor = cache.insert("anchor".to_string(), 0).unwrap();
    for i in 0..500 {
        cache.insert_unpinned(format!("k{i}"), i).unwrap();
    }
    let barrier = Arc::new(Barrier::new(THREADS + 1));

    let readers: Vec<_> = (0..THREADS)
        .map(|t| {
            let cache = Arc::clone(&cache);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for round in 0..200 {
                    let key = format!("k{}", (t * 61 + round * 7) % 500);
                    if cache.find(&key).is_some() {
                        cache.unpin(&key).unwrap();
                    }
                }
            })
        })
        .collect();

    barrier.wait();
    for _ in 0..10 {
        scheduler.run_pending();
    }
    for reader in readers {
        reader.join().unwrap();
    }

    assert!(cache.contains(&"anchor".to_string()));
    assert_eq!(anchor.pin_count(), 1);
    assert_eq!(strategy.stats().firings, 10);
    assert_eq!(
        cache.size(),
        cache.enumerate_elements().count(),
        "size counter drifted from contents"
    );
}
