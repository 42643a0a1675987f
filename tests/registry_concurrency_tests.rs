//! Concurrency tests for the multiton registry
//!
//! Goal: exactly-once construction per key under racing callers, with
//! every caller observing the same instance.

use multiton::Registry;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

struct Widget {
    args: Vec<i32>,
}

#[test]
fn test_ten_threads_one_construction() {
    let registry: Arc<Registry<Vec<i32>, Widget>> = Arc::new(Registry::new());
    let calls = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(10));

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let registry = Arc::clone(&registry);
            let calls = Arc::clone(&calls);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                registry
                    .get_or_init(vec![4], |args| {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Widget { args: args.clone() }
                    })
                    .unwrap()
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    // All ten callers share one instance, constructed once
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    for window in results.windows(2) {
        assert!(window[0].ptr_eq(&window[1]));
    }
    assert_eq!(results[0].args, vec![4]);

    // A different key constructs a second instance
    let other = registry
        .get_or_init(vec![2], |args| {
            calls.fetch_add(1, Ordering::SeqCst);
            Widget { args: args.clone() }
        })
        .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(!other.ptr_eq(&results[0]));

    // Query and reset round out the scenario
    assert!(registry.is_initialized(&vec![4]).unwrap());
    assert!(!registry.is_initialized(&vec![7]).unwrap());
    registry.reset();
    assert!(!registry.is_initialized(&vec![4]).unwrap());
}

#[test]
fn test_racing_distinct_keys_construct_once_each() {
    let registry: Arc<Registry<u32, u32>> = Arc::new(Registry::new());
    let calls = Arc::new(AtomicUsize::new(0));
    let keys = 8u32;
    let threads_per_key = 4;
    let barrier = Arc::new(Barrier::new((keys as usize) * threads_per_key));

    let mut handles = Vec::new();
    for key in 0..keys {
        for _ in 0..threads_per_key {
            let registry = Arc::clone(&registry);
            let calls = Arc::clone(&calls);
            let barrier = Arc::clone(&barrier);
            handles.push(thread::spawn(move || {
                barrier.wait();
                registry
                    .get_or_init(key, |k| {
                        calls.fetch_add(1, Ordering::SeqCst);
                        k * 100
                    })
                    .unwrap()
            }));
        }
    }

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(calls.load(Ordering::SeqCst), keys as usize);
    assert_eq!(registry.len(), keys as usize);
    for key in 0..keys {
        assert_eq!(*registry.get_or_init(key, |k| k * 100).unwrap(), key * 100);
    }
}

#[test]
fn test_latecomer_sees_winners_instance() {
    let registry: Arc<Registry<u32, String>> = Arc::new(Registry::new());

    let winner = registry
        .get_or_init(4, |_| "winner".to_string())
        .unwrap();

    // Arrivals after the construction hit the fast path and never run
    // their own constructor
    let late = registry
        .get_or_init(4, |_| unreachable!("fast path must not construct"))
        .unwrap();
    assert!(winner.ptr_eq(&late));
    assert_eq!(*late, "winner");
}

#[test]
fn test_failed_construction_does_not_block_other_threads() {
    let registry: Arc<Registry<u32, String>> = Arc::new(Registry::new());
    let attempts = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(4));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let registry = Arc::clone(&registry);
            let attempts = Arc::clone(&attempts);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                registry.get_or_create(4, |_| {
                    // First attempt fails, later attempts succeed
                    if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err("transient failure")
                    } else {
                        Ok("recovered".to_string())
                    }
                })
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let successes = results.iter().filter(|r| r.is_ok()).count();
    let failures = results.iter().filter(|r| r.is_err()).count();

    // Exactly one caller can observe the transient failure; everyone else
    // either retried behind it or shared the recovered instance
    assert_eq!(failures, 1);
    assert!(successes >= 1);
    assert!(registry.is_initialized(&4).unwrap());
    for result in results.into_iter().flatten() {
        assert_eq!(*result, "recovered");
    }
}

#[test]
fn test_reset_between_rounds_reconstructs() {
    let registry: Arc<Registry<u32, u64>> = Arc::new(Registry::new());
    let calls = Arc::new(AtomicUsize::new(0));

    for round in 0..3 {
        let handle = registry
            .get_or_init(4, |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                42
            })
            .unwrap();
        assert_eq!(*handle, 42);
        assert_eq!(calls.load(Ordering::SeqCst), round + 1);
        registry.reset();
    }
}
