use core_logic::{NonceAllocator, NonceError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const ADDR: &str = "0x00000000000000000000000000000000000000aa";

#[test]
fn test_reserve_advances_after_commit() {
    let allocator = NonceAllocator::new();
    allocator.seed(ADDR, 10);

    let first = allocator.reserve(ADDR).unwrap();
    allocator.commit(ADDR, first).unwrap();
    let second = allocator.reserve(ADDR).unwrap();

    assert_eq!(first, 10);
    assert_eq!(second, 11);
}

#[test]
fn test_release_makes_nonce_reusable() {
    let allocator = NonceAllocator::new();
    allocator.seed(ADDR, 3);

    let n = allocator.reserve(ADDR).unwrap();
    allocator.release(ADDR, n).unwrap();

    assert_eq!(allocator.reserve(ADDR).unwrap(), n);
}

#[test]
fn test_release_wrong_nonce_is_state_mismatch() {
    let allocator = NonceAllocator::new();
    allocator.seed(ADDR, 3);
    let n = allocator.reserve(ADDR).unwrap();

    let err = allocator.release(ADDR, n + 1).unwrap_err();
    assert_eq!(
        err,
        NonceError::StateMismatch {
            address: ADDR.to_string(),
            expected: Some(n),
            got: n + 1,
        }
    );

    // State untouched: the real reservation can still be released.
    assert_eq!(allocator.outstanding(ADDR), Some(n));
    allocator.release(ADDR, n).unwrap();
}

#[test]
fn test_release_without_reservation_is_state_mismatch() {
    let allocator = NonceAllocator::new();
    allocator.seed(ADDR, 0);

    assert!(matches!(
        allocator.release(ADDR, 0),
        Err(NonceError::StateMismatch { expected: None, .. })
    ));
}

#[test]
fn test_release_after_commit_is_rejected() {
    let allocator = NonceAllocator::new();
    allocator.seed(ADDR, 0);
    let n = allocator.reserve(ADDR).unwrap();
    allocator.commit(ADDR, n).unwrap();

    assert!(allocator.release(ADDR, n).is_err());
    assert_eq!(allocator.peek_next(ADDR), Some(1));
}

#[test]
fn test_at_most_one_outstanding_reservation() {
    let allocator = NonceAllocator::new();
    allocator.seed(ADDR, 0);
    let n = allocator.reserve(ADDR).unwrap();

    assert_eq!(
        allocator.reserve(ADDR),
        Err(NonceError::AlreadyReserved {
            address: ADDR.to_string(),
            outstanding: n,
        })
    );
    assert_eq!(allocator.outstanding(ADDR), Some(n));
}

#[test]
fn test_addresses_are_case_insensitive() {
    let allocator = NonceAllocator::new();
    allocator.seed("0xABCDEF", 1);

    assert_eq!(allocator.reserve("0xabcdef").unwrap(), 1);
}

#[test]
fn test_unseeded_reserve_fails() {
    let allocator = NonceAllocator::new();
    assert!(matches!(
        allocator.reserve(ADDR),
        Err(NonceError::NotSeeded { .. })
    ));
}

#[tokio::test]
async fn test_reserve_or_seed_fetches_once() {
    let allocator = NonceAllocator::new();
    let fetches = Arc::new(AtomicUsize::new(0));

    for expected in 42..45 {
        let counter = fetches.clone();
        let n = allocator
            .reserve_or_seed(ADDR, || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<u64, String>(42)
            })
            .await
            .unwrap();
        assert_eq!(n, expected);
        allocator.commit(ADDR, n).unwrap();
    }

    assert_eq!(fetches.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_reserve_or_seed_surfaces_fetch_error() {
    let allocator = NonceAllocator::new();

    let result = allocator
        .reserve_or_seed(ADDR, || async { Err::<u64, _>("rpc down") })
        .await;

    assert!(matches!(result, Err(NonceError::SeedFailed { .. })));
    assert!(!allocator.is_seeded(ADDR));
}

#[tokio::test]
async fn test_concurrent_addresses_are_independent() {
    let allocator = Arc::new(NonceAllocator::new());
    let mut handles = Vec::new();

    for i in 0..16u64 {
        let allocator = allocator.clone();
        handles.push(tokio::spawn(async move {
            let address = format!("0x{:040x}", i);
            allocator.seed(&address, i * 100);
            let mut seen = Vec::new();
            for _ in 0..50 {
                let n = allocator.reserve(&address).unwrap();
                allocator.commit(&address, n).unwrap();
                seen.push(n);
            }
            (i, seen)
        }));
    }

    for handle in handles {
        let (i, seen) = handle.await.unwrap();
        let expected: Vec<u64> = (i * 100..i * 100 + 50).collect();
        assert_eq!(seen, expected);
    }
}
