//! Trait contract tests for CounterStore.
//!
//! Every conforming implementation must pass the same behavioural checks.
//! The in-memory fake and the SurrealDB backend (in `mem://` mode) are both
//! exercised here.

use std::sync::Arc;
use std::time::Duration;

use delegate_state::fakes::{MemoryCounterStore, UnavailableCounterStore};
use delegate_state::{spawn_limit_key, CounterScope, CounterStore, StorageError, SurrealCounterStore};

const WINDOW: Duration = Duration::from_secs(60);

async fn contract_increment_is_monotonic(store: &dyn CounterStore) {
    let key = spawn_limit_key(CounterScope::User, "alice", 1);
    assert_eq!(store.incr_with_expiry(&key, WINDOW).await.unwrap(), 1);
    assert_eq!(store.incr_with_expiry(&key, WINDOW).await.unwrap(), 2);
    assert_eq!(store.incr_with_expiry(&key, WINDOW).await.unwrap(), 3);
    assert_eq!(store.get(&key).await.unwrap(), 3);
}

async fn contract_absent_key_reads_zero(store: &dyn CounterStore) {
    let key = spawn_limit_key(CounterScope::Org, "nobody", 7);
    assert_eq!(store.get(&key).await.unwrap(), 0);
}

async fn contract_keys_are_independent(store: &dyn CounterStore) {
    let user = spawn_limit_key(CounterScope::User, "bob", 5);
    let org = spawn_limit_key(CounterScope::Org, "bob", 5);
    let next_bucket = spawn_limit_key(CounterScope::User, "bob", 6);

    store.incr_with_expiry(&user, WINDOW).await.unwrap();
    store.incr_with_expiry(&user, WINDOW).await.unwrap();
    store.incr_with_expiry(&org, WINDOW).await.unwrap();

    assert_eq!(store.get(&user).await.unwrap(), 2);
    assert_eq!(store.get(&org).await.unwrap(), 1);
    assert_eq!(store.get(&next_bucket).await.unwrap(), 0);
}

async fn contract_delete_resets(store: &dyn CounterStore) {
    let key = spawn_limit_key(CounterScope::User, "carol", 9);
    store.incr_with_expiry(&key, WINDOW).await.unwrap();
    store.delete(&key).await.unwrap();
    assert_eq!(store.get(&key).await.unwrap(), 0);
    // deleting again is a no-op
    store.delete(&key).await.unwrap();
    assert_eq!(store.incr_with_expiry(&key, WINDOW).await.unwrap(), 1);
}

// ===========================================================================
// MemoryCounterStore
// ===========================================================================

#[tokio::test]
async fn memory_increment_is_monotonic() {
    contract_increment_is_monotonic(&MemoryCounterStore::new()).await;
}

#[tokio::test]
async fn memory_absent_key_reads_zero() {
    contract_absent_key_reads_zero(&MemoryCounterStore::new()).await;
}

#[tokio::test]
async fn memory_keys_are_independent() {
    contract_keys_are_independent(&MemoryCounterStore::new()).await;
}

#[tokio::test]
async fn memory_delete_resets() {
    contract_delete_resets(&MemoryCounterStore::new()).await;
}

#[tokio::test]
async fn memory_expired_key_reads_zero_and_restarts() {
    let store = MemoryCounterStore::new();
    let key = spawn_limit_key(CounterScope::User, "dave", 1);
    store
        .incr_with_expiry(&key, Duration::from_millis(20))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(40)).await;

    assert_eq!(store.get(&key).await.unwrap(), 0);
    assert_eq!(store.live_keys(), 0);
    assert_eq!(store.incr_with_expiry(&key, WINDOW).await.unwrap(), 1);
}

#[tokio::test]
async fn memory_expired_keys_are_swept_on_increment() {
    let store = MemoryCounterStore::new();
    for i in 0..1000 {
        let key = spawn_limit_key(CounterScope::User, &format!("user-{i}"), 1);
        store
            .incr_with_expiry(&key, Duration::from_millis(1))
            .await
            .unwrap();
    }
    assert_eq!(store.stored_keys(), 1000);
    tokio::time::sleep(Duration::from_millis(20)).await;

    let key = spawn_limit_key(CounterScope::User, "fresh", 2);
    assert_eq!(store.incr_with_expiry(&key, WINDOW).await.unwrap(), 1);
    assert_eq!(store.stored_keys(), 1);
    assert_eq!(store.live_keys(), 1);
}

#[tokio::test]
async fn memory_purge_removes_only_expired_keys() {
    let store = MemoryCounterStore::new();
    let stale = spawn_limit_key(CounterScope::Org, "old", 1);
    let live = spawn_limit_key(CounterScope::Org, "new", 1);
    store
        .incr_with_expiry(&stale, Duration::from_millis(5))
        .await
        .unwrap();
    store.incr_with_expiry(&live, WINDOW).await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(store.purge_expired().unwrap(), 1);
    assert_eq!(store.stored_keys(), 1);
    assert_eq!(store.get(&live).await.unwrap(), 1);
    assert_eq!(store.purge_expired().unwrap(), 0);
}

#[tokio::test]
async fn memory_concurrent_increments_are_not_lost() {
    let store = Arc::new(MemoryCounterStore::new());
    let key = spawn_limit_key(CounterScope::Org, "acme", 3);

    let mut handles = Vec::new();
    for _ in 0..32 {
        let store = Arc::clone(&store);
        let key = key.clone();
        handles.push(tokio::spawn(async move {
            store.incr_with_expiry(&key, WINDOW).await.unwrap()
        }));
    }
    let mut seen = Vec::new();
    for h in handles {
        seen.push(h.await.unwrap());
    }
    seen.sort_unstable();
    assert_eq!(seen, (1..=32).collect::<Vec<u64>>());
    assert_eq!(store.get(&key).await.unwrap(), 32);
}

// ===========================================================================
// UnavailableCounterStore
// ===========================================================================

#[tokio::test]
async fn unavailable_store_fails_every_call() {
    let store = UnavailableCounterStore::new("redis down");
    let key = spawn_limit_key(CounterScope::User, "erin", 1);

    assert!(matches!(
        store.get(&key).await,
        Err(StorageError::Unavailable(_))
    ));
    assert!(matches!(
        store.incr_with_expiry(&key, WINDOW).await,
        Err(StorageError::Unavailable(_))
    ));
    assert!(matches!(
        store.delete(&key).await,
        Err(StorageError::Unavailable(_))
    ));
}

// ===========================================================================
// SurrealCounterStore (mem://)
// ===========================================================================

#[tokio::test]
async fn surreal_increment_is_monotonic() {
    let store = SurrealCounterStore::in_memory().await.unwrap();
    contract_increment_is_monotonic(&store).await;
}

#[tokio::test]
async fn surreal_absent_key_reads_zero() {
    let store = SurrealCounterStore::in_memory().await.unwrap();
    contract_absent_key_reads_zero(&store).await;
}

#[tokio::test]
async fn surreal_keys_are_independent() {
    let store = SurrealCounterStore::in_memory().await.unwrap();
    contract_keys_are_independent(&store).await;
}

#[tokio::test]
async fn surreal_delete_resets() {
    let store = SurrealCounterStore::in_memory().await.unwrap();
    contract_delete_resets(&store).await;
}

#[tokio::test]
async fn surreal_purge_removes_only_expired_rows() {
    let store = SurrealCounterStore::in_memory().await.unwrap();
    let short = spawn_limit_key(CounterScope::User, "frank", 1);
    let long = spawn_limit_key(CounterScope::User, "frank", 2);

    store
        .incr_with_expiry(&short, Duration::from_millis(10))
        .await
        .unwrap();
    store.incr_with_expiry(&long, WINDOW).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let removed = store.purge_expired().await.unwrap();
    assert_eq!(removed, 1);
    assert_eq!(store.get(&short).await.unwrap(), 0);
    assert_eq!(store.get(&long).await.unwrap(), 1);
}
