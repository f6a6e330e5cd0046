//! In-process counter stores
//!
//! Provides `MemoryCounterStore`, which satisfies the [`CounterStore`]
//! contract without any external dependency, and `UnavailableCounterStore`,
//! which fails every call (used to exercise fail-open paths).

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::counter_store::{CounterStore, StorageResult};
use crate::error::StorageError;

// ---------------------------------------------------------------------------
// MemoryCounterStore
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct Entry {
    count: u64,
    expires_at: Instant,
}

#[derive(Debug, Default)]
struct Counters {
    entries: HashMap<String, Entry>,
    /// Lower bound on the earliest expiry in `entries`.
    next_sweep: Option<Instant>,
}

impl Counters {
    fn sweep(&mut self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, e| e.expires_at > now);
        self.next_sweep = self.entries.values().map(|e| e.expires_at).min();
        before - self.entries.len()
    }

    fn sweep_if_due(&mut self, now: Instant) {
        if self.next_sweep.is_some_and(|at| at <= now) {
            self.sweep(now);
        }
    }
}

/// In-memory counter store backed by a `HashMap<key, (count, expiry)>`.
///
/// Atomicity comes from the single mutex around the map. Expired keys are
/// swept on increment once the earliest known expiry has passed, so the map
/// only holds keys from the current windows.
#[derive(Debug, Default)]
pub struct MemoryCounterStore {
    counters: Mutex<Counters>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (unexpired) keys.
    pub fn live_keys(&self) -> usize {
        let now = Instant::now();
        self.lock()
            .map(|c| c.entries.values().filter(|e| e.expires_at > now).count())
            .unwrap_or(0)
    }

    /// Number of keys held in memory, expired or not.
    pub fn stored_keys(&self) -> usize {
        self.lock().map(|c| c.entries.len()).unwrap_or(0)
    }

    /// Drop every expired key now. Returns how many were removed.
    pub fn purge_expired(&self) -> StorageResult<usize> {
        Ok(self.lock()?.sweep(Instant::now()))
    }

    fn lock(&self) -> StorageResult<std::sync::MutexGuard<'_, Counters>> {
        self.counters
            .lock()
            .map_err(|e| StorageError::Backend(format!("counter map poisoned: {e}")))
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn incr_with_expiry(&self, key: &str, ttl: Duration) -> StorageResult<u64> {
        let now = Instant::now();
        let expires_at = now + ttl;
        let mut counters = self.lock()?;
        counters.sweep_if_due(now);

        let entry = counters.entries.entry(key.to_string()).or_insert(Entry {
            count: 0,
            expires_at,
        });
        if entry.expires_at <= now {
            entry.count = 0;
        }
        entry.count += 1;
        entry.expires_at = expires_at;
        let count = entry.count;

        counters.next_sweep = Some(match counters.next_sweep {
            Some(at) => at.min(expires_at),
            None => expires_at,
        });
        Ok(count)
    }

    async fn get(&self, key: &str) -> StorageResult<u64> {
        let now = Instant::now();
        let counters = self.lock()?;
        Ok(counters
            .entries
            .get(key)
            .filter(|e| e.expires_at > now)
            .map(|e| e.count)
            .unwrap_or(0))
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.lock()?.entries.remove(key);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// UnavailableCounterStore
// ---------------------------------------------------------------------------

/// A store that is never reachable.
#[derive(Debug, Clone)]
pub struct UnavailableCounterStore {
    reason: String,
}

impl UnavailableCounterStore {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl Default for UnavailableCounterStore {
    fn default() -> Self {
        Self::new("connection refused")
    }
}

#[async_trait]
impl CounterStore for UnavailableCounterStore {
    async fn incr_with_expiry(&self, _key: &str, _ttl: Duration) -> StorageResult<u64> {
        Err(StorageError::Unavailable(self.reason.clone()))
    }

    async fn get(&self, _key: &str) -> StorageResult<u64> {
        Err(StorageError::Unavailable(self.reason.clone()))
    }

    async fn delete(&self, _key: &str) -> StorageResult<()> {
        Err(StorageError::Unavailable(self.reason.clone()))
    }
}
