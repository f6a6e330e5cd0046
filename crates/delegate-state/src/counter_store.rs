//! Counter store trait for windowed spawn limits
//!
//! A counter store is a key/value store whose values are integer counters
//! with a time-to-live. Implementations must make `incr_with_expiry` atomic
//! per key: two replicas incrementing the same key concurrently must both
//! observe distinct results.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StorageError;

/// Result type for counter store operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Who a spawn counter is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CounterScope {
    User,
    Org,
}

impl CounterScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            CounterScope::User => "user",
            CounterScope::Org => "org",
        }
    }
}

impl std::fmt::Display for CounterScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build the storage key for one scope/id/window bucket.
///
/// Shape: `spawn_limit:{scope}:{id}:{bucket}`.
pub fn spawn_limit_key(scope: CounterScope, id: &str, bucket: u64) -> String {
    format!("spawn_limit:{}:{}:{}", scope, id, bucket)
}

/// Shared atomic counter storage.
///
/// Guarantees:
/// - `incr_with_expiry(key, ttl)` returns the post-increment value and is
///   atomic per key.
/// - `get(key)` returns `0` for absent or expired keys.
/// - `delete(key)` is a no-op for absent keys.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Increment `key` by one, (re)setting its expiry to `ttl`.
    async fn incr_with_expiry(&self, key: &str, ttl: Duration) -> StorageResult<u64>;

    /// Read the current value of `key`.
    async fn get(&self, key: &str) -> StorageResult<u64>;

    /// Remove `key`.
    async fn delete(&self, key: &str) -> StorageResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_shape() {
        assert_eq!(
            spawn_limit_key(CounterScope::User, "u-1", 42),
            "spawn_limit:user:u-1:42"
        );
        assert_eq!(
            spawn_limit_key(CounterScope::Org, "acme", 0),
            "spawn_limit:org:acme:0"
        );
    }
}
