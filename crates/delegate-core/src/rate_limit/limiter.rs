//! Spawn rate limiter.
//!
//! Every agent spawn is gated per acting user and per organization so that a
//! runaway recursive delegation cannot fan out without bound.
//!
//! The window is a fixed bucket, `floor(now_ms / window_ms)`, used as part
//! of the counter key. This approximates a sliding window with one atomic
//! increment per spawn; a burst straddling a bucket edge can see up to twice
//! the limit across the two buckets.
//!
//! Checking and recording are separate calls. [`SpawnRateLimiter::check_limit`]
//! never mutates, so callers may ask freely; [`SpawnRateLimiter::record_spawn`]
//! commits. The pair is not transactional: concurrent callers can overshoot
//! a limit by one per racer.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use delegate_state::{spawn_limit_key, CounterScope, CounterStore, StorageError, StorageResult};
use serde::{Deserialize, Serialize};

use crate::domain::Result;
use crate::metrics::METRICS;
use crate::obs;
use crate::rate_limit::clock::{Clock, SystemClock};

/// Limits applied per window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Spawns allowed per user per window.
    pub user_limit: u32,
    /// Spawns allowed per organization per window.
    pub org_limit: u32,
    /// Window length in milliseconds.
    pub window_ms: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            user_limit: 10,
            org_limit: 50,
            window_ms: 60_000,
        }
    }
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

/// Verdict for one spawn attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitResult {
    pub allowed: bool,
    /// Spawns still available in the current window (tightest scope).
    pub remaining: u32,
    /// When the current window ends.
    pub reset_at: DateTime<Utc>,
    /// Why the spawn was denied, or why enforcement was skipped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Scope whose limit denied the spawn.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub denied_by: Option<CounterScope>,
}

/// Current-window counters for one user/org pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpawnUsage {
    pub user_count: u64,
    pub user_limit: u32,
    pub org_count: u64,
    pub org_limit: u32,
    pub reset_at: DateTime<Utc>,
}

struct ScopeCheck {
    count: u64,
    remaining: u32,
}

/// Gate for agent spawns backed by a shared [`CounterStore`].
pub struct SpawnRateLimiter {
    store: Arc<dyn CounterStore>,
    config: RateLimitConfig,
    clock: Arc<dyn Clock>,
}

impl SpawnRateLimiter {
    pub fn new(store: Arc<dyn CounterStore>, config: RateLimitConfig) -> Self {
        Self {
            store,
            config,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    fn window_ms(&self) -> u64 {
        self.config.window_ms.max(1)
    }

    fn bucket(&self, now: DateTime<Utc>) -> u64 {
        let now_ms = u64::try_from(now.timestamp_millis()).unwrap_or(0);
        now_ms / self.window_ms()
    }

    fn reset_at(&self, bucket: u64, now: DateTime<Utc>) -> DateTime<Utc> {
        let end_ms = bucket.saturating_add(1).saturating_mul(self.window_ms());
        i64::try_from(end_ms)
            .ok()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
            .unwrap_or(now)
    }

    async fn check_scope(
        &self,
        scope: CounterScope,
        id: &str,
        limit: u32,
        bucket: u64,
    ) -> StorageResult<ScopeCheck> {
        let count = self.store.get(&spawn_limit_key(scope, id, bucket)).await?;
        let remaining = u64::from(limit).saturating_sub(count);
        Ok(ScopeCheck {
            count,
            remaining: u32::try_from(remaining).unwrap_or(u32::MAX),
        })
    }

    fn deny(
        &self,
        scope: CounterScope,
        id: &str,
        limit: u32,
        reset_at: DateTime<Utc>,
    ) -> RateLimitResult {
        obs::emit_spawn_denied(scope.as_str(), id, limit);
        METRICS.inc_spawns_denied(scope.as_str());
        RateLimitResult {
            allowed: false,
            remaining: 0,
            reset_at,
            reason: Some(format!(
                "{scope} spawn limit of {limit} per {}ms exceeded for {id}",
                self.config.window_ms
            )),
            denied_by: Some(scope),
        }
    }

    /// Fail-open policy: when the counter store cannot be read the spawn is
    /// allowed and the reason records why enforcement was skipped.
    fn fail_open(&self, error: StorageError, reset_at: DateTime<Utc>) -> RateLimitResult {
        obs::emit_limiter_fail_open(&error);
        METRICS.inc_limiter_fail_open();
        RateLimitResult {
            allowed: true,
            remaining: self.config.user_limit.min(self.config.org_limit),
            reset_at,
            reason: Some(format!("rate limit check skipped, store unavailable: {error}")),
            denied_by: None,
        }
    }

    /// Probe whether `user_id` in `org_id` may spawn now. Does not count.
    ///
    /// The user counter is checked first; a user denial skips the org check.
    pub async fn check_limit(&self, user_id: &str, org_id: &str) -> RateLimitResult {
        let now = self.clock.now();
        let bucket = self.bucket(now);
        let reset_at = self.reset_at(bucket, now);

        let user = match self
            .check_scope(CounterScope::User, user_id, self.config.user_limit, bucket)
            .await
        {
            Ok(check) => check,
            Err(e) => return self.fail_open(e, reset_at),
        };
        if user.count >= u64::from(self.config.user_limit) {
            return self.deny(CounterScope::User, user_id, self.config.user_limit, reset_at);
        }

        let org = match self
            .check_scope(CounterScope::Org, org_id, self.config.org_limit, bucket)
            .await
        {
            Ok(check) => check,
            Err(e) => return self.fail_open(e, reset_at),
        };
        if org.count >= u64::from(self.config.org_limit) {
            return self.deny(CounterScope::Org, org_id, self.config.org_limit, reset_at);
        }

        // Both scopes share one window, so their reset times coincide.
        let remaining = user.remaining.min(org.remaining);
        obs::emit_spawn_granted(user_id, org_id, remaining);
        METRICS.inc_spawns_granted();
        RateLimitResult {
            allowed: true,
            remaining,
            reset_at,
            reason: None,
            denied_by: None,
        }
    }

    /// Count one spawn against both the user and the org. Store failures
    /// are logged and swallowed.
    pub async fn record_spawn(&self, user_id: &str, org_id: &str) {
        let bucket = self.bucket(self.clock.now());
        let ttl = self.config.window();

        for (scope, id) in [(CounterScope::User, user_id), (CounterScope::Org, org_id)] {
            let key = spawn_limit_key(scope, id, bucket);
            if let Err(e) = self.store.incr_with_expiry(&key, ttl).await {
                obs::emit_spawn_record_failed(user_id, org_id, &e);
            }
        }
    }

    /// Check, and record the spawn only if it was allowed.
    pub async fn check_and_record(&self, user_id: &str, org_id: &str) -> RateLimitResult {
        let result = self.check_limit(user_id, org_id).await;
        if result.allowed {
            self.record_spawn(user_id, org_id).await;
        }
        result
    }

    /// Read both current-window counters without changing them.
    pub async fn usage(&self, user_id: &str, org_id: &str) -> Result<SpawnUsage> {
        let now = self.clock.now();
        let bucket = self.bucket(now);
        let user_count = self
            .store
            .get(&spawn_limit_key(CounterScope::User, user_id, bucket))
            .await?;
        let org_count = self
            .store
            .get(&spawn_limit_key(CounterScope::Org, org_id, bucket))
            .await?;
        Ok(SpawnUsage {
            user_count,
            user_limit: self.config.user_limit,
            org_count,
            org_limit: self.config.org_limit,
            reset_at: self.reset_at(bucket, now),
        })
    }

    /// Administrative override: drop the current-window counters for both
    /// scopes.
    pub async fn reset_limits(&self, user_id: &str, org_id: &str) -> Result<()> {
        let bucket = self.bucket(self.clock.now());
        self.store
            .delete(&spawn_limit_key(CounterScope::User, user_id, bucket))
            .await?;
        self.store
            .delete(&spawn_limit_key(CounterScope::Org, org_id, bucket))
            .await?;
        tracing::info!(
            event = "spawn.limits_reset",
            user_id = %user_id,
            org_id = %org_id,
        );
        Ok(())
    }
}
