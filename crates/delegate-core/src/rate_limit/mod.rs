//! Per-user and per-organization spawn rate limiting.
//!
//! Counters live in a shared [`delegate_state::CounterStore`] so every
//! orchestrator instance sees the same totals. The limiter fails open when
//! that store is unreachable.

pub mod clock;
pub mod limiter;

pub use clock::{Clock, ManualClock, SystemClock};
pub use limiter::{RateLimitConfig, RateLimitResult, SpawnRateLimiter, SpawnUsage};
