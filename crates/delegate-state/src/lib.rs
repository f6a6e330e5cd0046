//! Delegate-State: shared counter storage for the delegation core
//!
//! The spawn rate limiter keeps its windowed counters outside the
//! orchestrator process so that every replica sees the same totals. This
//! crate owns that boundary.
//!
//! ## Key Components
//!
//! - `CounterStore`: async trait for atomic increment-with-expiry counters
//! - `MemoryCounterStore`: in-process implementation (tests, single replica)
//! - `SurrealCounterStore`: SurrealDB-backed implementation (shared store)
//! - `CloudConfig`: connection settings read from the environment

pub mod counter_store;
mod error;
pub mod fakes;
mod handle;
mod migrations;
pub mod surreal_counter;

pub use counter_store::{spawn_limit_key, CounterScope, CounterStore, StorageResult};
pub use error::StorageError;
pub use handle::CloudConfig;
pub use surreal_counter::SurrealCounterStore;
