//! SurrealDB-backed CounterStore implementation
//!
//! Each counter is a record `spawn_counter:⟨key⟩`. Increments use a single
//! `UPSERT … SET count += 1` statement, which SurrealDB executes atomically
//! per record.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use surrealdb::engine::any::Any;
use surrealdb::Surreal;
use tracing::{debug, info};

use crate::counter_store::{CounterStore, StorageResult};
use crate::error::StorageError;
use crate::handle::{connect_cloud, connect_url, CloudConfig};
use crate::migrations::{self, COUNTER_TABLE};

#[derive(Debug, Deserialize)]
struct CounterRow {
    count: i64,
}

/// SurrealDB-backed implementation of [`CounterStore`].
pub struct SurrealCounterStore {
    db: Surreal<Any>,
}

impl SurrealCounterStore {
    /// Create an in-memory instance for testing.
    pub async fn in_memory() -> StorageResult<Self> {
        let db = connect_url("mem://").await?;
        migrations::init_schema(&db).await?;
        info!("SurrealCounterStore connected (in-memory)");
        Ok(Self { db })
    }

    /// Connect to an explicit URL (`ws://`, `surrealkv://`, `mem://`, ...).
    pub async fn connect(url: &str) -> StorageResult<Self> {
        let db = connect_url(url).await?;
        migrations::init_schema(&db).await?;
        info!("SurrealCounterStore connected ({})", url);
        Ok(Self { db })
    }

    /// Connect to an authenticated endpoint.
    pub async fn connect_cloud(config: &CloudConfig) -> StorageResult<Self> {
        let db = connect_cloud(config).await?;
        migrations::init_schema(&db).await?;
        info!("SurrealCounterStore connected (cloud)");
        Ok(Self { db })
    }

    /// Create from environment variables.
    ///
    /// Prefers cloud credentials (`SURREALDB_ENDPOINT` …), then
    /// `SURREALDB_URL`, then falls back to an in-memory database.
    pub async fn from_env() -> StorageResult<Self> {
        if let Some(config) = CloudConfig::from_env() {
            return Self::connect_cloud(&config).await;
        }
        if let Ok(url) = std::env::var("SURREALDB_URL") {
            return Self::connect(&url).await;
        }
        info!("No SurrealDB config found, using in-memory counters");
        Self::in_memory().await
    }

    /// Delete every counter whose window has elapsed. Returns rows removed.
    pub async fn purge_expired(&self) -> StorageResult<usize> {
        let mut res = self
            .db
            .query("DELETE type::table($tb) WHERE expires_at <= time::now() RETURN BEFORE")
            .bind(("tb", COUNTER_TABLE))
            .await?;
        let removed: Vec<CounterRow> = res.take(0)?;
        debug!(removed = removed.len(), "purged expired spawn counters");
        Ok(removed.len())
    }

    fn to_count(row: Option<CounterRow>) -> StorageResult<u64> {
        match row {
            None => Ok(0),
            Some(r) => u64::try_from(r.count)
                .map_err(|_| StorageError::Backend(format!("negative counter value {}", r.count))),
        }
    }
}

#[async_trait]
impl CounterStore for SurrealCounterStore {
    async fn incr_with_expiry(&self, key: &str, ttl: Duration) -> StorageResult<u64> {
        let ttl = format!("{}ms", ttl.as_millis());
        let mut res = self
            .db
            .query(
                "UPSERT type::thing($tb, $key) \
                 SET count += 1, expires_at = time::now() + <duration>$ttl \
                 RETURN AFTER",
            )
            .bind(("tb", COUNTER_TABLE))
            .bind(("key", key.to_string()))
            .bind(("ttl", ttl))
            .await?;
        let rows: Vec<CounterRow> = res.take(0)?;
        let row = rows.into_iter().next().ok_or_else(|| {
            StorageError::Backend(format!("upsert returned no row for counter {key}"))
        })?;
        Self::to_count(Some(row))
    }

    async fn get(&self, key: &str) -> StorageResult<u64> {
        let mut res = self
            .db
            .query("SELECT count FROM type::thing($tb, $key) WHERE expires_at > time::now()")
            .bind(("tb", COUNTER_TABLE))
            .bind(("key", key.to_string()))
            .await?;
        let rows: Vec<CounterRow> = res.take(0)?;
        Self::to_count(rows.into_iter().next())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.db
            .query("DELETE type::thing($tb, $key)")
            .bind(("tb", COUNTER_TABLE))
            .bind(("key", key.to_string()))
            .await?
            .check()?;
        Ok(())
    }
}
