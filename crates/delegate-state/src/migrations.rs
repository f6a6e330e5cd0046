//! SurrealDB schema for spawn counters

use surrealdb::engine::any::Any;
use surrealdb::Surreal;
use tracing::{debug, info};

use crate::counter_store::StorageResult;

/// Table holding one row per counter key.
pub(crate) const COUNTER_TABLE: &str = "spawn_counter";

/// Initialize the `spawn_counter` table.
///
/// Schema:
/// ```text
/// TABLE spawn_counter {
///   id:          RECORD (spawn_counter:⟨key⟩)
///   count:       INT
///   expires_at:  DATETIME (indexed, swept by purge_expired)
/// }
/// ```
///
/// Safe to call multiple times.
pub(crate) async fn init_schema(db: &Surreal<Any>) -> StorageResult<()> {
    debug!("Initializing spawn_counter table");

    let sql = r#"
        DEFINE TABLE IF NOT EXISTS spawn_counter SCHEMALESS;
        DEFINE INDEX IF NOT EXISTS idx_expires_at ON TABLE spawn_counter COLUMNS expires_at;
    "#;

    db.query(sql).await?.check()?;
    info!("spawn_counter table initialized");
    Ok(())
}
