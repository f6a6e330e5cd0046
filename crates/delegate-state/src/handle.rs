//! SurrealDB connection settings
//!
//! Supports in-memory (`mem://`), a plain URL, or an authenticated cloud
//! endpoint, resolved from the environment in that order of preference.

use surrealdb::engine::any::Any;
use surrealdb::opt::auth::{Database, Root};
use surrealdb::Surreal;
use tracing::{info, instrument};

use crate::counter_store::StorageResult;
use crate::error::StorageError;

const DEFAULT_NAMESPACE: &str = "delegate";
const DEFAULT_DATABASE: &str = "main";

/// Credentials and target for an authenticated SurrealDB endpoint.
#[derive(Debug, Clone)]
pub struct CloudConfig {
    /// `ws://` or `wss://` endpoint.
    pub endpoint: String,
    pub username: String,
    pub password: String,
    pub namespace: String,
    pub database: String,
    /// Sign in as a root user rather than a database user.
    pub is_root: bool,
}

impl CloudConfig {
    pub fn new(
        endpoint: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            username: username.into(),
            password: password.into(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            database: DEFAULT_DATABASE.to_string(),
            is_root: false,
        }
    }

    pub fn with_namespace(mut self, ns: impl Into<String>) -> Self {
        self.namespace = ns.into();
        self
    }

    pub fn with_database(mut self, db: impl Into<String>) -> Self {
        self.database = db.into();
        self
    }

    pub fn with_root(mut self, is_root: bool) -> Self {
        self.is_root = is_root;
        self
    }

    /// Read `SURREALDB_ENDPOINT`, `SURREALDB_USERNAME` and
    /// `SURREALDB_PASSWORD` (all required), plus the optional
    /// `SURREALDB_NAMESPACE`, `SURREALDB_DATABASE` and `SURREALDB_ROOT`.
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`CloudConfig::from_env`] over an arbitrary lookup.
    pub fn from_lookup<F>(lookup: F) -> Option<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::new(
            lookup("SURREALDB_ENDPOINT")?,
            lookup("SURREALDB_USERNAME")?,
            lookup("SURREALDB_PASSWORD")?,
        );
        if let Some(ns) = lookup("SURREALDB_NAMESPACE") {
            config.namespace = ns;
        }
        if let Some(db) = lookup("SURREALDB_DATABASE") {
            config.database = db;
        }
        config.is_root = lookup("SURREALDB_ROOT").is_some_and(|v| v.eq_ignore_ascii_case("true"));
        Some(config)
    }
}

/// Open an unauthenticated connection and select the default namespace.
pub(crate) async fn connect_url(url: &str) -> StorageResult<Surreal<Any>> {
    let db = surrealdb::engine::any::connect(url)
        .await
        .map_err(|e| StorageError::Connection(format!("Failed to connect to {url}: {e}")))?;

    db.use_ns(DEFAULT_NAMESPACE)
        .use_db(DEFAULT_DATABASE)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

    Ok(db)
}

/// Open an authenticated connection described by `config`.
#[instrument(skip(config), fields(endpoint = %config.endpoint, namespace = %config.namespace))]
pub(crate) async fn connect_cloud(config: &CloudConfig) -> StorageResult<Surreal<Any>> {
    info!("Connecting to SurrealDB Cloud (root={})", config.is_root);

    let db = surrealdb::engine::any::connect(&config.endpoint)
        .await
        .map_err(|e| {
            StorageError::Connection(format!("Failed to connect to {}: {}", config.endpoint, e))
        })?;

    if config.is_root {
        db.signin(Root {
            username: &config.username,
            password: &config.password,
        })
        .await
        .map_err(|e| StorageError::Connection(format!("Root auth failed: {e}")))?;
    } else {
        db.signin(Database {
            namespace: &config.namespace,
            database: &config.database,
            username: &config.username,
            password: &config.password,
        })
        .await
        .map_err(|e| StorageError::Connection(format!("DB auth failed: {e}")))?;
    }

    db.use_ns(&config.namespace)
        .use_db(&config.database)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

    Ok(db)
}
