//! Runtime configuration.
//!
//! Loaded from TOML, then overridden from `DELEGATE_*` environment variables.
//! Every section has defaults, so an empty file is a valid config.
//!
//! ```toml
//! [rate_limit]
//! user_limit = 10
//! org_limit = 50
//! window_ms = 60000
//!
//! [retry]
//! max_retry_attempts = 3
//!
//! [fallbacks]
//! researcher = ["researcher-lite"]
//!
//! [telemetry]
//! json = true
//! level = "debug"
//! ```

use std::path::Path;
use std::sync::Arc;

use delegate_state::CounterStore;
use serde::{Deserialize, Serialize};

use crate::domain::{DelegateError, Result};
use crate::error_policy::{ErrorPolicy, FallbackTable, RetryPolicy};
use crate::rate_limit::{RateLimitConfig, SpawnRateLimiter};

/// Logging output settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub json: bool,
    pub level: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            json: false,
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DelegateConfig {
    pub rate_limit: RateLimitConfig,
    pub retry: RetryPolicy,
    pub fallbacks: FallbackTable,
    pub telemetry: TelemetryConfig,
}

impl DelegateConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    /// Load `path` if given, apply environment overrides, then validate.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `DELEGATE_*` variables from the process environment.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup.
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("DELEGATE_USER_SPAWN_LIMIT") {
            self.rate_limit.user_limit = parse_var("DELEGATE_USER_SPAWN_LIMIT", &v)?;
        }
        if let Some(v) = lookup("DELEGATE_ORG_SPAWN_LIMIT") {
            self.rate_limit.org_limit = parse_var("DELEGATE_ORG_SPAWN_LIMIT", &v)?;
        }
        if let Some(v) = lookup("DELEGATE_SPAWN_WINDOW_MS") {
            self.rate_limit.window_ms = parse_var("DELEGATE_SPAWN_WINDOW_MS", &v)?;
        }
        if let Some(v) = lookup("DELEGATE_MAX_RETRY_ATTEMPTS") {
            self.retry.max_retry_attempts = parse_var("DELEGATE_MAX_RETRY_ATTEMPTS", &v)?;
        }
        if let Some(v) = lookup("DELEGATE_LOG_FORMAT") {
            self.telemetry.json = match v.trim().to_ascii_lowercase().as_str() {
                "json" => true,
                "text" | "pretty" | "plain" => false,
                other => {
                    return Err(DelegateError::InvalidConfig(format!(
                        "DELEGATE_LOG_FORMAT must be json or text, got {other:?}"
                    )))
                }
            };
        }
        if let Some(v) = lookup("DELEGATE_LOG_LEVEL") {
            self.telemetry.level = v.trim().to_string();
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.rate_limit.user_limit == 0 {
            return Err(DelegateError::InvalidConfig(
                "rate_limit.user_limit must be > 0".to_string(),
            ));
        }
        if self.rate_limit.org_limit == 0 {
            return Err(DelegateError::InvalidConfig(
                "rate_limit.org_limit must be > 0".to_string(),
            ));
        }
        if self.rate_limit.window_ms == 0 {
            return Err(DelegateError::InvalidConfig(
                "rate_limit.window_ms must be > 0".to_string(),
            ));
        }
        if self.retry.max_delay_ms == 0 {
            return Err(DelegateError::InvalidConfig(
                "retry.max_delay_ms must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn rate_limiter(&self, store: Arc<dyn CounterStore>) -> SpawnRateLimiter {
        SpawnRateLimiter::new(store, self.rate_limit.clone())
    }

    pub fn error_policy(&self) -> ErrorPolicy {
        ErrorPolicy::new(self.retry.clone(), self.fallbacks.clone())
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| DelegateError::InvalidConfig(format!("{name}: cannot parse {value:?}")))
}
